//! Generic members: per-call closing, constraint checks, and open
//! descriptors staying uncontaminated across instantiations.

use std::sync::Arc;

use veil_core::{InterceptionConfig, ProxyFactory, Proxy};
use veil_model::{
    CapabilitySet, GenericConstraint, InterceptContext, Interceptor, Invocation, InvokeError,
    MethodDescriptor, MethodSig, ModelError, ProxyTarget, TypeRef, Value,
};

struct Store;

impl ProxyTarget for Store {
    fn type_name(&self) -> &str {
        "Store"
    }

    fn invoke(
        &self,
        _method: &MethodDescriptor,
        _args: &mut [Value],
    ) -> Result<Value, InvokeError> {
        Ok(Value::Unit)
    }
}

/// Supplies a result for the closed return type without proceeding.
struct Supply;

impl Interceptor for Supply {
    fn name(&self) -> &str {
        "supply"
    }

    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        _next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        match ctx.method().ret {
            TypeRef::I32 => ctx.set_result(Value::I32(42)),
            TypeRef::Timestamp => ctx.set_result(Value::timestamp(7)),
            _ => {}
        }
        Ok(())
    }
}

/// Absorbs the call without proceeding; used for void members.
struct Absorb;

impl Interceptor for Absorb {
    fn name(&self) -> &str {
        "absorb"
    }

    fn intercept(
        &self,
        _ctx: &mut InterceptContext,
        _next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        Ok(())
    }
}

fn store_proxy() -> Proxy {
    let set = CapabilitySet::builder("IStore")
        .method(
            MethodSig::new("get")
                .generic("T", GenericConstraint::ValueKind)
                .returns(TypeRef::Var(0))
                .marker(Arc::new(Supply)),
        )
        .method(
            MethodSig::new("put")
                .generic("T", GenericConstraint::ValueKind)
                .param(TypeRef::Var(0))
                .marker(Arc::new(Absorb)),
        )
        .build();
    ProxyFactory::new()
        .proxy_over(&set, &InterceptionConfig::default(), Arc::new(Store))
        .unwrap()
}

#[test]
fn test_closed_instantiations() {
    let proxy = store_proxy();
    assert_eq!(
        proxy.call_generic("get", &[TypeRef::I32], &mut Vec::new()),
        Ok(Value::I32(42))
    );
    assert_eq!(
        proxy.call_generic("get", &[TypeRef::Timestamp], &mut Vec::new()),
        Ok(Value::timestamp(7))
    );
}

#[test]
fn test_open_descriptor_uncontaminated() {
    let proxy = store_proxy();
    proxy
        .call_generic("get", &[TypeRef::I32], &mut Vec::new())
        .unwrap();
    proxy
        .call_generic("get", &[TypeRef::Timestamp], &mut Vec::new())
        .unwrap();

    let site = proxy.synthesized().site("get").unwrap();
    assert_eq!(site.open().ret, TypeRef::Var(0));
    assert!(site.open().type_args.is_empty());
    // Generic members have no static resolved slot; they close per call.
    assert!(site.resolved().is_none());
}

#[test]
fn test_argument_converted_to_closed_type() {
    let proxy = store_proxy();
    assert_eq!(
        proxy.call_generic("put", &[TypeRef::I32], &mut vec![Value::I32(5)]),
        Ok(Value::Unit)
    );

    let err = proxy
        .call_generic("put", &[TypeRef::I32], &mut vec![Value::str("nope")])
        .unwrap_err();
    assert!(matches!(err, InvokeError::CastFailed { .. }));
}

#[test]
fn test_constraint_violation() {
    let proxy = store_proxy();
    let err = proxy
        .call_generic("get", &[TypeRef::Str], &mut Vec::new())
        .unwrap_err();
    assert!(matches!(
        err,
        InvokeError::Model(ModelError::ConstraintViolation { .. })
    ));
}

#[test]
fn test_type_argument_count() {
    let proxy = store_proxy();
    let err = proxy.call("get", &mut Vec::new()).unwrap_err();
    assert!(matches!(err, InvokeError::TypeArgs { .. }));

    let err = proxy
        .call_generic("get", &[TypeRef::I32, TypeRef::I64], &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, InvokeError::TypeArgs { .. }));
}

#[test]
fn test_absent_generic_result_raises_for_value_kind() {
    let set = CapabilitySet::builder("IStore")
        .method(
            MethodSig::new("get")
                .generic("T", GenericConstraint::Unconstrained)
                .returns(TypeRef::Var(0))
                .marker(Arc::new(Absorb)),
        )
        .build();
    let proxy = ProxyFactory::new()
        .proxy_over(&set, &InterceptionConfig::default(), Arc::new(Store))
        .unwrap();

    // The value-kind check happens against the closed return type.
    let err = proxy
        .call_generic("get", &[TypeRef::I32], &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, InvokeError::MissingInterceptorContract { .. }));

    assert_eq!(
        proxy.call_generic("get", &[TypeRef::Str], &mut Vec::new()),
        Ok(Value::Null)
    );
}
