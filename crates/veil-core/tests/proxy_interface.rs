//! Interface proxies over a wrapped instance: chain ordering, by-ref
//! copy-back, passthrough members and result contracts.

use std::sync::Arc;

use parking_lot::Mutex;

use veil_core::{
    EligibilityPolicy, InterceptionConfig, MethodBody, ProxyFactory, Proxy, SynthesisError,
    SynthesisOptions,
};
use veil_model::{
    CapabilitySet, InterceptContext, Interceptor, Invocation, InvokeError, MethodDescriptor,
    MethodSig, ProxyTarget, TypeRef, Value,
};

struct Calc;

impl ProxyTarget for Calc {
    fn type_name(&self) -> &str {
        "Calc"
    }

    fn invoke(
        &self,
        method: &MethodDescriptor,
        args: &mut [Value],
    ) -> Result<Value, InvokeError> {
        match &*method.name {
            "m" => {
                let (Some(Value::I32(a)), Some(Value::I32(b))) =
                    (args.first().cloned(), args.get(1).cloned())
                else {
                    return Err(InvokeError::raised("bad arguments"));
                };
                // The callee writes through the by-ref slot.
                args[1] = Value::I32(b + 1);
                Ok(Value::Bool(a > b))
            }
            "ping" => Ok(Value::Bool(true)),
            other => Err(InvokeError::UnknownMethod {
                name: other.to_string(),
            }),
        }
    }
}

struct Rewrite;

impl Interceptor for Rewrite {
    fn name(&self) -> &str {
        "rewrite"
    }

    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        ctx.set_arg(1, Value::I32(-10))?;
        next.proceed(ctx)
    }
}

struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for Recorder {
    fn name(&self) -> &str {
        self.label
    }

    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        self.log.lock().push(format!("{}:before", self.label));
        next.proceed(ctx)?;
        self.log.lock().push(format!("{}:after", self.label));
        Ok(())
    }
}

/// Writes the by-ref slot, then raises without ever proceeding.
struct FailAfterWrite;

impl Interceptor for FailAfterWrite {
    fn name(&self) -> &str {
        "fail-after-write"
    }

    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        _next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        ctx.set_arg(1, Value::I32(-5))?;
        Err(InvokeError::raised("boom"))
    }
}

/// Neither proceeds nor produces a result.
struct Swallow;

impl Interceptor for Swallow {
    fn name(&self) -> &str {
        "swallow"
    }

    fn intercept(
        &self,
        _ctx: &mut InterceptContext,
        _next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        Ok(())
    }
}

fn m_sig() -> MethodSig {
    MethodSig::new("m")
        .param(TypeRef::I32)
        .by_ref_param(TypeRef::I32)
        .returns(TypeRef::Bool)
}

fn proxy_with(sig: MethodSig) -> Proxy {
    let set = CapabilitySet::builder("ICalc").method(sig).build();
    ProxyFactory::new()
        .proxy_over(&set, &InterceptionConfig::default(), Arc::new(Calc))
        .unwrap()
}

#[test]
fn test_intercepted_by_ref_round_trip() {
    let proxy = proxy_with(m_sig().marker(Arc::new(Rewrite)));

    let mut args = vec![Value::I32(3), Value::I32(7)];
    let result = proxy.call("m", &mut args).unwrap();

    // The interceptor rewrote the slot to -10 before the target ran, the
    // target bumped it, and cleanup copied it back to the caller.
    assert_eq!(result, Value::Bool(true));
    assert_eq!(args, vec![Value::I32(3), Value::I32(-9)]);
}

#[test]
fn test_copy_back_on_faulted_exit() {
    let proxy = proxy_with(m_sig().marker(Arc::new(FailAfterWrite)));

    let mut args = vec![Value::I32(3), Value::I32(7)];
    let err = proxy.call("m", &mut args).unwrap_err();

    assert_eq!(err, InvokeError::raised("boom"));
    // The write is visible even though no inner layer ever ran.
    assert_eq!(args[1], Value::I32(-5));
}

#[test]
fn test_reverse_declaration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let proxy = proxy_with(
        m_sig()
            .marker(Arc::new(Recorder {
                label: "first",
                log: log.clone(),
            }))
            .marker(Arc::new(Recorder {
                label: "last",
                log: log.clone(),
            })),
    );

    proxy
        .call("m", &mut vec![Value::I32(1), Value::I32(2)])
        .unwrap();
    assert_eq!(
        *log.lock(),
        vec!["last:before", "first:before", "first:after", "last:after"]
    );
}

#[test]
fn test_unmarked_member_is_passthrough() {
    let set = CapabilitySet::builder("ICalc")
        .method(MethodSig::new("ping").returns(TypeRef::Bool))
        .build();
    let factory = ProxyFactory::new();
    let config = InterceptionConfig::default();
    let ty = factory.interface_type(&set, &config).unwrap();

    let site = ty.site("ping").unwrap();
    assert!(!site.is_intercepted());
    assert!(matches!(site.body(), MethodBody::Passthrough));

    let proxy = ty.activate_with(Arc::new(Calc));
    assert_eq!(proxy.call("ping", &mut Vec::new()), Ok(Value::Bool(true)));
}

#[test]
fn test_all_members_policy_intercepts_unmarked() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let set = CapabilitySet::builder("ICalc")
        .method(MethodSig::new("ping").returns(TypeRef::Bool))
        .build();
    let config = InterceptionConfig::new(EligibilityPolicy::AllMembers).global(Arc::new(
        Recorder {
            label: "global",
            log: log.clone(),
        },
    ));

    let proxy = ProxyFactory::new()
        .proxy_over(&set, &config, Arc::new(Calc))
        .unwrap();
    assert_eq!(proxy.call("ping", &mut Vec::new()), Ok(Value::Bool(true)));
    assert_eq!(*log.lock(), vec!["global:before", "global:after"]);
}

#[test]
fn test_implements_exactly_the_transitive_closure() {
    let base = CapabilitySet::builder("IBase")
        .method(MethodSig::new("ping").returns(TypeRef::Bool))
        .build();
    let derived = CapabilitySet::builder("IDerived")
        .extends(&base)
        .method(m_sig().marker(Arc::new(Rewrite)))
        .build();

    let ty = ProxyFactory::new()
        .interface_type(&derived, &InterceptionConfig::default())
        .unwrap();

    let implements: Vec<_> = ty.implements().iter().map(|n| n.to_string()).collect();
    assert_eq!(implements, vec!["IBase", "IDerived"]);
    assert_eq!(ty.method_count(), 2);
    assert!(ty.site("ping").is_some());
    assert!(ty.site("m").is_some());
    assert!(ty.site("other").is_none());
}

#[test]
fn test_redeclared_member_marker_intercepts() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let base = CapabilitySet::builder("IBase")
        .method(MethodSig::new("ping").returns(TypeRef::Bool))
        .build();
    // Compatible redeclaration of an inherited member, adding a marker.
    let derived = CapabilitySet::builder("IDerived")
        .extends(&base)
        .method(
            MethodSig::new("ping")
                .returns(TypeRef::Bool)
                .marker(Arc::new(Recorder {
                    label: "redeclared",
                    log: log.clone(),
                })),
        )
        .build();

    let proxy = ProxyFactory::new()
        .proxy_over(&derived, &InterceptionConfig::default(), Arc::new(Calc))
        .unwrap();
    assert_eq!(proxy.call("ping", &mut Vec::new()), Ok(Value::Bool(true)));
    assert_eq!(
        *log.lock(),
        vec!["redeclared:before", "redeclared:after"]
    );
}

#[test]
fn test_absent_value_kind_result_is_contract_error() {
    let set = CapabilitySet::builder("ICalc")
        .method(
            MethodSig::new("silent")
                .returns(TypeRef::I32)
                .marker(Arc::new(Swallow)),
        )
        .method(
            MethodSig::new("maybe")
                .returns(TypeRef::nullable(TypeRef::I32))
                .marker(Arc::new(Swallow)),
        )
        .build();
    let proxy = ProxyFactory::new()
        .proxy_over(&set, &InterceptionConfig::default(), Arc::new(Calc))
        .unwrap();

    let err = proxy.call("silent", &mut Vec::new()).unwrap_err();
    assert!(matches!(err, InvokeError::MissingInterceptorContract { .. }));

    // A nullable return absorbs the absent result instead.
    assert_eq!(proxy.call("maybe", &mut Vec::new()), Ok(Value::Null));
}

#[test]
fn test_by_ref_compatibility_rejection() {
    let set = CapabilitySet::builder("ICalc")
        .method(m_sig().marker(Arc::new(Rewrite)))
        .build();
    let factory = ProxyFactory::with_options(SynthesisOptions {
        reject_by_ref: true,
    });

    let err = factory
        .interface_type(&set, &InterceptionConfig::default())
        .unwrap_err();
    assert!(matches!(err, SynthesisError::ByRefUnsupported { .. }));
}

#[test]
fn test_proxies_layer() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let marked = CapabilitySet::builder("ICalc")
        .method(m_sig().marker(Arc::new(Recorder {
            label: "inner",
            log: log.clone(),
        })))
        .build();
    // Same member shape, no markers; dispatch through proxies is by name.
    let plain = CapabilitySet::builder("ICalc").method(m_sig()).build();

    let factory = ProxyFactory::new();
    let inner = factory
        .proxy_over(&marked, &InterceptionConfig::default(), Arc::new(Calc))
        .unwrap();

    let config = InterceptionConfig::new(EligibilityPolicy::AllMembers).global(Arc::new(
        Recorder {
            label: "outer",
            log: log.clone(),
        },
    ));
    let outer = factory
        .proxy_over(&plain, &config, Arc::new(inner))
        .unwrap();

    let mut args = vec![Value::I32(9), Value::I32(7)];
    assert_eq!(outer.call("m", &mut args), Ok(Value::Bool(true)));
    assert_eq!(
        *log.lock(),
        vec!["outer:before", "inner:before", "inner:after", "outer:after"]
    );
    // Copy-back crosses both layers.
    assert_eq!(args[1], Value::I32(8));
}
