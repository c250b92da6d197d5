//! Proxy strategy selection
//!
//! Maps a service target onto a proxy variant and produces the structural
//! [`TypeDescriptor`] synthesis consumes. Capability targets become the
//! interface-proxy family (wrapping an instance or a per-call provider,
//! decided at activation); class targets become subclass proxies, with
//! sealed, abstract, value-kind and constructor-less shapes rejected before
//! any member is planned. Unmarked class members keep their inherited
//! implementation; unmarked interface members pass straight through.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use veil_model::{
    capability_closure, discover_capability, discover_class, BodyPlan, CapabilitySet, ClassShape,
    FieldDescriptor, MethodPlan, TypeDescriptor, TypeKind, TypeRef,
};

use crate::chain::{ChainBuilder, InterceptionConfig};
use crate::error::SynthesisError;

/// Plan an interface proxy type over a capability set.
pub fn plan_interface(
    set: &Arc<CapabilitySet>,
    config: &InterceptionConfig,
) -> Result<TypeDescriptor, SynthesisError> {
    let closure = capability_closure(set)?;
    let members = discover_capability(set)?;
    log::debug!(
        "planning interface proxy over `{}` ({} members, {} sets)",
        set.name(),
        members.len(),
        closure.len()
    );

    let chains = ChainBuilder::new(config);
    let methods = members
        .into_iter()
        .map(|descriptor| {
            let body = match chains.build(&descriptor) {
                Some(chain) => BodyPlan::Intercepted(chain),
                None => BodyPlan::Passthrough,
            };
            MethodPlan { descriptor, body }
        })
        .collect();

    Ok(TypeDescriptor {
        name: Arc::from(format!("{}$Proxy", set.name())),
        kind: TypeKind::InterfaceProxy,
        base: None,
        implements: closure.iter().map(|s| s.name().clone()).collect(),
        fields: Box::new([FieldDescriptor {
            name: Arc::from("$target"),
            ty: TypeRef::Object(set.name().clone()),
        }]),
        ctors: Box::new([]),
        methods,
    })
}

/// Plan a subclass proxy type over a class.
pub fn plan_class(
    shape: &Arc<ClassShape>,
    config: &InterceptionConfig,
) -> Result<TypeDescriptor, SynthesisError> {
    let reject = |reason: &str| SynthesisError::UnsupportedTargetShape {
        name: shape.name().to_string(),
        reason: reason.to_string(),
    };
    if shape.is_sealed() {
        return Err(reject("sealed class cannot be subclassed"));
    }
    if shape.is_abstract() {
        return Err(reject("abstract class cannot be activated"));
    }
    if shape.is_value() {
        return Err(reject("value kinds have no subclass identity"));
    }
    if shape.ctors().is_empty() {
        return Err(reject("no accessible constructor to forward"));
    }
    let mut arities = FxHashSet::default();
    for ctor in shape.ctors() {
        if !arities.insert(ctor.arity()) {
            return Err(SynthesisError::AmbiguousConstructor {
                name: shape.name().to_string(),
                arity: ctor.arity(),
            });
        }
    }

    let members = discover_class(shape)?;
    log::debug!(
        "planning subclass proxy over `{}` ({} members)",
        shape.name(),
        members.len()
    );

    let chains = ChainBuilder::new(config);
    let methods = members
        .into_iter()
        .map(|descriptor| {
            let body = match chains.build(&descriptor) {
                Some(chain) => BodyPlan::Intercepted(chain),
                None => BodyPlan::Inherited,
            };
            MethodPlan { descriptor, body }
        })
        .collect();

    Ok(TypeDescriptor {
        name: Arc::from(format!("{}$Subclass", shape.name())),
        kind: TypeKind::ClassSubclassProxy,
        base: Some(shape.name().clone()),
        implements: Box::new([]),
        fields: Box::new([]),
        ctors: shape.ctors().to_vec().into_boxed_slice(),
        methods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::EligibilityPolicy;
    use veil_model::{
        InterceptContext, Interceptor, Invocation, InvokeError, MethodSig, ParameterDescriptor,
    };

    struct Noop;

    impl Interceptor for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn intercept(
            &self,
            ctx: &mut InterceptContext,
            next: &mut Invocation<'_>,
        ) -> Result<(), InvokeError> {
            next.proceed(ctx)
        }
    }

    fn config() -> InterceptionConfig {
        InterceptionConfig::new(EligibilityPolicy::MarkedOnly)
    }

    #[test]
    fn test_interface_plans_and_closure() {
        let base = CapabilitySet::builder("IBase")
            .method(MethodSig::new("plain").returns(TypeRef::I32))
            .build();
        let set = CapabilitySet::builder("IThing")
            .extends(&base)
            .method(
                MethodSig::new("marked")
                    .returns(TypeRef::I32)
                    .marker(Arc::new(Noop)),
            )
            .build();

        let plan = plan_interface(&set, &config()).unwrap();
        assert_eq!(&*plan.name, "IThing$Proxy");
        assert_eq!(plan.kind, TypeKind::InterfaceProxy);
        let implements: Vec<_> = plan.implements.iter().map(|n| n.to_string()).collect();
        assert_eq!(implements, vec!["IBase", "IThing"]);

        let plain = plan.methods.iter().find(|m| &*m.descriptor.name == "plain");
        assert!(matches!(plain.map(|m| &m.body), Some(BodyPlan::Passthrough)));
        let marked = plan.methods.iter().find(|m| &*m.descriptor.name == "marked");
        assert!(marked.map(|m| m.body.is_intercepted()).unwrap_or(false));
    }

    #[test]
    fn test_class_unmarked_members_inherited() {
        let shape = ClassShape::builder("Widget")
            .ctor(vec![])
            .method(MethodSig::new("plain").returns(TypeRef::I32))
            .method(
                MethodSig::new("marked")
                    .returns(TypeRef::I32)
                    .marker(Arc::new(Noop)),
            )
            .build();

        let plan = plan_class(&shape, &config()).unwrap();
        assert_eq!(&*plan.name, "Widget$Subclass");
        assert_eq!(plan.base.as_deref(), Some("Widget"));
        let plain = plan.methods.iter().find(|m| &*m.descriptor.name == "plain");
        assert!(matches!(plain.map(|m| &m.body), Some(BodyPlan::Inherited)));
    }

    #[test]
    fn test_structural_rejections() {
        let sealed = ClassShape::builder("S").sealed().ctor(vec![]).build();
        let abstract_ = ClassShape::builder("A").abstract_type().ctor(vec![]).build();
        let value = ClassShape::builder("V").value_kind().ctor(vec![]).build();
        let bare = ClassShape::builder("B").build();

        for shape in [sealed, abstract_, value, bare] {
            let err = plan_class(&shape, &config()).unwrap_err();
            assert!(matches!(err, SynthesisError::UnsupportedTargetShape { .. }));
        }
    }

    #[test]
    fn test_ambiguous_constructor() {
        let shape = ClassShape::builder("C")
            .ctor(vec![ParameterDescriptor::new(0, TypeRef::I32)])
            .ctor(vec![ParameterDescriptor::new(0, TypeRef::Str)])
            .build();

        let err = plan_class(&shape, &config()).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::AmbiguousConstructor {
                name: "C".to_string(),
                arity: 1,
            }
        );
    }
}
