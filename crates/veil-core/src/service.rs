//! Service description boundary
//!
//! The container-facing edge of the pipeline: a [`ServiceDescription`]
//! names a target, how it is realized, and its lifetime.
//! [`rewrite_service`] swaps the realization for one that activates the
//! synthesized proxy around the original, leaving the lifetime untouched.

use std::fmt;
use std::sync::Arc;

use veil_model::{CapabilitySet, ClassShape, ProxyTarget};

use crate::chain::InterceptionConfig;
use crate::error::SynthesisError;
use crate::proxy::TargetProvider;
use crate::ProxyFactory;

/// What a service resolves to.
pub enum ServiceTarget {
    /// A capability set implemented by the realization.
    Capability(Arc<CapabilitySet>),
    /// A concrete class.
    Class(Arc<ClassShape>),
}

impl ServiceTarget {
    /// Target type name.
    pub fn name(&self) -> &Arc<str> {
        match self {
            ServiceTarget::Capability(set) => set.name(),
            ServiceTarget::Class(shape) => shape.name(),
        }
    }
}

/// How the service obtains its instance.
pub enum Realization {
    /// Constructed from the declared class shape.
    Shape,
    /// A pre-built instance.
    Instance(Arc<dyn ProxyTarget>),
    /// A factory invoked per resolution.
    Factory(TargetProvider),
}

/// Instance sharing policy; opaque to the proxy pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Transient,
    Scoped,
    Singleton,
}

/// One service registration.
pub struct ServiceDescription {
    /// The service target.
    pub target: ServiceTarget,
    /// How instances are obtained.
    pub realization: Realization,
    /// Sharing policy, passed through untouched.
    pub lifetime: Lifetime,
}

impl fmt::Debug for ServiceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let realization = match self.realization {
            Realization::Shape => "shape",
            Realization::Instance(_) => "instance",
            Realization::Factory(_) => "factory",
        };
        f.debug_struct("ServiceDescription")
            .field("target", &self.target.name())
            .field("realization", &realization)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Rewrite a service so resolution yields the synthesized proxy instead of
/// the bare realization. The returned description keeps the original target
/// and lifetime; its realization is a factory activating the proxy.
pub fn rewrite_service(
    description: ServiceDescription,
    factory: &ProxyFactory,
    config: &InterceptionConfig,
) -> Result<ServiceDescription, SynthesisError> {
    let ServiceDescription {
        target,
        realization,
        lifetime,
    } = description;

    let provider: TargetProvider = match (&target, realization) {
        (ServiceTarget::Capability(set), Realization::Instance(instance)) => {
            let ty = factory.interface_type(set, config)?;
            Arc::new(move || {
                Ok(Arc::new(ty.clone().activate_with(instance.clone())) as Arc<dyn ProxyTarget>)
            })
        }
        (ServiceTarget::Capability(set), Realization::Factory(inner)) => {
            let ty = factory.interface_type(set, config)?;
            Arc::new(move || {
                Ok(Arc::new(ty.clone().activate_from(inner.clone())) as Arc<dyn ProxyTarget>)
            })
        }
        (ServiceTarget::Capability(set), Realization::Shape) => {
            return Err(SynthesisError::UnsupportedTargetShape {
                name: set.name().to_string(),
                reason: "capability service needs an instance or factory realization".to_string(),
            });
        }
        (ServiceTarget::Class(shape), Realization::Shape) => {
            let ty = factory.class_type(shape, config)?;
            Arc::new(move || {
                ty.clone()
                    .construct(Vec::new())
                    .map(|proxy| Arc::new(proxy) as Arc<dyn ProxyTarget>)
            })
        }
        (ServiceTarget::Class(shape), Realization::Instance(instance)) => {
            let ty = factory.class_type(shape, config)?;
            Arc::new(move || {
                Ok(Arc::new(ty.clone().activate_with(instance.clone())) as Arc<dyn ProxyTarget>)
            })
        }
        (ServiceTarget::Class(shape), Realization::Factory(inner)) => {
            let ty = factory.class_type(shape, config)?;
            Arc::new(move || {
                let instance = inner()?;
                Ok(Arc::new(ty.clone().activate_with(instance)) as Arc<dyn ProxyTarget>)
            })
        }
    };

    Ok(ServiceDescription {
        target,
        realization: Realization::Factory(provider),
        lifetime,
    })
}
