//! # veil-core
//!
//! The executable half of the Veil proxy toolkit: strategy selection over
//! service targets, per-member interception chain freezing, lowering of
//! intercepted members to `veil-ir` bodies, per-call evaluation of those
//! bodies, the synthesis cache, and proxy activation.
//!
//! Synthesis is lazy: the first use of a (target, configuration) pair plans
//! the type, lowers its intercepted members, and parks the frozen
//! [`SynthesizedType`] in the cache; every later use is a lookup. The
//! [`ProxyFactory`] facade bundles the synthesizer with an injected cache
//! and is the intended entry point:
//!
//! ```
//! use std::sync::Arc;
//! use veil_core::{InterceptionConfig, ProxyFactory};
//! use veil_model::{
//!     CapabilitySet, InterceptContext, Interceptor, Invocation, InvokeError,
//!     MethodDescriptor, MethodSig, ProxyTarget, TypeRef, Value,
//! };
//!
//! struct Fixed;
//!
//! impl ProxyTarget for Fixed {
//!     fn type_name(&self) -> &str {
//!         "Fixed"
//!     }
//!
//!     fn invoke(
//!         &self,
//!         _method: &MethodDescriptor,
//!         _args: &mut [Value],
//!     ) -> Result<Value, InvokeError> {
//!         Ok(Value::I32(2))
//!     }
//! }
//!
//! struct Double;
//!
//! impl Interceptor for Double {
//!     fn name(&self) -> &str {
//!         "double"
//!     }
//!
//!     fn intercept(
//!         &self,
//!         ctx: &mut InterceptContext,
//!         next: &mut Invocation<'_>,
//!     ) -> Result<(), InvokeError> {
//!         next.proceed(ctx)?;
//!         if let Some(Value::I32(n)) = ctx.take_result() {
//!             ctx.set_result(Value::I32(n * 2));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let set = CapabilitySet::builder("ICounter")
//!     .method(
//!         MethodSig::new("count")
//!             .returns(TypeRef::I32)
//!             .marker(Arc::new(Double)),
//!     )
//!     .build();
//!
//! let factory = ProxyFactory::new();
//! let proxy = factory
//!     .proxy_over(&set, &InterceptionConfig::default(), Arc::new(Fixed))
//!     .unwrap();
//! assert_eq!(proxy.call("count", &mut Vec::new()), Ok(Value::I32(4)));
//! ```

use std::sync::Arc;

use veil_model::{CapabilitySet, ClassShape, ProxyTarget, Value};

pub mod cache;
pub mod chain;
pub mod error;
pub mod eval;
pub mod proxy;
pub mod service;
pub mod strategy;
pub mod synth;

pub use cache::{CacheKey, SynthesisCache};
pub use chain::{ChainBuilder, ConfigToken, EligibilityPolicy, InterceptionConfig};
pub use error::SynthesisError;
pub use eval::{Frame, ObjectFactory};
pub use proxy::{Proxy, TargetProvider};
pub use service::{rewrite_service, Lifetime, Realization, ServiceDescription, ServiceTarget};
pub use synth::{MethodBody, MethodSite, SynthesisOptions, SynthesizedType, Synthesizer};

/// Facade bundling the synthesizer with an injected synthesis cache.
#[derive(Debug, Default)]
pub struct ProxyFactory {
    synthesizer: Synthesizer,
    cache: SynthesisCache,
}

impl ProxyFactory {
    /// Factory with default synthesis options and an empty cache.
    pub fn new() -> Self {
        ProxyFactory::default()
    }

    /// Factory with explicit synthesis options.
    pub fn with_options(options: SynthesisOptions) -> Self {
        ProxyFactory {
            synthesizer: Synthesizer::with_options(options),
            cache: SynthesisCache::new(),
        }
    }

    /// The injected cache.
    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    /// Cached interface proxy type for a capability set.
    pub fn interface_type(
        &self,
        set: &Arc<CapabilitySet>,
        config: &InterceptionConfig,
    ) -> Result<Arc<SynthesizedType>, SynthesisError> {
        self.cache
            .get_or_synthesize(CacheKey::new(set.name(), config.token()), || {
                self.synthesizer.synthesize_interface(set, config)
            })
    }

    /// Cached subclass proxy type for a class.
    pub fn class_type(
        &self,
        shape: &Arc<ClassShape>,
        config: &InterceptionConfig,
    ) -> Result<Arc<SynthesizedType>, SynthesisError> {
        self.cache
            .get_or_synthesize(CacheKey::new(shape.name(), config.token()), || {
                self.synthesizer.synthesize_class(shape, config)
            })
    }

    /// Activate an interface proxy over an existing instance.
    pub fn proxy_over(
        &self,
        set: &Arc<CapabilitySet>,
        config: &InterceptionConfig,
        target: Arc<dyn ProxyTarget>,
    ) -> Result<Proxy, SynthesisError> {
        Ok(self.interface_type(set, config)?.activate_with(target))
    }

    /// Activate an interface proxy whose target comes from a provider.
    pub fn proxy_from(
        &self,
        set: &Arc<CapabilitySet>,
        config: &InterceptionConfig,
        provider: TargetProvider,
    ) -> Result<Proxy, SynthesisError> {
        Ok(self.interface_type(set, config)?.activate_from(provider))
    }

    /// Activate a subclass proxy, forwarding `ctor_args` to the base
    /// constructor of matching arity.
    pub fn subclass(
        &self,
        shape: &Arc<ClassShape>,
        config: &InterceptionConfig,
        ctor_args: Vec<Value>,
    ) -> Result<Proxy, SynthesisError> {
        Ok(self.class_type(shape, config)?.construct(ctor_args)?)
    }
}
