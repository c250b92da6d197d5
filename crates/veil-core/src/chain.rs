//! Interception chain building
//!
//! The chain builder collects the ordered interceptor list per member
//! (config-supplied globals first, then the markers already attached to the
//! descriptor: inherited type-level ones, then member-level ones) and
//! freezes it into an [`InterceptChain`] at synthesis time. Because the
//! last-declared layer is outermost, member-level markers wrap type-level
//! markers, which wrap the globals.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use veil_model::{InterceptChain, Interceptor, MethodDescriptor};

/// Which members of a target are routed through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EligibilityPolicy {
    /// Only members carrying at least one declarative marker.
    #[default]
    MarkedOnly,
    /// Every member, marked or not.
    AllMembers,
}

/// Fingerprint of an interception configuration.
///
/// Two configurations with the same policy and the same ordered global
/// interceptor names produce the same token; the synthesis cache keys on
/// it, so equivalent configurations share one synthesized type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigToken(u64);

/// Programmatic interception configuration: the member-eligibility policy
/// plus ordered global interceptors applied to every eligible member.
#[derive(Clone, Default)]
pub struct InterceptionConfig {
    policy: EligibilityPolicy,
    globals: Vec<Arc<dyn Interceptor>>,
}

impl InterceptionConfig {
    /// Configuration with the given policy and no globals.
    pub fn new(policy: EligibilityPolicy) -> Self {
        InterceptionConfig {
            policy,
            globals: Vec::new(),
        }
    }

    /// Append a global interceptor; later additions end up outermost.
    pub fn global(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.globals.push(hook);
        self
    }

    /// The member-eligibility policy.
    pub fn policy(&self) -> EligibilityPolicy {
        self.policy
    }

    /// Global interceptors in declaration order.
    pub fn globals(&self) -> &[Arc<dyn Interceptor>] {
        &self.globals
    }

    /// Fingerprint this configuration for cache keying.
    ///
    /// Globals contribute their [`Interceptor::name`] only, so two distinct
    /// hooks sharing a name collide onto one token and therefore one cached
    /// synthesized type. Names must identify behavior, not just instances.
    pub fn token(&self) -> ConfigToken {
        let mut hasher = FxHasher::default();
        (self.policy as u8).hash(&mut hasher);
        for hook in &self.globals {
            hook.name().hash(&mut hasher);
        }
        ConfigToken(hasher.finish())
    }
}

impl std::fmt::Debug for InterceptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionConfig")
            .field("policy", &self.policy)
            .field(
                "globals",
                &self.globals.iter().map(|g| g.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Freezes per-member chains from a configuration.
pub struct ChainBuilder<'a> {
    config: &'a InterceptionConfig,
}

impl<'a> ChainBuilder<'a> {
    /// Builder over a configuration.
    pub fn new(config: &'a InterceptionConfig) -> Self {
        ChainBuilder { config }
    }

    /// Freeze the chain for one member, or `None` when the member is not
    /// eligible or no interceptor applies (the member stays a passthrough).
    pub fn build(&self, method: &MethodDescriptor) -> Option<Arc<InterceptChain>> {
        let eligible = match self.config.policy {
            EligibilityPolicy::MarkedOnly => method.is_intercepted(),
            EligibilityPolicy::AllMembers => true,
        };
        if !eligible {
            return None;
        }

        let mut layers: Vec<Arc<dyn Interceptor>> = self.config.globals.clone();
        layers.extend(method.interceptors.iter().map(|d| d.hook.clone()));
        if layers.is_empty() {
            return None;
        }
        Some(Arc::new(InterceptChain::new(layers)))
    }
}
