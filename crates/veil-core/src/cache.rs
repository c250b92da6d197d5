//! Synthesis cache
//!
//! Injected registry of synthesized types, keyed by target type name and
//! configuration token. Get-or-create holds the shard entry while the type
//! is synthesized, so a concurrent second requester for the same key blocks
//! and then observes the single synthesized type. A failed synthesis
//! inserts nothing. Entries are immutable and live for the process.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::chain::ConfigToken;
use crate::error::SynthesisError;
use crate::synth::SynthesizedType;

/// Cache identity of a synthesized type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    type_name: Arc<str>,
    token: ConfigToken,
}

impl CacheKey {
    /// Key for a target type under a configuration token.
    pub fn new(type_name: &Arc<str>, token: ConfigToken) -> Self {
        CacheKey {
            type_name: type_name.clone(),
            token,
        }
    }

    /// Target type name.
    pub fn type_name(&self) -> &Arc<str> {
        &self.type_name
    }

    /// Configuration token.
    pub fn token(&self) -> ConfigToken {
        self.token
    }
}

/// Registry of synthesized types.
#[derive(Debug, Default)]
pub struct SynthesisCache {
    entries: DashMap<CacheKey, Arc<SynthesizedType>>,
}

impl SynthesisCache {
    /// Empty cache.
    pub fn new() -> Self {
        SynthesisCache {
            entries: DashMap::new(),
        }
    }

    /// Number of cached types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check for an empty cache.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a cached type without synthesizing.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<SynthesizedType>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Return the cached type for `key`, synthesizing it with `build` on
    /// first use. The entry is held during synthesis, so exactly one
    /// requester builds; an `Err` from `build` leaves no entry behind.
    pub fn get_or_synthesize(
        &self,
        key: CacheKey,
        build: impl FnOnce() -> Result<Arc<SynthesizedType>, SynthesisError>,
    ) -> Result<Arc<SynthesizedType>, SynthesisError> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                log::trace!("synthesis cache hit for `{}`", entry.key().type_name());
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                log::debug!("synthesis cache miss for `{}`", entry.key().type_name());
                let synthesized = build()?;
                entry.insert(synthesized.clone());
                Ok(synthesized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptionConfig;
    use crate::synth::Synthesizer;
    use veil_model::{CapabilitySet, MethodSig, TypeRef};

    fn synthesize() -> Result<Arc<SynthesizedType>, SynthesisError> {
        let set = CapabilitySet::builder("IThing")
            .method(MethodSig::new("ping").returns(TypeRef::Bool))
            .build();
        Synthesizer::new().synthesize_interface(&set, &InterceptionConfig::default())
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(&Arc::from(name), InterceptionConfig::default().token())
    }

    #[test]
    fn test_get_or_synthesize_builds_once() {
        let cache = SynthesisCache::new();
        let first = cache.get_or_synthesize(key("IThing"), synthesize).unwrap();
        let second = cache
            .get_or_synthesize(key("IThing"), || panic!("entry should be cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_synthesis_leaves_no_entry() {
        let cache = SynthesisCache::new();
        let err = cache.get_or_synthesize(key("IThing"), || {
            Err(SynthesisError::UnsupportedTargetShape {
                name: "IThing".to_string(),
                reason: "test".to_string(),
            })
        });
        assert!(err.is_err());
        assert!(cache.get(&key("IThing")).is_none());

        // The key is not poisoned; a later attempt synthesizes normally.
        assert!(cache.get_or_synthesize(key("IThing"), synthesize).is_ok());
        assert_eq!(cache.len(), 1);
    }
}
