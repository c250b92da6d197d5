//! Synthesis-time errors

use thiserror::Error;

use veil_model::{InvokeError, ModelError};

/// Errors raised while planning or synthesizing a proxy type.
///
/// Structural rejections happen before any member is processed; a failed
/// synthesis never leaves a partial entry in the cache.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SynthesisError {
    /// The target's shape cannot be proxied (sealed, abstract, value kind,
    /// no accessible constructor, wrong realization).
    #[error("cannot proxy `{name}`: {reason}")]
    UnsupportedTargetShape {
        /// Target type name
        name: String,
        /// Why the shape was rejected
        reason: String,
    },

    /// Two constructors accept the same number of arguments, so forwarded
    /// activation cannot pick one.
    #[error("ambiguous constructors on `{name}`: two accept {arity} arguments")]
    AmbiguousConstructor {
        /// Target type name
        name: String,
        /// Conflicting arity
        arity: usize,
    },

    /// A by-reference parameter was rejected by the compatibility option
    /// that disables copy-back emission.
    #[error("by-reference parameter on `{method}` rejected by synthesis options")]
    ByRefUnsupported {
        /// Fully qualified member name
        method: String,
    },

    /// A discovery-time structural error.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// An activation error surfaced through a synthesis entry point.
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}
