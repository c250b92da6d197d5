//! Descriptor-model and invocation errors

use std::sync::Arc;

use thiserror::Error;

/// Structural problems reported at discovery time, never at call time.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// A generic variable referenced a type argument slot that does not exist.
    #[error("type argument index {index} out of range ({count} supplied)")]
    TypeArgOutOfRange {
        /// Referenced slot
        index: u16,
        /// Number of supplied arguments
        count: usize,
    },

    /// Wrong number of type arguments for a generic member.
    #[error("expected {expected} type arguments, got {actual}")]
    TypeArgCount {
        /// Declared generic parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// A type argument violated the declared constraint.
    #[error("type argument `{arg}` violates the {constraint} constraint on `{param}`")]
    ConstraintViolation {
        /// Generic parameter name
        param: String,
        /// Offending type argument
        arg: String,
        /// Violated constraint
        constraint: String,
    },

    /// Two members with the same name but conflicting signatures.
    #[error("duplicate member `{name}` on `{declaring}`")]
    DuplicateMember {
        /// Member name
        name: String,
        /// Declaring type name
        declaring: String,
    },

    /// A member with a shape the synthesis pipeline cannot express.
    #[error("unsupported member `{name}` on `{declaring}`: {reason}")]
    UnsupportedMember {
        /// Member name
        name: String,
        /// Declaring type name
        declaring: String,
        /// Why the shape is unsupported
        reason: String,
    },

    /// A capability set transitively extends itself.
    #[error("capability set cycle involving `{name}`")]
    CyclicCapability {
        /// Name of a set on the cycle
        name: String,
    },
}

/// Errors produced while invoking a member through a proxy.
///
/// Cloneable so that a single asynchronous failure can be observed by every
/// continuation attached to the result handle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvokeError {
    /// The interception chain completed without producing a result for a
    /// member whose declared return is a non-nullable value kind.
    #[error("interception chain produced no result for `{method}`")]
    MissingInterceptorContract {
        /// Fully qualified member name
        method: String,
    },

    /// The requested member does not exist on the synthesized type.
    #[error("unknown method `{name}`")]
    UnknownMethod {
        /// Requested member name
        name: String,
    },

    /// Wrong number of call arguments.
    #[error("`{method}` expects {expected} arguments, got {actual}")]
    ArityMismatch {
        /// Member name
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// A checked value conversion failed.
    #[error("cannot convert {actual} to {expected}")]
    CastFailed {
        /// Target type
        expected: String,
        /// Actual value kind
        actual: String,
    },

    /// Argument buffer access out of its fixed bounds.
    #[error("argument buffer index {index} out of bounds (length {len})")]
    BufferIndex {
        /// Accessed index
        index: usize,
        /// Fixed buffer length
        len: usize,
    },

    /// Generic member invoked with the wrong type-argument count, or a
    /// non-generic member invoked with type arguments.
    #[error("`{method}` takes {expected} type arguments, got {actual}")]
    TypeArgs {
        /// Member name
        method: String,
        /// Declared generic parameter count
        expected: usize,
        /// Supplied type-argument count
        actual: usize,
    },

    /// Activation was attempted with arguments matching no constructor.
    #[error("no constructor of `{type_name}` accepts {actual} arguments")]
    NoMatchingConstructor {
        /// Synthesized type name
        type_name: String,
        /// Supplied argument count
        actual: usize,
    },

    /// A discovery-time error surfaced through an invocation path.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// An error raised by the target or by an interceptor; propagates to the
    /// proxy caller unmodified, after pending by-ref copy-back has run.
    #[error("{0}")]
    Raised(Arc<str>),
}

impl InvokeError {
    /// Error raised by a target implementation or an interceptor.
    pub fn raised(message: impl AsRef<str>) -> Self {
        InvokeError::Raised(Arc::from(message.as_ref()))
    }
}
