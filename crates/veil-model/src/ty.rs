//! Structural type references used by the descriptor model
//!
//! A [`TypeRef`] describes the shape of a parameter or return slot without
//! referring to any concrete Rust type. Open generic parameters are
//! represented as [`TypeRef::Var`] and substituted away when a method
//! descriptor is closed over concrete type arguments.

use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;

/// Constraint attached to a generic method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GenericConstraint {
    /// No constraint; any type argument is accepted.
    #[default]
    Unconstrained,
    /// The type argument must be a value kind (bool, integer, float, timestamp).
    ValueKind,
    /// The type argument must be a reference kind (string, object, task).
    ReferenceKind,
}

impl fmt::Display for GenericConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericConstraint::Unconstrained => write!(f, "unconstrained"),
            GenericConstraint::ValueKind => write!(f, "value-kind"),
            GenericConstraint::ReferenceKind => write!(f, "reference-kind"),
        }
    }
}

/// Structural reference to a type, independent of any source type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// The `void` type (no value).
    Unit,
    /// Boolean value kind.
    Bool,
    /// 32-bit signed integer value kind.
    I32,
    /// 64-bit signed integer value kind.
    I64,
    /// 64-bit float value kind.
    F64,
    /// Date/time value kind (microseconds since the Unix epoch).
    Timestamp,
    /// Immutable string reference kind.
    Str,
    /// Named reference kind (a capability set or class instance).
    Object(Arc<str>),
    /// Open generic method parameter, by index.
    Var(u16),
    /// Asynchronous result handle completing with the inner type.
    Task(Box<TypeRef>),
    /// Nullable wrapper; the slot may hold `null` instead of the inner type.
    Nullable(Box<TypeRef>),
}

impl TypeRef {
    /// Named reference kind.
    pub fn object(name: &str) -> Self {
        TypeRef::Object(Arc::from(name))
    }

    /// Asynchronous result handle completing with `inner`.
    pub fn task(inner: TypeRef) -> Self {
        TypeRef::Task(Box::new(inner))
    }

    /// Nullable wrapper around `inner`.
    pub fn nullable(inner: TypeRef) -> Self {
        TypeRef::Nullable(Box::new(inner))
    }

    /// Check if this is the `void` type.
    pub fn is_unit(&self) -> bool {
        matches!(self, TypeRef::Unit)
    }

    /// Check if this type is a value kind (looking through `Nullable`).
    pub fn is_value_kind(&self) -> bool {
        match self {
            TypeRef::Bool | TypeRef::I32 | TypeRef::I64 | TypeRef::F64 | TypeRef::Timestamp => true,
            TypeRef::Nullable(inner) => inner.is_value_kind(),
            _ => false,
        }
    }

    /// Check if this type is a reference kind (looking through `Nullable`).
    pub fn is_reference_kind(&self) -> bool {
        match self {
            TypeRef::Str | TypeRef::Object(_) | TypeRef::Task(_) => true,
            TypeRef::Nullable(inner) => inner.is_reference_kind(),
            _ => false,
        }
    }

    /// Check if the slot admits `null`.
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Nullable(_))
    }

    /// Check if this is an asynchronous result handle.
    pub fn is_task(&self) -> bool {
        matches!(self, TypeRef::Task(_))
    }

    /// Completion type of an asynchronous result handle, if this is one.
    pub fn task_inner(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Task(inner) => Some(inner),
            _ => None,
        }
    }

    /// Check if this type still contains open generic parameters.
    pub fn is_open(&self) -> bool {
        match self {
            TypeRef::Var(_) => true,
            TypeRef::Task(inner) | TypeRef::Nullable(inner) => inner.is_open(),
            _ => false,
        }
    }

    /// Replace every open generic parameter with the corresponding entry
    /// of `args`.
    pub fn substitute(&self, args: &[TypeRef]) -> Result<TypeRef, ModelError> {
        match self {
            TypeRef::Var(index) => {
                args.get(*index as usize)
                    .cloned()
                    .ok_or(ModelError::TypeArgOutOfRange {
                        index: *index,
                        count: args.len(),
                    })
            }
            TypeRef::Task(inner) => Ok(TypeRef::Task(Box::new(inner.substitute(args)?))),
            TypeRef::Nullable(inner) => Ok(TypeRef::Nullable(Box::new(inner.substitute(args)?))),
            other => Ok(other.clone()),
        }
    }

    /// Check if this type satisfies a generic constraint.
    pub fn satisfies(&self, constraint: GenericConstraint) -> bool {
        match constraint {
            GenericConstraint::Unconstrained => true,
            GenericConstraint::ValueKind => self.is_value_kind(),
            GenericConstraint::ReferenceKind => self.is_reference_kind(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Unit => write!(f, "unit"),
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::I32 => write!(f, "i32"),
            TypeRef::I64 => write!(f, "i64"),
            TypeRef::F64 => write!(f, "f64"),
            TypeRef::Timestamp => write!(f, "timestamp"),
            TypeRef::Str => write!(f, "str"),
            TypeRef::Object(name) => write!(f, "{name}"),
            TypeRef::Var(index) => write!(f, "${index}"),
            TypeRef::Task(inner) => write!(f, "task<{inner}>"),
            TypeRef::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}

/// Compile-time constant usable as a parameter default or an IR literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// The unit value.
    Unit,
    /// The null value.
    Null,
    /// Boolean constant.
    Bool(bool),
    /// 32-bit integer constant.
    I32(i32),
    /// 64-bit integer constant.
    I64(i64),
    /// 64-bit float constant.
    F64(f64),
    /// Timestamp constant (microseconds since the Unix epoch).
    Timestamp(i64),
    /// String constant.
    Str(Arc<str>),
}

impl Literal {
    /// String constant.
    pub fn str(value: &str) -> Self {
        Literal::Str(Arc::from(value))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Unit => write!(f, "unit"),
            Literal::Null => write!(f, "null"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::I32(v) => write!(f, "{v}"),
            Literal::I64(v) => write!(f, "{v}"),
            Literal::F64(v) => write!(f, "{v}"),
            Literal::Timestamp(v) => write!(f, "@{v}"),
            Literal::Str(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kinds() {
        assert!(TypeRef::I32.is_value_kind());
        assert!(TypeRef::Timestamp.is_value_kind());
        assert!(!TypeRef::Str.is_value_kind());
        assert!(TypeRef::nullable(TypeRef::I32).is_value_kind());
        assert!(TypeRef::nullable(TypeRef::I32).is_nullable());
        assert!(!TypeRef::I32.is_nullable());
    }

    #[test]
    fn test_reference_kinds() {
        assert!(TypeRef::Str.is_reference_kind());
        assert!(TypeRef::object("IWidget").is_reference_kind());
        assert!(TypeRef::task(TypeRef::I32).is_reference_kind());
        assert!(!TypeRef::Bool.is_reference_kind());
    }

    #[test]
    fn test_substitute() {
        let open = TypeRef::task(TypeRef::Var(0));
        let closed = open.substitute(&[TypeRef::I32]).unwrap();
        assert_eq!(closed, TypeRef::task(TypeRef::I32));
        assert!(open.is_open());
        assert!(!closed.is_open());
    }

    #[test]
    fn test_substitute_out_of_range() {
        let err = TypeRef::Var(2).substitute(&[TypeRef::I32]).unwrap_err();
        assert_eq!(
            err,
            ModelError::TypeArgOutOfRange {
                index: 2,
                count: 1
            }
        );
    }

    #[test]
    fn test_constraints() {
        assert!(TypeRef::I32.satisfies(GenericConstraint::ValueKind));
        assert!(TypeRef::Timestamp.satisfies(GenericConstraint::ValueKind));
        assert!(!TypeRef::Str.satisfies(GenericConstraint::ValueKind));
        assert!(TypeRef::Str.satisfies(GenericConstraint::ReferenceKind));
        assert!(TypeRef::Str.satisfies(GenericConstraint::Unconstrained));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeRef::task(TypeRef::I32).to_string(), "task<i32>");
        assert_eq!(TypeRef::nullable(TypeRef::Bool).to_string(), "bool?");
        assert_eq!(TypeRef::Var(1).to_string(), "$1");
    }
}
