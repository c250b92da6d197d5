//! Tagged runtime values and the argument buffer
//!
//! Every slot that crosses the proxy boundary carries a [`Value`]: a tagged
//! variant with one case per type kind. The tag travels with the value, so
//! conversions are explicit and checked rather than silent casts on an
//! untyped boxed slot.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::InvokeError;
use crate::task::TaskHandle;
use crate::ty::{Literal, TypeRef};

/// Date/time value kind: microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub i64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Named handle to a reference-kind instance.
///
/// The name records the declared type; the payload is downcast by whoever
/// knows the concrete Rust type behind it.
#[derive(Clone)]
pub struct ObjRef {
    type_name: Arc<str>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl ObjRef {
    /// Wrap a payload under a declared type name.
    pub fn new<T: Any + Send + Sync>(type_name: &str, payload: T) -> Self {
        ObjRef {
            type_name: Arc::from(type_name),
            payload: Arc::new(payload),
        }
    }

    /// Declared type name of the instance.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Downcast the payload to a concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.payload.clone().downcast::<T>().ok()
    }

    /// Identity comparison on the underlying payload.
    pub fn same_instance(&self, other: &ObjRef) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({})", self.type_name)
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
    }
}

/// Tagged runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The unit (void) value.
    #[default]
    Unit,
    /// Absent value for nullable and reference slots.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 64-bit float.
    F64(f64),
    /// Date/time value kind.
    Timestamp(Timestamp),
    /// Immutable string.
    Str(Arc<str>),
    /// Reference-kind instance.
    Obj(ObjRef),
    /// Fixed-length value array (the argument buffer representation).
    Array(ValueArray),
    /// Asynchronous result handle.
    Task(TaskHandle),
}

impl Value {
    /// String value.
    pub fn str(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }

    /// Reference-kind instance value.
    pub fn obj<T: Any + Send + Sync>(type_name: &str, payload: T) -> Self {
        Value::Obj(ObjRef::new(type_name, payload))
    }

    /// Timestamp value from microseconds since the Unix epoch.
    pub fn timestamp(micros: i64) -> Self {
        Value::Timestamp(Timestamp(micros))
    }

    /// Check for the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Timestamp(_) => "timestamp",
            Value::Str(_) => "str",
            Value::Obj(_) => "object",
            Value::Array(_) => "array",
            Value::Task(_) => "task",
        }
    }

    /// Check whether this value can occupy a slot of the given type.
    pub fn conforms_to(&self, ty: &TypeRef) -> bool {
        match (self, ty) {
            (Value::Null, TypeRef::Nullable(_)) => true,
            (Value::Null, other) => other.is_reference_kind(),
            (value, TypeRef::Nullable(inner)) => value.conforms_to(inner),
            (Value::Unit, TypeRef::Unit) => true,
            (Value::Bool(_), TypeRef::Bool) => true,
            (Value::I32(_), TypeRef::I32) => true,
            (Value::I64(_), TypeRef::I64) => true,
            (Value::F64(_), TypeRef::F64) => true,
            (Value::Timestamp(_), TypeRef::Timestamp) => true,
            (Value::Str(_), TypeRef::Str) => true,
            (Value::Obj(_), TypeRef::Object(_)) => true,
            (Value::Task(_), TypeRef::Task(_)) => true,
            _ => false,
        }
    }

    /// Checked conversion into a slot of the given type.
    ///
    /// The tagged representation makes this a conformance check plus a
    /// clone; there is no coercion between kinds.
    pub fn convert_to(&self, ty: &TypeRef) -> Result<Value, InvokeError> {
        if self.conforms_to(ty) {
            Ok(self.clone())
        } else {
            Err(InvokeError::CastFailed {
                expected: ty.to_string(),
                actual: self.kind_name().to_string(),
            })
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Unit => Value::Unit,
            Literal::Null => Value::Null,
            Literal::Bool(v) => Value::Bool(v),
            Literal::I32(v) => Value::I32(v),
            Literal::I64(v) => Value::I64(v),
            Literal::F64(v) => Value::F64(v),
            Literal::Timestamp(v) => Value::Timestamp(Timestamp(v)),
            Literal::Str(v) => Value::Str(v),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        Value::from(literal.clone())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "unit"),
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Obj(v) => write!(f, "[{}]", v.type_name()),
            Value::Array(v) => write!(f, "[array;{}]", v.len()),
            Value::Task(_) => write!(f, "[task]"),
        }
    }
}

/// Fixed-length shared value array.
///
/// Used as the per-call argument buffer: allocated once with length equal to
/// the parameter count, shared between the evaluator frame and the
/// interception context, and never resized.
#[derive(Clone)]
pub struct ValueArray {
    slots: Arc<Mutex<Vec<Value>>>,
    len: usize,
}

impl ValueArray {
    /// Allocate an array of `len` null slots.
    pub fn new(len: usize) -> Self {
        ValueArray {
            slots: Arc::new(Mutex::new(vec![Value::Null; len])),
            len,
        }
    }

    /// Build an array from existing values.
    pub fn from_values(values: Vec<Value>) -> Self {
        let len = values.len();
        ValueArray {
            slots: Arc::new(Mutex::new(values)),
            len,
        }
    }

    /// Fixed length of the array.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for the zero-length array.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the slot at `index`.
    pub fn get(&self, index: usize) -> Result<Value, InvokeError> {
        self.slots
            .lock()
            .get(index)
            .cloned()
            .ok_or(InvokeError::BufferIndex {
                index,
                len: self.len,
            })
    }

    /// Write the slot at `index`. The length never changes.
    pub fn set(&self, index: usize, value: Value) -> Result<(), InvokeError> {
        let mut slots = self.slots.lock();
        match slots.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InvokeError::BufferIndex {
                index,
                len: self.len,
            }),
        }
    }

    /// Run `f` with mutable access to the whole slot slice.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [Value]) -> R) -> R {
        let mut slots = self.slots.lock();
        f(&mut slots)
    }

    /// Snapshot of the current slot values.
    pub fn to_vec(&self) -> Vec<Value> {
        self.slots.lock().clone()
    }

    /// Identity comparison; clones share the same storage.
    pub fn same_buffer(&self, other: &ValueArray) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }
}

impl fmt::Debug for ValueArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.lock().iter()).finish()
    }
}

impl PartialEq for ValueArray {
    fn eq(&self, other: &Self) -> bool {
        self.same_buffer(other)
    }
}
