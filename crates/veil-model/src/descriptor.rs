//! Immutable member and type descriptors
//!
//! Descriptors are created during discovery and synthesis and are immutable
//! thereafter; they are shared as `Arc`s. A generic [`MethodDescriptor`] is
//! resolved in *open* form once per declaring type and instantiated to
//! *closed* form per call via [`MethodDescriptor::close`].

use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::intercept::{InterceptChain, InterceptorDescriptor};
use crate::ty::{GenericConstraint, Literal, TypeRef};

/// Kind of synthesized type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Implements a capability set over a wrapped instance.
    InterfaceProxy,
    /// Subclasses a target implementation, overriding intercepted members.
    ClassSubclassProxy,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::InterfaceProxy => write!(f, "interface-proxy"),
            TypeKind::ClassSubclassProxy => write!(f, "class-subclass-proxy"),
        }
    }
}

/// A single parameter slot of a member.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Zero-based position in the argument buffer.
    pub position: u16,
    /// Declared type.
    pub ty: TypeRef,
    /// Mutations by the callee must be visible to the caller after the call.
    pub by_ref: bool,
    /// Optional default used to pad missing trailing arguments.
    pub default: Option<Literal>,
}

impl ParameterDescriptor {
    /// Plain by-value parameter.
    pub fn new(position: u16, ty: TypeRef) -> Self {
        ParameterDescriptor {
            position,
            ty,
            by_ref: false,
            default: None,
        }
    }
}

/// A generic method parameter with its constraint.
#[derive(Debug, Clone)]
pub struct GenericParamDescriptor {
    /// Parameter name, for diagnostics.
    pub name: Arc<str>,
    /// Constraint the concrete type argument must satisfy.
    pub constraint: GenericConstraint,
}

/// Immutable description of a single member.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Member name, unique within its declaring type.
    pub name: Arc<str>,
    /// Name of the declaring capability set or class.
    pub declaring_type: Arc<str>,
    /// Ordered parameter slots.
    pub params: Box<[ParameterDescriptor]>,
    /// Declared return type.
    pub ret: TypeRef,
    /// Generic parameters; empty for non-generic members.
    pub generics: Box<[GenericParamDescriptor]>,
    /// Ordered interception markers attached to this member.
    pub interceptors: Box<[InterceptorDescriptor]>,
    /// Concrete type arguments; empty for open and non-generic descriptors.
    pub type_args: Box<[TypeRef]>,
}

impl MethodDescriptor {
    /// Number of parameter slots.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Check if the member declares generic parameters.
    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }

    /// Check if this is the open form of a generic member.
    pub fn is_open(&self) -> bool {
        self.is_generic() && self.type_args.is_empty()
    }

    /// Check if any parameter is by-reference.
    pub fn has_by_ref(&self) -> bool {
        self.params.iter().any(|p| p.by_ref)
    }

    /// Check if any interception markers are attached.
    pub fn is_intercepted(&self) -> bool {
        !self.interceptors.is_empty()
    }

    /// Fully qualified member name for diagnostics.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }

    /// Instantiate the open descriptor with concrete type arguments.
    ///
    /// Constraints are checked and every `Var` slot is substituted. The open
    /// descriptor is untouched, so instantiations never contaminate it.
    pub fn close(&self, type_args: &[TypeRef]) -> Result<Arc<MethodDescriptor>, ModelError> {
        if type_args.len() != self.generics.len() {
            return Err(ModelError::TypeArgCount {
                expected: self.generics.len(),
                actual: type_args.len(),
            });
        }
        for (generic, arg) in self.generics.iter().zip(type_args) {
            if !arg.satisfies(generic.constraint) {
                return Err(ModelError::ConstraintViolation {
                    param: generic.name.to_string(),
                    arg: arg.to_string(),
                    constraint: generic.constraint.to_string(),
                });
            }
        }

        let params = self
            .params
            .iter()
            .map(|p| {
                Ok(ParameterDescriptor {
                    position: p.position,
                    ty: p.ty.substitute(type_args)?,
                    by_ref: p.by_ref,
                    default: p.default.clone(),
                })
            })
            .collect::<Result<Box<[_]>, ModelError>>()?;

        Ok(Arc::new(MethodDescriptor {
            name: self.name.clone(),
            declaring_type: self.declaring_type.clone(),
            params,
            ret: self.ret.substitute(type_args)?,
            generics: self.generics.clone(),
            interceptors: self.interceptors.clone(),
            type_args: type_args.to_vec().into_boxed_slice(),
        }))
    }
}

/// A synthesized field slot.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: Arc<str>,
    /// Declared type.
    pub ty: TypeRef,
}

/// A constructor signature.
#[derive(Debug, Clone)]
pub struct ConstructorDescriptor {
    /// Ordered parameter slots.
    pub params: Box<[ParameterDescriptor]>,
}

impl ConstructorDescriptor {
    /// Number of parameter slots.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// How a synthesized member is realized.
#[derive(Debug, Clone)]
pub enum BodyPlan {
    /// Route through the given frozen interception chain; the synthesizer
    /// emits an IR body for this member.
    Intercepted(Arc<InterceptChain>),
    /// Default-dispatch to the wrapped instance; no buffer is allocated.
    Passthrough,
    /// Inherited unchanged from the base class; no forwarding body exists.
    Inherited,
}

impl BodyPlan {
    /// Check for the intercepted plan.
    pub fn is_intercepted(&self) -> bool {
        matches!(self, BodyPlan::Intercepted(_))
    }
}

/// One member of a [`TypeDescriptor`] with its realization plan.
#[derive(Debug, Clone)]
pub struct MethodPlan {
    /// Open (or non-generic) member descriptor.
    pub descriptor: Arc<MethodDescriptor>,
    /// Realization plan.
    pub body: BodyPlan,
}

/// Structural description of a type to synthesize.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Synthesized type name.
    pub name: Arc<str>,
    /// Proxy kind.
    pub kind: TypeKind,
    /// Base class name for subclass proxies.
    pub base: Option<Arc<str>>,
    /// Transitive capability-set closure the type implements.
    pub implements: Box<[Arc<str>]>,
    /// Synthesized fields.
    pub fields: Box<[FieldDescriptor]>,
    /// Forwarded constructors.
    pub ctors: Box<[ConstructorDescriptor]>,
    /// Members with their realization plans.
    pub methods: Box<[MethodPlan]>,
}
