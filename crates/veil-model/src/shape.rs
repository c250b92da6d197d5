//! Declared shapes: capability sets and classes
//!
//! Shapes are the registration surface of the descriptor model. A
//! [`CapabilitySet`] names the members a type promises to implement; a
//! [`ClassShape`] additionally carries constructors and a construction
//! function. Both accept declarative interception markers at type and
//! member level.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::{ConstructorDescriptor, ParameterDescriptor};
use crate::error::InvokeError;
use crate::intercept::{Interceptor, ProxyTarget};
use crate::ty::{GenericConstraint, Literal, TypeRef};
use crate::value::Value;

/// Construction function producing a target instance from argument slots.
pub type ConstructFn =
    Arc<dyn Fn(&mut [Value]) -> Result<Arc<dyn ProxyTarget>, InvokeError> + Send + Sync>;

/// Declared member signature with its member-level markers.
pub struct MethodSig {
    pub(crate) name: Arc<str>,
    pub(crate) params: Vec<ParameterDescriptor>,
    pub(crate) ret: TypeRef,
    pub(crate) generics: Vec<(Arc<str>, GenericConstraint)>,
    pub(crate) markers: Vec<Arc<dyn Interceptor>>,
}

impl MethodSig {
    /// Start a member signature; the return type defaults to `unit`.
    pub fn new(name: &str) -> Self {
        MethodSig {
            name: Arc::from(name),
            params: Vec::new(),
            ret: TypeRef::Unit,
            generics: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Append a by-value parameter.
    pub fn param(mut self, ty: TypeRef) -> Self {
        let position = self.params.len() as u16;
        self.params.push(ParameterDescriptor::new(position, ty));
        self
    }

    /// Append a by-reference parameter.
    pub fn by_ref_param(mut self, ty: TypeRef) -> Self {
        let position = self.params.len() as u16;
        self.params.push(ParameterDescriptor {
            position,
            ty,
            by_ref: true,
            default: None,
        });
        self
    }

    /// Append a by-value parameter with a default literal.
    pub fn param_with_default(mut self, ty: TypeRef, default: Literal) -> Self {
        let position = self.params.len() as u16;
        self.params.push(ParameterDescriptor {
            position,
            ty,
            by_ref: false,
            default: Some(default),
        });
        self
    }

    /// Set the return type.
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.ret = ty;
        self
    }

    /// Declare a generic parameter.
    pub fn generic(mut self, name: &str, constraint: GenericConstraint) -> Self {
        self.generics.push((Arc::from(name), constraint));
        self
    }

    /// Attach a member-level interception marker.
    pub fn marker(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.markers.push(hook);
        self
    }

    /// Member name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} -> {}", self.name, self.params.len(), self.ret)
    }
}

/// A named set of members a type promises to implement.
pub struct CapabilitySet {
    pub(crate) name: Arc<str>,
    pub(crate) extends: Vec<Arc<CapabilitySet>>,
    pub(crate) methods: Vec<MethodSig>,
    pub(crate) markers: Vec<Arc<dyn Interceptor>>,
}

impl CapabilitySet {
    /// Start building a capability set.
    pub fn builder(name: &str) -> CapabilitySetBuilder {
        CapabilitySetBuilder {
            set: CapabilitySet {
                name: Arc::from(name),
                extends: Vec::new(),
                methods: Vec::new(),
                markers: Vec::new(),
            },
        }
    }

    /// Set name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Directly extended capability sets.
    pub fn extends(&self) -> &[Arc<CapabilitySet>] {
        &self.extends
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("name", &self.name)
            .field("extends", &self.extends.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("methods", &self.methods)
            .field("markers", &self.markers.len())
            .finish()
    }
}

/// Builder for [`CapabilitySet`].
pub struct CapabilitySetBuilder {
    set: CapabilitySet,
}

impl CapabilitySetBuilder {
    /// Extend another capability set; its members and markers are inherited.
    pub fn extends(mut self, other: &Arc<CapabilitySet>) -> Self {
        self.set.extends.push(other.clone());
        self
    }

    /// Declare a member.
    pub fn method(mut self, sig: MethodSig) -> Self {
        self.set.methods.push(sig);
        self
    }

    /// Attach a type-level interception marker, inherited by every member.
    pub fn marker(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.set.markers.push(hook);
        self
    }

    /// Freeze the set.
    pub fn build(self) -> Arc<CapabilitySet> {
        Arc::new(self.set)
    }
}

/// A declared class: members, base chain, constructors, structural flags
/// and a construction function.
pub struct ClassShape {
    pub(crate) name: Arc<str>,
    pub(crate) base: Option<Arc<ClassShape>>,
    pub(crate) sealed: bool,
    pub(crate) is_abstract: bool,
    pub(crate) is_value: bool,
    pub(crate) ctors: Vec<ConstructorDescriptor>,
    pub(crate) methods: Vec<MethodSig>,
    pub(crate) markers: Vec<Arc<dyn Interceptor>>,
    pub(crate) factory: Option<ConstructFn>,
}

impl ClassShape {
    /// Start building a class shape.
    pub fn builder(name: &str) -> ClassShapeBuilder {
        ClassShapeBuilder {
            shape: ClassShape {
                name: Arc::from(name),
                base: None,
                sealed: false,
                is_abstract: false,
                is_value: false,
                ctors: Vec::new(),
                methods: Vec::new(),
                markers: Vec::new(),
                factory: None,
            },
        }
    }

    /// Class name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Base class, if any.
    pub fn base(&self) -> Option<&Arc<ClassShape>> {
        self.base.as_ref()
    }

    /// Check if the class forbids subclassing.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Check if the class cannot be instantiated directly.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Check if this is a value kind.
    pub fn is_value(&self) -> bool {
        self.is_value
    }

    /// Declared constructors.
    pub fn ctors(&self) -> &[ConstructorDescriptor] {
        &self.ctors
    }

    /// The construction function, if one was registered.
    pub fn factory(&self) -> Option<&ConstructFn> {
        self.factory.as_ref()
    }

    /// Construct a base instance, forwarding the argument slots.
    pub fn construct(&self, args: &mut [Value]) -> Result<Arc<dyn ProxyTarget>, InvokeError> {
        match &self.factory {
            Some(factory) => factory(args),
            None => Err(InvokeError::NoMatchingConstructor {
                type_name: self.name.to_string(),
                actual: args.len(),
            }),
        }
    }
}

impl fmt::Debug for ClassShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassShape")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| &b.name))
            .field("sealed", &self.sealed)
            .field("abstract", &self.is_abstract)
            .field("value", &self.is_value)
            .field("ctors", &self.ctors.len())
            .field("methods", &self.methods)
            .finish()
    }
}

/// Builder for [`ClassShape`].
pub struct ClassShapeBuilder {
    shape: ClassShape,
}

impl ClassShapeBuilder {
    /// Set the base class.
    pub fn base(mut self, base: &Arc<ClassShape>) -> Self {
        self.shape.base = Some(base.clone());
        self
    }

    /// Forbid subclassing.
    pub fn sealed(mut self) -> Self {
        self.shape.sealed = true;
        self
    }

    /// Mark the class abstract.
    pub fn abstract_type(mut self) -> Self {
        self.shape.is_abstract = true;
        self
    }

    /// Mark the class as a value kind.
    pub fn value_kind(mut self) -> Self {
        self.shape.is_value = true;
        self
    }

    /// Declare a constructor signature.
    pub fn ctor(mut self, params: Vec<ParameterDescriptor>) -> Self {
        self.shape.ctors.push(ConstructorDescriptor {
            params: params.into_boxed_slice(),
        });
        self
    }

    /// Declare a member.
    pub fn method(mut self, sig: MethodSig) -> Self {
        self.shape.methods.push(sig);
        self
    }

    /// Attach a type-level interception marker.
    pub fn marker(mut self, hook: Arc<dyn Interceptor>) -> Self {
        self.shape.markers.push(hook);
        self
    }

    /// Register the construction function invoked for every forwarded
    /// constructor.
    pub fn factory(
        mut self,
        f: impl Fn(&mut [Value]) -> Result<Arc<dyn ProxyTarget>, InvokeError> + Send + Sync + 'static,
    ) -> Self {
        self.shape.factory = Some(Arc::new(f));
        self
    }

    /// Freeze the shape.
    pub fn build(self) -> Arc<ClassShape> {
        Arc::new(self.shape)
    }
}
