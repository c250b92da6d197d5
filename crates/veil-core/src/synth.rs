//! Type synthesis
//!
//! The synthesizer consumes a planned [`TypeDescriptor`] and freezes a
//! [`SynthesizedType`]: one [`MethodSite`] per member, each carrying the
//! open descriptor, its resolved static slot, and either a lowered IR body
//! (intercepted members) or a direct-dispatch plan. Emission for one type
//! is sequential; static descriptor slots are filled in type-load order.
//! Structural rejections happen in the strategy pass, before any member is
//! processed here.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

use veil_ir::{Block, Body, BodyBuilder, Expr, Intrinsic, LocalId, Place, Stmt};
use veil_model::{
    BodyPlan, CapabilitySet, ClassShape, ConstructFn, InterceptChain, InvokeError,
    MethodDescriptor, ProxyTarget, TypeDescriptor, TypeKind, Value,
};

use crate::chain::InterceptionConfig;
use crate::error::SynthesisError;
use crate::proxy::{Proxy, TargetProvider};
use crate::strategy;

/// Knobs controlling synthesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisOptions {
    /// Reject members with by-reference parameters instead of emitting the
    /// copy-back wrapper. Off by default; the IR path supports by-ref
    /// uniformly.
    pub reject_by_ref: bool,
}

/// How a synthesized member executes.
#[derive(Debug)]
pub enum MethodBody {
    /// Direct dispatch to the wrapped instance; no buffer is allocated.
    Passthrough,
    /// Inherited from the base class unchanged; no forwarding body exists.
    Inherited,
    /// Lowered IR body routing through the frozen interception chain.
    Lowered {
        /// The lowered body.
        ir: Arc<Body>,
        /// The member's frozen chain.
        chain: Arc<InterceptChain>,
    },
}

/// One member of a synthesized type: open descriptor, static resolved slot,
/// and the execution plan.
#[derive(Debug)]
pub struct MethodSite {
    open: Arc<MethodDescriptor>,
    resolved: OnceCell<Arc<MethodDescriptor>>,
    body: MethodBody,
}

impl MethodSite {
    pub(crate) fn new(
        open: Arc<MethodDescriptor>,
        resolved: OnceCell<Arc<MethodDescriptor>>,
        body: MethodBody,
    ) -> Self {
        MethodSite {
            open,
            resolved,
            body,
        }
    }

    /// The open (or non-generic) member descriptor.
    pub fn open(&self) -> &Arc<MethodDescriptor> {
        &self.open
    }

    /// The pre-resolved descriptor; filled at synthesis time for
    /// non-generic members, empty for generic ones (closed per call).
    pub fn resolved(&self) -> Option<&Arc<MethodDescriptor>> {
        self.resolved.get()
    }

    /// The execution plan.
    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    /// Check if calls route through an interception chain.
    pub fn is_intercepted(&self) -> bool {
        matches!(self.body, MethodBody::Lowered { .. })
    }
}

/// A frozen synthesized proxy type: the method-site table plus the cached
/// activation routine. Immutable after synthesis; shared as an `Arc` out of
/// the cache.
pub struct SynthesizedType {
    name: Arc<str>,
    kind: TypeKind,
    descriptor: Arc<TypeDescriptor>,
    sites: FxHashMap<Arc<str>, Arc<MethodSite>>,
    factory: Option<ConstructFn>,
}

impl SynthesizedType {
    /// Synthesized type name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Proxy kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The structural descriptor the type was synthesized from.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Names of the capability sets the type implements (the transitive
    /// closure of the requested set, nothing more).
    pub fn implements(&self) -> &[Arc<str>] {
        &self.descriptor.implements
    }

    /// Number of members.
    pub fn method_count(&self) -> usize {
        self.sites.len()
    }

    /// Look up a member site by name.
    pub fn site(&self, name: &str) -> Option<&Arc<MethodSite>> {
        self.sites.get(name)
    }

    /// Activate a proxy over an existing target instance.
    pub fn activate_with(self: Arc<Self>, target: Arc<dyn ProxyTarget>) -> Proxy {
        Proxy::over(self, target)
    }

    /// Activate a proxy whose target is obtained from `provider` per call.
    pub fn activate_from(self: Arc<Self>, provider: TargetProvider) -> Proxy {
        Proxy::from_provider(self, provider)
    }

    /// Activate a subclass proxy by forwarding `args` to the matching base
    /// constructor.
    pub fn construct(self: Arc<Self>, mut args: Vec<Value>) -> Result<Proxy, InvokeError> {
        let no_ctor = || InvokeError::NoMatchingConstructor {
            type_name: self.name.to_string(),
            actual: args.len(),
        };
        let ctor = match self.descriptor.ctors.iter().find(|c| c.arity() == args.len()) {
            Some(ctor) => ctor,
            None => return Err(no_ctor()),
        };
        for (arg, param) in args.iter().zip(ctor.params.iter()) {
            if !arg.conforms_to(&param.ty) {
                return Err(InvokeError::CastFailed {
                    expected: param.ty.to_string(),
                    actual: arg.kind_name().to_string(),
                });
            }
        }
        let factory = self.factory.as_ref().ok_or_else(no_ctor)?;
        let target = factory(&mut args)?;
        Ok(self.activate_with(target))
    }
}

impl std::fmt::Debug for SynthesizedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("methods", &self.sites.len())
            .finish()
    }
}

/// Lowers planned types into frozen [`SynthesizedType`]s.
#[derive(Debug, Default)]
pub struct Synthesizer {
    options: SynthesisOptions,
}

impl Synthesizer {
    /// Synthesizer with default options.
    pub fn new() -> Self {
        Synthesizer::default()
    }

    /// Synthesizer with explicit options.
    pub fn with_options(options: SynthesisOptions) -> Self {
        Synthesizer { options }
    }

    /// Synthesize an interface proxy type for a capability set.
    pub fn synthesize_interface(
        &self,
        set: &Arc<CapabilitySet>,
        config: &InterceptionConfig,
    ) -> Result<Arc<SynthesizedType>, SynthesisError> {
        let descriptor = strategy::plan_interface(set, config)?;
        self.freeze(descriptor, None)
    }

    /// Synthesize a subclass proxy type for a class.
    pub fn synthesize_class(
        &self,
        shape: &Arc<ClassShape>,
        config: &InterceptionConfig,
    ) -> Result<Arc<SynthesizedType>, SynthesisError> {
        let descriptor = strategy::plan_class(shape, config)?;
        self.freeze(descriptor, shape.factory().cloned())
    }

    fn freeze(
        &self,
        descriptor: TypeDescriptor,
        factory: Option<ConstructFn>,
    ) -> Result<Arc<SynthesizedType>, SynthesisError> {
        let descriptor = Arc::new(descriptor);
        let mut sites = FxHashMap::default();

        for plan in descriptor.methods.iter() {
            let open = plan.descriptor.clone();
            if self.options.reject_by_ref && open.has_by_ref() {
                return Err(SynthesisError::ByRefUnsupported {
                    method: open.qualified_name(),
                });
            }

            let body = match &plan.body {
                BodyPlan::Intercepted(chain) => {
                    log::debug!(
                        "lowering `{}` ({} chain layers)",
                        open.qualified_name(),
                        chain.len()
                    );
                    MethodBody::Lowered {
                        ir: Arc::new(lower(&open)),
                        chain: chain.clone(),
                    }
                }
                BodyPlan::Passthrough => MethodBody::Passthrough,
                BodyPlan::Inherited => MethodBody::Inherited,
            };

            // Non-generic members resolve once into the static slot here,
            // in type-load order; generic members close per call.
            let resolved = if open.is_generic() {
                OnceCell::new()
            } else {
                OnceCell::with_value(open.clone())
            };
            sites.insert(open.name.clone(), Arc::new(MethodSite::new(open, resolved, body)));
        }

        log::debug!(
            "synthesized `{}` ({}, {} members)",
            descriptor.name,
            descriptor.kind,
            sites.len()
        );
        Ok(Arc::new(SynthesizedType {
            name: descriptor.name.clone(),
            kind: descriptor.kind,
            descriptor,
            sites,
            factory,
        }))
    }
}

/// Lower one intercepted member to IR.
///
/// The emitted body performs the fixed sequence: allocate the argument
/// buffer and store converted caller arguments; resolve (or close) the
/// descriptor; invoke the chain; convert the produced result to the
/// declared return type, raising on an absent result for a non-nullable
/// value-kind return; and, when any parameter is by-reference, wrap the
/// whole sequence in try/finally so buffer slots are copied back to the
/// caller on every exit path. `task`-returning members route through the
/// asynchronous chain entry and return its handle directly.
fn lower(method: &MethodDescriptor) -> Body {
    let mut builder = BodyBuilder::new();
    let buffer = builder.local();
    builder.assign_local(
        buffer,
        Expr::NewArray {
            len: Box::new(Expr::i32(method.arity() as i32)),
        },
    );
    for param in method.params.iter() {
        builder.assign(
            Place::Index {
                array: Box::new(Expr::Local(buffer)),
                index: Box::new(Expr::i32(param.position as i32)),
            },
            Expr::convert(Expr::Arg(param.position), param.ty.clone()),
        );
    }

    let core = core_block(method, buffer);
    if method.has_by_ref() {
        let cleanup = method
            .params
            .iter()
            .filter(|p| p.by_ref)
            .map(|p| {
                Stmt::Expr(Expr::assign(
                    Place::Arg(p.position),
                    Expr::index(Expr::Local(buffer), Expr::i32(p.position as i32)),
                ))
            })
            .collect();
        builder.try_finally(core, Block::new(cleanup));
    } else {
        for stmt in core.stmts {
            builder.push(stmt);
        }
    }
    builder.build()
}

fn core_block(method: &MethodDescriptor, buffer: LocalId) -> Block {
    let mut stmts = Vec::new();
    let resolve = if method.is_generic() {
        Intrinsic::CloseMethod
    } else {
        Intrinsic::ResolveMethod
    };
    stmts.push(Stmt::Expr(Expr::call(resolve, [])));

    if method.ret.is_task() {
        stmts.push(Stmt::Return(Some(Expr::call(
            Intrinsic::InvokeChainAsync,
            [Expr::Local(buffer)],
        ))));
        return Block::new(stmts);
    }

    stmts.push(Stmt::Expr(Expr::call(
        Intrinsic::InvokeChain,
        [Expr::Local(buffer)],
    )));
    if method.ret.is_unit() {
        stmts.push(Stmt::Return(None));
    } else {
        // Open returns defer the value-kind check to the closed descriptor.
        let absent = if method.ret.is_open()
            || (method.ret.is_value_kind() && !method.ret.is_nullable())
        {
            Expr::call(Intrinsic::RaiseMissingResult, [])
        } else {
            Expr::null()
        };
        stmts.push(Stmt::Return(Some(Expr::conditional(
            Expr::call(Intrinsic::HasResult, []),
            Expr::convert(Expr::call(Intrinsic::TakeResult, []), method.ret.clone()),
            absent,
        ))));
    }
    Block::new(stmts)
}
