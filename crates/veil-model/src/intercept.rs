//! Interception contracts
//!
//! An [`InterceptChain`] is the frozen, per-member table of interceptors
//! built once at synthesis time. Invocation walks it as a decorator chain:
//! the **last-declared** interceptor is outermost and runs first, and depth
//! zero is the base invoker, which dispatches to the wrapped target exactly
//! once unless an outer layer short-circuits.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::MethodDescriptor;
use crate::error::InvokeError;
use crate::value::{Value, ValueArray};

/// Where an interception marker was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    /// Declared on a capability set or class; inherited by every member.
    Type,
    /// Declared on an individual member.
    Member,
    /// Supplied programmatically through the interception configuration.
    Config,
}

/// How the chain entry point was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeMode {
    /// Ordinary synchronous member.
    Sync,
    /// Closed instantiation of a generic member.
    Generic,
    /// Member returning an asynchronous result handle.
    Async,
}

/// Dynamic dispatch into a wrapped target instance.
pub trait ProxyTarget: Send + Sync {
    /// Concrete implementation type name.
    fn type_name(&self) -> &str;

    /// Invoke a member on the wrapped instance.
    ///
    /// `method` is always closed; `args` has exactly `method.arity()` slots
    /// and by-ref slots may be written through it.
    fn invoke(&self, method: &MethodDescriptor, args: &mut [Value]) -> Result<Value, InvokeError>;
}

/// A unit of cross-cutting behavior composed into an ordered chain.
///
/// The generic-result and asynchronous-result hooks default to the
/// synchronous hook; implement them only when the variant needs distinct
/// behavior.
pub trait Interceptor: Send + Sync {
    /// Stable name used for logging and configuration fingerprints.
    fn name(&self) -> &str;

    /// Synchronous invocation hook.
    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError>;

    /// Hook for closed generic instantiations.
    fn intercept_generic(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        self.intercept(ctx, next)
    }

    /// Hook for members returning an asynchronous result handle.
    fn intercept_async(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        self.intercept(ctx, next)
    }
}

/// An interception marker: attachment point plus the behavior hooks.
#[derive(Clone)]
pub struct InterceptorDescriptor {
    /// Where the marker was attached.
    pub attachment: AttachmentPoint,
    /// The behavior hooks.
    pub hook: Arc<dyn Interceptor>,
}

impl InterceptorDescriptor {
    /// Marker attached at the given point.
    pub fn new(attachment: AttachmentPoint, hook: Arc<dyn Interceptor>) -> Self {
        InterceptorDescriptor { attachment, hook }
    }
}

impl fmt::Debug for InterceptorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.attachment, self.hook.name())
    }
}

/// Per-call invocation state: target, resolved member, argument buffer and
/// the result slot. Created once per call and discarded afterwards.
pub struct InterceptContext {
    target: Arc<dyn ProxyTarget>,
    method: Arc<MethodDescriptor>,
    args: ValueArray,
    result: Option<Value>,
}

impl fmt::Debug for InterceptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptContext")
            .field("target", &self.target.type_name())
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl InterceptContext {
    /// Build a context; the buffer length must equal the parameter count.
    pub fn new(
        target: Arc<dyn ProxyTarget>,
        method: Arc<MethodDescriptor>,
        args: ValueArray,
    ) -> Result<Self, InvokeError> {
        if args.len() != method.arity() {
            return Err(InvokeError::ArityMismatch {
                method: method.qualified_name(),
                expected: method.arity(),
                actual: args.len(),
            });
        }
        Ok(InterceptContext {
            target,
            method,
            args,
            result: None,
        })
    }

    /// The wrapped target instance.
    pub fn target(&self) -> &Arc<dyn ProxyTarget> {
        &self.target
    }

    /// The resolved (closed) member descriptor.
    pub fn method(&self) -> &Arc<MethodDescriptor> {
        &self.method
    }

    /// The shared argument buffer.
    pub fn args(&self) -> &ValueArray {
        &self.args
    }

    /// Read one argument slot.
    pub fn arg(&self, index: usize) -> Result<Value, InvokeError> {
        self.args.get(index)
    }

    /// Overwrite one argument slot.
    pub fn set_arg(&self, index: usize, value: Value) -> Result<(), InvokeError> {
        self.args.set(index, value)
    }

    /// Check whether a result has been produced.
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Peek at the produced result.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Produce (or replace) the call result.
    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }

    /// Take the produced result out of the context.
    pub fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }
}

/// Frozen, ordered interceptor table for one member.
///
/// Layers are stored in declaration order, innermost first; invocation
/// starts past the end so the last-declared layer runs first.
pub struct InterceptChain {
    layers: Box<[Arc<dyn Interceptor>]>,
}

impl InterceptChain {
    /// Freeze a chain from interceptors in declaration order.
    pub fn new(layers: Vec<Arc<dyn Interceptor>>) -> Self {
        InterceptChain {
            layers: layers.into_boxed_slice(),
        }
    }

    /// Number of interceptor layers (the base invoker is not counted).
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check for a chain with no interceptor layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Invoke the chain entry point, selecting the mode from the descriptor:
    /// asynchronous for `task` returns, generic for closed instantiations,
    /// synchronous otherwise.
    pub fn invoke(&self, ctx: &mut InterceptContext) -> Result<(), InvokeError> {
        let mode = if ctx.method().ret.is_task() {
            InvokeMode::Async
        } else if !ctx.method().type_args.is_empty() {
            InvokeMode::Generic
        } else {
            InvokeMode::Sync
        };
        self.invoke_with_mode(ctx, mode)
    }

    /// Invoke the chain entry point with an explicit mode.
    pub fn invoke_with_mode(
        &self,
        ctx: &mut InterceptContext,
        mode: InvokeMode,
    ) -> Result<(), InvokeError> {
        Invocation {
            chain: self,
            depth: self.layers.len(),
            mode,
        }
        .proceed(ctx)
    }
}

impl fmt::Debug for InterceptChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.name()))
            .finish()
    }
}

/// Cursor into an [`InterceptChain`]; `proceed` runs the next-inner layer.
pub struct Invocation<'c> {
    chain: &'c InterceptChain,
    depth: usize,
    mode: InvokeMode,
}

impl Invocation<'_> {
    /// The mode this chain was entered with.
    pub fn mode(&self) -> InvokeMode {
        self.mode
    }

    /// Remaining layers below this point, including the base invoker.
    pub fn remaining(&self) -> usize {
        self.depth + 1
    }

    /// Delegate inward: run the next-inner interceptor, or the base invoker
    /// when every layer has been traversed.
    pub fn proceed(&mut self, ctx: &mut InterceptContext) -> Result<(), InvokeError> {
        match self.depth {
            0 => base_invoke(ctx),
            depth => {
                let layer = &self.chain.layers[depth - 1];
                let mut inner = Invocation {
                    chain: self.chain,
                    depth: depth - 1,
                    mode: self.mode,
                };
                match self.mode {
                    InvokeMode::Sync => layer.intercept(ctx, &mut inner),
                    InvokeMode::Generic => layer.intercept_generic(ctx, &mut inner),
                    InvokeMode::Async => layer.intercept_async(ctx, &mut inner),
                }
            }
        }
    }
}

/// The base invoker: a no-op wrapper that calls through to the target and
/// records its result (discarded for `void` members).
fn base_invoke(ctx: &mut InterceptContext) -> Result<(), InvokeError> {
    let target = ctx.target().clone();
    let method = ctx.method().clone();
    let value = ctx.args().with_mut(|slots| target.invoke(&method, slots))?;
    if !method.ret.is_unit() {
        ctx.set_result(value);
    }
    Ok(())
}
