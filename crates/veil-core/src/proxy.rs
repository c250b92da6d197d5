//! Proxy activation and dispatch
//!
//! A [`Proxy`] pairs a synthesized type with a target source. Passthrough
//! and inherited members dispatch straight to the target on the caller's
//! argument slots (no buffer is allocated); intercepted members run their
//! lowered body in a fresh evaluation frame. Missing trailing arguments are
//! padded from declared default literals before dispatch.

use std::sync::Arc;

use veil_model::{InvokeError, MethodDescriptor, ProxyTarget, TypeRef, Value};

use crate::eval::{run, Frame};
use crate::synth::{MethodBody, SynthesizedType};

/// Produces a target instance per call for provider-backed proxies.
pub type TargetProvider =
    Arc<dyn Fn() -> Result<Arc<dyn ProxyTarget>, InvokeError> + Send + Sync>;

enum TargetSource {
    Fixed(Arc<dyn ProxyTarget>),
    Provided(TargetProvider),
}

/// An activated proxy instance.
pub struct Proxy {
    ty: Arc<SynthesizedType>,
    source: TargetSource,
}

impl Proxy {
    pub(crate) fn over(ty: Arc<SynthesizedType>, target: Arc<dyn ProxyTarget>) -> Self {
        Proxy {
            ty,
            source: TargetSource::Fixed(target),
        }
    }

    pub(crate) fn from_provider(ty: Arc<SynthesizedType>, provider: TargetProvider) -> Self {
        Proxy {
            ty,
            source: TargetSource::Provided(provider),
        }
    }

    /// The synthesized type backing this proxy.
    pub fn synthesized(&self) -> &Arc<SynthesizedType> {
        &self.ty
    }

    /// Invoke a non-generic member. Missing trailing arguments with declared
    /// defaults are padded; by-ref slots are written back into `args`.
    pub fn call(&self, method: &str, args: &mut Vec<Value>) -> Result<Value, InvokeError> {
        self.call_generic(method, &[], args)
    }

    /// Invoke a member, closing generic parameters over `type_args`.
    pub fn call_generic(
        &self,
        method: &str,
        type_args: &[TypeRef],
        args: &mut Vec<Value>,
    ) -> Result<Value, InvokeError> {
        if let Some(site) = self.ty.site(method) {
            let params = &site.open().params;
            while args.len() < params.len() {
                match &params[args.len()].default {
                    Some(default) => args.push(Value::from(default)),
                    None => break,
                }
            }
        }
        self.dispatch(method, type_args, args.as_mut_slice())
    }

    fn dispatch(
        &self,
        method: &str,
        type_args: &[TypeRef],
        args: &mut [Value],
    ) -> Result<Value, InvokeError> {
        let site = self.ty.site(method).ok_or_else(|| InvokeError::UnknownMethod {
            name: method.to_string(),
        })?;
        let open = site.open();
        if type_args.len() != open.generics.len() {
            return Err(InvokeError::TypeArgs {
                method: open.qualified_name(),
                expected: open.generics.len(),
                actual: type_args.len(),
            });
        }
        if args.len() != open.arity() {
            return Err(InvokeError::ArityMismatch {
                method: open.qualified_name(),
                expected: open.arity(),
                actual: args.len(),
            });
        }

        let target = self.resolve_target()?;
        match site.body() {
            MethodBody::Passthrough | MethodBody::Inherited => {
                let descriptor = match site.resolved() {
                    Some(resolved) => resolved.clone(),
                    None => open.close(type_args)?,
                };
                target.invoke(&descriptor, args)
            }
            MethodBody::Lowered { ir, .. } => {
                let mut frame = Frame::new(&target, site, type_args, args);
                run(ir, &mut frame)
            }
        }
    }

    fn resolve_target(&self) -> Result<Arc<dyn ProxyTarget>, InvokeError> {
        match &self.source {
            TargetSource::Fixed(target) => Ok(target.clone()),
            TargetSource::Provided(provider) => provider(),
        }
    }
}

/// Proxies are themselves valid targets, so they can be layered.
impl ProxyTarget for Proxy {
    fn type_name(&self) -> &str {
        self.ty.name()
    }

    fn invoke(&self, method: &MethodDescriptor, args: &mut [Value]) -> Result<Value, InvokeError> {
        self.dispatch(&method.name, &method.type_args, args)
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &self.ty.name())
            .field(
                "source",
                &match self.source {
                    TargetSource::Fixed(_) => "instance",
                    TargetSource::Provided(_) => "provider",
                },
            )
            .finish()
    }
}
