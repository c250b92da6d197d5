//! Asynchronous members: continuation-based result conversion, the
//! asynchronous interceptor hook, and short-circuit behavior.

use std::sync::Arc;

use veil_core::{InterceptionConfig, ProxyFactory, Proxy};
use veil_model::{
    CapabilitySet, InterceptContext, Interceptor, Invocation, InvokeError, MethodDescriptor,
    MethodSig, ProxyTarget, TaskHandle, TypeRef, Value,
};

struct Fetcher {
    handle: TaskHandle,
}

impl ProxyTarget for Fetcher {
    fn type_name(&self) -> &str {
        "Fetcher"
    }

    fn invoke(
        &self,
        _method: &MethodDescriptor,
        _args: &mut [Value],
    ) -> Result<Value, InvokeError> {
        Ok(Value::Task(self.handle.clone()))
    }
}

struct Tag;

impl Interceptor for Tag {
    fn name(&self) -> &str {
        "tag"
    }

    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        next.proceed(ctx)
    }
}

/// Post-processes the completed value on continuation, asynchronous hook
/// only.
struct AddOne;

impl Interceptor for AddOne {
    fn name(&self) -> &str {
        "add-one"
    }

    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        next.proceed(ctx)
    }

    fn intercept_async(
        &self,
        ctx: &mut InterceptContext,
        next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        next.proceed(ctx)?;
        if let Some(Value::Task(handle)) = ctx.take_result() {
            ctx.set_result(Value::Task(handle.then(|result| {
                result.map(|value| match value {
                    Value::I32(n) => Value::I32(n + 1),
                    other => other,
                })
            })));
        }
        Ok(())
    }
}

/// Writes the by-ref slot before handing out its pending handle.
struct Stamper {
    handle: TaskHandle,
}

impl ProxyTarget for Stamper {
    fn type_name(&self) -> &str {
        "Stamper"
    }

    fn invoke(
        &self,
        _method: &MethodDescriptor,
        args: &mut [Value],
    ) -> Result<Value, InvokeError> {
        if let Some(slot) = args.first_mut() {
            *slot = Value::I32(99);
        }
        Ok(Value::Task(self.handle.clone()))
    }
}

/// Replaces the asynchronous result with a plain value.
struct Immediate;

impl Interceptor for Immediate {
    fn name(&self) -> &str {
        "immediate"
    }

    fn intercept(
        &self,
        ctx: &mut InterceptContext,
        _next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        ctx.set_result(Value::I32(9));
        Ok(())
    }
}

/// Neither proceeds nor produces a result.
struct Swallow;

impl Interceptor for Swallow {
    fn name(&self) -> &str {
        "swallow"
    }

    fn intercept(
        &self,
        _ctx: &mut InterceptContext,
        _next: &mut Invocation<'_>,
    ) -> Result<(), InvokeError> {
        Ok(())
    }
}

fn fetch_proxy(handle: &TaskHandle, hook: Arc<dyn Interceptor>) -> Proxy {
    let set = CapabilitySet::builder("IFetch")
        .method(
            MethodSig::new("fetch")
                .param(TypeRef::I32)
                .returns(TypeRef::task(TypeRef::I32))
                .marker(hook),
        )
        .build();
    ProxyFactory::new()
        .proxy_over(
            &set,
            &InterceptionConfig::default(),
            Arc::new(Fetcher {
                handle: handle.clone(),
            }),
        )
        .unwrap()
}

fn call_fetch(proxy: &Proxy) -> TaskHandle {
    let Ok(Value::Task(outer)) = proxy.call("fetch", &mut vec![Value::I32(1)]) else {
        panic!("expected a task result");
    };
    outer
}

#[test]
fn test_result_converted_on_continuation() {
    let handle = TaskHandle::pending();
    let proxy = fetch_proxy(&handle, Arc::new(Tag));

    let outer = call_fetch(&proxy);
    // The call returned without blocking on the pending handle.
    assert!(!outer.is_done());

    handle.resolve(Ok(Value::I32(41)));
    assert_eq!(outer.wait(), Ok(Value::I32(41)));
}

#[test]
fn test_conversion_failure_surfaces_on_the_handle() {
    let handle = TaskHandle::pending();
    let proxy = fetch_proxy(&handle, Arc::new(Tag));

    let outer = call_fetch(&proxy);
    handle.resolve(Ok(Value::str("not an i32")));
    assert!(matches!(outer.wait(), Err(InvokeError::CastFailed { .. })));
}

#[test]
fn test_failure_propagates_unmodified() {
    let handle = TaskHandle::pending();
    let proxy = fetch_proxy(&handle, Arc::new(Tag));

    let outer = call_fetch(&proxy);
    handle.resolve(Err(InvokeError::raised("backend down")));
    assert_eq!(outer.wait(), Err(InvokeError::raised("backend down")));
}

#[test]
fn test_async_hook_post_processes() {
    let handle = TaskHandle::pending();
    let proxy = fetch_proxy(&handle, Arc::new(AddOne));

    let outer = call_fetch(&proxy);
    handle.resolve(Ok(Value::I32(10)));
    assert_eq!(outer.wait(), Ok(Value::I32(11)));
}

#[test]
fn test_plain_value_result_wrapped_as_completed_task() {
    let handle = TaskHandle::pending();
    let proxy = fetch_proxy(&handle, Arc::new(Immediate));

    let outer = call_fetch(&proxy);
    // The interceptor short-circuited; the target's handle is untouched.
    assert!(outer.is_done());
    assert!(!handle.is_done());
    assert_eq!(outer.wait(), Ok(Value::I32(9)));
}

#[test]
fn test_by_ref_copied_back_before_completion() {
    let handle = TaskHandle::pending();
    let set = CapabilitySet::builder("IStamp")
        .method(
            MethodSig::new("fetch")
                .by_ref_param(TypeRef::I32)
                .returns(TypeRef::task(TypeRef::I32))
                .marker(Arc::new(Tag)),
        )
        .build();
    let proxy = ProxyFactory::new()
        .proxy_over(
            &set,
            &InterceptionConfig::default(),
            Arc::new(Stamper {
                handle: handle.clone(),
            }),
        )
        .unwrap();

    let mut args = vec![Value::I32(1)];
    let Ok(Value::Task(outer)) = proxy.call("fetch", &mut args) else {
        panic!("expected a task result");
    };

    // Hooks ran on the caller's stack, so the slot is copied back when the
    // call returns, not when the handle completes.
    assert!(!outer.is_done());
    assert_eq!(args, vec![Value::I32(99)]);

    handle.resolve(Ok(Value::I32(7)));
    assert_eq!(outer.wait(), Ok(Value::I32(7)));
}

#[test]
fn test_absent_async_result_is_null() {
    let handle = TaskHandle::pending();
    let proxy = fetch_proxy(&handle, Arc::new(Swallow));

    assert_eq!(
        proxy.call("fetch", &mut vec![Value::I32(1)]),
        Ok(Value::Null)
    );
}
