//! Per-call IR evaluation
//!
//! Lowered bodies run against a fresh [`Frame`] per call; nothing is shared
//! between concurrent invocations beyond the frozen site table. The frame
//! owns the local slots and borrows the caller's argument slots, which is
//! how by-ref copy-back reaches the caller.

use std::cmp::Ordering;
use std::sync::Arc;

use veil_ir::{Block, Body, CmpOp, Expr, Intrinsic, Place, Stmt};
use veil_model::{
    InterceptContext, InvokeError, MethodDescriptor, ProxyTarget, TaskHandle, TypeRef, Value,
    ValueArray,
};

use crate::synth::{MethodBody, MethodSite};

/// Pluggable constructor registry consulted by object-construction nodes.
pub trait ObjectFactory: Send + Sync {
    /// Construct an instance of `class` from evaluated arguments.
    fn construct(&self, class: &str, args: &mut [Value]) -> Result<Value, InvokeError>;
}

/// Evaluation state for one call of one lowered body.
pub struct Frame<'a> {
    target: &'a Arc<dyn ProxyTarget>,
    site: &'a MethodSite,
    type_args: &'a [TypeRef],
    args: &'a mut [Value],
    locals: Vec<Value>,
    resolved: Option<Arc<MethodDescriptor>>,
    completed: Option<InterceptContext>,
    factory: Option<&'a dyn ObjectFactory>,
}

impl<'a> Frame<'a> {
    /// Frame over the caller's argument slots.
    pub fn new(
        target: &'a Arc<dyn ProxyTarget>,
        site: &'a MethodSite,
        type_args: &'a [TypeRef],
        args: &'a mut [Value],
    ) -> Self {
        Frame {
            target,
            site,
            type_args,
            args,
            locals: Vec::new(),
            resolved: None,
            completed: None,
            factory: None,
        }
    }

    /// Attach a constructor registry for object-construction nodes.
    pub fn with_factory(mut self, factory: &'a dyn ObjectFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    fn local(&self, id: u16) -> Result<Value, InvokeError> {
        self.locals
            .get(id as usize)
            .cloned()
            .ok_or(InvokeError::BufferIndex {
                index: id as usize,
                len: self.locals.len(),
            })
    }

    fn set_local(&mut self, id: u16, value: Value) -> Result<(), InvokeError> {
        let len = self.locals.len();
        match self.locals.get_mut(id as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InvokeError::BufferIndex {
                index: id as usize,
                len,
            }),
        }
    }

    fn arg(&self, position: u16) -> Result<Value, InvokeError> {
        self.args
            .get(position as usize)
            .cloned()
            .ok_or(InvokeError::BufferIndex {
                index: position as usize,
                len: self.args.len(),
            })
    }

    fn set_arg(&mut self, position: u16, value: Value) -> Result<(), InvokeError> {
        let len = self.args.len();
        match self.args.get_mut(position as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InvokeError::BufferIndex {
                index: position as usize,
                len,
            }),
        }
    }

    /// Substitute open generic parameters with the call-site type arguments.
    fn close_type(&self, ty: &TypeRef) -> Result<TypeRef, InvokeError> {
        if ty.is_open() {
            Ok(ty.substitute(self.type_args)?)
        } else {
            Ok(ty.clone())
        }
    }

    fn resolved(&self) -> Result<Arc<MethodDescriptor>, InvokeError> {
        self.resolved.clone().ok_or_else(|| {
            InvokeError::raised(format!(
                "descriptor for `{}` used before resolution",
                self.site.open().qualified_name()
            ))
        })
    }

    fn invoke_chain(&mut self, buffer: ValueArray) -> Result<InterceptContext, InvokeError> {
        let resolved = self.resolved()?;
        let chain = match self.site.body() {
            MethodBody::Lowered { chain, .. } => chain.clone(),
            _ => {
                return Err(InvokeError::raised(format!(
                    "`{}` has no interception chain",
                    resolved.qualified_name()
                )))
            }
        };
        let mut ctx = InterceptContext::new(self.target.clone(), resolved, buffer)?;
        chain.invoke(&mut ctx)?;
        Ok(ctx)
    }
}

enum Flow {
    Normal,
    Return(Value),
}

/// Execute a lowered body to completion.
pub fn run(body: &Body, frame: &mut Frame<'_>) -> Result<Value, InvokeError> {
    frame.locals = vec![Value::Null; body.locals as usize];
    match eval_block(&body.block, frame)? {
        Flow::Return(value) => Ok(value),
        Flow::Normal => Ok(Value::Unit),
    }
}

fn eval_block(block: &Block, frame: &mut Frame<'_>) -> Result<Flow, InvokeError> {
    for stmt in &block.stmts {
        match eval_stmt(stmt, frame)? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn eval_stmt(stmt: &Stmt, frame: &mut Frame<'_>) -> Result<Flow, InvokeError> {
    match stmt {
        Stmt::Expr(expr) => {
            eval_expr(expr, frame)?;
            Ok(Flow::Normal)
        }
        Stmt::Return(None) => Ok(Flow::Return(Value::Unit)),
        Stmt::Return(Some(expr)) => Ok(Flow::Return(eval_expr(expr, frame)?)),
        Stmt::Switch {
            scrutinee,
            cases,
            default,
        } => {
            let value = eval_expr(scrutinee, frame)?;
            for case in cases.iter() {
                if value == Value::from(&case.matcher) {
                    return eval_block(&case.block, frame);
                }
            }
            eval_block(default, frame)
        }
        Stmt::TryFinally { body, cleanup } => {
            // Cleanup runs on both exits; the protected block's outcome wins.
            let outcome = eval_block(body, frame);
            let cleanup_outcome = eval_block(cleanup, frame);
            match outcome {
                Err(error) => Err(error),
                Ok(flow) => cleanup_outcome.map(|_| flow),
            }
        }
    }
}

fn eval_expr(expr: &Expr, frame: &mut Frame<'_>) -> Result<Value, InvokeError> {
    match expr {
        Expr::Const(literal) => Ok(Value::from(literal)),
        Expr::Local(id) => frame.local(*id),
        Expr::Arg(position) => frame.arg(*position),
        Expr::Assign { place, value } => {
            let value = eval_expr(value, frame)?;
            assign(place, value, frame)?;
            Ok(Value::Unit)
        }
        Expr::Call { intrinsic, args } => eval_intrinsic(*intrinsic, args, frame),
        Expr::NewObject { class, args } => {
            let mut argv = args
                .iter()
                .map(|arg| eval_expr(arg, frame))
                .collect::<Result<Vec<_>, _>>()?;
            match frame.factory {
                Some(factory) => factory.construct(class, &mut argv),
                None => Err(InvokeError::raised(format!(
                    "no object factory registered for `{class}`"
                ))),
            }
        }
        Expr::Convert { value, to } => {
            let value = eval_expr(value, frame)?;
            let to = frame.close_type(to)?;
            value.convert_to(&to)
        }
        Expr::NewArray { len } => {
            let len = expect_i32(eval_expr(len, frame)?)?;
            Ok(Value::Array(ValueArray::new(len as usize)))
        }
        Expr::Index { array, index } => {
            let array = expect_array(eval_expr(array, frame)?)?;
            let index = expect_i32(eval_expr(index, frame)?)?;
            array.get(index as usize)
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval_expr(lhs, frame)?;
            let rhs = eval_expr(rhs, frame)?;
            compare(*op, &lhs, &rhs)
        }
        Expr::Conditional {
            condition,
            then,
            else_,
        } => {
            if expect_bool(eval_expr(condition, frame)?)? {
                eval_expr(then, frame)
            } else {
                eval_expr(else_, frame)
            }
        }
    }
}

fn assign(place: &Place, value: Value, frame: &mut Frame<'_>) -> Result<(), InvokeError> {
    match place {
        Place::Local(id) => frame.set_local(*id, value),
        Place::Arg(position) => frame.set_arg(*position, value),
        Place::Index { array, index } => {
            let array = expect_array(eval_expr(array, frame)?)?;
            let index = expect_i32(eval_expr(index, frame)?)?;
            array.set(index as usize, value)
        }
    }
}

fn eval_intrinsic(
    intrinsic: Intrinsic,
    args: &[Expr],
    frame: &mut Frame<'_>,
) -> Result<Value, InvokeError> {
    match intrinsic {
        Intrinsic::ResolveMethod => {
            let open = frame.site.open();
            let resolved = frame.site.resolved().cloned().ok_or_else(|| {
                InvokeError::TypeArgs {
                    method: open.qualified_name(),
                    expected: open.generics.len(),
                    actual: frame.type_args.len(),
                }
            })?;
            frame.resolved = Some(resolved);
            Ok(Value::Unit)
        }
        Intrinsic::CloseMethod => {
            let closed = frame.site.open().close(frame.type_args)?;
            frame.resolved = Some(closed);
            Ok(Value::Unit)
        }
        Intrinsic::InvokeChain => {
            let buffer = expect_array(eval_single(args, frame)?)?;
            let ctx = frame.invoke_chain(buffer)?;
            frame.completed = Some(ctx);
            Ok(Value::Unit)
        }
        Intrinsic::InvokeChainAsync => {
            let buffer = expect_array(eval_single(args, frame)?)?;
            let mut ctx = frame.invoke_chain(buffer)?;
            let resolved = frame.resolved()?;
            let inner = resolved.ret.task_inner().cloned().unwrap_or(TypeRef::Unit);
            // Result conversion resumes on continuation, not on this stack.
            let outer = match ctx.take_result() {
                Some(Value::Task(handle)) => Value::Task(
                    handle.then(move |result| result.and_then(|value| value.convert_to(&inner))),
                ),
                Some(value) => Value::Task(TaskHandle::resolved(value.convert_to(&inner)?)),
                None => Value::Null,
            };
            frame.completed = Some(ctx);
            Ok(outer)
        }
        Intrinsic::HasResult => Ok(Value::Bool(
            frame.completed.as_ref().is_some_and(|ctx| ctx.has_result()),
        )),
        Intrinsic::TakeResult => Ok(frame
            .completed
            .as_mut()
            .and_then(|ctx| ctx.take_result())
            .unwrap_or(Value::Null)),
        Intrinsic::RaiseMissingResult => {
            let resolved = frame.resolved()?;
            if resolved.ret.is_value_kind() && !resolved.ret.is_nullable() {
                Err(InvokeError::MissingInterceptorContract {
                    method: resolved.qualified_name(),
                })
            } else {
                Ok(Value::Null)
            }
        }
    }
}

fn eval_single(args: &[Expr], frame: &mut Frame<'_>) -> Result<Value, InvokeError> {
    match args.first() {
        Some(expr) => eval_expr(expr, frame),
        None => Ok(Value::Unit),
    }
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<Value, InvokeError> {
    let result = match op {
        CmpOp::Eq => lhs == rhs,
        CmpOp::Ne => lhs != rhs,
        CmpOp::Lt => ordered(lhs, rhs)?.is_some_and(Ordering::is_lt),
        CmpOp::Le => ordered(lhs, rhs)?.is_some_and(Ordering::is_le),
        CmpOp::Gt => ordered(lhs, rhs)?.is_some_and(Ordering::is_gt),
        CmpOp::Ge => ordered(lhs, rhs)?.is_some_and(Ordering::is_ge),
    };
    Ok(Value::Bool(result))
}

fn expect_bool(value: Value) -> Result<bool, InvokeError> {
    match value {
        Value::Bool(v) => Ok(v),
        other => Err(InvokeError::CastFailed {
            expected: "bool".to_string(),
            actual: other.kind_name().to_string(),
        }),
    }
}

fn expect_i32(value: Value) -> Result<i32, InvokeError> {
    match value {
        Value::I32(v) => Ok(v),
        other => Err(InvokeError::CastFailed {
            expected: "i32".to_string(),
            actual: other.kind_name().to_string(),
        }),
    }
}

fn expect_array(value: Value) -> Result<ValueArray, InvokeError> {
    match value {
        Value::Array(v) => Ok(v),
        other => Err(InvokeError::CastFailed {
            expected: "array".to_string(),
            actual: other.kind_name().to_string(),
        }),
    }
}

/// Same-kind ordering; `None` only for incomparable floats.
fn ordered(lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, InvokeError> {
    match (lhs, rhs) {
        (Value::I32(a), Value::I32(b)) => Ok(Some(a.cmp(b))),
        (Value::I64(a), Value::I64(b)) => Ok(Some(a.cmp(b))),
        (Value::F64(a), Value::F64(b)) => Ok(a.partial_cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(Some(a.cmp(b))),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => Err(InvokeError::CastFailed {
            expected: lhs.kind_name().to_string(),
            actual: rhs.kind_name().to_string(),
        }),
    }
}
