//! # veil-ir
//!
//! A small instruction-level intermediate representation for describing a
//! synthesized method body before lowering. The IR is the only language the
//! type synthesizer emits and a backend consumes; it is deliberately
//! backend-agnostic so an interpreted-dispatch backend and a compiled
//! backend can share the same front end.
//!
//! The node set is fixed: constants, argument/local variables, assignment,
//! intrinsic calls, object construction, type conversion, array
//! construction and indexing, binary comparisons, conditional (ternary),
//! `switch`/`case` with isolated blocks and an explicit default, and
//! `try`/`finally`.

use std::fmt;
use std::sync::Arc;

use veil_model::{Literal, TypeRef};

mod builder;

pub use builder::BodyBuilder;

/// Index of a local variable slot within a body frame.
pub type LocalId = u16;

/// Runtime operations a synthesized body may call into.
///
/// The backend supplies the implementation; the IR only names the
/// operation, keeping the front end independent of the execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// Load the member's pre-resolved descriptor from its static slot.
    ResolveMethod,
    /// Reconstruct the closed descriptor from the open one and the
    /// call-site type arguments.
    CloseMethod,
    /// Build the interception context from (target, resolved descriptor,
    /// argument buffer) and invoke the chain entry point.
    InvokeChain,
    /// Asynchronous variant of [`Intrinsic::InvokeChain`]; yields the outer
    /// result handle, with result conversion resumed on continuation.
    InvokeChainAsync,
    /// Whether the completed chain produced a result.
    HasResult,
    /// Take the chain result out of the completed context.
    TakeResult,
    /// Resolve an absent chain result: raises `MissingInterceptorContract`
    /// for a non-nullable value-kind return, yields `null` otherwise.
    RaiseMissingResult,
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// An assignable location.
#[derive(Debug, Clone)]
pub enum Place {
    /// Local variable slot.
    Local(LocalId),
    /// Caller argument slot; writing here is how by-ref copy-back reaches
    /// the caller.
    Arg(u16),
    /// Element of an array value.
    Index {
        /// The array expression.
        array: Box<Expr>,
        /// The element index expression.
        index: Box<Expr>,
    },
}

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Literal constant.
    Const(Literal),
    /// Read a local variable slot.
    Local(LocalId),
    /// Read a caller argument slot.
    Arg(u16),
    /// Write a place; yields unit.
    Assign {
        /// Destination.
        place: Place,
        /// Value to store.
        value: Box<Expr>,
    },
    /// Call a runtime intrinsic.
    Call {
        /// The operation.
        intrinsic: Intrinsic,
        /// Operand expressions.
        args: Box<[Expr]>,
    },
    /// Construct a registered object by class name.
    NewObject {
        /// Class name.
        class: Arc<str>,
        /// Constructor arguments.
        args: Box<[Expr]>,
    },
    /// Checked conversion into a declared type.
    Convert {
        /// Value to convert.
        value: Box<Expr>,
        /// Target type.
        to: TypeRef,
    },
    /// Allocate a fixed-length array of null slots.
    NewArray {
        /// Length expression (i32).
        len: Box<Expr>,
    },
    /// Read an array element.
    Index {
        /// The array expression.
        array: Box<Expr>,
        /// The element index expression.
        index: Box<Expr>,
    },
    /// Binary comparison; yields bool.
    Binary {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Ternary conditional.
    Conditional {
        /// Bool condition.
        condition: Box<Expr>,
        /// Evaluated when true.
        then: Box<Expr>,
        /// Evaluated when false.
        else_: Box<Expr>,
    },
}

impl Expr {
    /// i32 constant.
    pub fn i32(value: i32) -> Self {
        Expr::Const(Literal::I32(value))
    }

    /// Bool constant.
    pub fn bool(value: bool) -> Self {
        Expr::Const(Literal::Bool(value))
    }

    /// Null constant.
    pub fn null() -> Self {
        Expr::Const(Literal::Null)
    }

    /// Intrinsic call.
    pub fn call(intrinsic: Intrinsic, args: impl Into<Box<[Expr]>>) -> Self {
        Expr::Call {
            intrinsic,
            args: args.into(),
        }
    }

    /// Assignment to a place.
    pub fn assign(place: Place, value: Expr) -> Self {
        Expr::Assign {
            place,
            value: Box::new(value),
        }
    }

    /// Checked conversion.
    pub fn convert(value: Expr, to: TypeRef) -> Self {
        Expr::Convert {
            value: Box::new(value),
            to,
        }
    }

    /// Array element read.
    pub fn index(array: Expr, index: Expr) -> Self {
        Expr::Index {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    /// Binary comparison.
    pub fn binary(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Ternary conditional.
    pub fn conditional(condition: Expr, then: Expr, else_: Expr) -> Self {
        Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            else_: Box::new(else_),
        }
    }
}

/// A sequence of statements.
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// The statements, in order.
    pub stmts: Vec<Stmt>,
}

impl Block {
    /// Block from statements.
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }

    /// The empty block (explicit no-op default of a `switch`).
    pub fn empty() -> Self {
        Block { stmts: Vec::new() }
    }
}

/// One `case` arm of a `switch`: an isolated block guarded by a literal
/// matcher. There is no fallthrough between arms.
#[derive(Debug, Clone)]
pub struct Case {
    /// Literal the scrutinee is compared against.
    pub matcher: Literal,
    /// Arm body.
    pub block: Block,
}

impl Case {
    /// Case arm.
    pub fn new(matcher: Literal, block: Block) -> Self {
        Case { matcher, block }
    }
}

/// A statement node.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Evaluate an expression for its effect.
    Expr(Expr),
    /// Multi-way branch; the matched arm runs alone, an unmatched value
    /// runs the explicit default block.
    Switch {
        /// Value being matched.
        scrutinee: Expr,
        /// Case arms.
        cases: Box<[Case]>,
        /// Explicit default (possibly empty).
        default: Block,
    },
    /// Guaranteed-execution block: `cleanup` runs on both normal and
    /// faulted exits of `body`.
    TryFinally {
        /// Protected block.
        body: Block,
        /// Cleanup block; always runs.
        cleanup: Block,
    },
    /// Leave the body, optionally with a value.
    Return(Option<Expr>),
}

/// A complete lowered method body.
#[derive(Debug, Clone)]
pub struct Body {
    /// Number of local variable slots the frame allocates.
    pub locals: u16,
    /// The statements.
    pub block: Block,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_helpers() {
        let expr = Expr::conditional(
            Expr::binary(CmpOp::Gt, Expr::Arg(0), Expr::i32(0)),
            Expr::bool(true),
            Expr::bool(false),
        );
        let Expr::Conditional { condition, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*condition, Expr::Binary { op: CmpOp::Gt, .. }));
    }

    #[test]
    fn test_call_helper() {
        let call = Expr::call(Intrinsic::HasResult, []);
        let Expr::Call { intrinsic, args } = call else {
            panic!("expected call");
        };
        assert_eq!(intrinsic, Intrinsic::HasResult);
        assert!(args.is_empty());
    }
}
