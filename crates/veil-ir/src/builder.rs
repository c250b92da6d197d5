//! Builder for lowered method bodies

use crate::{Block, Body, Case, Expr, LocalId, Place, Stmt};

/// Accumulates statements and allocates local slots for one method body.
#[derive(Debug, Default)]
pub struct BodyBuilder {
    locals: u16,
    stmts: Vec<Stmt>,
}

impl BodyBuilder {
    /// Start an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh local slot.
    pub fn local(&mut self) -> LocalId {
        let id = self.locals;
        self.locals += 1;
        id
    }

    /// Append an expression statement.
    pub fn stmt(&mut self, expr: Expr) -> &mut Self {
        self.stmts.push(Stmt::Expr(expr));
        self
    }

    /// Append an already-built statement.
    pub fn push(&mut self, stmt: Stmt) -> &mut Self {
        self.stmts.push(stmt);
        self
    }

    /// Append an assignment to a local slot.
    pub fn assign_local(&mut self, local: LocalId, value: Expr) -> &mut Self {
        self.stmt(Expr::assign(Place::Local(local), value))
    }

    /// Append an assignment to an arbitrary place.
    pub fn assign(&mut self, place: Place, value: Expr) -> &mut Self {
        self.stmt(Expr::assign(place, value))
    }

    /// Append a `switch` statement.
    pub fn switch(&mut self, scrutinee: Expr, cases: Vec<Case>, default: Block) -> &mut Self {
        self.stmts.push(Stmt::Switch {
            scrutinee,
            cases: cases.into_boxed_slice(),
            default,
        });
        self
    }

    /// Append a `try`/`finally` statement.
    pub fn try_finally(&mut self, body: Block, cleanup: Block) -> &mut Self {
        self.stmts.push(Stmt::TryFinally { body, cleanup });
        self
    }

    /// Append a `return` statement.
    pub fn ret(&mut self, value: Option<Expr>) -> &mut Self {
        self.stmts.push(Stmt::Return(value));
        self
    }

    /// Finish the body.
    pub fn build(self) -> Body {
        Body {
            locals: self.locals,
            block: Block::new(self.stmts),
        }
    }
}
