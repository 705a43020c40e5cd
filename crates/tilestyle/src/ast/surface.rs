//! Surface AST: statements and expressions as written

use super::{Arg, BinOp, Literal, UnaryOp};

pub type SurfaceArg = Arg<Expr>;

/// `name args? { block }?`
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub name: String,
    pub args: Vec<SurfaceArg>,
    pub block: Option<Vec<Stmt>>,
}

impl Stmt {
    pub fn new(name: impl Into<String>, args: Vec<SurfaceArg>) -> Self {
        Self {
            name: name.into(),
            args,
            block: None,
        }
    }

    pub fn with_block(mut self, block: Vec<Stmt>) -> Self {
        self.block = Some(block);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare identifier: `highway`, `zoom`
    Ident(String),

    /// Literal value; `:name` symbols parse as strings
    Literal(Literal),

    /// List expression: `["a", "b", "c"]`
    List(Vec<Expr>),

    /// Zoom range: `1..5`, `1..`, `..5`
    Range(Option<Box<Expr>>, Option<Box<Expr>>),

    /// Named call: `match(highway, ...)`
    Call(String, Vec<SurfaceArg>),

    /// Method call: `expr.name(args...)`, or `expr.name` with no arguments
    Method(Box<Expr>, String, Vec<SurfaceArg>),

    /// Bracket postfix: `expr[i]`, `any[a, b]`
    Index(Box<Expr>, Vec<Expr>),

    /// Binary operation: `a + b`, `a == b`
    BinaryOp(Box<Expr>, BinOp, Box<Expr>),

    /// Unary operation: `-x`, `!x`
    UnaryOp(UnaryOp, Box<Expr>),
}

impl Expr {
    pub fn method(self, name: impl Into<String>, args: Vec<SurfaceArg>) -> Self {
        Expr::Method(Box::new(self), name.into(), args)
    }

    pub fn binop(self, op: BinOp, rhs: Expr) -> Self {
        Expr::BinaryOp(Box::new(self), op, Box::new(rhs))
    }
}
