//! AST types for stylesheet source text
//!
//! `surface` is what the parser produces; the evaluator walks it directly and
//! issues builder calls.

pub mod surface;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg<E> {
    Positional(E),
    Keyword(String, E),
}

impl<E> Arg<E> {
    pub fn pos(expr: E) -> Self {
        Arg::Positional(expr)
    }

    pub fn kw(name: impl Into<String>, expr: E) -> Self {
        Arg::Keyword(name.into(), expr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
