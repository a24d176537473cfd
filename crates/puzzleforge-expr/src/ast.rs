//! Expression syntax tree.

use std::sync::Arc;

use crate::template::Template;
use crate::value::Value;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(Arc<str>),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Set(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Short-circuiting `and` / `or` chain.
    Logical(LogicalOp, Vec<Expr>),
    /// Chained comparison `a < b <= c`.
    Compare(Box<Expr>, Vec<(CmpKind, Expr)>),
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call(Box<Expr>, Vec<Arg>),
    Attribute(Box<Expr>, Arc<str>),
    Subscript(Box<Expr>, Box<Index>),
    Lambda(Arc<LambdaDef>),
    Comprehension(Box<Comprehension>),
    FString(Template),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(Arc<str>, Expr),
    /// `*iterable`
    Star(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Item(Expr),
    Slice {
        lower: Option<Expr>,
        upper: Option<Expr>,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Arc<str>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaDef {
    pub params: Vec<Param>,
    pub body: Expr,
}

/// Assignment target of a `for` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(Arc<str>),
    Tuple(Vec<Target>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    For(Target, Expr),
    If(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompKind {
    List,
    Generator,
    Set,
    Dict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub kind: CompKind,
    pub element: Expr,
    /// Value expression of a dict comprehension.
    pub value: Option<Expr>,
    pub clauses: Vec<Clause>,
}

impl Expr {
    pub fn name(name: &str) -> Self {
        Expr::Name(Arc::from(name))
    }

    /// True for `_sym`-style bare identifiers.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name(n) => Some(n),
            _ => None,
        }
    }
}
