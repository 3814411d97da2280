//! The statement and expression surface of function bodies.

use serde::{Deserialize, Serialize};

use super::{FuncId, Param, Span, TypeId, TypeRef};

/// A statement. Statement order is load-bearing: shadow tracking in the usage
/// analyzer depends on lexical order being preserved by the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    /// A binding: declaration or reassignment of a single name.
    Bind(Bind),
    /// A bare expression statement.
    Expr(Expr),
    /// A direct concurrency launch of the call (`go f(...)`).
    Spawn(Call),
    /// A deferred call.
    Defer(Call),
    Return(Vec<Expr>),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        #[serde(default)]
        then: Vec<Stmt>,
        #[serde(default, rename = "else")]
        els: Vec<Stmt>,
    },
    Loop {
        #[serde(default)]
        body: Vec<Stmt>,
    },
}

/// A single-name binding with the front-end-resolved type of the bound value.
/// A missing type means the front-end could not resolve it; such a binding is
/// treated as not context-like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bind {
    pub name: String,
    #[serde(default, rename = "type")]
    pub ty: Option<TypeRef>,
    #[serde(default)]
    pub value: Option<Expr>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Ident(String),
    Lit(String),
    Call(Call),
    Closure(Closure),
    Field {
        base: Box<Expr>,
        name: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// Composite literal elements (struct, slice, map values).
    Composite(Vec<Expr>),
    Unknown,
}

/// A call expression with a resolved callee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub callee: Callee,
    #[serde(default)]
    pub args: Vec<Expr>,
    pub span: Span,
}

/// The callee of a call, as resolved by the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    /// A top-level function. The path is empty for unit-local functions.
    Func(FuncId),
    /// A method on a named receiver type (pointer receivers are unwrapped by
    /// the front-end).
    Method { recv: TypeId, name: String },
    /// A function literal invoked in place.
    Closure(Closure),
    /// A function value: parameter, variable, field, element. Opaque to the
    /// engine; never flagged.
    Value(Box<Expr>),
}

/// A function literal. Its body is a separate scope analyzed independently of
/// the enclosing declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    pub span: Span,
}
