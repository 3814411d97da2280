//! Facts extracted from source code by an external front-end.
//!
//! The engine never parses source text itself. A language front-end (parser
//! plus type resolver) emits one JSON facts file per compilation unit with
//! resolved parameter and binding types, call structure with resolved callee
//! identities, closure literals, and raw comment tokens. This module defines
//! that serde contract:
//!
//! - `decl`: units, declarations, parameters, spans, type/function identities
//! - `expr`: the statement and expression surface of function bodies

mod decl;
mod expr;

pub use decl::{
    CommentToken, FuncId, FuncSig, FunctionDecl, Param, Span, TypeId, TypeRef, UnitFacts,
};
pub use expr::{Bind, Call, Callee, Closure, Expr, Stmt};
