//! Context parameter resolution.
//!
//! A function scope tracks every context-like parameter, not just the first
//! one. Declaration order is preserved; messages always name the first
//! declared one so output stays predictable.

use crate::config::ContextRegistry;
use crate::facts::Param;

/// Context availability in a function scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextScope {
    /// Names of context-like parameters, in declaration order.
    pub candidates: Vec<String>,
    /// The first candidate name, used in messages.
    pub name: String,
}

/// Find all context-like parameters and create a scope.
/// Returns None if no parameter matches the context type or a carrier.
pub fn find_context_scope(params: &[Param], registry: &ContextRegistry) -> Option<ContextScope> {
    let candidates: Vec<String> = params
        .iter()
        .filter(|p| registry.is_context_like(&p.ty))
        .map(|p| p.name.clone())
        .collect();

    let name = candidates.first()?.clone();
    Some(ContextScope { candidates, name })
}

/// Whether any parameter is context-like.
pub fn has_context_param(params: &[Param], registry: &ContextRegistry) -> bool {
    params.iter().any(|p| registry.is_context_like(&p.ty))
}
