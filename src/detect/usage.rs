//! Closure usage analysis with shadow-aware lexical scanning.
//!
//! The analyzer walks a closure body in statement order with an explicit live
//! candidate set threaded through the scan. A binding of a candidate name to a
//! non-context value removes that name for the rest of its block; a binding
//! whose resolved type is context-like inserts its name, which both restores a
//! shadowed candidate and admits a deriver result bound under a new name.
//! References are counted only while the name is live, so usage lexically
//! before a shadow still satisfies the rule.
//!
//! Nested closures are separate scopes: references inside them never satisfy
//! the enclosing closure's check, and their own launches are evaluated
//! independently by the driver.

use crate::config::ContextRegistry;
use crate::facts::{Bind, Call, Callee, Closure, Expr, Param, Stmt};

use super::deriver::DeriveMatcher;
use super::types::Verdict;

/// The mutable set of live context candidate names.
#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    names: Vec<String>,
}

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_candidates(candidates: &[String]) -> Self {
        Self {
            names: candidates.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn insert(&mut self, name: &str) {
        if !self.contains(name) {
            self.names.push(name.to_string());
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.names.retain(|n| n != name);
    }

    /// Apply a binding statement: context-like bindings insert their name,
    /// anything else shadows it. Candidate insertion only applies inside an
    /// active context scope; the caller gates on that.
    pub fn apply_bind(&mut self, bind: &Bind, registry: &ContextRegistry) {
        let context_like = bind
            .ty
            .as_ref()
            .map(|ty| registry.is_context_like(ty))
            .unwrap_or(false);
        if context_like {
            self.insert(&bind.name);
        } else {
            self.remove(&bind.name);
        }
    }

    /// Apply closure parameters on scope entry. A context-like parameter
    /// becomes a candidate; a same-named parameter of any other type shadows
    /// the outer candidate.
    pub fn apply_params(&mut self, params: &[Param], registry: &ContextRegistry) {
        for param in params {
            if registry.is_context_like(&param.ty) {
                self.insert(&param.name);
            } else {
                self.remove(&param.name);
            }
        }
    }
}

/// Whether an expression references any live candidate.
/// Does not descend into closure bodies; those are separate scopes.
pub fn expr_references(expr: &Expr, live: &LiveSet) -> bool {
    match expr {
        Expr::Ident(name) => live.contains(name),
        Expr::Lit(_) | Expr::Unknown => false,
        Expr::Call(call) => call_references(call, live),
        Expr::Closure(_) => false,
        Expr::Field { base, .. } => expr_references(base, live),
        Expr::Index { base, index } => expr_references(base, live) || expr_references(index, live),
        Expr::Composite(elems) => elems.iter().any(|e| expr_references(e, live)),
    }
}

/// Whether a call's callee value or arguments reference a live candidate.
pub fn call_references(call: &Call, live: &LiveSet) -> bool {
    let callee_refs = match &call.callee {
        Callee::Value(expr) => expr_references(expr, live),
        _ => false,
    };
    callee_refs || call.args.iter().any(|arg| expr_references(arg, live))
}

/// Scan a statement block in lexical order for a live-candidate reference,
/// applying shadowing as the scan advances. Nested blocks scan against a copy
/// of the live set so their shadows end with the block.
pub fn block_uses_candidate(stmts: &[Stmt], live: &mut LiveSet, registry: &ContextRegistry) -> bool {
    for stmt in stmts {
        match stmt {
            Stmt::Bind(bind) => {
                // The bound value is evaluated before the name rebinds.
                if let Some(value) = &bind.value {
                    if expr_references(value, live) {
                        return true;
                    }
                }
                live.apply_bind(bind, registry);
            }
            Stmt::Expr(expr) => {
                if expr_references(expr, live) {
                    return true;
                }
            }
            Stmt::Spawn(call) | Stmt::Defer(call) => {
                if call_references(call, live) {
                    return true;
                }
            }
            Stmt::Return(exprs) => {
                if exprs.iter().any(|e| expr_references(e, live)) {
                    return true;
                }
            }
            Stmt::Block(inner) => {
                let mut scoped = live.clone();
                if block_uses_candidate(inner, &mut scoped, registry) {
                    return true;
                }
            }
            Stmt::If { cond, then, els } => {
                if expr_references(cond, live) {
                    return true;
                }
                let mut then_scope = live.clone();
                if block_uses_candidate(then, &mut then_scope, registry) {
                    return true;
                }
                let mut else_scope = live.clone();
                if block_uses_candidate(els, &mut else_scope, registry) {
                    return true;
                }
            }
            Stmt::Loop { body } => {
                let mut scoped = live.clone();
                if block_uses_candidate(body, &mut scoped, registry) {
                    return true;
                }
            }
        }
    }
    false
}

/// Direct-usage mode: satisfied iff the closure references a live candidate
/// before any shadowing removes it.
pub fn check_closure_direct(
    closure: &Closure,
    live: &LiveSet,
    registry: &ContextRegistry,
) -> Verdict {
    if live.is_empty() {
        return Verdict::NotApplicable("no context candidate in scope");
    }
    // A closure with its own context-like parameter receives context by other
    // means; it is checked with its own scope.
    if closure
        .params
        .iter()
        .any(|p| registry.is_context_like(&p.ty))
    {
        return Verdict::NotApplicable("closure declares its own context parameter");
    }

    // Even with every candidate shadowed by a parameter, a context-like
    // binding in the body can restore candidacy, so the scan always runs.
    let mut scoped = live.clone();
    scoped.apply_params(&closure.params, registry);

    if block_uses_candidate(&closure.body, &mut scoped, registry) {
        Verdict::Satisfied
    } else {
        Verdict::Violated
    }
}

/// Derive mode: satisfied iff the closure calls the configured deriver with a
/// live candidate argument at its own top level, lexically before its first
/// nested concurrency point.
///
/// `is_launch` identifies nested points; deriver calls from the statement
/// containing the first one onward no longer count.
pub fn check_closure_derive<F>(
    closure: &Closure,
    live: &LiveSet,
    matcher: &DeriveMatcher,
    registry: &ContextRegistry,
    is_launch: F,
) -> Verdict
where
    F: Fn(&Call) -> bool,
{
    if live.is_empty() {
        return Verdict::NotApplicable("no context candidate in scope");
    }
    if closure
        .params
        .iter()
        .any(|p| registry.is_context_like(&p.ty))
    {
        return Verdict::NotApplicable("closure declares its own context parameter");
    }

    let mut scoped = live.clone();
    scoped.apply_params(&closure.params, registry);

    let mut matched: Vec<&Callee> = Vec::new();
    scan_derive_block(
        &closure.body,
        &mut scoped,
        matcher,
        registry,
        &is_launch,
        &mut matched,
    );

    if matcher.satisfied(&matched) {
        Verdict::Satisfied
    } else {
        Verdict::Violated
    }
}

/// Collect deriver calls in statement order; returns true once a nested
/// concurrency point stops the scan.
fn scan_derive_block<'a, F>(
    stmts: &'a [Stmt],
    live: &mut LiveSet,
    matcher: &DeriveMatcher,
    registry: &ContextRegistry,
    is_launch: &F,
    matched: &mut Vec<&'a Callee>,
) -> bool
where
    F: Fn(&Call) -> bool,
{
    for stmt in stmts {
        if stmt_contains_launch(stmt, is_launch) {
            return true;
        }
        match stmt {
            Stmt::Bind(bind) => {
                if let Some(value) = &bind.value {
                    collect_derive_calls(value, live, matcher, matched);
                }
                live.apply_bind(bind, registry);
            }
            Stmt::Expr(expr) => collect_derive_calls(expr, live, matcher, matched),
            Stmt::Defer(call) => collect_derive_calls_in_call(call, live, matcher, matched),
            Stmt::Return(exprs) => {
                for expr in exprs {
                    collect_derive_calls(expr, live, matcher, matched);
                }
            }
            Stmt::Block(inner) => {
                let mut scoped = live.clone();
                if scan_derive_block(inner, &mut scoped, matcher, registry, is_launch, matched) {
                    return true;
                }
            }
            Stmt::If { cond, then, els } => {
                collect_derive_calls(cond, live, matcher, matched);
                let mut then_scope = live.clone();
                if scan_derive_block(then, &mut then_scope, matcher, registry, is_launch, matched) {
                    return true;
                }
                let mut else_scope = live.clone();
                if scan_derive_block(els, &mut else_scope, matcher, registry, is_launch, matched) {
                    return true;
                }
            }
            Stmt::Loop { body } => {
                let mut scoped = live.clone();
                if scan_derive_block(body, &mut scoped, matcher, registry, is_launch, matched) {
                    return true;
                }
            }
            // Handled by the launch test above.
            Stmt::Spawn(_) => {}
        }
    }
    false
}

/// Whether a statement contains a concurrency point outside nested closures.
fn stmt_contains_launch<F>(stmt: &Stmt, is_launch: &F) -> bool
where
    F: Fn(&Call) -> bool,
{
    match stmt {
        Stmt::Spawn(_) => true,
        Stmt::Bind(bind) => bind
            .value
            .as_ref()
            .map(|v| expr_contains_launch(v, is_launch))
            .unwrap_or(false),
        Stmt::Expr(expr) => expr_contains_launch(expr, is_launch),
        Stmt::Defer(call) => call_contains_launch(call, is_launch),
        Stmt::Return(exprs) => exprs.iter().any(|e| expr_contains_launch(e, is_launch)),
        // Nested blocks are scanned statement by statement by the caller.
        Stmt::Block(_) | Stmt::If { .. } | Stmt::Loop { .. } => false,
    }
}

fn expr_contains_launch<F>(expr: &Expr, is_launch: &F) -> bool
where
    F: Fn(&Call) -> bool,
{
    match expr {
        Expr::Call(call) => call_contains_launch(call, is_launch),
        Expr::Field { base, .. } => expr_contains_launch(base, is_launch),
        Expr::Index { base, index } => {
            expr_contains_launch(base, is_launch) || expr_contains_launch(index, is_launch)
        }
        Expr::Composite(elems) => elems.iter().any(|e| expr_contains_launch(e, is_launch)),
        _ => false,
    }
}

fn call_contains_launch<F>(call: &Call, is_launch: &F) -> bool
where
    F: Fn(&Call) -> bool,
{
    if is_launch(call) {
        return true;
    }
    let callee_launch = match &call.callee {
        Callee::Value(expr) => expr_contains_launch(expr, is_launch),
        _ => false,
    };
    callee_launch || call.args.iter().any(|a| expr_contains_launch(a, is_launch))
}

/// Collect calls matching the deriver specs whose arguments reference a live
/// candidate. Does not descend into nested closures.
fn collect_derive_calls<'a>(
    expr: &'a Expr,
    live: &LiveSet,
    matcher: &DeriveMatcher,
    matched: &mut Vec<&'a Callee>,
) {
    match expr {
        Expr::Call(call) => collect_derive_calls_in_call(call, live, matcher, matched),
        Expr::Field { base, .. } => collect_derive_calls(base, live, matcher, matched),
        Expr::Index { base, index } => {
            collect_derive_calls(base, live, matcher, matched);
            collect_derive_calls(index, live, matcher, matched);
        }
        Expr::Composite(elems) => {
            for elem in elems {
                collect_derive_calls(elem, live, matcher, matched);
            }
        }
        _ => {}
    }
}

fn collect_derive_calls_in_call<'a>(
    call: &'a Call,
    live: &LiveSet,
    matcher: &DeriveMatcher,
    matched: &mut Vec<&'a Callee>,
) {
    if matcher.matches_callee(&call.callee)
        && call.args.iter().any(|arg| expr_references(arg, live))
    {
        matched.push(&call.callee);
    }
    if let Callee::Value(expr) = &call.callee {
        collect_derive_calls(expr, live, matcher, matched);
    }
    for arg in &call.args {
        collect_derive_calls(arg, live, matcher, matched);
    }
}
