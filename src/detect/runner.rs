//! Analysis driver that orchestrates all rules.
//!
//! Units are independent and analyzed on rayon workers; results are merged
//! and location-sorted so repeated runs over the same input are byte
//! identical. Within a declaration the walk is strictly sequential: the
//! shadow-tracking live set depends on lexical order.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::config::{Config, ContextRegistry};
use crate::directive::{collect_creators, CreatorSet, DirectiveIndex};
use crate::facts::{Bind, Call, Callee, Closure, Expr, FunctionDecl, Param, Span, Stmt, UnitFacts};

use super::deriver::DeriveMatcher;
use super::launch::{ConcurrencyPoint, LaunchKind, Locator};
use super::scope::find_context_scope;
use super::spawner;
use super::types::{AnalysisResult, Verdict, Violation, ViolationRule};
use super::usage::{self, LiveSet};

/// Executes all enabled rules against a set of compilation units.
pub struct Runner {
    config: Config,
}

impl Runner {
    /// Create a new runner for the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pass. Creator marks are collected across all units before
    /// any rule evaluates, so cross-unit creator calls resolve.
    pub fn run(&self, units: &[UnitFacts]) -> AnalysisResult {
        let creators = collect_creators(units);
        let matcher = self.config.deriver_matcher();

        let unit_violations: Vec<Vec<Violation>> = units
            .par_iter()
            .map(|unit| self.check_unit(unit, &creators, matcher.as_ref()))
            .collect();

        let mut result = AnalysisResult::new();
        for violations in unit_violations {
            result.violations.extend(violations);
        }
        result.scanned = units.len();
        result.sort_violations();
        result
    }

    fn check_unit(
        &self,
        unit: &UnitFacts,
        creators: &CreatorSet,
        matcher: Option<&DeriveMatcher>,
    ) -> Vec<Violation> {
        let mut checker = UnitChecker {
            config: &self.config,
            registry: self.config.registry(),
            matcher,
            locator: Locator::new(&self.config, creators, &unit.package),
            directives: DirectiveIndex::build(&unit.comments),
            file: &unit.path,
            violations: Vec::new(),
        };
        for decl in &unit.decls {
            checker.check_decl(decl);
        }
        checker.violations
    }
}

/// Lexical scope state threaded through one declaration's walk.
#[derive(Debug, Clone, Default)]
struct ScopeState {
    /// Live context candidate names.
    live: LiveSet,
    /// Names currently bound to function values.
    fn_vals: HashSet<String>,
    /// First context parameter name of the nearest enclosing scope that has
    /// one; None means no context scope is active and bindings cannot
    /// introduce candidates.
    ctx_name: Option<String>,
}

impl ScopeState {
    /// Enter a parameter list (declaration or closure). Context-like
    /// parameters become candidates; same-named parameters of other types
    /// shadow outer candidates.
    fn apply_params(&mut self, params: &[Param], registry: &ContextRegistry) {
        if let Some(scope) = find_context_scope(params, registry) {
            self.ctx_name = Some(scope.name);
        }
        for param in params {
            if registry.is_context_like(&param.ty) {
                self.live.insert(&param.name);
            } else {
                self.live.remove(&param.name);
            }
            if param.ty.is_func() {
                self.fn_vals.insert(param.name.clone());
            } else {
                self.fn_vals.remove(&param.name);
            }
        }
    }

    fn apply_bind(&mut self, bind: &Bind, registry: &ContextRegistry) {
        // Candidates only exist inside an active context scope; without one a
        // context-typed local is not tracked.
        if self.ctx_name.is_some() {
            self.live.apply_bind(bind, registry);
        }
        match &bind.ty {
            Some(ty) if ty.is_func() => {
                self.fn_vals.insert(bind.name.clone());
            }
            _ => {
                self.fn_vals.remove(&bind.name);
            }
        }
    }
}

struct UnitChecker<'a> {
    config: &'a Config,
    registry: ContextRegistry<'a>,
    matcher: Option<&'a DeriveMatcher>,
    locator: Locator<'a>,
    directives: DirectiveIndex,
    file: &'a str,
    violations: Vec<Violation>,
}

impl UnitChecker<'_> {
    fn check_decl(&mut self, decl: &FunctionDecl) {
        if self.config.checks.spawner_label {
            if let Some(v) = spawner::check_decl(decl, &self.directives, &self.locator, self.file) {
                self.violations.push(v);
            }
        }

        let Some(body) = &decl.body else { return };
        let mut state = ScopeState::default();
        state.apply_params(&decl.params, &self.registry);
        self.walk_block(body, &mut state);
    }

    /// Walk statements in lexical order. Nested blocks get a copy of the
    /// state so their shadows end with the block.
    fn walk_block(&mut self, stmts: &[Stmt], state: &mut ScopeState) {
        for stmt in stmts {
            match stmt {
                Stmt::Bind(bind) => {
                    if let Some(value) = &bind.value {
                        self.visit_expr(value, state);
                    }
                    state.apply_bind(bind, &self.registry);
                }
                Stmt::Expr(expr) => self.visit_expr(expr, state),
                Stmt::Spawn(call) => {
                    let point = self.locator.classify_spawn(call);
                    self.handle_launch(&point, state);
                }
                Stmt::Defer(call) => self.visit_call(call, state),
                Stmt::Return(exprs) => {
                    for expr in exprs {
                        self.visit_expr(expr, state);
                    }
                }
                Stmt::Block(inner) => {
                    let mut scoped = state.clone();
                    self.walk_block(inner, &mut scoped);
                }
                Stmt::If { cond, then, els } => {
                    self.visit_expr(cond, state);
                    let mut then_scope = state.clone();
                    self.walk_block(then, &mut then_scope);
                    let mut else_scope = state.clone();
                    self.walk_block(els, &mut else_scope);
                }
                Stmt::Loop { body } => {
                    let mut scoped = state.clone();
                    self.walk_block(body, &mut scoped);
                }
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr, state: &ScopeState) {
        match expr {
            Expr::Call(call) => self.visit_call(call, state),
            Expr::Closure(closure) => self.enter_closure(closure, state),
            Expr::Field { base, .. } => self.visit_expr(base, state),
            Expr::Index { base, index } => {
                self.visit_expr(base, state);
                self.visit_expr(index, state);
            }
            Expr::Composite(elems) => {
                for elem in elems {
                    self.visit_expr(elem, state);
                }
            }
            Expr::Ident(_) | Expr::Lit(_) | Expr::Unknown => {}
        }
    }

    fn visit_call(&mut self, call: &Call, state: &ScopeState) {
        if let Some(point) = self.locator.classify_call(call) {
            self.handle_launch(&point, state);
            return;
        }
        match &call.callee {
            Callee::Closure(closure) => self.enter_closure(closure, state),
            Callee::Value(expr) => self.visit_expr(expr, state),
            _ => {}
        }
        for arg in &call.args {
            self.visit_expr(arg, state);
        }
    }

    /// Every closure body is a scope of its own, scanned for launch points
    /// with the live set snapshot taken at its position.
    fn enter_closure(&mut self, closure: &Closure, outer: &ScopeState) {
        let mut state = outer.clone();
        state.apply_params(&closure.params, &self.registry);
        self.walk_block(&closure.body, &mut state);
    }

    fn handle_launch(&mut self, point: &ConcurrencyPoint<'_>, state: &ScopeState) {
        let call = point.call;

        match point.kind {
            LaunchKind::DirectLaunch => {
                if self.config.checks.goroutine
                    && !state.live.is_empty()
                    && !self.directives.is_ignored(call.span.line)
                {
                    let verdict = self.direct_verdict(call, &state.live);
                    if verdict.is_violated() {
                        self.emit_direct(state, call.span);
                    }
                }
            }
            LaunchKind::PoolSubmit
            | LaunchKind::PoolTrySubmit
            | LaunchKind::WaitGroupSubmit
            | LaunchKind::CreatorCall => {
                if !state.live.is_empty() {
                    // Each function-valued argument is an independent point.
                    for arg in self.locator.callable_args(point, &state.fn_vals) {
                        let Expr::Closure(closure) = arg else {
                            // Named functions and pass-through values are
                            // unresolvable locally; never flagged.
                            continue;
                        };
                        // The ignore directive is matched against the line the
                        // finding is reported at.
                        let report_line = if point.kind == LaunchKind::CreatorCall {
                            closure.span.line
                        } else {
                            call.span.line
                        };
                        let verdict = self.submit_closure_verdict(closure, &state.live);
                        if verdict.is_violated() && !self.directives.is_ignored(report_line) {
                            self.emit_submit(point, closure, state);
                        }
                    }
                }
            }
        }

        // Recurse into subtrees regardless of verdicts: nested closures are
        // scopes with their own launch points.
        match &call.callee {
            Callee::Closure(closure) => self.enter_closure(closure, state),
            Callee::Value(expr) => self.visit_expr(expr, state),
            _ => {}
        }
        for arg in &call.args {
            self.visit_expr(arg, state);
        }
    }

    /// Verdict for a direct launch: context handed to the spawned call as an
    /// argument satisfies; a closure callee is scanned; anything else is
    /// unresolvable.
    fn direct_verdict(&self, call: &Call, live: &LiveSet) -> Verdict {
        if call.args.iter().any(|arg| usage::expr_references(arg, live)) {
            return Verdict::Satisfied;
        }
        match &call.callee {
            Callee::Closure(closure) => match self.matcher {
                Some(matcher) => usage::check_closure_derive(
                    closure,
                    live,
                    matcher,
                    &self.registry,
                    |c| self.locator.is_launch(c),
                ),
                None => usage::check_closure_direct(closure, live, &self.registry),
            },
            // A factory chain with context in any inner argument list.
            Callee::Value(expr) if usage::expr_references(expr, live) => Verdict::Satisfied,
            _ => Verdict::NotApplicable("spawned callable is not a closure literal"),
        }
    }

    /// Verdict for a submit-form closure: direct usage, or a deriver call
    /// when one is configured.
    fn submit_closure_verdict(&self, closure: &Closure, live: &LiveSet) -> Verdict {
        let direct = usage::check_closure_direct(closure, live, &self.registry);
        match (direct, self.matcher) {
            (Verdict::Violated, Some(matcher)) => usage::check_closure_derive(
                closure,
                live,
                matcher,
                &self.registry,
                |c| self.locator.is_launch(c),
            ),
            _ => direct,
        }
    }

    fn emit_direct(&mut self, state: &ScopeState, span: Span) {
        let ctx_name = state.ctx_name.clone().unwrap_or_default();
        match self.matcher {
            Some(matcher) => self.emit(
                ViolationRule::GoroutineDerive,
                format!(
                    "goroutine should call {} to derive context",
                    matcher.original
                ),
                span,
            ),
            None => self.emit(
                ViolationRule::GoroutineContext,
                format!("goroutine does not propagate context {:?}", ctx_name),
                span,
            ),
        }
    }

    fn emit_submit(&mut self, point: &ConcurrencyPoint<'_>, closure: &Closure, state: &ScopeState) {
        let ctx_name = state.ctx_name.clone().unwrap_or_default();
        let suffix = if self.matcher.is_some() {
            " or call goroutine deriver"
        } else {
            ""
        };
        let forms = &self.config.launch_forms;
        let (rule, message, span) = match point.kind {
            LaunchKind::PoolSubmit => (
                ViolationRule::PoolContext,
                format!(
                    "{}.{}() closure should use context {:?}{}",
                    forms.pool_type.short(),
                    forms.pool_submit,
                    ctx_name,
                    suffix
                ),
                point.call.span,
            ),
            LaunchKind::PoolTrySubmit => (
                ViolationRule::PoolContext,
                format!(
                    "{}.{}() closure should use context {:?}{}",
                    forms.pool_type.short(),
                    forms.pool_try_submit,
                    ctx_name,
                    suffix
                ),
                point.call.span,
            ),
            LaunchKind::WaitGroupSubmit => (
                ViolationRule::WaitgroupContext,
                format!(
                    "{}.{}() closure should use context {:?}{}",
                    forms.waitgroup_type.short(),
                    forms.waitgroup_submit,
                    ctx_name,
                    suffix
                ),
                point.call.span,
            ),
            LaunchKind::CreatorCall => (
                ViolationRule::CreatorContext,
                format!(
                    "{}() func argument should use context {:?}{}",
                    point.creator.as_deref().unwrap_or_default(),
                    ctx_name,
                    suffix
                ),
                // Creator findings point at the offending argument.
                closure.span,
            ),
            LaunchKind::DirectLaunch => unreachable!("direct launches use emit_direct"),
        };
        self.emit(rule, message, span);
    }

    fn emit(&mut self, rule: ViolationRule, message: String, span: Span) {
        self.violations.push(Violation {
            rule,
            message,
            file: self.file.to_string(),
            line: span.line,
            col: span.col,
            severity: rule.severity(),
        });
    }
}
