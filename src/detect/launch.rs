//! Concurrency point recognition.
//!
//! The locator classifies call sites against the configured builtin launch
//! forms (pool submit, fallible pool submit, wait-group submit) and against
//! functions marked `spawncheck:goroutine_creator`. Direct launches are a
//! dedicated statement form and always classify.

use std::collections::HashSet;

use crate::config::{Checks, Config, LaunchForms};
use crate::directive::CreatorSet;
use crate::facts::{Call, Callee, Expr};

/// Kind of concurrency launch site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    DirectLaunch,
    PoolSubmit,
    PoolTrySubmit,
    WaitGroupSubmit,
    CreatorCall,
}

impl LaunchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchKind::DirectLaunch => "direct-launch",
            LaunchKind::PoolSubmit => "pool-submit",
            LaunchKind::PoolTrySubmit => "pool-submit-fallible",
            LaunchKind::WaitGroupSubmit => "wait-group-submit",
            LaunchKind::CreatorCall => "marked-creator-call",
        }
    }
}

/// A recognized concurrency launch site.
#[derive(Debug, Clone)]
pub struct ConcurrencyPoint<'a> {
    pub kind: LaunchKind,
    pub call: &'a Call,
    /// For creator calls: the name of the marked function invoked.
    pub creator: Option<String>,
}

impl ConcurrencyPoint<'_> {
    /// Site name for messages, e.g. `errgroup.Group.Go` or the creator name.
    pub fn site_name(&self, forms: &LaunchForms) -> String {
        match self.kind {
            LaunchKind::DirectLaunch => "go".to_string(),
            LaunchKind::PoolSubmit => {
                format!("{}.{}", forms.pool_type.short(), forms.pool_submit)
            }
            LaunchKind::PoolTrySubmit => {
                format!("{}.{}", forms.pool_type.short(), forms.pool_try_submit)
            }
            LaunchKind::WaitGroupSubmit => {
                format!("{}.{}", forms.waitgroup_type.short(), forms.waitgroup_submit)
            }
            LaunchKind::CreatorCall => self.creator.clone().unwrap_or_default(),
        }
    }
}

/// Classifies call sites within one compilation unit.
#[derive(Debug, Clone, Copy)]
pub struct Locator<'a> {
    forms: &'a LaunchForms,
    checks: &'a Checks,
    creators: &'a CreatorSet,
    /// Package of the unit being analyzed, for resolving bare callee names.
    package: &'a str,
}

impl<'a> Locator<'a> {
    pub fn new(config: &'a Config, creators: &'a CreatorSet, package: &'a str) -> Self {
        Self {
            forms: &config.launch_forms,
            checks: &config.checks,
            creators,
            package,
        }
    }

    /// The launch form identities this locator recognizes.
    pub fn forms(&self) -> &LaunchForms {
        self.forms
    }

    /// Classify a call expression as a concurrency point, if it is one.
    /// Disabled launch forms are not recognized at all.
    pub fn classify_call<'c>(&self, call: &'c Call) -> Option<ConcurrencyPoint<'c>> {
        match &call.callee {
            Callee::Method { recv, name } => {
                let kind = if *recv == self.forms.pool_type {
                    if self.checks.pool && *name == self.forms.pool_submit {
                        LaunchKind::PoolSubmit
                    } else if self.checks.pool_try && *name == self.forms.pool_try_submit {
                        LaunchKind::PoolTrySubmit
                    } else {
                        return self.classify_creator(call);
                    }
                } else if self.checks.waitgroup
                    && *recv == self.forms.waitgroup_type
                    && *name == self.forms.waitgroup_submit
                {
                    LaunchKind::WaitGroupSubmit
                } else {
                    return self.classify_creator(call);
                };
                Some(ConcurrencyPoint {
                    kind,
                    call,
                    creator: None,
                })
            }
            Callee::Func(_) => self.classify_creator(call),
            _ => None,
        }
    }

    fn classify_creator<'c>(&self, call: &'c Call) -> Option<ConcurrencyPoint<'c>> {
        if !self.checks.creator || self.creators.is_empty() {
            return None;
        }
        let name = self.creators.creator_name(&call.callee, self.package)?;
        Some(ConcurrencyPoint {
            kind: LaunchKind::CreatorCall,
            call,
            creator: Some(name.to_string()),
        })
    }

    /// Classify the call of a direct launch statement.
    pub fn classify_spawn<'c>(&self, call: &'c Call) -> ConcurrencyPoint<'c> {
        ConcurrencyPoint {
            kind: LaunchKind::DirectLaunch,
            call,
            creator: None,
        }
    }

    /// Whether a call expression is a recognized concurrency point.
    pub fn is_launch(&self, call: &Call) -> bool {
        self.classify_call(call).is_some()
    }

    /// The function-valued arguments of a point that the usage analyzer
    /// evaluates. Each one is an independent concurrency point: one may be
    /// violated while a sibling is satisfied.
    ///
    /// `fn_vals` holds the names currently bound to function values in the
    /// enclosing scope, so creator calls can tell func-typed arguments from
    /// plain data.
    pub fn callable_args<'c>(
        &self,
        point: &ConcurrencyPoint<'c>,
        fn_vals: &HashSet<String>,
    ) -> Vec<&'c Expr> {
        match point.kind {
            // The spawned callable is the callee itself, handled by the driver.
            LaunchKind::DirectLaunch => Vec::new(),
            // Submit forms take a single callable.
            LaunchKind::PoolSubmit | LaunchKind::PoolTrySubmit | LaunchKind::WaitGroupSubmit => {
                point.call.args.first().into_iter().collect()
            }
            LaunchKind::CreatorCall => point
                .call
                .args
                .iter()
                .filter(|arg| is_func_valued(arg, fn_vals))
                .collect(),
        }
    }

    /// Whether the point justifies (and requires) a spawner label on the
    /// enclosing declaration.
    pub fn qualifies_for_label(&self, point: &ConcurrencyPoint<'_>, fn_vals: &HashSet<String>) -> bool {
        match point.kind {
            LaunchKind::DirectLaunch => true,
            LaunchKind::PoolSubmit | LaunchKind::PoolTrySubmit | LaunchKind::WaitGroupSubmit => {
                !point.call.args.is_empty()
            }
            LaunchKind::CreatorCall => !self.callable_args(point, fn_vals).is_empty(),
        }
    }
}

fn is_func_valued(expr: &Expr, fn_vals: &HashSet<String>) -> bool {
    match expr {
        Expr::Closure(_) => true,
        Expr::Ident(name) => fn_vals.contains(name),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::facts::{FuncId, FunctionDecl, Span, TypeId, UnitFacts};

    fn method_call(recv: TypeId, name: &str, args: Vec<Expr>) -> Call {
        Call {
            callee: Callee::Method {
                recv,
                name: name.to_string(),
            },
            args,
            span: Span::new(5, 2),
        }
    }

    fn closure_arg() -> Expr {
        Expr::Closure(crate::facts::Closure {
            params: Vec::new(),
            body: Vec::new(),
            span: Span::new(5, 8),
        })
    }

    fn pool_type() -> TypeId {
        TypeId::new("golang.org/x/sync/errgroup", "Group")
    }

    #[test]
    fn test_classify_builtin_forms() {
        let config = Config::default();
        let creators = CreatorSet::default();
        let locator = Locator::new(&config, &creators, "example.com/app");

        let go = method_call(pool_type(), "Go", vec![closure_arg()]);
        let try_go = method_call(pool_type(), "TryGo", vec![closure_arg()]);
        let wg = method_call(TypeId::new("sync", "WaitGroup"), "Go", vec![closure_arg()]);
        let wait = method_call(pool_type(), "Wait", Vec::new());

        assert_eq!(
            locator.classify_call(&go).map(|p| p.kind),
            Some(LaunchKind::PoolSubmit)
        );
        assert_eq!(
            locator.classify_call(&try_go).map(|p| p.kind),
            Some(LaunchKind::PoolTrySubmit)
        );
        assert_eq!(
            locator.classify_call(&wg).map(|p| p.kind),
            Some(LaunchKind::WaitGroupSubmit)
        );
        assert!(locator.classify_call(&wait).is_none());
    }

    #[test]
    fn test_disabled_form_not_recognized() {
        let mut config = Config::default();
        config.checks.pool = false;
        let creators = CreatorSet::default();
        let locator = Locator::new(&config, &creators, "example.com/app");

        let go = method_call(pool_type(), "Go", vec![closure_arg()]);
        assert!(locator.classify_call(&go).is_none());

        // TryGo stays recognized independently.
        let try_go = method_call(pool_type(), "TryGo", vec![closure_arg()]);
        assert!(locator.classify_call(&try_go).is_some());
    }

    #[test]
    fn test_classify_creator_call() {
        let unit = UnitFacts {
            path: "w.go".to_string(),
            package: "example.com/app".to_string(),
            decls: vec![FunctionDecl {
                name: "startWorker".to_string(),
                receiver: None,
                params: Vec::new(),
                body: Some(Vec::new()),
                span: Span::new(3, 1),
            }],
            comments: vec![crate::facts::CommentToken {
                line: 2,
                text: "// spawncheck:goroutine_creator".to_string(),
            }],
        };
        let creators = crate::directive::collect_creators(&[unit]);
        let config = Config::default();
        let locator = Locator::new(&config, &creators, "example.com/app");

        let call = Call {
            callee: Callee::Func(FuncId::new("", "startWorker")),
            args: vec![Expr::Lit("1".to_string()), closure_arg()],
            span: Span::new(9, 2),
        };
        let point = locator.classify_call(&call).unwrap();
        assert_eq!(point.kind, LaunchKind::CreatorCall);
        assert_eq!(point.creator.as_deref(), Some("startWorker"));

        // Only the closure argument is callable.
        let args = locator.callable_args(&point, &HashSet::new());
        assert_eq!(args.len(), 1);
        assert!(locator.qualifies_for_label(&point, &HashSet::new()));
    }

    #[test]
    fn test_creator_ident_arg_needs_func_binding() {
        let unit = UnitFacts {
            package: "example.com/app".to_string(),
            decls: vec![FunctionDecl {
                name: "runAll".to_string(),
                receiver: None,
                params: Vec::new(),
                body: Some(Vec::new()),
                span: Span::new(3, 1),
            }],
            comments: vec![crate::facts::CommentToken {
                line: 2,
                text: "// spawncheck:goroutine_creator".to_string(),
            }],
            ..Default::default()
        };
        let creators = crate::directive::collect_creators(&[unit]);
        let config = Config::default();
        let locator = Locator::new(&config, &creators, "example.com/app");

        let call = Call {
            callee: Callee::Func(FuncId::new("", "runAll")),
            args: vec![Expr::Ident("task".to_string())],
            span: Span::new(9, 2),
        };
        let point = locator.classify_call(&call).unwrap();

        assert!(locator.callable_args(&point, &HashSet::new()).is_empty());

        let mut fn_vals = HashSet::new();
        fn_vals.insert("task".to_string());
        assert_eq!(locator.callable_args(&point, &fn_vals).len(), 1);
    }

    #[test]
    fn test_site_name() {
        let config = Config::default();
        let creators = CreatorSet::default();
        let locator = Locator::new(&config, &creators, "example.com/app");

        let go = method_call(pool_type(), "Go", vec![closure_arg()]);
        let point = locator.classify_call(&go).unwrap();
        assert_eq!(point.site_name(&config.launch_forms), "errgroup.Group.Go");
    }
}
