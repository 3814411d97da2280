//! Spawner label analysis.
//!
//! A function whose own top level launches concurrency must carry the
//! `spawncheck:spawner` directive; a labeled function that launches nothing
//! and takes no function-typed parameter is flagged the other way. Launches
//! inside nested closures never count: only the outermost declaration's
//! statements matter.

use std::collections::HashSet;

use crate::directive::{DirectiveIndex, DirectiveKind};
use crate::facts::{Call, Callee, Expr, FunctionDecl, Stmt};

use super::launch::Locator;
use super::types::{Violation, ViolationRule};

/// Evaluate the spawner label rule for one declaration.
pub fn check_decl(
    decl: &FunctionDecl,
    directives: &DirectiveIndex,
    locator: &Locator<'_>,
    file: &str,
) -> Option<Violation> {
    let decl_directives = directives.decl_directives(decl.span.line);
    if decl_directives.contains(&DirectiveKind::Ignore) {
        return None;
    }
    let has_label = decl_directives.contains(&DirectiveKind::Spawner);

    // Declarations without a body (external functions) are never checked.
    let body = decl.body.as_ref()?;

    let mut scan = LabelScan {
        locator,
        fn_vals: decl
            .params
            .iter()
            .filter(|p| p.ty.is_func())
            .map(|p| p.name.clone())
            .collect(),
    };
    let qualifying = scan.first_qualifying(body);

    match (has_label, qualifying) {
        (false, Some(clause)) => Some(Violation {
            rule: ViolationRule::MissingSpawnerLabel,
            message: format!(
                "function {:?} should have spawncheck:spawner directive ({})",
                decl.name, clause
            ),
            file: file.to_string(),
            line: decl.span.line,
            col: decl.span.col,
            severity: ViolationRule::MissingSpawnerLabel.severity(),
        }),
        (true, None) => {
            // A function-typed parameter justifies keeping the label: a caller
            // not visible here may invoke it concurrently.
            if decl.params.iter().any(|p| p.ty.is_func()) {
                return None;
            }
            Some(Violation {
                rule: ViolationRule::UnnecessarySpawnerLabel,
                message: format!(
                    "function {:?} has unnecessary spawncheck:spawner directive",
                    decl.name
                ),
                file: file.to_string(),
                line: decl.span.line,
                col: decl.span.col,
                severity: ViolationRule::UnnecessarySpawnerLabel.severity(),
            })
        }
        _ => None,
    }
}

/// Walks a declaration's own top level looking for the first qualifying
/// launch, tracking which names hold function values along the way.
struct LabelScan<'a, 'b> {
    locator: &'a Locator<'b>,
    fn_vals: HashSet<String>,
}

impl LabelScan<'_, '_> {
    /// Returns the message clause for the first qualifying launch, if any.
    fn first_qualifying(&mut self, stmts: &[Stmt]) -> Option<String> {
        for stmt in stmts {
            match stmt {
                Stmt::Spawn(_) => return Some("spawns a goroutine".to_string()),
                Stmt::Bind(bind) => {
                    if let Some(value) = &bind.value {
                        if let Some(clause) = self.scan_expr(value) {
                            return Some(clause);
                        }
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
                Stmt::Expr(expr) => {
                    if let Some(clause) = self.scan_expr(expr) {
                        return Some(clause);
                    }
                }
                Stmt::Defer(call) => {
                    if let Some(clause) = self.scan_call(call) {
                        return Some(clause);
                    }
                }
                Stmt::Return(exprs) => {
                    for expr in exprs {
                        if let Some(clause) = self.scan_expr(expr) {
                            return Some(clause);
                        }
                    }
                }
                Stmt::Block(inner) => {
                    if let Some(clause) = self.first_qualifying(inner) {
                        return Some(clause);
                    }
                }
                Stmt::If { cond, then, els } => {
                    if let Some(clause) = self.scan_expr(cond) {
                        return Some(clause);
                    }
                    if let Some(clause) = self.first_qualifying(then) {
                        return Some(clause);
                    }
                    if let Some(clause) = self.first_qualifying(els) {
                        return Some(clause);
                    }
                }
                Stmt::Loop { body } => {
                    if let Some(clause) = self.first_qualifying(body) {
                        return Some(clause);
                    }
                }
            }
        }
        None
    }

    fn scan_expr(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Call(call) => self.scan_call(call),
            Expr::Field { base, .. } => self.scan_expr(base),
            Expr::Index { base, index } => {
                self.scan_expr(base).or_else(|| self.scan_expr(index))
            }
            Expr::Composite(elems) => elems.iter().find_map(|e| self.scan_expr(e)),
            // Closure interiors never qualify the enclosing declaration.
            Expr::Closure(_) => None,
            _ => None,
        }
    }

    fn scan_call(&self, call: &Call) -> Option<String> {
        if let Some(point) = self.locator.classify_call(call) {
            if self.locator.qualifies_for_label(&point, &self.fn_vals) {
                return Some(format!(
                    "calls {} with func argument",
                    point.site_name(self.locator.forms())
                ));
            }
        }
        if let Callee::Value(expr) = &call.callee {
            if let Some(clause) = self.scan_expr(expr) {
                return Some(clause);
            }
        }
        call.args.iter().find_map(|arg| self.scan_expr(arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::directive::CreatorSet;
    use crate::facts::{Closure, CommentToken, FuncSig, Param, Span, TypeId, TypeRef};

    fn pool_submit(line: u32, arg: Expr) -> Stmt {
        Stmt::Expr(Expr::Call(Call {
            callee: Callee::Method {
                recv: TypeId::new("golang.org/x/sync/errgroup", "Group"),
                name: "Go".to_string(),
            },
            args: vec![arg],
            span: Span::new(line, 2),
        }))
    }

    fn empty_closure(line: u32) -> Expr {
        Expr::Closure(Closure {
            params: Vec::new(),
            body: Vec::new(),
            span: Span::new(line, 7),
        })
    }

    fn decl(name: &str, line: u32, params: Vec<Param>, body: Vec<Stmt>) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            receiver: None,
            params,
            body: Some(body),
            span: Span::new(line, 1),
        }
    }

    fn spawner_comment(line: u32) -> CommentToken {
        CommentToken {
            line,
            text: "// spawncheck:spawner".to_string(),
        }
    }

    fn check(
        decl: &FunctionDecl,
        comments: &[CommentToken],
    ) -> Option<Violation> {
        let config = Config::default();
        let creators = CreatorSet::default();
        let locator = Locator::new(&config, &creators, "example.com/app");
        let directives = DirectiveIndex::build(comments);
        check_decl(decl, &directives, &locator, "test.go")
    }

    #[test]
    fn test_missing_label_reported() {
        let d = decl("spawns", 5, Vec::new(), vec![pool_submit(6, empty_closure(6))]);
        let v = check(&d, &[]).unwrap();
        assert_eq!(v.rule, ViolationRule::MissingSpawnerLabel);
        assert!(v.message.contains("errgroup.Group.Go"));
        assert_eq!(v.line, 5);
    }

    #[test]
    fn test_labeled_with_spawn_is_clean() {
        let d = decl("spawns", 5, Vec::new(), vec![pool_submit(6, empty_closure(6))]);
        assert!(check(&d, &[spawner_comment(4)]).is_none());
    }

    #[test]
    fn test_unnecessary_label_reported() {
        let d = decl("plain", 5, Vec::new(), Vec::new());
        let v = check(&d, &[spawner_comment(4)]).unwrap();
        assert_eq!(v.rule, ViolationRule::UnnecessarySpawnerLabel);
    }

    #[test]
    fn test_plain_function_is_clean() {
        let d = decl("plain", 5, Vec::new(), Vec::new());
        assert!(check(&d, &[]).is_none());
    }

    #[test]
    fn test_func_param_justifies_label() {
        let d = decl(
            "runner",
            5,
            vec![Param {
                name: "fn".to_string(),
                ty: TypeRef::Func(FuncSig::default()),
            }],
            Vec::new(),
        );
        assert!(check(&d, &[spawner_comment(4)]).is_none());
    }

    #[test]
    fn test_func_param_does_not_require_label() {
        let d = decl(
            "runner",
            5,
            vec![Param {
                name: "fn".to_string(),
                ty: TypeRef::Func(FuncSig::default()),
            }],
            Vec::new(),
        );
        assert!(check(&d, &[]).is_none());
    }

    #[test]
    fn test_ignore_directive_suppresses_both() {
        let missing = decl("spawns", 5, Vec::new(), vec![pool_submit(6, empty_closure(6))]);
        let ignore = CommentToken {
            line: 4,
            text: "// spawncheck:ignore".to_string(),
        };
        assert!(check(&missing, &[ignore.clone()]).is_none());

        let unnecessary = decl("plain", 5, Vec::new(), Vec::new());
        let comments = vec![
            CommentToken {
                line: 3,
                text: "// spawncheck:spawner".to_string(),
            },
            CommentToken {
                line: 4,
                text: "// spawncheck:ignore".to_string(),
            },
        ];
        assert!(check(&unnecessary, &comments).is_none());
    }

    #[test]
    fn test_spawn_inside_closure_does_not_qualify() {
        // fn := func() { g.Go(...) } only assigns; the decl itself spawns nothing.
        let inner = Expr::Closure(Closure {
            params: Vec::new(),
            body: vec![pool_submit(7, empty_closure(7))],
            span: Span::new(6, 8),
        });
        let d = decl(
            "assigns",
            5,
            Vec::new(),
            vec![Stmt::Bind(crate::facts::Bind {
                name: "fn".to_string(),
                ty: Some(TypeRef::Func(FuncSig::default())),
                value: Some(inner),
            })],
        );
        assert!(check(&d, &[]).is_none());
    }

    #[test]
    fn test_direct_spawn_qualifies() {
        let d = decl(
            "launcher",
            5,
            Vec::new(),
            vec![Stmt::Spawn(Call {
                callee: Callee::Value(Box::new(Expr::Ident("task".to_string()))),
                args: Vec::new(),
                span: Span::new(6, 2),
            })],
        );
        let v = check(&d, &[]).unwrap();
        assert_eq!(v.rule, ViolationRule::MissingSpawnerLabel);
        assert!(v.message.contains("spawns a goroutine"));
    }
}
