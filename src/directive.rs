//! Comment directives and the per-unit directive index.
//!
//! Supported directive comments:
//! - `// spawncheck:ignore` suppresses findings on this or the next line
//! - `// spawncheck:spawner` marks the next declaration as a spawn point
//! - `// spawncheck:goroutine_creator` marks the next declaration as a
//!   function that launches its function arguments concurrently
//! - `// spawncheck:helper` is informational only, never alters rule outcomes
//!
//! Anything that does not match a known keyword exactly is treated as absence
//! of a directive: malformed directives fail open to avoid false positives.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::facts::{Callee, CommentToken, FunctionDecl, UnitFacts};

/// Kind of a recognized directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Ignore,
    Spawner,
    GoroutineCreator,
    Helper,
}

impl DirectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::Ignore => "ignore",
            DirectiveKind::Spawner => "spawner",
            DirectiveKind::GoroutineCreator => "goroutine_creator",
            DirectiveKind::Helper => "helper",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ignore" => Some(DirectiveKind::Ignore),
            "spawner" => Some(DirectiveKind::Spawner),
            "goroutine_creator" => Some(DirectiveKind::GoroutineCreator),
            "helper" => Some(DirectiveKind::Helper),
            _ => None,
        }
    }
}

lazy_static! {
    /// Matches `spawncheck:<keyword>` in a raw comment token. The keyword is
    /// validated separately so unknown keywords degrade to no directive.
    static ref DIRECTIVE_PATTERN: Regex =
        Regex::new(r"(?:^|[^[:word:]])spawncheck:([a-z_]+)").unwrap();
}

/// Parse a directive from raw comment text.
/// Returns None for comments without a recognized directive.
pub fn parse_comment(text: &str) -> Option<DirectiveKind> {
    let caps = DIRECTIVE_PATTERN.captures(text)?;
    DirectiveKind::parse(caps.get(1)?.as_str())
}

/// Line-indexed directives for one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct DirectiveIndex {
    lines: HashMap<u32, DirectiveKind>,
}

impl DirectiveIndex {
    /// Build the index from a unit's comment tokens.
    pub fn build(comments: &[CommentToken]) -> Self {
        let mut lines = HashMap::new();
        for comment in comments {
            if let Some(kind) = parse_comment(&comment.text) {
                lines.insert(comment.line, kind);
            }
        }
        Self { lines }
    }

    /// Whether a finding reported at the given line is suppressed.
    /// An ignore directive applies to its own line and the line after it.
    pub fn is_ignored(&self, line: u32) -> bool {
        let on_same_line = matches!(self.lines.get(&line), Some(DirectiveKind::Ignore));
        let on_prev_line =
            line > 0 && matches!(self.lines.get(&(line - 1)), Some(DirectiveKind::Ignore));
        on_same_line || on_prev_line
    }

    /// Directives anchored to a declaration starting at the given line:
    /// the run of directive comments immediately above it.
    pub fn decl_directives(&self, decl_line: u32) -> Vec<DirectiveKind> {
        let mut out = Vec::new();
        let mut line = decl_line.saturating_sub(1);
        while line > 0 {
            match self.lines.get(&line) {
                Some(kind) => {
                    out.push(*kind);
                    line -= 1;
                }
                None => break,
            }
        }
        out
    }

    /// Whether a declaration at the given line carries the directive.
    pub fn decl_has(&self, decl_line: u32, kind: DirectiveKind) -> bool {
        self.decl_directives(decl_line).contains(&kind)
    }
}

/// Functions marked `spawncheck:goroutine_creator` across a whole run.
/// Creator marks propagate exactly one call level: a call site is a
/// concurrency point only when it directly calls a marked function.
#[derive(Debug, Clone, Default)]
pub struct CreatorSet {
    funcs: HashSet<(String, String)>,
    methods: HashSet<(String, String, String)>,
}

impl CreatorSet {
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty() && self.methods.is_empty()
    }

    pub fn insert_decl(&mut self, package: &str, decl: &FunctionDecl) {
        match &decl.receiver {
            Some(recv) => {
                self.methods
                    .insert((package.to_string(), recv.clone(), decl.name.clone()));
            }
            None => {
                self.funcs
                    .insert((package.to_string(), decl.name.clone()));
            }
        }
    }

    /// If the callee is a marked creator, return its display name.
    /// Bare callee paths resolve to the calling unit's package.
    pub fn creator_name<'a>(&self, callee: &'a Callee, package: &str) -> Option<&'a str> {
        match callee {
            Callee::Func(id) => {
                let path = if id.path.is_empty() {
                    package
                } else {
                    id.path.as_str()
                };
                self.funcs
                    .contains(&(path.to_string(), id.name.clone()))
                    .then_some(id.name.as_str())
            }
            Callee::Method { recv, name } => self
                .methods
                .contains(&(recv.path.clone(), recv.name.clone(), name.clone()))
                .then_some(name.as_str()),
            _ => None,
        }
    }
}

/// Collect creator marks from all units. The whole pass is scanned before any
/// rule evaluates, so cross-unit creator calls resolve.
pub fn collect_creators(units: &[UnitFacts]) -> CreatorSet {
    let mut set = CreatorSet::default();
    for unit in units {
        let index = DirectiveIndex::build(&unit.comments);
        for decl in &unit.decls {
            if index.decl_has(decl.span.line, DirectiveKind::GoroutineCreator) {
                set.insert_decl(&unit.package, decl);
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FuncId, Span, TypeId};

    fn comment(line: u32, text: &str) -> CommentToken {
        CommentToken {
            line,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_comment() {
        assert_eq!(
            parse_comment("// spawncheck:ignore"),
            Some(DirectiveKind::Ignore)
        );
        assert_eq!(
            parse_comment("//spawncheck:spawner"),
            Some(DirectiveKind::Spawner)
        );
        assert_eq!(
            parse_comment("spawncheck:goroutine_creator"),
            Some(DirectiveKind::GoroutineCreator)
        );
        assert_eq!(
            parse_comment("// spawncheck:ignore -- flaky upstream"),
            Some(DirectiveKind::Ignore)
        );
    }

    #[test]
    fn test_malformed_directives_fail_open() {
        assert_eq!(parse_comment("// spawncheck:ignored"), None);
        assert_eq!(parse_comment("// spawncheck: ignore"), None);
        assert_eq!(parse_comment("// some regular comment"), None);
        assert_eq!(parse_comment("// notspawncheck:ignore"), None);
    }

    #[test]
    fn test_ignore_same_and_previous_line() {
        let index = DirectiveIndex::build(&[comment(10, "// spawncheck:ignore")]);
        assert!(index.is_ignored(10));
        assert!(index.is_ignored(11));
        assert!(!index.is_ignored(9));
        assert!(!index.is_ignored(12));
    }

    #[test]
    fn test_decl_directives_stacked() {
        // helper above spawner, both anchored to a decl on line 12
        let index = DirectiveIndex::build(&[
            comment(10, "// spawncheck:helper"),
            comment(11, "// spawncheck:spawner"),
        ]);
        assert!(index.decl_has(12, DirectiveKind::Spawner));
        assert!(index.decl_has(12, DirectiveKind::Helper));
        assert!(!index.decl_has(12, DirectiveKind::Ignore));
        // A blank line between directives and the decl breaks anchoring.
        assert!(!index.decl_has(13, DirectiveKind::Spawner));
    }

    #[test]
    fn test_collect_creators() {
        let unit = UnitFacts {
            path: "creator.go".to_string(),
            package: "example.com/app".to_string(),
            decls: vec![
                FunctionDecl {
                    name: "startWorker".to_string(),
                    receiver: None,
                    params: Vec::new(),
                    body: Some(Vec::new()),
                    span: Span::new(5, 1),
                },
                FunctionDecl {
                    name: "plain".to_string(),
                    receiver: None,
                    params: Vec::new(),
                    body: Some(Vec::new()),
                    span: Span::new(12, 1),
                },
            ],
            comments: vec![comment(4, "// spawncheck:goroutine_creator")],
        };
        let creators = collect_creators(&[unit]);

        let marked = Callee::Func(FuncId::new("example.com/app", "startWorker"));
        assert_eq!(
            creators.creator_name(&marked, "example.com/app"),
            Some("startWorker")
        );

        // Bare callee names resolve against the calling unit's package.
        let local = Callee::Func(FuncId::new("", "startWorker"));
        assert_eq!(
            creators.creator_name(&local, "example.com/app"),
            Some("startWorker")
        );
        assert_eq!(creators.creator_name(&local, "example.com/other"), None);

        let unmarked = Callee::Func(FuncId::new("example.com/app", "plain"));
        assert_eq!(creators.creator_name(&unmarked, "example.com/app"), None);
    }

    #[test]
    fn test_method_creator() {
        let unit = UnitFacts {
            path: "pool.go".to_string(),
            package: "example.com/pool".to_string(),
            decls: vec![FunctionDecl {
                name: "Submit".to_string(),
                receiver: Some("Pool".to_string()),
                params: Vec::new(),
                body: Some(Vec::new()),
                span: Span::new(8, 1),
            }],
            comments: vec![comment(7, "// spawncheck:goroutine_creator")],
        };
        let creators = collect_creators(&[unit]);

        let callee = Callee::Method {
            recv: TypeId::new("example.com/pool", "Pool"),
            name: "Submit".to_string(),
        };
        assert_eq!(creators.creator_name(&callee, "example.com/app"), Some("Submit"));
    }
}
