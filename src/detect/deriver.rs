//! Deriver function specifications and OR/AND matching.
//!
//! A deriver requirement is a string of alternatives separated by commas;
//! within an alternative, plus joins functions that must all be called.
//! `"a.Fork,b.Trace.Start+b.Attach"` is satisfied by a call to `a.Fork`, or
//! by calls to both `b.Trace.Start` and `b.Attach`.

use crate::facts::Callee;

/// Parsed components of one derive function specification.
/// Format: `pkg/path.Func` or `pkg/path.Type.Method`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveSpec {
    pub pkg_path: String,
    /// Set for method specifications; type names start with an uppercase letter.
    pub type_name: Option<String>,
    pub func_name: String,
}

/// Parse a single derive function string into components.
pub fn parse_spec(s: &str) -> DeriveSpec {
    let Some(last_dot) = s.rfind('.') else {
        return DeriveSpec {
            pkg_path: String::new(),
            type_name: None,
            func_name: s.to_string(),
        };
    };

    let func_name = s[last_dot + 1..].to_string();
    let prefix = &s[..last_dot];

    // A second dot may separate the package path from a type name.
    if let Some(second_dot) = prefix.rfind('.') {
        let potential = &prefix[second_dot + 1..];
        let is_type = potential
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase())
            .unwrap_or(false);
        if is_type {
            return DeriveSpec {
                pkg_path: prefix[..second_dot].to_string(),
                type_name: Some(potential.to_string()),
                func_name,
            };
        }
    }

    DeriveSpec {
        pkg_path: prefix.to_string(),
        type_name: None,
        func_name,
    }
}

/// OR/AND matcher over derive function specifications.
#[derive(Debug, Clone)]
pub struct DeriveMatcher {
    /// Alternatives; each inner group must be fully satisfied.
    pub groups: Vec<Vec<DeriveSpec>>,
    /// The original specification string, used in messages.
    pub original: String,
}

impl DeriveMatcher {
    /// Parse a deriver requirement string. Empty parts are skipped.
    pub fn parse(s: &str) -> Self {
        let mut groups = Vec::new();

        for or_part in s.split(',') {
            let or_part = or_part.trim();
            if or_part.is_empty() {
                continue;
            }

            let group: Vec<DeriveSpec> = or_part
                .split('+')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(parse_spec)
                .collect();

            if !group.is_empty() {
                groups.push(group);
            }
        }

        Self {
            groups,
            original: s.to_string(),
        }
    }

    /// True if no derive functions are configured.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether the callee matches any spec in any group.
    pub fn matches_callee(&self, callee: &Callee) -> bool {
        self.groups
            .iter()
            .flatten()
            .any(|spec| spec_matches(spec, callee))
    }

    /// Whether the collected calls satisfy any group completely.
    pub fn satisfied(&self, calls: &[&Callee]) -> bool {
        self.groups.iter().any(|group| {
            group
                .iter()
                .all(|spec| calls.iter().any(|callee| spec_matches(spec, callee)))
        })
    }
}

fn spec_matches(spec: &DeriveSpec, callee: &Callee) -> bool {
    match callee {
        Callee::Func(id) => {
            spec.type_name.is_none() && id.name == spec.func_name && id.path == spec.pkg_path
        }
        Callee::Method { recv, name } => {
            spec.type_name.as_deref() == Some(recv.name.as_str())
                && recv.path == spec.pkg_path
                && *name == spec.func_name
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FuncId, TypeId};

    #[test]
    fn test_parse_spec_function() {
        let spec = parse_spec("github.com/acme/telemetry/apm.NewGoroutineContext");
        assert_eq!(spec.pkg_path, "github.com/acme/telemetry/apm");
        assert_eq!(spec.type_name, None);
        assert_eq!(spec.func_name, "NewGoroutineContext");
    }

    #[test]
    fn test_parse_spec_method() {
        let spec = parse_spec("github.com/acme/telemetry/apm.Tracer.Fork");
        assert_eq!(spec.pkg_path, "github.com/acme/telemetry/apm");
        assert_eq!(spec.type_name, Some("Tracer".to_string()));
        assert_eq!(spec.func_name, "Fork");
    }

    #[test]
    fn test_parse_spec_bare_name() {
        let spec = parse_spec("fork");
        assert_eq!(spec.pkg_path, "");
        assert_eq!(spec.type_name, None);
        assert_eq!(spec.func_name, "fork");
    }

    #[test]
    fn test_parse_matcher_or_and() {
        let m = DeriveMatcher::parse("a.Fork, b.Trace.Start + b.Attach");
        assert_eq!(m.groups.len(), 2);
        assert_eq!(m.groups[0].len(), 1);
        assert_eq!(m.groups[1].len(), 2);
        assert!(!m.is_empty());

        let empty = DeriveMatcher::parse(" , ,");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_satisfied_or_semantics() {
        let m = DeriveMatcher::parse("apm.Fork,apm.Renew");
        let fork = Callee::Func(FuncId::new("apm", "Fork"));
        let other = Callee::Func(FuncId::new("apm", "Detach"));

        assert!(m.satisfied(&[&fork]));
        assert!(!m.satisfied(&[&other]));
        assert!(!m.satisfied(&[]));
    }

    #[test]
    fn test_satisfied_and_semantics() {
        let m = DeriveMatcher::parse("apm.Fork+apm.Attach");
        let fork = Callee::Func(FuncId::new("apm", "Fork"));
        let attach = Callee::Func(FuncId::new("apm", "Attach"));

        assert!(!m.satisfied(&[&fork]));
        assert!(m.satisfied(&[&fork, &attach]));
    }

    #[test]
    fn test_method_spec_matching() {
        let m = DeriveMatcher::parse("github.com/acme/apm.Tracer.Fork");
        let method = Callee::Method {
            recv: TypeId::new("github.com/acme/apm", "Tracer"),
            name: "Fork".to_string(),
        };
        let func = Callee::Func(FuncId::new("github.com/acme/apm", "Fork"));

        assert!(m.matches_callee(&method));
        assert!(!m.matches_callee(&func));
    }

    #[test]
    fn test_wrong_package_does_not_match() {
        let m = DeriveMatcher::parse("apm.Fork");
        let other_pkg = Callee::Func(FuncId::new("tracing", "Fork"));
        assert!(!m.matches_callee(&other_pkg));
    }
}
