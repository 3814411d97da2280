//! Lint configuration for spawncheck.
//!
//! A configuration names the identities the engine recognizes: the context
//! type, additional carrier types, the builtin launch forms, and the optional
//! deriver requirement. Identities form a small closed registry queried by
//! exact match; nothing here pattern-matches on source text.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::DeriveMatcher;
use crate::facts::{TypeId, TypeRef};

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["spawncheck.yaml", ".spawncheck.yaml"];

/// Top-level lint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// The context type to recognize.
    #[serde(default = "default_context_type")]
    pub context_type: TypeId,
    /// Additional types treated as context-equivalent (e.g. a framework
    /// request context that wraps the real one).
    #[serde(default)]
    pub carriers: Vec<TypeId>,
    /// Deriver requirement. Comma separates alternatives, plus separates
    /// functions that must all be called; each item is `pkg/path.Func` or
    /// `pkg/path.Type.Method`. When set, direct launches must call a deriver
    /// and submit closures may satisfy by deriver call instead of capture.
    #[serde(default)]
    pub deriver: Option<String>,
    #[serde(default)]
    pub checks: Checks,
    #[serde(default)]
    pub launch_forms: LaunchForms,
    /// Glob patterns for facts-file paths to exclude from analysis.
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context_type: default_context_type(),
            carriers: Vec::new(),
            deriver: None,
            checks: Checks::default(),
            launch_forms: LaunchForms::default(),
            excluded_paths: Vec::new(),
        }
    }
}

fn default_context_type() -> TypeId {
    TypeId::new("context", "Context")
}

fn default_true() -> bool {
    true
}

/// Per-rule enable flags (all enabled by default).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Checks {
    #[serde(default = "default_true")]
    pub goroutine: bool,
    #[serde(default = "default_true")]
    pub pool: bool,
    #[serde(default = "default_true")]
    pub pool_try: bool,
    #[serde(default = "default_true")]
    pub waitgroup: bool,
    #[serde(default = "default_true")]
    pub creator: bool,
    #[serde(default = "default_true")]
    pub spawner_label: bool,
}

impl Default for Checks {
    fn default() -> Self {
        Self {
            goroutine: true,
            pool: true,
            pool_try: true,
            waitgroup: true,
            creator: true,
            spawner_label: true,
        }
    }
}

/// Identities of the builtin concurrency-launch forms.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaunchForms {
    #[serde(default = "default_pool_type")]
    pub pool_type: TypeId,
    #[serde(default = "default_pool_submit")]
    pub pool_submit: String,
    #[serde(default = "default_pool_try_submit")]
    pub pool_try_submit: String,
    #[serde(default = "default_waitgroup_type")]
    pub waitgroup_type: TypeId,
    #[serde(default = "default_waitgroup_submit")]
    pub waitgroup_submit: String,
}

impl Default for LaunchForms {
    fn default() -> Self {
        Self {
            pool_type: default_pool_type(),
            pool_submit: default_pool_submit(),
            pool_try_submit: default_pool_try_submit(),
            waitgroup_type: default_waitgroup_type(),
            waitgroup_submit: default_waitgroup_submit(),
        }
    }
}

fn default_pool_type() -> TypeId {
    TypeId::new("golang.org/x/sync/errgroup", "Group")
}

fn default_pool_submit() -> String {
    "Go".to_string()
}

fn default_pool_try_submit() -> String {
    "TryGo".to_string()
}

fn default_waitgroup_type() -> TypeId {
    TypeId::new("sync", "WaitGroup")
}

fn default_waitgroup_submit() -> String {
    "Go".to_string()
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Look for a configuration file with a default name in the given directory.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    /// The identity registry for context-like type matching.
    pub fn registry(&self) -> ContextRegistry<'_> {
        ContextRegistry {
            context: &self.context_type,
            carriers: &self.carriers,
        }
    }

    /// The deriver matcher, if a non-empty deriver is configured.
    /// An unparseable deriver disables derive-mode rules for the run.
    pub fn deriver_matcher(&self) -> Option<DeriveMatcher> {
        self.deriver
            .as_deref()
            .map(DeriveMatcher::parse)
            .filter(|m| !m.is_empty())
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    /// Uses globset for matching, which supports `**` for recursive directory matching.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }
}

/// Parse a comma-separated list of carrier type identities, e.g. from a CLI
/// flag. Invalid entries are skipped rather than rejected.
pub fn parse_carriers(s: &str) -> Vec<TypeId> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<TypeId>().ok())
        .collect()
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    // Validate excluded_paths glob patterns compile
    for pattern in &config.excluded_paths {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    // A deriver that parses to zero groups is a configuration mistake worth
    // surfacing; at runtime it would silently disable derive-mode rules.
    if let Some(deriver) = &config.deriver {
        if !deriver.trim().is_empty() && DeriveMatcher::parse(deriver).is_empty() {
            anyhow::bail!("invalid deriver specification {:?}", deriver);
        }
    }

    Ok(())
}

/// Exact-match registry of context-like type identities.
#[derive(Debug, Clone, Copy)]
pub struct ContextRegistry<'a> {
    context: &'a TypeId,
    carriers: &'a [TypeId],
}

impl ContextRegistry<'_> {
    /// Whether the type is the context type or a configured carrier,
    /// behind any number of pointer layers.
    pub fn is_context_like(&self, ty: &TypeRef) -> bool {
        match ty.as_named() {
            Some(id) => self.matches_id(id),
            None => false,
        }
    }

    /// Whether the identity matches the context type or a carrier exactly.
    pub fn matches_id(&self, id: &TypeId) -> bool {
        id == self.context || self.carriers.iter().any(|c| c == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
context_type: "context.Context"
carriers:
  - "github.com/labstack/echo/v4.Context"
deriver: "github.com/acme/telemetry/apm.NewGoroutineContext"
checks:
  waitgroup: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.context_type, TypeId::new("context", "Context"));
        assert_eq!(config.carriers.len(), 1);
        assert!(config.checks.goroutine);
        assert!(!config.checks.waitgroup);
        assert!(config.deriver_matcher().is_some());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.context_type, TypeId::new("context", "Context"));
        assert_eq!(
            config.launch_forms.pool_type,
            TypeId::new("golang.org/x/sync/errgroup", "Group")
        );
        assert_eq!(config.launch_forms.pool_submit, "Go");
        assert_eq!(config.launch_forms.pool_try_submit, "TryGo");
        assert!(config.deriver_matcher().is_none());
    }

    #[test]
    fn test_registry_matching() {
        let yaml = r#"
carriers:
  - "github.com/acme/web.Context"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let registry = config.registry();

        let ctx = TypeRef::Named(TypeId::new("context", "Context"));
        let carrier = TypeRef::Pointer(Box::new(TypeRef::Named(TypeId::new(
            "github.com/acme/web",
            "Context",
        ))));
        let other = TypeRef::Named(TypeId::new("net/http", "Request"));

        assert!(registry.is_context_like(&ctx));
        assert!(registry.is_context_like(&carrier));
        assert!(!registry.is_context_like(&other));
        assert!(!registry.is_context_like(&TypeRef::Other));
    }

    #[test]
    fn test_parse_carriers_skips_invalid() {
        let carriers = parse_carriers("github.com/acme/web.Context, bogus , ,sync.WaitGroup");
        assert_eq!(
            carriers,
            vec![
                TypeId::new("github.com/acme/web", "Context"),
                TypeId::new("sync", "WaitGroup"),
            ]
        );
    }

    #[test]
    fn test_validate_rejects_bad_glob() {
        let config = Config {
            excluded_paths: vec!["a{".to_string()],
            ..Default::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_deriver_groups() {
        let config = Config {
            deriver: Some(",,".to_string()),
            ..Default::default()
        };
        assert!(validate(&config).is_err());
    }
}
