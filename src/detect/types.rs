//! Core types for analysis results.

use serde::{Deserialize, Serialize};

/// Severity levels for violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Rule names for different violation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationRule {
    #[serde(rename = "goroutine_context")]
    GoroutineContext,
    #[serde(rename = "pool_context")]
    PoolContext,
    #[serde(rename = "waitgroup_context")]
    WaitgroupContext,
    #[serde(rename = "creator_context")]
    CreatorContext,
    #[serde(rename = "goroutine_derive")]
    GoroutineDerive,
    #[serde(rename = "missing_spawner_label")]
    MissingSpawnerLabel,
    #[serde(rename = "unnecessary_spawner_label")]
    UnnecessarySpawnerLabel,
}

impl ViolationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationRule::GoroutineContext => "goroutine_context",
            ViolationRule::PoolContext => "pool_context",
            ViolationRule::WaitgroupContext => "waitgroup_context",
            ViolationRule::CreatorContext => "creator_context",
            ViolationRule::GoroutineDerive => "goroutine_derive",
            ViolationRule::MissingSpawnerLabel => "missing_spawner_label",
            ViolationRule::UnnecessarySpawnerLabel => "unnecessary_spawner_label",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "goroutine_context" => Some(ViolationRule::GoroutineContext),
            "pool_context" => Some(ViolationRule::PoolContext),
            "waitgroup_context" => Some(ViolationRule::WaitgroupContext),
            "creator_context" => Some(ViolationRule::CreatorContext),
            "goroutine_derive" => Some(ViolationRule::GoroutineDerive),
            "missing_spawner_label" => Some(ViolationRule::MissingSpawnerLabel),
            "unnecessary_spawner_label" => Some(ViolationRule::UnnecessarySpawnerLabel),
            _ => None,
        }
    }

    /// The severity a violation of this rule carries.
    pub fn severity(&self) -> Severity {
        match self {
            ViolationRule::UnnecessarySpawnerLabel => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for ViolationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of evaluating one rule against one site or declaration.
///
/// Not-applicable outcomes are never surfaced; the reason exists for tests
/// and tracing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Satisfied,
    Violated,
    NotApplicable(&'static str),
}

impl Verdict {
    pub fn is_violated(&self) -> bool {
        matches!(self, Verdict::Violated)
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, Verdict::Satisfied)
    }
}

/// A single finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub rule: ViolationRule,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub severity: Severity,
}

impl Violation {
    /// Create a unique key for this violation (for deduplication/comparison).
    pub fn key(&self) -> String {
        format!("{}|{}|{}|{}", self.rule, self.file, self.line, self.message)
    }
}

/// Results of running the analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub violations: Vec<Violation>,
    /// Number of compilation units analyzed.
    pub scanned: usize,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: AnalysisResult) {
        self.violations.extend(other.violations);
        self.scanned += other.scanned;
    }

    /// Add a violation to the result.
    pub fn add_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Check if there are any error-severity violations.
    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == Severity::Error)
    }

    /// Sort findings by location then rule id. Units may be analyzed on
    /// parallel workers; this makes the final output deterministic.
    pub fn sort_violations(&mut self) {
        self.violations.sort_by(|a, b| {
            (&a.file, a.line, a.col, a.rule.as_str()).cmp(&(
                &b.file,
                b.line,
                b.col,
                b.rule.as_str(),
            ))
        });
    }
}
