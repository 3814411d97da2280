//! Spawncheck - context propagation linter for concurrent launch sites.
//!
//! Spawncheck flags concurrently-executed code that loses the in-scope
//! cancellation/tracing context: goroutine launches, task-pool submits and
//! wait-group tasks whose closures never reference a context candidate, fail
//! to call a configured context deriver, or spawn concurrency from a function
//! missing the spawner directive.
//!
//! # Architecture
//!
//! Parsing and type resolution stay in an external front-end; the engine
//! consumes serialized facts and evaluates rules over them:
//!
//! - `facts`: the serde contract for front-end-emitted compilation units
//! - `loader`: facts-file loading
//! - `config`: YAML configuration and the type-identity registry
//! - `directive`: comment directives (ignore, spawner, goroutine_creator)
//! - `detect`: the rule engine - scope resolution, launch-point location,
//!   shadow-aware usage analysis, spawner labels, and the driver
//! - `report`: output formatting (pretty, JSON, SARIF)
//!
//! Units are immutable once loaded, so the driver analyzes them on parallel
//! workers and sorts findings for deterministic output.

pub mod cli;
pub mod config;
pub mod detect;
pub mod directive;
pub mod facts;
pub mod loader;
pub mod report;

pub use config::Config;
pub use detect::{AnalysisResult, Runner, Severity, Verdict, Violation, ViolationRule};
pub use facts::{FunctionDecl, UnitFacts};
