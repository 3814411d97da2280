//! Rule evaluation for context propagation at concurrency launch sites.

mod deriver;
mod launch;
mod runner;
mod scope;
mod spawner;
mod types;
mod usage;

pub use deriver::{parse_spec, DeriveMatcher, DeriveSpec};
pub use launch::{ConcurrencyPoint, LaunchKind, Locator};
pub use runner::Runner;
pub use scope::{find_context_scope, has_context_param, ContextScope};
pub use spawner::check_decl as check_spawner_label;
pub use types::{AnalysisResult, Severity, Verdict, Violation, ViolationRule};
pub use usage::{check_closure_derive, check_closure_direct, LiveSet};
