//! Output formatting for spawncheck results.
//!
//! Supports three output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::detect::{AnalysisResult, Severity, Violation};

// =============================================================================
// JSON Format
// =============================================================================

/// JSON report envelope.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub config: String,
    pub units_scanned: usize,
    pub passed: bool,
    pub violations: Vec<JsonViolation>,
    pub breakdown: Vec<BreakdownEntry>,
}

/// JSON violation structure.
#[derive(Serialize, Deserialize)]
pub struct JsonViolation {
    pub rule: String,
    pub severity: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Per-rule violation counts.
#[derive(Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub rule: String,
    pub violations: usize,
}

/// Build the JSON report value.
pub fn build_json_report(path: &str, config_path: &str, result: &AnalysisResult) -> JsonReport {
    let violations: Vec<JsonViolation> = result.violations.iter().map(violation_to_json).collect();

    // BTreeMap keeps the breakdown stably ordered by rule id.
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in &result.violations {
        *counts.entry(v.rule.as_str()).or_insert(0) += 1;
    }
    let breakdown = counts
        .into_iter()
        .map(|(rule, violations)| BreakdownEntry {
            rule: rule.to_string(),
            violations,
        })
        .collect();

    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        config: config_path.to_string(),
        units_scanned: result.scanned,
        passed: result.violations.is_empty(),
        violations,
        breakdown,
    }
}

/// Write results in JSON format.
pub fn write_json(path: &str, config_path: &str, result: &AnalysisResult) -> anyhow::Result<()> {
    let report = build_json_report(path, config_path, result);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

fn violation_to_json(v: &Violation) -> JsonViolation {
    JsonViolation {
        rule: v.rule.as_str().to_string(),
        severity: v.severity.to_string(),
        file: v.file.clone(),
        line: v.line,
        column: v.col,
        message: v.message.clone(),
    }
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "spawncheck";
const INFO_URI: &str = "https://github.com/zen-systems/spawncheck";

#[derive(Serialize, Deserialize)]
pub struct SarifReport {
    version: String,
    #[serde(rename = "$schema")]
    schema: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize, Deserialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize, Deserialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize, Deserialize)]
struct SarifDriver {
    name: String,
    version: String,
    #[serde(rename = "informationUri")]
    information_uri: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize, Deserialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
}

#[derive(Serialize, Deserialize)]
struct SarifRuleConfig {
    level: String,
}

#[derive(Serialize, Deserialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize, Deserialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize, Deserialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    region: SarifRegion,
}

#[derive(Serialize, Deserialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize, Deserialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: u32,
    #[serde(rename = "startColumn")]
    start_column: u32,
}

/// Rule metadata for SARIF output.
struct RuleInfo {
    name: &'static str,
    short_description: &'static str,
    default_level: &'static str,
}

fn get_rule_info(rule_id: &str) -> RuleInfo {
    match rule_id {
        "goroutine_context" => RuleInfo {
            name: "GoroutineContext",
            short_description: "Detects goroutines that do not propagate the in-scope context",
            default_level: "error",
        },
        "pool_context" => RuleInfo {
            name: "PoolContext",
            short_description: "Detects pool submit closures that do not use the in-scope context",
            default_level: "error",
        },
        "waitgroup_context" => RuleInfo {
            name: "WaitGroupContext",
            short_description: "Detects wait-group closures that do not use the in-scope context",
            default_level: "error",
        },
        "creator_context" => RuleInfo {
            name: "CreatorContext",
            short_description: "Detects func arguments to marked creator functions that ignore context",
            default_level: "error",
        },
        "goroutine_derive" => RuleInfo {
            name: "GoroutineDerive",
            short_description: "Detects goroutines that do not call the configured context deriver",
            default_level: "error",
        },
        "missing_spawner_label" => RuleInfo {
            name: "MissingSpawnerLabel",
            short_description: "Detects spawning functions missing the spawner directive",
            default_level: "error",
        },
        "unnecessary_spawner_label" => RuleInfo {
            name: "UnnecessarySpawnerLabel",
            short_description: "Detects spawner directives on functions that spawn nothing",
            default_level: "warning",
        },
        _ => RuleInfo {
            name: "Unknown",
            short_description: "Unknown rule type",
            default_level: "warning",
        },
    }
}

fn map_severity_to_level(severity: &Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

/// Build the SARIF report value.
pub fn build_sarif_report(result: &AnalysisResult) -> SarifReport {
    // Collect unique rules from violations
    let rule_set: HashSet<String> = result
        .violations
        .iter()
        .map(|v| v.rule.as_str().to_string())
        .collect();
    let mut rule_ids: Vec<String> = rule_set.into_iter().collect();
    rule_ids.sort();

    let rules: Vec<SarifRule> = rule_ids
        .iter()
        .map(|rule_id| {
            let info = get_rule_info(rule_id);
            SarifRule {
                id: rule_id.clone(),
                name: info.name.to_string(),
                short_description: SarifMessage {
                    text: info.short_description.to_string(),
                },
                default_config: SarifRuleConfig {
                    level: info.default_level.to_string(),
                },
            }
        })
        .collect();

    let results: Vec<SarifResult> = result
        .violations
        .iter()
        .map(|v| SarifResult {
            rule_id: v.rule.as_str().to_string(),
            level: map_severity_to_level(&v.severity).to_string(),
            message: SarifMessage {
                text: v.message.clone(),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifact {
                        uri: v.file.clone(),
                    },
                    region: SarifRegion {
                        start_line: if v.line > 0 { v.line } else { 1 },
                        start_column: if v.col > 0 { v.col } else { 1 },
                    },
                },
            }],
        })
        .collect();

    SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    information_uri: INFO_URI.to_string(),
                    rules,
                },
            },
            results,
        }],
    }
}

/// Write results in SARIF format.
pub fn write_sarif(result: &AnalysisResult) -> anyhow::Result<()> {
    let report = build_sarif_report(result);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(path: &str, config_path: &str, result: &AnalysisResult) {
    // Header
    println!();
    print!("  ");
    print!("{}", "spawncheck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", path);
    print!("  {}", "Config:   ".dimmed());
    println!("{}", config_path);
    println!();

    if result.violations.is_empty() {
        print!("  {}", "✓ PASS".green());
        println!(
            "  {}",
            format!("{} unit(s) scanned, no findings", result.scanned).dimmed()
        );
        println!();
        return;
    }

    print!("  {}", "✗ FAIL".red());
    println!(
        "  {}",
        format!(
            "{} unit(s) scanned, {} finding(s)",
            result.scanned,
            result.violations.len()
        )
        .dimmed()
    );
    println!();

    write_violations(&result.violations);
}

fn write_violations(violations: &[Violation]) {
    println!("  {} ({}):", "Findings".bold(), violations.len());
    println!();

    for v in violations {
        write_severity_tag(&v.severity);
        print!("   ");
        print!("{:<26}", v.rule.as_str().dimmed());
        print!("{}", v.file.blue());
        if v.line > 0 {
            print!("{}", format!(":{}:{}", v.line, v.col).dimmed());
        }
        println!();

        // Message on next line, indented
        println!("            {}", v.message);
        println!();
    }
}

fn write_severity_tag(severity: &Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}
