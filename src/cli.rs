//! Command-line interface for spawncheck.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{self, Config};
use crate::detect::Runner;
use crate::loader;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Context propagation linter for concurrent launch sites.
///
/// Spawncheck consumes facts files emitted by a language front-end and flags
/// concurrently-executed code that fails to propagate the in-scope context,
/// fails to call a required context deriver, or spawns concurrency without
/// the spawner directive.
#[derive(Parser)]
#[command(name = "spawncheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze facts files against the configured rules
    #[command(visible_alias = "lint")]
    Check(CheckArgs),
    /// Create a new spawncheck configuration from the default template
    Init(InitArgs),
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Path to a facts file, or a directory scanned for *.json facts files
    pub path: PathBuf,

    /// Path to configuration YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty, json, or sarif
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Comma-separated carrier type identities, overriding the configuration
    #[arg(long)]
    pub carriers: Option<String>,

    /// Deriver requirement, overriding the configuration
    #[arg(long)]
    pub deriver: Option<String>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "spawncheck.yaml")]
    pub output: PathBuf,
}

/// The starter configuration written by `spawncheck init`.
const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Run the check command. Returns the process exit code.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    let (mut config, config_display) = load_config(args)?;

    if let Some(carriers) = &args.carriers {
        config.carriers = config::parse_carriers(carriers);
    }
    if let Some(deriver) = &args.deriver {
        config.deriver = Some(deriver.clone());
    }
    config::validate(&config)?;

    let files = collect_facts_files(&args.path, &config)?;
    if files.is_empty() {
        anyhow::bail!("no facts files found under {}", args.path.display());
    }

    let units = loader::load_units(&files)?;
    let runner = Runner::new(config);
    let result = runner.run(&units);

    let path_display = args.path.display().to_string();
    match args.format.as_str() {
        "pretty" => report::write_pretty(&path_display, &config_display, &result),
        "json" => report::write_json(&path_display, &config_display, &result)?,
        "sarif" => report::write_sarif(&result)?,
        other => anyhow::bail!("unknown output format {:?}", other),
    }

    if result.violations.is_empty() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command. Returns the process exit code.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        anyhow::bail!("{} already exists", args.output.display());
    }
    std::fs::write(&args.output, DEFAULT_TEMPLATE)?;
    println!("Wrote {}", args.output.display());
    Ok(EXIT_SUCCESS)
}

/// Load the explicit configuration, or discover one next to the scanned path,
/// falling back to defaults.
fn load_config(args: &CheckArgs) -> anyhow::Result<(Config, String)> {
    if let Some(path) = &args.config {
        let config = Config::parse_file(path)?;
        return Ok((config, path.display().to_string()));
    }

    let search_dir = if args.path.is_dir() {
        args.path.clone()
    } else {
        args.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    match Config::discover(&search_dir) {
        Some(found) => {
            let config = Config::parse_file(&found)?;
            Ok((config, found.display().to_string()))
        }
        None => Ok((Config::default(), "(defaults)".to_string())),
    }
}

/// Collect the facts files to analyze.
fn collect_facts_files(path: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .filter(|p| !config.is_path_excluded(p))
        .collect();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_facts_files_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.json"), "{}").unwrap();
        fs::write(temp.path().join("a.json"), "{}").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();
        fs::create_dir(temp.path().join("vendor")).unwrap();
        fs::write(temp.path().join("vendor/c.json"), "{}").unwrap();

        let config = Config {
            excluded_paths: vec!["**/vendor/**".to_string()],
            ..Default::default()
        };
        let files = collect_facts_files(temp.path(), &config).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_init_writes_template() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("spawncheck.yaml");
        let args = InitArgs {
            output: output.clone(),
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);

        let config = Config::parse_file(&output).unwrap();
        assert!(config.checks.goroutine);

        // Refuses to clobber an existing file.
        assert!(run_init(&args).is_err());
    }
}
