//! Integration tests for the check command flow: configuration discovery,
//! facts collection, and exit codes.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use spawncheck::cli::{run_check, CheckArgs, EXIT_FAILED, EXIT_SUCCESS};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn check_args(path: PathBuf) -> CheckArgs {
    CheckArgs {
        path,
        config: None,
        format: "json".to_string(),
        carriers: None,
        deriver: None,
    }
}

#[test]
fn test_check_fails_on_findings() {
    let mut args = check_args(testdata_path().join("basic.json"));
    args.config = Some(testdata_path().join("basic.yaml"));

    let code = run_check(&args).expect("check should run");
    assert_eq!(code, EXIT_FAILED);
}

#[test]
fn test_check_passes_on_clean_unit() {
    let temp = TempDir::new().unwrap();
    let facts = temp.path().join("clean.json");
    fs::write(
        &facts,
        r#"{
            "path": "clean.go",
            "package": "example.com/app",
            "decls": [{"name": "main", "span": {"line": 3}, "body": []}]
        }"#,
    )
    .unwrap();

    let code = run_check(&check_args(facts)).expect("check should run");
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn test_check_discovers_config_next_to_facts() {
    let temp = TempDir::new().unwrap();

    // A config that disables every rule makes the bad unit pass, proving
    // discovery picked it up.
    fs::write(
        temp.path().join("spawncheck.yaml"),
        r#"
checks:
  goroutine: false
  pool: false
  pool_try: false
  waitgroup: false
  creator: false
  spawner_label: false
"#,
    )
    .unwrap();
    fs::copy(testdata_path().join("basic.json"), temp.path().join("basic.json")).unwrap();

    let code = run_check(&check_args(temp.path().to_path_buf())).expect("check should run");
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn test_check_carrier_flag_override() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("spawncheck.yaml"),
        "checks:\n  spawner_label: false\n",
    )
    .unwrap();
    fs::copy(
        testdata_path().join("carrier.json"),
        temp.path().join("carrier.json"),
    )
    .unwrap();

    // Without the carrier the unit is clean; the flag turns the bad decl
    // into a finding.
    let mut args = check_args(temp.path().to_path_buf());
    assert_eq!(run_check(&args).unwrap(), EXIT_SUCCESS);

    args.carriers = Some("github.com/acme/web.Context".to_string());
    assert_eq!(run_check(&args).unwrap(), EXIT_FAILED);
}

#[test]
fn test_check_rejects_unknown_format() {
    let mut args = check_args(testdata_path().join("basic.json"));
    args.format = "xml".to_string();
    assert!(run_check(&args).is_err());
}

#[test]
fn test_check_errors_on_empty_directory() {
    let temp = TempDir::new().unwrap();
    assert!(run_check(&check_args(temp.path().to_path_buf())).is_err());
}
