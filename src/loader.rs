//! Loading of facts files produced by a language front-end.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::facts::UnitFacts;

/// Errors from loading a single facts file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Load one facts file. If the unit carries no source path of its own, the
/// facts file path stands in so diagnostics stay attributable.
pub fn load_unit<P: AsRef<Path>>(path: P) -> Result<UnitFacts, LoadError> {
    let path = path.as_ref();
    let display = path.to_string_lossy().to_string();

    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let mut unit: UnitFacts =
        serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: display.clone(),
            source,
        })?;

    if unit.path.is_empty() {
        unit.path = display;
    }
    Ok(unit)
}

/// Load multiple facts files, warning about unreadable ones rather than
/// failing the whole run. Results are sorted by unit path for deterministic
/// ordering.
pub fn load_units(paths: &[PathBuf]) -> anyhow::Result<Vec<UnitFacts>> {
    let mut units = Vec::new();

    for path in paths {
        match load_unit(path) {
            Ok(unit) => units.push(unit),
            Err(e) => {
                eprintln!("Warning: skipping facts file: {}", e);
            }
        }
    }

    units.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(units)
}
