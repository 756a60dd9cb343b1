//! Test helpers for the PMT test stand workspace
//!
//! Locates the workspace root so tests can reach the calibration tables
//! bundled under `data/`, independent of the directory cargo runs them from.

use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};

/// Photocathode quantum efficiency table shipped with the workspace
pub const R7081_QE_TABLE: &str = "R7081_QEWhitespace.csv";

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
}

/// Returns the path to the project root directory.
///
/// Searches upward from the current directory for the Cargo.toml that
/// declares the workspace.
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

/// Lazily initialized project root path
static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// Returns the bundled data directory (`<workspace>/data`).
pub fn data_dir() -> PathBuf {
    PROJECT_ROOT.join("data")
}

/// Returns a path within the bundled data directory.
pub fn data_path<P: AsRef<Path>>(path: P) -> PathBuf {
    data_dir().join(path)
}

/// Path to the default photocathode quantum efficiency table.
pub fn r7081_qe_table() -> PathBuf {
    data_path(R7081_QE_TABLE)
}
