//! Comparison of captured output against stored golden records.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::diff::unified_diff;

/// Well-known golden record of the SonarQube scan report.
pub const SONAR_SCAN_GOLDEN: &str = "golden/sonar-scan.json";

#[derive(Debug, Error)]
pub enum GoldenError {
    #[error("failed to load golden file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The assertion itself failed; `diff` is `-want +got`.
    #[error("{subject} mismatch at line {line} (-want +got):\n{diff}")]
    Mismatch {
        subject: String,
        line: usize,
        diff: String,
    },
}

/// Checks that the executed stages of a run match `golden_path`.
pub fn compare_stages(
    component_id: &str,
    run_kind: &str,
    golden_path: impl AsRef<Path>,
    actual: &str,
) -> Result<(), GoldenError> {
    compare_file(
        golden_path.as_ref(),
        actual,
        || format!("stages for {run_kind} of {component_id}"),
    )
}

/// Checks a scan report against [`SONAR_SCAN_GOLDEN`].
pub fn compare_scan(component_id: &str, actual: &str) -> Result<(), GoldenError> {
    compare_scan_at(component_id, SONAR_SCAN_GOLDEN, actual)
}

pub fn compare_scan_at(
    component_id: &str,
    golden_path: impl AsRef<Path>,
    actual: &str,
) -> Result<(), GoldenError> {
    compare_file(golden_path.as_ref(), actual, || {
        format!("scan for {component_id}")
    })
}

fn compare_file(
    path: &Path,
    actual: &str,
    subject: impl FnOnce() -> String,
) -> Result<(), GoldenError> {
    let want = std::fs::read_to_string(path).map_err(|source| GoldenError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    match unified_diff(&want, actual) {
        None => Ok(()),
        Some(d) => Err(GoldenError::Mismatch {
            subject: subject(),
            line: d.first_line,
            diff: d.text,
        }),
    }
}
