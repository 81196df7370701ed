use crate::config::BridgeConfig;
use crate::fingerprint::{content_fingerprint, fingerprint_hex};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the issue-archiving decision logic.
#[derive(Error, Debug)]
pub enum IssueError {
    /// The triggering test case could not be read back from disk. A missing
    /// test case is an internal-contract violation, not a recoverable
    /// condition; the caller terminates the process.
    #[error("Failed to read test case: {} ({source})", path.display())]
    TestCase { path: PathBuf, source: io::Error },

    /// Copying the test case into the cause directory failed. Best-effort:
    /// logged by the caller, never prevents termination.
    #[error("Failed to copy test case to {}: {source}", dest.display())]
    Copy { dest: PathBuf, source: io::Error },
}

/// Terminal result of the issue-archiving logic.
///
/// The actual process abort lives in
/// [`Bridge::report_issue`](crate::bridge::Bridge::report_issue); keeping
/// the decision logic as a plain function over this result type makes it
/// unit-testable without terminating the test process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// The test case was copied into the cause directory at this path.
    Archived(PathBuf),
    /// No cause directory is configured: a manual/interactive run, nothing
    /// is archived.
    CauseDirUnset,
}

/// Replaces each space in an issue reason with an underscore, so the
/// resulting file names stay easy to handle in shell scripts. No other
/// characters are altered.
pub fn sanitize_reason(reason: &str) -> String {
    reason.replace(' ', "_")
}

/// Returns the path an issue with this reason and fingerprint is saved to:
/// `<causeDir>/<sanitizedReason>%<16 hex chars of the fingerprint>`.
///
/// The fingerprint suffix exists to record duplicates: distinct inputs for
/// the same reason get distinct names, while a repeated (reason, contents)
/// pair maps to the same name by construction.
pub fn issue_save_path(cause_dir: &Path, reason: &str, fingerprint: u64) -> PathBuf {
    cause_dir.join(format!(
        "{}%{}",
        sanitize_reason(reason),
        fingerprint_hex(fingerprint)
    ))
}

/// Archives the test case that triggered a reportable issue.
///
/// Strictly linear, non-resumable: read the test case, fingerprint it,
/// build the save path, copy. A pre-existing destination means the same
/// reason and byte-identical contents were already recorded, so the copy
/// simply overwrites it.
pub fn archive_issue(
    config: &BridgeConfig,
    reason: &str,
    test_case: &Path,
) -> Result<IssueOutcome, IssueError> {
    let Some(cause_dir) = &config.cause_dir else {
        return Ok(IssueOutcome::CauseDirUnset);
    };

    let contents = fs::read(test_case).map_err(|source| IssueError::TestCase {
        path: test_case.to_path_buf(),
        source,
    })?;
    let fingerprint = content_fingerprint(&contents);

    let dest = issue_save_path(cause_dir, reason, fingerprint);
    fs::copy(test_case, &dest).map_err(|source| IssueError::Copy {
        dest: dest.clone(),
        source,
    })?;
    Ok(IssueOutcome::Archived(dest))
}
