pub mod archive;
pub mod bridge;
pub mod config;
pub mod coverage;
pub mod fingerprint;
pub mod issue;
pub mod reporter;

pub use archive::{ArchiveError, FixedIdentity, InputArchiver, ProcessIdentity, SystemIdentity};
pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use coverage::{CoverageError, CoverageProvider, DlsymCoverageProvider, FixedCoverageProvider};
pub use fingerprint::{content_fingerprint, fingerprint_hex};
pub use issue::{IssueError, IssueOutcome, archive_issue, issue_save_path, sanitize_reason};
pub use reporter::{CoverageReporter, ReportError};
