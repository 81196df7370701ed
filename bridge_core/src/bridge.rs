use crate::archive::{InputArchiver, ProcessIdentity, SystemIdentity};
use crate::config::{BridgeConfig, FUZZING_CAUSE_DIR_VAR};
use crate::coverage::{CoverageProvider, DlsymCoverageProvider};
use crate::issue::{IssueOutcome, archive_issue};
use crate::reporter::CoverageReporter;
use std::path::Path;
use std::process;

/// The runtime bridge a fuzzed target embeds to talk to the external
/// coverage-guided fuzzing engine.
///
/// The target calls [`on_input_executed`](Bridge::on_input_executed) once
/// per fuzz execution and [`report_issue`](Bridge::report_issue) at most
/// once per execution; the latter never returns. All configuration comes
/// from the environment snapshot captured when the bridge is built, and
/// every failure path either disables an optional behavior or terminates
/// the process. Process aborts happen only in this module.
pub struct Bridge<P: CoverageProvider, ID: ProcessIdentity> {
    config: BridgeConfig,
    provider: P,
    identity: ID,
}

impl Bridge<DlsymCoverageProvider, SystemIdentity> {
    /// Builds the production bridge: environment snapshot, engine coverage
    /// map via dynamic symbol lookup, real process identity.
    pub fn from_env() -> Self {
        Self::new(
            BridgeConfig::from_env(),
            DlsymCoverageProvider::new(),
            SystemIdentity,
        )
    }
}

impl<P: CoverageProvider, ID: ProcessIdentity> Bridge<P, ID> {
    pub fn new(config: BridgeConfig, provider: P, identity: ID) -> Self {
        Self {
            config,
            provider,
            identity,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Per-execution hook; call once for every executed fuzz input.
    ///
    /// Mirrors the input (and its counter record) to external storage when
    /// configured. Archiving failures are logged and never fatal.
    pub fn on_input_executed(&self, path: &Path) {
        let archiver = InputArchiver::new(&self.config, &self.identity);
        if let Err(error) = archiver.on_input_executed(path) {
            eprintln!("Failed to archive input {}: {error}", path.display());
        }
    }

    /// Logs the coverage count for a completed fuzzing cycle when enabled.
    ///
    /// A coverage map that cannot be resolved is a broken hosting
    /// environment and terminates the process.
    pub fn on_cycle_completed(&self, cycle_id: u64) {
        let reporter = CoverageReporter::new(&self.config, &self.provider);
        if let Err(error) = reporter.on_cycle_completed(cycle_id) {
            die(&format!("{error}"));
        }
    }

    /// Writes the configured coverage-map snapshot, if any. Snapshot write
    /// failures are logged and tolerated; resolution failures are fatal.
    pub fn on_run_completed(&self) {
        use crate::reporter::ReportError;

        let reporter = CoverageReporter::new(&self.config, &self.provider);
        match reporter.on_run_completed() {
            Ok(()) => {}
            Err(ReportError::Coverage(error)) => die(&format!("{error}")),
            Err(error) => eprintln!("{error}"),
        }
    }

    /// Reports a reportable condition and terminates the process.
    ///
    /// Flushes a final coverage snapshot first so it survives even if
    /// archiving fails, logs the reason, archives the triggering test case
    /// into the cause directory, and ends in an unconditional abort. The
    /// abnormal termination is deliberate: the engine's forkserver counts
    /// the execution as a crash, and no further target code runs.
    pub fn report_issue(&self, reason: &str, test_case: &Path) -> ! {
        let reporter = CoverageReporter::new(&self.config, &self.provider);
        if let Err(error) = reporter.on_run_completed() {
            eprintln!("{error}");
        }

        eprintln!("Found issue: {reason}");
        match archive_issue(&self.config, reason, test_case) {
            Ok(IssueOutcome::Archived(_)) => {}
            Ok(IssueOutcome::CauseDirUnset) => {
                eprintln!("  Note: {FUZZING_CAUSE_DIR_VAR} env var not set.");
                eprintln!("  This is fine if you're running the target manually.");
            }
            Err(error) => eprintln!("{error}"),
        }
        process::abort();
    }
}

/// Emits a diagnostic and aborts. The only fatal-error exit in the crate
/// besides the unconditional abort at the end of `report_issue`.
fn die(message: &str) -> ! {
    eprintln!("{message}");
    process::abort();
}
