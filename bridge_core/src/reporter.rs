use crate::config::BridgeConfig;
use crate::coverage::{CoverageError, CoverageProvider};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use thiserror::Error;

/// Errors that can occur while emitting coverage reports.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Coverage map access failed: {0}")]
    Coverage(#[from] CoverageError),
    #[error("Failed to write coverage snapshot: {0}")]
    Io(#[from] io::Error),
}

/// Emits coverage summaries to external sinks when configured.
///
/// Each invocation is a complete, independent snapshot; the reporter keeps
/// no state between calls and may be invoked zero or many times per
/// process lifetime.
pub struct CoverageReporter<'a, P: CoverageProvider + ?Sized> {
    config: &'a BridgeConfig,
    provider: &'a P,
}

impl<'a, P: CoverageProvider + ?Sized> CoverageReporter<'a, P> {
    pub fn new(config: &'a BridgeConfig, provider: &'a P) -> Self {
        Self { config, provider }
    }

    /// Logs the current coverage count for a completed fuzzing cycle.
    ///
    /// No-op unless the `PRINT_COVERAGE` toggle was set when the
    /// configuration snapshot was captured.
    pub fn on_cycle_completed(&self, cycle_id: u64) -> Result<(), CoverageError> {
        if !self.config.print_coverage {
            return Ok(());
        }
        let count = self.provider.coverage_count()?;
        eprintln!("Cycle {cycle_id}: coverage {count}");
        Ok(())
    }

    /// Serializes the full coverage map to the configured snapshot file,
    /// overwriting any previous contents. Does not terminate the process.
    ///
    /// No-op unless `PRINT_COVERAGE_MAP` named an output path.
    pub fn on_run_completed(&self) -> Result<(), ReportError> {
        let Some(path) = &self.config.coverage_map_path else {
            return Ok(());
        };
        let map = self.provider.map()?;
        let mut writer = BufWriter::new(File::create(path)?);
        write_map_snapshot(map, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Writes the snapshot wire format: one group of 8 ASCII binary digits
/// (MSB first) per original map byte, no separators.
pub fn write_map_snapshot<W: Write>(map: &[u8], writer: &mut W) -> io::Result<()> {
    for byte in map {
        write!(writer, "{byte:08b}")?;
    }
    Ok(())
}
