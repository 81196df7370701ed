use crate::config::BridgeConfig;
use crate::fingerprint::content_fingerprint;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// 2024-01-01 as a custom epoch for counter-record timestamps. Relative
/// values stay short when millions of records are logged.
pub const COUNTER_EPOCH_SECS: u64 = 1_704_063_600;

/// Errors that can arise while archiving executed inputs.
///
/// None of these are fatal to the target: the per-input hook logs them
/// and continues, since input mirroring is purely an offline-analysis aid.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The executed input file could not be read back for hashing.
    #[error("Failed to read input file {}: {source}", path.display())]
    ReadInput { path: PathBuf, source: io::Error },

    /// Copying the input into the storage directory failed.
    #[error("Failed to copy input to {}: {source}", dest.display())]
    Copy { dest: PathBuf, source: io::Error },

    /// Appending to the per-parent counter file failed.
    #[error("Failed to append counter record to {}: {source}", path.display())]
    Counter { path: PathBuf, source: io::Error },

    /// The system clock reported a time before the unix epoch.
    #[error("System clock is before the unix epoch")]
    Clock,
}

/// Identity of the process executing fuzz inputs.
///
/// The archiver names its outputs by (pid, parent pid) so that many forked
/// workers can archive concurrently without colliding; injecting the
/// identity lets tests simulate arbitrary process pairs.
pub trait ProcessIdentity: Send + Sync {
    fn pid(&self) -> u32;
    fn parent_pid(&self) -> u32;
}

/// The real identity of the calling process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentity;

impl ProcessIdentity for SystemIdentity {
    fn pid(&self) -> u32 {
        // Safety: getpid and getppid are always-successful syscalls.
        unsafe { libc::getpid() as u32 }
    }

    fn parent_pid(&self) -> u32 {
        unsafe { libc::getppid() as u32 }
    }
}

/// A fixed (pid, parent pid) pair for tests and simulations.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdentity {
    pub pid: u32,
    pub parent_pid: u32,
}

impl ProcessIdentity for FixedIdentity {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn parent_pid(&self) -> u32 {
        self.parent_pid
    }
}

/// Mirrors executed inputs and per-input statistics to external storage.
///
/// Two independently gated modes, each enabled by its own configuration
/// entry; either, both, or neither may be active per run:
///
/// - input storage: copy every executed input into a directory under a
///   collision-free `<timestamp>-<pid>-<ppid>` name;
/// - counter folder: append one `<hex fingerprint> <hex size> <hex
///   relative-seconds>` line per input to a file shared by all children
///   of one parent process.
///
/// The counter file is opened in append mode and assumes a single writer
/// per parent process; children of different parents never contend on the
/// same file. No cross-process locking is performed.
pub struct InputArchiver<'a, ID: ProcessIdentity + ?Sized> {
    config: &'a BridgeConfig,
    identity: &'a ID,
}

impl<'a, ID: ProcessIdentity + ?Sized> InputArchiver<'a, ID> {
    pub fn new(config: &'a BridgeConfig, identity: &'a ID) -> Self {
        Self { config, identity }
    }

    /// Archives one executed fuzz input.
    ///
    /// Both modes run even if one fails; the first error is returned after
    /// the other mode had its chance.
    pub fn on_input_executed(&self, path: &Path) -> Result<(), ArchiveError> {
        let mut first_error = None;

        if let Some(dir) = &self.config.input_storage {
            if let Err(error) = self.store_input(dir, path) {
                first_error.get_or_insert(error);
            }
        }
        if let Some(dir) = &self.config.counter_folder {
            if let Err(error) = self.append_counter_record(dir, path) {
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn store_input(&self, dir: &Path, input: &Path) -> Result<(), ArchiveError> {
        let micros = unix_time()?.as_micros();
        let name = storage_file_name(micros, self.identity.pid(), self.identity.parent_pid());
        let dest = dir.join(name);
        fs::copy(input, &dest).map_err(|source| ArchiveError::Copy { dest, source })?;
        Ok(())
    }

    fn append_counter_record(&self, dir: &Path, input: &Path) -> Result<(), ArchiveError> {
        let contents = fs::read(input).map_err(|source| ArchiveError::ReadInput {
            path: input.to_path_buf(),
            source,
        })?;
        let fingerprint = content_fingerprint(&contents);
        let relative_secs = unix_time()?.as_secs().saturating_sub(COUNTER_EPOCH_SECS);

        // One file per parent pid keeps the inode count low: every child
        // of one forkserver appends to the same file.
        let path = dir.join(format!("inputs_{}", self.identity.parent_pid()));
        let append = |path: &Path| -> io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(counter_line(fingerprint, contents.len(), relative_secs).as_bytes())
        };
        append(&path).map_err(|source| ArchiveError::Counter { path, source })?;
        Ok(())
    }
}

/// Builds the collision-free storage name `<021-digit micros>-<pid>-<ppid>`.
pub fn storage_file_name(micros: u128, pid: u32, parent_pid: u32) -> String {
    format!("{micros:021}-{pid}-{parent_pid}")
}

/// Formats one counter record line: fingerprint, size, and seconds since
/// [`COUNTER_EPOCH_SECS`], all in lowercase hex.
pub fn counter_line(fingerprint: u64, size: usize, relative_secs: u64) -> String {
    format!("{fingerprint:x} {size:x} {relative_secs:x}\n")
}

fn unix_time() -> Result<std::time::Duration, ArchiveError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| ArchiveError::Clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_input(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn storage_file_name_is_zero_padded_and_collision_free_across_pids() {
        let name = storage_file_name(1_700_000_000_000_000, 42, 7);
        assert_eq!(name, "000001700000000000000-42-7");
        assert_eq!(name.split('-').next().unwrap().len(), 21);

        // Two pid pairs in the same microsecond still produce distinct names.
        let other = storage_file_name(1_700_000_000_000_000, 43, 7);
        assert_ne!(name, other);
    }

    #[test]
    fn counter_line_is_space_separated_lowercase_hex() {
        assert_eq!(counter_line(0xdead_beef, 255, 16), "deadbeef ff 10\n");
        assert_eq!(counter_line(0, 0, 0), "0 0 0\n");
    }

    #[test]
    fn inactive_archiver_leaves_the_filesystem_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "input", b"ABC");
        let config = BridgeConfig::default();
        let identity = FixedIdentity { pid: 1, parent_pid: 2 };

        InputArchiver::new(&config, &identity)
            .on_input_executed(&input)
            .unwrap();
        // Only the input itself exists.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn storage_mode_copies_inputs_under_distinct_names_per_pid_pair() {
        let storage = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let input = write_input(work.path(), "input", b"payload");
        let config = BridgeConfig {
            input_storage: Some(storage.path().to_path_buf()),
            ..Default::default()
        };

        let first = FixedIdentity { pid: 100, parent_pid: 1 };
        let second = FixedIdentity { pid: 200, parent_pid: 1 };
        InputArchiver::new(&config, &first)
            .on_input_executed(&input)
            .unwrap();
        InputArchiver::new(&config, &second)
            .on_input_executed(&input)
            .unwrap();

        let entries: Vec<_> = fs::read_dir(storage.path())
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(entries.len(), 2, "Each pid pair must get its own file");
        for entry in entries {
            assert_eq!(fs::read(entry.path()).unwrap(), b"payload");
            let name = entry.file_name().into_string().unwrap();
            assert_eq!(name.split('-').next().unwrap().len(), 21);
        }
    }

    #[test]
    fn counter_mode_appends_matching_records_for_identical_inputs() {
        let counters = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let input = write_input(work.path(), "input", b"same contents");
        let config = BridgeConfig {
            counter_folder: Some(counters.path().to_path_buf()),
            ..Default::default()
        };
        let identity = FixedIdentity { pid: 10, parent_pid: 77 };
        let archiver = InputArchiver::new(&config, &identity);

        archiver.on_input_executed(&input).unwrap();
        archiver.on_input_executed(&input).unwrap();

        let counter_file = counters.path().join("inputs_77");
        let contents = fs::read_to_string(&counter_file).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2, "One record per execution");

        let fields: Vec<Vec<&str>> = lines
            .iter()
            .map(|line| line.split(' ').collect())
            .collect();
        assert_eq!(fields[0].len(), 3);
        assert_eq!(fields[0][0], fields[1][0], "Fingerprints must match");
        assert_eq!(fields[0][1], fields[1][1], "Sizes must match");
        assert_eq!(
            usize::from_str_radix(fields[0][1], 16).unwrap(),
            b"same contents".len()
        );
        let first_ts = u64::from_str_radix(fields[0][2], 16).unwrap();
        let second_ts = u64::from_str_radix(fields[1][2], 16).unwrap();
        assert!(second_ts >= first_ts, "Timestamps must be non-decreasing");
    }

    #[test]
    fn counter_files_are_split_by_parent_pid() {
        let counters = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let input = write_input(work.path(), "input", b"x");
        let config = BridgeConfig {
            counter_folder: Some(counters.path().to_path_buf()),
            ..Default::default()
        };

        for parent_pid in [5, 6] {
            let identity = FixedIdentity { pid: 1, parent_pid };
            InputArchiver::new(&config, &identity)
                .on_input_executed(&input)
                .unwrap();
        }
        assert!(counters.path().join("inputs_5").exists());
        assert!(counters.path().join("inputs_6").exists());
    }

    #[test]
    fn counter_mode_still_runs_when_storage_mode_fails() {
        let counters = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let input = write_input(work.path(), "input", b"abc");
        let config = BridgeConfig {
            // Nonexistent storage directory makes the copy fail.
            input_storage: Some(work.path().join("missing")),
            counter_folder: Some(counters.path().to_path_buf()),
            ..Default::default()
        };
        let identity = FixedIdentity { pid: 3, parent_pid: 4 };

        let result = InputArchiver::new(&config, &identity).on_input_executed(&input);
        assert!(matches!(result, Err(ArchiveError::Copy { .. })));
        assert!(
            counters.path().join("inputs_4").exists(),
            "Counter record must be written despite the storage failure"
        );
    }
}
