use std::env;
use std::path::PathBuf;

/// Directory for archived issue test cases. Set by the fuzzing driver;
/// absence means the target runs manually and nothing is archived.
pub const FUZZING_CAUSE_DIR_VAR: &str = "FUZZING_CAUSE_DIR";
/// Directory that every executed input is mirrored into.
pub const INPUT_STORAGE_VAR: &str = "INPUT_STORAGE";
/// Directory holding one append-only counter file per parent process id.
pub const COUNTER_FOLDER_VAR: &str = "COUNTER_FOLDER";
/// If set, enables per-cycle coverage-count logging to stderr.
pub const PRINT_COVERAGE_VAR: &str = "PRINT_COVERAGE";
/// Path that receives a bit-per-byte serialization of the coverage map.
pub const PRINT_COVERAGE_MAP_VAR: &str = "PRINT_COVERAGE_MAP";

/// Immutable snapshot of the environment variables recognized by the bridge.
///
/// Captured once per process and passed explicitly into each component, so
/// tests can inject a fake configuration instead of mutating the process
/// environment. An unset variable simply disables the corresponding
/// behavior; it is never an error.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub cause_dir: Option<PathBuf>,
    pub input_storage: Option<PathBuf>,
    pub counter_folder: Option<PathBuf>,
    pub print_coverage: bool,
    pub coverage_map_path: Option<PathBuf>,
}

impl BridgeConfig {
    /// Captures a snapshot from the process environment.
    pub fn from_env() -> Self {
        Self::capture(|name| env::var(name).ok())
    }

    /// Captures a snapshot through an arbitrary variable lookup.
    pub fn capture<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            cause_dir: lookup(FUZZING_CAUSE_DIR_VAR).map(PathBuf::from),
            input_storage: lookup(INPUT_STORAGE_VAR).map(PathBuf::from),
            counter_folder: lookup(COUNTER_FOLDER_VAR).map(PathBuf::from),
            print_coverage: lookup(PRINT_COVERAGE_VAR).is_some(),
            coverage_map_path: lookup(PRINT_COVERAGE_MAP_VAR).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn capture_reads_all_recognized_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (FUZZING_CAUSE_DIR_VAR, "/tmp/causes"),
            (INPUT_STORAGE_VAR, "/tmp/in"),
            (COUNTER_FOLDER_VAR, "/tmp/cnt"),
            (PRINT_COVERAGE_VAR, "1"),
            (PRINT_COVERAGE_MAP_VAR, "/tmp/map.txt"),
        ]);
        let config = BridgeConfig::capture(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.cause_dir, Some(PathBuf::from("/tmp/causes")));
        assert_eq!(config.input_storage, Some(PathBuf::from("/tmp/in")));
        assert_eq!(config.counter_folder, Some(PathBuf::from("/tmp/cnt")));
        assert!(config.print_coverage);
        assert_eq!(config.coverage_map_path, Some(PathBuf::from("/tmp/map.txt")));
    }

    #[test]
    fn capture_with_empty_environment_disables_everything() {
        let config = BridgeConfig::capture(|_| None);

        assert!(config.cause_dir.is_none());
        assert!(config.input_storage.is_none());
        assert!(config.counter_folder.is_none());
        assert!(!config.print_coverage);
        assert!(config.coverage_map_path.is_none());
    }

    #[test]
    fn print_coverage_is_a_presence_toggle() {
        // Any value, including the empty string, enables the toggle.
        let config = BridgeConfig::capture(|name| {
            (name == PRINT_COVERAGE_VAR).then(String::new)
        });
        assert!(config.print_coverage);
    }
}
