use bridge_core::archive::SystemIdentity;
use bridge_core::bridge::Bridge;
use bridge_core::config::BridgeConfig;
use bridge_core::coverage::FixedCoverageProvider;

use std::path::PathBuf;

/// Demo target exercising the full bridge wiring the way a fuzzed program
/// would: one per-input hook call, an issue report on a magic byte
/// sequence, and a final coverage snapshot for clean runs. Uses a fixed
/// in-memory coverage map so it runs without an engine attached.
fn main() -> Result<(), anyhow::Error> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("Usage: bridge_core <input-file>"))?;
    let data = std::fs::read(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read input file {path:?}: {e}"))?;

    // Pretend each distinct input byte value hits one coverage point.
    let mut map = vec![0u8; 64];
    let len = map.len();
    for byte in &data {
        map[*byte as usize % len] = 1;
    }

    let bridge = Bridge::new(
        BridgeConfig::from_env(),
        FixedCoverageProvider::new(map),
        SystemIdentity,
    );

    bridge.on_input_executed(&path);

    if data.starts_with(b"BAD") {
        bridge.report_issue("bad marker in input", &path);
    }
    if data.starts_with(b"CRAS") {
        bridge.report_issue("crash marker in input", &path);
    }

    bridge.on_cycle_completed(0);
    bridge.on_run_completed();
    Ok(())
}
