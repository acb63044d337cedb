//! Report persistence: atomic JSON writes of the radar artifact.
//!
//! The report is written to a `.tmp` sibling and renamed into place, so a
//! crashed run never leaves a half-written radar behind.

use crate::error::Result;
use crate::radar::RadarReport;
use std::io;
use std::path::Path;

/// Atomically write a radar report as pretty-printed JSON.
///
/// Creates parent directories if they don't exist.
pub fn write_report(path: &Path, report: &RadarReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    atomic_write(path, json.as_bytes())?;
    tracing::info!(
        path = %path.display(),
        elements = report.total_elements,
        "Radar report written"
    );
    Ok(())
}

/// Load a previously written radar report.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn read_report(path: &Path) -> Result<Option<RadarReport>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// Atomically write raw bytes to a file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
