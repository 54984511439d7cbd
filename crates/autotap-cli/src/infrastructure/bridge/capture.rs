//! One-shot screenshot capture.
//!
//! `adb exec-out screencap -p` writes the framebuffer as PNG to stdout
//! without the shell's newline mangling, so the raw bytes can be saved
//! directly.  The buffer is opaque to this tool; no decoding happens
//! here; downstream consumers (or the operator's image viewer) interpret
//! it.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use super::device::AdbError;

/// Captures one frame and returns the raw PNG bytes.
///
/// # Errors
///
/// Returns [`AdbError`] when adb cannot be run, exits non-zero, or
/// produces no data (which happens when no device is attached).
pub async fn capture_png(serial: Option<&str>) -> Result<Vec<u8>, AdbError> {
    let mut command = Command::new("adb");
    if let Some(serial) = serial {
        command.args(["-s", serial]);
    }
    let output = command.args(["exec-out", "screencap", "-p"]).output().await?;
    if !output.status.success() {
        return Err(AdbError::Failed {
            status: output.status,
        });
    }
    if output.stdout.is_empty() {
        return Err(AdbError::NoData);
    }
    debug!(bytes = output.stdout.len(), "captured screen frame");
    Ok(output.stdout)
}

/// Captures one frame and writes it to `path`.
pub async fn capture_to_file(serial: Option<&str>, path: &Path) -> Result<(), AdbError> {
    let bytes = capture_png(serial).await?;
    tokio::fs::write(path, &bytes).await?;
    info!(path = %path.display(), "screenshot saved");
    Ok(())
}
