//! One-shot device enumeration via `adb devices`.

use std::io;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use autotap_core::{parse_device_list, DeviceEntry, DeviceState};

/// Error type for one-shot adb invocations.
#[derive(Debug, Error)]
pub enum AdbError {
    /// The adb binary could not be spawned (not installed / not on PATH).
    #[error("failed to run adb: {0}")]
    Spawn(#[from] io::Error),
    /// adb ran but reported failure.
    #[error("adb exited with status {status}")]
    Failed { status: std::process::ExitStatus },
    /// adb succeeded but produced no payload.
    #[error("adb produced no data (is a device attached?)")]
    NoData,
}

/// Lists the devices adb currently sees.
///
/// # Errors
///
/// Returns [`AdbError`] when adb cannot be run or exits non-zero.  An
/// empty device list is not an error.
pub async fn list_devices() -> Result<Vec<DeviceEntry>, AdbError> {
    let output = Command::new("adb").arg("devices").output().await?;
    if !output.status.success() {
        return Err(AdbError::Failed {
            status: output.status,
        });
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let devices = parse_device_list(&text);
    debug!(count = devices.len(), "enumerated adb devices");
    Ok(devices)
}

/// Confirms `serial` is attached and ready.
///
/// Ready means `adb devices` reports it in the `device` state; an
/// unauthorized or offline entry is reported to the caller as absent.
pub async fn is_device_ready(serial: &str) -> Result<bool, AdbError> {
    let devices = list_devices().await?;
    Ok(devices
        .iter()
        .any(|entry| entry.serial == serial && entry.state == DeviceState::Device))
}
