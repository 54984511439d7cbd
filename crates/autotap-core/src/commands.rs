//! The bridge command vocabulary and the parsers for its replies.
//!
//! The device channel is a long-lived interactive `adb shell`.  Commands are
//! single lines of shell; completion is signalled by a deterministic marker
//! the remote side echoes after the operation finishes:
//!
//! ```text
//! input tap 340 1180 && echo READY
//! ```
//!
//! The marker (rather than a prompt or an exit status) is what the session
//! waits for, because `adb shell` gives no per-command framing of its own.
//! Some Android builds additionally print `Input events injected` after an
//! `input` command; [`is_ack`] accepts either form.
//!
//! One-shot invocations (`adb devices`, `wm size`) produce multi-line
//! output; [`parse_device_list`] and [`parse_screen_size`] turn that text
//! into typed values.  Both parsers are total: unrecognised lines are
//! skipped, never fatal.

use serde::{Deserialize, Serialize};

/// Marker echoed by the device after a command completes.
pub const ACK_MARKER: &str = "READY";

/// Secondary ack some devices print after `input` commands.
const INPUT_INJECTED: &str = "Input events injected";

// ── Command vocabulary ────────────────────────────────────────────────────────

/// A command issued over the device channel.
///
/// The vocabulary is deliberately narrow: the session is not a general
/// remote shell, it drives exactly the interactions the scheduler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// No-op liveness probe (`echo READY`).
    Probe,
    /// Tap the screen at absolute pixel coordinates.
    Tap { x: u32, y: u32 },
    /// Inject an Android key event by keycode (e.g. 26 = power).
    KeyEvent { code: u32 },
    /// Query the physical display size (`wm size`).
    ScreenSize,
}

impl BridgeCommand {
    /// Renders the command as the shell line written to the channel.
    ///
    /// Action commands chain the ack echo with `&&` so the marker only
    /// appears when the operation itself succeeded.  Queries are answered
    /// by their own output and carry no marker.
    pub fn shell_line(&self) -> String {
        match self {
            BridgeCommand::Probe => format!("echo {ACK_MARKER}"),
            BridgeCommand::Tap { x, y } => {
                format!("input tap {x} {y} && echo {ACK_MARKER}")
            }
            BridgeCommand::KeyEvent { code } => {
                format!("input keyevent {code} && echo {ACK_MARKER}")
            }
            BridgeCommand::ScreenSize => "wm size".to_string(),
        }
    }

    /// Whether this command expects the ack marker (as opposed to parsed
    /// query output).
    pub fn expects_ack(&self) -> bool {
        !matches!(self, BridgeCommand::ScreenSize)
    }
}

impl std::fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeCommand::Probe => write!(f, "probe"),
            BridgeCommand::Tap { x, y } => write!(f, "tap ({x}, {y})"),
            BridgeCommand::KeyEvent { code } => write!(f, "keyevent {code}"),
            BridgeCommand::ScreenSize => write!(f, "screen-size query"),
        }
    }
}

/// Returns `true` when `output` contains a command acknowledgment.
///
/// The check is per-line for the marker so that a partial read ending
/// mid-line (`REA`) does not false-positive, while `Input events injected`
/// is matched as a substring because devices embed it in longer messages.
pub fn is_ack(output: &str) -> bool {
    if output.contains(INPUT_INJECTED) {
        return true;
    }
    output.lines().any(|line| line.trim() == ACK_MARKER)
}

// ── Screen size ───────────────────────────────────────────────────────────────

/// Physical display dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Extracts the physical display size from `wm size` output.
///
/// Expected shape:
///
/// ```text
/// Physical size: 1080x2340
/// Override size: 720x1560
/// ```
///
/// Only the `Physical size` line is used; an override does not change the
/// coordinate space `input tap` operates in.  Returns `None` until the
/// line (with both dimensions) has fully arrived, so the caller can apply
/// this incrementally to accumulated output.
pub fn parse_screen_size(output: &str) -> Option<ScreenSize> {
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix("Physical size:") else {
            continue;
        };
        let mut parts = rest.trim().split('x');
        let width = parts.next()?.trim().parse().ok()?;
        let height = parts.next()?.trim().parse().ok()?;
        return Some(ScreenSize { width, height });
    }
    None
}

// ── Device enumeration ────────────────────────────────────────────────────────

/// Connection state reported by `adb devices` for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// Ready to accept commands.
    Device,
    /// Visible but not responding.
    Offline,
    /// Connected but the host is not authorized on the device.
    Unauthorized,
    /// Any state this build does not know by name.
    Other(String),
}

impl DeviceState {
    fn from_token(token: &str) -> Self {
        match token {
            "device" => DeviceState::Device,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            other => DeviceState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Device => write!(f, "device"),
            DeviceState::Offline => write!(f, "offline"),
            DeviceState::Unauthorized => write!(f, "unauthorized"),
            DeviceState::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One row of `adb devices` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub serial: String,
    pub state: DeviceState,
}

/// Parses `adb devices` output into device entries.
///
/// Skips the `List of devices attached` header, blank lines, and the
/// daemon-startup chatter adb prints on a cold start (`* daemon not
/// running...`).  Each remaining line is `<serial>\t<state>`.
pub fn parse_device_list(output: &str) -> Vec<DeviceEntry> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with('*') && !line.starts_with("List of devices")
        })
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(DeviceEntry {
                serial: serial.to_string(),
                state: DeviceState::from_token(state),
            })
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
