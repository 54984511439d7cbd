//! The adb device bridge.
//!
//! Everything that crosses the host/device boundary lives here:
//!
//! - [`channel`]: the transport seam, a trait pair for "a line-oriented
//!   interactive channel" plus the real implementation that spawns
//!   `adb shell` as a child process.
//! - [`session`]: [`ControlSession`], the persistent control channel with
//!   connect/heartbeat/reconnect lifecycle and strictly serialized command
//!   execution.
//! - [`device`]: one-shot `adb devices` enumeration.
//! - [`capture`]: one-shot screenshot capture (`adb exec-out screencap`).
//!
//! [`ControlSession`]: session::ControlSession

pub mod capture;
pub mod channel;
pub mod device;
pub mod session;

pub use channel::{AdbShellFactory, BridgeChannel, ChannelFactory};
pub use session::{ControlSession, SessionConfig};
