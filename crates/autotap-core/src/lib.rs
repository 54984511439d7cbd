//! # autotap-core
//!
//! Shared library for autotap containing the bridge command vocabulary and
//! output parsers, the action configuration types, the humanized timing
//! sampler, and the typed events exchanged between the control session and
//! the scheduler.
//!
//! This crate is used by the `autotap` binary and by its integration tests.
//! It has zero dependencies on OS APIs, child processes, or the async
//! runtime; everything here is pure data and pure functions, which is what
//! keeps the scheduler and session logic unit-testable.
//!
//! Modules:
//!
//! - **`commands`** – What travels over the device channel.  The channel is
//!   an interactive `adb shell`, so "encoding" is rendering a command line
//!   with a trailing ack echo, and "decoding" is scanning the shell output
//!   for the ack marker or for query answers (`wm size`, `adb devices`).
//!
//! - **`config`** – The immutable [`ActionConfig`] driving the scheduler,
//!   with the range validation that is fatal at startup.
//!
//! - **`sampler`** – Truncated-normal integer sampling used for every delay
//!   and coordinate draw, so the cadence reads as human rather than
//!   metronomic.
//!
//! - **`events`** – Typed connectivity events and operator control signals.

pub mod commands;
pub mod config;
pub mod events;
pub mod sampler;

// Re-export the most-used types at the crate root so callers can write
// `autotap_core::BridgeCommand` instead of the full module path.
pub use commands::{
    is_ack, parse_device_list, parse_screen_size, BridgeCommand, DeviceEntry, DeviceState,
    ScreenSize, ACK_MARKER,
};
pub use config::{ActionConfig, ConfigError};
pub use events::{ControlSignal, SessionEvent};
pub use sampler::NormalSampler;
