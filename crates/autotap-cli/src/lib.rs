//! autotap-cli library entry point.
//!
//! Re-exports the module tree so the binary in `main.rs` and the
//! integration tests in `tests/` share the same code paths.
//!
//! The tool drives an Android device through a persistent `adb shell`
//! control channel: randomized taps or key events on a human-like cadence,
//! periodic randomized rests, manual pause/resume from the keyboard, and
//! automatic recovery from channel drops without losing the timing plan.
//!
//! Layering follows the usual hexagonal split:
//!
//! 1. `application`: the action scheduler, a timing state machine that
//!    depends only on traits and domain types, so every timing property is
//!    unit-testable on a paused clock.
//! 2. `infrastructure`: everything that touches the outside world, i.e. the
//!    adb bridge session and its one-shot helpers, the raw-mode keyboard
//!    listener, and the TOML config store.

/// Application layer: the scheduling use case and target strategies.
pub mod application;

/// Infrastructure layer: adb bridge, keyboard input, config storage.
pub mod infrastructure;
