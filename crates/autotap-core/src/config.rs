//! Scheduler configuration and its startup validation.
//!
//! [`ActionConfig`] is immutable once the run starts: the scheduler and the
//! target selector read it but never write it.  Validation happens exactly
//! once, before scheduling begins: a failed range check aborts the run, so
//! everything downstream can assume the invariants hold.
//!
//! Two of the pairs use `max == 0` as a "feature disabled" sentinel:
//!
//! - `rest_interval_max == 0` disables rests entirely.
//! - `click_delay_max == 0` means "no wait" between actions.
//!
//! For those pairs the `min <= max` check is skipped when the sentinel is
//! set; the coordinate and rest-duration pairs are checked unconditionally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A min/max pair is inverted.
    #[error("{name}: min ({min}) must not exceed max ({max})")]
    InvertedRange {
        name: &'static str,
        min: u64,
        max: u64,
    },
    /// The tap area is missing and could not be defaulted.
    #[error("tap area is not configured and the device screen size is unknown")]
    MissingArea,
}

/// Immutable timing and coordinate ranges for one automation run.
///
/// All durations are in milliseconds, all coordinates in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Delay between consecutive actions.  `click_delay_max == 0` means the
    /// next action follows immediately.
    pub click_delay_min: u64,
    pub click_delay_max: u64,

    /// Tap area bounds, inclusive.
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,

    /// Interval between rests.  `rest_interval_max == 0` disables rests.
    pub rest_interval_min: u64,
    pub rest_interval_max: u64,

    /// Duration of each rest.
    pub rest_duration_min: u64,
    pub rest_duration_max: u64,
}

impl ActionConfig {
    /// Checks every min/max pair, honouring the disabled sentinels.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvertedRange`] naming the first offending
    /// pair.  Callers treat this as fatal: the scheduler assumes it never
    /// sees an invalid config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("x", u64::from(self.x_min), u64::from(self.x_max))?;
        check_range("y", u64::from(self.y_min), u64::from(self.y_max))?;
        check_range(
            "rest-duration",
            self.rest_duration_min,
            self.rest_duration_max,
        )?;
        if self.click_delay_max != 0 {
            check_range("click-delay", self.click_delay_min, self.click_delay_max)?;
        }
        if self.rest_interval_max != 0 {
            check_range(
                "rest-interval",
                self.rest_interval_min,
                self.rest_interval_max,
            )?;
        }
        Ok(())
    }

    /// Whether periodic rests are enabled.
    pub fn rests_enabled(&self) -> bool {
        self.rest_interval_max != 0
    }
}

fn check_range(name: &'static str, min: u64, max: u64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedRange { name, min, max });
    }
    Ok(())
}
