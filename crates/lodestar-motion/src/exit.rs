//! Two-band settle detection with an overall timeout.
//!
//! An error inside the large band for `large_error_timeout` settles the
//! motion, as does an error inside the small band for `small_error_timeout`.
//! The large band contains the small one, so a long stay in the small band
//! also counts toward the large timer. Leaving a band restarts its timer.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Error bands and how long the error must stay inside each.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSettings {
    pub small_error: f64,
    pub small_error_timeout_ms: u64,
    pub large_error: f64,
    pub large_error_timeout_ms: u64,
}

impl Default for ExitSettings {
    fn default() -> Self {
        ExitSettings {
            small_error: 1.0,
            small_error_timeout_ms: 100,
            large_error: 3.0,
            large_error_timeout_ms: 500,
        }
    }
}

impl ExitSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.small_error >= 0.0 && self.small_error.is_finite()) {
            return Err(ConfigError::OutOfRange("small_error"));
        }
        if !(self.large_error >= 0.0 && self.large_error.is_finite()) {
            return Err(ConfigError::OutOfRange("large_error"));
        }
        if self.small_error > self.large_error {
            return Err(ConfigError::ErrorBands {
                small: self.small_error,
                large: self.large_error,
            });
        }
        Ok(())
    }
}

/// Result of feeding one error sample to an [`ExitCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Running,
    Settled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    error: f64,
    time: Duration,
}

/// Settle detector for one motion.
#[derive(Debug, Clone)]
pub struct ExitCondition {
    small: Option<Band>,
    large: Option<Band>,
    timeout: Duration,
    start: Option<Duration>,
    small_since: Option<Duration>,
    large_since: Option<Duration>,
}

impl ExitCondition {
    /// # Arguments
    /// * `settings` - Error bands, validated here
    /// * `timeout` - Overall limit measured from the first update; zero disables it
    pub fn new(settings: ExitSettings, timeout: Duration) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(ExitCondition {
            small: Some(Band {
                error: settings.small_error,
                time: Duration::from_millis(settings.small_error_timeout_ms),
            }),
            large: Some(Band {
                error: settings.large_error,
                time: Duration::from_millis(settings.large_error_timeout_ms),
            }),
            ..Self::timeout_only(timeout)
        })
    }

    /// A condition that only ever times out.
    pub fn timeout_only(timeout: Duration) -> Self {
        ExitCondition {
            small: None,
            large: None,
            timeout,
            start: None,
            small_since: None,
            large_since: None,
        }
    }

    /// Feeds the error observed at time `now`.
    pub fn update(&mut self, error: f64, now: Duration) -> ExitState {
        let start = *self.start.get_or_insert(now);
        let error = error.abs();

        let held = |band: Option<Band>, since: &mut Option<Duration>| match band {
            Some(band) if error <= band.error => {
                let entered = *since.get_or_insert(now);
                now.saturating_sub(entered) >= band.time
            }
            _ => {
                *since = None;
                false
            }
        };
        let small_held = held(self.small, &mut self.small_since);
        let large_held = held(self.large, &mut self.large_since);

        if small_held || large_held {
            ExitState::Settled
        } else if !self.timeout.is_zero() && now.saturating_sub(start) >= self.timeout {
            ExitState::TimedOut
        } else {
            ExitState::Running
        }
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.small_since = None;
        self.large_since = None;
    }
}
