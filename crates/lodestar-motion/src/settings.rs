#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::exit::ExitSettings;
use crate::pid::PidGains;

/// Tuning for one controller axis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerSettings {
    pub gains: PidGains,
    pub exit: ExitSettings,
    /// Largest change in output per tick. Zero disables slew limiting.
    pub slew: f64,
}

impl ControllerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gains.validate()?;
        self.exit.validate()?;
        if !(self.slew >= 0.0 && self.slew.is_finite()) {
            return Err(ConfigError::OutOfRange("slew"));
        }
        Ok(())
    }
}

/// Settings shared by every motion primitive.
///
/// The lateral controller works in inches, the angular controller in degrees.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    pub lateral: ControllerSettings,
    pub angular: ControllerSettings,
    /// Control loop period.
    pub tick_ms: u64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        MotionSettings {
            lateral: ControllerSettings {
                gains: PidGains::pd(10.0, 0.3),
                exit: ExitSettings {
                    small_error: 1.0,
                    small_error_timeout_ms: 100,
                    large_error: 3.0,
                    large_error_timeout_ms: 500,
                },
                slew: 20.0,
            },
            angular: ControllerSettings {
                gains: PidGains::pd(2.0, 0.05),
                exit: ExitSettings {
                    small_error: 1.0,
                    small_error_timeout_ms: 100,
                    large_error: 3.0,
                    large_error_timeout_ms: 500,
                },
                slew: 0.0,
            },
            tick_ms: 10,
        }
    }
}

impl MotionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lateral.validate()?;
        self.angular.validate()?;
        if self.tick_ms == 0 {
            return Err(ConfigError::OutOfRange("tick_ms"));
        }
        Ok(())
    }
}
