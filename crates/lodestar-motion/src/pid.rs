#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use lodestar_kinematics::sgn;
use tracing::trace;

use crate::bus::{TelemetryRecord, Topic};
use crate::error::ConfigError;

/// Gains for a [`Pid`] controller.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    /// Applied to the error rate in units per second.
    pub kd: f64,
    /// Feedforward on the target itself.
    pub kf: f64,
    /// Feedforward on the change in target between updates.
    pub ka: f64,
    /// The integral only accumulates while `|error|` is below this. Zero
    /// integrates always.
    pub windup_range: f64,
    /// Clear the integral whenever the error changes sign.
    pub sign_flip_reset: bool,
}

impl PidGains {
    pub const fn pd(kp: f64, kd: f64) -> Self {
        PidGains {
            kp,
            ki: 0.0,
            kd,
            kf: 0.0,
            ka: 0.0,
            windup_range: 0.0,
            sign_flip_reset: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            (self.kp, "kp"),
            (self.ki, "ki"),
            (self.kd, "kd"),
            (self.kf, "kf"),
            (self.ka, "ka"),
            (self.windup_range, "windup_range"),
        ];
        for (value, name) in fields {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::OutOfRange(name));
            }
        }
        Ok(())
    }
}

/// A feedforward PID controller.
///
/// Output is unbounded; callers clamp it to whatever their actuator accepts.
#[derive(Debug, Clone)]
pub struct Pid {
    name: &'static str,
    gains: PidGains,
    /// Update period (s).
    dt: f64,
    integral: f64,
    prev_error: Option<f64>,
    prev_target: Option<f64>,
    tick: u64,
    telemetry: Option<Topic<TelemetryRecord>>,
}

impl Pid {
    /// # Arguments
    /// * `name` - Controller id used in logs and telemetry
    /// * `gains` - Controller gains
    /// * `dt` - Expected time between updates, in seconds
    pub fn new(name: &'static str, gains: PidGains, dt: f64) -> Self {
        Pid {
            name,
            gains,
            dt,
            integral: 0.0,
            prev_error: None,
            prev_target: None,
            tick: 0,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, topic: Option<Topic<TelemetryRecord>>) -> Self {
        self.telemetry = topic;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Computes the control output for one tick.
    ///
    /// The derivative term is zero on the first update after construction or
    /// [`Pid::reset`]. When `log` is set the sample is traced and published to
    /// the telemetry topic, if one is attached.
    pub fn update(&mut self, target: f64, current: f64, log: bool) -> f64 {
        let g = self.gains;
        let error = target - current;

        let derivative = match self.prev_error {
            Some(prev) if self.dt > 0.0 => (error - prev) / self.dt,
            _ => 0.0,
        };

        if g.windup_range == 0.0 || error.abs() < g.windup_range {
            self.integral += error * self.dt;
        }
        if g.sign_flip_reset && self.prev_error.is_some_and(|prev| sgn(prev) != sgn(error)) {
            self.integral = 0.0;
        }

        let target_change = self.prev_target.map_or(0.0, |prev| target - prev);
        let output = g.kf * target + g.ka * target_change + g.kp * error + g.ki * self.integral + g.kd * derivative;

        self.prev_error = Some(error);
        self.prev_target = Some(target);
        self.tick += 1;

        if log {
            trace!(controller = self.name, tick = self.tick, target, current, error, output, "pid");
            if let Some(topic) = &self.telemetry {
                topic.publish(TelemetryRecord {
                    controller: self.name,
                    tick: self.tick,
                    target,
                    actual: current,
                    error,
                    output,
                });
            }
        }
        output
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
        self.prev_target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_proportional_only() {
        let mut pid = Pid::new("p", PidGains::pd(2.0, 0.0), 0.01);
        assert!((pid.update(10.0, 4.0, false) - 12.0).abs() < EPSILON);
        assert!((pid.update(0.0, 4.0, false) - -8.0).abs() < EPSILON);
    }

    #[test]
    fn test_derivative_skips_first_update() {
        let mut pid = Pid::new("d", PidGains::pd(0.0, 1.0), 0.01);
        assert_eq!(pid.update(5.0, 0.0, false), 0.0);
        // error 5 -> 4 over 10 ms is -100 units/s
        assert!((pid.update(4.0, 0.0, false) - -100.0).abs() < EPSILON);
        pid.reset();
        assert_eq!(pid.update(1.0, 0.0, false), 0.0);
    }

    #[test]
    fn test_integral_windup_range_and_sign_flip() {
        let gains = PidGains {
            ki: 1.0,
            windup_range: 3.0,
            sign_flip_reset: true,
            ..PidGains::default()
        };
        let mut pid = Pid::new("i", gains, 0.5);
        // Outside the windup range nothing accumulates.
        assert_eq!(pid.update(10.0, 0.0, false), 0.0);
        assert!((pid.update(2.0, 0.0, false) - 1.0).abs() < EPSILON);
        assert!((pid.update(2.0, 0.0, false) - 2.0).abs() < EPSILON);
        // Crossing zero clears the accumulated integral.
        assert_eq!(pid.update(-1.0, 0.0, false), 0.0);
    }

    #[test]
    fn test_feedforward_terms() {
        let gains = PidGains {
            kf: 0.5,
            ka: 2.0,
            ..PidGains::default()
        };
        let mut pid = Pid::new("ff", gains, 0.01);
        assert!((pid.update(10.0, 10.0, false) - 5.0).abs() < EPSILON);
        assert!((pid.update(12.0, 12.0, false) - (6.0 + 4.0)).abs() < EPSILON);
    }

    #[test]
    fn test_logging_publishes_telemetry() {
        let topic = Topic::new(8);
        let mut rx = topic.subscribe();
        let mut pid = Pid::new("angular", PidGains::pd(1.0, 0.0), 0.01).with_telemetry(Some(topic));
        pid.update(3.0, 1.0, false);
        assert!(rx.try_recv().is_err());
        pid.update(3.0, 1.0, true);
        let record = rx.try_recv().unwrap();
        assert_eq!(record.controller, "angular");
        assert_eq!(record.tick, 2);
        assert!((record.error - 2.0).abs() < EPSILON);
        assert!((record.output - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_validate_rejects_negative_gains() {
        assert!(PidGains::pd(1.0, 0.1).validate().is_ok());
        assert_eq!(PidGains::pd(-1.0, 0.0).validate(), Err(ConfigError::OutOfRange("kp")));
        assert_eq!(
            PidGains { kd: f64::NAN, ..PidGains::default() }.validate(),
            Err(ConfigError::OutOfRange("kd"))
        );
    }
}
