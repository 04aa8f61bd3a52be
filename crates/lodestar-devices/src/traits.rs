//! Capability traits for the devices the motion stack talks to.
//!
//! Each role gets the smallest set of operations the controllers need, so
//! real hardware adapters and the simulator plug in through the same seams.

use std::time::Duration;

use crate::DeviceError;

/// One side of a differential drivetrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Sink for per-side motor power commands.
pub trait Drivetrain: Send {
    /// Commands power to one side.
    ///
    /// # Arguments
    /// * `side` - Which side of the drivetrain to drive
    /// * `power` - Signed power in `[-max_power, max_power]`; positive drives forward
    fn set_power(&mut self, side: Side, power: f64) -> Result<(), DeviceError>;

    /// Commands both sides in one call.
    fn set_powers(&mut self, left: f64, right: f64) -> Result<(), DeviceError> {
        self.set_power(Side::Left, left)?;
        self.set_power(Side::Right, right)
    }

    /// Commands zero power to both sides.
    ///
    /// Both sides are always attempted, even if the first one fails.
    fn stop(&mut self) -> Result<(), DeviceError> {
        let left = self.set_power(Side::Left, 0.0);
        let right = self.set_power(Side::Right, 0.0);
        left.and(right)
    }

    /// Largest power magnitude a side accepts.
    fn max_power(&self) -> f64 {
        127.0
    }

    /// Ground speed of a side at full power (in/s).
    fn max_velocity(&self) -> f64;

    /// Distance between the left and right wheel contact lines (in).
    fn track_width(&self) -> f64;
}

/// A rotation encoder, e.g. the sensor behind a tracking wheel.
pub trait RotationSensor: Send {
    /// Accumulated rotation since the last reset, in radians.
    fn position(&self) -> Result<f64, DeviceError>;

    /// Zeroes the accumulated rotation.
    fn reset_position(&mut self) -> Result<(), DeviceError>;
}

/// An absolute heading source such as an IMU.
pub trait HeadingSensor: Send {
    /// Starts calibration.
    fn calibrate(&mut self) -> Result<(), DeviceError>;

    /// Returns whether calibration is still in progress.
    fn is_calibrating(&self) -> bool;

    /// Returns whether the sensor is currently reachable.
    fn is_connected(&self) -> bool;

    /// Heading in radians, locked to `(-PI, PI]`, counter-clockwise positive.
    fn heading(&self) -> Result<f64, DeviceError>;

    /// Unbounded accumulated rotation in radians, counter-clockwise positive.
    fn rotation(&self) -> Result<f64, DeviceError>;

    /// Overwrites the accumulated rotation.
    fn set_rotation(&mut self, rotation: f64) -> Result<(), DeviceError>;
}

/// Opaque token identifying the current match phase.
///
/// Only equality is meaningful: a motion treats any change as a request to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PhaseToken(pub u32);

/// Query for the current match phase.
pub trait MatchPhase: Send {
    fn phase(&self) -> PhaseToken;
}

/// Monotonic time source used by the control loops.
pub trait Clock: Send + Sync {
    /// Time since an arbitrary fixed epoch.
    fn now(&self) -> Duration;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}
