//! Differential-drive kinematics.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::KinematicsError;
use crate::odometry::{LocalDelta, arc_chord, integrate};
use crate::Pose;

/// Left and right wheel linear velocities.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    /// Left side velocity (in/s, or power units when commanding).
    pub left: f64,
    /// Right side velocity (in/s, or power units when commanding).
    pub right: f64,
}

impl WheelSpeeds {
    /// Construct wheel speeds.
    ///
    /// # Arguments
    ///
    /// * `left`: Left side velocity.
    /// * `right`: Right side velocity.
    pub const fn new(left: f64, right: f64) -> Self {
        WheelSpeeds { left, right }
    }

    /// Scale both sides down together so neither exceeds `max`.
    ///
    /// The ratio between the sides, and therefore the commanded curvature,
    /// is preserved.
    pub fn desaturate(self, max: f64) -> Self {
        let ratio = libm::fmax(libm::fabs(self.left), libm::fabs(self.right)) / max;
        if ratio > 1.0 {
            WheelSpeeds::new(self.left / ratio, self.right / ratio)
        } else {
            self
        }
    }
}

impl fmt::Display for WheelSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(L: {:.2}, R: {:.2})", self.left, self.right)
    }
}

/// Linear and angular chassis velocities.
/// These represent the overall motion of the robot's chassis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Linear speed of the chassis center (in/s).
    pub v: f64,
    /// Angular speed of the chassis (rad/s), counter-clockwise positive.
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `v`: Linear speed of the chassis center (in/s).
    /// * `omega`: Angular speed of the chassis (rad/s).
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2} in/s, ω: {:.2} rad/s)", self.v, self.omega)
    }
}

/// Differential‑drive kinematics helper.
///
/// This struct encapsulates the track width of a differential-drive robot
/// and provides methods for kinematic calculations.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    /// Distance between the left and right wheel contact lines (in).
    track_width: f64,
}

impl DifferentialDrive {
    /// Construct a new differential‑drive kinematics helper.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidTrackWidth)` if `track_width` is not positive.
    pub const fn new(track_width: f64) -> Result<Self, KinematicsError> {
        if track_width <= 0.0 {
            return Err(KinematicsError::InvalidTrackWidth("must be positive"));
        }
        Ok(DifferentialDrive { track_width })
    }

    /// Returns the track width.
    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Chassis speeds produced by the given side velocities.
    pub fn forward_kinematics(&self, wheel_speeds: WheelSpeeds) -> ChassisSpeeds {
        let v = (wheel_speeds.right + wheel_speeds.left) / 2.0;
        let omega = (wheel_speeds.right - wheel_speeds.left) / self.track_width;
        ChassisSpeeds::new(v, omega)
    }

    /// Side velocities required for the given chassis speeds.
    pub fn inverse_kinematics(&self, chassis_speeds: ChassisSpeeds) -> WheelSpeeds {
        let half = chassis_speeds.omega * (self.track_width / 2.0);
        WheelSpeeds::new(chassis_speeds.v - half, chassis_speeds.v + half)
    }

    /// Side velocities that follow an arc of `curvature` (1/in, positive
    /// turning left) with the center moving at `speed`.
    pub fn curvature_speeds(&self, speed: f64, curvature: f64) -> WheelSpeeds {
        WheelSpeeds::new(
            speed * (2.0 - curvature * self.track_width) / 2.0,
            speed * (2.0 + curvature * self.track_width) / 2.0,
        )
    }

    /// Integrates constant chassis speeds over `dt` seconds along an exact arc.
    ///
    /// The heading of the returned pose is left unbounded, like accumulated
    /// rotation.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative.
    pub fn update_pose(
        &self,
        current_pose: Pose,
        chassis_speeds: ChassisSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        if dt < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }

        let delta_theta = chassis_speeds.omega * dt;
        let forward = arc_chord(chassis_speeds.v * dt, delta_theta, 0.0);
        Ok(integrate(current_pose, LocalDelta::new(forward, 0.0, delta_theta)))
    }

    /// Convenience function to update pose directly from side velocities and dt.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `dt` is negative (propagated from `update_pose`).
    pub fn update_pose_from_wheel_speeds(
        &self,
        current_pose: Pose,
        wheel_speeds: WheelSpeeds,
        dt: f64,
    ) -> Result<Pose, KinematicsError> {
        let chassis_speeds = self.forward_kinematics(wheel_speeds);
        self.update_pose(current_pose, chassis_speeds, dt)
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DifferentialDrive (track: {:.2} in)", self.track_width)
    }
}
