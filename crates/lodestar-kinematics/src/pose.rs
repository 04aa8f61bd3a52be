//! The planar pose type.

use core::f64::consts::{PI, TAU};
use core::fmt;
use core::ops::{Add, Div, Mul, Sub};

use libm::{atan2, cos, fmod, hypot, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 2‑D pose `(x, y, θ)` in inches and radians (θ measured counter‑clockwise
/// from the x‑axis in the world frame).
///
/// The arithmetic operators act on the position only and carry the heading of
/// the left-hand operand through unchanged, so `target - offset * k` moves a
/// point without touching its heading.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World‑frame x position (in).
    pub x: f64,
    /// World‑frame y position (in).
    pub y: f64,
    /// Heading (rad). Unbounded when it holds accumulated rotation.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose.
    ///
    /// # Arguments
    ///
    /// * `x`: World-frame x position in inches.
    /// * `y`: World-frame y position in inches.
    /// * `theta`: Heading in radians.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// The pose at the origin, facing along +x.
    pub const fn origin() -> Self {
        Pose::new(0.0, 0.0, 0.0)
    }

    /// Returns a copy of this pose with a different heading.
    pub const fn with_theta(self, theta: f64) -> Self {
        Pose::new(self.x, self.y, theta)
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance(&self, other: &Pose) -> f64 {
        hypot(other.x - self.x, other.y - self.y)
    }

    /// Direction of the vector from this pose to `other`, counter-clockwise
    /// from +x, in `(-PI, PI]`.
    ///
    /// Returns `0.0` when both positions coincide.
    pub fn angle_to(&self, other: &Pose) -> f64 {
        atan2(other.y - self.y, other.x - self.x)
    }

    /// Linearly interpolate between two poses; `t = 0` yields `self`.
    pub fn lerp(&self, other: &Pose, t: f64) -> Pose {
        Pose::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.theta + (other.theta - self.theta) * t,
        )
    }

    /// Rotate the position about the origin by `angle` radians.
    pub fn rotate(&self, angle: f64) -> Pose {
        let (s, c) = (sin(angle), cos(angle));
        Pose::new(self.x * c - self.y * s, self.x * s + self.y * c, self.theta)
    }

    /// Dot product of the two positions treated as vectors.
    pub fn dot(&self, other: &Pose) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Normalize an angle to be within `(-PI, PI]`.
    ///
    /// Angles at `-PI` will be normalized to `PI`, so a half-turn error always
    /// resolves counter-clockwise.
    ///
    /// # Arguments
    ///
    /// * `angle`: The angle in radians to normalize.
    ///
    /// # Returns
    ///
    /// The normalized angle in radians.
    pub fn normalize_angle(angle: f64) -> f64 {
        let a = fmod(angle, TAU);
        if a > PI {
            a - TAU
        } else if a <= -PI {
            a + TAU
        } else {
            a
        }
    }
}

impl Add for Pose {
    type Output = Pose;

    fn add(self, rhs: Pose) -> Pose {
        Pose::new(self.x + rhs.x, self.y + rhs.y, self.theta)
    }
}

impl Sub for Pose {
    type Output = Pose;

    fn sub(self, rhs: Pose) -> Pose {
        Pose::new(self.x - rhs.x, self.y - rhs.y, self.theta)
    }
}

impl Mul<f64> for Pose {
    type Output = Pose;

    fn mul(self, rhs: f64) -> Pose {
        Pose::new(self.x * rhs, self.y * rhs, self.theta)
    }
}

impl Div<f64> for Pose {
    type Output = Pose;

    fn div(self, rhs: f64) -> Pose {
        Pose::new(self.x / rhs, self.y / rhs, self.theta)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.3} rad)", self.x, self.y, self.theta)
    }
}
