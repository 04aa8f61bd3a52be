//! Angle and scalar helpers shared by every control loop.

use core::f64::consts::TAU;

use libm::fabs;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Pose;

/// Which way a rotation is allowed to go.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngularDirection {
    /// Take the shortest way around.
    #[default]
    Auto,
    /// Negative rotation only.
    Clockwise,
    /// Positive rotation only.
    CounterClockwise,
}

/// Shortest signed angle (rad) that rotates `current` onto `target`.
///
/// The result lies in `(-PI, PI]`; an exact half turn resolves
/// counter-clockwise.
pub fn angle_error(target: f64, current: f64) -> f64 {
    Pose::normalize_angle(target - current)
}

/// Signed angle (rad) that rotates `current` onto `target` going only the
/// requested way. [`AngularDirection::Auto`] is the same as [`angle_error`].
pub fn angle_error_in(target: f64, current: f64, direction: AngularDirection) -> f64 {
    let error = angle_error(target, current);
    match direction {
        AngularDirection::Auto => error,
        AngularDirection::CounterClockwise if error < 0.0 => error + TAU,
        AngularDirection::Clockwise if error > 0.0 => error - TAU,
        _ => error,
    }
}

/// Sign of `x`: `1.0`, `-1.0`, or `0.0` for zero.
pub fn sgn(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Move `current` toward `target` by at most `max_change`.
///
/// A `max_change` of zero disables the limit.
pub fn slew(target: f64, current: f64, max_change: f64) -> f64 {
    let change = target - current;
    if max_change == 0.0 || fabs(change) <= max_change {
        target
    } else {
        current + sgn(change) * max_change
    }
}

/// Linear interpolation between two scalars.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Exponential moving average; `smooth = 1` keeps only the new sample.
pub fn ema(current: f64, previous: f64, smooth: f64) -> f64 {
    current * smooth + previous * (1.0 - smooth)
}
