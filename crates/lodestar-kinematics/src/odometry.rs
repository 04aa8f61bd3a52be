//! Arc-based dead reckoning.
//!
//! Between two samples the tracking center is assumed to move along a
//! circular arc. Each tracking wheel measures the arc length along its own
//! axis; the chord of the center's arc along that axis is
//!
//! ```text
//! chord = 2 * sin(Δθ / 2) * (Δd / Δθ + offset)
//! ```
//!
//! which tends to `Δd` as `Δθ → 0`. The chord points along the average
//! heading of the sample, so rotating it by `θ + Δθ / 2` lands it in the world
//! frame.
//!
//! Offsets follow one rule for every wheel: a wheel reads
//! `center_travel - offset * Δθ`. For forward-measuring (vertical) wheels
//! that makes offsets positive to the left of the tracking center; for
//! sideways (horizontal) wheels, which read positive toward the robot's
//! right, offsets are positive in front of the center.

use libm::{cos, fabs, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Pose;

/// Below this heading change (rad) a sample is integrated as a straight segment.
pub const ARC_EPSILON: f64 = 1e-9;

/// A displacement (or velocity) expressed in the robot frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalDelta {
    /// Travel along the robot's heading.
    pub forward: f64,
    /// Travel toward the robot's right side.
    pub right: f64,
    /// Heading change (rad), counter-clockwise positive.
    pub theta: f64,
}

impl LocalDelta {
    /// Construct a robot-frame delta.
    pub const fn new(forward: f64, right: f64, theta: f64) -> Self {
        LocalDelta {
            forward,
            right,
            theta,
        }
    }

    /// Scale every component, e.g. to turn a velocity into a displacement.
    pub fn scale(&self, k: f64) -> LocalDelta {
        LocalDelta::new(self.forward * k, self.right * k, self.theta * k)
    }
}

/// Chord of the tracking center's arc along a wheel's measurement axis.
///
/// # Arguments
///
/// * `delta`: Distance the wheel rolled during the sample.
/// * `delta_theta`: Heading change over the sample (rad).
/// * `offset`: The wheel's offset from the tracking center (see module docs).
pub fn arc_chord(delta: f64, delta_theta: f64, offset: f64) -> f64 {
    if fabs(delta_theta) < ARC_EPSILON {
        delta
    } else {
        2.0 * sin(delta_theta / 2.0) * (delta / delta_theta + offset)
    }
}

/// Heading change measured by two parallel wheels.
///
/// Returns `None` when the offsets coincide, since the pair then carries no
/// rotation information.
pub fn heading_from_pair(delta_a: f64, offset_a: f64, delta_b: f64, offset_b: f64) -> Option<f64> {
    let separation = offset_a - offset_b;
    if fabs(separation) < ARC_EPSILON {
        None
    } else {
        Some((delta_b - delta_a) / separation)
    }
}

/// Local chords for one sample: forward from a vertical wheel and sideways
/// from an optional horizontal wheel.
pub fn local_chords(
    vertical: (f64, f64),
    horizontal: Option<(f64, f64)>,
    delta_theta: f64,
) -> LocalDelta {
    let (dv, ov) = vertical;
    let right = horizontal.map_or(0.0, |(dh, oh)| arc_chord(dh, delta_theta, oh));
    LocalDelta::new(arc_chord(dv, delta_theta, ov), right, delta_theta)
}

/// Apply a robot-frame chord to a world-frame pose.
///
/// The chord is rotated by the average heading over the sample, then the full
/// heading change is added. The resulting heading is left unbounded.
pub fn integrate(pose: Pose, local: LocalDelta) -> Pose {
    let avg = pose.theta + local.theta / 2.0;
    let (s, c) = (sin(avg), cos(avg));
    Pose::new(
        pose.x + local.forward * c + local.right * s,
        pose.y + local.forward * s - local.right * c,
        pose.theta + local.theta,
    )
}
