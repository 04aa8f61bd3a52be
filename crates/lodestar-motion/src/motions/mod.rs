//! Closed-loop motion primitives.
//!
//! Each primitive is a controller with a `step(pose, elapsed)` method plus a
//! blocking [`Chassis`](crate::Chassis) method that runs it through the
//! shared motion loop. Angular controllers take their error in degrees and
//! lateral controllers in inches; powers share the drivetrain's power range.

mod boomerang;
mod move_to_point;
mod pursuit;
mod swing;
mod turn;

use std::time::Duration;

use lodestar_kinematics::AngularDirection;

pub use boomerang::BoomerangController;
pub use move_to_point::PointController;
pub use pursuit::{PursuitController, PursuitStep, PursuitTracker};
pub use turn::{TurnController, TurnTarget};

/// Distance (in) from the target at which the pose and point controllers
/// switch to close mode.
pub const CLOSE_DISTANCE: f64 = 7.5;

/// Lowest speed cap close mode will tighten to.
pub(crate) const CLOSE_MIN_SPEED: f64 = 30.0;

/// The lateral exit condition is not allowed to settle a pose motion before
/// this much time has passed.
pub(crate) const MIN_MOTION_TIME: Duration = Duration::from_millis(300);

/// Parameters for turns and swings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnParams {
    /// Which way to rotate. Once the remaining rotation is under a half turn
    /// the controller falls back to the shortest direction.
    pub direction: AngularDirection,
    /// Face the target with the back of the robot.
    pub reversed: bool,
    pub max_speed: f64,
    pub log: bool,
}

impl Default for TurnParams {
    fn default() -> Self {
        TurnParams {
            direction: AngularDirection::Auto,
            reversed: false,
            max_speed: 127.0,
            log: false,
        }
    }
}

/// Parameters for [`Chassis::move_to_pose`](crate::Chassis::move_to_pose).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoomerangParams {
    /// How far back along the target heading the carrot sits, as a fraction
    /// of the remaining distance. Larger values curve the approach more.
    pub lead: f64,
    pub max_speed: f64,
    /// Overrides the lateral slew from the chassis settings.
    pub slew: Option<f64>,
    pub log: bool,
}

impl Default for BoomerangParams {
    fn default() -> Self {
        BoomerangParams {
            lead: 0.6,
            max_speed: 127.0,
            slew: None,
            log: false,
        }
    }
}

/// Parameters for [`Chassis::move_to_point`](crate::Chassis::move_to_point).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointParams {
    pub forwards: bool,
    pub max_speed: f64,
    pub slew: Option<f64>,
    pub log: bool,
}

impl Default for PointParams {
    fn default() -> Self {
        PointParams {
            forwards: true,
            max_speed: 127.0,
            slew: None,
            log: false,
        }
    }
}

/// Parameters for [`Chassis::follow`](crate::Chassis::follow).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PursuitParams {
    pub forwards: bool,
    /// Cap on the commanded speed. Per-waypoint speeds above it are limited.
    pub max_speed: f64,
    /// How close (in) to the final waypoint counts as arrived.
    pub end_tolerance: f64,
    pub log: bool,
}

impl Default for PursuitParams {
    fn default() -> Self {
        PursuitParams {
            forwards: true,
            max_speed: 127.0,
            end_tolerance: 2.0,
            log: false,
        }
    }
}
