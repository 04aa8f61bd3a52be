use std::time::Duration;

use lodestar_devices::Side;
use lodestar_kinematics::Pose;
use tracing::info_span;

use super::{TurnParams, TurnTarget};
use crate::chassis::{Chassis, MotionOutcome};
use crate::error::MotionError;

impl Chassis {
    /// Pivots about the `locked` side until the robot faces `theta` (rad).
    ///
    /// The locked side is held at zero power; only the other side drives.
    pub fn swing_to_heading(
        &mut self,
        theta: f64,
        locked: Side,
        timeout: Duration,
        params: TurnParams,
    ) -> Result<MotionOutcome, MotionError> {
        let _span = info_span!("swing_to_heading", theta, ?locked).entered();
        self.turn(TurnTarget::Heading(theta), Some(locked), timeout, params, "swing_to_heading")
    }

    /// Pivots about the `locked` side until the robot faces `(x, y)`.
    pub fn swing_to_point(
        &mut self,
        x: f64,
        y: f64,
        locked: Side,
        timeout: Duration,
        params: TurnParams,
    ) -> Result<MotionOutcome, MotionError> {
        let _span = info_span!("swing_to_point", x, y, ?locked).entered();
        self.turn(TurnTarget::Point(Pose::new(x, y, 0.0)), Some(locked), timeout, params, "swing_to_point")
    }
}
