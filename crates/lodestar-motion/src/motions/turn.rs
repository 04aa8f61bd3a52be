use std::f64::consts::PI;
use std::time::Duration;

use lodestar_devices::Side;
use lodestar_kinematics::{AngularDirection, Pose, angle_error_in};
use tracing::info_span;

use super::TurnParams;
use crate::chassis::{Chassis, MotionOutcome, TickOutput};
use crate::error::MotionError;
use crate::exit::ExitCondition;
use crate::pid::Pid;

/// What a turn points the robot at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnTarget {
    /// A fixed world heading (rad).
    Heading(f64),
    /// A point to face; the heading is recomputed from the current position
    /// every tick.
    Point(Pose),
}

/// Rotates in place, or about one locked side, toward a heading.
#[derive(Debug, Clone)]
pub struct TurnController {
    target: TurnTarget,
    locked: Option<Side>,
    direction: AngularDirection,
    reversed: bool,
    max_speed: f64,
    log: bool,
    pid: Pid,
    exit: ExitCondition,
}

impl TurnController {
    /// `locked` pins one side at zero power for a swing turn.
    pub fn new(target: TurnTarget, locked: Option<Side>, params: TurnParams, pid: Pid, exit: ExitCondition) -> Self {
        TurnController {
            target,
            locked,
            direction: params.direction,
            reversed: params.reversed,
            max_speed: params.max_speed,
            log: params.log,
            pid,
            exit,
        }
    }

    /// Heading the robot should end up at, given where it is now.
    pub fn target_heading(&self, pose: Pose) -> f64 {
        let heading = match self.target {
            TurnTarget::Heading(theta) => theta,
            TurnTarget::Point(point) => pose.angle_to(&point),
        };
        if self.reversed { heading + PI } else { heading }
    }

    pub fn step(&mut self, pose: Pose, elapsed: Duration) -> TickOutput {
        let error = angle_error_in(self.target_heading(pose), pose.theta, self.direction);
        if self.direction != AngularDirection::Auto && error.abs() < PI {
            self.direction = AngularDirection::Auto;
        }

        let error = error.to_degrees();
        let state = self.exit.update(error, elapsed);
        let power = self.pid.update(error, 0.0, self.log).clamp(-self.max_speed, self.max_speed);

        let (left, right) = match self.locked {
            None => (-power, power),
            Some(Side::Left) => (0.0, power),
            Some(Side::Right) => (-power, 0.0),
        };
        TickOutput { left, right, state }
    }
}

impl Chassis {
    /// Turns in place to a world heading (rad).
    pub fn turn_to_heading(
        &mut self,
        theta: f64,
        timeout: Duration,
        params: TurnParams,
    ) -> Result<MotionOutcome, MotionError> {
        let _span = info_span!("turn_to_heading", theta).entered();
        self.turn(TurnTarget::Heading(theta), None, timeout, params, "turn_to_heading")
    }

    /// Turns in place to face `(x, y)`.
    pub fn turn_to_point(
        &mut self,
        x: f64,
        y: f64,
        timeout: Duration,
        params: TurnParams,
    ) -> Result<MotionOutcome, MotionError> {
        let _span = info_span!("turn_to_point", x, y).entered();
        self.turn(TurnTarget::Point(Pose::new(x, y, 0.0)), None, timeout, params, "turn_to_point")
    }

    pub(crate) fn turn(
        &mut self,
        target: TurnTarget,
        locked: Option<Side>,
        timeout: Duration,
        params: TurnParams,
        name: &'static str,
    ) -> Result<MotionOutcome, MotionError> {
        let params = TurnParams {
            max_speed: self.speed_cap(params.max_speed)?,
            ..params
        };
        let mut controller = TurnController::new(target, locked, params, self.angular_pid(), self.angular_exit(timeout)?);
        Ok(self.run_motion(name, |pose, elapsed| controller.step(pose, elapsed)))
    }
}
