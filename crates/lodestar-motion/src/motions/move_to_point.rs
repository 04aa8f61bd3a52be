use std::f64::consts::PI;
use std::time::Duration;

use lodestar_kinematics::{Pose, WheelSpeeds, angle_error, slew};
use tracing::{debug, info_span};

use super::{CLOSE_DISTANCE, CLOSE_MIN_SPEED, PointParams};
use crate::chassis::{Chassis, MotionOutcome, TickOutput};
use crate::error::MotionError;
use crate::exit::ExitCondition;
use crate::pid::Pid;

/// Drives to a point without caring about the final heading.
#[derive(Debug, Clone)]
pub struct PointController {
    target: Pose,
    forwards: bool,
    max_speed: f64,
    slew: f64,
    log: bool,
    lateral: Pid,
    angular: Pid,
    exit: ExitCondition,
    close: bool,
    prev_lateral: f64,
}

impl PointController {
    pub fn new(target: Pose, params: PointParams, slew: f64, lateral: Pid, angular: Pid, exit: ExitCondition) -> Self {
        PointController {
            target,
            forwards: params.forwards,
            max_speed: params.max_speed,
            slew,
            log: params.log,
            lateral,
            angular,
            exit,
            close: false,
            prev_lateral: 0.0,
        }
    }

    pub fn is_close(&self) -> bool {
        self.close
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn step(&mut self, pose: Pose, elapsed: Duration) -> TickOutput {
        let distance = pose.distance(&self.target);
        if distance < CLOSE_DISTANCE && !self.close {
            debug!(%pose, distance, "Point motion entering close mode");
            self.close = true;
            self.max_speed = self.prev_lateral.abs().max(CLOSE_MIN_SPEED).min(self.max_speed);
        }

        let bearing = pose.angle_to(&self.target);
        let heading = if self.forwards { pose.theta } else { pose.theta + PI };
        let angular_error = angle_error(bearing, heading);
        // Signed projection of the remaining distance onto the robot's axis.
        let lateral_error = distance * angle_error(bearing, pose.theta).cos();

        let state = self.exit.update(lateral_error, elapsed);

        let mut lateral = self.lateral.update(lateral_error, 0.0, self.log).clamp(-self.max_speed, self.max_speed);
        let mut angular = self
            .angular
            .update(angular_error.to_degrees(), 0.0, self.log)
            .clamp(-self.max_speed, self.max_speed);
        if self.close {
            angular = 0.0;
        } else {
            lateral = slew(lateral, self.prev_lateral, self.slew);
            lateral = if self.forwards { lateral.max(0.0) } else { lateral.min(0.0) };
        }

        let wheels = WheelSpeeds::new(lateral - angular, lateral + angular).desaturate(self.max_speed);
        self.prev_lateral = lateral;
        TickOutput {
            left: wheels.left,
            right: wheels.right,
            state,
        }
    }
}

impl Chassis {
    /// Drives to `(x, y)`, turning toward it along the way.
    ///
    /// Inside the close-mode radius steering stops and the robot only closes
    /// the distance along its current axis, which keeps it from circling a
    /// point it narrowly missed.
    pub fn move_to_point(
        &mut self,
        x: f64,
        y: f64,
        timeout: Duration,
        params: PointParams,
    ) -> Result<MotionOutcome, MotionError> {
        let _span = info_span!("move_to_point", x, y, forwards = params.forwards).entered();
        let params = PointParams {
            max_speed: self.speed_cap(params.max_speed)?,
            ..params
        };
        let slew = params.slew.unwrap_or(self.settings().lateral.slew);
        let mut controller = PointController::new(
            Pose::new(x, y, 0.0),
            params,
            slew,
            self.lateral_pid(),
            self.angular_pid(),
            self.lateral_exit(timeout)?,
        );
        Ok(self.run_motion("move_to_point", |pose, elapsed| controller.step(pose, elapsed)))
    }
}
