//! Move-to-pose using a boomerang controller.
//!
//! The robot chases a carrot point placed behind the target along the target
//! heading, at `lead` times the remaining distance. As the distance shrinks
//! the carrot slides onto the target, which bends the approach so the robot
//! arrives already facing the target heading.

use std::f64::consts::PI;
use std::time::Duration;

use lodestar_kinematics::{Pose, WheelSpeeds, angle_error, sgn, slew};
use tracing::{debug, info_span};

use super::{BoomerangParams, CLOSE_DISTANCE, CLOSE_MIN_SPEED, MIN_MOTION_TIME};
use crate::chassis::{Chassis, MotionOutcome, TickOutput};
use crate::error::{ConfigError, MotionError};
use crate::exit::{ExitCondition, ExitState};
use crate::pid::Pid;

#[derive(Debug, Clone)]
pub struct BoomerangController {
    target: Pose,
    lead: f64,
    max_speed: f64,
    slew: f64,
    log: bool,
    lateral: Pid,
    angular: Pid,
    exit: ExitCondition,
    close: bool,
    prev_lateral: f64,
    carrot: Pose,
}

impl BoomerangController {
    /// # Errors
    ///
    /// Returns [`ConfigError::Lead`] unless `0 <= lead <= 1`.
    pub fn new(
        target: Pose,
        params: BoomerangParams,
        slew: f64,
        lateral: Pid,
        angular: Pid,
        exit: ExitCondition,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&params.lead) {
            return Err(ConfigError::Lead(params.lead));
        }
        Ok(BoomerangController {
            target,
            lead: params.lead,
            max_speed: params.max_speed,
            slew,
            log: params.log,
            lateral,
            angular,
            exit,
            close: false,
            prev_lateral: 0.0,
            carrot: target,
        })
    }

    /// The carrot used by the most recent step.
    pub fn carrot(&self) -> Pose {
        self.carrot
    }

    pub fn is_close(&self) -> bool {
        self.close
    }

    /// Current speed cap, which close mode may have tightened.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn step(&mut self, pose: Pose, elapsed: Duration) -> TickOutput {
        let target = self.target;
        let distance = pose.distance(&target);

        let carrot = if self.close {
            target
        } else {
            let back = Pose::new(target.theta.cos(), target.theta.sin(), 0.0);
            let carrot = target - back * (self.lead * distance);
            carrot.with_theta(pose.angle_to(&carrot))
        };
        self.carrot = carrot;

        // Facing the carrot forwards or backwards, whichever is less rotation.
        let forward_error = angle_error(carrot.theta, pose.theta);
        let backward_error = angle_error(carrot.theta + PI, pose.theta);
        let angular_error = if forward_error.abs() < backward_error.abs() {
            forward_error
        } else {
            backward_error
        };
        let lateral_error = if self.close {
            distance * angle_error(pose.angle_to(&target), pose.theta).cos()
        } else {
            pose.distance(&carrot) * forward_error.cos()
        };

        let mut state = self.exit.update(lateral_error, elapsed);
        if state == ExitState::Settled && elapsed < MIN_MOTION_TIME {
            state = ExitState::Running;
        }

        let mut lateral = self.lateral.update(lateral_error, 0.0, self.log).clamp(-self.max_speed, self.max_speed);
        if !self.close {
            lateral = slew(lateral, self.prev_lateral, self.slew);
        }
        lateral *= angular_error.cos().abs();

        let angular = self.angular.update(angular_error.to_degrees(), 0.0, self.log);

        // Undershooting the distance beats overshooting it.
        let overturn = angular.abs() + lateral.abs() - self.max_speed;
        if overturn > 0.0 {
            lateral -= sgn(lateral) * overturn;
        }

        if distance < CLOSE_DISTANCE {
            if !self.close {
                debug!(%pose, distance, "Boomerang entering close mode");
            }
            self.close = true;
            self.max_speed = self.prev_lateral.abs().max(CLOSE_MIN_SPEED).min(self.max_speed);
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
    /// Drives to `(x, y)` arriving at heading `theta` (rad).
    ///
    /// The robot picks forwards or backwards on its own, whichever needs less
    /// rotation toward the carrot.
    pub fn move_to_pose(
        &mut self,
        x: f64,
        y: f64,
        theta: f64,
        timeout: Duration,
        params: BoomerangParams,
    ) -> Result<MotionOutcome, MotionError> {
        let _span = info_span!("move_to_pose", x, y, theta, lead = params.lead).entered();
        let params = BoomerangParams {
            max_speed: self.speed_cap(params.max_speed)?,
            ..params
        };
        let slew = params.slew.unwrap_or(self.settings().lateral.slew);
        let mut controller = BoomerangController::new(
            Pose::new(x, y, theta),
            params,
            slew,
            self.lateral_pid(),
            self.angular_pid(),
            self.lateral_exit(timeout)?,
        )?;
        Ok(self.run_motion("move_to_pose", |pose, elapsed| controller.step(pose, elapsed)))
    }
}
