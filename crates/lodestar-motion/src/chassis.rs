use std::sync::Arc;
use std::time::Duration;

use lodestar_devices::{Clock, Drivetrain, MatchPhase};
use lodestar_kinematics::{DifferentialDrive, LocalDelta, Pose};
use tracing::{debug, info, warn};

use crate::bus::{TelemetryRecord, Topic};
use crate::error::ConfigError;
use crate::exit::{ExitCondition, ExitState};
use crate::pid::Pid;
use crate::settings::MotionSettings;
use crate::state::OdomHandle;

/// How a motion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// The exit condition reported convergence.
    Settled,
    /// The motion's own timeout fired first.
    TimedOut,
    /// The match phase changed mid-motion.
    Cancelled,
}

/// What a motion controller decided for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutput {
    pub left: f64,
    pub right: f64,
    pub state: ExitState,
}

/// A differential drivetrain plus everything needed to drive it closed loop.
///
/// Motion primitives block the calling thread until they finish, so one
/// `Chassis` runs one motion at a time.
pub struct Chassis {
    drivetrain: Box<dyn Drivetrain>,
    odom: OdomHandle,
    phase: Box<dyn MatchPhase>,
    clock: Arc<dyn Clock>,
    settings: MotionSettings,
    drive: DifferentialDrive,
    telemetry: Option<Topic<TelemetryRecord>>,
}

impl Chassis {
    /// # Errors
    ///
    /// Returns an error if `settings` are invalid or the drivetrain reports a
    /// non-positive track width.
    pub fn new(
        drivetrain: Box<dyn Drivetrain>,
        odom: OdomHandle,
        phase: Box<dyn MatchPhase>,
        clock: Arc<dyn Clock>,
        settings: MotionSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let drive = DifferentialDrive::new(drivetrain.track_width())?;
        info!(%drive, tick_ms = settings.tick_ms, "Chassis ready");
        Ok(Chassis {
            drivetrain,
            odom,
            phase,
            clock,
            settings,
            drive,
            telemetry: None,
        })
    }

    /// Publishes controller samples from motions run with logging enabled.
    pub fn with_telemetry(mut self, topic: Topic<TelemetryRecord>) -> Self {
        self.telemetry = Some(topic);
        self
    }

    pub fn pose(&self) -> Pose {
        self.odom.pose()
    }

    pub fn set_pose(&self, pose: Pose) {
        self.odom.set_pose(pose);
    }

    pub fn speed(&self) -> Pose {
        self.odom.speed()
    }

    pub fn local_speed(&self) -> LocalDelta {
        self.odom.local_speed()
    }

    /// See [`OdomHandle::estimate_pose`].
    pub fn estimate_pose(&self, seconds: f64) -> Pose {
        self.odom.estimate_pose(seconds)
    }

    pub fn odometry(&self) -> &OdomHandle {
        &self.odom
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    pub fn kinematics(&self) -> DifferentialDrive {
        self.drive
    }

    pub fn max_power(&self) -> f64 {
        self.drivetrain.max_power()
    }

    /// Commands zero power to both sides. Failures are logged, not returned.
    pub fn stop(&mut self) {
        if let Err(e) = self.drivetrain.stop() {
            warn!(error = %e, "Failed to stop drivetrain");
        }
    }

    fn command(&mut self, left: f64, right: f64) {
        if let Err(e) = self.drivetrain.set_powers(left, right) {
            warn!(error = %e, left, right, "Failed to command drivetrain");
        }
    }

    fn tick(&self) -> Duration {
        Duration::from_millis(self.settings.tick_ms)
    }

    pub(crate) fn lateral_pid(&self) -> Pid {
        Pid::new("lateral", self.settings.lateral.gains, self.tick().as_secs_f64())
            .with_telemetry(self.telemetry.clone())
    }

    pub(crate) fn angular_pid(&self) -> Pid {
        Pid::new("angular", self.settings.angular.gains, self.tick().as_secs_f64())
            .with_telemetry(self.telemetry.clone())
    }

    pub(crate) fn lateral_exit(&self, timeout: Duration) -> Result<ExitCondition, ConfigError> {
        ExitCondition::new(self.settings.lateral.exit, timeout)
    }

    pub(crate) fn angular_exit(&self, timeout: Duration) -> Result<ExitCondition, ConfigError> {
        ExitCondition::new(self.settings.angular.exit, timeout)
    }

    /// Validates a caller speed cap and limits it to what the drivetrain accepts.
    pub(crate) fn speed_cap(&self, max_speed: f64) -> Result<f64, ConfigError> {
        if !(max_speed > 0.0 && max_speed.is_finite()) {
            return Err(ConfigError::OutOfRange("max_speed"));
        }
        Ok(max_speed.min(self.max_power()))
    }

    /// The loop shared by every motion.
    ///
    /// Each tick checks for a phase change, reads one pose snapshot, asks
    /// `step` for powers and commands them. Whatever ends the loop, both
    /// sides are commanded to zero before returning.
    pub(crate) fn run_motion(
        &mut self,
        name: &'static str,
        mut step: impl FnMut(Pose, Duration) -> TickOutput,
    ) -> MotionOutcome {
        let phase = self.phase.phase();
        let start = self.clock.now();
        let period = self.tick();
        info!(motion = name, pose = %self.pose(), "Motion started");

        let mut ticks = 0u64;
        let outcome = loop {
            if self.phase.phase() != phase {
                break MotionOutcome::Cancelled;
            }
            let pose = self.odom.pose();
            let elapsed = self.clock.now().saturating_sub(start);
            let out = step(pose, elapsed);
            match out.state {
                ExitState::Settled => break MotionOutcome::Settled,
                ExitState::TimedOut => break MotionOutcome::TimedOut,
                ExitState::Running => {}
            }
            self.command(out.left, out.right);
            ticks += 1;
            self.clock.sleep(period);
        };

        self.stop();
        let elapsed = self.clock.now().saturating_sub(start);
        debug!(motion = name, ticks, ?elapsed, "Motion loop exited");
        info!(motion = name, ?outcome, pose = %self.pose(), "Motion finished");
        outcome
    }
}
