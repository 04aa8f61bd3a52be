//! A deterministic differential-drive plant.
//!
//! [`SimRobot`] owns the true state of a simulated robot and hands out device
//! adapters ([`SimDrivetrain`], [`SimEncoder`], [`SimImu`], [`SimPhase`]) that
//! all share it. Power maps linearly to wheel speed with no inertia, and the
//! pose is advanced along exact arcs, so encoder and IMU readings are
//! consistent with the true pose to within floating point error (plus any
//! configured encoder noise).
//!
//! [`LockstepClock`] advances the plant whenever a control loop sleeps, which
//! makes whole motions run deterministically and without wall-clock time.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use lodestar_kinematics::{DifferentialDrive, KinematicsError, Pose, WheelSpeeds};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::{
    Clock, DeviceError, Drivetrain, HeadingSensor, MatchPhase, PhaseToken, RotationSensor, Side,
};

/// Physical parameters of the simulated robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    /// Distance between wheel contact lines (in).
    pub track_width: f64,
    /// Side ground speed at full power (in/s).
    pub max_velocity: f64,
    pub max_power: f64,
    /// Half-width of the uniform noise added to every encoder read (in).
    pub encoder_noise: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            track_width: 12.0,
            max_velocity: 60.0,
            max_power: 127.0,
            encoder_noise: 0.0,
            seed: 0,
        }
    }
}

/// A power command as seen by the plant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerCommand {
    pub at: Duration,
    pub side: Side,
    pub power: f64,
}

struct SimWorld {
    drive: DifferentialDrive,
    config: SimConfig,
    pose: Pose,
    start_theta: f64,
    powers: WheelSpeeds,
    /// Arc length travelled by the tracking center.
    travel: f64,
    /// Accumulated rotation since the start.
    rotation: f64,
    elapsed: Duration,
    phase: u32,
    disconnected: HashSet<String>,
    failing_calibrations: u32,
    /// Most recent command per side, indexed by [`side_index`].
    last: [Option<PowerCommand>; 2],
    /// Full command history, kept only once [`SimRobot::record_commands`]
    /// has been called.
    history: Option<Vec<PowerCommand>>,
    rng: StdRng,
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

impl SimWorld {
    fn check(&self, name: &str) -> Result<(), DeviceError> {
        if self.disconnected.contains(name) {
            Err(DeviceError::Disconnected(name.to_string()))
        } else {
            Ok(())
        }
    }

    fn noise(&mut self) -> f64 {
        let n = self.config.encoder_noise;
        if n > 0.0 { self.rng.random_range(-n..=n) } else { 0.0 }
    }
}

/// Shared handle to the simulated robot. Clones refer to the same robot.
#[derive(Clone)]
pub struct SimRobot {
    world: Arc<Mutex<SimWorld>>,
}

impl SimRobot {
    /// Creates a robot at rest at `start`.
    pub fn new(config: SimConfig, start: Pose) -> Result<Self, KinematicsError> {
        let drive = DifferentialDrive::new(config.track_width)?;
        let world = SimWorld {
            drive,
            config,
            pose: start,
            start_theta: start.theta,
            powers: WheelSpeeds::default(),
            travel: 0.0,
            rotation: 0.0,
            elapsed: Duration::ZERO,
            phase: 0,
            disconnected: HashSet::new(),
            failing_calibrations: 0,
            last: [None; 2],
            history: None,
            rng: StdRng::seed_from_u64(config.seed),
        };
        Ok(SimRobot {
            world: Arc::new(Mutex::new(world)),
        })
    }

    /// Advances the plant by `dt` at the currently commanded powers.
    pub fn step(&self, dt: Duration) {
        let mut w = self.world.lock();
        let scale = w.config.max_velocity / w.config.max_power;
        let wheels = WheelSpeeds::new(w.powers.left * scale, w.powers.right * scale);
        let chassis = w.drive.forward_kinematics(wheels);
        let secs = dt.as_secs_f64();
        match w.drive.update_pose(w.pose, chassis, secs) {
            Ok(pose) => w.pose = pose,
            Err(e) => warn!(error = %e, "Simulation step rejected"),
        }
        w.travel += chassis.v * secs;
        w.rotation += chassis.omega * secs;
        w.elapsed += dt;
    }

    /// The true pose, with an unbounded heading.
    pub fn pose(&self) -> Pose {
        self.world.lock().pose
    }

    pub fn elapsed(&self) -> Duration {
        self.world.lock().elapsed
    }

    /// Currently commanded side powers.
    pub fn powers(&self) -> WheelSpeeds {
        self.world.lock().powers
    }

    pub fn set_phase(&self, phase: u32) {
        debug!(phase, "Simulated match phase changed");
        self.world.lock().phase = phase;
    }

    /// Makes every device registered under `name` fail until reconnected.
    pub fn disconnect(&self, name: &str) {
        self.world.lock().disconnected.insert(name.to_string());
    }

    pub fn reconnect(&self, name: &str) {
        self.world.lock().disconnected.remove(name);
    }

    /// Makes the next `count` IMU calibration attempts fail.
    pub fn fail_calibrations(&self, count: u32) {
        self.world.lock().failing_calibrations = count;
    }

    /// Starts keeping every power command. Off by default so a long run
    /// does not grow without bound.
    pub fn record_commands(&self) {
        self.world.lock().history.get_or_insert_with(Vec::new);
    }

    /// Power commands received since [`record_commands`](Self::record_commands),
    /// oldest first. Empty when recording is off.
    pub fn commands(&self) -> Vec<PowerCommand> {
        self.world.lock().history.clone().unwrap_or_default()
    }

    pub fn last_command(&self, side: Side) -> Option<PowerCommand> {
        self.world.lock().last[side_index(side)]
    }

    pub fn drivetrain(&self) -> SimDrivetrain {
        SimDrivetrain {
            robot: self.clone(),
            name: "drivetrain".to_string(),
        }
    }

    /// An encoder on a forward-reading wheel `offset` inches left of center.
    pub fn vertical_encoder(&self, name: &str, offset: f64, diameter: f64) -> SimEncoder {
        self.encoder(name, Axis::Vertical, offset, diameter)
    }

    /// An encoder on a sideways-reading wheel `offset` inches ahead of center.
    pub fn horizontal_encoder(&self, name: &str, offset: f64, diameter: f64) -> SimEncoder {
        self.encoder(name, Axis::Horizontal, offset, diameter)
    }

    fn encoder(&self, name: &str, axis: Axis, offset: f64, diameter: f64) -> SimEncoder {
        let mut encoder = SimEncoder {
            robot: self.clone(),
            name: name.to_string(),
            axis,
            offset,
            radius: diameter / 2.0,
            baseline: 0.0,
        };
        encoder.baseline = encoder.raw(&self.world.lock());
        encoder
    }

    pub fn imu(&self, name: &str) -> SimImu {
        let offset = self.world.lock().start_theta;
        SimImu {
            robot: self.clone(),
            name: name.to_string(),
            offset,
        }
    }

    pub fn match_phase(&self) -> SimPhase {
        SimPhase { robot: self.clone() }
    }
}

/// Drivetrain adapter that records every command into the plant.
pub struct SimDrivetrain {
    robot: SimRobot,
    name: String,
}

impl Drivetrain for SimDrivetrain {
    fn set_power(&mut self, side: Side, power: f64) -> Result<(), DeviceError> {
        let mut w = self.robot.world.lock();
        w.check(&self.name)?;
        if !power.is_finite() {
            return Err(DeviceError::OutOfRange {
                device: self.name.clone(),
                value: power,
            });
        }
        let max = w.config.max_power;
        let power = power.clamp(-max, max);
        let at = w.elapsed;
        let command = PowerCommand { at, side, power };
        w.last[side_index(side)] = Some(command);
        if let Some(history) = w.history.as_mut() {
            history.push(command);
        }
        match side {
            Side::Left => w.powers.left = power,
            Side::Right => w.powers.right = power,
        }
        Ok(())
    }

    fn max_power(&self) -> f64 {
        self.robot.world.lock().config.max_power
    }

    fn max_velocity(&self) -> f64 {
        self.robot.world.lock().config.max_velocity
    }

    fn track_width(&self) -> f64 {
        self.robot.world.lock().config.track_width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Vertical,
    Horizontal,
}

/// Rotation sensor on a simulated tracking wheel.
pub struct SimEncoder {
    robot: SimRobot,
    name: String,
    axis: Axis,
    offset: f64,
    radius: f64,
    baseline: f64,
}

impl SimEncoder {
    fn raw(&self, w: &SimWorld) -> f64 {
        let distance = match self.axis {
            Axis::Vertical => w.travel - self.offset * w.rotation,
            Axis::Horizontal => -self.offset * w.rotation,
        };
        distance / self.radius
    }
}

impl RotationSensor for SimEncoder {
    fn position(&self) -> Result<f64, DeviceError> {
        let mut w = self.robot.world.lock();
        w.check(&self.name)?;
        let noise = w.noise() / self.radius;
        Ok(self.raw(&w) - self.baseline + noise)
    }

    fn reset_position(&mut self) -> Result<(), DeviceError> {
        let w = self.robot.world.lock();
        w.check(&self.name)?;
        self.baseline = self.raw(&w);
        Ok(())
    }
}

/// Simulated inertial sensor reporting the true rotation.
pub struct SimImu {
    robot: SimRobot,
    name: String,
    offset: f64,
}

impl HeadingSensor for SimImu {
    fn calibrate(&mut self) -> Result<(), DeviceError> {
        let mut w = self.robot.world.lock();
        w.check(&self.name)?;
        if w.failing_calibrations > 0 {
            w.failing_calibrations -= 1;
            return Err(DeviceError::CalibrationFailed(self.name.clone()));
        }
        Ok(())
    }

    fn is_calibrating(&self) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        self.robot.world.lock().check(&self.name).is_ok()
    }

    fn heading(&self) -> Result<f64, DeviceError> {
        self.rotation().map(Pose::normalize_angle)
    }

    fn rotation(&self) -> Result<f64, DeviceError> {
        let w = self.robot.world.lock();
        w.check(&self.name)?;
        Ok(w.rotation + self.offset)
    }

    fn set_rotation(&mut self, rotation: f64) -> Result<(), DeviceError> {
        let w = self.robot.world.lock();
        w.check(&self.name)?;
        self.offset = rotation - w.rotation;
        Ok(())
    }
}

pub struct SimPhase {
    robot: SimRobot,
}

impl MatchPhase for SimPhase {
    fn phase(&self) -> PhaseToken {
        PhaseToken(self.robot.world.lock().phase)
    }
}

/// Callback run after every lockstep simulation step with the step length.
pub type StepHook = Box<dyn FnMut(Duration) + Send>;

/// A [`Clock`] whose `sleep` advances the simulated robot instead of waiting.
///
/// Sleeps are broken into fixed steps; after each step every registered hook
/// runs, which is where tests update odometry or inject events.
pub struct LockstepClock {
    robot: SimRobot,
    step: Duration,
    hooks: Mutex<Vec<StepHook>>,
}

impl LockstepClock {
    pub fn new(robot: SimRobot, step: Duration) -> Self {
        LockstepClock {
            robot,
            step: step.max(Duration::from_millis(1)),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Registers a hook. Hooks must not sleep on this clock.
    pub fn on_step(&self, hook: impl FnMut(Duration) + Send + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }
}

impl Clock for LockstepClock {
    fn now(&self) -> Duration {
        self.robot.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            let dt = remaining.min(self.step);
            self.robot.step(dt);
            for hook in self.hooks.lock().iter_mut() {
                hook(dt);
            }
            remaining -= dt;
        }
    }
}
