#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lodestar_devices::sim::{LockstepClock, SimConfig, SimRobot};
use lodestar_devices::{Clock, Side, TrackingWheel};
use lodestar_kinematics::Pose;
use lodestar_motion::{Chassis, MotionSettings, OdomHandle, OdomSensors, Odometry};
use tracing_subscriber::EnvFilter;

pub const WHEEL_DIAMETER: f64 = 2.75;
pub const VERTICAL_OFFSET: f64 = 5.0;
pub const HORIZONTAL_OFFSET: f64 = -4.0;
pub const TICK: Duration = Duration::from_millis(10);

/// Installs a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two vertical tracking wheels, one horizontal wheel and an IMU.
pub fn full_sensors(robot: &SimRobot) -> OdomSensors {
    OdomSensors::default()
        .vertical(tracking(robot.vertical_encoder("left", VERTICAL_OFFSET, WHEEL_DIAMETER), VERTICAL_OFFSET))
        .vertical(tracking(robot.vertical_encoder("right", -VERTICAL_OFFSET, WHEEL_DIAMETER), -VERTICAL_OFFSET))
        .horizontal(tracking(
            robot.horizontal_encoder("back", HORIZONTAL_OFFSET, WHEEL_DIAMETER),
            HORIZONTAL_OFFSET,
        ))
        .imu(Box::new(robot.imu("imu")))
}

pub fn tracking(encoder: impl lodestar_devices::RotationSensor + 'static, offset: f64) -> TrackingWheel {
    TrackingWheel::new(Box::new(encoder), WHEEL_DIAMETER, offset, 1.0).unwrap()
}

/// A simulated robot with odometry updated in lockstep with the plant.
pub struct Rig {
    pub robot: SimRobot,
    pub clock: Arc<LockstepClock>,
    pub chassis: Chassis,
}

impl Rig {
    pub fn new(start: Pose) -> Self {
        Self::with(SimConfig::default(), start, MotionSettings::default())
    }

    pub fn with(config: SimConfig, start: Pose, settings: MotionSettings) -> Self {
        init_tracing();
        let robot = SimRobot::new(config, start).unwrap();
        let handle = OdomHandle::new(start);
        let mut odometry = Odometry::new(full_sensors(&robot), handle.clone()).unwrap();
        odometry.calibrate().unwrap();

        let clock = Arc::new(LockstepClock::new(robot.clone(), Duration::from_millis(1)));
        clock.on_step(move |dt| {
            let _ = odometry.update(dt);
        });

        let chassis = Chassis::new(
            Box::new(robot.drivetrain()),
            handle,
            Box::new(robot.match_phase()),
            Arc::clone(&clock) as Arc<dyn Clock>,
            settings,
        )
        .unwrap();
        Rig { robot, clock, chassis }
    }

    /// Changes the match phase once the simulation reaches `at`.
    pub fn change_phase_at(&self, at: Duration) {
        let robot = self.robot.clone();
        self.clock.on_step(move |_| {
            if robot.elapsed() >= at {
                robot.set_phase(1);
            }
        });
    }

    /// True when the most recent command on both sides was zero power.
    pub fn stopped(&self) -> bool {
        [Side::Left, Side::Right]
            .into_iter()
            .all(|side| self.robot.last_command(side).is_some_and(|c| c.power == 0.0))
    }
}
