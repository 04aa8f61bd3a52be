mod common;

use std::f64::consts::FRAC_PI_2;
use std::time::Duration;

use common::{TICK, WHEEL_DIAMETER, full_sensors, init_tracing, tracking};
use lodestar_devices::sim::{SimConfig, SimRobot};
use lodestar_devices::{Drivetrain, TrackingWheel};
use lodestar_kinematics::{Pose, angle_error};
use lodestar_motion::{CALIBRATION_ATTEMPTS, ConfigError, OdomHandle, OdomSensors, Odometry, OdometryError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Runs the plant at fixed powers for `duration`, updating odometry every tick.
fn drive(robot: &SimRobot, odometry: &mut Odometry, left: f64, right: f64, duration: Duration) {
    robot.drivetrain().set_powers(left, right).unwrap();
    let mut remaining = duration;
    while !remaining.is_zero() {
        let dt = remaining.min(TICK);
        robot.step(dt);
        let _ = odometry.update(dt);
        remaining -= dt;
    }
    robot.drivetrain().stop().unwrap();
}

/// Power that moves each side at `speed` in/s with the default plant.
fn power_for(speed: f64) -> f64 {
    let config = SimConfig::default();
    speed * config.max_power / config.max_velocity
}

fn calibrated(sensors: OdomSensors, start: Pose) -> Odometry {
    let mut odometry = Odometry::new(sensors, OdomHandle::new(start)).unwrap();
    odometry.calibrate().unwrap();
    odometry
}

#[test]
fn test_closed_square_returns_to_start() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(7);
    let config = SimConfig {
        encoder_noise: 0.005,
        seed: rng.random(),
        ..SimConfig::default()
    };
    let start = Pose::new(12.0, -6.0, 0.3);
    let robot = SimRobot::new(config, start).unwrap();
    let mut odometry = calibrated(full_sensors(&robot), start);

    // 30 in/s per side: 24" straights take 0.8 s; turning in place spins at 5 rad/s.
    let p = power_for(30.0);
    let quarter = Duration::from_secs_f64(FRAC_PI_2 / 5.0);
    for _ in 0..4 {
        drive(&robot, &mut odometry, p, p, Duration::from_millis(800));
        drive(&robot, &mut odometry, -p, p, quarter);
    }

    let truth = robot.pose();
    assert!(truth.distance(&start) < 1e-6);
    let estimate = odometry.handle().pose();
    assert!(estimate.distance(&start) < 0.5, "drifted to {estimate}");
    assert!(angle_error(start.theta, estimate.theta).abs() < 1f64.to_radians());
    assert_eq!(odometry.handle().snapshot().ticks, 4 * (80 + 32));
}

#[test]
fn test_speed_estimates_follow_motion() {
    let robot = SimRobot::new(SimConfig::default(), Pose::new(0.0, 0.0, FRAC_PI_2)).unwrap();
    let mut odometry = calibrated(full_sensors(&robot), Pose::new(0.0, 0.0, FRAC_PI_2));
    let p = power_for(20.0);
    robot.drivetrain().set_powers(p, p).unwrap();
    for _ in 0..100 {
        robot.step(TICK);
        odometry.update(TICK).unwrap();
    }
    let handle = odometry.handle();
    // Facing +y, so all the global speed is along y.
    assert!(handle.speed().x.abs() < 1e-3);
    assert!((handle.speed().y - 20.0).abs() < 1e-3);
    assert!((handle.local_speed().forward - 20.0).abs() < 1e-3);
    // Half a second of straight driving is 10".
    let predicted = handle.estimate_pose(0.5);
    assert!((predicted.y - handle.pose().y - 10.0).abs() < 1e-2);
}

#[test]
fn test_sensor_loss_freezes_pose_and_recovers() {
    init_tracing();
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let mut odometry = calibrated(full_sensors(&robot), Pose::origin());
    let p = power_for(30.0);

    drive(&robot, &mut odometry, p, p, Duration::from_millis(400));
    let before = odometry.handle().pose();
    assert!((before.x - 12.0).abs() < 1e-6);

    robot.disconnect("left");
    robot.disconnect("right");
    robot.drivetrain().set_powers(p, p).unwrap();
    robot.step(TICK);
    let err = odometry.update(TICK).unwrap_err();
    assert!(matches!(err, OdometryError::SensorLoss { pose } if pose == before));
    drive(&robot, &mut odometry, p, p, Duration::from_millis(400));
    let frozen = odometry.handle().snapshot();
    assert!(frozen.health.pose_frozen);
    assert_eq!(frozen.pose, before);
    assert_eq!(frozen.speed, Pose::default());

    // The distance covered while blind is not replayed on reconnect.
    robot.reconnect("left");
    robot.reconnect("right");
    drive(&robot, &mut odometry, p, p, Duration::from_millis(400));
    let after = odometry.handle().snapshot();
    assert!(!after.health.pose_frozen);
    assert!(after.health.vertical.iter().all(|&ok| ok));
    assert!((after.pose.x - before.x - 12.0).abs() < 0.4);
    assert!((robot.pose().x - 36.3).abs() < 1e-6);
}

#[test]
fn test_single_wheel_loss_keeps_tracking() {
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let mut odometry = calibrated(full_sensors(&robot), Pose::origin());
    let p = power_for(30.0);

    robot.disconnect("left");
    drive(&robot, &mut odometry, p, p, Duration::from_millis(400));
    let state = odometry.handle().snapshot();
    assert_eq!(state.health.vertical, [false, true]);
    assert!(!state.health.pose_frozen);
    assert!((state.pose.x - 12.0).abs() < 1e-6);
}

#[test]
fn test_imu_outranks_tracking_pair() {
    // Wheels mounted 6" out but configured at 5", so the pair over-reads
    // rotation by 20% while the IMU is exact.
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let sensors = OdomSensors::default()
        .vertical(tracking(robot.vertical_encoder("left", 6.0, WHEEL_DIAMETER), 5.0))
        .vertical(tracking(robot.vertical_encoder("right", -6.0, WHEEL_DIAMETER), -5.0))
        .imu(Box::new(robot.imu("imu")));
    let mut odometry = calibrated(sensors, Pose::origin());
    let p = power_for(10.0);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(500));
    assert!((odometry.handle().pose().theta - robot.pose().theta).abs() < 1e-6);

    robot.disconnect("imu");
    let before = (odometry.handle().pose().theta, robot.pose().theta);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(500));
    let turned = (odometry.handle().pose().theta - before.0, robot.pose().theta - before.1);
    assert!((turned.0 - 1.2 * turned.1).abs() < 1e-6);
    assert!(!odometry.handle().health().heading_degraded);
}

#[test]
fn test_imu_outranks_drive_encoder_pair() {
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let drive_wheel = |name: &str, mounted: f64, configured: f64| {
        let encoder = robot.vertical_encoder(name, mounted, WHEEL_DIAMETER);
        TrackingWheel::drive(Box::new(encoder), WHEEL_DIAMETER, configured, 1.0).unwrap()
    };
    let sensors = OdomSensors::default()
        .vertical(drive_wheel("left", 6.0, 5.0))
        .vertical(drive_wheel("right", -6.0, -5.0))
        .imu(Box::new(robot.imu("imu")));
    let mut odometry = calibrated(sensors, Pose::origin());
    let p = power_for(10.0);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(500));
    assert!((odometry.handle().pose().theta - robot.pose().theta).abs() < 1e-6);

    // Without the IMU the drive pair is the fallback.
    robot.disconnect("imu");
    let before = (odometry.handle().pose().theta, robot.pose().theta);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(500));
    let turned = (odometry.handle().pose().theta - before.0, robot.pose().theta - before.1);
    // The pair over-reads by 20%.
    assert!((turned.0 - 1.2 * turned.1).abs() < 1e-6);
    assert!(!odometry.handle().health().imu);
}

#[test]
fn test_horizontal_pair_is_first_fallback() {
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let sensors = OdomSensors::default()
        .vertical(tracking(robot.vertical_encoder("left", 5.0, WHEEL_DIAMETER), 5.0))
        .vertical(tracking(robot.vertical_encoder("right", -5.0, WHEEL_DIAMETER), -5.0))
        .horizontal(tracking(robot.horizontal_encoder("front", 4.0, WHEEL_DIAMETER), 5.0))
        .horizontal(tracking(robot.horizontal_encoder("back", -4.0, WHEEL_DIAMETER), -5.0))
        .imu(Box::new(robot.imu("imu")));
    let mut odometry = calibrated(sensors, Pose::origin());
    let p = power_for(10.0);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(500));
    assert!((odometry.handle().pose().theta - robot.pose().theta).abs() < 1e-6);

    // The horizontal pair under-reads by 20%; the exact vertical pair is
    // only used once the horizontal pair is gone too.
    robot.disconnect("imu");
    let before = (odometry.handle().pose().theta, robot.pose().theta);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(500));
    let turned = (odometry.handle().pose().theta - before.0, robot.pose().theta - before.1);
    assert!((turned.0 - 0.8 * turned.1).abs() < 1e-6);

    robot.disconnect("front");
    let before = (odometry.handle().pose().theta, robot.pose().theta);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(500));
    let turned = (odometry.handle().pose().theta - before.0, robot.pose().theta - before.1);
    assert!((turned.0 - turned.1).abs() < 1e-6);
}

#[test]
fn test_imu_loss_degrades_heading() {
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let sensors = OdomSensors::default()
        .vertical(tracking(robot.vertical_encoder("left", 5.0, WHEEL_DIAMETER), 5.0))
        .imu(Box::new(robot.imu("imu")));
    let mut odometry = calibrated(sensors, Pose::origin());
    let p = power_for(10.0);
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(300));
    assert!((odometry.handle().pose().theta - robot.pose().theta).abs() < 1e-6);

    robot.disconnect("imu");
    let heading = odometry.handle().pose().theta;
    drive(&robot, &mut odometry, -p, p, Duration::from_millis(300));
    let state = odometry.handle().snapshot();
    assert!(state.health.heading_degraded);
    assert!(!state.health.imu);
    assert_eq!(state.pose.theta, heading);
}

#[test]
fn test_calibration_retries_then_gives_up() {
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    robot.fail_calibrations(CALIBRATION_ATTEMPTS - 1);
    let mut odometry = Odometry::new(full_sensors(&robot), OdomHandle::default()).unwrap();
    assert!(odometry.calibrate().is_ok());

    robot.fail_calibrations(CALIBRATION_ATTEMPTS);
    let err = odometry.calibrate().unwrap_err();
    assert!(matches!(err, OdometryError::Calibration { attempts } if attempts == CALIBRATION_ATTEMPTS));
}

#[test]
fn test_sensor_configuration_is_validated() {
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let handle = OdomHandle::default();

    let err = Odometry::new(OdomSensors::default().imu(Box::new(robot.imu("imu"))), handle.clone()).err();
    assert_eq!(err, Some(ConfigError::NoVerticalWheel));

    let lone = OdomSensors::default().vertical(tracking(robot.vertical_encoder("left", 5.0, WHEEL_DIAMETER), 5.0));
    assert_eq!(Odometry::new(lone, handle.clone()).err(), Some(ConfigError::NoHeadingSource));

    // A pair with coincident offsets carries no rotation information.
    let coincident = OdomSensors::default()
        .vertical(tracking(robot.vertical_encoder("a", 2.0, WHEEL_DIAMETER), 2.0))
        .vertical(tracking(robot.vertical_encoder("b", 2.0, WHEEL_DIAMETER), 2.0));
    assert_eq!(Odometry::new(coincident, handle).err(), Some(ConfigError::NoHeadingSource));
}
