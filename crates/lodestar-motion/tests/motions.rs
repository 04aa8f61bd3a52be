mod common;

use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;
use std::time::Duration;

use common::Rig;
use lodestar_devices::sim::{LockstepClock, SimConfig, SimRobot};
use lodestar_devices::{Clock, Drivetrain, Side};
use lodestar_kinematics::{Pose, angle_error};
use lodestar_motion::motions::PursuitController;
use lodestar_motion::{
    BoomerangParams, Chassis, ConfigError, ExitState, MotionError, MotionOutcome, MotionSettings, OdomHandle, Path,
    PointParams, PursuitParams, TurnParams,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_turn_to_heading_settles_and_stops() {
    let mut rig = Rig::new(Pose::origin());
    let outcome = rig.chassis.turn_to_heading(FRAC_PI_2, TIMEOUT, TurnParams::default()).unwrap();
    assert_eq!(outcome, MotionOutcome::Settled);
    assert!(angle_error(FRAC_PI_2, rig.robot.pose().theta).abs() < 2f64.to_radians());
    assert!(angle_error(FRAC_PI_2, rig.chassis.pose().theta).abs() < 2f64.to_radians());
    // Turning in place barely moves the tracking center.
    assert!(rig.robot.pose().distance(&Pose::origin()) < 0.1);
    assert!(rig.stopped());
}

#[test]
fn test_turn_to_point_faces_point() {
    let mut rig = Rig::new(Pose::origin());
    let outcome = rig.chassis.turn_to_point(-10.0, -10.0, TIMEOUT, TurnParams::default()).unwrap();
    assert_eq!(outcome, MotionOutcome::Settled);
    let expected = -3.0 * PI / 4.0;
    assert!(angle_error(expected, rig.robot.pose().theta).abs() < 2f64.to_radians());
    assert!(rig.stopped());
}

#[test]
fn test_swing_keeps_locked_side_still() {
    let mut rig = Rig::new(Pose::origin());
    rig.robot.record_commands();
    let outcome = rig
        .chassis
        .swing_to_heading(FRAC_PI_2, Side::Left, TIMEOUT, TurnParams::default())
        .unwrap();
    assert_eq!(outcome, MotionOutcome::Settled);
    assert!(
        rig.robot
            .commands()
            .iter()
            .filter(|c| c.side == Side::Left)
            .all(|c| c.power == 0.0)
    );
    // Pivoting about the left wheel carries the center on a 6" arc.
    let pose = rig.robot.pose();
    assert!((pose.x - 6.0).abs() < 0.5);
    assert!((pose.y - 6.0).abs() < 0.5);
    assert!(rig.stopped());
}

#[test]
fn test_move_to_point_arrives() {
    let mut rig = Rig::new(Pose::origin());
    let outcome = rig.chassis.move_to_point(24.0, 12.0, TIMEOUT, PointParams::default()).unwrap();
    assert_eq!(outcome, MotionOutcome::Settled);
    assert!(rig.robot.pose().distance(&Pose::new(24.0, 12.0, 0.0)) < 3.0);
    assert!(rig.stopped());
}

#[test]
fn test_move_to_point_backwards() {
    let mut rig = Rig::new(Pose::origin());
    let params = PointParams {
        forwards: false,
        ..PointParams::default()
    };
    let outcome = rig.chassis.move_to_point(-24.0, 0.0, TIMEOUT, params).unwrap();
    assert_eq!(outcome, MotionOutcome::Settled);
    let pose = rig.robot.pose();
    assert!((pose.x + 24.0).abs() < 1.5);
    // It reversed rather than turning around.
    assert!(angle_error(0.0, pose.theta).abs() < 10f64.to_radians());
}

#[test]
fn test_move_to_pose_arrives_at_heading() {
    let mut rig = Rig::new(Pose::origin());
    let outcome = rig
        .chassis
        .move_to_pose(24.0, 24.0, FRAC_PI_2, TIMEOUT, BoomerangParams::default())
        .unwrap();
    assert_ne!(outcome, MotionOutcome::Cancelled);
    let pose = rig.robot.pose();
    assert!(pose.distance(&Pose::new(24.0, 24.0, 0.0)) < 4.0);
    assert!(angle_error(FRAC_PI_2, pose.theta).abs() < 20f64.to_radians());
    assert!(rig.stopped());
}

#[test]
fn test_move_to_pose_times_out() {
    let mut rig = Rig::new(Pose::origin());
    let outcome = rig
        .chassis
        .move_to_pose(200.0, 0.0, 0.0, Duration::from_millis(500), BoomerangParams::default())
        .unwrap();
    assert_eq!(outcome, MotionOutcome::TimedOut);
    let elapsed = rig.robot.elapsed();
    assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(600));
    assert!(rig.stopped());
}

#[test]
fn test_follow_reaches_end_of_path() {
    let mut rig = Rig::new(Pose::origin());
    let path = Path::parse(include_str!("data/s_curve.txt"), 10.0).unwrap();
    let outcome = rig.chassis.follow(&path, Duration::from_secs(10), PursuitParams::default()).unwrap();
    assert_eq!(outcome, MotionOutcome::Settled);
    assert!(rig.robot.pose().distance(&path.last()) <= 3.0);
    assert!(rig.stopped());
}

#[test]
fn test_follow_with_zero_final_speed_settles() {
    let mut rig = Rig::new(Pose::origin());
    let waypoints = (0..=10).map(|i| Pose::new(i as f64 * 6.0, 0.0, 0.0)).collect();
    let mut speeds = vec![80.0; 10];
    speeds.push(0.0);
    let path = Path::new(waypoints, 10.0).unwrap().with_speeds(speeds).unwrap();
    let outcome = rig.chassis.follow(&path, Duration::from_secs(10), PursuitParams::default()).unwrap();
    assert_eq!(outcome, MotionOutcome::Settled);
    assert!(rig.robot.pose().distance(&path.last()) <= 3.0);
    assert!(rig.clock.now() < Duration::from_secs(10));
    assert!(rig.stopped());
}

#[test]
fn test_pursuit_progress_is_monotonic() {
    let rig = Rig::new(Pose::origin());
    let path = Path::parse(include_str!("data/s_curve.txt"), 10.0).unwrap();
    let mut pursuit = PursuitController::new(
        path.clone(),
        rig.chassis.kinematics(),
        PursuitParams::default(),
        Duration::from_secs(10),
    );
    let mut drivetrain = rig.robot.drivetrain();

    let (mut closest, mut progress) = (0, 0.0);
    let mut state = ExitState::Running;
    while state == ExitState::Running {
        let out = pursuit.step(rig.chassis.pose(), rig.clock.now());
        state = out.state;
        assert!(pursuit.tracker().closest() >= closest);
        assert!(pursuit.tracker().progress() >= progress);
        closest = pursuit.tracker().closest();
        progress = pursuit.tracker().progress();
        drivetrain.set_powers(out.left, out.right).unwrap();
        rig.clock.sleep(common::TICK);
    }
    assert_eq!(state, ExitState::Settled);
    assert!(closest >= path.len() - 2);
    assert_eq!(progress, (path.len() - 1) as f64);
}

#[test]
fn test_phase_change_cancels_every_motion() {
    type Motion = fn(&mut Rig) -> Result<MotionOutcome, MotionError>;
    let motions: [(&str, Motion); 7] = [
        ("turn_to_heading", |r| r.chassis.turn_to_heading(PI, TIMEOUT, TurnParams::default())),
        ("turn_to_point", |r| r.chassis.turn_to_point(0.0, 30.0, TIMEOUT, TurnParams::default())),
        ("swing_to_heading", |r| {
            r.chassis.swing_to_heading(PI, Side::Right, TIMEOUT, TurnParams::default())
        }),
        ("swing_to_point", |r| {
            r.chassis.swing_to_point(0.0, -30.0, Side::Left, TIMEOUT, TurnParams::default())
        }),
        ("move_to_point", |r| r.chassis.move_to_point(60.0, 0.0, TIMEOUT, PointParams::default())),
        ("move_to_pose", |r| {
            r.chassis.move_to_pose(60.0, 30.0, FRAC_PI_2, TIMEOUT, BoomerangParams::default())
        }),
        ("follow", |r| {
            let path = Path::new(vec![Pose::origin(), Pose::new(100.0, 0.0, 0.0)], 10.0).unwrap();
            r.chassis.follow(&path, TIMEOUT, PursuitParams::default())
        }),
    ];

    for (name, motion) in motions {
        let mut rig = Rig::new(Pose::origin());
        rig.change_phase_at(Duration::from_millis(100));
        let outcome = motion(&mut rig).unwrap();
        assert_eq!(outcome, MotionOutcome::Cancelled, "{name}");
        assert!(rig.stopped(), "{name} left the drivetrain running");
        // Cancellation is noticed on the next tick.
        assert!(rig.robot.elapsed() <= Duration::from_millis(120), "{name}");
    }
}

#[test]
fn test_invalid_arguments_are_rejected_before_driving() {
    let mut rig = Rig::new(Pose::origin());
    rig.robot.record_commands();

    let params = TurnParams {
        max_speed: 0.0,
        ..TurnParams::default()
    };
    let err = rig.chassis.turn_to_heading(PI, TIMEOUT, params).unwrap_err();
    assert!(matches!(err, MotionError::Config(ConfigError::OutOfRange("max_speed"))));

    let params = BoomerangParams {
        lead: -0.1,
        ..BoomerangParams::default()
    };
    let err = rig.chassis.move_to_pose(10.0, 10.0, 0.0, TIMEOUT, params).unwrap_err();
    assert!(matches!(err, MotionError::Config(ConfigError::Lead(_))));

    assert!(rig.robot.commands().is_empty());
    assert_eq!(rig.robot.elapsed(), Duration::ZERO);
}

#[test]
fn test_chassis_rejects_bad_settings() {
    let robot = SimRobot::new(SimConfig::default(), Pose::origin()).unwrap();
    let mut settings = MotionSettings::default();
    settings.lateral.exit.small_error = 5.0;
    let result = Chassis::new(
        Box::new(robot.drivetrain()),
        OdomHandle::default(),
        Box::new(robot.match_phase()),
        Arc::new(LockstepClock::new(robot.clone(), common::TICK)),
        settings,
    );
    assert!(matches!(result, Err(ConfigError::ErrorBands { small, large }) if small == 5.0 && large == 3.0));

    let settings = MotionSettings {
        tick_ms: 0,
        ..MotionSettings::default()
    };
    let result = Chassis::new(
        Box::new(robot.drivetrain()),
        OdomHandle::default(),
        Box::new(robot.match_phase()),
        Arc::new(LockstepClock::new(robot.clone(), common::TICK)),
        settings,
    );
    assert!(matches!(result, Err(ConfigError::OutOfRange("tick_ms"))));
}
