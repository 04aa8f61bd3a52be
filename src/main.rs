mod config; // loads `config/default.toml` into typed settings
mod routine; // the autonomous routine run against the simulated robot

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lodestar_devices::SystemClock;
use lodestar_devices::sim::SimRobot;
use lodestar_motion::bus::{TelemetryRecord, Topic};
use lodestar_motion::{Chassis, OdomHandle, Odometry};
use spin_sleep::SpinSleeper;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Lodestar simulation starting. Setting up Tokio runtime...");
    let settings = config::load_config()?;

    let tokio_rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    match tokio_rt.block_on(run(settings)) {
        Ok(()) => {
            info!("Simulation finished successfully.");
            Ok(())
        }
        Err(e) => {
            error!("Simulation failed: {:?}", e);
            Err(e)
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let start = settings.robot.start;
    let robot = SimRobot::new(settings.sim_config(), start)?;
    let running = Arc::new(AtomicBool::new(true));

    info!("Spawning plant thread...");
    let plant = std::thread::Builder::new().name("plant".into()).spawn({
        let robot = robot.clone();
        let running = Arc::clone(&running);
        let period = Duration::from_millis(settings.sim.period_ms);
        move || {
            info!("Plant thread started.");
            let sleeper = SpinSleeper::new(10_000);
            while running.load(Ordering::Relaxed) {
                robot.step(period);
                sleeper.sleep(period);
            }
            info!("Plant thread stopped.");
        }
    })?;

    info!("Calibrating odometry...");
    let odom = OdomHandle::new(start);
    let mut odometry = Odometry::new(settings.sensors(&robot)?, odom.clone())?;
    odometry.calibrate()?;
    let odometry_task = odometry.spawn(Duration::from_millis(settings.odometry.period_ms))?;

    let telemetry: Topic<TelemetryRecord> = Topic::new(256);
    let chassis = Chassis::new(
        Box::new(robot.drivetrain()),
        odom.clone(),
        Box::new(robot.match_phase()),
        Arc::new(SystemClock::new()),
        settings.motion,
    )?
    .with_telemetry(telemetry.clone());

    let drain = tokio::spawn(drain_telemetry(telemetry.subscribe()));
    let watchdog = tokio::spawn(watchdog(odom.clone()));
    let timer = tokio::spawn(match_timer(
        robot.clone(),
        Duration::from_millis(settings.match_timing.autonomous_ms),
    ));

    info!("Running autonomous routine...");
    let routine_settings = settings.routine.clone();
    let result = tokio::task::spawn_blocking(move || routine::run(chassis, &routine_settings)).await?;

    timer.abort();
    watchdog.abort();
    drain.abort();
    running.store(false, Ordering::Relaxed);
    if odometry_task.stop().is_none() {
        warn!("Odometry thread panicked");
    }
    if plant.join().is_err() {
        warn!("Plant thread panicked");
    }

    let state = odom.snapshot();
    info!(pose = %state.pose, truth = %robot.pose(), ticks = state.ticks, faults = ?state.faults, "Final odometry state");
    result
}

/// Logs controller samples published by motions that have logging enabled.
async fn drain_telemetry(mut rx: tokio::sync::broadcast::Receiver<Arc<TelemetryRecord>>) {
    info!("Telemetry task started.");
    loop {
        match rx.recv().await {
            Ok(r) => debug!(
                controller = r.controller,
                tick = r.tick,
                target = r.target,
                actual = r.actual,
                error = r.error,
                output = r.output,
                "telemetry"
            ),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Telemetry consumer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Raises a fault while the odometry reports that the pose is frozen.
async fn watchdog(odom: OdomHandle) {
    info!("Watchdog task started.");
    let mut tick = tokio::time::interval(Duration::from_millis(25));
    let mut frozen = false;
    loop {
        tick.tick().await;
        let health = odom.health();
        if health.pose_frozen && !frozen {
            warn!(?health, "Odometry lost every translation sensor!");
            odom.raise_fault("odometry sensor loss");
        } else if !health.pose_frozen && frozen {
            info!("Odometry translation sensors recovered.");
        }
        frozen = health.pose_frozen;
    }
}

/// Ends the autonomous period after `length`, which cancels the running motion.
async fn match_timer(robot: SimRobot, length: Duration) {
    tokio::time::sleep(length).await;
    warn!(?length, "Autonomous period over, advancing match phase.");
    robot.set_phase(1);
}
