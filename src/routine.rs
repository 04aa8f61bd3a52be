use std::f64::consts::{FRAC_PI_2, PI};
use std::time::Duration;

use anyhow::Context;
use lodestar_devices::Side;
use lodestar_motion::{
    BoomerangParams, Chassis, MotionError, MotionOutcome, Path, PointParams, PursuitParams, TurnParams,
};
use tracing::{info, warn};

use crate::config::RoutineSettings;

/// Runs the demo autonomous routine to completion or until the match phase
/// changes. Motion errors abort the routine.
pub fn run(mut chassis: Chassis, settings: &RoutineSettings) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&settings.path).with_context(|| format!("reading path {}", settings.path))?;
    let path = Path::parse(&text, settings.lookahead)?;
    info!(%path, "Loaded path");

    let timeout = Duration::from_millis(settings.timeout_ms);
    let log = settings.log;
    let steps: [(&str, Step); 6] = [
        ("drive out", |c, t, log| c.move_to_point(24.0, 0.0, t, PointParams { log, ..PointParams::default() })),
        ("face goal", |c, t, log| c.turn_to_heading(FRAC_PI_2, t, TurnParams { log, ..TurnParams::default() })),
        ("swing around", |c, t, log| {
            c.swing_to_heading(PI, Side::Left, t, TurnParams { log, ..TurnParams::default() })
        }),
        ("curve to pose", |c, t, log| {
            c.move_to_pose(-12.0, 36.0, FRAC_PI_2, t, BoomerangParams { log, ..BoomerangParams::default() })
        }),
        ("back to start", |c, t, log| {
            let params = PointParams {
                forwards: false,
                log,
                ..PointParams::default()
            };
            c.move_to_point(-12.0, 12.0, t, params)
        }),
        ("face origin", |c, t, log| c.turn_to_point(0.0, 0.0, t, TurnParams { log, ..TurnParams::default() })),
    ];

    for (name, step) in steps {
        let outcome = step(&mut chassis, timeout, log)?;
        if !report(name, &chassis, outcome) {
            return Ok(());
        }
    }

    let outcome = chassis.follow(
        &path,
        timeout * 4,
        PursuitParams {
            log,
            ..PursuitParams::default()
        },
    )?;
    report("follow path", &chassis, outcome);
    Ok(())
}

type Step = fn(&mut Chassis, Duration, bool) -> Result<MotionOutcome, MotionError>;

/// Logs a motion outcome; returns whether the routine should continue.
fn report(name: &str, chassis: &Chassis, outcome: MotionOutcome) -> bool {
    let pose = chassis.pose();
    match outcome {
        MotionOutcome::Settled => {
            info!(step = name, %pose, "Step settled");
            true
        }
        MotionOutcome::TimedOut => {
            warn!(step = name, %pose, "Step timed out, continuing");
            true
        }
        MotionOutcome::Cancelled => {
            warn!(step = name, %pose, "Match phase changed, ending routine");
            false
        }
    }
}
