//! Pure-pursuit path following.
//!
//! Every tick the follower picks a point one lookahead distance ahead along
//! the path and drives the arc that passes through it tangent to the current
//! heading. Both the closest waypoint and the lookahead progress only move
//! forward, so a path that crosses itself cannot pull the robot back to an
//! earlier segment.

use std::f64::consts::PI;
use std::time::Duration;

use lodestar_kinematics::{DifferentialDrive, Pose};
use tracing::{debug, info_span, trace};

use super::PursuitParams;
use crate::chassis::{Chassis, MotionOutcome, TickOutput};
use crate::error::MotionError;
use crate::exit::{ExitCondition, ExitState};
use crate::path::Path;

/// Lowest commanded speed while the end of the path is still out of reach.
/// A waypoint speed of zero would otherwise park the robot short of the end.
pub const MIN_APPROACH_SPEED: f64 = 20.0;

/// Result of one lookahead search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PursuitStep {
    /// Index of the closest waypoint at or after the previous closest.
    pub closest: usize,
    pub lookahead: Pose,
    /// Fractional segment index of the lookahead point: segment `i` at
    /// parameter `t` is `i + t`.
    pub progress: f64,
    /// Signed curvature (1/in) of the arc to the lookahead point, positive
    /// turning left.
    pub curvature: f64,
}

/// Forward-only lookahead search state.
#[derive(Debug, Clone, PartialEq)]
pub struct PursuitTracker {
    closest: usize,
    progress: f64,
    lookahead_point: Pose,
}

impl PursuitTracker {
    pub fn new(path: &Path) -> Self {
        PursuitTracker {
            closest: 0,
            progress: 0.0,
            lookahead_point: path.waypoints()[0],
        }
    }

    pub fn closest(&self) -> usize {
        self.closest
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Advances the search for a robot at `pose`.
    ///
    /// When no segment crosses the lookahead circle the previous lookahead
    /// point is kept, unless the end of the path is within reach, in which
    /// case the final waypoint becomes the lookahead point.
    pub fn update(&mut self, path: &Path, pose: Pose) -> PursuitStep {
        let waypoints = path.waypoints();
        let lookahead = path.lookahead();

        self.closest = closest_from(waypoints, self.closest, pose);

        // The segment ending at the closest waypoint is still ahead of the robot.
        let start = self.closest.saturating_sub(1).max(self.progress as usize);
        let found = (start..waypoints.len().saturating_sub(1)).find_map(|i| {
            circle_intersect(waypoints[i], waypoints[i + 1], pose, lookahead)
                .map(|t| (i as f64 + t, waypoints[i].lerp(&waypoints[i + 1], t)))
                .filter(|(progress, _)| *progress >= self.progress)
        });

        match found {
            Some((progress, point)) => {
                self.progress = progress;
                self.lookahead_point = point;
            }
            None if pose.distance(&path.last()) <= lookahead => {
                self.progress = (waypoints.len() - 1) as f64;
                self.lookahead_point = path.last();
            }
            None => {}
        }

        PursuitStep {
            closest: self.closest,
            lookahead: self.lookahead_point,
            progress: self.progress,
            curvature: curvature_to(pose, self.lookahead_point),
        }
    }
}

/// Index of the waypoint nearest `pose`, never earlier than `from`.
fn closest_from(waypoints: &[Pose], from: usize, pose: Pose) -> usize {
    let mut best = from;
    let mut best_distance = f64::INFINITY;
    for (i, point) in waypoints.iter().enumerate().skip(from) {
        let distance = pose.distance(point);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Where segment `a -> b` leaves the circle of `radius` around `center`, as a
/// parameter in `[0, 1]`. The exit point (larger root) is preferred.
fn circle_intersect(a: Pose, b: Pose, center: Pose, radius: f64) -> Option<f64> {
    let d = b - a;
    let f = a - center;
    let qa = d.dot(&d);
    if qa == 0.0 {
        return None;
    }
    let qb = 2.0 * f.dot(&d);
    let qc = f.dot(&f) - radius * radius;
    let discriminant = qb * qb - 4.0 * qa * qc;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let t1 = (-qb - root) / (2.0 * qa);
    let t2 = (-qb + root) / (2.0 * qa);
    [t2, t1].into_iter().find(|t| (0.0..=1.0).contains(t))
}

/// Curvature of the arc from `pose`, tangent to its heading, through `point`.
fn curvature_to(pose: Pose, point: Pose) -> f64 {
    let dx = point.x - pose.x;
    let dy = point.y - pose.y;
    let chord_squared = dx * dx + dy * dy;
    if chord_squared == 0.0 {
        return 0.0;
    }
    // Lateral offset of the point in the robot frame, positive to the left.
    let lateral = -pose.theta.sin() * dx + pose.theta.cos() * dy;
    2.0 * lateral / chord_squared
}

/// Follows a [`Path`] with pure pursuit.
#[derive(Debug, Clone)]
pub struct PursuitController {
    path: Path,
    tracker: PursuitTracker,
    drive: DifferentialDrive,
    forwards: bool,
    max_speed: f64,
    end_tolerance: f64,
    log: bool,
    exit: ExitCondition,
}

impl PursuitController {
    pub fn new(path: Path, drive: DifferentialDrive, params: PursuitParams, timeout: Duration) -> Self {
        let tracker = PursuitTracker::new(&path);
        PursuitController {
            path,
            tracker,
            drive,
            forwards: params.forwards,
            max_speed: params.max_speed,
            end_tolerance: params.end_tolerance,
            log: params.log,
            exit: ExitCondition::timeout_only(timeout),
        }
    }

    pub fn tracker(&self) -> &PursuitTracker {
        &self.tracker
    }

    fn finished(&self, pose: Pose) -> bool {
        self.tracker.progress >= (self.path.len() - 1) as f64
            && pose.distance(&self.path.last()) <= self.end_tolerance
    }

    pub fn step(&mut self, pose: Pose, elapsed: Duration) -> TickOutput {
        // Reversing steers the back of the robot along the path.
        let steer = if self.forwards { pose } else { pose.with_theta(pose.theta + PI) };
        let step = self.tracker.update(&self.path, steer);

        let state = if self.finished(pose) {
            ExitState::Settled
        } else {
            self.exit.update(pose.distance(&self.path.last()), elapsed)
        };

        let speed = self
            .path
            .speed_at(step.closest)
            .unwrap_or(self.max_speed)
            .min(self.max_speed)
            .max(MIN_APPROACH_SPEED.min(self.max_speed));
        let wheels = self.drive.curvature_speeds(speed, step.curvature).desaturate(self.max_speed);
        let (left, right) = if self.forwards {
            (wheels.left, wheels.right)
        } else {
            (-wheels.right, -wheels.left)
        };

        if self.log {
            trace!(
                closest = step.closest,
                progress = step.progress,
                lookahead = %step.lookahead,
                curvature = step.curvature,
                speed,
                "Pursuit tick"
            );
        }
        TickOutput { left, right, state }
    }
}

impl Chassis {
    /// Follows `path` until its end is reached or `timeout` elapses.
    pub fn follow(&mut self, path: &Path, timeout: Duration, params: PursuitParams) -> Result<MotionOutcome, MotionError> {
        let _span = info_span!("follow", %path, forwards = params.forwards).entered();
        let params = PursuitParams {
            max_speed: self.speed_cap(params.max_speed)?,
            ..params
        };
        let mut controller = PursuitController::new(path.clone(), self.kinematics(), params, timeout);
        let outcome = self.run_motion("follow", |pose, elapsed| controller.step(pose, elapsed));
        debug!(
            closest = controller.tracker().closest(),
            progress = controller.tracker().progress(),
            "Pursuit ended"
        );
        Ok(outcome)
    }
}
