use parking_lot::RwLock;
use std::sync::Arc;

use lodestar_kinematics::{LocalDelta, Pose, integrate};

/// Per-sensor connectivity as seen by the last odometry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorHealth {
    /// Vertical wheels 1 and 2; `true` when configured and reading.
    pub vertical: [bool; 2],
    /// Horizontal wheels 1 and 2.
    pub horizontal: [bool; 2],
    pub imu: bool,
    /// No heading source was usable, so the last update assumed no rotation.
    pub heading_degraded: bool,
    /// No translation source was usable; the pose is not being updated.
    pub pose_frozen: bool,
}

/// Everything the odometry estimator publishes.
#[derive(Debug, Clone, Default)]
pub struct OdomState {
    pub pose: Pose,
    /// World-frame velocity (in/s, rad/s).
    pub speed: Pose,
    /// Robot-frame velocity (in/s, rad/s).
    pub local_speed: LocalDelta,
    pub health: SensorHealth,
    pub faults: Vec<String>,
    /// Number of completed estimator updates.
    pub ticks: u64,
}

/// Shared handle to the odometry state.
///
/// The estimator is the only writer; motion loops and diagnostics read
/// consistent snapshots through it.
#[derive(Debug, Clone, Default)]
pub struct OdomHandle(Arc<RwLock<OdomState>>);

impl OdomHandle {
    pub fn new(pose: Pose) -> Self {
        OdomHandle(Arc::new(RwLock::new(OdomState {
            pose,
            ..OdomState::default()
        })))
    }

    pub fn snapshot(&self) -> OdomState {
        (*self.0.read()).clone()
    }

    pub fn pose(&self) -> Pose {
        self.0.read().pose
    }

    /// Overwrites the estimate, e.g. to place the robot at its start tile.
    pub fn set_pose(&self, pose: Pose) {
        self.0.write().pose = pose;
    }

    pub fn speed(&self) -> Pose {
        self.0.read().speed
    }

    pub fn local_speed(&self) -> LocalDelta {
        self.0.read().local_speed
    }

    /// Where the robot will be after `seconds` if it keeps its current local
    /// velocity.
    pub fn estimate_pose(&self, seconds: f64) -> Pose {
        let state = self.0.read();
        integrate(state.pose, state.local_speed.scale(seconds))
    }

    pub fn health(&self) -> SensorHealth {
        self.0.read().health
    }

    pub fn raise_fault(&self, msg: &str) {
        let mut g = self.0.write();
        if !g.faults.iter().any(|s| s == msg) {
            g.faults.push(msg.to_string());
        }
    }

    pub fn faults(&self) -> Vec<String> {
        self.0.read().faults.clone()
    }

    /// Acquires the write lock and modifies the state via a closure.
    pub fn update<R>(&self, updater: impl FnOnce(&mut OdomState) -> R) -> R {
        updater(&mut self.0.write())
    }
}
