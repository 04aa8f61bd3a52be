use lodestar_devices::DeviceError;
use lodestar_kinematics::{KinematicsError, Pose};
use thiserror::Error;

/// Rejected configuration, reported when an object is built rather than
/// while a control loop is running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("small error band ({small}) must not be wider than the large error band ({large})")]
    ErrorBands { small: f64, large: f64 },

    #[error("{0} is out of range")]
    OutOfRange(&'static str),

    #[error("lookahead distance must be positive, got {0}")]
    Lookahead(f64),

    #[error("boomerang lead must be within [0, 1], got {0}")]
    Lead(f64),

    #[error("path has no waypoints")]
    EmptyPath,

    #[error("path has {waypoints} waypoints but {speeds} speeds")]
    PathSpeeds { waypoints: usize, speeds: usize },

    #[error("malformed path line {line}: {reason}")]
    PathLine { line: usize, reason: String },

    #[error("odometry needs at least one vertical tracking wheel")]
    NoVerticalWheel,

    #[error("odometry needs a heading source: a parallel wheel pair or a heading sensor")]
    NoHeadingSource,

    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}

#[derive(Debug, Error)]
pub enum OdometryError {
    #[error("every translation sensor is unavailable, pose frozen at {pose}")]
    SensorLoss { pose: Pose },

    #[error("heading sensor failed to calibrate after {attempts} attempts")]
    Calibration { attempts: u32 },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("invalid motion configuration: {0}")]
    Config(#[from] ConfigError),
}
