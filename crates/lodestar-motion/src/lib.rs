//! Odometry and closed-loop motion control for differential-drive robots.
//!
//! An [`Odometry`] estimator folds tracking-wheel and heading-sensor deltas
//! into a shared [`OdomHandle`]. A [`Chassis`] reads that pose and runs one
//! motion primitive at a time, each a [`Pid`]-driven loop that ends when its
//! [`ExitCondition`] settles, its timeout fires or the match phase changes.
//! Whatever ends a motion, the drivetrain is left stopped.

pub mod bus;
mod chassis;
mod error;
mod exit;
pub mod motions;
mod odometry;
mod path;
mod pid;
mod settings;
mod state;

pub use chassis::{Chassis, MotionOutcome, TickOutput};
pub use error::{ConfigError, MotionError, OdometryError};
pub use exit::{ExitCondition, ExitSettings, ExitState};
pub use motions::{BoomerangParams, PointParams, PursuitParams, TurnParams};
pub use odometry::{CALIBRATION_ATTEMPTS, OdomSensors, Odometry, OdometryTask};
pub use path::Path;
pub use pid::{Pid, PidGains};
pub use settings::{ControllerSettings, MotionSettings};
pub use state::{OdomHandle, OdomState, SensorHealth};
