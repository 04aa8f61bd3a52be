#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for planar pose math on differential-drive robots."]
#![doc = ""]
#![doc = "This crate provides the pose type, wraparound-aware angle helpers, arc-based"]
#![doc = "odometry integration and differential-drive kinematics."]

pub mod angle;
pub mod drive;
pub mod error;
pub mod odometry;
pub mod pose;

pub use angle::{AngularDirection, angle_error, angle_error_in, ema, lerp, sgn, slew};
pub use drive::{ChassisSpeeds, DifferentialDrive, WheelSpeeds};
pub use error::KinematicsError;
pub use odometry::{LocalDelta, arc_chord, heading_from_pair, integrate, local_chords};
pub use pose::Pose;
