//! Device seams for the Lodestar motion stack.
//!
//! The controllers only ever see the traits in this crate. Real hardware
//! adapters implement them on the robot; [`sim`] implements them against a
//! simulated plant for tests and the desktop demo.

mod clock;
mod error;
pub mod sim;
mod tracking;
mod traits;

pub use clock::SystemClock;
pub use error::DeviceError;
pub use tracking::{TrackingWheel, WheelKind};
pub use traits::{Clock, Drivetrain, HeadingSensor, MatchPhase, PhaseToken, RotationSensor, Side};
