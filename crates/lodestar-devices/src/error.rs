use thiserror::Error;

/// Failures reported by device adapters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("device `{0}` is disconnected")]
    Disconnected(String),

    #[error("device `{device}` returned an out-of-range reading: {value}")]
    OutOfRange { device: String, value: f64 },

    #[error("device `{0}` failed to calibrate")]
    CalibrationFailed(String),

    #[error("invalid tracking wheel geometry: {0}")]
    InvalidGeometry(&'static str),
}
