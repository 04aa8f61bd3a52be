use tracing::debug;

use crate::{DeviceError, RotationSensor};

/// What kind of hardware a [`TrackingWheel`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelKind {
    /// A dedicated, free-spinning encoder wheel.
    Tracking,
    /// A powered drive wheel's motor encoder. It slips under load, so
    /// odometry only falls back to it when no dedicated wheel is usable.
    Drive,
}

/// A wheel whose rotation is converted to ground distance.
///
/// `offset` follows the odometry convention: for a forward-reading wheel it is
/// positive to the left of the tracking center, for a sideways-reading wheel it
/// is positive in front of it.
pub struct TrackingWheel {
    sensor: Box<dyn RotationSensor>,
    diameter: f64,
    offset: f64,
    gear_ratio: f64,
    kind: WheelKind,
}

impl TrackingWheel {
    /// Creates a dedicated tracking wheel.
    ///
    /// # Arguments
    /// * `sensor` - Encoder measuring the wheel's rotation
    /// * `diameter` - Wheel diameter (in)
    /// * `offset` - Offset from the tracking center (in)
    /// * `gear_ratio` - Sensor rotations per wheel rotation
    pub fn new(
        sensor: Box<dyn RotationSensor>,
        diameter: f64,
        offset: f64,
        gear_ratio: f64,
    ) -> Result<Self, DeviceError> {
        Self::with_kind(sensor, diameter, offset, gear_ratio, WheelKind::Tracking)
    }

    /// Creates a wheel backed by a drive motor encoder.
    pub fn drive(
        sensor: Box<dyn RotationSensor>,
        diameter: f64,
        offset: f64,
        gear_ratio: f64,
    ) -> Result<Self, DeviceError> {
        Self::with_kind(sensor, diameter, offset, gear_ratio, WheelKind::Drive)
    }

    fn with_kind(
        sensor: Box<dyn RotationSensor>,
        diameter: f64,
        offset: f64,
        gear_ratio: f64,
        kind: WheelKind,
    ) -> Result<Self, DeviceError> {
        if !(diameter > 0.0 && diameter.is_finite()) {
            return Err(DeviceError::InvalidGeometry("diameter must be positive"));
        }
        if gear_ratio == 0.0 || !gear_ratio.is_finite() {
            return Err(DeviceError::InvalidGeometry("gear ratio must be non-zero"));
        }
        if !offset.is_finite() {
            return Err(DeviceError::InvalidGeometry("offset must be finite"));
        }
        Ok(TrackingWheel {
            sensor,
            diameter,
            offset,
            gear_ratio,
            kind,
        })
    }

    /// Distance rolled since the last reset (in).
    pub fn distance(&self) -> Result<f64, DeviceError> {
        let radians = self.sensor.position()?;
        Ok(radians * (self.diameter / 2.0) / self.gear_ratio)
    }

    pub fn reset(&mut self) -> Result<(), DeviceError> {
        debug!(offset = self.offset, kind = ?self.kind, "Resetting tracking wheel");
        self.sensor.reset_position()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn kind(&self) -> WheelKind {
        self.kind
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }
}

impl std::fmt::Debug for TrackingWheel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingWheel")
            .field("diameter", &self.diameter)
            .field("offset", &self.offset)
            .field("gear_ratio", &self.gear_ratio)
            .field("kind", &self.kind)
            .finish()
    }
}
