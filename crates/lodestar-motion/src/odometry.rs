//! The odometry estimator.
//!
//! [`Odometry`] owns the tracking sensors and folds their deltas into the
//! shared [`OdomHandle`]. Heading comes from the heading sensor while it
//! answers. Without it the estimator derives rotation from a parallel wheel
//! pair, preferring the two horizontal wheels over the two vertical ones.
//!
//! Translation comes from a vertical wheel, dedicated wheels first. A sensor
//! that fails to read is left out for that update and re-baselined once it
//! answers again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use lodestar_devices::{HeadingSensor, TrackingWheel, WheelKind};
use lodestar_kinematics::{LocalDelta, Pose, ema, heading_from_pair, integrate, local_chords};
use spin_sleep::SpinSleeper;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, OdometryError};
use crate::state::{OdomHandle, SensorHealth};

/// Weight of the newest sample in the velocity filters.
const SPEED_SMOOTHING: f64 = 0.95;

/// How many times [`Odometry::calibrate`] retries the heading sensor.
pub const CALIBRATION_ATTEMPTS: u32 = 5;

/// Sensors available to the estimator.
#[derive(Default)]
pub struct OdomSensors {
    pub vertical1: Option<TrackingWheel>,
    pub vertical2: Option<TrackingWheel>,
    pub horizontal1: Option<TrackingWheel>,
    pub horizontal2: Option<TrackingWheel>,
    pub imu: Option<Box<dyn HeadingSensor>>,
}

impl OdomSensors {
    /// Adds a forward-reading wheel in the first free vertical slot.
    pub fn vertical(mut self, wheel: TrackingWheel) -> Self {
        if self.vertical1.is_none() {
            self.vertical1 = Some(wheel);
        } else {
            self.vertical2 = Some(wheel);
        }
        self
    }

    /// Adds a sideways-reading wheel in the first free horizontal slot.
    pub fn horizontal(mut self, wheel: TrackingWheel) -> Self {
        if self.horizontal1.is_none() {
            self.horizontal1 = Some(wheel);
        } else {
            self.horizontal2 = Some(wheel);
        }
        self
    }

    pub fn imu(mut self, imu: Box<dyn HeadingSensor>) -> Self {
        self.imu = Some(imu);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.vertical1.is_none() && self.vertical2.is_none() {
            return Err(ConfigError::NoVerticalWheel);
        }
        let pair = |a: &Option<TrackingWheel>, b: &Option<TrackingWheel>| match (a, b) {
            (Some(a), Some(b)) => (a.offset() - b.offset()).abs() > f64::EPSILON,
            _ => false,
        };
        if self.imu.is_none()
            && !pair(&self.vertical1, &self.vertical2)
            && !pair(&self.horizontal1, &self.horizontal2)
        {
            return Err(ConfigError::NoHeadingSource);
        }
        Ok(())
    }
}

/// Raw readings from one update; `None` marks a sensor that is missing or
/// failed to read.
#[derive(Debug, Clone, Copy, Default)]
struct Readings {
    vertical: [Option<f64>; 2],
    horizontal: [Option<f64>; 2],
    imu: Option<f64>,
}

fn delta(prev: Option<f64>, current: Option<f64>) -> Option<f64> {
    prev.zip(current).map(|(p, c)| c - p)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Pose estimator fed by tracking wheels and an optional heading sensor.
pub struct Odometry {
    sensors: OdomSensors,
    state: OdomHandle,
    prev: Readings,
    baselined: bool,
}

impl Odometry {
    pub fn new(sensors: OdomSensors, state: OdomHandle) -> Result<Self, ConfigError> {
        sensors.validate()?;
        Ok(Odometry {
            sensors,
            state,
            prev: Readings::default(),
            baselined: false,
        })
    }

    pub fn handle(&self) -> &OdomHandle {
        &self.state
    }

    /// Zeroes the tracking wheels, calibrates the heading sensor and takes a
    /// fresh baseline.
    ///
    /// Wheel reset failures are logged and skipped. A heading sensor that does
    /// not calibrate within [`CALIBRATION_ATTEMPTS`] attempts is an error.
    pub fn calibrate(&mut self) -> Result<(), OdometryError> {
        let wheels = [
            &mut self.sensors.vertical1,
            &mut self.sensors.vertical2,
            &mut self.sensors.horizontal1,
            &mut self.sensors.horizontal2,
        ];
        for wheel in wheels.into_iter().flatten() {
            if let Err(e) = wheel.reset() {
                warn!(error = %e, "Tracking wheel reset failed");
            }
        }

        if let Some(imu) = self.sensors.imu.as_mut() {
            let mut calibrated = false;
            for attempt in 1..=CALIBRATION_ATTEMPTS {
                match imu.calibrate() {
                    Ok(()) if !imu.is_calibrating() => {
                        calibrated = true;
                        break;
                    }
                    Ok(()) => warn!(attempt, "Heading sensor still calibrating"),
                    Err(e) => warn!(attempt, error = %e, "Heading sensor calibration failed"),
                }
            }
            if !calibrated {
                error!(attempts = CALIBRATION_ATTEMPTS, "Giving up on heading sensor calibration");
                return Err(OdometryError::Calibration {
                    attempts: CALIBRATION_ATTEMPTS,
                });
            }
        }

        self.prev = self.read();
        self.baselined = true;
        info!(pose = %self.state.pose(), "Odometry calibrated");
        Ok(())
    }

    fn read(&self) -> Readings {
        let wheel = |w: &Option<TrackingWheel>| w.as_ref().and_then(|w| w.distance().ok()).and_then(finite);
        let imu = self
            .sensors
            .imu
            .as_ref()
            .filter(|imu| imu.is_connected())
            .and_then(|imu| imu.rotation().ok())
            .and_then(finite);
        Readings {
            vertical: [wheel(&self.sensors.vertical1), wheel(&self.sensors.vertical2)],
            horizontal: [wheel(&self.sensors.horizontal1), wheel(&self.sensors.horizontal2)],
            imu,
        }
    }

    fn offsets(wheels: [&Option<TrackingWheel>; 2]) -> [f64; 2] {
        wheels.map(|w| w.as_ref().map_or(0.0, TrackingWheel::offset))
    }

    fn is_tracking(wheel: &Option<TrackingWheel>) -> bool {
        wheel.as_ref().is_some_and(|w| w.kind() == WheelKind::Tracking)
    }

    /// Heading change for this update, or `None` if no source is usable.
    fn delta_theta(&self, dv: [Option<f64>; 2], dh: [Option<f64>; 2], dimu: Option<f64>) -> Option<f64> {
        let s = &self.sensors;
        let pair = |d: [Option<f64>; 2], o: [f64; 2]| match d {
            [Some(a), Some(b)] => heading_from_pair(a, o[0], b, o[1]),
            _ => None,
        };
        dimu.or_else(|| pair(dh, Self::offsets([&s.horizontal1, &s.horizontal2])))
            .or_else(|| pair(dv, Self::offsets([&s.vertical1, &s.vertical2])))
    }

    /// Index of the vertical wheel to take translation from.
    fn translation_wheel(&self, dv: [Option<f64>; 2]) -> Option<usize> {
        let wheels = [&self.sensors.vertical1, &self.sensors.vertical2];
        (0..2)
            .find(|&i| dv[i].is_some() && Self::is_tracking(wheels[i]))
            .or_else(|| (0..2).find(|&i| dv[i].is_some()))
    }

    /// Folds one round of sensor readings into the shared state.
    ///
    /// `period` is the time since the previous update and only feeds the
    /// velocity estimate. The first call after construction just records a
    /// baseline.
    ///
    /// # Errors
    ///
    /// Returns [`OdometryError::SensorLoss`] when no vertical wheel could be
    /// read. The pose is left unchanged and `health.pose_frozen` is set.
    pub fn update(&mut self, period: Duration) -> Result<Pose, OdometryError> {
        let current = self.read();
        if !self.baselined {
            self.prev = current;
            self.baselined = true;
            return Ok(self.state.pose());
        }

        let prev = std::mem::replace(&mut self.prev, current);
        let dv = [delta(prev.vertical[0], current.vertical[0]), delta(prev.vertical[1], current.vertical[1])];
        let dh = [
            delta(prev.horizontal[0], current.horizontal[0]),
            delta(prev.horizontal[1], current.horizontal[1]),
        ];
        let dimu = delta(prev.imu, current.imu);

        let health = SensorHealth {
            vertical: current.vertical.map(|r| r.is_some()),
            horizontal: current.horizontal.map(|r| r.is_some()),
            imu: current.imu.is_some(),
            heading_degraded: false,
            pose_frozen: false,
        };

        let Some(vi) = self.translation_wheel(dv) else {
            let pose = self.state.update(|s| {
                if !s.health.pose_frozen {
                    error!(pose = %s.pose, "All vertical tracking wheels lost, freezing pose");
                }
                s.health = SensorHealth {
                    pose_frozen: true,
                    ..health
                };
                s.speed = Pose::default();
                s.local_speed = LocalDelta::default();
                s.pose
            });
            return Err(OdometryError::SensorLoss { pose });
        };

        let dtheta = self.delta_theta(dv, dh, dimu);
        let vertical_offsets = Self::offsets([&self.sensors.vertical1, &self.sensors.vertical2]);
        let horizontal_offsets = Self::offsets([&self.sensors.horizontal1, &self.sensors.horizontal2]);
        let horizontal = (0..2).find_map(|i| dh[i].map(|d| (d, horizontal_offsets[i])));
        let dv_used = dv[vi].unwrap_or(0.0);
        let dtheta_used = dtheta.unwrap_or(0.0);
        let local = local_chords((dv_used, vertical_offsets[vi]), horizontal, dtheta_used);
        let secs = period.as_secs_f64();

        let pose = self.state.update(|s| {
            let previous = s.health;
            if s.health.pose_frozen {
                info!("Vertical tracking wheel recovered, resuming odometry");
            }
            if dtheta.is_none() && !previous.heading_degraded {
                warn!("No heading source available, assuming no rotation");
            }
            if previous.imu && !health.imu && self.sensors.imu.is_some() {
                warn!("Heading sensor dropped out of odometry");
            }

            let old = s.pose;
            s.pose = integrate(old, local);
            if secs > 0.0 {
                let raw = Pose::new((s.pose.x - old.x) / secs, (s.pose.y - old.y) / secs, dtheta_used / secs);
                s.speed = Pose::new(
                    ema(raw.x, s.speed.x, SPEED_SMOOTHING),
                    ema(raw.y, s.speed.y, SPEED_SMOOTHING),
                    ema(raw.theta, s.speed.theta, SPEED_SMOOTHING),
                );
                let raw_local = local.scale(1.0 / secs);
                s.local_speed = LocalDelta::new(
                    ema(raw_local.forward, s.local_speed.forward, SPEED_SMOOTHING),
                    ema(raw_local.right, s.local_speed.right, SPEED_SMOOTHING),
                    ema(raw_local.theta, s.local_speed.theta, SPEED_SMOOTHING),
                );
            }
            s.health = SensorHealth {
                heading_degraded: dtheta.is_none(),
                ..health
            };
            s.ticks += 1;
            s.pose
        });
        Ok(pose)
    }

    /// Runs [`Odometry::update`] on a dedicated thread every `period`.
    pub fn spawn(self, period: Duration) -> std::io::Result<OdometryTask> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = std::thread::Builder::new().name("odometry".into()).spawn({
            let stop = Arc::clone(&stop);
            let mut odometry = self;
            move || {
                info!(?period, "Odometry thread started.");
                let sleeper = SpinSleeper::new(10_000);
                let mut last = Instant::now();
                while !stop.load(Ordering::Relaxed) {
                    let now = Instant::now();
                    if let Err(e) = odometry.update(now - last) {
                        debug!(error = %e, "Odometry update skipped");
                    }
                    last = now;
                    sleeper.sleep(period);
                }
                info!("Odometry thread stopped.");
                odometry
            }
        })?;
        Ok(OdometryTask {
            stop,
            handle: Some(handle),
        })
    }
}

/// A running odometry thread.
pub struct OdometryTask {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Odometry>>,
}

impl OdometryTask {
    /// Stops the thread and hands the estimator back.
    ///
    /// Returns `None` if the thread panicked.
    pub fn stop(mut self) -> Option<Odometry> {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl Drop for OdometryTask {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
