use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use lodestar_devices::sim::{SimConfig, SimRobot};
use lodestar_devices::{DeviceError, TrackingWheel};
use lodestar_kinematics::Pose;
use lodestar_motion::{MotionSettings, OdomSensors};
use serde::Deserialize;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Everything the simulation binary is configured with.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub robot: RobotSettings,
    pub odometry: OdometrySettings,
    pub sim: SimSettings,
    #[serde(default)]
    pub motion: MotionSettings,
    #[serde(rename = "match")]
    pub match_timing: MatchSettings,
    pub routine: RoutineSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotSettings {
    pub track_width: f64,
    /// Side ground speed at full power (in/s).
    pub max_velocity: f64,
    pub max_power: f64,
    pub start: Pose,
}

/// Tracking wheel layout. Offsets follow the odometry convention: vertical
/// wheels positive to the left, horizontal wheels positive forward.
#[derive(Debug, Clone, Deserialize)]
pub struct OdometrySettings {
    pub period_ms: u64,
    pub wheel_diameter: f64,
    pub vertical_offsets: Vec<f64>,
    #[serde(default)]
    pub horizontal_offsets: Vec<f64>,
    #[serde(default)]
    pub imu: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimSettings {
    /// Plant integration period.
    pub period_ms: u64,
    #[serde(default)]
    pub encoder_noise: f64,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchSettings {
    /// Length of the autonomous period. The match phase advances when it
    /// runs out, cancelling whatever motion is running.
    pub autonomous_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutineSettings {
    pub path: String,
    pub lookahead: f64,
    /// Per-motion timeout.
    pub timeout_ms: u64,
    /// Emit per-tick controller telemetry.
    #[serde(default)]
    pub log: bool,
}

impl Settings {
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            track_width: self.robot.track_width,
            max_velocity: self.robot.max_velocity,
            max_power: self.robot.max_power,
            encoder_noise: self.sim.encoder_noise,
            seed: self.sim.seed,
        }
    }

    /// Builds the odometry sensor set on top of the simulated robot.
    pub fn sensors(&self, robot: &SimRobot) -> Result<OdomSensors, DeviceError> {
        let o = &self.odometry;
        let mut sensors = OdomSensors::default();
        for (i, &offset) in o.vertical_offsets.iter().take(2).enumerate() {
            let encoder = robot.vertical_encoder(&format!("vertical{}", i + 1), offset, o.wheel_diameter);
            sensors = sensors.vertical(TrackingWheel::new(Box::new(encoder), o.wheel_diameter, offset, 1.0)?);
        }
        for (i, &offset) in o.horizontal_offsets.iter().take(2).enumerate() {
            let encoder = robot.horizontal_encoder(&format!("horizontal{}", i + 1), offset, o.wheel_diameter);
            sensors = sensors.horizontal(TrackingWheel::new(Box::new(encoder), o.wheel_diameter, offset, 1.0)?);
        }
        if o.imu {
            sensors = sensors.imu(Box::new(robot.imu("imu")));
        }
        Ok(sensors)
    }
}

fn builder() -> ConfigBuilder<DefaultState> {
    Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("LODESTAR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
}

/// Loads `config/default.toml`, overridden by `LODESTAR__*` environment
/// variables (e.g. `LODESTAR__MATCH__AUTONOMOUS_MS=5000`).
pub fn load_config() -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let settings = builder().build().and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_default_config_loads() {
        let settings = builder().build().unwrap().try_deserialize::<Settings>().unwrap();
        assert!((settings.motion.lateral.gains.kp - 10.0).abs() < EPSILON);
        assert!((settings.motion.angular.gains.kp - 2.0).abs() < EPSILON);
        assert_eq!(settings.motion.lateral.exit.large_error_timeout_ms, 500);
        assert!(settings.motion.validate().is_ok());
    }

    #[test]
    fn test_string_overrides_reach_nested_gains() {
        // Environment values arrive as strings.
        let settings = builder()
            .set_override("motion.lateral.gains.kp", "5.0")
            .unwrap()
            .set_override("motion.angular.exit.small_error", "0.5")
            .unwrap()
            .set_override("match.autonomous_ms", "5000")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();
        assert!((settings.motion.lateral.gains.kp - 5.0).abs() < EPSILON);
        assert!((settings.motion.lateral.gains.kd - 0.3).abs() < EPSILON);
        assert!((settings.motion.angular.exit.small_error - 0.5).abs() < EPSILON);
        assert_eq!(settings.match_timing.autonomous_ms, 5000);
    }
}
