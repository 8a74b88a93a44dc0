//! Gateway configuration.
//!
//! Everything has a default so an empty file (or no file at all) yields a
//! working setup for the loopback bridge. Values are read once at startup.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::state::{RoadHazard, SENSOR_COUNT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub timers: TimerConfig,
    pub bus: BusConfig,
    pub wireless: WirelessConfig,
    pub proximity: ProximityConfig,
    pub vision: VisionConfig,
    pub safety: SafetyConfig,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|source| ConfigError::ParseToml {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timers.bus_send_period_ms == 0 {
            return Err(ConfigError::invalid("timers.bus_send_period_ms", "must be non-zero"));
        }
        if self.timers.governor_period_ms == 0 {
            return Err(ConfigError::invalid("timers.governor_period_ms", "must be non-zero"));
        }
        if self.timers.camera_period_ms == 0 {
            return Err(ConfigError::invalid("timers.camera_period_ms", "must be non-zero"));
        }
        if self.safety.sensors.len() != SENSOR_COUNT {
            return Err(ConfigError::invalid(
                "safety.sensors",
                format!("expected {} entries, got {}", SENSOR_COUNT, self.safety.sensors.len()),
            ));
        }
        for params in &self.safety.sensors {
            if params.detection_distance_turbo_cm < params.detection_distance_normal_cm {
                return Err(ConfigError::invalid(
                    "safety.sensors",
                    "turbo detection distance must not be shorter than the normal one",
                ));
            }
            if !params.speed_threshold_normal_turbo_dmps.is_finite() {
                return Err(ConfigError::invalid("safety.sensors", "speed threshold must be finite"));
            }
        }
        Ok(())
    }

    /// Per-sensor parameters as a fixed array. Only valid after `validate`.
    pub fn sensor_params(&self) -> [SensorSafetyParams; SENSOR_COUNT] {
        let mut params = default_sensor_params();
        for (slot, configured) in params.iter_mut().zip(&self.safety.sensors) {
            *slot = *configured;
        }
        params
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_field_names)]
pub struct TimerConfig {
    pub bus_send_period_ms: u64,
    pub governor_period_ms: u64,
    pub camera_period_ms: u64,
}

impl TimerConfig {
    pub fn bus_send_period(&self) -> Duration {
        Duration::from_millis(self.bus_send_period_ms)
    }

    pub fn governor_period(&self) -> Duration {
        Duration::from_millis(self.governor_period_ms)
    }

    pub fn camera_period(&self) -> Duration {
        Duration::from_millis(self.camera_period_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            bus_send_period_ms: 50,
            governor_period_ms: 100,
            camera_period_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Local address the bus bridge receives frames on.
    pub bind: SocketAddr,
    /// Where outgoing drive frames are sent.
    pub peer: SocketAddr,
    pub ids: CanIds,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
            peer: SocketAddr::from(([127, 0, 0, 1], 9001)),
            ids: CanIds::default(),
        }
    }
}

/// CAN identifiers used on the vehicle bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanIds {
    pub ultrasound: u32,
    pub direction_cmd: u32,
    pub speed_cmd: u32,
    pub speed_data: u32,
    pub direction_data: u32,
    pub battery: u32,
}

impl Default for CanIds {
    fn default() -> Self {
        Self {
            ultrasound: 0x000,
            direction_cmd: 0x002,
            speed_cmd: 0x003,
            speed_data: 0x010,
            direction_data: 0x011,
            battery: 0x012,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WirelessConfig {
    pub listen: SocketAddr,
}

impl Default for WirelessConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8090)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Echoes beyond this range are reported as "nothing detected".
    pub max_range_cm: u16,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self { max_range_cm: 200 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub fixed_hazard: RoadHazard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub sensors: Vec<SensorSafetyParams>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            sensors: default_sensor_params().to_vec(),
        }
    }
}

/// Stopping envelope for one ultrasound channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSafetyParams {
    pub detection_distance_normal_cm: u16,
    pub detection_distance_turbo_cm: u16,
    pub speed_threshold_normal_turbo_dmps: f32,
}

impl SensorSafetyParams {
    pub const fn new(normal_cm: u16, turbo_cm: u16, threshold_dmps: f32) -> Self {
        Self {
            detection_distance_normal_cm: normal_cm,
            detection_distance_turbo_cm: turbo_cm,
            speed_threshold_normal_turbo_dmps: threshold_dmps,
        }
    }
}

// Above the fastest decodable speed (25 * 0.36 = 9.0), so only the normal
// distances apply unless a config lowers it.
const DEFAULT_SPEED_THRESHOLD_DMPS: f32 = 12.0;

pub fn default_sensor_params() -> [SensorSafetyParams; SENSOR_COUNT] {
    [
        SensorSafetyParams::new(20, 40, DEFAULT_SPEED_THRESHOLD_DMPS),
        SensorSafetyParams::new(40, 60, DEFAULT_SPEED_THRESHOLD_DMPS),
        SensorSafetyParams::new(100, 140, DEFAULT_SPEED_THRESHOLD_DMPS),
        SensorSafetyParams::new(100, 140, DEFAULT_SPEED_THRESHOLD_DMPS),
        SensorSafetyParams::new(20, 40, DEFAULT_SPEED_THRESHOLD_DMPS),
        SensorSafetyParams::new(40, 60, DEFAULT_SPEED_THRESHOLD_DMPS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert_eq!(config.timers.bus_send_period_ms, 50);
        assert_eq!(config.bus.ids, CanIds::default());
        assert_eq!(config.sensor_params(), default_sensor_params());
        assert_eq!(config.vision.fixed_hazard, RoadHazard::Clear);
    }

    #[test]
    fn test_partial_override() {
        let config = GatewayConfig::from_toml(
            r#"
            [timers]
            governor_period_ms = 25

            [bus.ids]
            speed_data = 0x100

            [vision]
            fixed_hazard = "LeftWarn"
            "#,
        )
        .unwrap();

        assert_eq!(config.timers.governor_period_ms, 25);
        assert_eq!(config.timers.camera_period_ms, 200);
        assert_eq!(config.bus.ids.speed_data, 0x100);
        assert_eq!(config.bus.ids.battery, 0x012);
        assert_eq!(config.vision.fixed_hazard, RoadHazard::LeftWarn);
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = GatewayConfig::from_toml("[timers]\nbus_send_period_ms = 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "timers.bus_send_period_ms", .. })
        ));
    }

    #[test]
    fn test_wrong_sensor_count_rejected() {
        let result = GatewayConfig::from_toml(
            r#"
            [[safety.sensors]]
            detection_distance_normal_cm = 10
            detection_distance_turbo_cm = 20
            speed_threshold_normal_turbo_dmps = 5.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid { field: "safety.sensors", .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = GatewayConfig::load(Path::new("/nonexistent/acm-gateway.toml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
