//! Pipeline configuration.
//!
//! All fields have defaults, so an empty YAML document is a valid
//! configuration. Durations are expressed in milliseconds.
//!
//! ```rust
//! use sensorcast::config::{PointCloudMode, StreamerConfig};
//!
//! let config = StreamerConfig::from_yaml_str(
//!     "destination:\n  host: 192.168.1.20\n  port: 9000\npoint_cloud:\n  mode: sparse\n",
//! )
//! .unwrap();
//! assert_eq!(config.destination.port, 9000);
//! assert_eq!(config.point_cloud.mode, PointCloudMode::Sparse);
//! assert_eq!(config.downsample_factor, 4);
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use crate::depth::DEFAULT_DOWNSAMPLE_FACTOR;
use crate::serializer::DEFAULT_DEVICE_TAG;
use crate::{Result, StreamError};

/// Remote consumer address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub port: u32,
}

impl Default for Destination {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 9000 }
    }
}

impl Destination {
    /// Create a destination, validating the host and port.
    pub fn new(host: impl Into<String>, port: u32) -> Result<Self> {
        let destination = Self { host: host.into(), port };
        destination.socket_addr()?;
        Ok(destination)
    }

    /// Resolve to a socket address.
    ///
    /// The host must be a dotted-quad IPv4 address and the port must be in
    /// `1..=65535`.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: Ipv4Addr = self.host.trim().parse().map_err(|_| {
            StreamError::invalid_address(&self.host, self.port, "not a dotted-quad IPv4 address")
        })?;
        let port = u16::try_from(self.port)
            .ok()
            .filter(|&p| p != 0)
            .ok_or_else(|| StreamError::invalid_address(&self.host, self.port, "port must be 1-65535"))?;
        Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where point samples come from on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointCloudMode {
    /// Strided walk over the downsampled depth map
    #[default]
    Dense,
    /// Truncated copy of the tracking subsystem's point cloud
    Sparse,
    /// No POINT_CLOUD stream
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCloudConfig {
    pub mode: PointCloudMode,
    /// Upper bound on points per tick
    pub max_points: usize,
}

impl Default for PointCloudConfig {
    fn default() -> Self {
        Self { mode: PointCloudMode::Dense, max_points: 5000 }
    }
}

/// Top-level configuration for a streaming session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    pub destination: Destination,
    /// Tag written into every metadata record
    pub device_tag: String,
    /// Fixed delay between capture ticks (~60 Hz by default)
    pub tick_interval_ms: u64,
    /// Pause after a failed tick
    pub error_backoff_ms: u64,
    /// Sender sleep when the outbound queue is empty
    pub idle_sleep_ms: u64,
    /// Sender pause after a failed datagram send
    pub send_backoff_ms: u64,
    pub downsample_factor: usize,
    pub point_cloud: PointCloudConfig,
    /// Outbound queue cap; `None` leaves the queue unbounded. When set, the
    /// oldest packet is dropped to make room.
    pub queue_capacity: Option<usize>,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            destination: Destination::default(),
            device_tag: DEFAULT_DEVICE_TAG.to_string(),
            tick_interval_ms: 16,
            error_backoff_ms: 1000,
            idle_sleep_ms: 5,
            send_backoff_ms: 1000,
            downsample_factor: DEFAULT_DOWNSAMPLE_FACTOR,
            point_cloud: PointCloudConfig::default(),
            queue_capacity: None,
        }
    }
}

impl StreamerConfig {
    /// Parse and validate a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)
                .map_err(|e| StreamError::config(format!("invalid YAML: {e}")))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| StreamError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize the configuration back to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| StreamError::config(e.to_string()))
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<()> {
        self.destination.socket_addr()?;

        if self.downsample_factor == 0 {
            return Err(StreamError::config("downsample_factor must be >= 1"));
        }
        if self.tick_interval_ms == 0 {
            return Err(StreamError::config("tick_interval_ms must be >= 1"));
        }
        if self.idle_sleep_ms == 0 {
            return Err(StreamError::config("idle_sleep_ms must be >= 1"));
        }
        if self.queue_capacity == Some(0) {
            return Err(StreamError::config("queue_capacity must be >= 1 when set"));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn send_backoff(&self) -> Duration {
        Duration::from_millis(self.send_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = StreamerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(16));
        assert_eq!(config.error_backoff(), Duration::from_secs(1));
        assert_eq!(config.send_backoff(), Duration::from_secs(1));
        assert_eq!(config.point_cloud.mode, PointCloudMode::Dense);
        assert_eq!(config.queue_capacity, None);
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        assert_eq!(StreamerConfig::from_yaml_str("").unwrap(), StreamerConfig::default());
    }

    #[test]
    fn partial_yaml_overrides_fields() {
        let yaml = "\
device_tag: tablet
tick_interval_ms: 33
queue_capacity: 256
point_cloud:
  max_points: 100
";
        let config = StreamerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.device_tag, "tablet");
        assert_eq!(config.tick_interval_ms, 33);
        assert_eq!(config.queue_capacity, Some(256));
        assert_eq!(config.point_cloud.max_points, 100);
        assert_eq!(config.point_cloud.mode, PointCloudMode::Dense);
        assert_eq!(config.destination, Destination::default());
    }

    #[test]
    fn yaml_round_trip() {
        let mut config = StreamerConfig::default();
        config.point_cloud.mode = PointCloudMode::Off;
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(StreamerConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            StreamerConfig::from_yaml_str("downsample_factor: 0"),
            Err(StreamError::Config { .. })
        ));
        assert!(StreamerConfig::from_yaml_str("queue_capacity: 0").is_err());
        assert!(StreamerConfig::from_yaml_str("tick_interval_ms: [1, 2]").is_err());
        assert!(matches!(
            StreamerConfig::from_yaml_str("destination:\n  host: localhost\n  port: 9000"),
            Err(StreamError::Address { .. })
        ));
    }

    #[test]
    fn destination_validation() {
        assert!(Destination::new("192.168.0.10", 9000).is_ok());
        assert!(Destination::new("192.168.0.10", 65535).is_ok());
        assert!(Destination::new("192.168.0.10", 0).is_err());
        assert!(Destination::new("192.168.0.10", 65536).is_err());
        assert!(Destination::new("256.1.1.1", 9000).is_err());
        assert!(Destination::new("10.0.0", 9000).is_err());

        let addr = Destination::new("127.0.0.1", 9000).unwrap().socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device_tag: from-file").unwrap();

        let config = StreamerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.device_tag, "from-file");

        assert!(StreamerConfig::from_path("/nonexistent/sensorcast.yaml").is_err());
    }
}
