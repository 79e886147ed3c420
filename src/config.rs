//! Bridge configuration
//!
//! Configuration is plain YAML parsed with `serde_yaml_ng`. Every field has a
//! default, so an empty document is a valid configuration:
//!
//! ```yaml
//! capture:
//!   width: 640
//!   height: 360
//!   jpeg_quality: 40
//!   target_fps: 30.0
//! producer:
//!   address: "127.0.0.1:65432"
//!   on_connect_failure: capture_only
//! consumer:
//!   listen_address: "0.0.0.0:65433"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::CaptureClock;
use crate::{BridgeError, Result};

/// Top-level bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub capture: CaptureConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
    pub handshake: HandshakeConfig,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

/// Camera capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1 (smallest) to 100 (best)
    pub jpeg_quality: u8,
    pub target_fps: f64,
}

/// What the producer does when the peer is unreachable at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectFailurePolicy {
    /// Keep capturing in-process, transmit nothing
    #[default]
    CaptureOnly,
    /// Fail startup of the producer entirely
    Disable,
}

/// Outbound frame stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerConfig {
    pub enabled: bool,
    /// Peer address frames are pushed to
    pub address: String,
    pub connect_timeout_ms: u64,
    pub on_connect_failure: ConnectFailurePolicy,
}

/// Inbound command listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerConfig {
    pub enabled: bool,
    pub listen_address: String,
    /// Pause after an accept or read error before accepting again
    pub retry_backoff_ms: u64,
    /// Longest accepted command line in bytes, excluding the newline
    pub max_line_length: usize,
}

/// Startup reachability check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandshakeConfig {
    pub enabled: bool,
    pub address: String,
    pub greeting: String,
    pub timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { width: 640, height: 360, jpeg_quality: 40, target_fps: 30.0 }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "127.0.0.1:65432".to_string(),
            connect_timeout_ms: 5000,
            on_connect_failure: ConnectFailurePolicy::CaptureOnly,
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: "0.0.0.0:65433".to_string(),
            retry_backoff_ms: 1000,
            max_line_length: 1024,
        }
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:65432".to_string(),
            greeting: "Hello from simulator!".to_string(),
            timeout_ms: 2000,
        }
    }
}

impl ProducerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl ConsumerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl HandshakeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserializes as null; treat it as all defaults
        let config: BridgeConfig = if yaml.trim().is_empty() {
            BridgeConfig::default()
        } else {
            serde_yaml_ng::from_str(yaml).map_err(|e| BridgeError::config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| BridgeError::config(e.to_string()))
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let capture = &self.capture;
        if capture.width == 0 || capture.height == 0 {
            return Err(BridgeError::config(format!(
                "capture size must be non-zero, got {}x{}",
                capture.width, capture.height
            )));
        }
        if !(1..=100).contains(&capture.jpeg_quality) {
            return Err(BridgeError::config(format!(
                "jpeg_quality must be in 1..=100, got {}",
                capture.jpeg_quality
            )));
        }
        CaptureClock::from_fps(capture.target_fps)?;
        if self.consumer.max_line_length == 0 {
            return Err(BridgeError::config("max_line_length must be non-zero"));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            producer: ProducerConfig::default(),
            consumer: ConsumerConfig::default(),
            handshake: HandshakeConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}
