//! Configuration for transports and the connection engine.
//!
//! Everything can be built in code with the fluent setters or loaded from a
//! TOML file:
//!
//! ```toml
//! [transport]
//! kind = "hid"
//! vendor_id = 0x10c4
//! product_id = 0xea80
//!
//! [engine]
//! queue_capacity = 32
//! response_timeout_ms = 2000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::listener::DEFAULT_QUEUE_CAPACITY;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default TCP host of a signer emulator.
pub const DEFAULT_HOST: &str = "localhost";
/// Default TCP port of a signer emulator.
pub const DEFAULT_PORT: u16 = 3000;
/// Default USB vendor id (Silicon Labs CP2110 bridge).
pub const DEFAULT_VENDOR_ID: u16 = 0x10c4;
/// Default USB product id (Silicon Labs CP2110 bridge).
pub const DEFAULT_PRODUCT_ID: u16 = 0xea80;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must not be 0")]
    InvalidPort,

    #[error("host must not be empty")]
    EmptyHost,

    #[error("queue_capacity must be at least 1, got {0}")]
    InvalidQueueCapacity(usize),

    #[error("read_timeout_ms must be at least 1, got {0}")]
    InvalidReadTimeout(u64),

    #[error("max_payload_size must be at least 1, got {0}")]
    InvalidMaxPayloadSize(u32),
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Which link to open and how.
    pub transport: TransportConfig,

    /// Read loop, queue and shutdown settings.
    pub engine: EngineConfig,
}

/// Link selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// TCP socket, usually to an emulator.
    Stream(StreamConfig),
    /// USB HID device behind a UART bridge.
    Hid(HidConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Stream(StreamConfig::default())
    }
}

/// TCP stream settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    /// Give up connecting after this many milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
        }
    }
}

impl StreamConfig {
    /// Settings for `host:port` with the default timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Printable `host:port`, with IPv6 literals in brackets.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// USB HID device selection and timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HidConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Exact serial number to match. `None` takes the first matching device.
    pub serial_number: Option<String>,
    /// How long a single report read waits before the message is complete.
    pub read_timeout_ms: u64,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            serial_number: None,
            read_timeout_ms: 500,
        }
    }
}

impl HidConfig {
    /// Match a specific vendor and product id.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            ..Self::default()
        }
    }

    /// Require an exact serial number.
    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Connection engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of every listener queue.
    pub queue_capacity: usize,
    /// How long `close()` waits for the read loop before aborting it.
    pub shutdown_grace_ms: u64,
    /// Pause between transport polls after end of stream.
    pub eof_poll_interval_ms: u64,
    /// How long facade calls wait for the next event.
    pub response_timeout_ms: u64,
    /// Largest payload accepted from the device.
    pub max_payload_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace_ms: 500,
            eof_poll_interval_ms: 100,
            response_timeout_ms: 1000,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl EngineConfig {
    /// Set the listener queue capacity.
    ///
    /// Default: 32
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the shutdown grace period.
    ///
    /// Default: 500 ms
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Set the end-of-stream poll interval.
    ///
    /// Default: 100 ms
    pub fn eof_poll_interval(mut self, interval: Duration) -> Self {
        self.eof_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the facade response timeout.
    ///
    /// Default: 1 second
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the maximum inbound payload size.
    ///
    /// Default: 16 MiB
    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.max_payload_size = size;
        self
    }

    pub fn shutdown_grace_duration(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn eof_poll_interval_duration(&self) -> Duration {
        Duration::from_millis(self.eof_poll_interval_ms)
    }

    pub fn response_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl ClientConfig {
    /// Stream transport to `host:port` with default engine settings.
    pub fn stream(host: impl Into<String>, port: u16) -> Self {
        Self {
            transport: TransportConfig::Stream(StreamConfig::new(host, port)),
            engine: EngineConfig::default(),
        }
    }

    /// HID transport with default engine settings.
    pub fn hid(hid: HidConfig) -> Self {
        Self {
            transport: TransportConfig::Hid(hid),
            engine: EngineConfig::default(),
        }
    }

    /// Replace the engine settings.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match &self.transport {
            TransportConfig::Stream(stream) => {
                if stream.host.is_empty() {
                    return Err(ConfigError::EmptyHost);
                }
                if stream.port == 0 {
                    return Err(ConfigError::InvalidPort);
                }
            }
            TransportConfig::Hid(hid) => {
                if hid.read_timeout_ms == 0 {
                    return Err(ConfigError::InvalidReadTimeout(hid.read_timeout_ms));
                }
            }
        }

        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(self.engine.queue_capacity));
        }
        if self.engine.max_payload_size == 0 {
            return Err(ConfigError::InvalidMaxPayloadSize(
                self.engine.max_payload_size,
            ));
        }

        Ok(())
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}
