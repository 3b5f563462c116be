use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for registry, protocol and monitor behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Upper bound on waiting for a device lock (default: 1 second)
    pub lock_timeout: Duration,

    /// Maximum number of live devices (default: 65535)
    pub max_devices: usize,

    /// Maximum number of live pins (default: 65535)
    pub max_pins: usize,

    /// Maximum logical size of one protocol message in bytes (default: 8192)
    pub max_message_size: usize,

    /// Event bus capacity per subscriber (default: 256)
    pub event_capacity: usize,

    /// Try-lock attempts before a callback lock gives up (default: 1000)
    pub callback_lock_attempts: u32,

    /// Sleep between callback try-lock attempts (default: 100µs)
    pub callback_lock_backoff: Duration,

    /// Interval between successful polls (default: 500ms)
    pub poll_interval: Duration,

    /// Interval before retrying a failed poll (default: 10ms)
    pub poll_retry_interval: Duration,

    /// Consecutive failed polls after which the monitor stops (default: 50)
    pub poll_error_threshold: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(1),
            max_devices: 65_535,
            max_pins: 65_535,
            max_message_size: 8192,
            event_capacity: 256,
            callback_lock_attempts: 1000,
            callback_lock_backoff: Duration::from_micros(100),
            poll_interval: Duration::from_millis(500),
            poll_retry_interval: Duration::from_millis(10),
            poll_error_threshold: 50,
        }
    }
}

impl RegistryConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a field has the wrong type.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::error::DpllError::InvalidArgument {
            name: "config".to_string(),
            message: e.to_string(),
        })
    }
}

/// Builder for `RegistryConfig`
#[derive(Debug, Clone, Default)]
pub struct RegistryConfigBuilder {
    config: RegistryConfig,
}

impl RegistryConfigBuilder {
    /// Set the device lock timeout
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Set the device limit
    #[must_use]
    pub fn max_devices(mut self, max: usize) -> Self {
        self.config.max_devices = max;
        self
    }

    /// Set the pin limit
    #[must_use]
    pub fn max_pins(mut self, max: usize) -> Self {
        self.config.max_pins = max;
        self
    }

    /// Set the maximum message size
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the event bus capacity
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Set callback try-lock attempts and backoff
    #[must_use]
    pub fn callback_lock(mut self, attempts: u32, backoff: Duration) -> Self {
        self.config.callback_lock_attempts = attempts;
        self.config.callback_lock_backoff = backoff;
        self
    }

    /// Set poll and retry intervals
    #[must_use]
    pub fn poll_intervals(mut self, interval: Duration, retry: Duration) -> Self {
        self.config.poll_interval = interval;
        self.config.poll_retry_interval = retry;
        self
    }

    /// Set the consecutive poll failure threshold
    #[must_use]
    pub fn poll_error_threshold(mut self, threshold: u32) -> Self {
        self.config.poll_error_threshold = threshold;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> RegistryConfig {
        self.config
    }
}
