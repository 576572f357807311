//! Connection configuration.
//!
//! The connection string is handed to the driver verbatim. The facade only
//! owns the settings that govern its own behavior: timeouts and how
//! statements are recorded in traces.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::instrumentation::SanitizationConfig;

/// Timeouts applied by the facade around driver calls.
///
/// A zero duration disables the corresponding timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Time allowed for `open` (default: 15s).
    pub connect_timeout: Duration,
    /// Default time allowed for a command (default: 30s).
    pub command_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(30),
        }
    }
}

impl TimeoutConfig {
    /// Create a timeout configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default command timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Disable both timeouts.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            connect_timeout: Duration::ZERO,
            command_timeout: Duration::ZERO,
        }
    }
}

/// Configuration for a [`Connection`](crate::Connection).
#[derive(Debug, Clone)]
pub struct Config {
    /// Opaque connection string passed to the driver.
    pub connection_string: String,
    /// Application name reported in traces.
    pub application_name: String,
    /// Timeouts.
    pub timeouts: TimeoutConfig,
    /// How statements are recorded in trace spans.
    pub sanitization: SanitizationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            application_name: "dbshim".to_string(),
            timeouts: TimeoutConfig::default(),
            sanitization: SanitizationConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration for the given connection string.
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Self::default()
        }
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set the open timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect_timeout = timeout;
        self
    }

    /// Set the default command timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.command_timeout = timeout;
        self
    }

    /// Replace all timeouts.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set statement sanitization for traces.
    #[must_use]
    pub fn sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.sanitization = sanitization;
        self
    }

    /// Check that the configuration can be used to open a connection.
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(Error::Config("connection string is empty".into()));
        }
        Ok(())
    }
}

impl From<&str> for Config {
    fn from(connection_string: &str) -> Self {
        Self::new(connection_string)
    }
}

impl From<String> for Config {
    fn from(connection_string: String) -> Self {
        Self::new(connection_string)
    }
}
