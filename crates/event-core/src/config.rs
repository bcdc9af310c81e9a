//! Configuration for the Event Center
//!
//! The configuration is read once when an [`EventCenter`](crate::EventCenter)
//! is constructed and is immutable for the life of that instance. It can be
//! built in code, deserialized from TOML or JSON, or layered from a file and
//! `TICKBUS_`-prefixed environment variables.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable prefix used by [`EventCenterConfig::from_env`]
pub const ENV_PREFIX: &str = "TICKBUS";

/// Configuration for one Event Center instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCenterConfig {
    /// Maximum number of events dispatched by one `process_events` call
    pub max_events_per_tick: usize,
    /// Maximum number of events popped from a queue per batch
    pub max_batch_size: usize,
    /// Containers created up front for each payload type on first sight
    pub initial_pool_size: usize,
    /// Upper bound of each payload type's free list
    pub max_pool_size: usize,
    /// Emit per-event debug/trace logs
    pub enable_logging: bool,
    /// Recycle containers through the pool after dispatch
    pub enable_pooling: bool,
    /// Preallocated capacity of the immediate queue
    pub immediate_queue_capacity: usize,
    /// Preallocated capacity of the normal queue
    pub normal_queue_capacity: usize,
    /// Hard cap on immediate-queue events drained in a single tick
    pub max_immediate_drain_per_tick: usize,
    /// Nesting limit for synchronous `publish_immediate` dispatch
    pub max_publish_immediate_depth: usize,
    /// Number of ticks averaged by `average_processing_time_ms`
    pub stats_window: usize,
}

impl Default for EventCenterConfig {
    fn default() -> Self {
        Self {
            max_events_per_tick: 10_000,
            max_batch_size: 1_000,
            initial_pool_size: 16,
            max_pool_size: 256,
            enable_logging: false,
            enable_pooling: true,
            immediate_queue_capacity: 256,
            normal_queue_capacity: 4_096,
            max_immediate_drain_per_tick: 10_000,
            max_publish_immediate_depth: 32,
            stats_window: 60,
        }
    }
}

impl EventCenterConfig {
    /// Set the per-tick budget
    pub fn with_max_events_per_tick(mut self, max: usize) -> Self {
        self.max_events_per_tick = max;
        self
    }

    /// Set the batch size
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    /// Set the initial and maximum pool sizes
    pub fn with_pool_sizes(mut self, initial: usize, max: usize) -> Self {
        self.initial_pool_size = initial;
        self.max_pool_size = max;
        self
    }

    /// Enable or disable per-event logging
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Enable or disable container pooling
    pub fn with_pooling(mut self, enabled: bool) -> Self {
        self.enable_pooling = enabled;
        self
    }

    /// Set the nesting limit for `publish_immediate`
    pub fn with_max_publish_immediate_depth(mut self, depth: usize) -> Self {
        self.max_publish_immediate_depth = depth;
        self
    }

    /// Set the immediate-queue drain cap
    pub fn with_max_immediate_drain_per_tick(mut self, max: usize) -> Self {
        self.max_immediate_drain_per_tick = max;
        self
    }

    /// Check the configuration for values the Event Center cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_events_per_tick == 0 {
            return Err(Error::config("max_events_per_tick must be greater than zero"));
        }
        if self.max_batch_size == 0 {
            return Err(Error::config("max_batch_size must be greater than zero"));
        }
        if self.max_immediate_drain_per_tick == 0 {
            return Err(Error::config("max_immediate_drain_per_tick must be greater than zero"));
        }
        if self.stats_window == 0 {
            return Err(Error::config("stats_window must be greater than zero"));
        }
        if self.initial_pool_size > self.max_pool_size {
            return Err(Error::config(format!(
                "initial_pool_size ({}) exceeds max_pool_size ({})",
                self.initial_pool_size, self.max_pool_size
            )));
        }
        Ok(())
    }

    /// Load configuration from a TOML or JSON file, with `TICKBUS_*`
    /// environment variables layered on top.
    ///
    /// The format is picked from the file extension.
    pub fn from_file(path: &str) -> Result<Self> {
        let loaded: Self = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load configuration from `TICKBUS_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        let loaded: Self = config::Config::builder()
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let loaded: Self = toml::from_str(contents).map_err(|e| Error::parse(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse a JSON document; missing keys take their defaults
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let loaded: Self =
            serde_json::from_str(contents).map_err(|e| Error::parse(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn env_source() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX).try_parsing(true)
    }
}
