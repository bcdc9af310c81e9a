//! Error handling for the event bus
//!
//! Most failure modes of the bus are recovered locally and only surface as
//! log lines or statistics (a failing listener, a double release, an unknown
//! subscription handle). The variants here cover the operations that can
//! genuinely fail for the caller: loading configuration, setting up logging,
//! using the global facade before it exists, and misusing a container.

use thiserror::Error;

/// Result type alias for event bus operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for event bus operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value
    #[error("Invalid configuration: {details}")]
    Config { details: String },

    /// Configuration source could not be loaded
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Configuration document could not be parsed
    #[error("Parse error: {details}")]
    Parse { details: String },

    /// The tracing subscriber could not be installed
    #[error("Logging setup failed: {details}")]
    Logging { details: String },

    /// The global event system has not been initialized
    #[error("Event system is not initialized")]
    NotInitialized,

    /// The global event system is already initialized
    #[error("Event system is already initialized")]
    AlreadyInitialized,

    /// A container was re-initialized with a payload of another type
    #[error("Payload type mismatch: container holds {expected}, got {actual}")]
    PayloadTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A disposed container was used without re-initialization
    #[error("Container for {event_type} is disposed")]
    ContainerDisposed { event_type: &'static str },
}

impl Error {
    /// Create a new invalid configuration error
    pub fn config(details: impl Into<String>) -> Self {
        Self::Config {
            details: details.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(details: impl Into<String>) -> Self {
        Self::Parse {
            details: details.into(),
        }
    }

    /// Create a new logging setup error
    pub fn logging(details: impl Into<String>) -> Self {
        Self::Logging {
            details: details.into(),
        }
    }

    /// Whether the error stems from configuration handling
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::ConfigLoad(_) | Self::Parse { .. }
        )
    }
}
