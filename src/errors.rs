//! Error hierarchy for the fleetbus runtime.
//!
//! Defines error types for the coordination core, categorized by concern:
//! service lifecycle orchestration, bus transport, and configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::Deployment;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Service startup/shutdown orchestration failures
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Message bus transport failures
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Configuration loading and repository parse failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Lifecycle phase a service was in when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Startup,
    Shutdown,
}

impl std::fmt::Display for Phase {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Phase::Startup => write!(f, "startup"),
            Phase::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A managed service returned an error from its startup call
    #[error("service '{hostname}' failed to start (group {group}): {source}")]
    ServiceStartup {
        hostname: String,
        group: usize,
        #[source]
        source: Box<Error>,
    },

    /// A managed service returned an error from its shutdown call
    #[error("service '{hostname}' failed to shut down (group {group}): {source}")]
    ServiceShutdown {
        hostname: String,
        group: usize,
        #[source]
        source: Box<Error>,
    },

    /// The shared deadline expired while waiting on a service
    #[error("{phase} of service '{hostname}' (group {group}) exceeded the application deadline")]
    Timeout {
        phase: Phase,
        hostname: String,
        group: usize,
    },

    /// Startup called while the application is already running
    #[error("application already started")]
    AlreadyStarted,

    /// Shutdown called before a successful startup
    #[error("application is not started")]
    NotStarted,

    /// Mock services only run in LOCAL and TESTING deployments
    #[error("mock service '{hostname}' refuses to start in {deployment} deployment")]
    MockDisallowed {
        hostname: String,
        deployment: Deployment,
    },

    /// Installing the process signal handlers failed
    #[error("failed to install signal handlers")]
    Signal(#[source] std::io::Error),

    /// A service background task panicked or was aborted
    #[error("background task '{task}' exited abnormally")]
    TaskFailure {
        task: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// No subscriber is listening on the subject
    #[error("no responders on subject '{0}'")]
    NoResponders(String),

    /// A request waited past its deadline for a reply
    #[error("request on '{subject}' timed out after {timeout:?}")]
    RequestTimeout { subject: String, timeout: Duration },

    /// The responder dropped the reply handle without answering
    #[error("responder on '{subject}' dropped the request without replying")]
    NoReply { subject: String },

    /// Message payload serialization failures
    #[error("failed to encode message payload")]
    Encode(#[source] bincode::Error),

    /// Message payload deserialization failures
    #[error("failed to decode message on '{subject}'")]
    Decode {
        subject: String,
        #[source]
        source: bincode::Error,
    },

    /// Guardrail for incomplete test setup: the endpoint exists on the mock
    /// but no handler was stubbed for it
    #[error("endpoint '{0}' is not mocked")]
    NotImplemented(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The repository YAML document failed to parse; prior content is kept
    #[error("invalid repository YAML")]
    InvalidYaml(#[source] serde_yaml::Error),

    /// Repository values must be scalars (strings, numbers, booleans)
    #[error("config value for '{domain}.{key}' must be a scalar")]
    NonScalarValue { domain: String, key: String },

    /// Reading the backing config source failed
    #[error("failed to read config source '{path}'")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unknown deployment tag
    #[error("invalid deployment tag '{0}'")]
    InvalidDeployment(String),

    /// Framework settings loading failures
    #[error(transparent)]
    Settings(#[from] config::ConfigError),
}

// ============== Conversion Implementations ============== //
impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(ConfigError::Settings(e))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(ConfigError::InvalidYaml(e))
    }
}
