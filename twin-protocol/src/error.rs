//! Error types for each engine boundary.

use thiserror::Error;

/// Errors returned by a behaviour execution endpoint when a dispatch
/// package cannot be handed over.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The endpoint is not accepting work (closed channel, stopped worker).
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint refused this particular package.
    #[error("dispatch rejected: {0}")]
    Rejected(String),

    /// The behaviour is no longer registered with the engine.
    #[error("behaviour not registered: {0}")]
    BehaviourNotFound(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised while turning an output resource into its wire form.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The resource could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The encoder does not handle this resource kind.
    #[error("unsupported resource kind: {0}")]
    Unsupported(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<serde_json::Error> for EncodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Errors raised when a transport packet cannot be published.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PublishError {
    /// No egress endpoint could be resolved for the originating node.
    #[error("no egress route for node: {0}")]
    NoRoute(String),

    /// The unit of work is not registered (never was, or already purged).
    #[error("unit of work not registered: {0}")]
    UnknownWork(String),

    /// The transport refused or failed to send the packet.
    #[error("publish failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Engine lifecycle and configuration errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EngineError {
    /// `start()` was called while the scheduler task is already running.
    #[error("scheduler already running")]
    AlreadyRunning,

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
