//! Error types for spectcrf-core.

use thiserror::Error;

/// Result type alias for spectcrf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal actor misconfigurations, detected once before any event is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The actor has no attached volume.
    #[error("CRF actor is not attached to any volume")]
    NotAttached,

    /// The actor is attached to the world root instead of a camera head.
    #[error("CRF actor is attached to world; it must be attached to a SPECT head")]
    AttachedToWorld,

    /// No crystal volume was configured (or the configured name never resolved).
    #[error("no crystal volume defined for CRF actor")]
    MissingCrystal,

    /// A volume name does not exist in the geometry.
    #[error("unknown volume: {0}")]
    UnknownVolume(String),

    /// The crystal or one of its ancestors is a repeated volume.
    #[error("volume {name} is repeated {copies} times; crystal hierarchy must be unique")]
    RepeatedVolume { name: String, copies: u32 },

    /// The crystal does not sit below the attached volume.
    #[error("{crystal} is not a descendant of the actor's attached volume {attached}")]
    NotDescendant { crystal: String, attached: String },

    /// No output destination was configured.
    #[error("no output destination set for CRF actor")]
    MissingOutput,
}

/// Core error types for spectcrf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The output collaborator rejected a record.
    #[error("record sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A record was handed to a sink after the acquisition ended.
    #[error("record sink already closed")]
    SinkClosed,
}

impl Error {
    /// Wraps an arbitrary sink failure.
    pub fn sink<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Sink(Box::new(err))
    }
}
