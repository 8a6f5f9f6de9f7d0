//! Error types for the LBVH renderer.

use thiserror::Error;

/// Main error type for pipeline construction and frame submission.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration value out of its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Requested particle count cannot be encoded or allocated
    #[error("Particle count {requested} exceeds limit {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    /// Particle count changed within a session
    #[error("Particle count mismatch: session holds {expected}, frame has {actual}")]
    ParticleCountMismatch { expected: usize, actual: usize },

    /// More point lights than the shading stage accepts
    #[error("Too many lights: {count} (max {max})")]
    TooManyLights { count: usize, max: usize },

    /// Raw simulator buffer is not a whole number of particle records
    #[error("Invalid particle buffer: {0}")]
    InvalidParticleBuffer(String),

    /// Image dimensions disagree with the accumulation buffers
    #[error("Image size mismatch: expected {expected:?}, got {actual:?}")]
    ImageSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding error
    #[cfg(feature = "export")]
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, Error>;
