//! Error types for the shadow system

use thiserror::Error;

/// Failures reported by the GPU backend when creating resources
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Device memory exhausted
    #[error("Out of GPU memory while creating {0}")]
    OutOfMemory(&'static str),

    /// Requested format or size is not supported by the device
    #[error("Unsupported resource: {0}")]
    Unsupported(String),

    /// Device lost or driver failure
    #[error("Device error: {0}")]
    Device(String),
}

/// Shadow system errors
#[derive(Debug, Error)]
pub enum ShadowError {
    /// Resource creation failed on the backend
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A cascade worker thread could not be started
    #[error("Failed to spawn cascade worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The worker pool no longer accepts jobs
    #[error("Cascade worker pool is closed")]
    PoolClosed,

    /// A cascade job ended without producing a result
    #[error("Cascade {cascade} worker was lost")]
    WorkerLost { cascade: usize },

    /// Configuration rejected after validation
    #[error("Invalid shadow configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed or written
    #[error("Shadow configuration serialization failed: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for shadow operations
pub type Result<T> = std::result::Result<T, ShadowError>;
