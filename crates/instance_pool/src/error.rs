//! Pool error types
//!
//! Only construction, resizing and host allocation can fail. Per-frame writes
//! follow the lenient out-of-range policy and never produce an error.

use crate::config::ConfigError;

/// Errors that can occur while building or resizing a pool
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// Batches must hold at least one slot
    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    /// Parking distance would leave inactive slots inside the working volume
    #[error("Park distance {distance} is below the far threshold {minimum}")]
    ParkDistanceTooSmall {
        /// Requested distance
        distance: f32,
        /// Smallest accepted distance
        minimum: f32,
    },

    /// The host could not construct a drawable for a batch
    #[error("Backend failed to allocate batch {batch}: {reason}")]
    BackendAllocation {
        /// Index of the batch being allocated
        batch: usize,
        /// Reason reported by the host
        reason: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
