//! Error Types
//!
//! Every failure in the trainer is fatal for the run that hit it: there are no
//! retries and no partial recovery. A `train_step` that returns an error has
//! not touched any parameter.
//!
//! Numeric degeneracy in the loss (a true-class probability of exactly zero)
//! is deliberately *not* an error. It is reported through `tracing::warn!`
//! and the `degenerate` flag on [`LossOutput`](crate::layers::LossOutput).

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum Error {
    /// `backward` was called on a layer that never ran a training-mode forward
    #[error("{layer}: no cached input to back-propagate through")]
    NoCachedInput { layer: &'static str },

    /// A batch or label vector disagrees with the network's dimensions
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A batch with no rows was passed to the network
    #[error("empty batch")]
    EmptyBatch,

    /// A class label falls outside `[0, num_classes)`
    #[error("label {label} at row {index} is outside [0, {num_classes})")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    /// Invalid network or training configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error (checkpoints, CSV logs, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
