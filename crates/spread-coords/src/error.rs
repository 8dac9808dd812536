//! Error types for the coordinate/array kernel.

use thiserror::Error;

/// Errors that can occur while building or operating on a `Field`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Axes or auxiliary coordinate arrays don't form a valid regular or
    /// projected grid per the `Field` definition.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// An axis or array argument had a shape that can't be reconciled
    /// with the rest of the field.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

impl KernelError {
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
