//! Error types for alpide-core.

use thiserror::Error;

/// Result type alias for alpide-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Pixel position outside the chip matrix.
    #[error("invalid pixel coordinate: column {column}, row {row}")]
    InvalidCoordinate { column: u32, row: u32 },

    /// Raw value that does not name a quality flag.
    #[error("invalid quality flag value: {0}")]
    InvalidQualityFlag(u8),
}
