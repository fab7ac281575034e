//! Decoder error types.

use thiserror::Error;

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Word seen in a framing state where it is not allowed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingViolation {
    #[error("chip trailer found before chip header")]
    TrailerBeforeHeader,

    #[error("chip trailer found after event was finished")]
    TrailerAfterFinished,

    #[error("region header found before chip header")]
    RegionBeforeHeader,

    #[error("hit data found before chip header")]
    DataBeforeHeader,
}

/// Decoder error types.
///
/// Every variant except the configuration ones means the event buffer could
/// not be framed. Per-hit problems never show up here; they are carried as
/// quality flags on the hits.
#[derive(Error, Debug)]
pub enum Error {
    /// Trailer, region header or data word in an illegal framing state.
    #[error("framing error at byte {offset}: {violation}")]
    Framing {
        violation: FramingViolation,
        offset: usize,
    },

    /// Byte that matches no word kind. Aborts the event immediately.
    #[error("data of unknown type {byte:#04x} at byte {offset}")]
    UnknownWord { byte: u8, offset: usize },

    /// Buffer ended inside an open event.
    #[error("event not finished at end of data (chip {chip_id}), last byte was {last_byte:#04x}, event length = {length}")]
    IncompleteEvent {
        chip_id: u32,
        last_byte: u8,
        length: usize,
    },

    /// Buffer ended without a chip header or empty frame.
    #[error("event not started at end of data, event length = {length}")]
    NoEventStart { length: usize },

    /// Invalid decoder configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short label of the error kind, stable across offsets and values.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Error::Framing { .. } => "framing",
            Error::UnknownWord { .. } => "unknown_word",
            Error::IncompleteEvent { .. } => "incomplete_event",
            Error::NoEventStart { .. } => "no_event_start",
            Error::Config(_) => "config",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
        }
    }
}
