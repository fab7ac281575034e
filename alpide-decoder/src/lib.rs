//! alpide-decoder: ALPIDE data word classifier and event decoder.
//!
//! This crate turns the byte stream read out from one ALPIDE chip into
//! validated [`PixelHit`]s.
//!
//! # Key Components
//!
//! - [`WordKind`] - Classifies a data word from its first byte
//! - [`Words`] - Splits a buffer into classified words
//! - [`AlpideDecoder`] - Event framing state machine, cluster expansion and
//!   duplicate detection
//! - [`DecoderConfig`] - Board index, hit list handling, bunch counter switch
//!
//! # Decoding an event
//!
//! ```
//! use alpide_decoder::{AlpideDecoder, TriggerTime};
//!
//! // chip header (chip 1), region 4, one hit at encoder 2 / address 9, trailer
//! let event = [0xa1, 0x00, 0xc4, 0x48, 0x09, 0xb0];
//!
//! let mut decoder = AlpideDecoder::new();
//! let status = decoder.decode_event(&event, TriggerTime::new(0, 42)).unwrap();
//! assert!(!status.corrupt);
//!
//! let hits = decoder.take_hits();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].double_column(), 2 + 4 * 16);
//! ```

pub mod config;
mod decoder;
mod error;
pub mod word;

pub use config::{DecoderConfig, HitRetention};
pub use decoder::{AlpideDecoder, EventStatus, NO_CHIP_ID};
pub use error::{Error, FramingViolation, Result};
pub use word::{classify, WordKind, Words};

// Re-export core types for convenience
pub use alpide_core::{Hit, PixelHit, QualityFlag, TriggerTime};
