//! Decoder configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// What happens to previously decoded hits when a new event is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitRetention {
    /// Hits pile up across calls until the caller drains them with
    /// [`crate::AlpideDecoder::take_hits`] or [`crate::AlpideDecoder::clear_hits`].
    #[default]
    Accumulate,
    /// The hit list is cleared at the start of every decoded event.
    PerEvent,
}

/// Configuration for [`crate::AlpideDecoder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Index of the readout board, copied onto every hit.
    pub board_index: u32,
    /// Initial capacity of the hit list.
    pub hit_capacity: usize,
    /// Hit list handling between events.
    pub retention: HitRetention,
    /// Decode the bunch counter carried by chip headers and empty frames.
    pub decode_bunch_counter: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            board_index: 0,
            hit_capacity: 2048,
            retention: HitRetention::Accumulate,
            decode_bunch_counter: false,
        }
    }
}

#[derive(Deserialize)]
struct JsonConfig {
    #[serde(default)]
    decoder: DecoderConfig,
}

/// Largest accepted initial hit capacity (one full chip worth of pixels).
const MAX_HIT_CAPACITY: usize = 1 << 19;

impl DecoderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the board index.
    #[must_use]
    pub fn with_board_index(mut self, board_index: u32) -> Self {
        self.board_index = board_index;
        self
    }

    /// Sets the initial hit list capacity.
    #[must_use]
    pub fn with_hit_capacity(mut self, capacity: usize) -> Self {
        self.hit_capacity = capacity;
        self
    }

    /// Sets the retention policy.
    #[must_use]
    pub fn with_retention(mut self, retention: HitRetention) -> Self {
        self.retention = retention;
        self
    }

    /// Enables or disables bunch counter decoding.
    #[must_use]
    pub fn with_bunch_counter(mut self, enabled: bool) -> Self {
        self.decode_bunch_counter = enabled;
        self
    }

    /// Load configuration from a JSON file.
    ///
    /// The file holds a `decoder` object; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// the resulting configuration fails [`DecoderConfig::validate`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        json_config.decoder.validate()?;
        Ok(json_config.decoder)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Same as [`DecoderConfig::from_file`].
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        json_config.decoder.validate()?;
        Ok(json_config.decoder)
    }

    /// Checks the configuration for values the decoder cannot honor.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the hit capacity exceeds one chip.
    pub fn validate(&self) -> Result<()> {
        if self.hit_capacity > MAX_HIT_CAPACITY {
            return Err(Error::Config(format!(
                "hit_capacity {} exceeds the pixel count of a chip ({})",
                self.hit_capacity, MAX_HIT_CAPACITY
            )));
        }
        Ok(())
    }
}
