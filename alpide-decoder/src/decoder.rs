//! Event framing state machine.
//!
//! [`AlpideDecoder::decode_event`] walks one event buffer word by word:
//!
//! ```text
//!                 chip header
//!   not started ---------------> open <------+
//!        |                        |  ^       | region header / data
//!        | empty frame            |  +-------+
//!        v                        | chip trailer / empty frame
//!      closed <-------------------+
//! ```
//!
//! Region headers and data words need a started event. Unknown bytes abort
//! immediately; the remaining failures are decided once the buffer is
//! exhausted.

use crate::config::{DecoderConfig, HitRetention};
use crate::error::FramingViolation;
use crate::word::{WordKind, Words};
use crate::{Error, Result};
use alpide_core::geometry::NO_REGION;
use alpide_core::{PixelHit, QualityFlag, TriggerTime};

/// Chip id held by the decoder outside of a chip header/trailer pair.
pub const NO_CHIP_ID: u32 = u32::MAX;

/// Outcome of a successfully framed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventStatus {
    /// At least one hit decoded from this buffer is flagged.
    pub corrupt: bool,
    /// Number of hits appended by this call.
    pub hits: usize,
    /// Readout flags of the last chip trailer, 0 if there was none.
    pub readout_flags: u32,
}

/// Decoder for ALPIDE event buffers.
///
/// One decoder serves one reader and is reused across events. Decoded hits
/// are appended to an internal list; whether that list survives between
/// calls is set by [`HitRetention`].
#[derive(Debug, Clone)]
pub struct AlpideDecoder {
    config: DecoderConfig,
    chip_id: u32,
    region: u32,
    readout_flags: u32,
    bunch_counter: u32,
    trigger_time: TriggerTime,
    new_event: bool,
    word_kind: WordKind,
    hits: Vec<PixelHit>,
}

impl Default for AlpideDecoder {
    fn default() -> Self {
        Self::with_config(DecoderConfig::default())
    }
}

impl AlpideDecoder {
    /// Creates a decoder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with the given configuration.
    #[must_use]
    pub fn with_config(config: DecoderConfig) -> Self {
        let hits = Vec::with_capacity(config.hit_capacity);
        Self {
            config,
            chip_id: NO_CHIP_ID,
            region: NO_REGION,
            readout_flags: 0,
            bunch_counter: 0,
            trigger_time: TriggerTime::default(),
            new_event: false,
            word_kind: WordKind::Unknown,
            hits,
        }
    }

    /// Returns the decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Hits decoded so far.
    #[must_use]
    pub fn hits(&self) -> &[PixelHit] {
        &self.hits
    }

    /// Moves all decoded hits out, leaving the list empty.
    pub fn take_hits(&mut self) -> Vec<PixelHit> {
        std::mem::replace(&mut self.hits, Vec::with_capacity(self.config.hit_capacity))
    }

    /// Drops all decoded hits.
    pub fn clear_hits(&mut self) {
        self.hits.clear();
    }

    /// Chip id from the last header, [`NO_CHIP_ID`] after a trailer.
    #[must_use]
    pub fn chip_id(&self) -> u32 {
        self.chip_id
    }

    /// Region from the last region header, 32 if none was seen in this event.
    #[must_use]
    pub fn region(&self) -> u32 {
        self.region
    }

    /// Readout flags from the last chip trailer.
    #[must_use]
    pub fn readout_flags(&self) -> u32 {
        self.readout_flags
    }

    /// True between a chip header and the first region header or data word.
    #[must_use]
    pub fn is_new_event(&self) -> bool {
        self.new_event
    }

    /// Kind of the last word looked at.
    #[must_use]
    pub fn current_word_kind(&self) -> WordKind {
        self.word_kind
    }

    /// Decodes one event buffer.
    ///
    /// Every hit gets `trigger_time`. Hits are appended to [`Self::hits`]
    /// even if the event later fails to frame.
    ///
    /// # Errors
    /// - [`Error::Framing`] for a trailer, region header or data word in an
    ///   illegal state
    /// - [`Error::UnknownWord`] for a byte of no known kind
    /// - [`Error::IncompleteEvent`] if the buffer ends inside an open event
    /// - [`Error::NoEventStart`] if no chip header or empty frame was found
    pub fn decode_event(&mut self, data: &[u8], trigger_time: TriggerTime) -> Result<EventStatus> {
        if self.config.retention == HitRetention::PerEvent {
            self.hits.clear();
        }
        self.readout_flags = 0;
        self.chip_id = NO_CHIP_ID;
        self.region = NO_REGION;
        self.bunch_counter = 0;
        self.trigger_time = trigger_time;
        self.word_kind = WordKind::Unknown;

        let first_hit = self.hits.len();
        let mut started = false;
        let mut finished = false;
        let mut corrupt = false;
        let mut last_byte = 0u8;

        let mut words = Words::new(data);
        for (offset, kind, word) in words.by_ref() {
            self.word_kind = kind;
            last_byte = word[0];

            match kind {
                WordKind::Idle | WordKind::BusyOn | WordKind::BusyOff => {}
                WordKind::EmptyFrame => {
                    started = true;
                    finished = true;
                    self.decode_frame_start(word);
                }
                WordKind::ChipHeader => {
                    started = true;
                    finished = false;
                    self.decode_frame_start(word);
                    self.new_event = true;
                }
                WordKind::ChipTrailer => {
                    if !started {
                        return Err(framing(FramingViolation::TrailerBeforeHeader, offset));
                    }
                    if finished {
                        return Err(framing(FramingViolation::TrailerAfterFinished, offset));
                    }
                    self.readout_flags = u32::from(word[0] & 0x0f);
                    finished = true;
                    self.chip_id = NO_CHIP_ID;
                }
                WordKind::RegionHeader => {
                    if !started {
                        return Err(framing(FramingViolation::RegionBeforeHeader, offset));
                    }
                    self.region = u32::from(word[0] & 0x1f);
                    self.new_event = false;
                }
                WordKind::DataShort | WordKind::DataLong => {
                    if !started {
                        return Err(framing(FramingViolation::DataBeforeHeader, offset));
                    }
                    if self.region == NO_REGION {
                        log::warn!(
                            "data word without region at byte {} (chip {})",
                            offset,
                            self.chip_id
                        );
                    }
                    corrupt |= self.decode_data_word(kind, word);
                }
                WordKind::Unknown => {
                    log::error!("data of unknown type {:#04x} at byte {}", word[0], offset);
                    return Err(Error::UnknownWord {
                        byte: word[0],
                        offset,
                    });
                }
            }
        }

        let truncated = words.remainder();
        if !truncated.is_empty() {
            log::warn!(
                "{} word truncated at end of data ({} of {} bytes present)",
                WordKind::classify(truncated[0]),
                truncated.len(),
                WordKind::classify(truncated[0]).length()
            );
        }

        if started && !finished {
            log::warn!(
                "event not finished at end of data (chip {}), last byte was {:#04x}, event length = {}",
                self.chip_id,
                last_byte,
                data.len()
            );
            return Err(Error::IncompleteEvent {
                chip_id: self.chip_id,
                last_byte,
                length: data.len(),
            });
        }
        if !started {
            log::warn!("event not started at end of data");
            return Err(Error::NoEventStart { length: data.len() });
        }

        Ok(EventStatus {
            corrupt,
            hits: self.hits.len() - first_hit,
            readout_flags: self.readout_flags,
        })
    }

    /// Chip header and empty frame: `1x10 <chip id[3:0]> <bunch counter[10:3]>`.
    fn decode_frame_start(&mut self, word: &[u8]) {
        self.chip_id = u32::from(word[0] & 0x0f);
        if self.config.decode_bunch_counter {
            self.bunch_counter = u32::from(word[1]) << 3;
        }
    }

    /// Decodes a data short or data long word into hits.
    ///
    /// Returns true if any produced hit is corrupted.
    fn decode_data_word(&mut self, kind: WordKind, word: &[u8]) -> bool {
        let field = u16::from_be_bytes([word[0], word[1]]);
        let encoder_id = u32::from((field & 0x3c00) >> 10);
        let address = u32::from(field & 0x03ff);

        let mut base = PixelHit::new();
        base.set_board_index(self.config.board_index);
        base.set_trigger_time(self.trigger_time);
        base.set_bunch_counter(self.bunch_counter);
        base.set_chip_id(self.chip_id);
        base.set_region(self.region);
        base.set_double_column(encoder_id);

        let hit_map = if kind == WordKind::DataLong {
            word[2] & 0x7f
        } else {
            0
        };

        let mut corrupt = self.push_hit(base, address);
        for bit in 0..7 {
            if (hit_map >> bit) & 1 == 1 {
                corrupt |= self.push_hit(base, address + bit + 1);
            }
        }

        self.new_event = false;
        corrupt
    }

    /// Places `base` at `address`, runs the adjacency check against the
    /// previous hit and appends the result.
    fn push_hit(&mut self, base: PixelHit, address: u32) -> bool {
        let mut hit = base;
        hit.set_address(address);

        if !self.new_event {
            if let Some(previous) = self.hits.last_mut() {
                if hit.same_double_column(previous) && hit.address() <= previous.address() {
                    if hit.address() == previous.address() {
                        log::warn!("received a pixel twice");
                    } else {
                        log::warn!(
                            "address of pixel is lower than previous one in same double column"
                        );
                    }
                    hit.set_quality_flag(QualityFlag::Stuck);
                    previous.set_quality_flag(QualityFlag::Stuck);
                    log::debug!("current hit pixel: {}", hit);
                    log::debug!("previous hit pixel: {}", previous);
                }
            }
        }

        hit.finalize_flag();
        let corrupt = hit.is_corrupted();
        if corrupt {
            hit.log_diagnostics();
        }
        self.hits.push(hit);
        corrupt
    }
}

fn framing(violation: FramingViolation, offset: usize) -> Error {
    log::error!("{} (byte {})", violation, offset);
    Error::Framing { violation, offset }
}
