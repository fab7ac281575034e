//! ALPIDE data word kinds.
//!
//! Every word is identified by its first byte:
//!
//! ```text
//!   IDLE            1111 1111
//!   BUSY ON         1111 0001
//!   BUSY OFF        1111 0000
//!   CHIP HEADER     1010 <chip id[3:0]>        <bunch counter[10:3]>
//!   CHIP TRAILER    1011 <readout flags[3:0]>
//!   EMPTY FRAME     1110 <chip id[3:0]>        <bunch counter[10:3]>
//!   REGION HEADER   110  <region id[4:0]>
//!   DATA SHORT      01   <encoder id[3:0]> <address[9:0]>
//!   DATA LONG       00   <encoder id[3:0]> <address[9:0]> 0 <hit map[6:0]>
//! ```

use std::fmt;

/// Kind of a data word, decided by its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordKind {
    Idle,
    BusyOn,
    BusyOff,
    EmptyFrame,
    ChipHeader,
    ChipTrailer,
    RegionHeader,
    DataShort,
    DataLong,
    Unknown,
}

impl WordKind {
    /// All kinds, in classification order.
    pub const ALL: [WordKind; 10] = [
        WordKind::Idle,
        WordKind::BusyOn,
        WordKind::BusyOff,
        WordKind::ChipHeader,
        WordKind::ChipTrailer,
        WordKind::EmptyFrame,
        WordKind::RegionHeader,
        WordKind::DataShort,
        WordKind::DataLong,
        WordKind::Unknown,
    ];

    /// Classifies the first byte of a word.
    ///
    /// The patterns overlap; they are told apart only by mask width and the
    /// order of the checks, so the order below must not change.
    #[inline]
    #[must_use]
    pub fn classify(byte: u8) -> Self {
        if byte == 0xff {
            WordKind::Idle
        } else if byte == 0xf1 {
            WordKind::BusyOn
        } else if byte == 0xf0 {
            WordKind::BusyOff
        } else if byte & 0xf0 == 0xa0 {
            WordKind::ChipHeader
        } else if byte & 0xf0 == 0xb0 {
            WordKind::ChipTrailer
        } else if byte & 0xf0 == 0xe0 {
            WordKind::EmptyFrame
        } else if byte & 0xe0 == 0xc0 {
            WordKind::RegionHeader
        } else if byte & 0xc0 == 0x40 {
            WordKind::DataShort
        } else if byte & 0xc0 == 0x00 {
            WordKind::DataLong
        } else {
            WordKind::Unknown
        }
    }

    /// Length of the word in bytes.
    #[inline]
    #[must_use]
    pub fn length(self) -> usize {
        match self {
            WordKind::DataLong => 3,
            WordKind::DataShort | WordKind::ChipHeader | WordKind::EmptyFrame => 2,
            _ => 1,
        }
    }

    /// Returns true for the two data word kinds.
    #[inline]
    #[must_use]
    pub fn is_data(self) -> bool {
        matches!(self, WordKind::DataShort | WordKind::DataLong)
    }

    /// Returns true for idle and busy fillers.
    #[inline]
    #[must_use]
    pub fn is_filler(self) -> bool {
        matches!(self, WordKind::Idle | WordKind::BusyOn | WordKind::BusyOff)
    }

    /// Short lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WordKind::Idle => "idle",
            WordKind::BusyOn => "busy_on",
            WordKind::BusyOff => "busy_off",
            WordKind::EmptyFrame => "empty_frame",
            WordKind::ChipHeader => "chip_header",
            WordKind::ChipTrailer => "chip_trailer",
            WordKind::RegionHeader => "region_header",
            WordKind::DataShort => "data_short",
            WordKind::DataLong => "data_long",
            WordKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies a single byte. Shorthand for [`WordKind::classify`].
#[inline]
#[must_use]
pub fn classify(byte: u8) -> WordKind {
    WordKind::classify(byte)
}

/// Iterator splitting a buffer into `(offset, kind, word)` triples.
///
/// Stops at the first word whose declared length runs past the end of the
/// buffer. Does not check framing, see [`crate::AlpideDecoder`] for that.
#[derive(Debug, Clone)]
pub struct Words<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Words<'a> {
    /// Creates an iterator over the words of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes not yet consumed. Non-empty after iteration ends only when the
    /// last word was truncated.
    #[must_use]
    pub fn remainder(&self) -> &'a [u8] {
        &self.data[self.offset.min(self.data.len())..]
    }
}

impl<'a> Iterator for Words<'a> {
    type Item = (usize, WordKind, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let lead = *self.data.get(self.offset)?;
        let kind = WordKind::classify(lead);
        let word = self.data.get(self.offset..self.offset + kind.length())?;
        let offset = self.offset;
        self.offset += word.len();
        Some((offset, kind, word))
    }
}
