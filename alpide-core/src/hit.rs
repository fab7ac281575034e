//! Pixel hit entity and quality flags.

use crate::geometry::{
    self, PixelCoord, ILLEGAL_CHIP_ID, MAX_ADDRESS, MAX_CHIP_ID, MAX_DCOL, MAX_REGION, NO_REGION,
};
use crate::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Quality flag attached to every decoded hit.
///
/// A hit carries a single flag. When several problems are found the check
/// that runs last decides the stored value. The numeric value doubles as the
/// corruption predicate: anything other than [`QualityFlag::Ok`] is corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum QualityFlag {
    /// Passed every check.
    Ok = 0,
    /// Chip id outside 0..=14.
    BadChipId = 1,
    /// Region outside 0..=31.
    BadRegionId = 2,
    /// Double column outside 0..=511.
    BadDoubleColumn = 3,
    /// Address outside 0..=1023.
    BadAddress = 4,
    /// Repeated or regressing address in the same double column.
    Stuck = 5,
    /// Pixel known not to respond.
    Dead = 6,
    /// Pixel responding below the expected rate.
    Inefficient = 7,
    /// Pixel responding above the expected rate.
    Hot = 8,
    /// Not validated yet.
    #[default]
    Unset = 9,
}

impl QualityFlag {
    /// All flags in numeric order.
    pub const ALL: [QualityFlag; 10] = [
        QualityFlag::Ok,
        QualityFlag::BadChipId,
        QualityFlag::BadRegionId,
        QualityFlag::BadDoubleColumn,
        QualityFlag::BadAddress,
        QualityFlag::Stuck,
        QualityFlag::Dead,
        QualityFlag::Inefficient,
        QualityFlag::Hot,
        QualityFlag::Unset,
    ];

    /// Returns the raw flag value.
    #[inline]
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns true for every flag except [`QualityFlag::Ok`].
    #[inline]
    #[must_use]
    pub fn is_corrupted(self) -> bool {
        self != QualityFlag::Ok
    }

    /// Short lowercase name used in logs and summaries.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            QualityFlag::Ok => "ok",
            QualityFlag::BadChipId => "bad_chip_id",
            QualityFlag::BadRegionId => "bad_region_id",
            QualityFlag::BadDoubleColumn => "bad_double_column",
            QualityFlag::BadAddress => "bad_address",
            QualityFlag::Stuck => "stuck",
            QualityFlag::Dead => "dead",
            QualityFlag::Inefficient => "inefficient",
            QualityFlag::Hot => "hot",
            QualityFlag::Unset => "unset",
        }
    }
}

impl TryFrom<u8> for QualityFlag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        QualityFlag::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(Error::InvalidQualityFlag(value))
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trigger timestamp supplied by the readout board, split in two 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerTime {
    /// Upper 32 bits.
    pub hi: u32,
    /// Lower 32 bits.
    pub lo: u32,
}

impl TriggerTime {
    /// Creates a trigger time from its two halves.
    #[inline]
    #[must_use]
    pub fn new(hi: u32, lo: u32) -> Self {
        Self { hi, lo }
    }

    /// Splits a 64-bit timestamp.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_u64(value: u64) -> Self {
        Self {
            hi: (value >> 32) as u32,
            lo: value as u32,
        }
    }

    /// Returns the full 64-bit timestamp.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        (u64::from(self.hi) << 32) | u64::from(self.lo)
    }
}

/// Trait for anything that can be placed on the chip matrix.
///
/// Implemented by decoded hits and by their persisted projections so sinks
/// and summaries can work on either.
pub trait Hit {
    /// Chip the hit belongs to.
    fn chip_id(&self) -> u32;

    /// Pixel row.
    fn row(&self) -> u32;

    /// Pixel column.
    fn column(&self) -> u32;

    /// Trigger time of the event the hit was read out in.
    fn trigger_time(&self) -> TriggerTime;

    /// Returns the pixel coordinate of the hit.
    #[inline]
    fn coord(&self) -> PixelCoord {
        PixelCoord::new(self.column(), self.row())
    }
}

/// A single responding pixel decoded from the data stream.
///
/// Setters validate their input and record a bad flag on out-of-range
/// values; the value itself is stored as given. Getters never log, use
/// [`PixelHit::log_diagnostics`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelHit {
    board_index: u32,
    chip_id: u32,
    region: u32,
    double_column: u32,
    address: u32,
    flag: QualityFlag,
    bunch_counter: u32,
    trigger_time: TriggerTime,
}

impl Default for PixelHit {
    fn default() -> Self {
        Self {
            board_index: 0,
            chip_id: ILLEGAL_CHIP_ID,
            region: NO_REGION,
            double_column: 0,
            address: 0,
            flag: QualityFlag::Unset,
            bunch_counter: 0,
            trigger_time: TriggerTime::default(),
        }
    }
}

impl PixelHit {
    /// Creates an unvalidated hit with sentinel chip id and region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chip id, flagging ids outside 0..=14.
    pub fn set_chip_id(&mut self, value: u32) {
        if value > MAX_CHIP_ID {
            self.flag = QualityFlag::BadChipId;
        }
        self.chip_id = value;
    }

    /// Sets the region, flagging regions above 31.
    pub fn set_region(&mut self, value: u32) {
        if value > MAX_REGION {
            self.flag = QualityFlag::BadRegionId;
        }
        self.region = value;
    }

    /// Sets the double column from the encoder id within the current region.
    ///
    /// Must be called after [`PixelHit::set_region`].
    pub fn set_double_column(&mut self, encoder_id: u32) {
        let dcol = geometry::double_column(self.region, encoder_id);
        if dcol > MAX_DCOL {
            self.flag = QualityFlag::BadDoubleColumn;
        }
        self.double_column = dcol;
    }

    /// Sets the address, flagging addresses above 1023.
    pub fn set_address(&mut self, value: u32) {
        if value > MAX_ADDRESS {
            self.flag = QualityFlag::BadAddress;
        }
        self.address = value;
    }

    /// Overwrites the quality flag.
    #[inline]
    pub fn set_quality_flag(&mut self, flag: QualityFlag) {
        self.flag = flag;
    }

    /// Resolves a flag nobody objected to into [`QualityFlag::Ok`].
    #[inline]
    pub fn finalize_flag(&mut self) {
        if self.flag == QualityFlag::Unset {
            self.flag = QualityFlag::Ok;
        }
    }

    /// Sets the readout board index. Informational, never validated.
    #[inline]
    pub fn set_board_index(&mut self, value: u32) {
        self.board_index = value;
    }

    /// Sets the bunch counter carried from the chip header.
    #[inline]
    pub fn set_bunch_counter(&mut self, value: u32) {
        self.bunch_counter = value;
    }

    /// Sets the caller supplied trigger time.
    #[inline]
    pub fn set_trigger_time(&mut self, time: TriggerTime) {
        self.trigger_time = time;
    }

    /// Readout board index.
    #[inline]
    #[must_use]
    pub fn board_index(&self) -> u32 {
        self.board_index
    }

    /// Region id, [`geometry::NO_REGION`] if none was seen.
    #[inline]
    #[must_use]
    pub fn region(&self) -> u32 {
        self.region
    }

    /// Double column across the chip.
    #[inline]
    #[must_use]
    pub fn double_column(&self) -> u32 {
        self.double_column
    }

    /// Pixel index inside the double column.
    #[inline]
    #[must_use]
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Current quality flag.
    #[inline]
    #[must_use]
    pub fn quality_flag(&self) -> QualityFlag {
        self.flag
    }

    /// Bunch counter, 0 unless decoding it was enabled.
    #[inline]
    #[must_use]
    pub fn bunch_counter(&self) -> u32 {
        self.bunch_counter
    }

    /// Returns true unless the hit is flagged [`QualityFlag::Ok`].
    #[inline]
    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        self.flag.is_corrupted()
    }

    /// Returns true if this hit reports the same `(region, double column)`
    /// as `other`.
    #[inline]
    #[must_use]
    pub fn same_double_column(&self, other: &PixelHit) -> bool {
        self.region == other.region && self.double_column == other.double_column
    }

    /// Emits a warning for every field that is out of range and for any
    /// flag other than ok. Purely observational.
    pub fn log_diagnostics(&self) {
        if self.chip_id > MAX_CHIP_ID {
            log::warn!("illegal chip id {} ({})", self.chip_id, self);
        }
        if self.region > MAX_REGION {
            log::warn!("region {} > {} ({})", self.region, MAX_REGION, self);
        }
        if self.double_column > MAX_DCOL {
            log::warn!(
                "double column {} > {} ({})",
                self.double_column,
                MAX_DCOL,
                self
            );
        }
        if self.address > MAX_ADDRESS {
            log::warn!("address {} > {} ({})", self.address, MAX_ADDRESS, self);
        }
        if matches!(self.flag, QualityFlag::BadAddress | QualityFlag::BadDoubleColumn) {
            log::warn!("row/column of {} are probably meaningless", self);
        }
        if self.flag.is_corrupted() {
            log::warn!("pixel flagged {}: {}", self.flag, self);
        }
    }
}

impl Hit for PixelHit {
    #[inline]
    fn chip_id(&self) -> u32 {
        self.chip_id
    }

    #[inline]
    fn row(&self) -> u32 {
        geometry::row(self.address)
    }

    #[inline]
    fn column(&self) -> u32 {
        geometry::column(self.double_column, self.address)
    }

    #[inline]
    fn trigger_time(&self) -> TriggerTime {
        self.trigger_time
    }
}

impl fmt::Display for PixelHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "board {} | time {:#x} | chip {} | region {} | dcol {} | address {}",
            self.board_index,
            self.trigger_time.as_u64(),
            self.chip_id,
            self.region,
            self.double_column,
            self.address
        )
    }
}
