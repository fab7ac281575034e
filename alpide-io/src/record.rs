//! Persisted hit records and the sink interface.
//!
//! Only the chip, pixel position, bunch counter and trigger time of a hit
//! are persisted. Region, double column, address and quality flag stay with
//! the decoder.

use crate::Result;
use alpide_core::{Hit, PixelHit, TriggerTime};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of one record in the binary output format.
pub const RECORD_SIZE: usize = 28;

/// Flat projection of a [`PixelHit`] for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitRecord {
    pub board_index: u32,
    pub chip_id: u32,
    pub row: u32,
    pub column: u32,
    pub bunch_counter: u32,
    pub trigger_hi: u32,
    pub trigger_lo: u32,
}

impl From<&PixelHit> for HitRecord {
    fn from(hit: &PixelHit) -> Self {
        let time = hit.trigger_time();
        Self {
            board_index: hit.board_index(),
            chip_id: hit.chip_id(),
            row: hit.row(),
            column: hit.column(),
            bunch_counter: hit.bunch_counter(),
            trigger_hi: time.hi,
            trigger_lo: time.lo,
        }
    }
}

impl HitRecord {
    /// Serializes the record as seven little-endian `u32`s.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        let fields = [
            self.board_index,
            self.chip_id,
            self.row,
            self.column,
            self.bunch_counter,
            self.trigger_hi,
            self.trigger_lo,
        ];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }
}

impl Hit for HitRecord {
    #[inline]
    fn chip_id(&self) -> u32 {
        self.chip_id
    }

    #[inline]
    fn row(&self) -> u32 {
        self.row
    }

    #[inline]
    fn column(&self) -> u32 {
        self.column
    }

    #[inline]
    fn trigger_time(&self) -> TriggerTime {
        TriggerTime::new(self.trigger_hi, self.trigger_lo)
    }
}

/// Which hits a sink persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecordFilter {
    /// Every hit, whatever its quality flag.
    #[default]
    All,
    /// Only hits flagged ok.
    SkipCorrupted,
}

impl RecordFilter {
    /// Returns true if `hit` passes the filter.
    #[inline]
    #[must_use]
    pub fn accepts(self, hit: &PixelHit) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::SkipCorrupted => !hit.is_corrupted(),
        }
    }
}

/// Destination for decoded hits.
pub trait HitSink {
    /// Filter applied by [`HitSink::fill`].
    fn filter(&self) -> RecordFilter;

    /// Persists one record unconditionally.
    ///
    /// # Errors
    /// Returns an error if the underlying storage fails.
    fn write_record(&mut self, record: &HitRecord) -> Result<()>;

    /// Flushes everything written so far.
    ///
    /// # Errors
    /// Returns an error if the underlying storage fails.
    fn finish(&mut self) -> Result<()>;

    /// Persists `hit` if it passes the filter. Returns whether it was written.
    ///
    /// # Errors
    /// Returns an error if the underlying storage fails.
    fn fill(&mut self, hit: &PixelHit) -> Result<bool> {
        if !self.filter().accepts(hit) {
            return Ok(false);
        }
        self.write_record(&HitRecord::from(hit))?;
        Ok(true)
    }

    /// Persists every hit that passes the filter. Returns the number written.
    ///
    /// # Errors
    /// Returns an error if the underlying storage fails.
    fn fill_all(&mut self, hits: &[PixelHit]) -> Result<usize> {
        let mut written = 0;
        for hit in hits {
            if self.fill(hit)? {
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Sink that keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    filter: RecordFilter,
    records: Vec<HitRecord>,
}

impl MemorySink {
    /// Creates an empty sink with the given filter.
    #[must_use]
    pub fn new(filter: RecordFilter) -> Self {
        Self {
            filter,
            records: Vec::new(),
        }
    }

    /// Records collected so far.
    #[must_use]
    pub fn records(&self) -> &[HitRecord] {
        &self.records
    }

    /// Consumes the sink, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<HitRecord> {
        self.records
    }
}

impl HitSink for MemorySink {
    fn filter(&self) -> RecordFilter {
        self.filter
    }

    fn write_record(&mut self, record: &HitRecord) -> Result<()> {
        self.records.push(*record);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpide_core::QualityFlag;

    fn hit(address: u32, flag: QualityFlag) -> PixelHit {
        let mut hit = PixelHit::new();
        hit.set_board_index(2);
        hit.set_chip_id(4);
        hit.set_region(1);
        hit.set_double_column(3);
        hit.set_address(address);
        hit.set_trigger_time(TriggerTime::new(9, 10));
        hit.set_quality_flag(flag);
        hit
    }

    #[test]
    fn test_projection() {
        let record = HitRecord::from(&hit(6, QualityFlag::Ok));
        assert_eq!(record.board_index, 2);
        assert_eq!(record.chip_id, 4);
        assert_eq!(record.column, 19 * 2 + 1);
        assert_eq!(record.row, 3);
        assert_eq!(record.trigger_time(), TriggerTime::new(9, 10));
    }

    #[test]
    fn test_record_bytes() {
        let record = HitRecord::from(&hit(6, QualityFlag::Ok));
        let bytes = record.to_le_bytes();
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &4u32.to_le_bytes());
        assert_eq!(&bytes[24..28], &10u32.to_le_bytes());
    }

    #[test]
    fn test_persist_everything_by_default() {
        let hits = [hit(1, QualityFlag::Ok), hit(1, QualityFlag::Stuck)];
        let mut sink = MemorySink::default();
        assert_eq!(sink.fill_all(&hits).unwrap(), 2);
        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn test_skip_corrupted() {
        let hits = [
            hit(1, QualityFlag::Ok),
            hit(1, QualityFlag::Stuck),
            hit(2, QualityFlag::BadAddress),
        ];
        let mut sink = MemorySink::new(RecordFilter::SkipCorrupted);
        assert_eq!(sink.fill_all(&hits).unwrap(), 1);
        assert!(!sink.fill(&hits[1]).unwrap());
        sink.finish().unwrap();
        assert_eq!(sink.into_records().len(), 1);
    }
}
