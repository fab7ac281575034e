//! Capture and hit file writers.

use crate::record::{HitRecord, HitSink, RecordFilter};
use crate::reader::{FRAME_HEADER_SIZE, MAX_EVENT_BYTES};
use crate::{Error, Result};
use alpide_core::TriggerTime;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Records written between automatic flushes of a [`HitFileWriter`].
pub const AUTO_SAVE_INTERVAL: u64 = 10_000;

const CSV_HEADER: &str = "board,chip_id,row,col,bunch,t_hi,t_lo";

/// Appends one capture frame to `out`.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] if the payload exceeds [`MAX_EVENT_BYTES`];
/// `out` is left untouched in that case.
pub fn encode_frame(trigger_time: TriggerTime, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|_| payload.len() <= MAX_EVENT_BYTES)
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "event of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_EVENT_BYTES
            ))
        })?;
    out.reserve(FRAME_HEADER_SIZE + payload.len());
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(&trigger_time.hi.to_le_bytes());
    out.extend_from_slice(&trigger_time.lo.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// Writer for capture files readable by [`crate::CaptureReader`].
pub struct CaptureWriter<W: Write> {
    writer: W,
    events: u64,
}

impl CaptureWriter<BufWriter<File>> {
    /// Creates a capture file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> CaptureWriter<W> {
    /// Wraps an existing writer.
    pub fn new(writer: W) -> Self {
        Self { writer, events: 0 }
    }

    /// Appends one event buffer.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the payload exceeds
    /// [`MAX_EVENT_BYTES`], or an I/O error.
    pub fn write_event(&mut self, trigger_time: TriggerTime, payload: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        encode_frame(trigger_time, payload, &mut frame)?;
        self.writer.write_all(&frame)?;
        self.events += 1;
        Ok(())
    }

    /// Number of events written.
    pub fn events_written(&self) -> u64 {
        self.events
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Encoding of a hit output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One comma separated line per hit, with a header line.
    #[default]
    Csv,
    /// Fixed 28 byte little-endian records.
    Binary,
}

impl OutputFormat {
    /// Picks the format from a file extension: `bin` is binary, anything
    /// else is CSV.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => Self::Binary,
            _ => Self::Csv,
        }
    }
}

/// Hit sink writing CSV or binary records to a file.
///
/// The file is flushed every [`AUTO_SAVE_INTERVAL`] records by default (see
/// [`HitFileWriter::with_auto_save`]) so a crashed run keeps most of its output.
pub struct HitFileWriter<W: Write = BufWriter<File>> {
    writer: W,
    format: OutputFormat,
    filter: RecordFilter,
    records: u64,
    auto_save: u64,
    header_written: bool,
}

impl HitFileWriter {
    /// Creates a hit file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: OutputFormat,
        filter: RecordFilter,
    ) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), format, filter))
    }
}

impl<W: Write> HitFileWriter<W> {
    /// Wraps an existing writer.
    pub fn new(writer: W, format: OutputFormat, filter: RecordFilter) -> Self {
        Self {
            writer,
            format,
            filter,
            records: 0,
            auto_save: AUTO_SAVE_INTERVAL,
            header_written: false,
        }
    }

    /// Flushes every `interval` records. Zero keeps the current interval.
    #[must_use]
    pub fn with_auto_save(mut self, interval: u64) -> Self {
        if interval > 0 {
            self.auto_save = interval;
        } else {
            log::warn!("ignoring auto-save interval 0, keeping {}", self.auto_save);
        }
        self
    }

    /// Records between automatic flushes.
    pub fn auto_save(&self) -> u64 {
        self.auto_save
    }

    /// Output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of records written.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    fn write_header(&mut self) -> Result<()> {
        if self.format == OutputFormat::Csv && !self.header_written {
            writeln!(self.writer, "{CSV_HEADER}")?;
        }
        self.header_written = true;
        Ok(())
    }

    /// Finishes and returns the inner writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.writer)
    }
}

impl<W: Write> HitSink for HitFileWriter<W> {
    fn filter(&self) -> RecordFilter {
        self.filter
    }

    fn write_record(&mut self, record: &HitRecord) -> Result<()> {
        self.write_header()?;
        match self.format {
            OutputFormat::Csv => writeln!(
                self.writer,
                "{},{},{},{},{},{},{}",
                record.board_index,
                record.chip_id,
                record.row,
                record.column,
                record.bunch_counter,
                record.trigger_hi,
                record.trigger_lo
            )?,
            OutputFormat::Binary => self.writer.write_all(&record.to_le_bytes())?,
        }
        self.records += 1;
        if self.records % self.auto_save == 0 {
            log::debug!("auto-save after {} records", self.records);
            self.writer.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.write_header()?;
        self.writer.flush()?;
        Ok(())
    }
}
