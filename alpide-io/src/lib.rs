//! alpide-io: capture files, batch decoding and hit output.
//!
//! Captures are memory-mapped via memmap2 and split into event frames.
//! [`BatchDecoder`] decodes a slice of frames on the rayon pool and hands
//! the hits to any [`HitSink`], such as the CSV or binary [`HitFileWriter`].
//!
//! ```
//! use alpide_io::{BatchDecoder, CaptureFrames, MemorySink};
//! use alpide_io::writer::encode_frame;
//! use alpide_core::TriggerTime;
//!
//! let mut capture = Vec::new();
//! encode_frame(TriggerTime::new(0, 1), &[0xa1, 0x00, 0xc2, 0x40, 0x05, 0xb0], &mut capture)?;
//!
//! let frames = CaptureFrames::new(&capture).collect::<alpide_io::Result<Vec<_>>>()?;
//! let mut sink = MemorySink::default();
//! let summary = BatchDecoder::default().decode_into(&frames, &mut sink)?;
//! assert_eq!(summary.hits, 1);
//! assert_eq!(sink.records()[0].chip_id, 1);
//! # Ok::<(), alpide_io::Error>(())
//! ```

mod batch;
mod error;
mod reader;
mod record;
pub mod writer;

pub use batch::{decode_frames, BatchDecoder, DecodeSummary, EventOutcome};
pub use error::{Error, Result};
pub use reader::{
    CaptureFrames, CaptureReader, EventFrame, MappedFileReader, FRAME_HEADER_SIZE, MAX_EVENT_BYTES,
};
pub use record::{HitRecord, HitSink, MemorySink, RecordFilter, RECORD_SIZE};
pub use writer::{CaptureWriter, HitFileWriter, OutputFormat, AUTO_SAVE_INTERVAL};
