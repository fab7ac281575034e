//! Memory-mapped capture file readers.
//!
//! A capture file is a plain sequence of event frames:
//!
//! ```text
//!   u32 LE payload length | u32 LE trigger hi | u32 LE trigger lo | payload
//! ```
//!
//! Each payload is one event buffer as read from the board link, ready for
//! [`alpide_decoder::AlpideDecoder::decode_event`].

use crate::{Error, Result};
use alpide_core::TriggerTime;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 12;

/// Largest accepted event payload, the size of the board readout buffer.
pub const MAX_EVENT_BYTES: usize = 1 << 24;

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Arc<Mmap>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap: Arc::new(mmap),
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Returns the path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One event buffer from a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFrame<'a> {
    /// Position of the frame in the capture.
    pub index: usize,
    /// Byte offset of the frame header.
    pub offset: usize,
    /// Trigger time recorded with the event.
    pub trigger_time: TriggerTime,
    /// Raw event bytes.
    pub payload: &'a [u8],
}

/// Iterator over the frames of an in-memory capture.
///
/// Yields one error and stops if a frame is truncated or oversized.
#[derive(Debug, Clone)]
pub struct CaptureFrames<'a> {
    data: &'a [u8],
    offset: usize,
    index: usize,
    failed: bool,
}

impl<'a> CaptureFrames<'a> {
    /// Creates an iterator over the frames in `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            index: 0,
            failed: false,
        }
    }

    fn read_u32(&self, at: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[at..at + 4]);
        u32::from_le_bytes(bytes)
    }

    fn fail(&mut self, message: String) -> Option<Result<EventFrame<'a>>> {
        self.failed = true;
        Some(Err(Error::InvalidFormat(message)))
    }
}

impl<'a> Iterator for CaptureFrames<'a> {
    type Item = Result<EventFrame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let remaining = self.data.len() - self.offset;
        if remaining < FRAME_HEADER_SIZE {
            return self.fail(format!(
                "truncated frame header at byte {} ({} of {} bytes)",
                self.offset, remaining, FRAME_HEADER_SIZE
            ));
        }

        let length = self.read_u32(self.offset) as usize;
        if length > MAX_EVENT_BYTES {
            return self.fail(format!(
                "frame {} at byte {} declares {} bytes, more than the {} byte limit",
                self.index, self.offset, length, MAX_EVENT_BYTES
            ));
        }

        let start = self.offset + FRAME_HEADER_SIZE;
        let Some(payload) = self.data.get(start..start + length) else {
            return self.fail(format!(
                "truncated frame {} at byte {}: {} payload bytes declared, {} present",
                self.index,
                self.offset,
                length,
                self.data.len() - start
            ));
        };

        let frame = EventFrame {
            index: self.index,
            offset: self.offset,
            trigger_time: TriggerTime::new(
                self.read_u32(self.offset + 4),
                self.read_u32(self.offset + 8),
            ),
            payload,
        };
        self.offset = start + length;
        self.index += 1;
        Some(Ok(frame))
    }
}

/// A capture file reader with memory-mapped I/O.
pub struct CaptureReader {
    reader: MappedFileReader,
}

impl CaptureReader {
    /// Opens a capture file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self { reader })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Returns the path of the capture.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Returns an iterator over the frames of the capture.
    #[must_use]
    pub fn frames(&self) -> CaptureFrames<'_> {
        CaptureFrames::new(self.reader.as_bytes())
    }

    /// Reads all frames.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if any frame is truncated or oversized.
    pub fn read_frames(&self) -> Result<Vec<EventFrame<'_>>> {
        self.frames().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::encode_frame;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mapped_file_reader() {
        let mut file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..64).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 64);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &data[..]);
        assert_eq!(reader.path(), file.path());
    }

    #[test]
    fn test_frames_in_memory() {
        let mut data = Vec::new();
        encode_frame(TriggerTime::new(1, 2), &[0xe0, 0x00], &mut data).unwrap();
        encode_frame(TriggerTime::new(3, 4), &[], &mut data).unwrap();
        encode_frame(TriggerTime::new(5, 6), &[0xa0, 0x00, 0xb0], &mut data).unwrap();

        let frames: Vec<_> = CaptureFrames::new(&data)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].trigger_time, TriggerTime::new(1, 2));
        assert_eq!(frames[0].payload, &[0xe0, 0x00]);
        assert!(frames[1].payload.is_empty());
        assert_eq!(frames[2].index, 2);
        assert_eq!(frames[2].offset, 14 + 12);
        assert_eq!(frames[2].payload, &[0xa0, 0x00, 0xb0]);
    }

    #[test]
    fn test_truncated_header() {
        let mut data = Vec::new();
        encode_frame(TriggerTime::default(), &[0xe0, 0x00], &mut data).unwrap();
        data.extend_from_slice(&[1, 0, 0]);

        let results: Vec<_> = CaptureFrames::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_truncated_payload() {
        let mut data = Vec::new();
        encode_frame(TriggerTime::default(), &[0xa0, 0x00, 0xb0], &mut data).unwrap();
        data.pop();

        let mut frames = CaptureFrames::new(&data);
        let err = frames.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("truncated frame 0"));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_oversized_frame() {
        let mut data = Vec::new();
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);

        let mut frames = CaptureFrames::new(&data);
        assert!(frames.next().unwrap().is_err());
    }

    #[test]
    fn test_capture_reader() {
        let mut file = NamedTempFile::new().unwrap();
        let mut data = Vec::new();
        encode_frame(TriggerTime::new(0, 7), &[0xe1, 0x00], &mut data).unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = CaptureReader::open(file.path()).unwrap();
        assert_eq!(reader.file_size(), 14);
        let frames = reader.read_frames().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].trigger_time.lo, 7);
    }

    #[test]
    fn test_capture_reader_empty() {
        let file = NamedTempFile::new().unwrap();
        let reader = CaptureReader::open(file.path()).unwrap();
        assert_eq!(reader.file_size(), 0);
        assert!(reader.read_frames().unwrap().is_empty());
    }
}
