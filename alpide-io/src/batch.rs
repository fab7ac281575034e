//! Batch decoding of capture frames.
//!
//! Frames are independent once each event's hits are drained, so a batch
//! can be spread over the rayon pool. Outcomes always come back in input
//! order.

use crate::reader::EventFrame;
use crate::record::HitSink;
use crate::Result;
use alpide_core::{PixelHit, QualityFlag, TriggerTime};
use alpide_decoder::{AlpideDecoder, DecoderConfig, EventStatus};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

/// Result of decoding one frame.
#[derive(Debug)]
pub struct EventOutcome {
    /// Index of the frame in its capture.
    pub index: usize,
    /// Trigger time of the frame.
    pub trigger_time: TriggerTime,
    /// Framing status, or why the event was rejected.
    pub status: std::result::Result<EventStatus, alpide_decoder::Error>,
    /// Hits decoded from the frame. May be non-empty for a rejected event.
    pub hits: Vec<PixelHit>,
}

impl EventOutcome {
    /// Returns true if the event framed and no hit was flagged.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self.status, Ok(EventStatus { corrupt: false, .. }))
    }
}

/// Decodes batches of frames, in parallel by default.
#[derive(Debug, Clone)]
pub struct BatchDecoder {
    config: DecoderConfig,
    parallel: bool,
}

impl Default for BatchDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl BatchDecoder {
    /// Creates a batch decoder with the given per-event configuration.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            parallel: true,
        }
    }

    /// Enables or disables parallel decoding.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes every frame.
    #[must_use]
    pub fn decode(&self, frames: &[EventFrame<'_>]) -> Vec<EventOutcome> {
        if self.parallel {
            frames
                .par_iter()
                .map_init(
                    || AlpideDecoder::with_config(self.config.clone()),
                    |decoder, frame| decode_frame(decoder, frame),
                )
                .collect()
        } else {
            let mut decoder = AlpideDecoder::with_config(self.config.clone());
            frames
                .iter()
                .map(|frame| decode_frame(&mut decoder, frame))
                .collect()
        }
    }

    /// Decodes every frame and writes the hits to `sink` in frame order.
    ///
    /// # Errors
    /// Returns an error if the sink fails. Rejected events are counted in the
    /// summary, not returned as errors.
    pub fn decode_into<S: HitSink + ?Sized>(
        &self,
        frames: &[EventFrame<'_>],
        sink: &mut S,
    ) -> Result<DecodeSummary> {
        let mut summary = DecodeSummary::default();
        for outcome in self.decode(frames) {
            summary.add(&outcome);
            summary.written += sink.fill_all(&outcome.hits)?;
        }
        Ok(summary)
    }
}

/// Decodes `frames` in parallel with one decoder per rayon job.
#[must_use]
pub fn decode_frames(frames: &[EventFrame<'_>], config: &DecoderConfig) -> Vec<EventOutcome> {
    BatchDecoder::new(config.clone()).decode(frames)
}

fn decode_frame(decoder: &mut AlpideDecoder, frame: &EventFrame<'_>) -> EventOutcome {
    let status = decoder.decode_event(frame.payload, frame.trigger_time);
    if let Err(e) = &status {
        log::debug!("frame {} rejected: {e}", frame.index);
    }
    EventOutcome {
        index: frame.index,
        trigger_time: frame.trigger_time,
        status,
        hits: decoder.take_hits(),
    }
}

/// Counters over a set of decoded events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Events seen, framed or not.
    pub events: usize,
    /// Events that framed.
    pub ok: usize,
    /// Framed events with at least one flagged hit.
    pub corrupt: usize,
    /// Rejected events by error label.
    pub failures: BTreeMap<&'static str, usize>,
    /// Hits decoded, including those of rejected events.
    pub hits: usize,
    /// Hits by quality flag, indexed by [`QualityFlag::as_u8`].
    pub hits_by_flag: [usize; QualityFlag::ALL.len()],
    /// Records accepted by the sink, when decoding into one.
    pub written: usize,
}

impl DecodeSummary {
    /// Builds a summary from outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: &[EventOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.add(outcome);
        }
        summary
    }

    /// Counts one outcome.
    pub fn add(&mut self, outcome: &EventOutcome) {
        self.events += 1;
        match &outcome.status {
            Ok(status) => {
                self.ok += 1;
                if status.corrupt {
                    self.corrupt += 1;
                }
            }
            Err(e) => *self.failures.entry(e.label()).or_default() += 1,
        }
        self.hits += outcome.hits.len();
        for hit in &outcome.hits {
            self.hits_by_flag[usize::from(hit.quality_flag().as_u8())] += 1;
        }
    }

    /// Merges another summary into this one.
    pub fn merge(&mut self, other: &DecodeSummary) {
        self.events += other.events;
        self.ok += other.ok;
        self.corrupt += other.corrupt;
        for (label, count) in &other.failures {
            *self.failures.entry(*label).or_default() += count;
        }
        self.hits += other.hits;
        for (total, count) in self.hits_by_flag.iter_mut().zip(other.hits_by_flag) {
            *total += count;
        }
        self.written += other.written;
    }

    /// Number of rejected events.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    /// Hits carrying `flag`.
    #[must_use]
    pub fn hits_with(&self, flag: QualityFlag) -> usize {
        self.hits_by_flag[usize::from(flag.as_u8())]
    }
}

impl fmt::Display for DecodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "events: {} (ok {}, corrupt {}, failed {})",
            self.events,
            self.ok,
            self.corrupt,
            self.failed()
        )?;
        for (label, count) in &self.failures {
            writeln!(f, "  {label}: {count}")?;
        }
        writeln!(f, "hits: {}", self.hits)?;
        for flag in QualityFlag::ALL {
            let count = self.hits_with(flag);
            if count > 0 {
                writeln!(f, "  {}: {count}", flag.name())?;
            }
        }
        write!(f, "written: {}", self.written)
    }
}
