#![allow(clippy::unreadable_literal, clippy::cast_possible_truncation)]
use alpide_decoder::{
    AlpideDecoder, DecoderConfig, Error, FramingViolation, Hit, HitRetention, QualityFlag,
    TriggerTime, NO_CHIP_ID,
};

// Helper to create a chip header word
fn make_header(chip_id: u8) -> [u8; 2] {
    [0xa0 | (chip_id & 0x0f), 0x00]
}

// Helper to create an empty frame word
fn make_empty_frame(chip_id: u8) -> [u8; 2] {
    [0xe0 | (chip_id & 0x0f), 0x00]
}

fn make_trailer(flags: u8) -> u8 {
    0xb0 | (flags & 0x0f)
}

fn make_region(region: u8) -> u8 {
    0xc0 | (region & 0x1f)
}

// 01 <encoder[3:0]> <address[9:0]>
fn make_short(encoder: u8, address: u16) -> [u8; 2] {
    (0x4000 | (u16::from(encoder & 0x0f) << 10) | (address & 0x03ff)).to_be_bytes()
}

struct EventBuilder(Vec<u8>);

impl EventBuilder {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn header(mut self, chip_id: u8) -> Self {
        self.0.extend_from_slice(&make_header(chip_id));
        self
    }

    fn region(mut self, region: u8) -> Self {
        self.0.push(make_region(region));
        self
    }

    fn short(mut self, encoder: u8, address: u16) -> Self {
        self.0.extend_from_slice(&make_short(encoder, address));
        self
    }

    fn trailer(mut self) -> Self {
        self.0.push(make_trailer(0));
        self
    }

    fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    fn build(self) -> Vec<u8> {
        self.0
    }
}

const T0: TriggerTime = TriggerTime { hi: 0, lo: 1000 };

#[test]
fn test_well_formed_single_hit() {
    let data = EventBuilder::new()
        .header(4)
        .region(7)
        .short(9, 513)
        .trailer()
        .build();

    let mut decoder = AlpideDecoder::new();
    let status = decoder.decode_event(&data, T0).unwrap();

    assert!(!status.corrupt);
    assert_eq!(status.hits, 1);

    let hit = &decoder.hits()[0];
    assert_eq!(hit.chip_id(), 4);
    assert_eq!(hit.region(), 7);
    assert_eq!(hit.double_column(), 9 + 7 * 16);
    assert_eq!(hit.address(), 513);
    assert_eq!(hit.quality_flag(), QualityFlag::Ok);
    assert_eq!(hit.trigger_time(), T0);
}

#[test]
fn test_fillers_are_skipped() {
    let data = EventBuilder::new()
        .raw(&[0xff, 0xf1])
        .header(0)
        .raw(&[0xff])
        .region(0)
        .short(0, 1)
        .raw(&[0xf0])
        .trailer()
        .raw(&[0xff, 0xff])
        .build();

    let mut decoder = AlpideDecoder::new();
    let status = decoder.decode_event(&data, T0).unwrap();
    assert_eq!(status.hits, 1);
    assert!(!status.corrupt);
}

#[test]
fn test_empty_frame_closes_event() {
    let data = make_empty_frame(3);
    let mut decoder = AlpideDecoder::new();
    let status = decoder.decode_event(&data, T0).unwrap();

    assert!(!status.corrupt);
    assert_eq!(status.hits, 0);
    assert_eq!(decoder.chip_id(), 3);
}

#[test]
fn test_data_before_header() {
    let data = EventBuilder::new().short(0, 0).header(0).trailer().build();
    let mut decoder = AlpideDecoder::new();

    match decoder.decode_event(&data, T0) {
        Err(Error::Framing { violation, offset }) => {
            assert_eq!(violation, FramingViolation::DataBeforeHeader);
            assert_eq!(offset, 0);
        }
        other => panic!("expected framing error, got {other:?}"),
    }
    assert!(decoder.hits().is_empty());
}

#[test]
fn test_region_before_header() {
    let data = EventBuilder::new().raw(&[0xff]).region(1).build();
    let mut decoder = AlpideDecoder::new();

    let err = decoder.decode_event(&data, T0).unwrap_err();
    assert!(matches!(
        err,
        Error::Framing {
            violation: FramingViolation::RegionBeforeHeader,
            offset: 1
        }
    ));
}

#[test]
fn test_trailer_before_header() {
    let data = [make_trailer(0)];
    let mut decoder = AlpideDecoder::new();

    let err = decoder.decode_event(&data, T0).unwrap_err();
    assert!(matches!(
        err,
        Error::Framing {
            violation: FramingViolation::TrailerBeforeHeader,
            ..
        }
    ));
}

#[test]
fn test_trailer_after_finished() {
    let data = EventBuilder::new().header(0).trailer().trailer().build();
    let mut decoder = AlpideDecoder::new();

    let err = decoder.decode_event(&data, T0).unwrap_err();
    assert!(matches!(
        err,
        Error::Framing {
            violation: FramingViolation::TrailerAfterFinished,
            offset: 3
        }
    ));

    let data = EventBuilder::new()
        .raw(&make_empty_frame(0))
        .trailer()
        .build();
    let err = decoder.decode_event(&data, T0).unwrap_err();
    assert!(matches!(
        err,
        Error::Framing {
            violation: FramingViolation::TrailerAfterFinished,
            ..
        }
    ));
}

#[test]
fn test_incomplete_event() {
    let data = make_header(6);
    let mut decoder = AlpideDecoder::new();

    match decoder.decode_event(&data, T0) {
        Err(Error::IncompleteEvent {
            chip_id,
            last_byte,
            length,
        }) => {
            assert_eq!(chip_id, 6);
            assert_eq!(last_byte, 0xa6);
            assert_eq!(length, 2);
        }
        other => panic!("expected incomplete event, got {other:?}"),
    }
}

#[test]
fn test_incomplete_event_keeps_hits() {
    let data = EventBuilder::new().header(0).region(0).short(0, 4).build();
    let mut decoder = AlpideDecoder::new();

    assert!(matches!(
        decoder.decode_event(&data, T0),
        Err(Error::IncompleteEvent { .. })
    ));
    assert_eq!(decoder.hits().len(), 1);
}

#[test]
fn test_no_event_start() {
    let mut decoder = AlpideDecoder::new();

    assert!(matches!(
        decoder.decode_event(&[], T0),
        Err(Error::NoEventStart { length: 0 })
    ));
    assert!(matches!(
        decoder.decode_event(&[0xff, 0xf1, 0xf0], T0),
        Err(Error::NoEventStart { length: 3 })
    ));
}

#[test]
fn test_unknown_word_aborts() {
    let data = EventBuilder::new()
        .header(0)
        .region(0)
        .short(0, 1)
        .raw(&[0x80])
        .short(0, 2)
        .trailer()
        .build();
    let mut decoder = AlpideDecoder::new();

    let err = decoder.decode_event(&data, T0).unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownWord {
            byte: 0x80,
            offset: 5
        }
    ));
    // hits before the bad byte are kept, nothing after it is decoded
    assert_eq!(decoder.hits().len(), 1);
}

#[test]
fn test_truncated_word_is_not_decoded() {
    // trailing data long word cut after two bytes
    let data = EventBuilder::new()
        .header(0)
        .region(0)
        .short(0, 1)
        .raw(&[0x00, 0x10])
        .build();
    let mut decoder = AlpideDecoder::new();

    assert!(matches!(
        decoder.decode_event(&data, T0),
        Err(Error::IncompleteEvent { .. })
    ));
    assert_eq!(decoder.hits().len(), 1);

    // a header cut in half never opens the event
    assert!(matches!(
        decoder.decode_event(&[0xa0], T0),
        Err(Error::NoEventStart { .. })
    ));
}

#[test]
fn test_bad_chip_id_is_not_a_framing_failure() {
    let data = EventBuilder::new()
        .header(15)
        .region(0)
        .short(0, 0)
        .trailer()
        .build();
    let mut decoder = AlpideDecoder::new();

    let status = decoder.decode_event(&data, T0).unwrap();
    assert!(status.corrupt);
    assert_eq!(decoder.hits()[0].quality_flag(), QualityFlag::BadChipId);
}

#[test]
fn test_data_without_region() {
    let data = EventBuilder::new().header(1).short(0, 0).trailer().build();
    let mut decoder = AlpideDecoder::new();

    let status = decoder.decode_event(&data, T0).unwrap();
    assert!(status.corrupt);

    let hit = &decoder.hits()[0];
    assert_eq!(hit.region(), 32);
    // the region check runs first, the double column check overrides it
    assert_eq!(hit.quality_flag(), QualityFlag::BadDoubleColumn);
}

#[test]
fn test_data_after_trailer_has_no_chip() {
    let data = EventBuilder::new()
        .header(1)
        .region(0)
        .trailer()
        .short(0, 0)
        .build();
    let mut decoder = AlpideDecoder::new();

    let status = decoder.decode_event(&data, T0).unwrap();
    assert!(status.corrupt);

    let hit = &decoder.hits()[0];
    assert_eq!(hit.chip_id(), NO_CHIP_ID);
    assert_eq!(hit.quality_flag(), QualityFlag::BadChipId);
}

#[test]
fn test_region_carries_over_until_next_header() {
    let data = EventBuilder::new()
        .header(0)
        .region(2)
        .short(1, 10)
        .short(3, 10)
        .region(5)
        .short(1, 10)
        .trailer()
        .build();
    let mut decoder = AlpideDecoder::new();
    decoder.decode_event(&data, T0).unwrap();

    let dcols: Vec<u32> = decoder.hits().iter().map(|h| h.double_column()).collect();
    assert_eq!(dcols, vec![33, 35, 81]);
}

#[test]
fn test_region_resets_between_events() {
    let mut decoder = AlpideDecoder::new();
    let first = EventBuilder::new().header(0).region(4).trailer().build();
    decoder.decode_event(&first, T0).unwrap();
    assert_eq!(decoder.region(), 4);

    let second = EventBuilder::new().header(0).short(0, 0).trailer().build();
    let status = decoder.decode_event(&second, T0).unwrap();
    assert!(status.corrupt);
    assert_eq!(decoder.hits()[0].region(), 32);
}

#[test]
fn test_hits_accumulate_by_default() {
    let data = EventBuilder::new()
        .header(0)
        .region(0)
        .short(0, 0)
        .trailer()
        .build();
    let mut decoder = AlpideDecoder::new();

    decoder.decode_event(&data, T0).unwrap();
    let status = decoder
        .decode_event(&data, TriggerTime::new(0, 2000))
        .unwrap();

    assert_eq!(status.hits, 1);
    assert_eq!(decoder.hits().len(), 2);
    assert_eq!(decoder.hits()[1].trigger_time(), TriggerTime::new(0, 2000));

    // the region header clears the new event marker, so the same pixel in
    // the next event is compared against the undrained previous hit
    assert!(status.corrupt);
    assert_eq!(decoder.hits()[0].quality_flag(), QualityFlag::Stuck);
    assert_eq!(decoder.hits()[1].quality_flag(), QualityFlag::Stuck);
}

#[test]
fn test_draining_between_events() {
    let data = EventBuilder::new()
        .header(0)
        .region(0)
        .short(0, 0)
        .trailer()
        .build();
    let mut decoder = AlpideDecoder::new();

    decoder.decode_event(&data, T0).unwrap();
    let first = decoder.take_hits();
    let status = decoder.decode_event(&data, T0).unwrap();

    assert!(!status.corrupt);
    assert_eq!(first[0].quality_flag(), QualityFlag::Ok);
    assert_eq!(decoder.hits()[0].quality_flag(), QualityFlag::Ok);
}

#[test]
fn test_header_shields_first_word_from_previous_event() {
    // no region header: the first data word still sees the new event marker
    let mut decoder = AlpideDecoder::new();
    let first = EventBuilder::new().header(0).short(0, 5).trailer().build();
    decoder.decode_event(&first, T0).unwrap();
    let second = EventBuilder::new().header(0).short(0, 5).trailer().build();
    decoder.decode_event(&second, T0).unwrap();

    // both are corrupt from the missing region, but neither is stuck
    assert_eq!(decoder.hits()[0].quality_flag(), QualityFlag::BadDoubleColumn);
    assert_eq!(decoder.hits()[1].quality_flag(), QualityFlag::BadDoubleColumn);
}

#[test]
fn test_per_event_retention() {
    let data = EventBuilder::new()
        .header(0)
        .region(0)
        .short(0, 0)
        .trailer()
        .build();
    let config = DecoderConfig::new().with_retention(HitRetention::PerEvent);
    let mut decoder = AlpideDecoder::with_config(config);

    decoder.decode_event(&data, T0).unwrap();
    decoder.decode_event(&data, T0).unwrap();
    assert_eq!(decoder.hits().len(), 1);
}

#[test]
fn test_row_and_column_of_decoded_hits() {
    let data = EventBuilder::new()
        .header(0)
        .region(1)
        .short(0, 0)
        .short(0, 1)
        .short(0, 2)
        .short(0, 3)
        .trailer()
        .build();
    let mut decoder = AlpideDecoder::new();
    decoder.decode_event(&data, T0).unwrap();

    let pixels: Vec<(u32, u32)> = decoder
        .hits()
        .iter()
        .map(|h| (h.column(), h.row()))
        .collect();
    assert_eq!(pixels, vec![(32, 1), (33, 0), (33, 1), (32, 0)]);
}
