//! Edge case tests for the signal decoder
//!
//! These tests cover unusual configurations and inputs that the decoder
//! must tolerate without panicking.

use rs_signals::{
    catalog::{csd, MastType, USES_CODES},
    hal::RamCvStore,
    layout::{self, mast_record_cv, CV_ASPECT_LAG, CV_NUM_SIGNAL_NUMBER},
    traits::CvStore,
    ConfigError, DecoderConfig, LightFunction, SignalDecoder, SignalSet,
};

fn factory_cvs() -> RamCvStore {
    let mut cvs = RamCvStore::new();
    layout::write_factory_defaults(&mut cvs).unwrap();
    cvs
}

// ============================================================================
// Configuration Edge Cases
// ============================================================================

#[test]
fn zero_masts() {
    let mut cvs = factory_cvs();
    cvs.write_cv(CV_NUM_SIGNAL_NUMBER, 0).unwrap();
    let mut decoder = SignalDecoder::new(cvs);

    assert_eq!(decoder.mast_count(), 0);
    assert!(decoder.address_map().is_empty());
    assert_eq!(decoder.on_address_command(100, 1, 0), None);
    assert!(decoder.tick(1000).settled.is_empty());
    assert_eq!(decoder.output_frame(), [0; 10]);
}

#[test]
fn zero_lag_settles_on_next_tick() {
    let mut cvs = factory_cvs();
    cvs.write_cv(CV_ASPECT_LAG, 0).unwrap();
    let mut decoder = SignalDecoder::new(cvs);

    decoder.on_address_command(100, 1, 500);
    assert!(decoder.tick(500).settled.is_empty());
    assert_eq!(decoder.tick(501).settled.len(), 1);
}

#[test]
fn explicit_address_count_overrides_derived() {
    let mut cvs = factory_cvs();
    // Mast 0 claims 5 addresses instead of 3
    cvs.write_cv(mast_record_cv(0) + 12, 5).unwrap();
    let decoder = SignalDecoder::new(cvs);

    assert_eq!(decoder.address_map().mast_address(0), Some((100, 5)));
    assert_eq!(decoder.address_map().mast_address(1), Some((105, 3)));
}

#[test]
fn highest_address() {
    let cvs = factory_cvs();
    let mut decoder = SignalDecoder::new(cvs);
    decoder
        .set_config(
            DecoderConfig::default()
                .with_first_address(0x07ff)
                .with_mast_count(1),
        )
        .unwrap();

    assert!(decoder.on_address_command(0x07ff, 1, 0).is_some());
    assert!(decoder.on_address_command(0x0801, 1, 0).is_some());
    assert_eq!(decoder.on_address_command(0x0802, 1, 0), None);
}

#[test]
fn corrupt_aspect_table_entry_shows_stop() {
    let mut cvs = factory_cvs();
    cvs.write_cv(layout::aspect_table_cv(0, 1), 200).unwrap();
    let mut decoder = SignalDecoder::new(cvs);

    decoder.on_address_command(100, 1, 0);
    let report = decoder.tick(200);
    assert_eq!(report.settled[0].aspect, csd::STOP);
    assert!(decoder.is_output_lit(2));
}

#[test]
fn disabled_mast_with_corrupt_default() {
    let mut cvs = factory_cvs();
    let record = mast_record_cv(0);
    cvs.write_cv(record + 10, SignalSet::Disabled as u8).unwrap();
    cvs.write_cv(record + 11, 200).unwrap();
    let decoder = SignalDecoder::new(cvs);

    let state = decoder.mast_state(0).unwrap();
    assert_eq!(state.aspect, 0);
    assert_eq!(state.code, 0);
    for output in 0..5 {
        assert!(!decoder.is_output_lit(output));
    }
}

#[test]
fn output_past_last_is_unassigned() {
    let mut cvs = factory_cvs();
    cvs.write_cv(mast_record_cv(0), 200).unwrap();
    let decoder = SignalDecoder::new(cvs);
    assert_eq!(decoder.mast_output(0, 0), None);
    assert_eq!(decoder.mast_output(0, 1), Some(1));
}

#[test]
fn mechanical_mast() {
    let mut decoder = SignalDecoder::new(factory_cvs());
    decoder.set_mast_type(0, SignalSet::CsdMechanical as u8).unwrap();
    assert_eq!(decoder.mast(0).unwrap().code_count(), 3);

    decoder.change_aspect(0, 2).unwrap();
    assert!(decoder.is_output_lit(0));
    assert!(decoder.is_output_lit(1));
    // Slots the semaphore table does not use stay inactive
    assert_eq!(decoder.current_output_state(2), LightFunction::default());
    assert_eq!(decoder.change_aspect(0, 3), Err(ConfigError::InvalidAspect(3)));
}

// ============================================================================
// Command Edge Cases
// ============================================================================

#[test]
fn bitwise_clear_bit() {
    let mut decoder = SignalDecoder::new(factory_cvs());
    decoder.change_aspect(0, csd::EXPECT_40).unwrap();
    assert_eq!(decoder.mast(0).unwrap().current_code(), 3);

    // Clearing bit 1 of the committed code 3
    let write = decoder.on_address_command(101, 0, 0).unwrap();
    assert_eq!(write.code, 1);
}

#[test]
fn repeated_command_keeps_pending() {
    let mut decoder = SignalDecoder::new(factory_cvs());
    for now in (0..1000).step_by(100) {
        decoder.on_address_command(100, 1, now);
        assert!(decoder.tick(now).settled.is_empty());
    }
    assert_eq!(decoder.tick(1029).settled.len(), 1);
}

#[test]
fn empty_prototype_clears_wiring() {
    let mut decoder = SignalDecoder::new(factory_cvs());
    decoder
        .set_mast_type(3, USES_CODES | MastType::None as u8)
        .unwrap();
    // Empty prototype carries no lights
    assert_eq!(decoder.mast_output(3, 0), None);
    assert_eq!(decoder.mast(3).unwrap().code_count(), 1);
}
