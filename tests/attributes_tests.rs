//! Textual enable / pwm_duty surface.

use std::sync::Arc;

use p1_vibrator::{
    attributes::{show_duty, show_enable, store_duty, store_enable, TimedOutput},
    hardware::sim::SimBoard,
    utils::telemetry::EventRecorder,
    BoardVariant, Vibrator, VibratorConfig, VibratorError,
};

fn bring_up() -> (Vibrator, SimBoard) {
    let mut board = SimBoard::new();
    let vib = Vibrator::probe(
        &mut board,
        VibratorConfig::for_variant(BoardVariant::P1Cdma),
        Arc::new(EventRecorder::new()),
    )
    .unwrap();
    (vib, board)
}

#[test]
fn timed_output_identity() {
    let (vib, _board) = bring_up();
    let dev: &dyn TimedOutput = &**vib.controller();
    assert_eq!(dev.name(), "vibrator");
    assert_eq!(dev.get_time(), 0);
}

#[test]
fn enable_round_trip() {
    let (vib, _board) = bring_up();
    let ctrl = vib.controller();

    assert_eq!(store_enable(&**ctrl, "1000\n").unwrap(), 5);
    let shown: u64 = show_enable(&**ctrl).trim().parse().unwrap();
    assert!(shown > 0 && shown <= 1000);

    store_enable(&**ctrl, "0").unwrap();
    ctrl.settle();
    assert_eq!(show_enable(&**ctrl), "0\n");
    assert!(!ctrl.is_running());
}

#[test]
fn duty_store_and_show() {
    let (vib, _board) = bring_up();
    let ctrl = vib.controller();

    assert_eq!(show_duty(ctrl), "100");
    store_duty(ctrl, "25\n").unwrap();
    assert_eq!(show_duty(ctrl), "25");
    assert_eq!(ctrl.duty_value(), 21_204 + 25 * 21_204 / 100);

    // Out of range is accepted and coerced.
    store_duty(ctrl, "150").unwrap();
    assert_eq!(show_duty(ctrl), "100");
    assert_eq!(ctrl.duty_value(), 42_408);

    store_duty(ctrl, "-7").unwrap();
    assert_eq!(show_duty(ctrl), "100");
}

#[test]
fn unparsable_input_changes_nothing() {
    let (vib, _board) = bring_up();
    let ctrl = vib.controller();
    store_duty(ctrl, "60").unwrap();

    assert!(matches!(store_duty(ctrl, "sixty"), Err(VibratorError::InvalidInput { .. })));
    assert_eq!(show_duty(ctrl), "60");

    assert!(store_enable(&**ctrl, "forever").is_err());
    assert_eq!(ctrl.remaining_time(), 0);
    assert_eq!(ctrl.recorder().snapshot_counts().run_requests, 0);
}
