//! Probe / teardown on the simulated board, including failed bring-up unwinding.

use std::sync::Arc;

use p1_vibrator::{
    hardware::{
        sim::{HwOp, SimBoard},
        Level, PinFunction,
    },
    utils::telemetry::EventRecorder,
    BoardVariant, Vibrator, VibratorConfig, VibratorError,
};

fn probe(board: &mut SimBoard) -> Result<Vibrator, VibratorError> {
    Vibrator::probe(
        board,
        VibratorConfig::for_variant(BoardVariant::P1Gsm),
        Arc::new(EventRecorder::new()),
    )
}

#[test]
fn probe_leaves_motor_in_safe_state() {
    let mut board = SimBoard::new();
    let vib = probe(&mut board).unwrap();

    assert_eq!(
        board.ops(),
        vec![
            HwOp::Acquired("regulator"),
            HwOp::Acquired("gpio"),
            HwOp::Acquired("pwm"),
            HwOp::EnableLine(Level::Low),
            HwOp::PinFunction(PinFunction::Output),
        ]
    );
    let hw = board.snapshot();
    assert!(!hw.regulator_on);
    assert!(hw.rail_held && hw.output_held);
    assert!(!vib.controller().is_running());
    assert_eq!(vib.controller().get_duty_percent(), 100);
}

#[test]
fn missing_regulator_is_fatal() {
    let mut board = SimBoard::new();
    board.remove_regulator();

    let err = probe(&mut board).err().unwrap();
    assert!(matches!(err, VibratorError::RegulatorUnavailable(ref name) if name == "vcc_motor"));
    assert!(board.ops().is_empty());
}

#[test]
fn busy_gpio_releases_regulator() {
    let mut board = SimBoard::new();
    board.mark_gpio_busy();

    let err = probe(&mut board).err().unwrap();
    assert!(matches!(err, VibratorError::GpioUnavailable(_)));
    assert_eq!(
        board.ops(),
        vec![HwOp::Acquired("regulator"), HwOp::Released("regulator")]
    );
    assert!(!board.snapshot().rail_held);
}

#[test]
fn missing_pwm_unwinds_in_reverse_order() {
    let mut board = SimBoard::new();
    board.remove_pwm();

    let err = probe(&mut board).err().unwrap();
    assert!(matches!(err, VibratorError::PwmUnavailable(_)));
    assert_eq!(
        board.ops(),
        vec![
            HwOp::Acquired("regulator"),
            HwOp::Acquired("gpio"),
            HwOp::Released("gpio"),
            HwOp::Released("regulator"),
        ]
    );
}

#[test]
fn dropping_vibrator_turns_motor_off_and_releases_hardware() {
    let mut board = SimBoard::new();
    {
        let vib = probe(&mut board).unwrap();
        vib.controller().request_run(3_000);
        vib.controller().settle();
        assert!(board.snapshot().regulator_on);
    }

    let hw = board.snapshot();
    assert!(!hw.regulator_on);
    assert!(!hw.pwm_on);
    assert_eq!(hw.enable_line, Level::Low);
    assert!(!hw.rail_held && !hw.output_held);
}

#[test]
fn controller_outliving_vibrator_is_inert() {
    let mut board = SimBoard::new();
    let vib = probe(&mut board).unwrap();
    let ctrl = vib.controller().clone();
    drop(vib);

    ctrl.request_run(500);
    assert!(!ctrl.is_running());
    assert_eq!(ctrl.remaining_time(), 0);
}
