//! End-to-end behaviour of the vibrator controller on the simulated board.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use p1_vibrator::{
    hardware::{
        sim::{HwOp, SimBoard},
        Level,
    },
    utils::telemetry::EventRecorder,
    BoardVariant, Phase, Vibrator, VibratorConfig,
};

fn bring_up(variant: BoardVariant) -> (Vibrator, SimBoard) {
    let mut board = SimBoard::new();
    let vib = Vibrator::probe(
        &mut board,
        VibratorConfig::for_variant(variant),
        Arc::new(EventRecorder::new()),
    )
    .unwrap();
    (vib, board)
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn non_positive_request_ends_stopped() {
    for v in [0, -1, -5000, i64::MIN] {
        let (vib, board) = bring_up(BoardVariant::P1Gsm);
        let ctrl = vib.controller();

        ctrl.request_run(500);
        assert!(wait_until(Duration::from_secs(1), || ctrl.is_running()));

        ctrl.request_run(v);
        assert!(wait_until(Duration::from_secs(1), || !ctrl.is_running()));
        ctrl.settle();
        assert_eq!(ctrl.remaining_time(), 0);
        assert_eq!(ctrl.requested_timeout_ms(), 0);
        assert_eq!(board.snapshot().enable_line, Level::Low);
    }
}

#[test]
fn short_requests_are_raised_to_minimum() {
    let (vib, _board) = bring_up(BoardVariant::P1Gsm);
    let ctrl = vib.controller();

    ctrl.request_run(5);
    assert_eq!(ctrl.requested_timeout_ms(), 30);
    let left = ctrl.remaining_time();
    assert!(left > 5 && left <= 30, "remaining {}", left);
}

#[test]
fn long_requests_are_capped_at_maximum() {
    let (vib, _board) = bring_up(BoardVariant::P1Gsm);
    let ctrl = vib.controller();

    ctrl.request_run(60_000);
    assert_eq!(ctrl.requested_timeout_ms(), 5_000);
    let left = ctrl.remaining_time();
    assert!(left > 4_000 && left <= 5_000, "remaining {}", left);
    ctrl.request_run(0);
}

#[test]
fn retrigger_while_running_only_moves_deadline() {
    let (vib, board) = bring_up(BoardVariant::P1Gsm);
    let ctrl = vib.controller();

    ctrl.request_run(200);
    ctrl.settle();
    assert!(ctrl.is_running());

    ctrl.request_run(200);
    ctrl.request_run(1_500);
    ctrl.settle();

    assert!(ctrl.is_running());
    assert!(ctrl.remaining_time() > 1_000);
    assert_eq!(board.count(HwOp::RegulatorEnable), 1);
    assert_eq!(board.count(HwOp::PwmEnable), 1);
    assert_eq!(board.count(HwOp::EnableLine(Level::High)), 1);

    ctrl.request_run(0);
    ctrl.settle();
    assert!(!ctrl.is_running());
}

#[test]
fn stop_supersedes_run_in_flight() {
    let (vib, board) = bring_up(BoardVariant::P1Gsm);
    let ctrl = vib.controller();
    // Each hardware op now blocks, so the ON sequence is still running
    // when the stop arrives.
    board.set_latency(Duration::from_millis(10));

    ctrl.request_run(100);
    ctrl.request_run(0);
    ctrl.settle();

    assert!(!ctrl.is_running());
    assert_eq!(ctrl.remaining_time(), 0);
    let hw = board.snapshot();
    assert!(!hw.regulator_on);
    assert!(!hw.pwm_on);
    assert_eq!(hw.enable_line, Level::Low);

    // Stays off after the original 100 ms would have elapsed.
    thread::sleep(Duration::from_millis(150));
    assert!(!ctrl.is_running());
}

#[test]
fn back_to_back_requests_from_threads_settle_consistently() {
    let (vib, board) = bring_up(BoardVariant::P1Cdma);
    let ctrl = vib.controller().clone();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let c = ctrl.clone();
            thread::spawn(move || {
                for n in 0..25 {
                    c.request_run(if (i + n) % 3 == 0 { 0 } else { 400 });
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    ctrl.request_run(0);
    ctrl.settle();
    assert!(!ctrl.is_running());
    let hw = board.snapshot();
    assert!(!hw.regulator_on);
    assert_eq!(hw.enable_line, Level::Low);
    assert_eq!(board.count(HwOp::RegulatorEnable), board.count(HwOp::RegulatorDisable));
}

#[test]
fn fifty_ms_run_expires_by_itself() {
    let (vib, board) = bring_up(BoardVariant::P1Gsm);
    let ctrl = vib.controller();

    ctrl.request_run(50);
    let left = ctrl.remaining_time();
    assert!(left > 0 && left <= 50, "remaining {}", left);

    assert!(wait_until(Duration::from_secs(1), || ctrl.is_running() || ctrl.remaining_time() == 0));
    thread::sleep(Duration::from_millis(80));
    assert!(wait_until(Duration::from_secs(1), || !ctrl.is_running()));
    ctrl.settle();

    assert_eq!(ctrl.remaining_time(), 0);
    assert_eq!(ctrl.phase(), Phase::Idle);
    assert!(!board.snapshot().regulator_on);
    assert_eq!(vib.controller().recorder().snapshot_counts().timer_expiries, 1);
}

#[test]
fn minimum_run_turns_on_then_off() {
    let (vib, board) = bring_up(BoardVariant::P1Gsm);
    let ctrl = vib.controller();
    let events = board.events();
    while events.try_recv().is_ok() {}

    ctrl.request_run(30);
    let mut saw_high = false;
    while let Ok(op) = events.recv_timeout(Duration::from_millis(500)) {
        if op == HwOp::EnableLine(Level::High) {
            saw_high = true;
            break;
        }
    }
    assert!(saw_high, "motor never energized");

    let mut saw_low = false;
    while let Ok(op) = events.recv_timeout(Duration::from_millis(500)) {
        if op == HwOp::EnableLine(Level::Low) {
            saw_low = true;
            break;
        }
    }
    assert!(saw_low, "motor never de-energized");
    ctrl.settle();
    assert!(!ctrl.is_running());
}

#[test]
fn running_uses_current_duty_value() {
    let (vib, board) = bring_up(BoardVariant::P1Cdma);
    let ctrl = vib.controller();

    ctrl.set_duty_percent(0);
    ctrl.request_run(300);
    ctrl.settle();
    let hw = board.snapshot();
    assert_eq!(hw.duty_ns, 21_204);
    assert_eq!(hw.period_ns, 44_640);

    ctrl.request_run(0);
    ctrl.settle();
    ctrl.set_duty_percent(100);
    ctrl.request_run(300);
    ctrl.settle();
    assert_eq!(board.snapshot().duty_ns, 42_408);
    ctrl.request_run(0);
}

#[test]
fn duty_percent_edges() {
    let (vib, _board) = bring_up(BoardVariant::P1Gsm);
    let ctrl = vib.controller();

    ctrl.set_duty_percent(0);
    assert_eq!(ctrl.duty_value(), 22_250);
    ctrl.set_duty_percent(100);
    assert_eq!(ctrl.duty_value(), 44_500);

    ctrl.set_duty_percent(40);
    let s = ctrl.set_duty_percent(150);
    assert!(s.coerced);
    assert_eq!(ctrl.get_duty_percent(), 100);
    assert_eq!(ctrl.duty_value(), 44_500);
}
