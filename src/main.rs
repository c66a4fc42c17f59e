//! # Vibrator Control Demo
//! Drives the vibrator core against the simulated board from an interactive menu.
//!
//! ## Modes
//! - **Run / Stop:** `request_run(N)` with clamping to [30, 5000] ms, `request_run(0)` to stop.
//! - **Duty:** textual `pwm_duty` store/show, out-of-range input coerced to 100.
//! - **Pattern:** a short buzz pattern timed with `SpinSleeper` between requests.
//!
//! ## Configuration
//! - `VIBRATOR_VARIANT=gsm|cdma`: PWM profile (build default from cargo features).
//! - `VIBRATOR_TIMER_CORE=<id>`: pin timer + worker threads to one core.
//! - `VIBRATOR_TELEMETRY_CSV=<path>`: export transition events as CSV.
//! - `RUST_LOG=debug`: show every transition.

use std::{
    io::{stdin, stdout, BufRead, Write},
    sync::Arc,
    thread,
    time::Duration,
};

use log::{error, info};
use spin_sleep::{SpinSleeper, SpinStrategy};

use p1_vibrator::{
    attributes::{show_duty, show_enable, store_duty, store_enable},
    hardware::sim::SimBoard,
    utils::telemetry::EventRecorder,
    Vibrator, VibratorConfig, VibratorController,
};

/// (on_ms, off_ms) pairs played by the pattern option.
const BUZZ_PATTERN: &[(u64, u64)] = &[(80, 120), (80, 120), (250, 0)];

fn main() {
    env_logger::init();
    info!("=== VIBRATOR DEMO START ===");

    let config = VibratorConfig::from_env();
    let recorder = Arc::new(EventRecorder::new());

    if let Some(path) = &config.telemetry_csv {
        if let Err(e) = recorder.start_exporter(path.clone()) {
            error!("[Main] telemetry export disabled: {}", e);
        }
    }

    let mut board = SimBoard::new();
    let vibrator = match Vibrator::probe(&mut board, config, recorder.clone()) {
        Ok(v) => v,
        Err(e) => {
            error!("[Main] bring-up failed: {}", e);
            return;
        }
    };
    let ctrl = vibrator.controller().clone();

    println!(
        "Vibrator ready: variant={} period={}ns duty=[{}..{}]ns",
        vibrator.config().variant,
        vibrator.config().pwm.period_ns,
        vibrator.config().pwm.duty_min,
        vibrator.config().pwm.duty_max,
    );

    loop {
        let Some(choice) = prompt_menu() else {
            println!("\nInput closed. Exiting.");
            break;
        };
        match choice.as_str() {
            "1" => {
                let Some(input) = prompt("Duration in ms [default: 500]: ") else { break };
                let input = if input.is_empty() { "500".to_string() } else { input };
                if let Err(e) = store_enable(&*ctrl, &input) {
                    println!("Rejected: {}", e);
                }
            }
            "2" => ctrl.request_run(0),
            "3" => {
                let Some(input) = prompt("Duty percent [0-100]: ") else { break };
                match store_duty(&ctrl, &input) {
                    Ok(_) => println!("pwm_duty={} (duty value {}ns)", show_duty(&ctrl), ctrl.duty_value()),
                    Err(e) => println!("Rejected: {}", e),
                }
            }
            "4" | "" => print_status(&ctrl, &board),
            "5" => play_pattern(&ctrl),
            "6" => {
                println!("Exiting. Goodbye!");
                break;
            }
            other => println!("Unrecognized option '{}', please try again.", other),
        }
    }

    vibrator.shutdown();
    recorder.stop_exporter();
    let counts = recorder.snapshot_counts();
    info!(
        "[Main] requests={} on={} off={} skipped={} expiries={} faults={}",
        counts.run_requests,
        counts.transitions_on,
        counts.transitions_off,
        counts.transitions_skipped,
        counts.timer_expiries,
        counts.hardware_faults
    );
    info!("=== VIBRATOR DEMO FINISHED ===");
}

fn prompt_menu() -> Option<String> {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     VIBRATOR CONTROL                        │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Run for N ms                            │");
    println!("│  2) Stop                                    │");
    println!("│  3) Set pwm duty percent                    │");
    println!("│  4) Status                                  │");
    println!("│  5) Play buzz pattern                       │");
    println!("│  6) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    prompt("Select [1-6] (default: 4): ")
}

fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = stdout().flush();
    read_trimmed_line(&mut stdin().lock())
}

/// One trimmed line, or `None` once the input is closed or unreadable.
fn read_trimmed_line(reader: &mut impl BufRead) -> Option<String> {
    let mut input = String::new();
    match reader.read_line(&mut input) {
        Ok(0) => None,
        Ok(_) => Some(input.trim().to_string()),
        Err(e) => {
            error!("[Main] failed to read input: {}", e);
            None
        }
    }
}

fn print_status(ctrl: &VibratorController, board: &SimBoard) {
    let hw = board.snapshot();
    println!("phase:          {:?}", ctrl.phase());
    println!("remaining:      {} ms", show_enable(ctrl).trim());
    println!("requested:      {} ms", ctrl.requested_timeout_ms());
    println!("pwm_duty:       {}%", show_duty(ctrl));
    println!(
        "hardware:       regulator={} pwm={} pin={:?} enable={:?} duty={}/{}ns",
        hw.regulator_on, hw.pwm_on, hw.pin, hw.enable_line, hw.duty_ns, hw.period_ns
    );
}

fn play_pattern(ctrl: &VibratorController) {
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    for &(on_ms, off_ms) in BUZZ_PATTERN {
        ctrl.request_run(on_ms as i64);
        sleeper.sleep(Duration::from_millis(on_ms + off_ms));
    }
    // Let the last pulse expire before returning to the menu.
    thread::sleep(Duration::from_millis(20));
    ctrl.settle();
    println!("Pattern done; running={}", ctrl.is_running());
}
