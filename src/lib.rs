//! # p1_vibrator
//! Control core of a timed haptic actuator (vibrator) driver.
//!
//! Upper layers ask for "run for N ms"; the controller sequences the motor
//! regulator, the PWM output and the GPIO enable line across three contexts:
//! the caller, a one-shot deadline timer thread and a single deferred worker.
//!
//! ## Layout
//! - `control`: state machine (`VibratorController`) and duty mapping
//! - `scheduling`: `DeadlineTimer` and `DeferredExecutor`
//! - `hardware`: `PowerRail` / `DriveOutput` / `Platform` traits, simulated board
//! - `driver`: probe (bring-up with unwinding) and teardown
//! - `attributes`: textual enable / duty surface
//! - `config`, `error`, `utils::telemetry`

pub mod attributes;
pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod hardware;
pub mod scheduling;
pub mod utils;

pub use config::{BoardVariant, PwmProfile, VibratorConfig, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};
pub use control::controller::{Phase, VibratorController};
pub use driver::Vibrator;
pub use error::{HardwareError, VibratorError, VibratorResult};
