//! attributes.rs
//! Textual control surface: decimal integers in, decimal integers out.
//!
//! `enable` takes a duration in ms and reads back the remaining time;
//! `pwm_duty` takes a percentage and reads back the stored percentage.
//! Stores return the number of bytes consumed, like an attribute write.

use log::warn;

use crate::control::controller::VibratorController;
use crate::error::{VibratorError, VibratorResult};

/// Timed-output device contract seen by upper layers.
pub trait TimedOutput {
    fn name(&self) -> &str;
    fn enable(&self, value_ms: i64);
    fn get_time(&self) -> u64;
}

impl TimedOutput for VibratorController {
    fn name(&self) -> &str {
        "vibrator"
    }

    fn enable(&self, value_ms: i64) {
        self.request_run(value_ms);
    }

    fn get_time(&self) -> u64 {
        self.remaining_time()
    }
}

fn parse_decimal(buf: &str) -> VibratorResult<i64> {
    let trimmed = buf.trim();
    trimmed.parse::<i64>().map_err(|e| {
        warn!("[VIB] rejecting attribute input {:?}: {}", trimmed, e);
        VibratorError::InvalidInput {
            input: trimmed.to_string(),
            reason: e.to_string(),
        }
    })
}

pub fn store_enable(dev: &dyn TimedOutput, buf: &str) -> VibratorResult<usize> {
    let value = parse_decimal(buf)?;
    dev.enable(value);
    Ok(buf.len())
}

pub fn show_enable(dev: &dyn TimedOutput) -> String {
    format!("{}\n", dev.get_time())
}

/// Out-of-range percentages are accepted and coerced to 100.
pub fn store_duty(ctrl: &VibratorController, buf: &str) -> VibratorResult<usize> {
    let percent = parse_decimal(buf)?;
    ctrl.set_duty_percent(percent);
    Ok(buf.len())
}

pub fn show_duty(ctrl: &VibratorController) -> String {
    ctrl.get_duty_percent().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_surrounding_whitespace() {
        assert_eq!(parse_decimal("250\n").unwrap(), 250);
        assert_eq!(parse_decimal("  -3 ").unwrap(), -3);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_decimal("fast"), Err(VibratorError::InvalidInput { .. })));
        assert!(parse_decimal("").is_err());
        assert!(parse_decimal("12ms").is_err());
    }
}
