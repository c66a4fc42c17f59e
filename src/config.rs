//! config.rs
//! Platform contract: timeout bounds and per-variant PWM profile.
//!
//! The board variant defaults to the one chosen at build time (`p1-gsm` /
//! `p1-cdma` cargo features) and can be overridden at run time through
//! `VIBRATOR_VARIANT`.

use std::{env, fmt, path::PathBuf, str::FromStr};

use log::warn;

use crate::error::VibratorError;

pub const MIN_TIMEOUT_MS: u32 = 30;
pub const MAX_TIMEOUT_MS: u32 = 5_000; // 5 s

/// Regulator supplying the motor.
pub const MOTOR_REGULATOR: &str = "vcc_motor";
/// PWM channel wired to the motor driver.
pub const MOTOR_PWM_CHANNEL: u32 = 1;

const ENV_VARIANT: &str = "VIBRATOR_VARIANT";
const ENV_CORE: &str = "VIBRATOR_TIMER_CORE";
const ENV_TELEMETRY: &str = "VIBRATOR_TELEMETRY_CSV";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardVariant {
    P1Gsm,
    P1Cdma,
}

/// PWM period and the duty window the motor responds to, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmProfile {
    pub period_ns: u32,
    pub duty_min: u32,
    pub duty_max: u32,
}

impl BoardVariant {
    #[cfg(feature = "p1-cdma")]
    pub const fn build_default() -> Self {
        BoardVariant::P1Cdma
    }

    #[cfg(not(feature = "p1-cdma"))]
    pub const fn build_default() -> Self {
        BoardVariant::P1Gsm
    }

    pub const fn profile(&self) -> PwmProfile {
        match self {
            BoardVariant::P1Gsm => PwmProfile { period_ns: 44_540, duty_min: 22_250, duty_max: 44_500 },
            BoardVariant::P1Cdma => PwmProfile { period_ns: 44_640, duty_min: 21_204, duty_max: 42_408 },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BoardVariant::P1Gsm => "gsm",
            BoardVariant::P1Cdma => "cdma",
        }
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoardVariant {
    type Err = VibratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gsm" | "p1-gsm" | "p1_gsm" => Ok(BoardVariant::P1Gsm),
            "cdma" | "p1-cdma" | "p1_cdma" => Ok(BoardVariant::P1Cdma),
            other => Err(VibratorError::InvalidInput {
                input: other.to_string(),
                reason: "expected gsm or cdma".into(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VibratorConfig {
    pub variant: BoardVariant,
    pub pwm: PwmProfile,
    pub min_timeout_ms: u32,
    pub max_timeout_ms: u32,
    /// Core to pin the timer and worker threads to, if any.
    pub rt_core: Option<usize>,
    pub telemetry_csv: Option<PathBuf>,
}

impl Default for VibratorConfig {
    fn default() -> Self {
        Self::for_variant(BoardVariant::build_default())
    }
}

impl VibratorConfig {
    pub fn for_variant(variant: BoardVariant) -> Self {
        Self {
            variant,
            pwm: variant.profile(),
            min_timeout_ms: MIN_TIMEOUT_MS,
            max_timeout_ms: MAX_TIMEOUT_MS,
            rt_core: None,
            telemetry_csv: None,
        }
    }

    /// Build-time defaults overridden by `VIBRATOR_*` environment variables.
    /// Unparsable values are reported and ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var(ENV_VARIANT) {
            match raw.parse::<BoardVariant>() {
                Ok(variant) => {
                    cfg.variant = variant;
                    cfg.pwm = variant.profile();
                }
                Err(e) => warn!("[Config] ignoring {}: {}", ENV_VARIANT, e),
            }
        }

        if let Ok(raw) = env::var(ENV_CORE) {
            match raw.trim().parse::<usize>() {
                Ok(core) => cfg.rt_core = Some(core),
                Err(e) => warn!("[Config] ignoring {}={:?}: {}", ENV_CORE, raw, e),
            }
        }

        if let Ok(path) = env::var(ENV_TELEMETRY) {
            if !path.trim().is_empty() {
                cfg.telemetry_csv = Some(PathBuf::from(path));
            }
        }

        cfg
    }
}
