//! duty.rs
//! User-facing duty percentage → hardware PWM duty value.
//!
//! The percent and the derived duty value are packed into one `AtomicU64`
//! so the transition task never observes a half-updated pair.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error};

use crate::config::PwmProfile;

pub const DEFAULT_DUTY_PERCENT: u32 = 100;

/// Result of a duty update as applied to the hardware setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutySetting {
    pub percent: u32,
    pub duty_ns: u32,
    /// Input was outside `[0, 100]` and replaced by 100.
    pub coerced: bool,
}

/// Linear interpolation between the profile's duty bounds.
/// 0 % maps to `duty_min`, 100 % to `duty_max`.
#[inline]
pub fn duty_for_percent(profile: &PwmProfile, percent: u32) -> u32 {
    let percent = percent.min(100) as u64;
    let span = (profile.duty_max - profile.duty_min) as u64;
    profile.duty_min + (percent * span / 100) as u32
}

#[inline]
fn pack(percent: u32, duty_ns: u32) -> u64 {
    ((percent as u64) << 32) | duty_ns as u64
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}

pub struct DutyConfig {
    profile: PwmProfile,
    setting: AtomicU64,
}

impl DutyConfig {
    pub fn new(profile: PwmProfile) -> Self {
        Self {
            profile,
            setting: AtomicU64::new(pack(DEFAULT_DUTY_PERCENT, profile.duty_max)),
        }
    }

    /// Store a new percent. Out-of-range input is coerced to 100 and logged.
    pub fn set_percent(&self, percent: i64) -> DutySetting {
        let (percent, coerced) = if (0..=100).contains(&percent) {
            (percent as u32, false)
        } else {
            error!("[VIB] invalid duty interval [0-100]: {}", percent);
            (DEFAULT_DUTY_PERCENT, true)
        };

        let duty_ns = duty_for_percent(&self.profile, percent);
        self.setting.store(pack(percent, duty_ns), Ordering::Release);
        debug!("[VIB] pwm duty {}% -> duty value {}", percent, duty_ns);

        DutySetting { percent, duty_ns, coerced }
    }

    /// Last stored percent (not the derived duty value).
    #[inline]
    pub fn percent(&self) -> u32 {
        unpack(self.setting.load(Ordering::Acquire)).0
    }

    #[inline]
    pub fn duty_value(&self) -> u32 {
        unpack(self.setting.load(Ordering::Acquire)).1
    }
}
