//! error.rs
//! Error taxonomy for bring-up, hardware sequencing and attribute input.
//!
//! Only bring-up errors are fatal. Everything raised after the control
//! surface exists is logged and absorbed by the caller.

use thiserror::Error;

pub type VibratorResult<T> = Result<T, VibratorError>;

/// Faults reported by Power Rail / Drive Output implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("regulator {0} not available")]
    RegulatorUnavailable(String),

    #[error("gpio {0} busy or not present")]
    GpioUnavailable(String),

    #[error("pwm channel {0} could not be requested")]
    PwmUnavailable(u32),

    #[error("{op} failed: {reason}")]
    OperationFailed { op: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum VibratorError {
    /// Motor regulator missing at bring-up.
    #[error("failed to get motor regulator: {0}")]
    RegulatorUnavailable(String),

    #[error("failed to request gpio: {0}")]
    GpioUnavailable(String),

    #[error("failed to request pwm: {0}")]
    PwmUnavailable(String),

    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("invalid input {input:?}: {reason}")]
    InvalidInput { input: String, reason: String },

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl VibratorError {
    /// Maps an acquisition fault from the platform onto the bring-up taxonomy.
    pub fn from_acquisition(err: HardwareError) -> Self {
        match err {
            HardwareError::RegulatorUnavailable(name) => VibratorError::RegulatorUnavailable(name),
            HardwareError::GpioUnavailable(name) => VibratorError::GpioUnavailable(name),
            HardwareError::PwmUnavailable(ch) => VibratorError::PwmUnavailable(format!("channel {}", ch)),
            other => VibratorError::Hardware(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_errors_map_to_bring_up_variants() {
        let err = VibratorError::from_acquisition(HardwareError::RegulatorUnavailable("vcc_motor".into()));
        assert!(matches!(err, VibratorError::RegulatorUnavailable(ref n) if n == "vcc_motor"));

        let err = VibratorError::from_acquisition(HardwareError::PwmUnavailable(1));
        assert!(err.to_string().contains("channel 1"));
    }

    #[test]
    fn operation_failure_display() {
        let err = HardwareError::OperationFailed { op: "regulator_enable", reason: "timeout".into() };
        assert_eq!(err.to_string(), "regulator_enable failed: timeout");
        let wrapped: VibratorError = err.into();
        assert!(wrapped.to_string().contains("regulator_enable"));
    }
}
