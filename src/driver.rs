//! driver.rs
//! Bring-up and teardown of the vibrator.
//!
//! Probe order: motor regulator → enable GPIO + PWM channel → safe pin state →
//! timer/worker threads. Any failure before the last step is fatal and
//! releases what was already acquired (handles are dropped in reverse order);
//! the control surface only exists once everything succeeded.

use std::sync::Arc;

use log::{error, info};

use crate::config::{VibratorConfig, MOTOR_PWM_CHANNEL, MOTOR_REGULATOR};
use crate::control::controller::VibratorController;
use crate::error::{VibratorError, VibratorResult};
use crate::hardware::{Level, PinFunction, Platform};
use crate::utils::telemetry::EventRecorder;

pub struct Vibrator {
    controller: Arc<VibratorController>,
    config: VibratorConfig,
}

impl Vibrator {
    pub fn probe<P: Platform>(
        platform: &mut P,
        config: VibratorConfig,
        recorder: Arc<EventRecorder>,
    ) -> VibratorResult<Self> {
        let rail = platform.acquire_power_rail(MOTOR_REGULATOR).map_err(|e| {
            error!("[VIB] failed to get motor regulator: {}", e);
            VibratorError::from_acquisition(e)
        })?;

        let mut output = platform.acquire_drive_output(MOTOR_PWM_CHANNEL).map_err(|e| {
            error!("[VIB] failed to request drive output: {}", e);
            VibratorError::from_acquisition(e)
        })?;

        // Motor off until the first request: enable line low, PWM pin inert.
        output.set_enable_line(Level::Low)?;
        output.set_pwm_pin_function(PinFunction::Output)?;

        let controller = VibratorController::new(rail, output, &config, recorder)?;
        info!(
            "[VIB] timed output 'vibrator' ready ({} variant, period {}ns, duty {}..{}ns)",
            config.variant, config.pwm.period_ns, config.pwm.duty_min, config.pwm.duty_max
        );

        Ok(Self {
            controller: Arc::new(controller),
            config,
        })
    }

    pub fn controller(&self) -> &Arc<VibratorController> {
        &self.controller
    }

    pub fn config(&self) -> &VibratorConfig {
        &self.config
    }

    pub fn shutdown(&self) {
        self.controller.shutdown();
    }
}

impl Drop for Vibrator {
    fn drop(&mut self) {
        self.controller.shutdown();
    }
}
