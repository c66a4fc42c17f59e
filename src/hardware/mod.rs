//hardware: narrow interfaces to the motor regulator and the PWM + GPIO drive pair.
//Platform code acquires them once at bring-up; only the transition task mutates them.
pub mod sim;

use crate::error::HardwareError;

/// Function selected on the PWM pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinFunction {
    /// Plain GPIO output, driving nothing.
    #[default]
    Output,
    /// Routed to the PWM timer output.
    Pwm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

/// Voltage regulator supplying the motor.
pub trait PowerRail: Send {
    fn is_enabled(&self) -> bool;
    fn enable(&mut self) -> Result<(), HardwareError>;
    /// Force the rail off regardless of other consumers.
    fn disable(&mut self) -> Result<(), HardwareError>;
}

/// PWM signal and GPIO enable line physically driving the actuator.
pub trait DriveOutput: Send {
    fn set_pwm_pin_function(&mut self, function: PinFunction) -> Result<(), HardwareError>;
    /// Configure duty and period, both in nanoseconds.
    fn pwm_config(&mut self, duty_ns: u32, period_ns: u32) -> Result<(), HardwareError>;
    fn pwm_enable(&mut self) -> Result<(), HardwareError>;
    fn pwm_disable(&mut self);
    fn set_enable_line(&mut self, level: Level) -> Result<(), HardwareError>;
}

/// Board-level resource provider used during bring-up.
///
/// Resources are released when the returned handles are dropped, so a
/// failed bring-up unwinds by simply returning early.
pub trait Platform {
    fn acquire_power_rail(&mut self, name: &str) -> Result<Box<dyn PowerRail>, HardwareError>;
    fn acquire_drive_output(&mut self, pwm_channel: u32) -> Result<Box<dyn DriveOutput>, HardwareError>;
}
