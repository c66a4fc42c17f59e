//! sim.rs
//! Simulated board: regulator, PWM channel and enable GPIO held in memory.
//!
//! Every operation is appended to an op log and published on a crossbeam
//! channel so callers can wait on hardware transitions with `recv_timeout`.
//! Supports fault injection (missing resources, failing regulator enable)
//! and an artificial per-operation latency to emulate blocking hardware.

use std::{
    sync::Arc,
    thread,
    time::Duration,
};

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::debug;
use parking_lot::Mutex;

use crate::error::HardwareError;
use crate::hardware::{DriveOutput, Level, PinFunction, Platform, PowerRail};

/// One observable hardware operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwOp {
    Acquired(&'static str),
    Released(&'static str),
    RegulatorEnable,
    RegulatorDisable,
    PinFunction(PinFunction),
    PwmConfig { duty_ns: u32, period_ns: u32 },
    PwmEnable,
    PwmDisable,
    EnableLine(Level),
}

/// Point-in-time copy of the simulated hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimSnapshot {
    pub regulator_on: bool,
    pub pwm_on: bool,
    pub pin: PinFunction,
    pub enable_line: Level,
    pub duty_ns: u32,
    pub period_ns: u32,
    pub regulator_enables: u32,
    pub pwm_enables: u32,
    pub rail_held: bool,
    pub output_held: bool,
}

#[derive(Default)]
struct SimState {
    hw: SimSnapshot,
    ops: Vec<HwOp>,
    latency: Duration,
    regulator_missing: bool,
    gpio_busy: bool,
    pwm_missing: bool,
    fail_regulator_enable: bool,
}

/// Cheaply cloneable handle to one simulated board.
#[derive(Clone)]
pub struct SimBoard {
    state: Arc<Mutex<SimState>>,
    tx: Sender<HwOp>,
    rx: Receiver<HwOp>,
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBoard {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            tx,
            rx,
        }
    }

    /// Op stream. All clones share one queue, so each op is delivered once.
    pub fn events(&self) -> Receiver<HwOp> {
        self.rx.clone()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        self.state.lock().hw
    }

    pub fn ops(&self) -> Vec<HwOp> {
        self.state.lock().ops.clone()
    }

    pub fn count(&self, op: HwOp) -> usize {
        self.state.lock().ops.iter().filter(|o| **o == op).count()
    }

    /// Each subsequent hardware operation sleeps this long first.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    pub fn remove_regulator(&self) {
        self.state.lock().regulator_missing = true;
    }

    pub fn mark_gpio_busy(&self) {
        self.state.lock().gpio_busy = true;
    }

    pub fn remove_pwm(&self) {
        self.state.lock().pwm_missing = true;
    }

    pub fn fail_regulator_enable(&self, fail: bool) {
        self.state.lock().fail_regulator_enable = fail;
    }

    fn apply<T>(&self, op: HwOp, f: impl FnOnce(&mut SimState) -> Result<T, HardwareError>) -> Result<T, HardwareError> {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        let out = {
            let mut st = self.state.lock();
            let out = f(&mut st);
            if out.is_ok() {
                st.ops.push(op);
            }
            out
        };
        if out.is_ok() {
            let _ = self.tx.send(op);
        }
        out
    }

    fn log_only(&self, op: HwOp) {
        self.state.lock().ops.push(op);
        let _ = self.tx.send(op);
    }
}

impl Platform for SimBoard {
    fn acquire_power_rail(&mut self, name: &str) -> Result<Box<dyn PowerRail>, HardwareError> {
        {
            let mut st = self.state.lock();
            if st.regulator_missing {
                return Err(HardwareError::RegulatorUnavailable(name.to_string()));
            }
            st.hw.rail_held = true;
        }
        self.log_only(HwOp::Acquired("regulator"));
        debug!("[Sim] regulator {} acquired", name);
        Ok(Box::new(SimPowerRail { board: self.clone() }))
    }

    fn acquire_drive_output(&mut self, pwm_channel: u32) -> Result<Box<dyn DriveOutput>, HardwareError> {
        let (gpio_busy, pwm_missing) = {
            let st = self.state.lock();
            (st.gpio_busy, st.pwm_missing)
        };
        if gpio_busy {
            return Err(HardwareError::GpioUnavailable("VIB_EN".into()));
        }
        self.log_only(HwOp::Acquired("gpio"));
        if pwm_missing {
            self.log_only(HwOp::Released("gpio"));
            return Err(HardwareError::PwmUnavailable(pwm_channel));
        }
        self.state.lock().hw.output_held = true;
        self.log_only(HwOp::Acquired("pwm"));
        Ok(Box::new(SimDriveOutput { board: self.clone() }))
    }
}

pub struct SimPowerRail {
    board: SimBoard,
}

impl PowerRail for SimPowerRail {
    fn is_enabled(&self) -> bool {
        self.board.state.lock().hw.regulator_on
    }

    fn enable(&mut self) -> Result<(), HardwareError> {
        self.board.apply(HwOp::RegulatorEnable, |st| {
            if st.fail_regulator_enable {
                return Err(HardwareError::OperationFailed {
                    op: "regulator_enable",
                    reason: "injected fault".into(),
                });
            }
            st.hw.regulator_on = true;
            st.hw.regulator_enables += 1;
            Ok(())
        })
    }

    fn disable(&mut self) -> Result<(), HardwareError> {
        self.board.apply(HwOp::RegulatorDisable, |st| {
            st.hw.regulator_on = false;
            Ok(())
        })
    }
}

impl Drop for SimPowerRail {
    fn drop(&mut self) {
        self.board.state.lock().hw.rail_held = false;
        self.board.log_only(HwOp::Released("regulator"));
    }
}

pub struct SimDriveOutput {
    board: SimBoard,
}

impl DriveOutput for SimDriveOutput {
    fn set_pwm_pin_function(&mut self, function: PinFunction) -> Result<(), HardwareError> {
        self.board.apply(HwOp::PinFunction(function), |st| {
            st.hw.pin = function;
            Ok(())
        })
    }

    fn pwm_config(&mut self, duty_ns: u32, period_ns: u32) -> Result<(), HardwareError> {
        if duty_ns > period_ns {
            return Err(HardwareError::OperationFailed {
                op: "pwm_config",
                reason: format!("duty {} exceeds period {}", duty_ns, period_ns),
            });
        }
        self.board.apply(HwOp::PwmConfig { duty_ns, period_ns }, |st| {
            st.hw.duty_ns = duty_ns;
            st.hw.period_ns = period_ns;
            Ok(())
        })
    }

    fn pwm_enable(&mut self) -> Result<(), HardwareError> {
        self.board.apply(HwOp::PwmEnable, |st| {
            st.hw.pwm_on = true;
            st.hw.pwm_enables += 1;
            Ok(())
        })
    }

    fn pwm_disable(&mut self) {
        let _ = self.board.apply(HwOp::PwmDisable, |st| {
            st.hw.pwm_on = false;
            Ok(())
        });
    }

    fn set_enable_line(&mut self, level: Level) -> Result<(), HardwareError> {
        self.board.apply(HwOp::EnableLine(level), |st| {
            st.hw.enable_line = level;
            Ok(())
        })
    }
}

impl Drop for SimDriveOutput {
    fn drop(&mut self) {
        self.board.state.lock().hw.output_held = false;
        self.board.log_only(HwOp::Released("pwm"));
        self.board.log_only(HwOp::Released("gpio"));
    }
}
