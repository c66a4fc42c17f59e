//! controller.rs
//! Timed vibrator controller: "run for N ms" over a PWM motor, its regulator
//! and a GPIO enable line.
//!
//! Three execution contexts meet here:
//! - caller (`request_run`): may block while cancelling an in-flight transition
//! - timer expiry (`on_deadline`): never blocks, only zeroes the target and queues work
//! - deferred worker (`transition`): the only context touching the hardware
//!
//! The transition task acts on the *requested* timeout, not on the timer, so the
//! explicit stop path and the expiry path converge on one idempotent sequence.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::config::VibratorConfig;
use crate::control::duty::{DutyConfig, DutySetting};
use crate::error::{HardwareError, VibratorResult};
use crate::hardware::{DriveOutput, Level, PinFunction, PowerRail};
use crate::scheduling::{
    executor::{DeferredExecutor, WorkHandle},
    timer::DeadlineTimer,
};
use crate::utils::telemetry::{Event, EventRecorder};

/// Clamp a requested duration into the armable range.
/// `<= 0` means stop and maps to 0.
#[inline]
pub fn clamp_timeout(value_ms: i64, min_ms: u32, max_ms: u32) -> u32 {
    if value_ms <= 0 {
        0
    } else if value_ms < min_ms as i64 {
        min_ms
    } else if value_ms > max_ms as i64 {
        max_ms
    } else {
        value_ms as u32
    }
}

/// Observable controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    /// A transition is queued or executing.
    Transitioning,
}

struct Hardware {
    rail: Box<dyn PowerRail>,
    output: Box<dyn DriveOutput>,
}

impl Hardware {
    fn energize(&mut self, duty_ns: u32, period_ns: u32) -> Result<(), HardwareError> {
        self.output.set_pwm_pin_function(PinFunction::Pwm)?;
        if !self.rail.is_enabled() {
            self.rail.enable()?;
        }
        self.output.pwm_config(duty_ns, period_ns)?;
        self.output.pwm_enable()?;
        self.output.set_enable_line(Level::High)
    }

    /// Best effort: every step is attempted even if an earlier one failed.
    fn de_energize(&mut self) -> Vec<(&'static str, HardwareError)> {
        let mut faults = Vec::new();

        self.output.pwm_disable();
        if let Err(e) = self.output.set_pwm_pin_function(PinFunction::Output) {
            faults.push(("pwm_pin_output", e));
        }
        if self.rail.is_enabled() {
            if let Err(e) = self.rail.disable() {
                faults.push(("regulator_disable", e));
            }
        }
        if let Err(e) = self.output.set_enable_line(Level::Low) {
            faults.push(("enable_line_low", e));
        }
        faults
    }
}

/// State shared between the three contexts.
struct ActuatorState {
    running: AtomicBool,
    requested_timeout_ms: AtomicU32,
    duty: DutyConfig,
    period_ns: u32,
    /// Guards the arm / do-not-arm decision against timer expiry.
    arm_lock: Mutex<()>,
    /// Only locked by the transition body (and teardown once the worker is idle).
    hw: Mutex<Hardware>,
    recorder: Arc<EventRecorder>,
}

impl ActuatorState {
    /// Timer-expiry context: no hardware, no blocking.
    fn on_deadline(&self, work: &WorkHandle) {
        {
            let _guard = self.arm_lock.lock();
            self.requested_timeout_ms.store(0, Ordering::SeqCst);
        }
        work.schedule();
        self.recorder.record(Event::TimerExpired { ts_ns: self.recorder.now_ns() });
    }

    /// Deferred context: drive the hardware to match the requested timeout.
    fn transition(&self) {
        let timeout = self.requested_timeout_ms.load(Ordering::SeqCst);
        let running = self.running.load(Ordering::SeqCst);

        if (timeout == 0) != running {
            // Already off for a stop, or already on for a run.
            self.recorder.record(Event::TransitionSkipped {
                ts_ns: self.recorder.now_ns(),
                timeout_ms: timeout,
                running,
            });
            return;
        }

        let mut hw = self.hw.lock();
        if timeout == 0 {
            self.power_down(&mut hw);
            return;
        }

        debug!("[VIB] transition on, timeout: {}ms", timeout);
        let duty_ns = self.duty.duty_value();
        match hw.energize(duty_ns, self.period_ns) {
            Ok(()) => {
                self.running.store(true, Ordering::SeqCst);
                self.recorder.record(Event::TransitionOn {
                    ts_ns: self.recorder.now_ns(),
                    timeout_ms: timeout,
                    duty_ns,
                    period_ns: self.period_ns,
                });
            }
            Err(e) => {
                error!("[VIB] enable sequence failed: {}", e);
                self.record_fault("enable_sequence");
                // Back out so that "not running" still means rail off, line low.
                for (op, e) in hw.de_energize() {
                    error!("[VIB] {} failed while backing out: {}", op, e);
                    self.record_fault(op);
                }
            }
        }
    }

    fn power_down(&self, hw: &mut Hardware) {
        for (op, e) in hw.de_energize() {
            error!("[VIB] {} failed: {}", op, e);
            self.record_fault(op);
        }
        self.running.store(false, Ordering::SeqCst);
        self.recorder.record(Event::TransitionOff { ts_ns: self.recorder.now_ns() });
    }

    fn record_fault(&self, op: &'static str) {
        self.recorder.record(Event::HardwareFault { ts_ns: self.recorder.now_ns(), op });
    }
}

pub struct VibratorController {
    state: Arc<ActuatorState>,
    // Declared before `work`: the timer callback holds a handle to it.
    timer: DeadlineTimer,
    work: DeferredExecutor,
    /// Orders concurrent callers; never taken by the timer or the worker.
    request_lock: Mutex<()>,
    min_timeout_ms: u32,
    max_timeout_ms: u32,
    shut_down: AtomicBool,
}

impl VibratorController {
    /// Take ownership of acquired hardware and start the timer and worker threads.
    /// The hardware is expected to be in its safe initial state (enable line low).
    pub fn new(
        rail: Box<dyn PowerRail>,
        output: Box<dyn DriveOutput>,
        config: &VibratorConfig,
        recorder: Arc<EventRecorder>,
    ) -> VibratorResult<Self> {
        let state = Arc::new(ActuatorState {
            running: AtomicBool::new(false),
            requested_timeout_ms: AtomicU32::new(0),
            duty: DutyConfig::new(config.pwm),
            period_ns: config.pwm.period_ns,
            arm_lock: Mutex::new(()),
            hw: Mutex::new(Hardware { rail, output }),
            recorder,
        });

        let worker_state = state.clone();
        let work = DeferredExecutor::spawn("vib-work", config.rt_core, move || worker_state.transition())?;

        let timer_state = state.clone();
        let timer_work = work.handle();
        let timer = DeadlineTimer::spawn("vib-hrtimer", config.rt_core, move || {
            timer_state.on_deadline(&timer_work)
        })?;

        Ok(Self {
            state,
            timer,
            work,
            request_lock: Mutex::new(()),
            min_timeout_ms: config.min_timeout_ms,
            max_timeout_ms: config.max_timeout_ms,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Run the motor for `value_ms` (clamped), or stop it when `value_ms <= 0`.
    /// Hardware effects happen asynchronously on the worker.
    pub fn request_run(&self, value_ms: i64) {
        let _order = self.request_lock.lock();
        if self.shut_down.load(Ordering::SeqCst) {
            warn!("[VIB] request_run({}) after shutdown ignored", value_ms);
            return;
        }

        self.work.cancel_sync();
        self.timer.cancel();

        let timeout = clamp_timeout(value_ms, self.min_timeout_ms, self.max_timeout_ms);
        self.state.requested_timeout_ms.store(timeout, Ordering::SeqCst);
        self.work.schedule();

        {
            let _guard = self.state.arm_lock.lock();
            if timeout > 0 {
                self.timer.start(Duration::from_millis(timeout as u64));
            }
        }

        self.state.recorder.record(Event::RunRequested {
            ts_ns: self.state.recorder.now_ns(),
            requested_ms: value_ms,
            effective_ms: timeout,
        });
    }

    /// Milliseconds until the deadline, 0 when no deadline is armed.
    #[inline]
    pub fn remaining_time(&self) -> u64 {
        self.timer
            .remaining()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// A running motor keeps its current duty; the new value applies from the next run.
    pub fn set_duty_percent(&self, percent: i64) -> DutySetting {
        let setting = self.state.duty.set_percent(percent);
        self.state.recorder.record(Event::DutyChanged {
            ts_ns: self.state.recorder.now_ns(),
            percent: setting.percent,
            duty_ns: setting.duty_ns,
            coerced: setting.coerced,
        });
        setting
    }

    #[inline]
    pub fn get_duty_percent(&self) -> u32 {
        self.state.duty.percent()
    }

    #[inline]
    pub fn duty_value(&self) -> u32 {
        self.state.duty.duty_value()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn requested_timeout_ms(&self) -> u32 {
        self.state.requested_timeout_ms.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> Phase {
        if self.work.is_busy() {
            Phase::Transitioning
        } else if self.is_running() {
            Phase::Running
        } else {
            Phase::Idle
        }
    }

    pub fn recorder(&self) -> &Arc<EventRecorder> {
        &self.state.recorder
    }

    /// Block until no transition is queued or executing.
    pub fn settle(&self) {
        self.work.flush();
    }

    /// Stop the deadline, force the hardware off and stop both threads. Idempotent.
    pub fn shutdown(&self) {
        let _order = self.request_lock.lock();
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.timer.shutdown();
        self.work.cancel_sync();
        self.work.shutdown();

        // Worker is gone; apply the OFF sequence from here.
        self.state.requested_timeout_ms.store(0, Ordering::SeqCst);
        if self.state.running.load(Ordering::SeqCst) {
            let mut hw = self.state.hw.lock();
            self.state.power_down(&mut hw);
        }
        info!("[VIB] controller shut down");
    }
}

impl Drop for VibratorController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
