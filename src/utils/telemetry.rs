//! Event recording for the vibrator core.
//!
//! Two independent paths:
//! - **Counters:** per-kind atomics, always updated (tests, status display).
//! - **Queue:** lock-free `ArrayQueue` (16K capacity) drained by an optional
//!   background exporter to CSV (nanosecond timestamps since recorder creation).
//!
//! `record()` never blocks, so it is safe from the timer-expiry context.

use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_queue::ArrayQueue;
use csv::Writer;
use log::{debug, error};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{VibratorError, VibratorResult};

const EVENT_QUEUE_CAPACITY: usize = 16_384;
const EXPORT_POLL_MS: u64 = 5;
const FLUSH_BATCHES: usize = 8;

/// Lifecycle of one vibration: request → transition → expiry → transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Caller asked for a run; `effective_ms` is the clamped value.
    RunRequested { ts_ns: u64, requested_ms: i64, effective_ms: u32 },
    TimerExpired { ts_ns: u64 },
    /// Drive output energized.
    TransitionOn { ts_ns: u64, timeout_ms: u32, duty_ns: u32, period_ns: u32 },
    TransitionOff { ts_ns: u64 },
    /// Transition task found the hardware already in the requested state.
    TransitionSkipped { ts_ns: u64, timeout_ms: u32, running: bool },
    DutyChanged { ts_ns: u64, percent: u32, duty_ns: u32, coerced: bool },
    HardwareFault { ts_ns: u64, op: &'static str },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RunRequested { .. } => "run_requested",
            Event::TimerExpired { .. } => "timer_expired",
            Event::TransitionOn { .. } => "transition_on",
            Event::TransitionOff { .. } => "transition_off",
            Event::TransitionSkipped { .. } => "transition_skipped",
            Event::DutyChanged { .. } => "duty_changed",
            Event::HardwareFault { .. } => "hardware_fault",
        }
    }

    fn ts_ns(&self) -> u64 {
        match *self {
            Event::RunRequested { ts_ns, .. }
            | Event::TimerExpired { ts_ns }
            | Event::TransitionOn { ts_ns, .. }
            | Event::TransitionOff { ts_ns }
            | Event::TransitionSkipped { ts_ns, .. }
            | Event::DutyChanged { ts_ns, .. }
            | Event::HardwareFault { ts_ns, .. } => ts_ns,
        }
    }

    fn to_row(&self, seq: u64) -> CsvRow {
        let (value, detail) = match *self {
            Event::RunRequested { requested_ms, effective_ms, .. } => {
                (effective_ms as i64, format!("requested={}", requested_ms))
            }
            Event::TimerExpired { .. } | Event::TransitionOff { .. } => (0, String::new()),
            Event::TransitionOn { timeout_ms, duty_ns, period_ns, .. } => {
                (timeout_ms as i64, format!("duty={}/{}", duty_ns, period_ns))
            }
            Event::TransitionSkipped { timeout_ms, running, .. } => {
                (timeout_ms as i64, format!("running={}", running))
            }
            Event::DutyChanged { percent, duty_ns, coerced, .. } => {
                (percent as i64, format!("duty={} coerced={}", duty_ns, coerced))
            }
            Event::HardwareFault { op, .. } => (0, op.to_string()),
        };
        CsvRow {
            seq,
            ts_ns: self.ts_ns(),
            event: self.name(),
            value,
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
struct CsvRow {
    seq: u64,
    ts_ns: u64,
    event: &'static str,
    value: i64,
    detail: String,
}

/// Snapshot of the per-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub run_requests: u64,
    pub timer_expiries: u64,
    pub transitions_on: u64,
    pub transitions_off: u64,
    pub transitions_skipped: u64,
    pub duty_changes: u64,
    pub hardware_faults: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    run_requests: AtomicU64,
    timer_expiries: AtomicU64,
    transitions_on: AtomicU64,
    transitions_off: AtomicU64,
    transitions_skipped: AtomicU64,
    duty_changes: AtomicU64,
    hardware_faults: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn slot(&self, event: &Event) -> &AtomicU64 {
        match event {
            Event::RunRequested { .. } => &self.run_requests,
            Event::TimerExpired { .. } => &self.timer_expiries,
            Event::TransitionOn { .. } => &self.transitions_on,
            Event::TransitionOff { .. } => &self.transitions_off,
            Event::TransitionSkipped { .. } => &self.transitions_skipped,
            Event::DutyChanged { .. } => &self.duty_changes,
            Event::HardwareFault { .. } => &self.hardware_faults,
        }
    }
}

/// Non-blocking event recorder with optional background CSV export.
pub struct EventRecorder {
    queue: Arc<ArrayQueue<(u64, Event)>>,
    counters: Counters,
    seq: AtomicU64,
    run_start: Instant,
    exporter_running: Arc<AtomicBool>,
    exporter: Mutex<Option<JoinHandle<()>>>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            counters: Counters::default(),
            seq: AtomicU64::new(1),
            run_start: Instant::now(),
            exporter_running: Arc::new(AtomicBool::new(false)),
            exporter: Mutex::new(None),
        }
    }

    /// Nanosecond timestamp since recorder creation.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    /// Count the event and enqueue it; drops (and counts the drop) if full.
    #[inline]
    pub fn record(&self, event: Event) {
        self.counters.slot(&event).fetch_add(1, Ordering::Relaxed);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        if self.queue.push((seq, event)).is_err() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot_counts(&self) -> EventCounts {
        let c = &self.counters;
        EventCounts {
            run_requests: c.run_requests.load(Ordering::Relaxed),
            timer_expiries: c.timer_expiries.load(Ordering::Relaxed),
            transitions_on: c.transitions_on.load(Ordering::Relaxed),
            transitions_off: c.transitions_off.load(Ordering::Relaxed),
            transitions_skipped: c.transitions_skipped.load(Ordering::Relaxed),
            duty_changes: c.duty_changes.load(Ordering::Relaxed),
            hardware_faults: c.hardware_faults.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    /// Pop queued events without exporting them.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some((_, event)) = self.queue.pop() {
            out.push(event);
        }
        out
    }

    /// Spawn a thread draining the queue into `output_csv`.
    pub fn start_exporter(&self, output_csv: PathBuf) -> VibratorResult<()> {
        let mut slot = self.exporter.lock();
        if slot.is_some() {
            return Err(VibratorError::InvalidInput {
                input: output_csv.display().to_string(),
                reason: "exporter already running".into(),
            });
        }

        let file = File::create(&output_csv).map_err(|e| VibratorError::InvalidInput {
            input: output_csv.display().to_string(),
            reason: e.to_string(),
        })?;

        let queue = self.queue.clone();
        let running = self.exporter_running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("vib-telemetry".into())
            .spawn(move || {
                let mut wtr = Writer::from_writer(BufWriter::new(file));
                let mut flush_counter = 0usize;

                while running.load(Ordering::SeqCst) {
                    let mut any = false;
                    for _ in 0..256 {
                        match queue.pop() {
                            Some((seq, event)) => {
                                any = true;
                                if let Err(e) = wtr.serialize(event.to_row(seq)) {
                                    error!("[Telemetry] csv write failed: {}", e);
                                }
                            }
                            None => break,
                        }
                    }
                    if any {
                        flush_counter += 1;
                        if flush_counter >= FLUSH_BATCHES {
                            wtr.flush().ok();
                            flush_counter = 0;
                        }
                    } else {
                        thread::sleep(Duration::from_millis(EXPORT_POLL_MS));
                    }
                }

                // Final drain
                while let Some((seq, event)) = queue.pop() {
                    wtr.serialize(event.to_row(seq)).ok();
                }
                wtr.flush().ok();
                debug!("[Telemetry] exporter exiting");
            })
            .map_err(|source| {
                self.exporter_running.store(false, Ordering::SeqCst);
                VibratorError::Spawn { name: "vib-telemetry", source }
            })?;

        *slot = Some(handle);
        Ok(())
    }

    /// Flush remaining events and join the exporter. No-op if not running.
    pub fn stop_exporter(&self) {
        self.exporter_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.exporter.lock().take() {
            if handle.join().is_err() {
                error!("[Telemetry] exporter thread panicked");
            }
        }
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        self.stop_exporter();
    }
}
