//! timer.rs
//! One-shot monotonic deadline timer with a callback fired on its own thread.
//!
//! - `start()` (re)arms relative to `Instant::now()`, immune to wall-clock changes
//! - the callback runs with no timer lock held and must not block
//! - `cancel()` disarms and waits for a callback that is already running
//! - the last millisecond before expiry is spun with `SpinSleeper` for sub-ms accuracy

use std::{
    sync::Arc,
    thread::{self, JoinHandle, ThreadId},
    time::{Duration, Instant},
};

use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::error::VibratorResult;
use crate::scheduling::spawn_rt_thread;

/// Below this, the timer thread spins instead of parking on the condvar.
const SPIN_THRESHOLD: Duration = Duration::from_millis(1);

struct TimerState {
    deadline: Option<Instant>,
    in_callback: bool,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    cond: Condvar,
}

pub struct DeadlineTimer {
    name: &'static str,
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl DeadlineTimer {
    /// Spawn the timer thread. `on_expiry` is invoked once per expiry.
    pub fn spawn<F>(name: &'static str, rt_core: Option<usize>, on_expiry: F) -> VibratorResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                deadline: None,
                in_callback: false,
                shutdown: false,
            }),
            cond: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let handle = spawn_rt_thread(name, rt_core, move || run_timer(name, thread_shared, on_expiry))?;
        let thread_id = handle.thread().id();

        Ok(Self {
            name,
            shared,
            thread: Mutex::new(Some(handle)),
            thread_id,
        })
    }

    /// Arm (or re-arm) the timer to fire `after` from now.
    pub fn start(&self, after: Duration) {
        let mut st = self.shared.state.lock();
        if st.shutdown {
            return;
        }
        st.deadline = Some(Instant::now() + after);
        self.shared.cond.notify_all();
    }

    /// Disarm. Returns whether the timer was armed. Waits for an expiry
    /// callback in progress unless called from that callback.
    pub fn cancel(&self) -> bool {
        let mut st = self.shared.state.lock();
        let was_armed = st.deadline.take().is_some();
        if thread::current().id() != self.thread_id {
            while st.in_callback {
                self.shared.cond.wait(&mut st);
            }
        }
        self.shared.cond.notify_all();
        was_armed
    }

    /// Time left until expiry, `None` when not armed.
    pub fn remaining(&self) -> Option<Duration> {
        let st = self.shared.state.lock();
        st.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Disarm and stop the timer thread. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut st = self.shared.state.lock();
            st.shutdown = true;
            st.deadline = None;
            self.shared.cond.notify_all();
        }
        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("[Timer] {} thread panicked", self.name);
            }
        }
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer<F>(name: &'static str, shared: Arc<TimerShared>, mut on_expiry: F)
where
    F: FnMut(),
{
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let mut st = shared.state.lock();

    loop {
        if st.shutdown {
            break;
        }

        let deadline = match st.deadline {
            Some(d) => d,
            None => {
                shared.cond.wait(&mut st);
                continue;
            }
        };

        let now = Instant::now();
        if now < deadline {
            let left = deadline - now;
            if left > SPIN_THRESHOLD {
                // Wake early and spin the tail; re-check in case of re-arm/cancel.
                let _ = shared.cond.wait_until(&mut st, deadline - SPIN_THRESHOLD);
            } else {
                MutexGuard::unlocked(&mut st, || sleeper.sleep(left));
            }
            continue;
        }

        st.deadline = None;
        st.in_callback = true;
        MutexGuard::unlocked(&mut st, &mut on_expiry);
        st.in_callback = false;
        shared.cond.notify_all();
    }

    debug!("[Timer] {} exiting", name);
}
