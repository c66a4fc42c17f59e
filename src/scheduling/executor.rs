//! executor.rs
//! Single-worker deferred executor for one re-schedulable job.
//!
//! The job is registered once at spawn time and runs on a dedicated worker
//! thread whenever it is scheduled:
//! - `schedule()` while already pending is a no-op (single flight)
//! - `schedule()` while the body runs queues exactly one more run
//! - `cancel_sync()` drops a pending run and waits for a running body to finish
//!
//! The worker may block (regulator, pin configuration); schedulers never do.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle, ThreadId},
};

use log::{debug, error};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::VibratorResult;
use crate::scheduling::spawn_rt_thread;

#[derive(Default)]
struct WorkState {
    pending: bool,
    running: bool,
    shutdown: bool,
}

struct WorkShared {
    state: Mutex<WorkState>,
    cond: Condvar,
}

/// Cloneable scheduling handle, safe to use from the timer-expiry context.
#[derive(Clone)]
pub struct WorkHandle {
    shared: Arc<WorkShared>,
}

impl WorkHandle {
    /// Queue the job. Returns false if a run was already pending.
    pub fn schedule(&self) -> bool {
        let mut st = self.shared.state.lock();
        if st.shutdown || st.pending {
            return false;
        }
        st.pending = true;
        self.shared.cond.notify_all();
        true
    }
}

pub struct DeferredExecutor {
    name: &'static str,
    handle: WorkHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl DeferredExecutor {
    pub fn spawn<F>(name: &'static str, rt_core: Option<usize>, job: F) -> VibratorResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(WorkShared {
            state: Mutex::new(WorkState::default()),
            cond: Condvar::new(),
        });

        let worker_shared = shared.clone();
        let worker = spawn_rt_thread(name, rt_core, move || run_worker(name, worker_shared, job))?;
        let worker_id = worker.thread().id();

        Ok(Self {
            name,
            handle: WorkHandle { shared },
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    pub fn handle(&self) -> WorkHandle {
        self.handle.clone()
    }

    #[inline]
    pub fn schedule(&self) -> bool {
        self.handle.schedule()
    }

    /// Drop a pending run and wait for an in-flight body to return.
    /// Returns whether a run was pending.
    pub fn cancel_sync(&self) -> bool {
        let shared = &self.handle.shared;
        let mut st = shared.state.lock();
        let was_pending = st.pending;
        st.pending = false;
        if thread::current().id() != self.worker_id {
            while st.running {
                shared.cond.wait(&mut st);
            }
        }
        was_pending
    }

    /// Wait until nothing is pending or running.
    pub fn flush(&self) {
        if thread::current().id() == self.worker_id {
            return;
        }
        let shared = &self.handle.shared;
        let mut st = shared.state.lock();
        while (st.pending || st.running) && !st.shutdown {
            shared.cond.wait(&mut st);
        }
    }

    /// True while a run is pending or executing.
    pub fn is_busy(&self) -> bool {
        let st = self.handle.shared.state.lock();
        st.pending || st.running
    }

    /// Stop the worker after the current body, dropping any pending run.
    pub fn shutdown(&self) {
        {
            let mut st = self.handle.shared.state.lock();
            st.shutdown = true;
            st.pending = false;
            self.handle.shared.cond.notify_all();
        }
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("[Executor] {} worker panicked", self.name);
            }
        }
    }
}

impl Drop for DeferredExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<F>(name: &'static str, shared: Arc<WorkShared>, mut job: F)
where
    F: FnMut(),
{
    let mut st = shared.state.lock();
    loop {
        while !st.pending && !st.shutdown {
            shared.cond.wait(&mut st);
        }
        if st.shutdown {
            break;
        }

        st.pending = false;
        st.running = true;
        let outcome = MutexGuard::unlocked(&mut st, || panic::catch_unwind(AssertUnwindSafe(&mut job)));
        st.running = false;
        shared.cond.notify_all();

        if outcome.is_err() {
            error!("[Executor] {} job panicked; worker continues", name);
        }
    }
    shared.cond.notify_all();
    debug!("[Executor] {} exiting", name);
}
