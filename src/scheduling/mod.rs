//scheduling: timer-expiry and deferred-work contexts for the vibrator core.
//Both run on dedicated max-priority threads, optionally pinned to one core.
pub mod timer;
pub mod executor;

use std::thread::{self, JoinHandle};

use core_affinity::{get_core_ids, set_for_current};
use log::{debug, warn};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::error::{VibratorError, VibratorResult};

/// Spawn a named thread at max OS priority (best effort), pinned to `core`
/// when one is given.
pub(crate) fn spawn_rt_thread<F>(
    name: &'static str,
    core: Option<usize>,
    body: F,
) -> VibratorResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn_with_priority(ThreadPriority::Max, move |prio| {
            if let Err(e) = prio {
                // Unprivileged hosts refuse RT priorities; keep running at default.
                debug!("[{}] running without max priority: {:?}", name, e);
            }

            if let Some(core) = core {
                let core_ids = get_core_ids().unwrap_or_default();
                match core_ids.get(core) {
                    Some(core_id) if set_for_current(*core_id) => {
                        debug!("[{}] pinned to core {}", name, core);
                    }
                    Some(_) => warn!("[{}] failed to pin to core {}", name, core),
                    None => warn!("[{}] core {} not found among available cores", name, core),
                }
            }

            body();
        })
        .map_err(|source| VibratorError::Spawn { name, source })
}
