//! Worker thread placement and scheduling.
//!
//! CPU pinning via `core_affinity` and SCHED_FIFO real-time priority via
//! `thread-priority`. Both are best-effort: a failure leaves the worker on
//! the default scheduler and is logged, never fatal. SCHED_FIFO typically
//! requires `CAP_SYS_NICE` or root.

use thread_priority::{
    set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
    ThreadPriority, ThreadPriorityValue, ThreadSchedulePolicy,
};
use tracing::{info, warn};

use crate::error::RuntimeError;

/// Apply affinity and scheduling to the calling thread.
pub fn configure_current_thread(
    label: &str,
    core: Option<usize>,
    priority: u8,
    realtime: bool,
) {
    if let Some(id) = core {
        if core_affinity::set_for_current(core_affinity::CoreId { id }) {
            info!("{label}: pinned to CPU core {id}");
        } else {
            warn!("{label}: {}", RuntimeError::SetAffinity { core: id });
        }
    }

    if realtime && priority > 0 {
        match set_realtime_fifo(priority) {
            Ok(()) => info!("{label}: SCHED_FIFO priority {priority}"),
            Err(e) => warn!("{label}: {e} (may require CAP_SYS_NICE)"),
        }
    }
}

/// Switch the calling thread to SCHED_FIFO at `priority` (1-99).
fn set_realtime_fifo(priority: u8) -> Result<(), RuntimeError> {
    let value = ThreadPriorityValue::try_from(priority).map_err(|e| {
        RuntimeError::SetScheduler {
            priority,
            reason: format!("{e:?}"),
        }
    })?;

    set_thread_priority_and_policy(
        thread_native_id(),
        ThreadPriority::Crossplatform(value),
        ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
    )
    .map_err(|e| RuntimeError::SetScheduler {
        priority,
        reason: format!("{e:?}"),
    })
}
