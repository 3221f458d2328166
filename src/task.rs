//! Background actions with cancellation handles.
//!
//! Each scheduled action runs on its own thread that sleeps on a condition
//! variable, so `cancel` wakes it immediately instead of waiting out the
//! delay. A cancel and a firing are decided under the same lock: whichever
//! takes it first wins and the other becomes a no-op.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskState {
    Pending,
    Fired,
    Cancelled,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<TaskState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep until `deadline`. Returns the guard if the task is still pending
    /// once the deadline has passed, `None` if it was cancelled meanwhile.
    fn wait_until(&self, deadline: Instant) -> Option<MutexGuard<'_, TaskState>> {
        let mut state = self.lock();
        loop {
            if *state != TaskState::Pending {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return Some(state);
            }
            state = match self.wake.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Cancellation token for a scheduled action
#[derive(Debug, Clone)]
pub struct TaskHandle {
    shared: Arc<Shared>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TaskState::Pending),
                wake: Condvar::new(),
            }),
        }
    }

    /// Cancel work that has not fired yet.
    ///
    /// Returns `true` if this call stopped a pending action. Cancelling an
    /// action that already fired (or was already cancelled) returns `false`.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.lock();
        if *state == TaskState::Pending {
            *state = TaskState::Cancelled;
            self.shared.wake.notify_all();
            true
        } else {
            false
        }
    }

    /// Whether the action can still fire.
    pub fn is_pending(&self) -> bool {
        *self.shared.lock() == TaskState::Pending
    }
}

/// Run `f` once after `delay` unless cancelled first.
///
/// The delay is measured on `Instant::now`, not on a [`crate::clock::Clock`].
pub fn schedule_once<F>(delay: Duration, f: F) -> TaskHandle
where
    F: FnOnce() + Send + 'static,
{
    let handle = TaskHandle::new();
    let shared = Arc::clone(&handle.shared);
    let deadline = Instant::now() + delay;

    thread::spawn(move || {
        if let Some(mut state) = shared.wait_until(deadline) {
            *state = TaskState::Fired;
            drop(state);
            f();
        }
    });

    handle
}

/// Run `f` every `period` for as long as it returns `true`.
///
/// The first run happens one `period` after scheduling. Once `f` returns
/// `false` the task counts as fired and stops rescheduling itself.
pub fn schedule_repeating<F>(period: Duration, mut f: F) -> TaskHandle
where
    F: FnMut() -> bool + Send + 'static,
{
    let handle = TaskHandle::new();
    let shared = Arc::clone(&handle.shared);

    thread::spawn(move || {
        let mut deadline = Instant::now() + period;
        loop {
            match shared.wait_until(deadline) {
                Some(state) => drop(state),
                None => return,
            }
            if !f() {
                let mut state = shared.lock();
                if *state == TaskState::Pending {
                    *state = TaskState::Fired;
                }
                return;
            }
            deadline += period;
            let now = Instant::now();
            if deadline < now {
                // fell behind; skip missed periods instead of bursting
                deadline = now + period;
            }
        }
    });

    handle
}
