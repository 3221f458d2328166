use tracing::debug;

use crate::runtime::{PomuxEvent, PomuxEventSource, Runner, Ticker};
use crate::scheduler::SessionScheduler;

/// Drive the scheduler from controller events until it reaches Quit.
///
/// This is the only place keys are read and the only thread that touches
/// the scheduler; timers just drop `SessionComplete` into the same queue.
/// `on_resize` lets the caller repaint its surface.
pub fn run_until_quit<E, T, F>(scheduler: &mut SessionScheduler, runner: &Runner<E, T>, mut on_resize: F)
where
    E: PomuxEventSource,
    T: Ticker,
    F: FnMut(),
{
    while !scheduler.is_quit() {
        match runner.step() {
            PomuxEvent::Key(key) => {
                let outcome = scheduler.handle_key(key);
                debug!(?key, ?outcome, "key");
            }
            PomuxEvent::SessionComplete => scheduler.on_session_complete(),
            PomuxEvent::Resize => on_resize(),
            PomuxEvent::Tick => {}
        }
    }
}
