//! Pause/resume-capable countdown for a single session.
//!
//! A running timer owns two pieces of background work: a one-shot completion
//! task armed for the remaining time, and a refresh loop that pushes the
//! `M:SS` readout to the display and window title whenever it changes. Every
//! state transition, every refresh push and the completion check happen
//! under one mutex, so a pause racing an expiry resolves to exactly one of
//! the two outcomes.
//!
//! Completion does not call back into the scheduler. It sends
//! [`PomuxEvent::SessionComplete`] on the controller's channel and the
//! controller thread does the rest.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::display::{DisplaySink, TIME_ROW};
use crate::runtime::PomuxEvent;
use crate::task::{schedule_once, schedule_repeating, TaskHandle};
use crate::title::WindowTitle;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(50);

/// Render seconds as `M:SS`, truncating fractions and clamping below zero.
pub fn format_timestamp(seconds: f64) -> String {
    let whole = if seconds > 0.0 { seconds as u64 } else { 0 };
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Running,
    Paused,
}

/// Everything a timer needs from its owner, shared across sessions
#[derive(Clone)]
pub struct TimerContext {
    pub clock: Arc<dyn Clock>,
    pub display: Arc<dyn DisplaySink>,
    pub title: Arc<dyn WindowTitle>,
    pub events: Sender<PomuxEvent>,
    pub refresh_interval: Duration,
}

struct Inner {
    /// Authoritative while paused; the baseline for `started_at` while running.
    remaining_at_last_pause: f64,
    started_at: Option<Instant>,
    last_pushed: Option<String>,
    /// Bumped on every transition so a completion armed earlier can tell it is stale.
    epoch: u64,
    completion: Option<TaskHandle>,
    refresher: Option<TaskHandle>,
    refresh_active: bool,
    expired: bool,
    dead: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    ctx: TimerContext,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn elapsed(&self, inner: &Inner) -> f64 {
        match inner.started_at {
            Some(started_at) => self
                .ctx
                .clock
                .now()
                .saturating_duration_since(started_at)
                .as_secs_f64(),
            None => 0.0,
        }
    }

    fn time_remaining(&self, inner: &Inner) -> f64 {
        inner.remaining_at_last_pause - self.elapsed(inner)
    }

    fn pause(&self, inner: &mut Inner) {
        assert!(!inner.dead, "Cannot pause a timer that has been torn down");
        assert!(
            inner.started_at.is_some(),
            "Cannot pause when no timer is running"
        );
        if let Some(completion) = inner.completion.take() {
            completion.cancel();
        }
        let elapsed = self.elapsed(inner);
        inner.remaining_at_last_pause -= elapsed;
        inner.started_at = None;
        inner.epoch += 1;
        debug!(remaining = inner.remaining_at_last_pause, "timer paused");
    }

    fn resume(self: &Arc<Self>, inner: &mut Inner) {
        assert!(!inner.dead, "Cannot resume a timer that has been torn down");
        assert!(!inner.expired, "Cannot resume a timer that has run out");
        assert!(
            inner.started_at.is_none(),
            "Cannot resume when a timer is running"
        );
        inner.started_at = Some(self.ctx.clock.now());
        inner.epoch += 1;

        let epoch = inner.epoch;
        let weak = Arc::downgrade(self);
        let delay = Duration::from_secs_f64(inner.remaining_at_last_pause.max(0.0));
        inner.completion = Some(schedule_once(delay, move || complete(&weak, epoch)));

        if !inner.refresh_active {
            let weak = Arc::downgrade(self);
            inner.refresher = Some(schedule_repeating(self.ctx.refresh_interval, move || {
                refresh(&weak)
            }));
            inner.refresh_active = true;
        }
        debug!(remaining = inner.remaining_at_last_pause, "timer resumed");
    }
}

fn complete(weak: &Weak<Shared>, epoch: u64) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let mut inner = shared.lock();
    if inner.dead || inner.expired || inner.epoch != epoch || inner.started_at.is_none() {
        debug!(epoch, "discarding stale completion");
        return;
    }
    inner.remaining_at_last_pause = 0.0;
    inner.started_at = None;
    inner.expired = true;
    inner.completion = None;
    info!("countdown finished");
    if shared.ctx.events.send(PomuxEvent::SessionComplete).is_err() {
        warn!("controller is gone, completion not delivered");
    }
}

/// One refresh-loop firing. Returns whether the loop should keep going.
fn refresh(weak: &Weak<Shared>) -> bool {
    let Some(shared) = weak.upgrade() else {
        return false;
    };
    let mut inner = shared.lock();
    if inner.dead || inner.expired {
        inner.refresh_active = false;
        return false;
    }

    let timestamp = format_timestamp(shared.time_remaining(&inner));
    if inner.last_pushed.as_deref() != Some(timestamp.as_str()) {
        shared.ctx.display.write(TIME_ROW, &timestamp);
        if let Err(e) = shared.ctx.title.set_status(&timestamp) {
            warn!(error = %e, "failed to update window title");
        }
        inner.last_pushed = Some(timestamp);
    }

    if inner.started_at.is_some() {
        true
    } else {
        inner.refresh_active = false;
        false
    }
}

/// Countdown for one session, running from the moment it is created
pub struct CountdownTimer {
    shared: Arc<Shared>,
    interval: Duration,
}

impl CountdownTimer {
    pub fn start(interval: Duration, ctx: &TimerContext) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                remaining_at_last_pause: interval.as_secs_f64(),
                started_at: None,
                last_pushed: None,
                epoch: 0,
                completion: None,
                refresher: None,
                refresh_active: false,
                expired: false,
                dead: false,
            }),
            ctx: ctx.clone(),
        });
        {
            let mut inner = shared.lock();
            shared.resume(&mut inner);
        }
        info!(secs = interval.as_secs_f64(), "countdown started");
        Self { shared, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the countdown, keeping the time left.
    ///
    /// # Panics
    ///
    /// If the timer is not running.
    pub fn pause(&self) {
        let mut inner = self.shared.lock();
        self.shared.pause(&mut inner);
    }

    /// Continue a paused countdown.
    ///
    /// # Panics
    ///
    /// If the timer is already running or has run out.
    pub fn resume(&self) {
        let mut inner = self.shared.lock();
        self.shared.resume(&mut inner);
    }

    /// Pause if running, resume if paused. Returns `None` once the timer has
    /// run out or been torn down.
    pub fn toggle(&self) -> Option<TimerStatus> {
        let mut inner = self.shared.lock();
        if inner.dead || inner.expired {
            return None;
        }
        if inner.started_at.is_some() {
            self.shared.pause(&mut inner);
            Some(TimerStatus::Paused)
        } else {
            self.shared.resume(&mut inner);
            Some(TimerStatus::Running)
        }
    }

    /// Seconds left. Can dip slightly below zero right at expiry.
    pub fn time_remaining(&self) -> f64 {
        let inner = self.shared.lock();
        self.shared.time_remaining(&inner)
    }

    /// Time left as `M:SS`.
    pub fn timestamp(&self) -> String {
        format_timestamp(self.time_remaining())
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().started_at.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.shared.lock().expired
    }

    /// Cancel all pending work. Once this returns neither the refresh loop
    /// nor the completion task will touch the sinks or the channel again.
    pub fn die(&self) {
        let mut inner = self.shared.lock();
        if inner.dead {
            return;
        }
        inner.dead = true;
        inner.epoch += 1;
        if let Some(completion) = inner.completion.take() {
            completion.cancel();
        }
        if let Some(refresher) = inner.refresher.take() {
            refresher.cancel();
        }
        inner.refresh_active = false;
        debug!("countdown torn down");
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.die();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::display::MemoryDisplay;
    use crate::title::RecordingTitle;
    use std::sync::mpsc::{self, Receiver};
    use std::thread;

    struct Harness {
        display: Arc<MemoryDisplay>,
        title: Arc<RecordingTitle>,
        rx: Receiver<PomuxEvent>,
        ctx: TimerContext,
    }

    fn harness(clock: Arc<dyn Clock>) -> Harness {
        let display = Arc::new(MemoryDisplay::new());
        let title = Arc::new(RecordingTitle::new());
        let (tx, rx) = mpsc::channel();
        let ctx = TimerContext {
            clock,
            display: display.clone(),
            title: title.clone(),
            events: tx,
            refresh_interval: Duration::from_millis(5),
        };
        Harness {
            display,
            title,
            rx,
            ctx,
        }
    }

    #[test]
    fn timestamps_truncate_to_whole_seconds() {
        assert_eq!(format_timestamp(125.4), "2:05");
        assert_eq!(format_timestamp(61.0), "1:01");
        assert_eq!(format_timestamp(59.9), "0:59");
        assert_eq!(format_timestamp(1500.0), "25:00");
        assert_eq!(format_timestamp(0.0), "0:00");
    }

    #[test]
    fn negative_remaining_renders_as_zero() {
        assert_eq!(format_timestamp(-0.03), "0:00");
    }

    #[test]
    fn remaining_tracks_clock_while_running_only() {
        let clock = Arc::new(ManualClock::new());
        let h = harness(clock.clone());
        let timer = CountdownTimer::start(Duration::from_secs(1500), &h.ctx);
        assert!(timer.is_running());

        clock.advance(Duration::from_secs(10));
        assert_eq!(timer.time_remaining(), 1490.0);

        timer.pause();
        clock.advance(Duration::from_secs(100));
        assert_eq!(timer.time_remaining(), 1490.0);
        assert_eq!(timer.timestamp(), "24:50");

        timer.resume();
        clock.advance(Duration::from_millis(4500));
        assert_eq!(timer.time_remaining(), 1485.5);
        timer.die();
    }

    #[test]
    fn pause_then_resume_keeps_remaining() {
        let clock = Arc::new(ManualClock::new());
        let h = harness(clock.clone());
        let timer = CountdownTimer::start(Duration::from_secs(300), &h.ctx);
        clock.advance(Duration::from_secs(42));
        let before = timer.time_remaining();
        timer.pause();
        timer.resume();
        assert_eq!(timer.time_remaining(), before);
    }

    #[test]
    #[should_panic(expected = "Cannot pause when no timer is running")]
    fn pausing_a_paused_timer_is_fatal() {
        let h = harness(Arc::new(ManualClock::new()));
        let timer = CountdownTimer::start(Duration::from_secs(60), &h.ctx);
        timer.pause();
        timer.pause();
    }

    #[test]
    #[should_panic(expected = "Cannot resume when a timer is running")]
    fn resuming_a_running_timer_is_fatal() {
        let h = harness(Arc::new(ManualClock::new()));
        let timer = CountdownTimer::start(Duration::from_secs(60), &h.ctx);
        timer.resume();
    }

    #[test]
    fn refresh_pushes_only_when_readout_changes() {
        let clock = Arc::new(ManualClock::new());
        let h = harness(clock.clone());
        let timer = CountdownTimer::start(Duration::from_secs(1500), &h.ctx);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(h.display.writes_to(TIME_ROW), vec!["25:00"]);
        assert_eq!(h.title.statuses(), vec!["25:00"]);

        clock.advance(Duration::from_millis(1200));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(h.display.writes_to(TIME_ROW), vec!["25:00", "24:58"]);
        assert_eq!(h.title.statuses(), vec!["25:00", "24:58"]);
        timer.die();
    }

    #[test]
    fn refresh_loop_goes_dormant_while_paused() {
        let clock = Arc::new(ManualClock::new());
        let h = harness(clock.clone());
        let timer = CountdownTimer::start(Duration::from_secs(120), &h.ctx);
        thread::sleep(Duration::from_millis(50));

        timer.pause();
        thread::sleep(Duration::from_millis(50));
        let pushed = h.display.writes_to(TIME_ROW).len();

        // the clock moving does not matter while paused
        clock.advance(Duration::from_secs(30));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(h.display.writes_to(TIME_ROW).len(), pushed);

        timer.resume();
        clock.advance(Duration::from_secs(5));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(h.display.row(TIME_ROW), "1:55");
        timer.die();
    }

    #[test]
    fn completion_fires_once_interval_elapses() {
        let h = harness(Arc::new(SystemClock));
        let timer = CountdownTimer::start(Duration::from_millis(80), &h.ctx);
        let ev = h.rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(ev, PomuxEvent::SessionComplete));
        assert!(timer.is_expired());
        assert!(!timer.is_running());
        assert_eq!(timer.time_remaining(), 0.0);
        assert_eq!(timer.toggle(), None);
        assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn pause_cancels_completion_until_resumed() {
        let h = harness(Arc::new(SystemClock));
        let timer = CountdownTimer::start(Duration::from_millis(150), &h.ctx);
        assert_eq!(timer.toggle(), Some(TimerStatus::Paused));
        assert!(h.rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert!(!timer.is_expired());

        assert_eq!(timer.toggle(), Some(TimerStatus::Running));
        let ev = h.rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(ev, PomuxEvent::SessionComplete));
    }

    #[test]
    fn completion_that_lost_the_lock_to_pause_is_discarded() {
        let h = harness(Arc::new(ManualClock::new()));
        let timer = CountdownTimer::start(Duration::from_secs(60), &h.ctx);
        let armed_at = timer.shared.lock().epoch;

        timer.pause();
        complete(&Arc::downgrade(&timer.shared), armed_at);

        assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!timer.is_expired());
        assert_eq!(timer.time_remaining(), 60.0);
        assert_eq!(timer.toggle(), Some(TimerStatus::Running));
        timer.die();
    }

    #[test]
    fn completion_for_the_current_epoch_expires_the_timer() {
        let h = harness(Arc::new(ManualClock::new()));
        let timer = CountdownTimer::start(Duration::from_secs(60), &h.ctx);
        let current = timer.shared.lock().epoch;

        complete(&Arc::downgrade(&timer.shared), current);

        assert!(matches!(h.rx.try_recv(), Ok(PomuxEvent::SessionComplete)));
        assert!(timer.is_expired());
        timer.die();
    }

    #[test]
    fn advancing_a_manual_clock_does_not_fire_completion() {
        let clock = Arc::new(ManualClock::new());
        let h = harness(clock.clone());
        let timer = CountdownTimer::start(Duration::from_secs(60), &h.ctx);

        clock.advance(Duration::from_secs(120));
        assert_eq!(timer.timestamp(), "0:00");
        assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!timer.is_expired());
        timer.die();
    }

    #[test]
    fn nothing_fires_after_die() {
        let h = harness(Arc::new(SystemClock));
        let timer = CountdownTimer::start(Duration::from_millis(100), &h.ctx);
        thread::sleep(Duration::from_millis(20));
        timer.die();
        let writes = h.display.writes().len();
        let calls = h.title.calls().len();

        assert!(h.rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(h.display.writes().len(), writes);
        assert_eq!(h.title.calls().len(), calls);

        // a second teardown is harmless
        timer.die();
    }
}
