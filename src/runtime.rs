use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Unified event type consumed by the controller loop
#[derive(Clone, Debug)]
pub enum PomuxEvent {
    Key(KeyEvent),
    Resize,
    /// The live countdown ran out.
    SessionComplete,
    Tick,
}

/// Source of controller events (keyboard, resize, timer signals)
pub trait PomuxEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<PomuxEvent, RecvTimeoutError>;
}

/// Production event source: a crossterm reader thread plus a sender that
/// timers use to report completion
pub struct CrosstermEventSource {
    tx: Sender<PomuxEvent>,
    rx: Receiver<PomuxEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let keys = tx.clone();

        std::thread::spawn(move || loop {
            match event::read() {
                // ignore key releases on terminals that report them
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    if keys.send(PomuxEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if keys.send(PomuxEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { tx, rx }
    }

    /// Sender feeding the same queue as the keyboard.
    pub fn sender(&self) -> Sender<PomuxEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PomuxEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PomuxEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<PomuxEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<PomuxEvent>) -> Self {
        Self { rx }
    }
}

impl PomuxEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PomuxEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that hands the controller one event at a time
pub struct Runner<E: PomuxEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: PomuxEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> PomuxEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                PomuxEvent::Tick
            }
        }
    }
}
