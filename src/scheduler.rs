//! Session sequencing and the advance/quit decision between sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, info, warn};

use crate::display::{HELP_ROW, PROMPT_ROW, STATUS_ROW, TITLE_ROW};
use crate::session::{SessionTable, SessionType};
use crate::timer::{CountdownTimer, TimerContext, TimerStatus};

const HELP_TEXT: &str = "p/space: pause or resume    ctrl-c: quit";
const COMPLETE_TEXT: &str = "Session is now complete.";
const PROMPT_TEXT: &str = "Press q/x to exit, or ENTER to advance";
const PAUSED_TEXT: &str = "Paused";
const DONE_STATUS: &str = "DONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running(SessionType),
    AwaitingAdvance,
    Quit,
}

/// What a key press means to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Advance,
    TogglePause,
    Abort,
    Other,
}

impl From<KeyEvent> for KeyAction {
    fn from(key: KeyEvent) -> Self {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => KeyAction::Abort,
                _ => KeyAction::Other,
            };
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('x') => KeyAction::Quit,
            KeyCode::Enter => KeyAction::Advance,
            KeyCode::Char('p') | KeyCode::Char(' ') => KeyAction::TogglePause,
            _ => KeyAction::Other,
        }
    }
}

/// Result of handing a key to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Paused,
    Resumed,
    Advanced(SessionType),
    Quit,
}

pub struct SessionScheduler {
    table: Arc<SessionTable>,
    ctx: TimerContext,
    total_completed: u64,
    working_completed: u64,
    timer: Option<CountdownTimer>,
    phase: Phase,
    title_restored: bool,
}

impl SessionScheduler {
    /// Create the scheduler and begin the first working session, optionally
    /// with a custom length.
    pub fn start(
        table: Arc<SessionTable>,
        ctx: TimerContext,
        first_session: Option<Duration>,
    ) -> Self {
        let mut scheduler = Self {
            table,
            ctx,
            total_completed: 0,
            working_completed: 0,
            timer: None,
            phase: Phase::AwaitingAdvance,
            title_restored: false,
        };
        scheduler.begin_next_session(first_session);
        scheduler
    }

    /// Current session type, or the upcoming one between sessions.
    pub fn session_type(&self) -> SessionType {
        SessionType::after(self.total_completed)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_quit(&self) -> bool {
        self.phase == Phase::Quit
    }

    pub fn total_completed(&self) -> u64 {
        self.total_completed
    }

    pub fn working_sessions_completed(&self) -> u64 {
        self.working_completed
    }

    pub fn timer(&self) -> Option<&CountdownTimer> {
        self.timer.as_ref()
    }

    /// Clear the screen and start counting down the next session.
    ///
    /// # Panics
    ///
    /// If a countdown is already live or the scheduler has quit.
    pub fn begin_next_session(&mut self, duration: Option<Duration>) {
        assert!(self.timer.is_none(), "Cannot have multiple timers running");
        assert!(!self.is_quit(), "Cannot begin a session after quitting");

        let session_type = self.session_type();
        let duration = duration.unwrap_or_else(|| self.table.length(session_type));

        self.ctx.display.clear();
        self.ctx.display.write(TITLE_ROW, self.table.title(session_type));
        self.ctx.display.write(HELP_ROW, HELP_TEXT);

        info!(%session_type, secs = duration.as_secs_f64(), "beginning session");
        self.timer = Some(CountdownTimer::start(duration, &self.ctx));
        self.phase = Phase::Running(session_type);
    }

    /// Handle the live countdown running out. Does nothing unless a session
    /// is running.
    pub fn on_session_complete(&mut self) {
        let Phase::Running(session_type) = self.phase else {
            debug!(phase = ?self.phase, "ignoring completion outside a session");
            return;
        };

        // stop the refresh loop first so it cannot overwrite DONE
        if let Some(timer) = self.timer.take() {
            timer.die();
        }

        let finished_at = Local::now().format("%H:%M");
        self.ctx
            .display
            .write(STATUS_ROW, &format!("{COMPLETE_TEXT} ({finished_at})"));
        if let Err(e) = self.ctx.title.set_status(DONE_STATUS) {
            warn!(error = %e, "failed to update window title");
        }

        self.total_completed += 1;
        if session_type == SessionType::WorkingSession {
            self.working_completed += 1;
        }

        info!(
            %session_type,
            total = self.total_completed,
            working = self.working_completed,
            "session complete"
        );
        self.ctx.display.write(PROMPT_ROW, PROMPT_TEXT);
        self.phase = Phase::AwaitingAdvance;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match (self.phase, KeyAction::from(key)) {
            (Phase::Quit, _) => KeyOutcome::Ignored,
            (_, KeyAction::Abort) | (Phase::AwaitingAdvance, KeyAction::Quit) => {
                self.quit();
                KeyOutcome::Quit
            }
            (Phase::AwaitingAdvance, KeyAction::Advance) => {
                self.begin_next_session(None);
                KeyOutcome::Advanced(self.session_type())
            }
            (Phase::Running(_), KeyAction::TogglePause) => self.toggle_pause(),
            _ => KeyOutcome::Ignored,
        }
    }

    fn toggle_pause(&mut self) -> KeyOutcome {
        let Some(timer) = self.timer.as_ref() else {
            return KeyOutcome::Ignored;
        };
        match timer.toggle() {
            Some(TimerStatus::Paused) => {
                info!(remaining = timer.time_remaining(), "paused");
                self.ctx.display.write(STATUS_ROW, PAUSED_TEXT);
                KeyOutcome::Paused
            }
            Some(TimerStatus::Running) => {
                info!(remaining = timer.time_remaining(), "resumed");
                self.ctx.display.write(STATUS_ROW, "");
                KeyOutcome::Resumed
            }
            // ran out just now; the completion signal is already queued
            None => KeyOutcome::Ignored,
        }
    }

    /// Tear down any live countdown and give the window its name back.
    /// Calling it again is a no-op.
    pub fn quit(&mut self) {
        if self.is_quit() {
            return;
        }
        if let Some(timer) = self.timer.take() {
            timer.die();
        }
        if !self.title_restored {
            self.title_restored = true;
            if let Err(e) = self.ctx.title.restore_original() {
                warn!(error = %e, "failed to restore window title");
            }
        }
        self.phase = Phase::Quit;
        info!(
            total = self.total_completed,
            working = self.working_completed,
            "quit"
        );
    }
}

impl Drop for SessionScheduler {
    fn drop(&mut self) {
        self.quit();
    }
}
