//! Window-title integration.
//!
//! The countdown is mirrored into the name of the tmux window that hosts
//! this process, e.g. `🍅 {12:34}`. The window is resolved from our own
//! pane, so renaming works even when another window is focused.

use std::env;
use std::process::Command;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::TitleError;

pub const DEFAULT_BASENAME: &str = "🍅";

pub trait WindowTitle: Send + Sync {
    /// Show just the base label.
    fn set_base(&self) -> Result<(), TitleError>;
    /// Show the base label with `message` as a bracketed suffix.
    fn set_status(&self, message: &str) -> Result<(), TitleError>;
    /// Put back the name the window had before we touched it.
    fn restore_original(&self) -> Result<(), TitleError>;
}

/// `🍅` + `12:34` -> `🍅 {12:34}`
pub fn status_title(basename: &str, message: &str) -> String {
    format!("{basename} {{{message}}}")
}

/// Seam over invoking the tmux binary
pub trait TmuxRunner: Send + Sync {
    /// Run `tmux <args>` and return its trimmed stdout.
    fn run(&self, args: &[&str]) -> Result<String, TitleError>;
}

/// Runs the real `tmux` executable
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTmux;

impl TmuxRunner for ProcessTmux {
    fn run(&self, args: &[&str]) -> Result<String, TitleError> {
        debug!(?args, "tmux");
        let output = Command::new("tmux").args(args).output()?;
        if !output.status.success() {
            return Err(TitleError::CommandFailed {
                args: args.iter().map(|a| a.to_string()).collect(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Renames the tmux window hosting this process
#[derive(Debug)]
pub struct TmuxTitle<R: TmuxRunner = ProcessTmux> {
    runner: R,
    basename: String,
    window_id: String,
    original_name: String,
}

impl TmuxTitle<ProcessTmux> {
    /// Connect to the window hosting the pane in `$TMUX_PANE`.
    pub fn from_env(basename: impl Into<String>) -> Result<Self, TitleError> {
        let pane = env::var("TMUX_PANE").map_err(|_| TitleError::NotInTmux)?;
        Self::connect(ProcessTmux, basename, &pane)
    }
}

impl<R: TmuxRunner> TmuxTitle<R> {
    /// Resolve the window that owns `pane`, remember its current name and
    /// switch it to the base label.
    pub fn connect(runner: R, basename: impl Into<String>, pane: &str) -> Result<Self, TitleError> {
        let pane = pane.trim();
        if pane.is_empty() {
            return Err(TitleError::PaneNotFound);
        }

        let window_id = runner.run(&["display-message", "-t", pane, "-p", "#{window_id}"])?;
        if window_id.is_empty() {
            return Err(TitleError::WindowNotFound {
                pane: pane.to_string(),
            });
        }
        let original_name = runner.run(&["display-message", "-t", pane, "-p", "#W"])?;
        debug!(pane, %window_id, %original_name, "resolved tmux window");

        let title = Self {
            runner,
            basename: basename.into(),
            window_id,
            original_name,
        };
        title.set_base()?;
        Ok(title)
    }

    #[cfg(test)]
    fn window_id(&self) -> &str {
        &self.window_id
    }

    #[cfg(test)]
    fn original_name(&self) -> &str {
        &self.original_name
    }

    fn rename(&self, name: &str) -> Result<(), TitleError> {
        self.runner
            .run(&["rename-window", "-t", &self.window_id, name])
            .map(|_| ())
    }
}

impl<R: TmuxRunner> WindowTitle for TmuxTitle<R> {
    fn set_base(&self) -> Result<(), TitleError> {
        self.rename(&self.basename)
    }

    fn set_status(&self, message: &str) -> Result<(), TitleError> {
        self.rename(&status_title(&self.basename, message))
    }

    fn restore_original(&self) -> Result<(), TitleError> {
        self.rename(&self.original_name)
    }
}

/// Used when window-title integration is switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTitle;

impl WindowTitle for NullTitle {
    fn set_base(&self) -> Result<(), TitleError> {
        Ok(())
    }

    fn set_status(&self, _message: &str) -> Result<(), TitleError> {
        Ok(())
    }

    fn restore_original(&self) -> Result<(), TitleError> {
        Ok(())
    }
}

/// Restores the original window name on drop unless ownership of the title
/// has been handed on.
///
/// Covers the stretch between renaming the window and the scheduler taking
/// over its cleanup.
pub struct TitleGuard {
    title: Option<Arc<dyn WindowTitle>>,
}

impl TitleGuard {
    pub fn new(title: Arc<dyn WindowTitle>) -> Self {
        Self { title: Some(title) }
    }

    /// Give up the restore duty and return the title for the new owner.
    pub fn hand_over(mut self) -> Arc<dyn WindowTitle> {
        match self.title.take() {
            Some(title) => title,
            None => unreachable!("title is only taken once"),
        }
    }
}

impl Drop for TitleGuard {
    fn drop(&mut self) {
        if let Some(title) = self.title.take() {
            debug!("restoring window title before a session started");
            if let Err(e) = title.restore_original() {
                warn!(error = %e, "failed to restore window title");
            }
        }
    }
}

/// What a `RecordingTitle` was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleCall {
    Base,
    Status(String),
    Restore,
}

/// Title sink that records calls, for tests and headless runs
#[derive(Debug, Default)]
pub struct RecordingTitle {
    calls: Mutex<Vec<TitleCall>>,
}

impl RecordingTitle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TitleCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TitleCall::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn restore_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == TitleCall::Restore)
            .count()
    }

    fn record(&self, call: TitleCall) -> Result<(), TitleError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        Ok(())
    }
}

impl WindowTitle for RecordingTitle {
    fn set_base(&self) -> Result<(), TitleError> {
        self.record(TitleCall::Base)
    }

    fn set_status(&self, message: &str) -> Result<(), TitleError> {
        self.record(TitleCall::Status(message.to_string()))
    }

    fn restore_original(&self) -> Result<(), TitleError> {
        self.record(TitleCall::Restore)
    }
}
