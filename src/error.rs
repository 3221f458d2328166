use std::io;

use thiserror::Error;

/// Failures of the tmux window-title integration
#[derive(Error, Debug)]
pub enum TitleError {
    #[error("not running inside tmux (TMUX_PANE is unset)")]
    NotInTmux,

    #[error("could not identify the tmux pane running this process")]
    PaneNotFound,

    #[error("no tmux window hosts pane {pane}")]
    WindowNotFound { pane: String },

    #[error("`tmux {}` exited with {status}: {stderr}", .args.join(" "))]
    CommandFailed {
        args: Vec<String>,
        status: String,
        stderr: String,
    },

    #[error("failed to run tmux: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error for the pomux binary and library
#[derive(Error, Debug)]
pub enum PomuxError {
    #[error("window title: {0}")]
    Title(#[from] TitleError),

    #[error("terminal: {0}")]
    Terminal(#[from] io::Error),
}

pub type Result<T, E = PomuxError> = std::result::Result<T, E>;
