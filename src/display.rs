//! Row-addressed output surface.
//!
//! The scheduler and the countdown only ever say "put this text on row N".
//! `TerminalDisplay` keeps the rows and repaints them with ratatui on every
//! write; `MemoryDisplay` records them for tests.

use std::io::{self, Stdout};
use std::sync::Mutex;

use ratatui::{
    backend::CrosstermBackend,
    style::{Modifier, Style},
    text::Line,
    widgets::Paragraph,
    Terminal,
};
use tracing::warn;

pub const TITLE_ROW: u16 = 0;
pub const HELP_ROW: u16 = 1;
pub const TIME_ROW: u16 = 2;
pub const STATUS_ROW: u16 = 3;
pub const PROMPT_ROW: u16 = 4;

pub trait DisplaySink: Send + Sync {
    /// Blank every row.
    fn clear(&self);
    /// Overwrite `row` with `text` and show it immediately.
    fn write(&self, row: u16, text: &str);
}

fn set_row(rows: &mut Vec<String>, row: u16, text: &str) {
    let row = row as usize;
    if rows.len() <= row {
        rows.resize(row + 1, String::new());
    }
    rows[row] = text.to_string();
}

struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    rows: Vec<String>,
}

impl Screen {
    fn draw(&mut self) -> io::Result<()> {
        let lines: Vec<Line> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, text)| {
                if i == TITLE_ROW as usize {
                    Line::styled(text.clone(), Style::default().add_modifier(Modifier::BOLD))
                } else if i == HELP_ROW as usize {
                    Line::styled(text.clone(), Style::default().add_modifier(Modifier::DIM))
                } else {
                    Line::raw(text.clone())
                }
            })
            .collect();
        self.terminal.draw(|f| {
            f.render_widget(Paragraph::new(lines), f.area());
        })?;
        Ok(())
    }
}

/// Display backed by the real terminal (alternate screen, raw mode set up by
/// the caller)
pub struct TerminalDisplay {
    screen: Mutex<Screen>,
}

impl TerminalDisplay {
    pub fn new(stdout: Stdout) -> io::Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            screen: Mutex::new(Screen {
                terminal,
                rows: Vec::new(),
            }),
        })
    }

    /// Repaint the current rows, e.g. after a resize.
    pub fn redraw(&self) {
        let mut screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = screen.draw() {
            warn!(error = %e, "failed to redraw terminal");
        }
    }

    pub fn show_cursor(&self) -> io::Result<()> {
        let mut screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        screen.terminal.show_cursor()
    }
}

impl DisplaySink for TerminalDisplay {
    fn clear(&self) {
        let mut screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        screen.rows.clear();
        if let Err(e) = screen.terminal.clear() {
            warn!(error = %e, "failed to clear terminal");
        }
    }

    fn write(&self, row: u16, text: &str) {
        let mut screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        set_row(&mut screen.rows, row, text);
        if let Err(e) = screen.draw() {
            warn!(error = %e, row, "failed to draw terminal row");
        }
    }
}

/// In-memory display for headless runs and tests
#[derive(Debug, Default)]
pub struct MemoryDisplay {
    rows: Mutex<Vec<String>>,
    writes: Mutex<Vec<(u16, String)>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text of `row`, empty if never written.
    pub fn row(&self, row: u16) -> String {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.get(row as usize).cloned().unwrap_or_default()
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<(u16, String)> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Writes that targeted `row`, in order.
    pub fn writes_to(&self, row: u16) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(r, _)| *r == row)
            .map(|(_, text)| text)
            .collect()
    }
}

impl DisplaySink for MemoryDisplay {
    fn clear(&self) {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn write(&self, row: u16, text: &str) {
        set_row(
            &mut self.rows.lock().unwrap_or_else(|e| e.into_inner()),
            row,
            text,
        );
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((row, text.to_string()));
    }
}
