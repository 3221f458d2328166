use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use pomux::{
    app::run_until_quit,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    display::{DisplaySink, TerminalDisplay},
    logging::init_logging,
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    title::{NullTitle, TitleGuard, TmuxTitle, WindowTitle},
    PomuxError, SessionScheduler, SessionTable, TimerContext,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};

const TICK_RATE_MS: u64 = 100;

/// pomodoro timer for the terminal that keeps its countdown in the tmux window title
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Runs 25 minute working sessions separated by 5 minute breaks, with every fourth break stretched to 15 minutes. The countdown is shown on screen and in the name of the tmux window running pomux."
)]
pub struct Cli {
    /// length of the first working session in seconds; later sessions use the standard lengths
    #[clap(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    first_session_secs: Option<u64>,

    /// leave the tmux window title alone (also allows running outside tmux)
    #[clap(long)]
    no_window_title: bool,

    /// config file to use instead of the default location
    #[clap(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        default_hook(info);
    }));
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging();

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = store.load();
    info!(path = %store.path().display(), ?config, "starting");

    // resolve tmux before touching the screen so a failure leaves the shell as it was
    let title: Arc<dyn WindowTitle> = if cli.no_window_title {
        Arc::new(NullTitle)
    } else {
        match TmuxTitle::from_env(config.window_basename.clone()) {
            Ok(title) => Arc::new(title),
            Err(e) => {
                error!(error = %e, "window title unavailable");
                return Err(PomuxError::from(e).into());
            }
        }
    };

    // the window is already renamed; put it back if setup fails before the scheduler owns it
    let title = TitleGuard::new(title);

    install_panic_hook();
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;

    let result = start_tui(&cli, &config, title);
    let restored = restore_terminal();

    Ok(session_outcome(result, restored)?)
}

/// The session's own error wins; a failed terminal restore is reported only
/// when the session ended cleanly.
fn session_outcome(result: pomux::Result<()>, restored: io::Result<()>) -> pomux::Result<()> {
    match (result, restored) {
        (Err(e), Err(restore)) => {
            warn!(error = %restore, "failed to restore terminal");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), restored) => Ok(restored?),
    }
}

fn start_tui(cli: &Cli, config: &Config, title: TitleGuard) -> pomux::Result<()> {
    let display = Arc::new(TerminalDisplay::new(io::stdout())?);
    let events = CrosstermEventSource::new();

    let ctx = TimerContext {
        clock: Arc::new(SystemClock),
        display: display.clone() as Arc<dyn DisplaySink>,
        title: title.hand_over(),
        events: events.sender(),
        refresh_interval: config.refresh_interval(),
    };
    let first_session = cli.first_session_secs.map(Duration::from_secs);
    let mut scheduler = SessionScheduler::start(Arc::new(SessionTable::standard()), ctx, first_session);

    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    run_until_quit(&mut scheduler, &runner, || display.redraw());

    info!(
        total = scheduler.total_completed(),
        working = scheduler.working_sessions_completed(),
        "exiting"
    );
    display.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomux::error::TitleError;

    fn terminal_error(msg: &str) -> io::Error {
        io::Error::other(msg.to_string())
    }

    #[test]
    fn session_error_wins_over_restore_error() {
        let err = session_outcome(
            Err(PomuxError::Title(TitleError::NotInTmux)),
            Err(terminal_error("tcsetattr")),
        )
        .unwrap_err();
        assert!(matches!(err, PomuxError::Title(TitleError::NotInTmux)));
    }

    #[test]
    fn restore_error_surfaces_after_clean_session() {
        let err = session_outcome(Ok(()), Err(terminal_error("tcsetattr"))).unwrap_err();
        assert!(matches!(err, PomuxError::Terminal(ref e) if e.to_string() == "tcsetattr"));
    }

    #[test]
    fn clean_session_and_restore_is_ok() {
        assert!(session_outcome(Ok(()), Ok(())).is_ok());
    }
}
