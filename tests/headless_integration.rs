use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use pomux::app::run_until_quit;
use pomux::clock::SystemClock;
use pomux::display::{MemoryDisplay, PROMPT_ROW, STATUS_ROW, TIME_ROW};
use pomux::runtime::{FixedTicker, PomuxEvent, Runner, TestEventSource};
use pomux::title::RecordingTitle;
use pomux::{Phase, SessionScheduler, SessionTable, SessionType, TimerContext};

// Headless integration using the runtime + scheduler without a TTY.
// Timers run on the real clock with a short first session.

struct Rig {
    display: Arc<MemoryDisplay>,
    title: Arc<RecordingTitle>,
    tx: Sender<PomuxEvent>,
    runner: Runner<TestEventSource, FixedTicker>,
    scheduler: SessionScheduler,
}

fn rig(first_session: Duration) -> Rig {
    let display = Arc::new(MemoryDisplay::new());
    let title = Arc::new(RecordingTitle::new());
    let (tx, rx) = mpsc::channel();
    let ctx = TimerContext {
        clock: Arc::new(SystemClock),
        display: display.clone(),
        title: title.clone(),
        events: tx.clone(),
        refresh_interval: Duration::from_millis(10),
    };
    let scheduler =
        SessionScheduler::start(Arc::new(SessionTable::standard()), ctx, Some(first_session));
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    Rig {
        display,
        title,
        tx,
        runner,
        scheduler,
    }
}

fn key(code: KeyCode) -> PomuxEvent {
    PomuxEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

#[test]
fn short_session_completes_then_quits_from_prompt() {
    let mut rig = rig(Duration::from_millis(100));

    // Producer: answer the prompt after the session has had time to finish,
    // with a ctrl-c backstop so a missed completion fails instead of hanging
    let keys = rig.tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        let _ = keys.send(key(KeyCode::Char('a')));
        let _ = keys.send(key(KeyCode::Char('q')));
        thread::sleep(Duration::from_secs(3));
        let _ = keys.send(PomuxEvent::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
    });

    run_until_quit(&mut rig.scheduler, &rig.runner, || {});

    assert_eq!(rig.scheduler.total_completed(), 1);
    assert_eq!(rig.scheduler.working_sessions_completed(), 1);
    assert_eq!(rig.scheduler.phase(), Phase::Quit);
    assert!(rig
        .display
        .row(STATUS_ROW)
        .starts_with("Session is now complete."));
    assert_eq!(
        rig.display.row(PROMPT_ROW),
        "Press q/x to exit, or ENTER to advance"
    );

    let statuses = rig.title.statuses();
    assert_eq!(statuses.first().map(String::as_str), Some("0:00"));
    assert_eq!(statuses.last().map(String::as_str), Some("DONE"));
    assert_eq!(rig.title.restore_count(), 1);
}

#[test]
fn advancing_from_prompt_starts_a_short_break() {
    let mut rig = rig(Duration::from_millis(60));

    let mut completed = false;
    for _ in 0..400u32 {
        match rig.runner.step() {
            PomuxEvent::SessionComplete => {
                rig.scheduler.on_session_complete();
                completed = true;
                rig.tx.send(key(KeyCode::Enter)).unwrap();
            }
            PomuxEvent::Key(k) => {
                rig.scheduler.handle_key(k);
                if completed {
                    break;
                }
            }
            _ => {}
        }
    }

    assert!(completed, "first session should have finished");
    assert_eq!(
        rig.scheduler.phase(),
        Phase::Running(SessionType::ShortBreak)
    );
    let timer = rig.scheduler.timer().expect("break timer is live");
    assert_eq!(timer.interval(), Duration::from_secs(300));

    thread::sleep(Duration::from_millis(60));
    // readouts truncate, so a fresh 5 minute break already reads 4:59
    assert_eq!(rig.display.row(TIME_ROW), "4:59");
}

#[test]
fn paused_session_does_not_complete_until_resumed() {
    let mut rig = rig(Duration::from_millis(150));
    rig.tx.send(key(KeyCode::Char('p'))).unwrap();

    // ~400ms of paused time: no completion may arrive
    for _ in 0..80u32 {
        match rig.runner.step() {
            PomuxEvent::Key(k) => {
                rig.scheduler.handle_key(k);
            }
            PomuxEvent::SessionComplete => panic!("paused timer completed"),
            _ => {}
        }
    }
    assert_eq!(rig.display.row(STATUS_ROW), "Paused");

    rig.tx.send(key(KeyCode::Char(' '))).unwrap();
    let mut completed = false;
    for _ in 0..400u32 {
        match rig.runner.step() {
            PomuxEvent::Key(k) => {
                rig.scheduler.handle_key(k);
            }
            PomuxEvent::SessionComplete => {
                rig.scheduler.on_session_complete();
                completed = true;
                break;
            }
            _ => {}
        }
    }
    assert!(completed, "resumed timer should complete");
    assert_eq!(rig.scheduler.phase(), Phase::AwaitingAdvance);
}

#[test]
fn ctrl_c_mid_session_quits_and_restores_title() {
    let mut rig = rig(Duration::from_secs(60));
    rig.tx
        .send(PomuxEvent::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )))
        .unwrap();

    run_until_quit(&mut rig.scheduler, &rig.runner, || {});

    assert!(rig.scheduler.is_quit());
    assert!(rig.scheduler.timer().is_none());
    assert_eq!(rig.scheduler.total_completed(), 0);
    assert_eq!(rig.title.restore_count(), 1);
}
