// Library surface for the binary, headless integration tests and reuse.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod task;
pub mod timer;
pub mod title;

pub use error::{PomuxError, Result, TitleError};
pub use scheduler::{KeyOutcome, Phase, SessionScheduler};
pub use session::{SessionTable, SessionType};
pub use timer::{CountdownTimer, TimerContext};
