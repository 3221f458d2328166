use std::time::Duration;

/// The three session types defined in Pomodoro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum SessionType {
    #[strum(serialize = "Working Session")]
    WorkingSession,
    #[strum(serialize = "Short Break")]
    ShortBreak,
    #[strum(serialize = "Long Break")]
    LongBreak,
}

impl SessionType {
    #[cfg(test)]
    pub const ALL: [SessionType; 3] = [
        SessionType::WorkingSession,
        SessionType::ShortBreak,
        SessionType::LongBreak,
    ];

    /// Session type that follows `total_completed` finished sessions.
    ///
    /// Work and breaks alternate; every fourth break (count 7 within each
    /// cycle of 8) is a long one.
    pub fn after(total_completed: u64) -> Self {
        if total_completed % 2 == 0 {
            SessionType::WorkingSession
        } else if total_completed % 8 == 7 {
            SessionType::LongBreak
        } else {
            SessionType::ShortBreak
        }
    }

    fn index(self) -> usize {
        match self {
            SessionType::WorkingSession => 0,
            SessionType::ShortBreak => 1,
            SessionType::LongBreak => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionEntry {
    length: Duration,
    title: String,
}

/// Fixed duration and title for each session type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTable {
    entries: [SessionEntry; 3],
}

impl SessionTable {
    /// The canonical 25/5/15 minute table.
    pub fn standard() -> Self {
        let entry = |ty: SessionType, secs: u64| SessionEntry {
            length: Duration::from_secs(secs),
            title: ty.to_string(),
        };
        Self {
            entries: [
                entry(SessionType::WorkingSession, 25 * 60),
                entry(SessionType::ShortBreak, 5 * 60),
                entry(SessionType::LongBreak, 15 * 60),
            ],
        }
    }

    pub fn length(&self, ty: SessionType) -> Duration {
        self.entries[ty.index()].length
    }

    pub fn title(&self, ty: SessionType) -> &str {
        &self.entries[ty.index()].title
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::standard()
    }
}
