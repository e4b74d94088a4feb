//! Per-run log collector
//!
//! A [`RunLog`] is created for each batch, handed down to everything that
//! reports progress for an account, and exported once the batch is over.
//! Every entry is also emitted as a `tracing` event when it is recorded.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub at: DateTime<Local>,
    /// Masked account the entry is about
    pub account: Option<String>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - ",
            self.level.as_str(),
            self.at.format("%Y-%m-%d %H:%M:%S")
        )?;
        if let Some(account) = &self.account {
            write!(f, "[{account}] ")?;
        }
        f.write_str(&self.message)
    }
}

pub struct RunLog {
    clock: Arc<dyn Clock>,
    entries: Vec<LogEntry>,
}

impl RunLog {
    /// Empty log whose entries are stamped with `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Vec::new(),
        }
    }

    pub fn info(&mut self, account: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Info, account, message.into());
    }

    pub fn success(&mut self, account: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Success, account, message.into());
    }

    pub fn warn(&mut self, account: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Warn, account, message.into());
    }

    pub fn error(&mut self, account: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Error, account, message.into());
    }

    fn record(&mut self, level: LogLevel, account: Option<&str>, message: String) {
        let tag = account.unwrap_or("-");
        match level {
            LogLevel::Info => info!(account = tag, "{}", message),
            LogLevel::Success => info!(account = tag, outcome = "success", "{}", message),
            LogLevel::Warn => warn!(account = tag, "{}", message),
            LogLevel::Error => error!(account = tag, "{}", message),
        }

        self.entries.push(LogEntry {
            level,
            at: self.clock.now().with_timezone(&Local),
            account: account.map(str::to_string),
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    /// Render every entry, one per line
    pub fn export(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeDelta, TimeZone};

    fn clock_at(hour: u32) -> Arc<ManualClock> {
        let start = Local.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap();
        Arc::new(ManualClock::new(start.to_utc()))
    }

    #[test]
    fn test_entries_are_kept_in_order() {
        let mut log = RunLog::new(clock_at(9));
        log.info(None, "starting");
        log.warn(Some("138****8000"), "cached app token is no longer valid");
        log.success(Some("138****8000"), "submitted 12000 steps");

        let levels: Vec<_> = log.entries().iter().map(|e| e.level).collect();
        assert_eq!(levels, [LogLevel::Info, LogLevel::Warn, LogLevel::Success]);
        assert_eq!(log.count(LogLevel::Warn), 1);
    }

    #[test]
    fn test_export_format() {
        let clock = clock_at(9);
        let mut log = RunLog::new(clock.clone());
        log.error(Some("use****.com"), "login failed");
        clock.advance(TimeDelta::seconds(90));
        log.info(None, "done");

        assert_eq!(
            log.export(),
            "[ERROR] 2026-10-19 09:00:00 - [use****.com] login failed\n\
             [INFO] 2026-10-19 09:01:30 - done"
        );
    }
}
