//! Weekly on/off windows.
//!
//! A schedule is written as seven day markers followed by a daily window:
//!
//! ```text
//! MTWTF-- 0800-1800    on 08:00 to 18:00, Monday to Friday
//! ------S 0000-2359    on all day Sunday
//! ```
//!
//! Each day slot holds its own letter (`M T W T F S S`) or `-`. The window
//! is a closed interval on the same calendar day; windows that cross
//! midnight are not supported and never match.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Local, Timelike};
use regex::Regex;
use thiserror::Error;

/// Letters accepted in each day slot, Monday first.
const DAY_LETTERS: [char; 7] = ['M', 'T', 'W', 'T', 'F', 'S', 'S'];

static SCHEDULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-M])([-T])([-W])([-T])([-F])([-S])([-S]) ([0-9]{2})([0-9]{2})-([0-9]{2})([0-9]{2})$")
        .expect("schedule pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid schedule format: {0:?}")]
    InvalidFormat(String),
}

/// An immutable weekly window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    days: [bool; 7],
    start_hr: u32,
    start_min: u32,
    stop_hr: u32,
    stop_min: u32,
}

impl Schedule {
    /// Build a schedule from its parts, validating hour and minute ranges.
    pub fn new(
        days: [bool; 7],
        start: (u32, u32),
        stop: (u32, u32),
    ) -> Result<Self, ScheduleError> {
        let schedule = Self {
            days,
            start_hr: start.0,
            start_min: start.1,
            stop_hr: stop.0,
            stop_min: stop.1,
        };
        if start.0 > 23 || stop.0 > 23 || start.1 > 59 || stop.1 > 59 {
            return Err(ScheduleError::InvalidFormat(schedule.to_string()));
        }
        Ok(schedule)
    }

    /// Parse the `DDDDDDD HHMM-HHMM` text form.
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::InvalidFormat(text.to_string());
        let caps = SCHEDULE_RE.captures(text).ok_or_else(invalid)?;

        let mut days = [false; 7];
        for (idx, day) in days.iter_mut().enumerate() {
            *day = &caps[idx + 1] != "-";
        }

        let number = |idx: usize| caps[idx].parse::<u32>().map_err(|_| invalid());
        let start = (number(8)?, number(9)?);
        let stop = (number(10)?, number(11)?);

        Self::new(days, start, stop).map_err(|_| invalid())
    }

    /// Day flags, Monday first.
    pub fn days(&self) -> [bool; 7] {
        self.days
    }

    /// True if `now` falls inside the window on an enabled day.
    pub fn is_active_at<T: Datelike + Timelike>(&self, now: &T) -> bool {
        let weekday = now.weekday().num_days_from_monday() as usize;
        if !self.days[weekday] {
            return false;
        }

        let now_secs = now.hour() * 3600 + now.minute() * 60 + now.second();
        let start_secs = self.start_hr * 3600 + self.start_min * 60;
        let stop_secs = self.stop_hr * 3600 + self.stop_min * 60;

        start_secs <= now_secs && now_secs <= stop_secs
    }

    /// Evaluate against the local wall clock.
    pub fn is_active(&self) -> bool {
        self.is_active_at(&Local::now())
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (letter, on) in DAY_LETTERS.iter().zip(self.days) {
            write!(f, "{}", if on { *letter } else { '-' })?;
        }
        write!(
            f,
            " {:02}{:02}-{:02}{:02}",
            self.start_hr, self.start_min, self.stop_hr, self.stop_min
        )
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
