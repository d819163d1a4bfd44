//! Refresh cadence for the `watch` loop
//!
//! ```text
//!   sports     every 15 s while a team is live, every 2 min otherwise
//!   calendar   every 5 min
//!   weather    when the cached entry expires (30 min)
//!   concerts   when the cached entry expires (60 min)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::cache::CacheCategory;

pub const LIVE_INTERVAL_SECS: i64 = 15;
pub const IDLE_INTERVAL_SECS: i64 = 120;
pub const CALENDAR_INTERVAL_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Task {
    Weather,
    Sports,
    Concerts,
    Calendar,
}

impl Task {
    pub const ALL: [Task; 4] = [Self::Weather, Self::Sports, Self::Concerts, Self::Calendar];

    /// Delay until the next run after one that finished at `now`
    pub fn interval(self, sports_live: bool) -> Duration {
        match self {
            Self::Sports if sports_live => Duration::seconds(LIVE_INTERVAL_SECS),
            Self::Sports => Duration::seconds(IDLE_INTERVAL_SECS),
            Self::Calendar => Duration::seconds(CALENDAR_INTERVAL_SECS),
            Self::Weather => CacheCategory::Weather.ttl(),
            Self::Concerts => CacheCategory::Concerts.ttl(),
        }
    }
}

/// When each task is next due
#[derive(Debug, Clone)]
pub struct Schedule {
    next: BTreeMap<Task, DateTime<Utc>>,
}

impl Schedule {
    /// Everything is due immediately
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            next: Task::ALL.iter().map(|task| (*task, now)).collect(),
        }
    }

    pub fn due(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.next
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(task, _)| *task)
            .collect()
    }

    /// Record a finished run. For sports, a live game shortens the wait.
    pub fn completed(&mut self, task: Task, now: DateTime<Utc>, sports_live: bool) {
        self.next.insert(task, now + task.interval(sports_live));
    }

    pub fn next_wake(&self) -> Option<DateTime<Utc>> {
        self.next.values().min().copied()
    }
}
