//! Run loop: one tick immediately, then on a daily time or fixed interval
//!
//! Ticks are awaited in place, so they never overlap; interval ticks missed
//! while a run was in progress are skipped, not queued.

use chrono::{Days, NaiveDateTime, NaiveTime};
use log::{debug, info};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every day at this local time
    Daily(NaiveTime),
    Every(Duration),
}

impl Schedule {
    /// Time from `now` until the next daily slot (always in the future)
    pub fn until_next_daily(at: NaiveTime, now: NaiveDateTime) -> Duration {
        let mut next = now.date().and_time(at);
        if next <= now {
            next = now
                .date()
                .checked_add_days(Days::new(1))
                .map(|day| day.and_time(at))
                .unwrap_or(next);
        }
        (next - now).to_std().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily(at) => write!(f, "daily at {}", at.format("%H:%M")),
            Self::Every(interval) => write!(f, "every {}s", interval.as_secs()),
        }
    }
}

/// Next interval deadline strictly after `now`, skipping missed ones
fn next_interval_deadline(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = previous + interval;
    while next <= now {
        next += interval;
    }
    next
}

/// Run `tick` on `schedule` until `shutdown` resolves. Returns the number of
/// ticks that ran to completion.
pub async fn run<F, Fut, S>(schedule: Schedule, mut tick: F, shutdown: S) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut completed = 0;
    let mut started = Instant::now();

    info!("Scheduler started, running now and then {}", schedule);
    loop {
        tokio::select! {
            _ = tick() => completed += 1,
            _ = &mut shutdown => {
                info!("Shutdown requested during a run, stopping");
                break;
            }
        }

        let deadline = match schedule {
            Schedule::Every(interval) => {
                started = next_interval_deadline(started, interval, Instant::now());
                started
            }
            Schedule::Daily(at) => {
                let wait = Schedule::until_next_daily(at, chrono::Local::now().naive_local());
                Instant::now() + wait
            }
        };
        debug!(
            "Next run in {}s",
            deadline.saturating_duration_since(Instant::now()).as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                break;
            }
        }
    }
    completed
}
