//! Calendar date ranges and the rolling display window

use anyhow::{Result, bail};
use chrono::{Days, NaiveDate};
use std::fmt;

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            bail!("Date range start {} is after its end {}", start, end);
        }
        Ok(Self { start, end })
    }

    /// `[today - before, today + after]`, saturating at the calendar limits
    pub fn around(today: NaiveDate, before: u32, after: u32) -> Self {
        Self {
            start: today
                .checked_sub_days(Days::new(before.into()))
                .unwrap_or(NaiveDate::MIN),
            end: today
                .checked_add_days(Days::new(after.into()))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Every date of the range in ascending order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// ISO bounds as bound into source queries
    pub fn iso_bounds(&self) -> (String, String) {
        (
            self.start.format("%Y-%m-%d").to_string(),
            self.end.format("%Y-%m-%d").to_string(),
        )
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Days around "today" whose rows stay visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    pub days_before: u32,
    pub days_after: u32,
}

impl DisplayWindow {
    pub fn new(days_before: u32, days_after: u32) -> Self {
        Self {
            days_before,
            days_after,
        }
    }

    pub fn range(&self, today: NaiveDate) -> DateRange {
        DateRange::around(today, self.days_before, self.days_after)
    }
}

pub fn format_date(date: NaiveDate, format: &str) -> String {
    date.format(format).to_string()
}

/// Parse a sheet date cell; surrounding whitespace is ignored
pub fn parse_date(text: &str, format: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, format).ok()
}
