//! Metric sources
//!
//! A source hands back raw aggregate rows for a date range. The SQL
//! implementation lives in [`sql`]; tests use [`StaticSource`].

pub mod sql;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use crate::sync::dates::DateRange;

pub use sql::SqlSource;

/// Date as returned by the source: drivers disagree on date vs timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl RawDate {
    /// Calendar date, dropping any time of day
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Date(date) => *date,
            Self::DateTime(datetime) => datetime.date(),
        }
    }

    /// Parse an ISO date or datetime as rendered by SQL drivers
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(Self::Date(date));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(Self::DateTime)
            .or_else(|| {
                // timestamps with a zone suffix ("2024-06-01 00:00:00+00")
                text.get(..10)
                    .filter(|_| text.len() > 10)
                    .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
                    .map(Self::Date)
            })
    }
}

/// One result row: a date plus named integer fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub date: RawDate,
    /// Field names are stored upper-cased
    pub fields: HashMap<String, i64>,
}

impl RawRow {
    pub fn new(date: RawDate) -> Self {
        Self {
            date,
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: i64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: i64) {
        self.fields.insert(name.to_ascii_uppercase(), value);
    }

    /// Field lookup ignoring ASCII case
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.fields.get(&name.to_ascii_uppercase()).copied()
    }
}

#[async_trait]
pub trait MetricSource: Send {
    /// Raw rows for every date in `range`, at most one row per date
    async fn fetch(&mut self, range: DateRange) -> Result<Vec<RawRow>>;

    /// Release the underlying connection
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
pub use testing::StaticSource;
