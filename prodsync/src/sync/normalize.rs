//! Raw source rows to canonical per-date records

use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

use super::dates::DateRange;
use super::models::MetricRecord;
use crate::config::MetricSpec;
use crate::source::{RawDate, RawRow};

/// Merge per-query results into one row per calendar date, ascending.
///
/// Fields of later batches overwrite earlier ones for the same date.
pub fn merge_by_date<I>(batches: I) -> Vec<RawRow>
where
    I: IntoIterator<Item = Vec<RawRow>>,
{
    let mut merged: BTreeMap<NaiveDate, RawRow> = BTreeMap::new();
    for row in batches.into_iter().flatten() {
        let date = row.date.date();
        merged
            .entry(date)
            .or_insert_with(|| RawRow::new(RawDate::Date(date)))
            .fields
            .extend(row.fields);
    }
    merged.into_values().collect()
}

/// One record per date of `range`, ascending, with 0 for anything the source lacks
pub fn normalize(raw: &[RawRow], range: DateRange, metrics: &[MetricSpec]) -> Vec<MetricRecord> {
    let mut by_date: HashMap<NaiveDate, HashMap<&str, i64>> = HashMap::new();
    for row in raw {
        let date = row.date.date();
        if !range.contains(date) {
            debug!("Ignoring source row for {} outside {}", date, range);
            continue;
        }
        by_date
            .entry(date)
            .or_default()
            .extend(row.fields.iter().map(|(name, value)| (name.as_str(), *value)));
    }

    let keys: Vec<String> = metrics
        .iter()
        .map(|m| m.source.to_ascii_uppercase())
        .collect();

    range
        .days()
        .map(|date| {
            let Some(fields) = by_date.get(&date) else {
                return MetricRecord::zero(date, metrics.len());
            };
            let values = keys
                .iter()
                .map(|key| match fields.get(key.as_str()) {
                    Some(value) if *value < 0 => {
                        warn!("Negative {} = {} on {}, using 0", key, value, date);
                        0
                    }
                    Some(value) => *value as u64,
                    None => 0,
                })
                .collect();
            MetricRecord::new(date, values)
        })
        .collect()
}
