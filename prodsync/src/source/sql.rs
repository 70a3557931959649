//! SQL metric source over a single sqlx `AnyConnection`

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Connection, Row};

use super::{MetricSource, RawDate, RawRow};
use crate::config::{QuerySpec, SheetLayout, SourceConfig};
use crate::sync::dates::DateRange;
use crate::sync::normalize::merge_by_date;

pub struct SqlSource {
    connection: Option<AnyConnection>,
    queries: Vec<QuerySpec>,
    date_column: String,
}

impl SqlSource {
    /// Open one connection for the duration of a run
    pub async fn connect(config: &SourceConfig, layout: &SheetLayout) -> Result<Self> {
        if layout.queries.is_empty() {
            return Err(anyhow!("Layout defines no source queries"));
        }

        sqlx::any::install_default_drivers();
        info!("Connecting to {}...", config.describe());
        let connection = AnyConnection::connect(&config.connection_url())
            .await
            .with_context(|| format!("Failed to connect to {}", config.describe()))?;

        Ok(Self::from_connection(
            connection,
            layout.queries.clone(),
            &layout.source_date_column,
        ))
    }

    pub fn from_connection(
        connection: AnyConnection,
        queries: Vec<QuerySpec>,
        date_column: &str,
    ) -> Self {
        Self {
            connection: Some(connection),
            queries,
            date_column: date_column.to_string(),
        }
    }
}

fn integer_at(row: &AnyRow, index: usize) -> Option<i64> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value;
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map(|v| v.round() as i64);
    }
    row.try_get::<Option<String>, _>(index)
        .ok()
        .flatten()
        .and_then(|text| text.trim().parse::<i64>().ok())
}

/// Convert one result row; `None` when its date is missing or unreadable
fn to_raw_row(row: &AnyRow, date_column: &str) -> Option<RawRow> {
    let mut date = None;
    let mut fields = Vec::new();

    for column in row.columns() {
        let name = column.name();
        let index = column.ordinal();
        if name.eq_ignore_ascii_case(date_column) {
            date = row
                .try_get::<Option<String>, _>(index)
                .ok()
                .flatten()
                .and_then(|text| RawDate::parse(&text));
        } else if let Some(value) = integer_at(row, index) {
            fields.push((name.to_string(), value));
        }
    }

    let mut raw = RawRow::new(date?);
    for (name, value) in fields {
        raw.insert(&name, value);
    }
    Some(raw)
}

#[async_trait]
impl MetricSource for SqlSource {
    async fn fetch(&mut self, range: DateRange) -> Result<Vec<RawRow>> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow!("Source connection is closed"))?;
        let (start, end) = range.iso_bounds();

        let mut batches = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            let rows = sqlx::query(&query.sql)
                .bind(start.clone())
                .bind(end.clone())
                .fetch_all(&mut *connection)
                .await
                .with_context(|| format!("Query '{}' failed", query.name))?;

            let mut batch = Vec::with_capacity(rows.len());
            for row in &rows {
                match to_raw_row(row, &self.date_column) {
                    Some(raw) => batch.push(raw),
                    None => warn!(
                        "Query '{}' returned a row without a readable {} value, skipping",
                        query.name, self.date_column
                    ),
                }
            }
            debug!("Query '{}' returned {} rows", query.name, batch.len());
            batches.push(batch);
        }

        Ok(merge_by_date(batches))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection
                .close()
                .await
                .context("Failed to close source connection")?;
        }
        Ok(())
    }
}
