//! Sheet layout: which columns exist, how dates are displayed, and which
//! queries feed each metric.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::api::operations::a1::{column_letters, parse_cell};

/// Layout used when no `SYNC_LAYOUT_FILE` is configured
pub const DEFAULT_LAYOUT: &str = include_str!("../../layout.default.toml");

/// One tracked counter: where it comes from and which header it is written under
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricSpec {
    /// Column name in the query results (matched ignoring ASCII case)
    pub source: String,
    /// Header of the sheet column
    pub column: String,
}

impl MetricSpec {
    pub fn new(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
        }
    }
}

/// A SQL query bound with `(start, end)` as ISO date strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuerySpec {
    pub name: String,
    pub sql: String,
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_date_format() -> String {
    "%d.%m.%Y".to_string()
}

fn default_status_cell() -> String {
    "F1".to_string()
}

fn default_status_prefix() -> String {
    "Last updated: ".to_string()
}

fn default_source_date_column() -> String {
    "PRODDATE".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetLayout {
    #[serde(default = "default_date_column")]
    pub date_column: String,
    pub metrics: Vec<MetricSpec>,
    /// Optional computed column holding `=SUM(...)` over the metric columns
    #[serde(default)]
    pub total_column: Option<String>,
    /// chrono format of the date column as displayed in the sheet
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_status_cell")]
    pub status_cell: String,
    #[serde(default = "default_status_prefix")]
    pub status_prefix: String,
    /// Date column name in the query results
    #[serde(default = "default_source_date_column")]
    pub source_date_column: String,
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
}

/// Where each layout column sits in the sheet's current header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    /// Header index per layout metric; `None` when the header lacks that column
    pub metrics: Vec<Option<usize>>,
    pub total: Option<usize>,
}

impl ColumnMap {
    /// Header indices of the metric columns present in the sheet, ascending
    pub fn metric_columns(&self) -> Vec<usize> {
        let mut columns: Vec<usize> = self.metrics.iter().flatten().copied().collect();
        columns.sort_unstable();
        columns
    }
}

impl SheetLayout {
    /// Load the layout file, or the embedded default layout when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read layout file {}", path.display()))?;
                Self::parse(&text)
                    .with_context(|| format!("Invalid layout file {}", path.display()))
            }
            None => Self::parse(DEFAULT_LAYOUT).context("Invalid built-in layout"),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let layout: Self = toml::from_str(text).context("Failed to parse layout TOML")?;
        layout.validate()?;
        Ok(layout)
    }

    fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            bail!("Layout must define at least one metric");
        }

        let mut seen = HashSet::new();
        let columns = std::iter::once(&self.date_column)
            .chain(self.metrics.iter().map(|m| &m.column))
            .chain(self.total_column.iter());
        for column in columns {
            if column.trim().is_empty() {
                bail!("Column names must not be empty");
            }
            if !seen.insert(column.trim()) {
                bail!("Column '{}' appears more than once in the layout", column);
            }
        }

        let sample = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default();
        let formatted = sample.format(&self.date_format).to_string();
        if NaiveDate::parse_from_str(&formatted, &self.date_format).ok() != Some(sample) {
            bail!(
                "Date format '{}' does not round-trip a calendar date",
                self.date_format
            );
        }

        let Some((column, _)) = self.status_position() else {
            bail!("Status cell '{}' is not an A1 cell reference", self.status_cell);
        };
        let width = self.header().len();
        if column < width {
            bail!(
                "Status cell '{}' overlaps the {} layout columns; move it right of column {}",
                self.status_cell,
                width,
                column_letters(width - 1)
            );
        }

        Ok(())
    }

    /// 0-based column and 1-based row of the status cell
    pub fn status_position(&self) -> Option<(usize, u32)> {
        parse_cell(&self.status_cell)
    }

    /// Whether `name` is one of the layout's column headers
    pub fn is_layout_column(&self, name: &str) -> bool {
        let name = name.trim();
        !name.is_empty() && self.header().iter().any(|column| column.trim() == name)
    }

    /// Header written to an empty sheet
    pub fn header(&self) -> Vec<String> {
        std::iter::once(self.date_column.clone())
            .chain(self.metrics.iter().map(|m| m.column.clone()))
            .chain(self.total_column.iter().cloned())
            .collect()
    }

    /// Locate the layout columns in the sheet's current header.
    ///
    /// Fails when the date column is missing; absent metric or total columns
    /// are reported as `None` and simply not written.
    pub fn resolve_columns(&self, header: &[String]) -> Result<ColumnMap> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name.trim());

        let Some(date) = find(&self.date_column) else {
            bail!("Header has no '{}' column", self.date_column);
        };

        Ok(ColumnMap {
            date,
            metrics: self.metrics.iter().map(|m| find(&m.column)).collect(),
            total: self.total_column.as_deref().and_then(find),
        })
    }
}
