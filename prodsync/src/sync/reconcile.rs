//! Sheet reconciliation
//!
//! Compares canonical records against the worksheet's current contents and
//! produces a [`SyncPlan`]: overwrite rows whose values changed, append rows
//! for dates the sheet does not have yet, or rewrite an empty sheet from
//! scratch. Existing rows are never reordered or deleted.
//!
//! Rows are matched on the parsed calendar date of their date cell, so a row
//! written as `1.6.2024` still matches a record for 2024-06-01. The display
//! string is only produced when writing.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;
use std::collections::{HashMap, HashSet};

use super::dates::{format_date, parse_date};
use super::models::{MetricRecord, SheetRow, SheetSnapshot, parse_count};
use crate::api::operations::a1::cell_ref;
use crate::api::operations::{CellValue, RangeWrite, SheetOperation};
use crate::config::{ColumnMap, SheetLayout};

/// Overwrite of the layout columns of one existing row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    pub row: u32,
    pub date: NaiveDate,
    /// Contiguous runs of layout columns; unknown header columns are left out
    pub writes: Vec<RangeWrite>,
}

/// A new row in header order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRow {
    pub date: NaiveDate,
    pub values: Vec<CellValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// Nothing on the sheet and nothing to write
    Untouched,
    /// Empty sheet: header plus one row per record, written from `A1`
    FullRewrite { rows: Vec<Vec<CellValue>> },
    Incremental {
        updates: Vec<RowUpdate>,
        /// Ascending by date, inserted as one block at `insert_at`
        appends: Vec<AppendRow>,
        insert_at: u32,
        /// Matched rows that already hold the record's values
        unchanged: usize,
    },
}

impl SyncPlan {
    pub fn update_count(&self) -> usize {
        match self {
            Self::Incremental { updates, .. } => updates.len(),
            _ => 0,
        }
    }

    pub fn append_count(&self) -> usize {
        match self {
            Self::Incremental { appends, .. } => appends.len(),
            _ => 0,
        }
    }

    /// True when applying the plan would not write any values
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Untouched => true,
            Self::FullRewrite { .. } => false,
            Self::Incremental {
                updates, appends, ..
            } => updates.is_empty() && appends.is_empty(),
        }
    }

    /// At most two writes: one batched range update and one batched insert
    pub fn operations(&self) -> Vec<SheetOperation> {
        match self {
            Self::Untouched => Vec::new(),
            Self::FullRewrite { rows } => vec![SheetOperation::write_block("A1", rows.clone())],
            Self::Incremental {
                updates,
                appends,
                insert_at,
                ..
            } => {
                let mut operations = Vec::with_capacity(2);
                if !updates.is_empty() {
                    let ranges = updates.iter().flat_map(|u| u.writes.clone()).collect();
                    operations.push(SheetOperation::update_ranges(ranges));
                }
                if !appends.is_empty() {
                    let rows = appends.iter().map(|a| a.values.clone()).collect();
                    operations.push(SheetOperation::insert_rows(*insert_at, rows));
                }
                operations
            }
        }
    }
}

/// `=SUM(...)` over the metric columns of `row`
fn total_formula(row: u32, metric_columns: &[usize]) -> Option<CellValue> {
    let (first, last) = (*metric_columns.first()?, *metric_columns.last()?);
    let formula = if last - first + 1 == metric_columns.len() {
        format!("=SUM({}:{})", cell_ref(first, row), cell_ref(last, row))
    } else {
        let cells: Vec<String> = metric_columns.iter().map(|c| cell_ref(*c, row)).collect();
        format!("=SUM({})", cells.join(","))
    };
    Some(CellValue::Formula(formula))
}

/// Layout cells of one record as `(column, value)`, ascending by column
fn record_cells(
    row: u32,
    record: &MetricRecord,
    columns: &ColumnMap,
    date_format: &str,
) -> Vec<(usize, CellValue)> {
    let mut cells = vec![(
        columns.date,
        CellValue::text(format_date(record.date, date_format)),
    )];
    for (column, value) in columns.metrics.iter().zip(&record.values) {
        if let Some(column) = column {
            cells.push((*column, CellValue::Number(*value)));
        }
    }
    if let Some(column) = columns.total {
        if let Some(formula) = total_formula(row, &columns.metric_columns()) {
            cells.push((column, formula));
        }
    }
    cells.sort_by_key(|(column, _)| *column);
    cells
}

/// Full row in header order, empty where the layout has no column
fn render_row(
    row: u32,
    record: &MetricRecord,
    columns: &ColumnMap,
    date_format: &str,
) -> Vec<CellValue> {
    let cells = record_cells(row, record, columns, date_format);
    let width = cells.last().map(|(column, _)| column + 1).unwrap_or(0);
    let mut values = vec![CellValue::empty(); width];
    for (column, value) in cells {
        values[column] = value;
    }
    values
}

/// Group cells into single-row writes over contiguous columns
fn row_writes(row: u32, cells: Vec<(usize, CellValue)>) -> Vec<RangeWrite> {
    let mut writes = Vec::new();
    let mut run: Vec<CellValue> = Vec::new();
    let mut run_start = 0;

    for (column, value) in cells {
        if !run.is_empty() && column != run_start + run.len() {
            writes.push(RangeWrite::row_segment(row, run_start, std::mem::take(&mut run)));
        }
        if run.is_empty() {
            run_start = column;
        }
        run.push(value);
    }
    if !run.is_empty() {
        writes.push(RangeWrite::row_segment(row, run_start, run));
    }
    writes
}

/// Whether the row already shows the record's metrics (and their total)
fn is_current(row: &SheetRow, record: &MetricRecord, columns: &ColumnMap) -> bool {
    let mut expected_total = 0;
    for (column, value) in columns.metrics.iter().zip(&record.values) {
        if let Some(column) = column {
            if parse_count(row.cell(*column)) != Some(*value) {
                return false;
            }
            expected_total += value;
        }
    }
    match columns.total {
        Some(column) if !columns.metric_columns().is_empty() => {
            parse_count(row.cell(column)) == Some(expected_total)
        }
        _ => true,
    }
}

/// Compute the plan that brings the sheet in line with `records`.
///
/// Fails only when a non-empty sheet's header has no date column.
pub fn reconcile(
    records: &[MetricRecord],
    layout: &SheetLayout,
    snapshot: &SheetSnapshot,
) -> Result<SyncPlan> {
    if snapshot.is_empty() {
        if records.is_empty() {
            return Ok(SyncPlan::Untouched);
        }

        let header = layout.header();
        let columns = layout.resolve_columns(&header)?;
        let mut rows = Vec::with_capacity(records.len() + 1);
        rows.push(header.into_iter().map(CellValue::Text).collect());
        let mut seen = HashSet::new();
        for record in records.iter().filter(|r| seen.insert(r.date)) {
            let row = rows.len() as u32 + 1;
            rows.push(render_row(row, record, &columns, &layout.date_format));
        }
        return Ok(SyncPlan::FullRewrite { rows });
    }

    let columns = layout
        .resolve_columns(&snapshot.header)
        .context("Cannot match the sheet header against the layout")?;

    let mut existing: HashMap<NaiveDate, &SheetRow> = HashMap::new();
    for row in &snapshot.rows {
        match parse_date(row.cell(columns.date), &layout.date_format) {
            Some(date) => {
                existing.entry(date).or_insert(row);
            }
            None if !row.cell(columns.date).trim().is_empty() => {
                debug!(
                    "Row {} has an unreadable date '{}', not matched",
                    row.index,
                    row.cell(columns.date)
                );
            }
            None => {}
        }
    }

    let mut updates = Vec::new();
    let mut pending = Vec::new();
    let mut queued = HashSet::new();
    let mut unchanged = 0;

    for record in records {
        match existing.get(&record.date) {
            Some(row) if is_current(row, record, &columns) => unchanged += 1,
            Some(row) => {
                let cells = record_cells(row.index, record, &columns, &layout.date_format);
                updates.push(RowUpdate {
                    row: row.index,
                    date: record.date,
                    writes: row_writes(row.index, cells),
                });
            }
            None => {
                if queued.insert(record.date) {
                    pending.push(record);
                }
            }
        }
    }

    pending.sort_by_key(|record| record.date);
    let insert_at = snapshot.last_row() + 1;
    let appends = pending
        .into_iter()
        .enumerate()
        .map(|(offset, record)| AppendRow {
            date: record.date,
            values: render_row(
                insert_at + offset as u32,
                record,
                &columns,
                &layout.date_format,
            ),
        })
        .collect();

    Ok(SyncPlan::Incremental {
        updates,
        appends,
        insert_at,
        unchanged,
    })
}
