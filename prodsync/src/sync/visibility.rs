//! Rolling visibility window over the data rows

use anyhow::Result;
use chrono::NaiveDate;

use super::dates::{DisplayWindow, parse_date};
use super::models::{SheetSnapshot, parse_count};
use crate::api::operations::{RowSpan, SheetOperation};
use crate::config::SheetLayout;

/// Coalesce ascending row numbers into minimal contiguous spans
pub fn coalesce<I>(rows: I) -> Vec<RowSpan>
where
    I: IntoIterator<Item = u32>,
{
    let mut spans: Vec<RowSpan> = Vec::new();
    for row in rows {
        match spans.last_mut() {
            Some(span) if row == span.end + 1 => span.end = row,
            Some(span) if span.contains(row) => {}
            _ => spans.push(RowSpan::single(row)),
        }
    }
    spans
}

/// Data rows that should be hidden, as contiguous spans.
///
/// A row stays visible only when its date parses, lies inside the window
/// around `today` and, with `require_non_zero`, at least one tracked metric
/// is positive. Rows too short to hold every tracked metric are hidden.
pub fn compute_hidden_ranges(
    snapshot: &SheetSnapshot,
    layout: &SheetLayout,
    today: NaiveDate,
    window: DisplayWindow,
    require_non_zero: bool,
) -> Result<Vec<RowSpan>> {
    let columns = layout.resolve_columns(&snapshot.header)?;
    let metric_columns = columns.metric_columns();
    let range = window.range(today);

    let hidden = snapshot.rows.iter().filter_map(|row| {
        let in_window = parse_date(row.cell(columns.date), &layout.date_format)
            .is_some_and(|date| range.contains(date));
        let complete = metric_columns.iter().all(|column| *column < row.cells.len());
        let has_output = metric_columns
            .iter()
            .any(|column| parse_count(row.cell(*column)).is_some_and(|n| n > 0));

        let visible = in_window && complete && (!require_non_zero || has_output);
        (!visible).then_some(row.index)
    });

    Ok(coalesce(hidden))
}

/// One batched request: show every data row, then hide `hidden`
pub fn visibility_operation(snapshot: &SheetSnapshot, hidden: Vec<RowSpan>) -> Option<SheetOperation> {
    let last = snapshot.rows.last()?.index;
    Some(SheetOperation::set_row_visibility(
        Some(RowSpan::new(2, last)),
        hidden,
    ))
}
