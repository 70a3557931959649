//! Cosmetic, best-effort sheet steps
//!
//! Every step is a single [`SheetOperation`]. Steps run in order and a failing
//! step is recorded in the [`StepReport`] without stopping the ones after it.

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};

use super::dates::parse_date;
use super::models::SheetSnapshot;
use crate::api::Worksheet;
use crate::api::operations::{CellStyle, CellValue, Color, RowSpan, SheetOperation};
use crate::config::SheetLayout;

pub const FONT_SIZE: u32 = 14;
pub const TODAY_BACKGROUND: Color = Color {
    red: 0.85,
    green: 0.92,
    blue: 0.83,
};
pub const STATUS_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// A named operation executed for effect
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: &'static str,
    pub operation: SheetOperation,
}

impl Step {
    pub fn new(name: &'static str, operation: SheetOperation) -> Self {
        Self { name, operation }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub completed: Vec<&'static str>,
    pub failures: Vec<StepFailure>,
}

/// Bold rows, today's highlight and the status cell, in that order
pub fn presentation_steps(
    snapshot: &SheetSnapshot,
    layout: &SheetLayout,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Vec<Step> {
    let mut steps = Vec::with_capacity(3);

    let last = snapshot.last_row();
    if last > 0 {
        steps.push(Step::new(
            "format_rows",
            SheetOperation::format_rows(
                RowSpan::new(1, last),
                CellStyle {
                    bold: true,
                    font_size: FONT_SIZE,
                    background: None,
                },
            ),
        ));
    }

    if let Ok(columns) = layout.resolve_columns(&snapshot.header) {
        let today_row = snapshot
            .rows
            .iter()
            .find(|row| parse_date(row.cell(columns.date), &layout.date_format) == Some(today));
        match today_row {
            Some(row) => steps.push(Step::new(
                "highlight_today",
                SheetOperation::format_rows(
                    RowSpan::single(row.index),
                    CellStyle {
                        bold: true,
                        font_size: FONT_SIZE,
                        background: Some(TODAY_BACKGROUND),
                    },
                ),
            )),
            None => debug!("No row for {}, nothing to highlight", today),
        }
    }

    // the sheet's column order is free, so a layout header may sit under the status cell
    let covered_header = layout
        .status_position()
        .filter(|(_, row)| *row == 1)
        .and_then(|(column, _)| snapshot.header.get(column))
        .filter(|text| layout.is_layout_column(text));
    if let Some(header) = covered_header {
        warn!(
            "Status cell {} holds the '{}' column header, not overwriting it",
            layout.status_cell, header
        );
        return steps;
    }

    let status = format!("{}{}", layout.status_prefix, now.format(STATUS_FORMAT));
    steps.push(Step::new(
        "status_cell",
        SheetOperation::write_block(layout.status_cell.clone(), vec![vec![CellValue::Text(status)]]),
    ));

    steps
}

/// Execute every step, collecting failures instead of propagating them
pub async fn run_steps(sheet: &mut dyn Worksheet, steps: Vec<Step>) -> StepReport {
    let mut report = StepReport::default();
    for step in steps {
        match sheet.execute(&step.operation).await {
            Ok(()) => report.completed.push(step.name),
            Err(e) => {
                warn!("Step '{}' failed: {:#}", step.name, e);
                report.failures.push(StepFailure {
                    step: step.name,
                    error: format!("{:#}", e),
                });
            }
        }
    }
    report
}
