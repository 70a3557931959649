//! Core operation types for worksheet writes

use serde::Serialize;
use serde_json::Value;

use super::a1::cell_ref;

/// A single cell value written with `USER_ENTERED` semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CellValue {
    /// Literal text (dates are written as display strings and parsed by the sheet)
    Text(String),
    /// Non-negative counter
    Number(u64),
    /// Formula, including the leading `=`
    Formula(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// JSON payload for the values API
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(n) => Value::from(*n),
            Self::Formula(formula) => Value::String(formula.clone()),
        }
    }

    /// Raw string as it would be typed into the cell
    pub fn as_input(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(n) => n.to_string(),
            Self::Formula(formula) => formula.clone(),
        }
    }
}

/// Inclusive span of 1-based sheet rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowSpan {
    pub start: u32,
    pub end: u32,
}

impl RowSpan {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start >= 1 && start <= end, "invalid row span {start}..={end}");
        Self { start, end }
    }

    pub fn single(row: u32) -> Self {
        Self::new(row, row)
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, row: u32) -> bool {
        (self.start..=self.end).contains(&row)
    }

    /// Zero-based, end-exclusive bounds as used by `GridRange`
    pub fn grid_bounds(&self) -> (u32, u32) {
        (self.start - 1, self.end)
    }
}

/// Values for one A1 range (without the sheet title)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeWrite {
    pub range: String,
    pub values: Vec<Vec<CellValue>>,
}

impl RangeWrite {
    /// A single-row write starting at `column` (0-based) of `row` (1-based)
    pub fn row_segment(row: u32, column: usize, values: Vec<CellValue>) -> Self {
        let last = column + values.len().saturating_sub(1);
        let range = if values.len() > 1 {
            format!("{}:{}", cell_ref(column, row), cell_ref(last, row))
        } else {
            cell_ref(column, row)
        };
        Self {
            range,
            values: vec![values],
        }
    }
}

/// RGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

/// Cell style applied by `FormatRows`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellStyle {
    pub bold: bool,
    pub font_size: u32,
    pub background: Option<Color>,
}

/// A write against the worksheet. Each variant maps to exactly one logical API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SheetOperation {
    /// Positional write of a rectangular block starting at an A1 cell
    WriteBlock {
        start: String,
        rows: Vec<Vec<CellValue>>,
    },
    /// Batched write of several ranges
    UpdateRanges { ranges: Vec<RangeWrite> },
    /// Insert rows before 1-based row `at`, inheriting formatting from the row above
    InsertRows { at: u32, rows: Vec<Vec<CellValue>> },
    /// Show `reset` (when present), then hide every span in `hidden`
    SetRowVisibility {
        reset: Option<RowSpan>,
        hidden: Vec<RowSpan>,
    },
    /// Apply a text/background style to whole rows
    FormatRows { rows: RowSpan, style: CellStyle },
}

impl SheetOperation {
    pub fn write_block(start: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self::WriteBlock {
            start: start.into(),
            rows,
        }
    }

    pub fn update_ranges(ranges: Vec<RangeWrite>) -> Self {
        Self::UpdateRanges { ranges }
    }

    pub fn insert_rows(at: u32, rows: Vec<Vec<CellValue>>) -> Self {
        Self::InsertRows { at, rows }
    }

    pub fn set_row_visibility(reset: Option<RowSpan>, hidden: Vec<RowSpan>) -> Self {
        Self::SetRowVisibility { reset, hidden }
    }

    pub fn format_rows(rows: RowSpan, style: CellStyle) -> Self {
        Self::FormatRows { rows, style }
    }

    /// Get the operation type as a string
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::WriteBlock { .. } => "write_block",
            Self::UpdateRanges { .. } => "update_ranges",
            Self::InsertRows { .. } => "insert_rows",
            Self::SetRowVisibility { .. } => "set_row_visibility",
            Self::FormatRows { .. } => "format_rows",
        }
    }
}
