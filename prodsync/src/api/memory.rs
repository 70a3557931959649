//! In-memory worksheet used by tests
//!
//! Behaves like the Sheets API for the operations the sync job issues: values
//! are read back formatted (simple `SUM` formulas are evaluated), trailing empty
//! cells are trimmed, inserted rows shift the rows below them.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::operations::a1::parse_cell;
use super::operations::{CellStyle, CellValue, RowSpan, SheetOperation};
use super::worksheet::Worksheet;

#[derive(Debug, Default)]
pub struct MemoryState {
    /// Raw cell inputs, formulas included
    pub cells: Vec<Vec<String>>,
    pub hidden: BTreeSet<u32>,
    pub formats: Vec<(RowSpan, CellStyle)>,
    pub executed: Vec<&'static str>,
    pub failing: HashSet<&'static str>,
    pub fail_reads: bool,
    pub reads: usize,
}

/// Cloneable handle; clones share the same sheet
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: &[&[&str]]) -> Self {
        let sheet = Self::new();
        sheet.state().cells = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        sheet
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every operation of this type fail
    pub fn fail_on(&self, operation_type: &'static str) {
        self.state().failing.insert(operation_type);
    }

    pub fn fail_reads(&self) {
        self.state().fail_reads = true;
    }

    /// Formatted grid as the API would return it
    pub fn rendered(&self) -> Vec<Vec<String>> {
        render(&self.state().cells)
    }

    pub fn hidden_rows(&self) -> Vec<u32> {
        self.state().hidden.iter().copied().collect()
    }

    pub fn executed(&self) -> Vec<&'static str> {
        self.state().executed.clone()
    }

    pub fn formats(&self) -> Vec<(RowSpan, CellStyle)> {
        self.state().formats.clone()
    }
}

fn set_cell(cells: &mut Vec<Vec<String>>, column: usize, row: u32, value: &CellValue) {
    let row_idx = row as usize - 1;
    if cells.len() <= row_idx {
        cells.resize(row_idx + 1, Vec::new());
    }
    let line = &mut cells[row_idx];
    if line.len() <= column {
        line.resize(column + 1, String::new());
    }
    line[column] = value.as_input();
}

fn write_block(cells: &mut Vec<Vec<String>>, start: &str, rows: &[Vec<CellValue>]) -> Result<()> {
    let anchor = start.split(':').next().unwrap_or(start);
    let (column, row) = parse_cell(anchor).ok_or_else(|| anyhow!("bad cell {}", start))?;
    for (dy, values) in rows.iter().enumerate() {
        for (dx, value) in values.iter().enumerate() {
            set_cell(cells, column + dx, row + dy as u32, value);
        }
    }
    Ok(())
}

fn raw_value(cells: &[Vec<String>], column: usize, row: u32) -> &str {
    cells
        .get(row as usize - 1)
        .and_then(|line| line.get(column))
        .map(String::as_str)
        .unwrap_or("")
}

/// Evaluate `=SUM(B2:D2)` / `=SUM(B2,D2)`; anything else renders as its input
fn evaluate(cells: &[Vec<String>], formula: &str) -> String {
    let Some(args) = formula
        .strip_prefix("=SUM(")
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return formula.to_string();
    };

    let mut total = 0u64;
    for part in args.split(',') {
        let (from, to) = part.split_once(':').unwrap_or((part, part));
        let (Some((c1, r1)), Some((c2, r2))) = (parse_cell(from), parse_cell(to)) else {
            return "#REF!".to_string();
        };
        for row in r1..=r2 {
            for column in c1..=c2 {
                total += raw_value(cells, column, row).trim().parse::<u64>().unwrap_or(0);
            }
        }
    }
    total.to_string()
}

fn render(cells: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut grid: Vec<Vec<String>> = cells
        .iter()
        .map(|line| {
            let mut rendered: Vec<String> = line
                .iter()
                .map(|cell| {
                    if cell.starts_with('=') {
                        evaluate(cells, cell)
                    } else {
                        cell.clone()
                    }
                })
                .collect();
            while rendered.last().is_some_and(|c| c.is_empty()) {
                rendered.pop();
            }
            rendered
        })
        .collect();
    while grid.last().is_some_and(|row| row.is_empty()) {
        grid.pop();
    }
    grid
}

#[async_trait]
impl Worksheet for MemorySheet {
    fn title(&self) -> &str {
        "memory"
    }

    async fn read_values(&mut self) -> Result<Vec<Vec<String>>> {
        let mut state = self.state();
        state.reads += 1;
        if state.fail_reads {
            bail!("simulated read failure");
        }
        Ok(render(&state.cells))
    }

    async fn execute(&mut self, operation: &SheetOperation) -> Result<()> {
        let mut state = self.state();
        let kind = operation.operation_type();
        if state.failing.contains(kind) {
            bail!("simulated {} failure", kind);
        }
        state.executed.push(kind);

        match operation {
            SheetOperation::WriteBlock { start, rows } => write_block(&mut state.cells, start, rows)?,
            SheetOperation::UpdateRanges { ranges } => {
                for write in ranges {
                    write_block(&mut state.cells, &write.range, &write.values)?;
                }
            }
            SheetOperation::InsertRows { at, rows } => {
                let at_idx = *at as usize - 1;
                if state.cells.len() < at_idx {
                    state.cells.resize(at_idx, Vec::new());
                }
                for (offset, values) in rows.iter().enumerate() {
                    state.cells.insert(
                        at_idx + offset,
                        values.iter().map(CellValue::as_input).collect(),
                    );
                }
                let shift = rows.len() as u32;
                state.hidden = state
                    .hidden
                    .iter()
                    .map(|&row| if row >= *at { row + shift } else { row })
                    .collect();
            }
            SheetOperation::SetRowVisibility { reset, hidden } => {
                if let Some(span) = reset {
                    state.hidden.retain(|row| !span.contains(*row));
                }
                for span in hidden {
                    state.hidden.extend(span.start..=span.end);
                }
            }
            SheetOperation::FormatRows { rows, style } => {
                state.formats.push((*rows, style.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sum_formulas_render_as_values() {
        let mut sheet = MemorySheet::with_rows(&[
            &["Date", "A", "B", "Total"],
            &["01.06.2024", "2", "3", "=SUM(B2:C2)"],
        ]);

        let grid = sheet.read_values().await.unwrap();
        assert_eq!(grid[1][3], "5");
    }

    #[tokio::test]
    async fn test_insert_shifts_hidden_rows() {
        let mut sheet = MemorySheet::with_rows(&[&["Date"], &["a"], &["b"]]);
        sheet
            .execute(&SheetOperation::set_row_visibility(None, vec![RowSpan::single(3)]))
            .await
            .unwrap();
        sheet
            .execute(&SheetOperation::insert_rows(
                2,
                vec![vec![CellValue::text("new")]],
            ))
            .await
            .unwrap();

        assert_eq!(sheet.hidden_rows(), vec![4]);
        assert_eq!(sheet.rendered()[1], vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_trailing_empty_cells_are_trimmed() {
        let mut sheet = MemorySheet::new();
        sheet
            .execute(&SheetOperation::write_block(
                "A1",
                vec![vec![CellValue::text("x"), CellValue::empty()]],
            ))
            .await
            .unwrap();

        assert_eq!(sheet.read_values().await.unwrap(), vec![vec!["x".to_string()]]);
    }
}
