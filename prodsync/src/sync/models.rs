use chrono::NaiveDate;

/// Canonical counters for one calendar date, aligned with the layout's metric order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRecord {
    pub date: NaiveDate,
    pub values: Vec<u64>,
}

impl MetricRecord {
    pub fn new(date: NaiveDate, values: Vec<u64>) -> Self {
        Self { date, values }
    }

    pub fn zero(date: NaiveDate, metrics: usize) -> Self {
        Self::new(date, vec![0; metrics])
    }
}

/// A data row as read from the sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based sheet row; row 1 is the header
    pub index: u32,
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Cell text, empty when the row is shorter than `column`
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// The worksheet's current contents split into header and data rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetSnapshot {
    pub header: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl SheetSnapshot {
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut lines = grid.into_iter();
        let header = lines.next().unwrap_or_default();
        let rows = lines
            .enumerate()
            .map(|(offset, cells)| SheetRow {
                index: offset as u32 + 2,
                cells,
            })
            .collect();
        Self { header, rows }
    }

    /// No header and no data at all
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.header.iter().all(|h| h.trim().is_empty())
    }

    /// Last occupied sheet row, 0 for an empty sheet
    pub fn last_row(&self) -> u32 {
        match self.rows.last() {
            Some(row) => row.index,
            None if self.is_empty() => 0,
            None => 1,
        }
    }
}

/// Parse a displayed counter; grouping separators are ignored and negatives rejected
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
