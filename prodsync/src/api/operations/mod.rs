//! Worksheet operations
//!
//! Every write the sync job performs is expressed as a `SheetOperation`, so the
//! plan can be printed, tested against an in-memory sheet, or executed through
//! the Sheets API client.

pub mod a1;
pub mod operation;

pub use operation::{CellStyle, CellValue, Color, RangeWrite, RowSpan, SheetOperation};
