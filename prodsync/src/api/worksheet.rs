//! The worksheet seam between sync logic and the Sheets API

use anyhow::Result;
use async_trait::async_trait;

use super::operations::SheetOperation;

/// One open worksheet for the duration of a sync run
#[async_trait]
pub trait Worksheet: Send {
    /// Worksheet title, for log messages
    fn title(&self) -> &str;

    /// Full grid of formatted cell values, row-major, row 1 first.
    /// Trailing empty rows and cells are omitted.
    async fn read_values(&mut self) -> Result<Vec<Vec<String>>>;

    /// Execute a single write as one logical API call
    async fn execute(&mut self, operation: &SheetOperation) -> Result<()>;
}
