//! Google Sheets API module
//!
//! Service-account authentication, workbook/worksheet lookup, and a client that
//! executes `SheetOperation`s against the Sheets v4 REST API with bounded
//! retries. The `Worksheet` trait is the seam the sync job is written against.

pub mod auth;
pub mod client;
pub mod error;
#[cfg(test)]
pub mod memory;
pub mod operations;
pub mod requests;
pub mod resilience;
pub mod worksheet;

pub use client::SheetsClient;
pub use resilience::ResilienceConfig;
pub use worksheet::Worksheet;
