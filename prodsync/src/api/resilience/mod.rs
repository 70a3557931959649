//! Resilience for Sheets API interactions
//!
//! Provides the retry policy and request logging switches used by the API client.

pub mod config;
pub mod retry;

pub use config::ResilienceConfig;
pub use retry::{RetryPolicy, RetryableError};
