//! Sync engine
//!
//! Pure building blocks (`dates`, `normalize`, `reconcile`, `visibility`,
//! `presenter`) plus the [`SyncJob`] that strings them together for one run.

pub mod dates;
pub mod job;
pub mod live;
pub mod models;
pub mod normalize;
pub mod presenter;
pub mod reconcile;
pub mod visibility;

pub use job::{JobOutcome, JobReport, RunContext, SyncJob};
pub use live::LiveBackends;
pub use models::MetricRecord;
pub use reconcile::{SyncPlan, reconcile};
