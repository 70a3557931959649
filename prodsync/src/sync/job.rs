//! One sync run: fetch, normalize, reconcile, apply, window, present
//!
//! The job never returns an error. Every failure is logged and mapped to a
//! [`JobOutcome`] so the scheduler can keep ticking.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::{debug, error, info, warn};

use super::dates::DateRange;
use super::models::{MetricRecord, SheetSnapshot};
use super::normalize::normalize;
use super::presenter::{Step, StepFailure, presentation_steps, run_steps};
use super::reconcile::{SyncPlan, reconcile};
use super::visibility::{compute_hidden_ranges, visibility_operation};
use crate::api::Worksheet;
use crate::config::{SheetLayout, WindowConfig};
use crate::source::MetricSource;

/// Opens the per-run source connection and sheet session
#[async_trait]
pub trait Backends: Send + Sync {
    async fn open_source(&self) -> Result<Box<dyn MetricSource>>;
    async fn open_sheet(&self) -> Result<Box<dyn Worksheet>>;
}

/// Wall-clock inputs of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub today: NaiveDate,
    pub now: NaiveDateTime,
}

impl RunContext {
    pub fn local() -> Self {
        let now = Local::now().naive_local();
        Self {
            today: now.date(),
            now,
        }
    }

    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            today: now.date(),
            now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Data written (or already current) and cosmetic steps attempted
    Completed,
    /// Empty sheet and nothing to write
    SheetUntouched,
    /// The source could not be opened or queried; the sheet was not accessed
    SourceFailed,
    /// Authentication or workbook/worksheet lookup failed
    SheetUnavailable,
    /// The sheet's header does not match the layout
    PlanFailed,
    /// A data write failed; cosmetic steps were skipped
    DataWriteFailed,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::SheetUntouched)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub outcome: JobOutcome,
    pub records: usize,
    pub full_rewrite: bool,
    pub updates: usize,
    pub appends: usize,
    pub unchanged: usize,
    pub hidden_rows: u32,
    pub step_failures: Vec<StepFailure>,
}

impl JobReport {
    fn new(outcome: JobOutcome) -> Self {
        Self {
            outcome,
            records: 0,
            full_rewrite: false,
            updates: 0,
            appends: 0,
            unchanged: 0,
            hidden_rows: 0,
            step_failures: Vec::new(),
        }
    }
}

pub struct SyncJob<'a> {
    layout: &'a SheetLayout,
    window: &'a WindowConfig,
}

impl<'a> SyncJob<'a> {
    pub fn new(layout: &'a SheetLayout, window: &'a WindowConfig) -> Self {
        Self { layout, window }
    }

    /// Dates fetched from the source on `today`
    pub fn fetch_range(&self, today: NaiveDate) -> DateRange {
        DateRange::around(
            today,
            self.window.fetch_days_before,
            self.window.fetch_days_after,
        )
    }

    /// Fetch and normalize the fetch window. The source is closed on every path.
    pub async fn fetch_records(
        &self,
        backends: &dyn Backends,
        today: NaiveDate,
    ) -> Result<Vec<MetricRecord>> {
        let range = self.fetch_range(today);
        let mut source = backends
            .open_source()
            .await
            .context("Failed to open the metric source")?;

        let fetched = source.fetch(range).await;
        if let Err(e) = source.close().await {
            warn!("Failed to close the metric source: {:#}", e);
        }
        let raw = fetched.with_context(|| format!("Failed to fetch metrics for {}", range))?;

        debug!("Fetched {} source rows for {}", raw.len(), range);
        Ok(normalize(&raw, range, &self.layout.metrics))
    }

    /// Current sheet contents; an unreadable sheet reads as empty
    async fn read_snapshot(sheet: &mut dyn Worksheet) -> SheetSnapshot {
        match sheet.read_values().await {
            Ok(grid) => SheetSnapshot::from_grid(grid),
            Err(e) => {
                warn!(
                    "Could not read worksheet '{}', treating it as empty: {:#}",
                    sheet.title(),
                    e
                );
                SheetSnapshot::default()
            }
        }
    }

    /// Compute the plan without writing anything
    pub async fn plan(
        &self,
        backends: &dyn Backends,
        ctx: RunContext,
    ) -> Result<(SyncPlan, SheetSnapshot)> {
        let records = self.fetch_records(backends, ctx.today).await?;
        let mut sheet = backends
            .open_sheet()
            .await
            .context("Failed to open the worksheet")?;
        let snapshot = Self::read_snapshot(sheet.as_mut()).await;
        let plan = reconcile(&records, self.layout, &snapshot)?;
        Ok((plan, snapshot))
    }

    pub async fn run(&self, backends: &dyn Backends, ctx: RunContext) -> JobReport {
        info!("Sync run started for {}", ctx.today);

        let records = match self.fetch_records(backends, ctx.today).await {
            Ok(records) => records,
            Err(e) => {
                error!("Source failure, sheet left untouched: {:#}", e);
                return JobReport::new(JobOutcome::SourceFailed);
            }
        };

        let mut sheet = match backends.open_sheet().await {
            Ok(sheet) => sheet,
            Err(e) => {
                error!("Worksheet unavailable: {:#}", e);
                let mut report = JobReport::new(JobOutcome::SheetUnavailable);
                report.records = records.len();
                return report;
            }
        };

        let mut report = JobReport::new(JobOutcome::Completed);
        report.records = records.len();

        let snapshot = Self::read_snapshot(sheet.as_mut()).await;
        let plan = match reconcile(&records, self.layout, &snapshot) {
            Ok(plan) => plan,
            Err(e) => {
                error!("Cannot plan the update: {:#}", e);
                report.outcome = JobOutcome::PlanFailed;
                return report;
            }
        };

        match &plan {
            SyncPlan::Untouched => {
                info!("Sheet is empty and there is nothing to write");
                report.outcome = JobOutcome::SheetUntouched;
                return report;
            }
            SyncPlan::FullRewrite { rows } => {
                info!("Sheet is empty, writing header and {} rows", rows.len() - 1);
                report.full_rewrite = true;
            }
            SyncPlan::Incremental {
                updates,
                appends,
                unchanged,
                ..
            } => {
                info!(
                    "{} rows to update, {} to append, {} already current",
                    updates.len(),
                    appends.len(),
                    unchanged
                );
                report.updates = updates.len();
                report.appends = appends.len();
                report.unchanged = *unchanged;
            }
        }

        for operation in plan.operations() {
            if let Err(e) = sheet.execute(&operation).await {
                error!("Data write '{}' failed: {:#}", operation.operation_type(), e);
                report.outcome = JobOutcome::DataWriteFailed;
                return report;
            }
        }

        let snapshot = if plan.is_noop() {
            snapshot
        } else {
            Self::read_snapshot(sheet.as_mut()).await
        };

        let mut steps = Vec::new();
        match compute_hidden_ranges(
            &snapshot,
            self.layout,
            ctx.today,
            self.window.display,
            self.window.hide_zero_rows,
        ) {
            Ok(hidden) => {
                report.hidden_rows = hidden.iter().map(|span| span.len()).sum();
                if let Some(operation) = visibility_operation(&snapshot, hidden) {
                    steps.push(Step::new("row_visibility", operation));
                }
            }
            Err(e) => {
                warn!("Skipping row visibility: {:#}", e);
                report.step_failures.push(StepFailure {
                    step: "row_visibility",
                    error: format!("{:#}", e),
                });
            }
        }
        steps.extend(presentation_steps(&snapshot, self.layout, ctx.today, ctx.now));

        let steps_report = run_steps(sheet.as_mut(), steps).await;
        report.step_failures.extend(steps_report.failures);

        info!(
            "Sync run finished: {} records, {} hidden rows, {} cosmetic failures",
            report.records,
            report.hidden_rows,
            report.step_failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemorySheet;
    use crate::api::operations::RowSpan;
    use crate::source::{RawDate, RawRow, StaticSource};
    use crate::sync::dates::DisplayWindow;
    use anyhow::bail;

    struct TestBackends {
        source: StaticSource,
        sheet: MemorySheet,
        sheet_available: bool,
    }

    impl TestBackends {
        fn new(source: StaticSource, sheet: MemorySheet) -> Self {
            Self {
                source,
                sheet,
                sheet_available: true,
            }
        }
    }

    #[async_trait]
    impl Backends for TestBackends {
        async fn open_source(&self) -> Result<Box<dyn MetricSource>> {
            Ok(Box::new(self.source.clone()))
        }

        async fn open_sheet(&self) -> Result<Box<dyn Worksheet>> {
            if !self.sheet_available {
                bail!("simulated auth failure");
            }
            Ok(Box::new(self.sheet.clone()))
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn ctx() -> RunContext {
        RunContext::at(date(10).and_hms_opt(1, 0, 0).unwrap())
    }

    fn window() -> WindowConfig {
        WindowConfig {
            fetch_days_before: 3,
            fetch_days_after: 1,
            display: DisplayWindow::new(1, 1),
            hide_zero_rows: false,
        }
    }

    fn source() -> StaticSource {
        StaticSource::new(vec![
            RawRow::new(RawDate::Date(date(8)))
                .with("QTY_IZD_PVH", 4)
                .with("QTY_MOSNET", 1),
            RawRow::new(RawDate::Date(date(10))).with("QTY_RAZDV", 2),
        ])
    }

    #[tokio::test]
    async fn test_empty_sheet_is_rewritten_and_windowed() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let backends = TestBackends::new(source(), MemorySheet::new());

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert!(report.full_rewrite);
        assert_eq!(report.records, 5);
        assert!(report.step_failures.is_empty());

        let grid = backends.sheet.rendered();
        assert_eq!(grid[0][..4], ["Date", "Products", "Sliding doors", "Mosquito nets"]);
        assert_eq!(grid[1], vec!["07.06.2024", "0", "0", "0"]);
        assert_eq!(grid[2], vec!["08.06.2024", "4", "0", "1"]);
        assert_eq!(grid[4], vec!["10.06.2024", "0", "2", "0"]);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0][5], "Last updated: 10.06.2024 01:00:00");

        // 07 and 08 are outside 09..=11
        assert_eq!(backends.sheet.hidden_rows(), vec![2, 3]);
        assert_eq!(report.hidden_rows, 2);
        assert!(backends.source.is_closed());
        assert_eq!(
            backends.source.requested(),
            vec![DateRange::new(date(7), date(11)).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_second_run_writes_no_data() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let backends = TestBackends::new(source(), MemorySheet::new());
        let job = SyncJob::new(&layout, &window);

        job.run(&backends, ctx()).await;
        let before = backends.sheet.rendered();
        backends.sheet.state().executed.clear();

        let report = job.run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.updates, 0);
        assert_eq!(report.appends, 0);
        assert_eq!(report.unchanged, 5);
        assert!(
            backends
                .sheet
                .executed()
                .iter()
                .all(|kind| !matches!(*kind, "update_ranges" | "insert_rows"))
        );
        assert_eq!(backends.sheet.rendered(), before);
    }

    #[tokio::test]
    async fn test_existing_rows_are_updated_and_new_dates_appended() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let sheet = MemorySheet::with_rows(&[
            &["Date", "Products", "Sliding doors", "Mosquito nets", "Comment"],
            &["01.06.2024", "3", "3", "3", "old"],
            &["08.06.2024", "0", "0", "0", "keep"],
        ]);
        let backends = TestBackends::new(source(), sheet);

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert_eq!(report.updates, 1);
        assert_eq!(report.appends, 4);

        let grid = backends.sheet.rendered();
        assert_eq!(grid[2], vec!["08.06.2024", "4", "0", "1", "keep"]);
        let dates: Vec<&str> = grid[3..].iter().map(|row| row[0].as_str()).collect();
        assert_eq!(dates, vec!["07.06.2024", "09.06.2024", "10.06.2024", "11.06.2024"]);
        assert_eq!(backends.sheet.hidden_rows(), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_source_failure_leaves_sheet_alone() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let backends = TestBackends::new(StaticSource::failing(), MemorySheet::new());

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::SourceFailed);
        assert!(!report.outcome.is_success());
        assert!(backends.source.is_closed());
        assert!(backends.sheet.executed().is_empty());
        assert_eq!(backends.sheet.state().reads, 0);
    }

    #[tokio::test]
    async fn test_unavailable_sheet_aborts_run() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let mut backends = TestBackends::new(source(), MemorySheet::new());
        backends.sheet_available = false;

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::SheetUnavailable);
        assert_eq!(report.records, 5);
        assert!(backends.source.is_closed());
    }

    #[tokio::test]
    async fn test_unreadable_sheet_takes_rewrite_path() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let sheet = MemorySheet::new();
        sheet.fail_reads();
        let backends = TestBackends::new(source(), sheet);

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        assert!(report.full_rewrite);
        assert_eq!(
            backends.sheet.executed(),
            vec!["write_block", "write_block"]
        );
    }

    #[tokio::test]
    async fn test_data_write_failure_skips_cosmetics() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let sheet = MemorySheet::new();
        sheet.fail_on("write_block");
        let backends = TestBackends::new(source(), sheet);

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::DataWriteFailed);
        assert!(backends.sheet.executed().is_empty());
        assert!(backends.sheet.formats().is_empty());
    }

    #[tokio::test]
    async fn test_cosmetic_failures_are_collected() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let sheet = MemorySheet::with_rows(&[
            &["Date", "Products", "Sliding doors", "Mosquito nets"],
            &["10.06.2024", "0", "2", "0"],
        ]);
        sheet.fail_on("set_row_visibility");
        sheet.fail_on("format_rows");
        let backends = TestBackends::new(source(), sheet);

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::Completed);
        let failed: Vec<&str> = report.step_failures.iter().map(|f| f.step).collect();
        assert_eq!(failed, vec!["row_visibility", "format_rows", "highlight_today"]);
        assert!(backends.sheet.rendered()[0][5].starts_with("Last updated: "));
    }

    #[tokio::test]
    async fn test_metric_header_under_status_cell_keeps_syncing() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let sheet = MemorySheet::with_rows(&[
            &["Date", "Products", "Mosquito nets", "Notes", "", "Sliding doors"],
            &["10.06.2024", "0", "0", "x", "", "0"],
        ]);
        let backends = TestBackends::new(source(), sheet);
        let job = SyncJob::new(&layout, &window);

        let first = job.run(&backends, ctx()).await;
        assert_eq!(first.outcome, JobOutcome::Completed);
        assert_eq!(backends.sheet.rendered()[0][5], "Sliding doors");
        assert_eq!(backends.sheet.rendered()[1][5], "2");

        let later = TestBackends::new(
            StaticSource::new(vec![
                RawRow::new(RawDate::Date(date(8)))
                    .with("QTY_IZD_PVH", 4)
                    .with("QTY_MOSNET", 1),
                RawRow::new(RawDate::Date(date(10))).with("QTY_RAZDV", 42),
            ]),
            backends.sheet.clone(),
        );
        let second = job.run(&later, ctx()).await;

        assert_eq!(second.outcome, JobOutcome::Completed);
        assert_eq!(second.updates, 1);
        let grid = backends.sheet.rendered();
        assert_eq!(grid[0][5], "Sliding doors");
        assert_eq!(grid[1][5], "42");
    }

    #[tokio::test]
    async fn test_header_mismatch_is_a_plan_failure() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let sheet = MemorySheet::with_rows(&[&["Day", "Products"], &["10.06.2024", "1"]]);
        let backends = TestBackends::new(source(), sheet);

        let report = SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        assert_eq!(report.outcome, JobOutcome::PlanFailed);
        assert!(backends.sheet.executed().is_empty());
    }

    #[tokio::test]
    async fn test_today_highlight_targets_todays_row() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let backends = TestBackends::new(source(), MemorySheet::new());

        SyncJob::new(&layout, &window).run(&backends, ctx()).await;

        let highlighted: Vec<RowSpan> = backends
            .sheet
            .formats()
            .into_iter()
            .filter(|(_, style)| style.background.is_some())
            .map(|(rows, _)| rows)
            .collect();
        assert_eq!(highlighted, vec![RowSpan::single(5)]);
    }

    #[tokio::test]
    async fn test_plan_does_not_write() {
        let layout = SheetLayout::load(None).unwrap();
        let window = window();
        let backends = TestBackends::new(source(), MemorySheet::new());

        let (plan, snapshot) = SyncJob::new(&layout, &window)
            .plan(&backends, ctx())
            .await
            .unwrap();

        assert!(snapshot.is_empty());
        assert!(matches!(plan, SyncPlan::FullRewrite { .. }));
        assert!(backends.sheet.executed().is_empty());
    }
}
