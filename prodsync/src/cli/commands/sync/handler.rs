//! Sync command handlers

use anyhow::{Result, bail};
use colored::*;
use log::{error, info};

use super::PlanArgs;
use crate::api::operations::CellValue;
use crate::config::{Config, SheetLayout};
use crate::scheduler;
use crate::sync::{JobOutcome, JobReport, LiveBackends, RunContext, SyncJob, SyncPlan};

/// Run immediately, then on the configured schedule until Ctrl-C
pub async fn handle_run_command(config: &Config, layout: &SheetLayout) -> Result<()> {
    let backends = LiveBackends::new(config, layout);
    let job = SyncJob::new(layout, &config.window);

    let (job, backends) = (&job, &backends);
    let ticks = scheduler::run(
        config.schedule,
        move || async move {
            let report = job.run(backends, RunContext::local()).await;
            log_report(&report);
        },
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        },
    )
    .await;

    info!("Stopped after {} completed runs", ticks);
    Ok(())
}

/// Run once; the exit status reflects the outcome
pub async fn handle_once_command(config: &Config, layout: &SheetLayout) -> Result<()> {
    let backends = LiveBackends::new(config, layout);
    let report = SyncJob::new(layout, &config.window)
        .run(&backends, RunContext::local())
        .await;

    println!("{}", summarize(&report));
    if !report.outcome.is_success() {
        bail!("Sync run failed: {:?}", report.outcome);
    }
    Ok(())
}

/// Print the reconciliation plan without writing
pub async fn handle_plan_command(
    args: PlanArgs,
    config: &Config,
    layout: &SheetLayout,
) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let ctx = match args.today {
        Some(today) => RunContext::at(today.and_time(chrono::Local::now().time())),
        None => RunContext::local(),
    };
    let backends = LiveBackends::new(config, layout);
    let job = SyncJob::new(layout, &config.window);

    println!(
        "Planning sync for {} (source dates {})",
        ctx.today.to_string().bright_cyan(),
        job.fetch_range(ctx.today)
    );
    let (plan, snapshot) = job.plan(&backends, ctx).await?;
    println!(
        "Worksheet has {} data rows",
        snapshot.rows.len().to_string().bold()
    );
    println!();
    for line in describe_plan(&plan, args.verbose) {
        println!("{}", line);
    }
    Ok(())
}

fn log_report(report: &JobReport) {
    if report.outcome.is_success() {
        info!("{}", summarize(report));
    } else {
        error!("{}", summarize(report));
    }
}

fn summarize(report: &JobReport) -> String {
    let outcome = match report.outcome {
        JobOutcome::Completed => "completed".green(),
        JobOutcome::SheetUntouched => "nothing to do".green(),
        JobOutcome::SourceFailed => "source failed".red(),
        JobOutcome::SheetUnavailable => "worksheet unavailable".red(),
        JobOutcome::PlanFailed => "header mismatch".red(),
        JobOutcome::DataWriteFailed => "write failed".red(),
    };
    let mut summary = format!(
        "Sync {}: {} records, {} updated, {} appended, {} unchanged, {} hidden rows",
        outcome, report.records, report.updates, report.appends, report.unchanged, report.hidden_rows
    );
    if report.full_rewrite {
        summary.push_str(", sheet rewritten");
    }
    if !report.step_failures.is_empty() {
        let steps: Vec<&str> = report.step_failures.iter().map(|f| f.step).collect();
        summary.push_str(&format!(", failed steps: {}", steps.join(", ").yellow()));
    }
    summary
}

fn render_values(values: &[CellValue]) -> String {
    values
        .iter()
        .map(CellValue::as_input)
        .collect::<Vec<_>>()
        .join(" | ")
}

fn describe_plan(plan: &SyncPlan, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();
    match plan {
        SyncPlan::Untouched => {
            lines.push("Sheet is empty and there is nothing to write".dimmed().to_string());
        }
        SyncPlan::FullRewrite { rows } => {
            lines.push(format!(
                "{} write header and {} rows from A1",
                "rewrite".bright_yellow().bold(),
                rows.len().saturating_sub(1)
            ));
            if verbose {
                for row in rows {
                    lines.push(format!("  {}", render_values(row)));
                }
            }
        }
        SyncPlan::Incremental {
            updates,
            appends,
            insert_at,
            unchanged,
        } => {
            lines.push(format!(
                "{} to update, {} to append, {} unchanged",
                updates.len().to_string().yellow(),
                appends.len().to_string().green(),
                unchanged
            ));
            if verbose {
                for update in updates {
                    for write in &update.writes {
                        let values: Vec<String> = write
                            .values
                            .iter()
                            .map(|row| render_values(row))
                            .collect();
                        lines.push(format!(
                            "  {} {} {} {}",
                            "~".yellow(),
                            update.date,
                            write.range,
                            values.join(" / ")
                        ));
                    }
                }
                for (offset, append) in appends.iter().enumerate() {
                    lines.push(format!(
                        "  {} {} row {} {}",
                        "+".green(),
                        append.date,
                        *insert_at as usize + offset,
                        render_values(&append.values)
                    ));
                }
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::models::SheetSnapshot;
    use crate::sync::presenter::StepFailure;
    use crate::sync::{MetricRecord, reconcile};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_describe_incremental_plan() {
        let layout = SheetLayout::load(None).unwrap();
        let snapshot = SheetSnapshot::from_grid(vec![
            layout.header(),
            vec!["01.06.2024".into(), "1".into(), "0".into(), "0".into()],
        ]);
        let records = vec![
            MetricRecord::new(date(1), vec![2, 0, 0]),
            MetricRecord::new(date(2), vec![0, 0, 0]),
        ];
        let plan = reconcile(&records, &layout, &snapshot).unwrap();

        let summary = describe_plan(&plan, false);
        assert_eq!(summary.len(), 1);

        let detailed = describe_plan(&plan, true);
        assert_eq!(detailed.len(), 3);
        assert!(detailed[1].contains("A2:D2"));
        assert!(detailed[2].contains("row 3"));
        assert!(detailed[2].contains("02.06.2024"));
    }

    #[test]
    fn test_describe_untouched_plan() {
        let lines = describe_plan(&SyncPlan::Untouched, true);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("nothing to write"));
    }

    #[test]
    fn test_describe_full_rewrite() {
        let layout = SheetLayout::load(None).unwrap();
        let records = vec![MetricRecord::new(date(1), vec![1, 2, 3])];
        let plan = reconcile(&records, &layout, &SheetSnapshot::default()).unwrap();

        let lines = describe_plan(&plan, true);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Date | Products"));
        assert!(lines[2].contains("01.06.2024 | 1 | 2 | 3"));
    }

    #[test]
    fn test_summary_lists_failed_steps() {
        let report = JobReport {
            outcome: JobOutcome::Completed,
            records: 15,
            full_rewrite: false,
            updates: 2,
            appends: 1,
            unchanged: 12,
            hidden_rows: 9,
            step_failures: vec![StepFailure {
                step: "highlight_today",
                error: "boom".into(),
            }],
        };

        let summary = summarize(&report);
        assert!(summary.contains("15 records, 2 updated, 1 appended, 12 unchanged"));
        assert!(summary.contains("highlight_today"));
    }
}
