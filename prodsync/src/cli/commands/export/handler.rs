//! Write normalized records to an Excel workbook

use anyhow::{Context, Result};
use colored::*;
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

use super::ExportArgs;
use crate::api::operations::a1::cell_ref;
use crate::config::{Config, SheetLayout};
use crate::sync::dates::format_date;
use crate::sync::{LiveBackends, MetricRecord, SyncJob};

const SHEET_NAME: &str = "Production";

pub async fn handle_export_command(
    args: ExportArgs,
    config: &Config,
    layout: &SheetLayout,
) -> Result<()> {
    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let backends = LiveBackends::new(config, layout);
    let job = SyncJob::new(layout, &config.window);

    let records = job.fetch_records(&backends, today).await?;
    write_records_xlsx(&records, layout, &args.output)?;

    println!(
        "Exported {} days ({}) to {}",
        records.len(),
        job.fetch_range(today),
        args.output.display().to_string().bright_green()
    );
    Ok(())
}

/// One row per record in layout order, with a live total column when configured
pub fn write_records_xlsx(records: &[MetricRecord], layout: &SheetLayout, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, name) in layout.header().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &bold)?;
    }

    let metrics = layout.metrics.len();
    for (idx, record) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        worksheet.write_string(row, 0, format_date(record.date, &layout.date_format))?;
        for (offset, value) in record.values.iter().enumerate() {
            worksheet.write_number(row, (offset + 1) as u16, *value as f64)?;
        }
        if layout.total_column.is_some() {
            // xlsx rows are 0-based, A1 references 1-based
            let formula = format!(
                "=SUM({}:{})",
                cell_ref(1, row + 1),
                cell_ref(metrics, row + 1)
            );
            worksheet.write_formula(row, (metrics + 1) as u16, formula.as_str())?;
        }
    }

    worksheet.autofit();
    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    Ok(())
}
