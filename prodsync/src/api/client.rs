//! Google Sheets REST client
//!
//! Thin wrapper over the v4 values and batchUpdate endpoints. Every request goes
//! through the retry policy; everything that is not a transient failure is
//! returned to the caller, which logs it and moves on to the next tick.
//! Row inserts are not idempotent and are only replayed when the server
//! rejected them outright.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use super::auth::service_account_token;
use super::error::ApiError;
use super::operations::a1::{cell_ref, parse_cell, quote_title};
use super::operations::{CellValue, SheetOperation};
use super::requests;
use super::resilience::{ResilienceConfig, RetryPolicy, RetryableError};
use super::worksheet::Worksheet;
use crate::config::SheetConfig;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// When a failed request may be sent again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Idempotent request: any transient failure
    Transient,
    /// Only when the server never applied it
    Rejected,
}

impl Replay {
    fn allows(self, err: &ApiError) -> bool {
        match self {
            Self::Transient => err.is_retryable(),
            Self::Rejected => err.is_rejected(),
        }
    }
}

/// An authenticated session bound to one worksheet
pub struct SheetsClient {
    http: reqwest::Client,
    token: String,
    spreadsheet_id: String,
    sheet_id: i64,
    sheet_title: String,
    retry: RetryPolicy,
    request_logging: bool,
}

impl SheetsClient {
    /// Authenticate and resolve the configured workbook and worksheet
    pub async fn open(config: &SheetConfig, resilience: &ResilienceConfig) -> Result<Self> {
        info!("Authorizing with Google Sheets...");
        let token = service_account_token(&config.credentials_file).await?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let mut client = Self {
            http,
            token,
            spreadsheet_id: String::new(),
            sheet_id: 0,
            sheet_title: config.worksheet_name.clone(),
            retry: RetryPolicy::new(resilience.retry.clone()),
            request_logging: resilience.monitoring.request_logging,
        };

        client.spreadsheet_id = match &config.spreadsheet_id {
            Some(id) => id.clone(),
            None => {
                info!("Opening workbook '{}'...", config.spreadsheet_name);
                client.find_spreadsheet(&config.spreadsheet_name).await?
            }
        };
        client.sheet_id = client.find_worksheet(&config.worksheet_name).await?;

        info!(
            "Connected to worksheet '{}' (spreadsheet {}, sheet {})",
            client.sheet_title, client.spreadsheet_id, client.sheet_id
        );
        Ok(client)
    }

    async fn request_json(
        &self,
        description: &str,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.send(description, method, url, query, body, Replay::Transient)
            .await
    }

    async fn send(
        &self,
        description: &str,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        replay: Replay,
    ) -> Result<Value, ApiError> {
        if self.request_logging {
            debug!("{} {} ({})", method, url, description);
        }

        self.retry
            .execute(
                description,
                || {
                    let mut request = self
                        .http
                        .request(method.clone(), url)
                        .bearer_auth(&self.token)
                        .query(query);
                    if let Some(body) = body {
                        request = request.json(body);
                    }

                    async move {
                        let response = request.send().await.map_err(ApiError::Transport)?;
                        let status = response.status();
                        if !status.is_success() {
                            let body = response.text().await.unwrap_or_default();
                            return Err(ApiError::Status {
                                status: status.as_u16(),
                                body,
                            });
                        }
                        response.json::<Value>().await.map_err(ApiError::Transport)
                    }
                },
                |err| replay.allows(err),
            )
            .await
    }

    /// Look a workbook up by exact name through the Drive API
    async fn find_spreadsheet(&self, name: &str) -> Result<String> {
        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
        let q = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escaped, SPREADSHEET_MIME
        );

        let response = self
            .request_json(
                "find spreadsheet",
                Method::GET,
                DRIVE_FILES_API,
                &[
                    ("q", q.as_str()),
                    ("fields", "files(id,name)"),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ],
                None,
            )
            .await
            .with_context(|| format!("Failed to search for workbook '{}'", name))?;

        let files = response["files"].as_array().cloned().unwrap_or_default();
        if files.len() > 1 {
            warn!(
                "{} workbooks are named '{}'; using the first one",
                files.len(),
                name
            );
        }

        files
            .first()
            .and_then(|file| file["id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "Workbook '{}' not found or not shared with the service account",
                    name
                )
            })
    }

    async fn find_worksheet(&self, title: &str) -> Result<i64> {
        let url = format!("{}/{}", SHEETS_API, self.spreadsheet_id);
        let response = self
            .request_json(
                "fetch spreadsheet metadata",
                Method::GET,
                &url,
                &[("fields", "sheets.properties(sheetId,title)")],
                None,
            )
            .await
            .context("Failed to read spreadsheet metadata")?;

        let sheets = response["sheets"].as_array().cloned().unwrap_or_default();
        for sheet in &sheets {
            let properties = &sheet["properties"];
            if properties["title"].as_str() == Some(title) {
                if let Some(id) = properties["sheetId"].as_i64() {
                    return Ok(id);
                }
            }
        }

        let available: Vec<&str> = sheets
            .iter()
            .filter_map(|s| s["properties"]["title"].as_str())
            .collect();
        bail!(
            "Worksheet '{}' not found (available: {})",
            title,
            available.join(", ")
        )
    }

    fn qualified(&self, range: &str) -> String {
        format!("{}!{}", quote_title(&self.sheet_title), range)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            SHEETS_API,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    async fn put_values(
        &self,
        description: &str,
        range: &str,
        rows: &[Vec<CellValue>],
    ) -> Result<()> {
        let range = self.qualified(range);
        let body = requests::value_range(&range, rows);
        self.request_json(
            description,
            Method::PUT,
            &self.values_url(&range),
            &[("valueInputOption", requests::VALUE_INPUT_OPTION)],
            Some(&body),
        )
        .await
        .with_context(|| format!("Failed to write {}", range))?;
        Ok(())
    }

    async fn batch_update(
        &self,
        description: &str,
        batch: Vec<Value>,
        replay: Replay,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{}:batchUpdate", SHEETS_API, self.spreadsheet_id);
        let body = requests::batch_update(batch);
        self.send(description, Method::POST, &url, &[], Some(&body), replay)
            .await
            .with_context(|| format!("Failed to {}", description))?;
        Ok(())
    }
}

/// Block range covering `rows` starting at the A1 cell `start`
fn block_range(start: &str, rows: &[Vec<CellValue>]) -> Result<String> {
    let (column, row) =
        parse_cell(start).ok_or_else(|| anyhow!("Invalid start cell '{}'", start))?;
    let width = rows.iter().map(Vec::len).max().unwrap_or(1).max(1);
    let height = rows.len().max(1) as u32;
    if width == 1 && height == 1 {
        return Ok(cell_ref(column, row));
    }
    Ok(format!(
        "{}:{}",
        cell_ref(column, row),
        cell_ref(column + width - 1, row + height - 1)
    ))
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Worksheet for SheetsClient {
    fn title(&self) -> &str {
        &self.sheet_title
    }

    async fn read_values(&mut self) -> Result<Vec<Vec<String>>> {
        let range = quote_title(&self.sheet_title);
        let response = self
            .request_json(
                "read worksheet values",
                Method::GET,
                &self.values_url(&range),
                &[
                    ("valueRenderOption", "FORMATTED_VALUE"),
                    ("majorDimension", "ROWS"),
                ],
                None,
            )
            .await
            .with_context(|| format!("Failed to read worksheet '{}'", self.sheet_title))?;

        let grid = response["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(cell_to_string).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(grid)
    }

    async fn execute(&mut self, operation: &SheetOperation) -> Result<()> {
        match operation {
            SheetOperation::WriteBlock { start, rows } => {
                let range = block_range(start, rows)?;
                self.put_values("write block", &range, rows).await
            }
            SheetOperation::UpdateRanges { ranges } => {
                if ranges.is_empty() {
                    return Ok(());
                }
                let url = format!("{}/{}/values:batchUpdate", SHEETS_API, self.spreadsheet_id);
                let body = requests::batch_values(ranges, |r| self.qualified(r));
                self.request_json("update ranges", Method::POST, &url, &[], Some(&body))
                    .await
                    .context("Failed to batch update rows")?;
                Ok(())
            }
            SheetOperation::InsertRows { at, rows } => {
                if rows.is_empty() {
                    return Ok(());
                }
                self.batch_update(
                    "insert rows",
                    vec![requests::insert_rows(self.sheet_id, *at, rows.len() as u32)],
                    Replay::Rejected,
                )
                .await?;
                let range = block_range(&cell_ref(0, *at), rows)?;
                self.put_values("fill inserted rows", &range, rows).await
            }
            SheetOperation::SetRowVisibility { reset, hidden } => {
                let mut batch = Vec::with_capacity(hidden.len() + 1);
                if let Some(span) = reset {
                    batch.push(requests::row_visibility(self.sheet_id, *span, false));
                }
                for span in hidden {
                    batch.push(requests::row_visibility(self.sheet_id, *span, true));
                }
                self.batch_update("update row visibility", batch, Replay::Transient)
                    .await
            }
            SheetOperation::FormatRows { rows, style } => {
                self.batch_update(
                    "format rows",
                    vec![requests::format_rows(self.sheet_id, *rows, style)],
                    Replay::Transient,
                )
                .await
            }
        }
    }
}
