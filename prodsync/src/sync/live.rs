//! Backends wired to the configured database and Google worksheet

use anyhow::Result;
use async_trait::async_trait;

use super::job::Backends;
use crate::api::{ResilienceConfig, SheetsClient, Worksheet};
use crate::config::{Config, SheetConfig, SheetLayout, SourceConfig};
use crate::source::{MetricSource, SqlSource};

pub struct LiveBackends {
    source: SourceConfig,
    sheet: SheetConfig,
    resilience: ResilienceConfig,
    layout: SheetLayout,
}

impl LiveBackends {
    pub fn new(config: &Config, layout: &SheetLayout) -> Self {
        Self {
            source: config.source.clone(),
            sheet: config.sheet.clone(),
            resilience: config.resilience.clone(),
            layout: layout.clone(),
        }
    }
}

#[async_trait]
impl Backends for LiveBackends {
    async fn open_source(&self) -> Result<Box<dyn MetricSource>> {
        let source = SqlSource::connect(&self.source, &self.layout).await?;
        Ok(Box::new(source))
    }

    async fn open_sheet(&self) -> Result<Box<dyn Worksheet>> {
        let client = SheetsClient::open(&self.sheet, &self.resilience).await?;
        Ok(Box::new(client))
    }
}
