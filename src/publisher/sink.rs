use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;

use super::{Error, Result};
use crate::sampler::MetricPoint;

pub const SCHEMA_VERSION: u32 = 2;

/// One publish cycle's worth of samples.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricsBatch {
    pub host_id: String,
    pub timestamp: DateTime<Utc>,
    pub containers: Vec<MetricPoint>,
    pub schema_version: u32,
}

/// Remote collector receiving metric batches.
pub trait MetricsSink: Send + Sync + 'static {
    fn send(&self, batch: &MetricsBatch) -> impl Future<Output = Result<()>> + Send;
}

/// Posts batches as JSON with a bearer credential.
#[derive(Debug, Clone)]
pub struct HttpMetricsSink {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpMetricsSink {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }
}

impl MetricsSink for HttpMetricsSink {
    async fn send(&self, batch: &MetricsBatch) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(batch)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
