//! A client for the configuration analysis and SQL review API.

use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::collectors::system::SystemMetrics;
use crate::config::ReviewApiConfig;
use crate::models::{
    BatchReviewRequest, BatchReviewResponse, MigrationReviewRequest, MigrationReviewResponse,
    QueryReviewRequest, QueryReviewResponse, Recommendation, ServerData, ServerInfo,
};

/// Path prefix for requests made by scheduled tasks.
const SCHEDULER_PREFIX: &str = "/scheduler";

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to send request to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to unmarshal response: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Serialize)]
struct SystemMetricsAnalysis<'a> {
    config: &'a SystemMetrics,
    environment: &'a str,
    server_info: &'a ServerInfo,
}

/// Review API client. The base URL is fixed at construction.
#[derive(Debug, Clone)]
pub struct ReviewClient {
    base_url: String,
    http: reqwest::Client,
}

impl ReviewClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReviewError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ReviewError::Client)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &ReviewApiConfig) -> Result<Self, ReviewError> {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, scheduled: bool, path: &str) -> String {
        let prefix = if scheduled { SCHEDULER_PREFIX } else { "" };
        format!("{}{}{}", self.base_url, prefix, path)
    }

    async fn post<B, R>(&self, url: String, body: &B) -> Result<R, ReviewError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(%url, "Sending review API request");
        let request_err = |source| ReviewError::Request {
            url: url.clone(),
            source,
        };
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(request_err)?;

        let status = response.status();
        let text = response.text().await.map_err(request_err)?;
        if status != reqwest::StatusCode::OK {
            error!(status = %status, body = %text, "Review API request failed");
            return Err(ReviewError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(ReviewError::Decode)
    }

    /// Sends server configuration for analysis.
    #[instrument(skip(self, server_data))]
    pub async fn analyze_config(
        &self,
        server_data: &ServerData,
        scheduled: bool,
    ) -> Result<Recommendation, ReviewError> {
        self.post(self.url(scheduled, "/config/analyze"), server_data)
            .await
    }

    /// Sends a system metrics snapshot for analysis.
    #[instrument(skip(self, metrics, server_info))]
    pub async fn analyze_system_metrics(
        &self,
        metrics: &SystemMetrics,
        server_info: &ServerInfo,
        environment: &str,
        scheduled: bool,
    ) -> Result<Recommendation, ReviewError> {
        let body = SystemMetricsAnalysis {
            config: metrics,
            environment,
            server_info,
        };
        self.post(self.url(scheduled, "/config/analyze"), &body)
            .await
    }

    #[instrument(skip(self, request))]
    pub async fn review_query(
        &self,
        request: &QueryReviewRequest,
    ) -> Result<QueryReviewResponse, ReviewError> {
        self.post(self.url(false, "/review/"), request).await
    }

    #[instrument(skip(self, request), fields(count = request.queries.len()))]
    pub async fn review_batch(
        &self,
        request: &BatchReviewRequest,
    ) -> Result<BatchReviewResponse, ReviewError> {
        self.post(self.url(false, "/review/batch"), request).await
    }

    #[instrument(skip(self, request))]
    pub async fn review_migration(
        &self,
        request: &MigrationReviewRequest,
    ) -> Result<MigrationReviewResponse, ReviewError> {
        self.post(self.url(false, "/review/"), request).await
    }
}
