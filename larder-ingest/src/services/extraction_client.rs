//! HTTP client for the external extraction service
//!
//! Speaks JSON over HTTP: POST the image bytes to dispatch, GET the job
//! handle to query status. The API key travels in the X-Api-Key header.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ExtractionConfig;
use crate::services::extraction::{
    ExtractionError, ExtractionService, ExtractionStatus, SubmitResponse,
};

const USER_AGENT: &str = "larder/0.1.0 (https://github.com/larder/larder)";

/// Production extraction client
pub struct HttpExtractionClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpExtractionClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn check_http_errors(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ExtractionError> {
        let status = response.status();

        if status == 401 {
            return Err(ExtractionError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionClient {
    async fn submit(
        &self,
        image: &[u8],
        media_type: &str,
    ) -> Result<String, ExtractionError> {
        let url = format!("{}/receipts", self.base_url);

        tracing::debug!(
            bytes = image.len(),
            media_type = media_type,
            "Dispatching receipt image to extraction service"
        );

        let response = self
            .http_client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, media_type)
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        let response = Self::check_http_errors(response).await?;

        let submit: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::ParseError(e.to_string()))?;

        tracing::info!(job_id = %submit.job_id, "Receipt dispatched for extraction");

        Ok(submit.job_id)
    }

    async fn fetch_status(&self, job_id: &str) -> Result<ExtractionStatus, ExtractionError> {
        let url = format!("{}/receipts/{}", self.base_url, job_id);

        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        let response = Self::check_http_errors(response).await?;

        response
            .json()
            .await
            .map_err(|e| ExtractionError::ParseError(e.to_string()))
    }
}
