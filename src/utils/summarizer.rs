use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("AI request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("AI request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unexpected AI response")]
    UnexpectedResponse,
}

/// Reduces a piece of text to a summary.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct SummaryItem {
    summary_text: String,
}

/// Client for a Hugging Face summarization inference endpoint.
pub struct HuggingFaceSummarizer {
    client: Client,
    api_token: Option<String>,
    endpoint: url::Url,
}

impl HuggingFaceSummarizer {
    pub fn new(
        endpoint: url::Url,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SummarizeError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_token,
            endpoint,
        })
    }
}

/// Pulls `summary_text` out of the first element of the response array.
fn parse_summary(body: &str) -> Result<String, SummarizeError> {
    let items: Vec<SummaryItem> =
        serde_json::from_str(body).map_err(|_| SummarizeError::UnexpectedResponse)?;
    items
        .into_iter()
        .next()
        .map(|item| item.summary_text)
        .ok_or(SummarizeError::UnexpectedResponse)
}

#[async_trait]
impl Summarize for HuggingFaceSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        info!(endpoint = %self.endpoint, chars = text.chars().count(), "Requesting summary");

        let mut request_builder = self
            .client
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json");

        if let Some(token) = &self.api_token {
            request_builder = request_builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request_builder
            .json(&InferenceRequest { inputs: text })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Received response from summarization API: {}", body);

        if !status.is_success() {
            error!("Summarization API error: Status {}", status);
            return Err(SummarizeError::Status { status, body });
        }

        parse_summary(&body)
    }
}
