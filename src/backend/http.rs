//! JSON-over-HTTP backend for a Textract-compatible analysis gateway.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | analyze   | `POST {base}/analyze`, body `{"Document": {"Bytes": b64}, "FeatureTypes": [...]}` |
//! | detect    | `POST {base}/detect-text`, body `{"Document": {"Bytes": b64}}` |
//! | submit    | `POST {base}/jobs`, body `{"DocumentLocation": {"S3Object": {...}}, "FeatureTypes": [...]}` |
//! | poll      | `GET {base}/jobs/{id}?NextToken=…` |
//! | fetch     | `GET {base}/objects/{bucket}/{key}`, raw bytes back |
//!
//! HTTP 429 and 503, and error bodies naming a throttling exception, map to
//! [`BackendError::Throttled`]; other non-2xx answers map to
//! [`BackendError::Rejected`].

use super::{AnalysisBackend, AnalysisResponse, DocumentLocation, PollResponse};
use crate::block::RawBlock;
use crate::error::{BackendError, ExtractError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const FEATURE_TYPES: [&str; 2] = ["TABLES", "FORMS"];

const THROTTLING_CODES: [&str; 3] = [
    "ThrottlingException",
    "ProvisionedThroughputExceededException",
    "LimitExceededException",
];

/// HTTP client for an analysis gateway.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitResponse {
    job_id: String,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExtractError> {
        let base = Url::parse(base_url).map_err(|e| ExtractError::InvalidInput {
            input: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ExtractError::InvalidInput {
                input: base_url.to_string(),
                reason: "endpoint must be http:// or https://".into(),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Transport(format!("cannot extend base URL {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, location: &DocumentLocation) -> Result<Url, BackendError> {
        let mut segments = vec!["objects", location.bucket.as_str()];
        segments.extend(location.key.split('/'));
        self.endpoint(&segments)
    }

    async fn post(&self, url: Url, body: serde_json::Value) -> Result<Vec<u8>, BackendError> {
        let payload =
            serde_json::to_vec(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(classify_error(status, &String::from_utf8_lossy(&body)))
        }
    }
}

/// Map a non-success answer to a backend error.
fn classify_error(status: StatusCode, body: &str) -> BackendError {
    let throttled_body = THROTTLING_CODES.iter().any(|code| body.contains(code));
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::SERVICE_UNAVAILABLE
        || throttled_body
    {
        return BackendError::Throttled(format!("HTTP {}", status.as_u16()));
    }
    let message: String = body.chars().take(200).collect();
    BackendError::Rejected {
        code: status.as_u16().to_string(),
        message,
    }
}

fn document_body(document: &[u8]) -> serde_json::Value {
    json!({ "Document": { "Bytes": STANDARD.encode(document) } })
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn analyze_sync(&self, document: &[u8]) -> Result<Vec<RawBlock>, BackendError> {
        let mut body = document_body(document);
        body["FeatureTypes"] = json!(FEATURE_TYPES);
        let raw = self.post(self.endpoint(&["analyze"])?, body).await?;
        Ok(AnalysisResponse::from_json(&raw)?.blocks)
    }

    async fn submit_async_job(&self, location: &DocumentLocation) -> Result<String, BackendError> {
        let body = json!({
            "DocumentLocation": {
                "S3Object": { "Bucket": location.bucket, "Name": location.key }
            },
            "FeatureTypes": FEATURE_TYPES,
        });
        let raw = self.post(self.endpoint(&["jobs"])?, body).await?;
        let resp: SubmitResponse =
            serde_json::from_slice(&raw).map_err(|e| BackendError::Malformed(e.to_string()))?;
        debug!("Gateway accepted job {}", resp.job_id);
        Ok(resp.job_id)
    }

    async fn poll_async_job(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<PollResponse, BackendError> {
        let mut url = self.endpoint(&["jobs", job_id])?;
        if let Some(token) = next_token {
            url.query_pairs_mut().append_pair("NextToken", token);
        }
        let raw = self.send(self.client.get(url)).await?;
        AnalysisResponse::from_json(&raw)?.into_poll()
    }

    async fn fetch_document(&self, location: &DocumentLocation) -> Result<Vec<u8>, BackendError> {
        let url = self.object_url(location)?;
        self.send(self.client.get(url)).await
    }

    async fn detect_text(&self, document: &[u8]) -> Result<Vec<RawBlock>, BackendError> {
        let raw = self
            .post(self.endpoint(&["detect-text"])?, document_body(document))
            .await?;
        Ok(AnalysisResponse::from_json(&raw)?.blocks)
    }
}
