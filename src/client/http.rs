//! reqwest-backed implementation of the service interfaces.
//!
//! Uploads stream the file body chunk by chunk through
//! [`reqwest::Body::wrap_stream`] so byte-level progress can be reported
//! while the request is in flight.

use super::models::ModelSelection;
use super::wire::{
    message_from_body, AckResponse, HealthResponse, MarkdownRequest, MarkdownResponse,
    ProcessRequest, ProcessResponse, ProgressResponse, UploadResponse,
};
use super::{ConversionApi, MarkdownSource, UploadProgress};
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::file::{MimeCategory, SelectedFile};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Longest body excerpt quoted in a [`TransportError::Malformed`] detail.
const BODY_EXCERPT_CHARS: usize = 100;

/// HTTP client for the conversion service.
#[derive(Debug, Clone)]
pub struct HttpApi {
    /// Bounded by `request_timeout`; used for every JSON request.
    client: reqwest::Client,
    /// No overall timeout: large uploads on slow links legitimately take long.
    upload_client: reqwest::Client,
    config: ClientConfig,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(unreachable)?;
        let upload_client = reqwest::Client::builder().build().map_err(unreachable)?;
        Ok(Self {
            client,
            upload_client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Switch the server's reading-order and OCR models.
    pub async fn update_model_config(
        &self,
        selection: &ModelSelection,
    ) -> Result<AckResponse, TransportError> {
        let url = self.config.endpoint("update/model_config");
        info!(
            "Updating model config: read={} ocr={}/{}",
            selection.read_model, selection.ocr_api_model.api_name, selection.ocr_api_model.model_name
        );
        let response = self
            .client
            .post(&url)
            .json(selection)
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    /// Liveness probe.
    pub async fn health(&self) -> Result<HealthResponse, TransportError> {
        let response = self
            .client
            .get(self.config.endpoint("health"))
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }
}

#[async_trait]
impl ConversionApi for HttpApi {
    async fn upload(
        &self,
        file: &SelectedFile,
        category: MimeCategory,
        progress: UploadProgress,
    ) -> Result<UploadResponse, TransportError> {
        let url = self.config.endpoint(&format!("{}/upload", category.as_str()));
        let total = file.size_bytes();
        info!("Uploading '{}' ({} bytes) to {}", file.name(), total, url);

        let chunks = file.byte_stream().await.map_err(|e| TransportError::Source {
            detail: format!("{}: {e}", file.name()),
        })?;

        let sent = Arc::new(AtomicU64::new(0));
        let counted = chunks.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                let n = bytes.len() as u64;
                let so_far = sent.fetch_add(n, Ordering::SeqCst) + n;
                progress(so_far, total);
            }
            chunk
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(counted), total)
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())
            .map_err(|e| TransportError::Source {
                detail: format!("invalid MIME type '{}': {e}", file.mime_type()),
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .upload_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    async fn start_processing(
        &self,
        unique_filename: &str,
        category: MimeCategory,
    ) -> Result<ProcessResponse, TransportError> {
        let url = self.config.endpoint(&format!("{}/process", category.as_str()));
        debug!("Starting processing of {} via {}", unique_filename, url);
        let response = self
            .client
            .post(&url)
            .json(&ProcessRequest {
                filename: unique_filename,
            })
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }

    async fn poll_progress(&self, task_id: &str) -> Result<ProgressResponse, TransportError> {
        let url = self
            .config
            .endpoint(&format!("task/progress/{}", urlencoding::encode(task_id)));
        let response = self.client.get(&url).send().await.map_err(unreachable)?;
        decode(response).await
    }
}

#[async_trait]
impl MarkdownSource for HttpApi {
    async fn fetch_markdown(&self, path: &str) -> Result<MarkdownResponse, TransportError> {
        let url = self.config.endpoint("markdown");
        debug!("Fetching markdown '{}'", path);
        let response = self
            .client
            .post(&url)
            .json(&MarkdownRequest { path })
            .send()
            .await
            .map_err(unreachable)?;
        decode(response).await
    }
}

fn unreachable(e: reqwest::Error) -> TransportError {
    let detail = if e.is_timeout() {
        format!("request timed out ({e})")
    } else {
        e.to_string()
    };
    TransportError::Unreachable { detail }
}

/// Reject non-2xx statuses, then decode the JSON body.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| TransportError::Malformed {
        detail: format!("could not read body: {e}"),
    })?;

    if !status.is_success() {
        return Err(TransportError::HttpStatus {
            status: status.as_u16(),
            message: message_from_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| TransportError::Malformed {
        detail: format!("{e}; body starts with {:?}", excerpt(&body)),
    })
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
