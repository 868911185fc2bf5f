//! Narrow capability interfaces onto the conversion service, plus the
//! reqwest implementation.
//!
//! The orchestrator and the Markdown renderer only see the traits here, so
//! tests drive them with scripted in-memory services while the binary wires
//! in [`HttpApi`].
//!
//! ```text
//! TaskOrchestrator ──▶ ConversionApi  ─┐
//!                                      ├─▶ HttpApi ──▶ remote service
//! MarkdownRenderer ──▶ MarkdownSource ─┘
//! ```

mod http;
pub mod models;
pub mod wire;

pub use http::HttpApi;

use crate::error::TransportError;
use crate::file::{MimeCategory, SelectedFile};
use async_trait::async_trait;
use std::sync::Arc;
use wire::{MarkdownResponse, ProcessResponse, ProgressResponse, UploadResponse};

/// Called as upload bytes leave the client: `(bytes_sent, total_bytes)`.
pub type UploadProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Requests the task orchestrator issues.
///
/// Implementations report transport-level failures only; interpreting
/// `success: false` bodies is the orchestrator's job.
#[async_trait]
pub trait ConversionApi: Send + Sync {
    /// Upload `file` to the endpoint for `category`, reporting byte progress
    /// through `progress` while the body streams.
    async fn upload(
        &self,
        file: &SelectedFile,
        category: MimeCategory,
        progress: UploadProgress,
    ) -> Result<UploadResponse, TransportError>;

    /// Ask the server to start processing a previously uploaded file.
    async fn start_processing(
        &self,
        unique_filename: &str,
        category: MimeCategory,
    ) -> Result<ProcessResponse, TransportError>;

    /// One progress query for `task_id`.
    async fn poll_progress(&self, task_id: &str) -> Result<ProgressResponse, TransportError>;
}

/// Fetches Markdown documents by server-relative path.
#[async_trait]
pub trait MarkdownSource: Send + Sync {
    async fn fetch_markdown(&self, path: &str) -> Result<MarkdownResponse, TransportError>;
}
