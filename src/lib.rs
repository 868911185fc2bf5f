//! # testsnap
//!
//! Client for a document-conversion service: submit a PDF or image, follow
//! the server-side processing to completion, and preview the resulting
//! Markdown with its math intact.
//!
//! ## Workflow
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Validate  PDF or image, ≤ 50 MiB (no request on failure)
//!  ├─ 2. Upload    multipart, streamed, byte-level progress
//!  ├─ 3. Process   start a server task → task_id
//!  ├─ 4. Poll      progress every 1–2 s, 5 min budget
//!  ├─ 5. Result    processed file + Markdown path
//!  └─ 6. Preview   load Markdown → rewrite image links → render HTML
//! ```
//!
//! Steps 1–5 belong to the [`TaskOrchestrator`]; step 6 to the
//! [`MarkdownRenderer`]. They share nothing but the [`ResultDescriptor`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use testsnap::{ClientConfig, HttpApi, MarkdownRenderer, SelectedFile, TaskOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let api = Arc::new(HttpApi::new(&config)?);
//!     let orchestrator = TaskOrchestrator::new(api.clone(), config.clone());
//!
//!     orchestrator.submit_file(&SelectedFile::from_path("paper.pdf").await?).await?;
//!     orchestrator.start_processing().await?;
//!     let done = orchestrator
//!         .subscribe()
//!         .wait_for(|s| s.state().is_terminal())
//!         .await?
//!         .clone();
//!
//!     if let Some(result) = done.lifecycle.result {
//!         let renderer = MarkdownRenderer::new(api, &config);
//!         renderer.load_from_path(&result.markdown_path).await?;
//!         println!("{}", renderer.preview().html);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `testsnap` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! testsnap = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod progress;
pub mod render;
pub mod task;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::models::{ModelCatalog, ModelSelection, OcrApiModel};
pub use client::{ConversionApi, HttpApi, MarkdownSource, UploadProgress};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ConfigError, LoadError, RenderError, TaskError, TransportError, ValidationError};
pub use file::{format_file_size, validate_file, MimeCategory, SelectedFile};
pub use progress::{NoopProgressCallback, ProgressCallback, TaskProgressCallback};
pub use render::{
    rewrite_image_paths, ComrakEngine, LoadNotice, MarkdownEngine, MarkdownRenderer,
    PassthroughTypesetter, Preview, RenderPipeline, RenderState, Typesetter,
};
pub use task::{
    status_view, ProgressSnapshot, ProgressStatus, ResultDescriptor, StatusView, TaskHandle,
    TaskOrchestrator, TaskSnapshot, TaskState, UploadDescriptor,
};
