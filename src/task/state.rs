//! Task-cycle data: lifecycle state, descriptors, progress, and the pure
//! reducer that turns them into a displayable status.
//!
//! Lifecycle and progress are tracked separately ([`Lifecycle`] and
//! [`ProgressSnapshot`]) and only combined by [`status_view`], so neither can
//! drift out of sync with a duplicate copy of the other.

use super::normalize_separators;
use crate::client::wire::ProcessResult;
use crate::config::ClientConfig;
use crate::error::TaskError;
use crate::file::{format_file_size, MimeCategory};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MSG_PROCESSING: &str = "Processing...";
pub const MSG_COMPLETE: &str = "Processing complete";
pub const MSG_FAILED: &str = "Processing failed";
pub const MSG_START_FAILED: &str = "Failed to start processing";
pub const MSG_INVALID_RESULT: &str = "Invalid processing result";
pub const MSG_UPLOAD_FAILED: &str = "Upload failed";
pub const MSG_UPLOADED: &str = "Upload complete";
pub const MSG_PROGRESS_FAILED: &str = "Failed to fetch progress";

// ── Lifecycle ────────────────────────────────────────────────────────────

/// Where the current task cycle is.
///
/// ```text
/// idle ─▶ uploading ─▶ uploaded ─▶ processing ─▶ completed
///            │            │            │
///            └────────────┴────────────┴──────▶ error
/// ```
///
/// A new submission jumps straight to `uploading` from any state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Idle,
    Uploading,
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl TaskState {
    /// `completed` and `error` end the cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Idle => "idle",
            TaskState::Uploading => "uploading",
            TaskState::Uploaded => "uploaded",
            TaskState::Processing => "processing",
            TaskState::Completed => "completed",
            TaskState::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file the server accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub file_name: String,
    pub mime_category: MimeCategory,
    pub size_bytes: u64,
    /// Name the server stored the file under; the key for `process`.
    pub unique_server_name: String,
}

/// Identifies one server-side processing task, and with it one polling loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
}

/// Paths of a finished conversion, relative to the files-prefix, with `/`
/// separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub processed_file_path: String,
    pub markdown_path: String,
}

impl ResultDescriptor {
    /// Validate the `result` of a `completed` progress response.
    ///
    /// Fails when the result is missing, reports `success: false`, or lacks
    /// either path.
    pub fn from_result(result: Option<&ProcessResult>) -> Result<Self, TaskError> {
        let result = result.ok_or_else(|| TaskError::server(None, MSG_INVALID_RESULT))?;
        if !result.success {
            return Err(TaskError::server(result.error.as_deref(), MSG_INVALID_RESULT));
        }
        let non_blank = |p: &Option<String>| {
            p.as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(normalize_separators)
        };
        match (non_blank(&result.processed_file), non_blank(&result.md_path)) {
            (Some(processed_file_path), Some(markdown_path)) => Ok(Self {
                processed_file_path,
                markdown_path,
            }),
            _ => Err(TaskError::server(result.error.as_deref(), MSG_INVALID_RESULT)),
        }
    }

    /// Absolute URL of the processed file.
    pub fn processed_file_url(&self, config: &ClientConfig) -> String {
        config.file_url(&self.processed_file_path)
    }

    /// Suggested local name when downloading the processed file.
    pub fn download_name(&self) -> &str {
        self.processed_file_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.processed_file_path)
    }
}

/// Lifecycle half of the task state: which phase, and the descriptors the
/// phases produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lifecycle {
    pub state: TaskState,
    pub upload: Option<UploadDescriptor>,
    pub handle: Option<TaskHandle>,
    pub result: Option<ResultDescriptor>,
    pub error: Option<TaskError>,
}

// ── Progress ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

/// Latest progress of the current phase. `percent` is always in `0..=100`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub percent: f64,
    pub message: String,
    pub status: ProgressStatus,
}

impl ProgressSnapshot {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Upload progress from bytes sent.
    pub fn upload(&mut self, sent: u64, total: u64) {
        let percent = if total == 0 {
            100.0
        } else {
            sent.min(total) as f64 * 100.0 / total as f64
        };
        self.percent = self.percent.max(percent);
    }

    /// The whole file reached the server.
    pub fn uploaded(&mut self) {
        self.percent = 100.0;
        self.message = MSG_UPLOADED.to_string();
        self.status = ProgressStatus::Completed;
    }

    /// Apply a server-reported value.
    ///
    /// The percent is clamped to `0..=100` and never moves backwards while
    /// processing; a regressing value is logged and the message still
    /// updates.
    pub fn advance(&mut self, percent: Option<f64>, message: Option<&str>) {
        let reported = percent.unwrap_or(0.0);
        if reported.is_finite() {
            let clamped = reported.clamp(0.0, 100.0);
            if clamped < self.percent {
                debug!(
                    "Server progress went backwards ({:.1} -> {:.1}); keeping {:.1}",
                    self.percent, clamped, self.percent
                );
            } else {
                self.percent = clamped;
            }
        }
        self.message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(MSG_PROCESSING)
            .to_string();
        self.status = ProgressStatus::Processing;
    }

    pub fn complete(&mut self, message: &str) {
        self.percent = 100.0;
        self.message = message.to_string();
        self.status = ProgressStatus::Completed;
    }

    pub fn fail(&mut self) {
        self.percent = 0.0;
        self.status = ProgressStatus::Failed;
    }
}

// ── Combined view ────────────────────────────────────────────────────────

/// Everything an observer needs about the current cycle, published after
/// every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSnapshot {
    pub lifecycle: Lifecycle,
    pub progress: ProgressSnapshot,
}

impl TaskSnapshot {
    pub fn state(&self) -> TaskState {
        self.lifecycle.state
    }
}

/// Structured status for display. Server text only ever ends up in these
/// plain strings, never in markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub state: TaskState,
    pub percent: f64,
    pub summary: String,
    pub lines: Vec<String>,
}

/// Combine lifecycle and progress into a [`StatusView`].
pub fn status_view(snapshot: &TaskSnapshot) -> StatusView {
    let life = &snapshot.lifecycle;
    let progress = &snapshot.progress;
    let file_lines = |upload: &UploadDescriptor| {
        vec![
            format!("File: {}", upload.file_name),
            format!("Size: {}", format_file_size(upload.size_bytes)),
        ]
    };

    let (summary, lines) = match life.state {
        TaskState::Idle => ("Select a PDF or image file".to_string(), Vec::new()),
        TaskState::Uploading => (
            format!("Uploading... {:.0}%", progress.percent),
            Vec::new(),
        ),
        TaskState::Uploaded => (
            MSG_UPLOADED.to_string(),
            life.upload.as_ref().map(file_lines).unwrap_or_default(),
        ),
        TaskState::Processing => {
            let summary = if progress.message.is_empty() {
                MSG_PROCESSING.to_string()
            } else {
                progress.message.clone()
            };
            let lines = life
                .handle
                .iter()
                .map(|h| format!("Task: {}", h.task_id))
                .collect::<Vec<_>>();
            (summary, lines)
        }
        TaskState::Completed => {
            let lines = life
                .result
                .as_ref()
                .map(|r| {
                    vec![
                        format!("Output: {}", r.processed_file_path),
                        format!("Markdown: {}", r.markdown_path),
                    ]
                })
                .unwrap_or_default();
            (MSG_COMPLETE.to_string(), lines)
        }
        TaskState::Error => {
            let summary = life
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| MSG_FAILED.to_string());
            (summary, Vec::new())
        }
    };

    StatusView {
        state: life.state,
        percent: progress.percent,
        summary,
        lines,
    }
}
