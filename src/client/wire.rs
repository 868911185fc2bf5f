//! JSON bodies exchanged with the conversion service.
//!
//! Every response may carry `{ success: false, message | error }`; the
//! fields the service does not always send are `Option`s so a partial body
//! still decodes and the caller decides what is missing.

use serde::{Deserialize, Serialize};

/// `POST {pdf|image}/upload`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub file_info: Option<FileInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub unique_filename: String,
    pub original_filename: Option<String>,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

/// Body of `POST {pdf|image}/process`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest<'a> {
    pub filename: &'a str,
}

/// `POST {pdf|image}/process`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub success: bool,
    pub task_id: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Server-side task status as reported by a progress poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// `GET task/progress/<task_id>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressResponse {
    #[serde(default)]
    pub success: bool,
    pub status: Option<WireStatus>,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub result: Option<ProcessResult>,
}

/// Payload of a `completed` progress response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessResult {
    #[serde(default)]
    pub success: bool,
    pub processed_file: Option<String>,
    pub md_path: Option<String>,
    pub error: Option<String>,
}

/// Body of `POST markdown`.
#[derive(Debug, Clone, Serialize)]
pub struct MarkdownRequest<'a> {
    pub path: &'a str,
}

/// `POST markdown`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkdownResponse {
    #[serde(default)]
    pub success: bool,
    pub content: Option<String>,
    pub file_dir: Option<String>,
    pub file_path: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Generic `{ success, message | error }` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AckResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// `GET health`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub project_root: Option<String>,
}

/// Pick the human-readable part of a failure body.
pub trait ServerMessage {
    fn message_field(&self) -> Option<&str>;
    fn error_field(&self) -> Option<&str>;

    /// `error` wins over `message`: on failure the service puts the reason in
    /// `error` and sometimes a generic `message` alongside.
    fn server_message(&self) -> Option<&str> {
        self.error_field().or(self.message_field())
    }
}

macro_rules! impl_server_message {
    ($($ty:ty),* $(,)?) => {
        $(impl ServerMessage for $ty {
            fn message_field(&self) -> Option<&str> {
                self.message.as_deref()
            }
            fn error_field(&self) -> Option<&str> {
                self.error.as_deref()
            }
        })*
    };
}

impl_server_message!(
    UploadResponse,
    ProcessResponse,
    ProgressResponse,
    MarkdownResponse,
    AckResponse,
);

/// Extract `error` or `message` from an arbitrary JSON error body.
pub fn message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
