//! The file a user selected for conversion, and the checks it must pass
//! before anything is sent to the server.

use crate::error::ValidationError;
use bytes::Bytes;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio_util::io::ReaderStream;

/// Size of the chunks an upload body is streamed in. Progress is reported
/// once per chunk.
pub const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Chunked file contents, ready to be wrapped in a streaming request body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// Which family of endpoints a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeCategory {
    Pdf,
    Image,
}

impl MimeCategory {
    /// Classify a MIME type: anything mentioning `pdf` is a PDF, anything
    /// under `image/` is an image.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let mime = mime_type.to_ascii_lowercase();
        if mime.contains("pdf") {
            Some(MimeCategory::Pdf)
        } else if mime.contains("image/") {
            Some(MimeCategory::Image)
        } else {
            None
        }
    }

    /// Path segment of the endpoints serving this category (`pdf`, `image`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeCategory::Pdf => "pdf",
            MimeCategory::Image => "image",
        }
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// A file picked for upload.
///
/// The contents are not read until the upload streams them, so selecting a
/// file that is too large costs nothing.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    mime_type: String,
    size_bytes: u64,
    source: FileSource,
}

impl SelectedFile {
    /// Wrap an in-memory buffer.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Select a file on disk. The MIME type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self {
            mime_type: guess_mime(path).to_string(),
            name,
            size_bytes: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Stream the contents in [`UPLOAD_CHUNK_BYTES`] chunks.
    pub async fn byte_stream(&self) -> std::io::Result<ByteStream> {
        match &self.source {
            FileSource::Memory(data) => {
                let data = data.clone();
                let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                    .step_by(UPLOAD_CHUNK_BYTES)
                    .map(|start| {
                        let end = (start + UPLOAD_CHUNK_BYTES).min(data.len());
                        Ok(data.slice(start..end))
                    })
                    .collect();
                Ok(Box::pin(stream::iter(chunks)))
            }
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::pin(ReaderStream::with_capacity(file, UPLOAD_CHUNK_BYTES)))
            }
        }
    }
}

/// Check type and size. Returns the category used to route the upload.
pub fn validate_file(file: &SelectedFile, max_bytes: u64) -> Result<MimeCategory, ValidationError> {
    let category =
        MimeCategory::from_mime(file.mime_type()).ok_or_else(|| ValidationError::UnsupportedType {
            mime_type: file.mime_type().to_string(),
        })?;
    if file.size_bytes() > max_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size_bytes(),
            limit: max_bytes,
        });
    }
    Ok(category)
}

/// Guess a MIME type from the file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
