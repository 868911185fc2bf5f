use super::debounce::Debouncer;
use super::engine::RenderPipeline;
use super::paths::rewrite_image_paths;
use crate::client::wire::ServerMessage;
use crate::client::MarkdownSource;
use crate::config::ClientConfig;
use crate::error::LoadError;
use crate::task::normalize_separators;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The document shown in the preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderState {
    /// Server-relative path of the loaded file.
    pub source_path: String,
    /// Markdown as loaded or last edited.
    pub raw_content: String,
    /// Directory of the file on the server; image links resolve against it.
    pub base_dir: String,
    /// `raw_content` with image links rewritten. This is what gets rendered.
    pub display_content: String,
}

/// Rendered HTML, tagged with the render pass that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    pub seq: u64,
    pub html: String,
}

/// Outcome of the most recent load, for the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNotice {
    Loading { path: String },
    Loaded { file_path: String },
    Failed(LoadError),
}

impl std::fmt::Display for LoadNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadNotice::Loading { path } => write!(f, "Loading {path}..."),
            LoadNotice::Loaded { file_path } => write!(f, "Loaded {file_path}"),
            LoadNotice::Failed(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Default)]
struct ViewerState {
    render: RenderState,
    notice: Option<LoadNotice>,
    /// Last path handed to [`MarkdownRenderer::auto_load`].
    auto_loaded: Option<String>,
    load_seq: u64,
}

impl ViewerState {
    fn refresh_display(&mut self, files_prefix: &str) {
        self.render.display_content =
            rewrite_image_paths(&self.render.raw_content, &self.render.base_dir, files_prefix);
    }
}

struct RenderShared {
    state: Mutex<ViewerState>,
    pipeline: RenderPipeline,
    files_prefix: String,
    render_seq: AtomicU64,
    preview: watch::Sender<Preview>,
}

impl RenderShared {
    fn lock(&self) -> MutexGuard<'_, ViewerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render the current display content. The result is published only if
    /// no later pass has published already.
    async fn render_current(&self) {
        let seq = self.render_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let text = self.lock().render.display_content.clone();
        let html = self.pipeline.render(&text).await;
        self.preview.send_if_modified(|preview| {
            if seq > preview.seq {
                preview.seq = seq;
                preview.html = html;
                true
            } else {
                debug!("Discarding render pass {} (already showing {})", seq, preview.seq);
                false
            }
        });
    }
}

/// Loads Markdown from the server, keeps it editable, and renders it to a
/// preview.
///
/// Loads render immediately. Edits render after the configured debounce
/// delay, so a burst of keystrokes costs a single render. Dropping the
/// renderer cancels a pending render.
pub struct MarkdownRenderer {
    source: Arc<dyn MarkdownSource>,
    shared: Arc<RenderShared>,
    debouncer: Debouncer,
}

impl MarkdownRenderer {
    pub fn new(source: Arc<dyn MarkdownSource>, config: &ClientConfig) -> Self {
        Self::with_pipeline(source, config, RenderPipeline::default())
    }

    pub fn with_pipeline(
        source: Arc<dyn MarkdownSource>,
        config: &ClientConfig,
        pipeline: RenderPipeline,
    ) -> Self {
        let (preview, _) = watch::channel(Preview::default());
        Self {
            source,
            shared: Arc::new(RenderShared {
                state: Mutex::new(ViewerState::default()),
                pipeline,
                files_prefix: config.files_prefix().to_string(),
                render_seq: AtomicU64::new(0),
                preview,
            }),
            debouncer: Debouncer::new(config.render_debounce),
        }
    }

    pub fn state(&self) -> RenderState {
        self.shared.lock().render.clone()
    }

    pub fn notice(&self) -> Option<LoadNotice> {
        self.shared.lock().notice.clone()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.shared.lock().notice, Some(LoadNotice::Loading { .. }))
    }

    /// The latest published HTML.
    pub fn preview(&self) -> Preview {
        self.shared.preview.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Preview> {
        self.shared.preview.subscribe()
    }

    /// Fetch the Markdown at `path` and render it.
    ///
    /// Returns the file path the server reports. On failure the previous
    /// document stays in place. If another load starts before this one
    /// finishes, this one yields [`LoadError::Superseded`] and changes
    /// nothing.
    pub async fn load_from_path(&self, path: &str) -> Result<String, LoadError> {
        let path = path.trim();
        if path.is_empty() {
            self.shared.lock().notice = Some(LoadNotice::Failed(LoadError::BlankPath));
            return Err(LoadError::BlankPath);
        }

        let seq = {
            let mut state = self.shared.lock();
            state.load_seq += 1;
            state.notice = Some(LoadNotice::Loading {
                path: path.to_string(),
            });
            state.load_seq
        };
        info!("Loading markdown '{}'", path);

        let outcome = match self.source.fetch_markdown(path).await {
            Err(e) => Err(LoadError::from(e)),
            Ok(response) if !response.success => Err(LoadError::ServerReported {
                message: response.server_message().unwrap_or("unknown error").to_string(),
            }),
            Ok(response) => match response.content {
                Some(content) => Ok((
                    content,
                    response.file_dir.unwrap_or_default(),
                    response.file_path.unwrap_or_else(|| path.to_string()),
                )),
                None => Err(LoadError::MalformedResponse {
                    detail: "response has no content".to_string(),
                }),
            },
        };

        let file_path = {
            let mut state = self.shared.lock();
            if state.load_seq != seq {
                debug!("Load of '{}' superseded", path);
                return Err(LoadError::Superseded);
            }
            match outcome {
                Ok((content, file_dir, file_path)) => {
                    state.render = RenderState {
                        source_path: path.to_string(),
                        raw_content: content,
                        base_dir: normalize_separators(&file_dir),
                        display_content: String::new(),
                    };
                    state.refresh_display(&self.shared.files_prefix);
                    state.notice = Some(LoadNotice::Loaded {
                        file_path: file_path.clone(),
                    });
                    file_path
                }
                Err(e) => {
                    warn!("Loading '{}' failed: {}", path, e);
                    state.notice = Some(LoadNotice::Failed(e.clone()));
                    return Err(e);
                }
            }
        };

        self.render_now().await;
        Ok(file_path)
    }

    /// Load `path` if it is new: not loaded already and not handed to this
    /// method before. Returns `None` when nothing was done.
    pub async fn auto_load(&self, path: &str) -> Option<Result<String, LoadError>> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        {
            let mut state = self.shared.lock();
            if state.auto_loaded.as_deref() == Some(path) || state.render.source_path == path {
                return None;
            }
            state.auto_loaded = Some(path.to_string());
        }
        debug!("Auto-loading '{}'", path);
        Some(self.load_from_path(path).await)
    }

    /// Replace the content (as typed by the user) and schedule a render.
    ///
    /// Must be called within a Tokio runtime.
    pub fn edit(&self, content: impl Into<String>) {
        {
            let mut state = self.shared.lock();
            state.render.raw_content = content.into();
            state.refresh_display(&self.shared.files_prefix);
        }
        self.schedule_render();
    }

    /// Change the directory image links resolve against and schedule a
    /// render.
    ///
    /// Must be called within a Tokio runtime.
    pub fn set_base_dir(&self, base_dir: &str) {
        {
            let mut state = self.shared.lock();
            state.render.base_dir = normalize_separators(base_dir);
            state.refresh_display(&self.shared.files_prefix);
        }
        self.schedule_render();
    }

    /// Render right away, dropping any pending debounced render.
    pub async fn render_now(&self) {
        self.debouncer.cancel();
        self.shared.render_current().await;
    }

    fn schedule_render(&self) {
        let shared = Arc::clone(&self.shared);
        self.debouncer.schedule(async move {
            shared.render_current().await;
        });
    }
}
