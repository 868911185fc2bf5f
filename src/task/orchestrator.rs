use super::poll::PollLoop;
use super::state::{
    status_view, Lifecycle, ProgressSnapshot, ResultDescriptor, StatusView, TaskHandle,
    TaskSnapshot, TaskState, UploadDescriptor, MSG_COMPLETE, MSG_FAILED, MSG_PROGRESS_FAILED,
    MSG_START_FAILED, MSG_UPLOAD_FAILED,
};
use crate::client::wire::{ProgressResponse, ServerMessage, UploadResponse, WireStatus};
use crate::client::{ConversionApi, UploadProgress};
use crate::config::ClientConfig;
use crate::error::TaskError;
use crate::file::{validate_file, MimeCategory, SelectedFile};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one file at a time through upload, processing and polling.
///
/// All methods take `&self`; the orchestrator can be shared behind an `Arc`
/// between a UI task and the code that submits files. Dropping it stops any
/// active polling.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use testsnap::{ClientConfig, HttpApi, SelectedFile, TaskOrchestrator};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::default();
/// let orchestrator = TaskOrchestrator::new(Arc::new(HttpApi::new(&config)?), config);
///
/// let file = SelectedFile::from_path("paper.pdf").await?;
/// orchestrator.submit_file(&file).await?;
/// orchestrator.start_processing().await?;
///
/// let mut updates = orchestrator.subscribe();
/// let done = updates.wait_for(|s| s.state().is_terminal()).await?.clone();
/// println!("{:?}", done.lifecycle.result);
/// # Ok(())
/// # }
/// ```
pub struct TaskOrchestrator {
    api: Arc<dyn ConversionApi>,
    config: ClientConfig,
    shared: Arc<Shared>,
}

impl TaskOrchestrator {
    pub fn new(api: Arc<dyn ConversionApi>, config: ClientConfig) -> Self {
        Self::with_callback(api, config, Arc::new(NoopProgressCallback))
    }

    pub fn with_callback(
        api: Arc<dyn ConversionApi>,
        config: ClientConfig,
        callback: ProgressCallback,
    ) -> Self {
        let (watch, _) = watch::channel(TaskSnapshot::default());
        Self {
            api,
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                callback,
                watch,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.shared.lock().snapshot()
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().lifecycle.state
    }

    /// Current status, reduced for display.
    pub fn status(&self) -> StatusView {
        status_view(&self.snapshot())
    }

    /// Receive a fresh [`TaskSnapshot`] after every change.
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.shared.watch.subscribe()
    }

    /// `true` while a poll loop is alive for the current cycle.
    pub fn is_polling(&self) -> bool {
        self.shared
            .lock()
            .poller
            .as_ref()
            .is_some_and(|p| !p.join.is_finished())
    }

    /// Validate and upload `file`, starting a new cycle.
    ///
    /// A file that fails validation is rejected with
    /// [`TaskError::Validation`] before any request is made, and the current
    /// state is left alone. Otherwise any previous cycle (including its poll
    /// loop) is abandoned and the state moves to `uploading`.
    pub async fn submit_file(&self, file: &SelectedFile) -> Result<UploadDescriptor, TaskError> {
        let category = validate_file(file, self.config.max_upload_bytes)?;

        let generation = self.shared.begin_cycle(|inner, notices| {
            inner.clear();
            inner.transition(TaskState::Uploading, notices);
        });
        info!(
            "Uploading '{}' ({} bytes, {})",
            file.name(),
            file.size_bytes(),
            category.as_str()
        );

        let weak = Arc::downgrade(&self.shared);
        let progress: UploadProgress = Arc::new(move |sent: u64, total: u64| {
            if let Some(shared) = weak.upgrade() {
                shared.apply(generation, |inner, notices| {
                    if inner.lifecycle.state == TaskState::Uploading {
                        inner.progress.upload(sent, total);
                        notices.push(Notice::Upload { sent, total });
                    }
                });
            }
        });

        let outcome = self.api.upload(file, category, progress).await;

        self.shared
            .apply(generation, |inner, notices| {
                let result = match outcome {
                    Ok(response) => accepted_upload(&response, file, category)
                        .ok_or_else(|| TaskError::server(response.server_message(), MSG_UPLOAD_FAILED)),
                    Err(e) => Err(TaskError::from(e)),
                };
                match result {
                    Ok(descriptor) => {
                        info!("Upload accepted as '{}'", descriptor.unique_server_name);
                        inner.lifecycle.upload = Some(descriptor.clone());
                        inner.progress.uploaded();
                        inner.transition(TaskState::Uploaded, notices);
                        Ok(descriptor)
                    }
                    Err(err) => {
                        inner.fail(err.clone(), notices);
                        Err(err)
                    }
                }
            })
            .unwrap_or(Err(TaskError::Superseded))
    }

    /// Ask the server to process the uploaded file and start polling.
    ///
    /// Returns `Ok(None)` without doing anything unless the state is
    /// `uploaded`, so a repeated call while processing is harmless.
    pub async fn start_processing(&self) -> Result<Option<TaskHandle>, TaskError> {
        let (generation, pending) = self.shared.apply_current(|inner, notices| {
            if inner.lifecycle.state != TaskState::Uploaded {
                return None;
            }
            let upload = inner.lifecycle.upload.clone()?;
            inner.progress.reset();
            inner.transition(TaskState::Processing, notices);
            Some(upload)
        });
        let Some(upload) = pending else {
            debug!("start_processing ignored: nothing uploaded or already running");
            return Ok(None);
        };

        let outcome = self
            .api
            .start_processing(&upload.unique_server_name, upload.mime_category)
            .await;

        self.shared
            .apply(generation, |inner, notices| {
                let task_id = match outcome {
                    Ok(response) => response
                        .task_id
                        .as_deref()
                        .map(str::trim)
                        .filter(|id| response.success && !id.is_empty())
                        .map(str::to_string)
                        .ok_or_else(|| TaskError::server(response.server_message(), MSG_START_FAILED)),
                    Err(e) => Err(TaskError::from(e)),
                };
                match task_id {
                    Ok(task_id) => {
                        info!("Processing '{}' as task {}", upload.unique_server_name, task_id);
                        let handle = TaskHandle { task_id };
                        inner.lifecycle.handle = Some(handle.clone());
                        inner.poller = Some(self.spawn_poller(generation, handle.task_id.clone()));
                        Ok(Some(handle))
                    }
                    Err(err) => {
                        inner.fail(err.clone(), notices);
                        Err(err)
                    }
                }
            })
            .unwrap_or(Err(TaskError::Superseded))
    }

    /// Back to `idle`: descriptors cleared, polling and its timeout stopped.
    pub fn reset(&self) {
        self.shared.begin_cycle(|inner, notices| {
            inner.clear();
            inner.transition(TaskState::Idle, notices);
        });
        debug!("Task orchestrator reset");
    }

    fn spawn_poller(&self, generation: u64, task_id: String) -> Poller {
        let cancel = CancellationToken::new();
        let poll = PollLoop {
            shared: Arc::clone(&self.shared),
            api: Arc::clone(&self.api),
            generation,
            task_id,
            interval: self.config.poll_interval(),
            timeout: self.config.processing_timeout,
            cancel: cancel.clone(),
        };
        Poller {
            cancel,
            join: tokio::spawn(poll.run()),
        }
    }
}

impl Drop for TaskOrchestrator {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.stop_polling();
    }
}

fn accepted_upload(
    response: &UploadResponse,
    file: &SelectedFile,
    category: MimeCategory,
) -> Option<UploadDescriptor> {
    if !response.success {
        return None;
    }
    let info = response.file_info.as_ref()?;
    let unique = info.unique_filename.trim();
    if unique.is_empty() {
        return None;
    }
    Some(UploadDescriptor {
        file_name: file.name().to_string(),
        mime_category: category,
        size_bytes: info.file_size.unwrap_or(file.size_bytes()),
        unique_server_name: unique.to_string(),
    })
}

// ── Shared state ─────────────────────────────────────────────────────────

/// Event queued while the lock is held and delivered after it is released.
pub(super) enum Notice {
    State { from: TaskState, to: TaskState },
    Upload { sent: u64, total: u64 },
    Progress(ProgressSnapshot),
    Completed(ResultDescriptor),
    Error(TaskError),
}

pub(super) struct Poller {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TickOutcome {
    Continue,
    Stop,
}

#[derive(Default)]
pub(super) struct Inner {
    generation: u64,
    lifecycle: Lifecycle,
    progress: ProgressSnapshot,
    poller: Option<Poller>,
}

impl Inner {
    fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            lifecycle: self.lifecycle.clone(),
            progress: self.progress.clone(),
        }
    }

    /// Drop descriptors and progress, keeping the state.
    fn clear(&mut self) {
        self.lifecycle = Lifecycle {
            state: self.lifecycle.state,
            ..Lifecycle::default()
        };
        self.progress.reset();
    }

    fn transition(&mut self, to: TaskState, notices: &mut Vec<Notice>) {
        let from = self.lifecycle.state;
        if from != to {
            debug!("Task state {} -> {}", from, to);
            self.lifecycle.state = to;
            notices.push(Notice::State { from, to });
        }
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
        }
    }

    /// End the cycle in `error`. Any result is cleared with it so nothing
    /// stale is shown next to the failure.
    pub(super) fn fail(&mut self, error: TaskError, notices: &mut Vec<Notice>) {
        warn!("Task cycle failed: {}", error);
        self.stop_polling();
        if self.lifecycle.state == TaskState::Uploading {
            self.lifecycle.upload = None;
        }
        self.lifecycle.handle = None;
        self.lifecycle.result = None;
        self.lifecycle.error = Some(error.clone());
        self.progress.fail();
        self.transition(TaskState::Error, notices);
        notices.push(Notice::Error(error));
    }

    /// Apply one successfully decoded progress response.
    pub(super) fn apply_tick(
        &mut self,
        response: ProgressResponse,
        notices: &mut Vec<Notice>,
    ) -> TickOutcome {
        if self.lifecycle.state != TaskState::Processing {
            return TickOutcome::Stop;
        }
        if !response.success {
            self.fail(
                TaskError::server(response.server_message(), MSG_PROGRESS_FAILED),
                notices,
            );
            return TickOutcome::Stop;
        }

        match response.status {
            Some(WireStatus::Completed) => {
                self.stop_polling();
                match ResultDescriptor::from_result(response.result.as_ref()) {
                    Ok(result) => {
                        info!("Task finished: {}", result.markdown_path);
                        self.lifecycle.handle = None;
                        self.lifecycle.result = Some(result.clone());
                        self.progress.complete(MSG_COMPLETE);
                        self.transition(TaskState::Completed, notices);
                        notices.push(Notice::Completed(result));
                    }
                    Err(err) => self.fail(err, notices),
                }
                TickOutcome::Stop
            }
            Some(WireStatus::Failed) => {
                // Failed tasks report their reason in `message`.
                let reason = response.message.as_deref().or(response.error.as_deref());
                self.fail(TaskError::server(reason, MSG_FAILED), notices);
                TickOutcome::Stop
            }
            _ => {
                self.progress
                    .advance(response.progress, response.message.as_deref());
                notices.push(Notice::Progress(self.progress.clone()));
                TickOutcome::Continue
            }
        }
    }
}

pub(super) struct Shared {
    inner: Mutex<Inner>,
    callback: ProgressCallback,
    watch: watch::Sender<TaskSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` only if `generation` is still current. Returns `None` when
    /// the cycle was superseded, in which case nothing is changed.
    pub(super) fn apply<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut Inner, &mut Vec<Notice>) -> R,
    ) -> Option<R> {
        let mut notices = Vec::new();
        let out = {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!(
                    "Dropping update for superseded cycle {} (current {})",
                    generation, inner.generation
                );
                return None;
            }
            let out = f(&mut inner, &mut notices);
            self.watch.send_replace(inner.snapshot());
            out
        };
        self.dispatch(notices);
        Some(out)
    }

    /// Run `f` against the current cycle and report which one that was.
    fn apply_current<R>(&self, f: impl FnOnce(&mut Inner, &mut Vec<Notice>) -> R) -> (u64, R) {
        let mut notices = Vec::new();
        let out = {
            let mut inner = self.lock();
            let out = f(&mut inner, &mut notices);
            self.watch.send_replace(inner.snapshot());
            (inner.generation, out)
        };
        self.dispatch(notices);
        out
    }

    /// Open a new cycle: bump the generation and stop the old poll loop in
    /// the same critical section, then run `f` against the fresh cycle.
    fn begin_cycle(&self, f: impl FnOnce(&mut Inner, &mut Vec<Notice>)) -> u64 {
        let (generation, ()) = self.apply_current(|inner, notices| {
            inner.generation = inner.generation.wrapping_add(1);
            inner.stop_polling();
            f(inner, notices);
        });
        generation
    }

    fn dispatch(&self, notices: Vec<Notice>) {
        let cb = &self.callback;
        for notice in notices {
            match notice {
                Notice::State { from, to } => cb.on_state_change(from, to),
                Notice::Upload { sent, total } => cb.on_upload_progress(sent, total),
                Notice::Progress(snapshot) => cb.on_progress(&snapshot),
                Notice::Completed(result) => cb.on_completed(&result),
                Notice::Error(error) => cb.on_error(&error),
            }
        }
    }
}
