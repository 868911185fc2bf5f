//! Task-cycle tests for `TaskOrchestrator` against a scripted in-memory
//! service.
//!
//! Every test runs on a paused Tokio clock, so polling intervals and the
//! processing deadline elapse instantly and deterministically.
//!
//! Run with:
//!   cargo test --test orchestrator

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testsnap::client::wire::{
    FileInfo, ProcessResponse, ProcessResult, ProgressResponse, UploadResponse, WireStatus,
};
use testsnap::{
    ClientConfig, ConversionApi, MimeCategory, ProgressSnapshot, ResultDescriptor, SelectedFile,
    TaskError, TaskOrchestrator, TaskProgressCallback, TaskSnapshot, TaskState, TransportError,
    UploadProgress, ValidationError,
};

// ── Scripted service ─────────────────────────────────────────────────────────

/// Replays queued responses in order. An empty progress queue keeps
/// answering `processing` so the loop runs until something else stops it.
#[derive(Default)]
struct ScriptedApi {
    uploads: Mutex<VecDeque<Result<UploadResponse, TransportError>>>,
    starts: Mutex<VecDeque<Result<ProcessResponse, TransportError>>>,
    ticks: Mutex<VecDeque<Result<ProgressResponse, TransportError>>>,
    upload_delay: Duration,
    start_delay: Duration,
    poll_delay: Duration,
    upload_calls: AtomicUsize,
    start_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedApi {
    fn with_upload_delay(delay: Duration) -> Self {
        Self {
            upload_delay: delay,
            ..Self::default()
        }
    }

    fn with_start_delay(delay: Duration) -> Self {
        Self {
            start_delay: delay,
            ..Self::default()
        }
    }

    fn with_poll_delay(delay: Duration) -> Self {
        Self {
            poll_delay: delay,
            ..Self::default()
        }
    }

    fn push_upload(&self, r: Result<UploadResponse, TransportError>) -> &Self {
        self.uploads.lock().unwrap().push_back(r);
        self
    }

    fn push_start(&self, r: Result<ProcessResponse, TransportError>) -> &Self {
        self.starts.lock().unwrap().push_back(r);
        self
    }

    fn push_tick(&self, r: Result<ProgressResponse, TransportError>) -> &Self {
        self.ticks.lock().unwrap().push_back(r);
        self
    }

    fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionApi for ScriptedApi {
    async fn upload(
        &self,
        file: &SelectedFile,
        _category: MimeCategory,
        progress: UploadProgress,
    ) -> Result<UploadResponse, TransportError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let total = file.size_bytes();
        progress(total / 2, total);
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        progress(total, total);
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(accepted("default_upload.pdf")))
    }

    async fn start_processing(
        &self,
        _unique_filename: &str,
        _category: MimeCategory,
    ) -> Result<ProcessResponse, TransportError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        self.starts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(started("task-default")))
    }

    async fn poll_progress(&self, _task_id: &str) -> Result<ProgressResponse, TransportError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        self.ticks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(processing(None, None)))
    }
}

// ── Response builders ────────────────────────────────────────────────────────

fn accepted(unique: &str) -> UploadResponse {
    UploadResponse {
        success: true,
        message: Some("File uploaded".into()),
        error: None,
        file_info: Some(FileInfo {
            unique_filename: unique.into(),
            original_filename: None,
            file_size: None,
            file_path: None,
        }),
    }
}

fn started(task_id: &str) -> ProcessResponse {
    ProcessResponse {
        success: true,
        task_id: Some(task_id.into()),
        ..ProcessResponse::default()
    }
}

fn processing(progress: Option<f64>, message: Option<&str>) -> ProgressResponse {
    ProgressResponse {
        success: true,
        status: Some(WireStatus::Processing),
        progress,
        message: message.map(str::to_string),
        ..ProgressResponse::default()
    }
}

fn completed(processed: &str, md: &str) -> ProgressResponse {
    ProgressResponse {
        success: true,
        status: Some(WireStatus::Completed),
        progress: Some(100.0),
        result: Some(ProcessResult {
            success: true,
            processed_file: Some(processed.into()),
            md_path: Some(md.into()),
            error: None,
        }),
        ..ProgressResponse::default()
    }
}

fn pdf() -> SelectedFile {
    SelectedFile::from_bytes("paper.pdf", "application/pdf", vec![7u8; 4096])
}

fn config() -> ClientConfig {
    ClientConfig::builder()
        .poll_interval(Duration::from_secs(1))
        .processing_timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}

async fn wait_terminal(orchestrator: &TaskOrchestrator) -> TaskSnapshot {
    let mut rx = orchestrator.subscribe();
    let snap = rx
        .wait_for(|s| s.state().is_terminal())
        .await
        .unwrap()
        .clone();
    snap
}

// ── Recording callback ───────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, e: String) {
        self.events.lock().unwrap().push(e);
    }
}

impl TaskProgressCallback for Recorder {
    fn on_state_change(&self, from: TaskState, to: TaskState) {
        self.push(format!("state:{from}->{to}"));
    }
    fn on_upload_progress(&self, sent: u64, total: u64) {
        self.push(format!("upload:{sent}/{total}"));
    }
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.push(format!("progress:{:.0}", snapshot.percent));
    }
    fn on_completed(&self, result: &ResultDescriptor) {
        self.push(format!("completed:{}", result.markdown_path));
    }
    fn on_error(&self, error: &TaskError) {
        self.push(format!("error:{error}"));
    }
}

// ── Submission ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn submit_moves_to_uploaded() {
    let api = Arc::new(ScriptedApi::default());
    api.push_upload(Ok(accepted("1700000000_paper.pdf")));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    let upload = orchestrator.submit_file(&pdf()).await.unwrap();

    assert_eq!(upload.unique_server_name, "1700000000_paper.pdf");
    assert_eq!(upload.file_name, "paper.pdf");
    assert_eq!(upload.mime_category, MimeCategory::Pdf);
    assert_eq!(upload.size_bytes, 4096);

    let snap = orchestrator.snapshot();
    assert_eq!(snap.state(), TaskState::Uploaded);
    assert_eq!(snap.lifecycle.upload, Some(upload));
    assert_eq!(snap.progress.percent, 100.0);
    assert_eq!(orchestrator.status().summary, "Upload complete");
}

#[tokio::test(start_paused = true)]
async fn rejected_upload_ends_in_error_without_descriptor() {
    let api = Arc::new(ScriptedApi::default());
    api.push_upload(Ok(UploadResponse {
        success: false,
        error: Some("only PDF files are accepted".into()),
        ..UploadResponse::default()
    }));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    let err = orchestrator.submit_file(&pdf()).await.unwrap_err();

    assert_eq!(
        err,
        TaskError::ServerReported {
            message: "only PDF files are accepted".into()
        }
    );
    let snap = orchestrator.snapshot();
    assert_eq!(snap.state(), TaskState::Error);
    assert!(snap.lifecycle.upload.is_none());
    assert_eq!(snap.lifecycle.error, Some(err));
    assert_eq!(snap.progress.percent, 0.0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_upload_is_fatal() {
    let api = Arc::new(ScriptedApi::default());
    api.push_upload(Err(TransportError::Unreachable {
        detail: "connection refused".into(),
    }));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    let err = orchestrator.submit_file(&pdf()).await.unwrap_err();

    assert!(matches!(err, TaskError::Transport(TransportError::Unreachable { .. })));
    assert_eq!(orchestrator.state(), TaskState::Error);
}

#[tokio::test(start_paused = true)]
async fn invalid_file_makes_no_request_and_keeps_state() {
    let api = Arc::new(ScriptedApi::default());
    let orchestrator = TaskOrchestrator::new(
        api.clone(),
        ClientConfig::builder().max_upload_bytes(1024).build().unwrap(),
    );

    let text = SelectedFile::from_bytes("notes.txt", "text/plain", "hello");
    let err = orchestrator.submit_file(&text).await.unwrap_err();
    assert!(matches!(
        err,
        TaskError::Validation(ValidationError::UnsupportedType { .. })
    ));

    let err = orchestrator.submit_file(&pdf()).await.unwrap_err();
    assert_eq!(
        err,
        TaskError::Validation(ValidationError::TooLarge {
            size: 4096,
            limit: 1024
        })
    );

    assert_eq!(api.upload_calls.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.state(), TaskState::Idle);
    assert!(orchestrator.snapshot().lifecycle.error.is_none());
}

// ── Processing ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn processing_ticks_then_completes_once() {
    let api = Arc::new(ScriptedApi::default());
    api.push_start(Ok(started("task-42")))
        .push_tick(Ok(processing(Some(10.0), Some("Reading layout"))))
        .push_tick(Ok(processing(Some(50.0), Some("Running OCR"))))
        .push_tick(Ok(completed(
            "output\\paper\\paper_layout.pdf",
            "output\\paper\\paper.md",
        )));
    let recorder = Arc::new(Recorder::default());
    let orchestrator = TaskOrchestrator::with_callback(api.clone(), config(), recorder.clone());

    orchestrator.submit_file(&pdf()).await.unwrap();
    let handle = orchestrator.start_processing().await.unwrap().unwrap();
    assert_eq!(handle.task_id, "task-42");
    assert_eq!(orchestrator.state(), TaskState::Processing);

    let snap = wait_terminal(&orchestrator).await;
    assert_eq!(snap.state(), TaskState::Completed);
    let result = snap.lifecycle.result.unwrap();
    assert_eq!(result.processed_file_path, "output/paper/paper_layout.pdf");
    assert_eq!(result.markdown_path, "output/paper/paper.md");
    assert_eq!(result.download_name(), "paper_layout.pdf");
    assert_eq!(snap.progress.percent, 100.0);
    assert!(snap.lifecycle.handle.is_none());
    assert_eq!(api.polls(), 3);

    // No tick after the terminal one.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.polls(), 3);
    assert!(!orchestrator.is_polling());

    let events = recorder.events();
    let completions = events.iter().filter(|e| e.starts_with("completed:")).count();
    assert_eq!(completions, 1);
    assert!(events.contains(&"progress:10".to_string()));
    assert!(events.contains(&"progress:50".to_string()));
}

#[tokio::test(start_paused = true)]
async fn second_start_is_a_no_op() {
    let api = Arc::new(ScriptedApi::default());
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    assert_eq!(orchestrator.start_processing().await.unwrap(), None);
    assert_eq!(orchestrator.state(), TaskState::Idle);

    orchestrator.submit_file(&pdf()).await.unwrap();
    assert!(orchestrator.start_processing().await.unwrap().is_some());
    assert_eq!(orchestrator.start_processing().await.unwrap(), None);

    assert_eq!(api.start_calls.load(Ordering::SeqCst), 1);
    assert!(orchestrator.is_polling());
    orchestrator.reset();
}

#[tokio::test(start_paused = true)]
async fn start_failure_keeps_upload() {
    let api = Arc::new(ScriptedApi::default());
    api.push_start(Ok(ProcessResponse {
        success: false,
        ..ProcessResponse::default()
    }));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    let err = orchestrator.start_processing().await.unwrap_err();

    assert_eq!(
        err,
        TaskError::ServerReported {
            message: "Failed to start processing".into()
        }
    );
    let snap = orchestrator.snapshot();
    assert_eq!(snap.state(), TaskState::Error);
    assert!(snap.lifecycle.upload.is_some());
    assert!(!orchestrator.is_polling());
    assert_eq!(api.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_task_id_is_a_start_failure() {
    let api = Arc::new(ScriptedApi::default());
    api.push_start(Ok(ProcessResponse {
        success: true,
        task_id: Some("   ".into()),
        ..ProcessResponse::default()
    }));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    assert!(orchestrator.start_processing().await.is_err());
    assert_eq!(orchestrator.state(), TaskState::Error);
}

#[tokio::test(start_paused = true)]
async fn timeout_ends_cycle_and_stops_polling() {
    let api = Arc::new(ScriptedApi::default());
    let config = ClientConfig::builder()
        .poll_interval(Duration::from_secs(1))
        .processing_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let recorder = Arc::new(Recorder::default());
    let orchestrator = TaskOrchestrator::with_callback(api.clone(), config, recorder.clone());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();

    let snap = wait_terminal(&orchestrator).await;
    assert_eq!(snap.state(), TaskState::Error);
    assert_eq!(snap.lifecycle.error, Some(TaskError::Timeout { secs: 5 }));
    assert_eq!(snap.progress.percent, 0.0);

    let polls = api.polls();
    assert!((1..=5).contains(&polls), "polled {polls} times");
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.polls(), polls);
    assert!(!orchestrator.is_polling());

    let errors = recorder
        .events()
        .into_iter()
        .filter(|e| e.starts_with("error:"))
        .collect::<Vec<_>>();
    assert_eq!(errors, vec!["error:Processing timed out after 5s".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unsuccessful_tick_is_fatal() {
    let api = Arc::new(ScriptedApi::default());
    api.push_tick(Ok(processing(Some(20.0), None)))
        .push_tick(Ok(ProgressResponse {
            success: false,
            error: Some("Task not found".into()),
            ..ProgressResponse::default()
        }));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();

    let snap = wait_terminal(&orchestrator).await;
    assert_eq!(
        snap.lifecycle.error,
        Some(TaskError::ServerReported {
            message: "Task not found".into()
        })
    );
    assert_eq!(api.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_error_on_tick_keeps_polling() {
    let api = Arc::new(ScriptedApi::default());
    api.push_tick(Err(TransportError::Malformed {
        detail: "expected value at line 1 column 1".into(),
    }))
    .push_tick(Err(TransportError::Unreachable {
        detail: "connection reset".into(),
    }))
    .push_tick(Ok(processing(Some(30.0), None)))
    .push_tick(Ok(completed("out/a.pdf", "out/a.md")));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();

    let snap = wait_terminal(&orchestrator).await;
    assert_eq!(snap.state(), TaskState::Completed);
    assert_eq!(api.polls(), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_status_reports_server_message() {
    let api = Arc::new(ScriptedApi::default());
    api.push_tick(Ok(ProgressResponse {
        success: true,
        status: Some(WireStatus::Failed),
        message: Some("OCR backend crashed".into()),
        ..ProgressResponse::default()
    }));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();

    let snap = wait_terminal(&orchestrator).await;
    assert_eq!(
        snap.lifecycle.error,
        Some(TaskError::ServerReported {
            message: "OCR backend crashed".into()
        })
    );
    assert!(snap.lifecycle.result.is_none());
    assert_eq!(orchestrator.status().summary, "OCR backend crashed");
}

#[tokio::test(start_paused = true)]
async fn completed_without_paths_is_an_error() {
    let api = Arc::new(ScriptedApi::default());
    api.push_tick(Ok(completed("out/a.pdf", "  ")));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();

    let snap = wait_terminal(&orchestrator).await;
    assert_eq!(snap.state(), TaskState::Error);
    assert_eq!(
        snap.lifecycle.error,
        Some(TaskError::ServerReported {
            message: "Invalid processing result".into()
        })
    );
    assert!(!orchestrator.is_polling());
}

#[tokio::test(start_paused = true)]
async fn progress_never_moves_backwards() {
    let api = Arc::new(ScriptedApi::default());
    api.push_tick(Ok(processing(Some(40.0), None)))
        .push_tick(Ok(processing(Some(20.0), Some("Retrying page 3"))))
        .push_tick(Ok(processing(Some(250.0), None)))
        .push_tick(Ok(completed("out/a.pdf", "out/a.md")));
    let recorder = Arc::new(Recorder::default());
    let orchestrator = TaskOrchestrator::with_callback(api.clone(), config(), recorder.clone());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();
    wait_terminal(&orchestrator).await;

    let percents = recorder
        .events()
        .into_iter()
        .filter(|e| e.starts_with("progress:"))
        .collect::<Vec<_>>();
    assert_eq!(percents, vec!["progress:40", "progress:40", "progress:100"]);
}

// ── Cancellation and supersession ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reset_discards_in_flight_upload() {
    let api = Arc::new(ScriptedApi::with_upload_delay(Duration::from_secs(2)));
    let orchestrator = Arc::new(TaskOrchestrator::new(api.clone(), config()));

    let submit = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_file(&pdf()).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(orchestrator.state(), TaskState::Uploading);

    orchestrator.reset();
    assert_eq!(orchestrator.state(), TaskState::Idle);

    assert_eq!(submit.await.unwrap(), Err(TaskError::Superseded));
    let snap = orchestrator.snapshot();
    assert_eq!(snap.state(), TaskState::Idle);
    assert!(snap.lifecycle.upload.is_none());
    assert_eq!(snap.progress.percent, 0.0);
}

#[tokio::test(start_paused = true)]
async fn reset_discards_pending_start_reply() {
    let api = Arc::new(ScriptedApi::with_start_delay(Duration::from_secs(1)));
    let orchestrator = Arc::new(TaskOrchestrator::new(api.clone(), config()));
    orchestrator.submit_file(&pdf()).await.unwrap();

    let start = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_processing().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(orchestrator.state(), TaskState::Processing);

    orchestrator.reset();

    assert_eq!(start.await.unwrap(), Err(TaskError::Superseded));
    assert_eq!(orchestrator.snapshot(), TaskSnapshot::default());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.polls(), 0);
    assert!(!orchestrator.is_polling());
    assert_eq!(orchestrator.snapshot(), TaskSnapshot::default());
}

#[tokio::test(start_paused = true)]
async fn reset_discards_pending_completion() {
    let api = Arc::new(ScriptedApi::with_poll_delay(Duration::from_millis(500)));
    api.push_tick(Ok(completed("output/p/p_layout.pdf", "output/p/p.md")));
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(api.polls(), 1);
    assert_eq!(orchestrator.state(), TaskState::Processing);

    orchestrator.reset();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!orchestrator.is_polling());
    let snap = orchestrator.snapshot();
    assert_eq!(snap, TaskSnapshot::default());
    assert!(snap.lifecycle.result.is_none());
}

#[tokio::test(start_paused = true)]
async fn reset_stops_polling() {
    let api = Arc::new(ScriptedApi::default());
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(api.polls(), 2);

    orchestrator.reset();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(api.polls(), 2);
    assert!(!orchestrator.is_polling());
    let snap = orchestrator.snapshot();
    assert_eq!(snap, TaskSnapshot::default());
}

#[tokio::test(start_paused = true)]
async fn resubmit_abandons_old_cycle() {
    let api = Arc::new(ScriptedApi::default());
    api.push_upload(Ok(accepted("first.pdf")))
        .push_upload(Ok(accepted("second.pdf")));
    let recorder = Arc::new(Recorder::default());
    let orchestrator = TaskOrchestrator::with_callback(api.clone(), config(), recorder.clone());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let polls = api.polls();
    assert!(polls > 0);

    let upload = orchestrator.submit_file(&pdf()).await.unwrap();
    assert_eq!(upload.unique_server_name, "second.pdf");
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(api.polls(), polls);
    assert!(!orchestrator.is_polling());
    let snap = orchestrator.snapshot();
    assert_eq!(snap.state(), TaskState::Uploaded);
    assert!(snap.lifecycle.handle.is_none());
    assert!(recorder
        .events()
        .contains(&"state:processing->uploading".to_string()));
}

#[tokio::test(start_paused = true)]
async fn dropping_orchestrator_stops_polling() {
    let api = Arc::new(ScriptedApi::default());
    let orchestrator = TaskOrchestrator::new(api.clone(), config());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    drop(orchestrator);

    let polls = api.polls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.polls(), polls);
}

// ── Callback ordering ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn callback_sees_cycle_in_order() {
    let api = Arc::new(ScriptedApi::default());
    api.push_tick(Ok(processing(Some(60.0), None)))
        .push_tick(Ok(completed("out/a.pdf", "out/a.md")));
    let recorder = Arc::new(Recorder::default());
    let orchestrator = TaskOrchestrator::with_callback(api.clone(), config(), recorder.clone());

    orchestrator.submit_file(&pdf()).await.unwrap();
    orchestrator.start_processing().await.unwrap();
    wait_terminal(&orchestrator).await;

    assert_eq!(
        recorder.events(),
        vec![
            "state:idle->uploading",
            "upload:2048/4096",
            "upload:4096/4096",
            "state:uploading->uploaded",
            "state:uploaded->processing",
            "progress:60",
            "state:processing->completed",
            "completed:out/a.md",
        ]
    );
}
