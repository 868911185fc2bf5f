//! Observer trait for task-cycle events.
//!
//! Inject an [`Arc<dyn TaskProgressCallback>`] via
//! [`crate::task::TaskOrchestrator::with_callback`] to receive events as a
//! file moves through upload, processing and completion.
//!
//! Callbacks run after the orchestrator has released its internal lock, in
//! the order the changes were applied. A callback may call back into the
//! orchestrator (for example to read a snapshot).
//!
//! # Example
//!
//! ```rust
//! use testsnap::{TaskProgressCallback, TaskState};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     transitions: Arc<AtomicUsize>,
//! }
//!
//! impl TaskProgressCallback for CountingCallback {
//!     fn on_state_change(&self, from: TaskState, to: TaskState) {
//!         self.transitions.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{from} -> {to}");
//!     }
//! }
//!
//! let cb: Arc<dyn TaskProgressCallback> = Arc::new(CountingCallback {
//!     transitions: Arc::new(AtomicUsize::new(0)),
//! });
//! cb.on_state_change(TaskState::Idle, TaskState::Uploading);
//! ```

use crate::error::TaskError;
use crate::task::{ProgressSnapshot, ResultDescriptor, TaskState};
use std::sync::Arc;

/// Called by the orchestrator as the current cycle advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events from a superseded cycle are never delivered.
pub trait TaskProgressCallback: Send + Sync {
    /// The lifecycle state changed.
    fn on_state_change(&self, from: TaskState, to: TaskState) {
        let _ = (from, to);
    }

    /// Upload bytes left the client.
    ///
    /// # Arguments
    /// * `sent`: bytes sent so far
    /// * `total`: size of the file
    fn on_upload_progress(&self, sent: u64, total: u64) {
        let _ = (sent, total);
    }

    /// A progress tick was applied while processing.
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }

    /// Processing finished and the result is available.
    fn on_completed(&self, result: &ResultDescriptor) {
        let _ = result;
    }

    /// The cycle ended in the `error` state.
    fn on_error(&self, error: &TaskError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl TaskProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored by the orchestrator.
pub type ProgressCallback = Arc<dyn TaskProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        transitions: Mutex<Vec<(TaskState, TaskState)>>,
        upload_events: AtomicUsize,
        errors: AtomicUsize,
    }

    impl TaskProgressCallback for TrackingCallback {
        fn on_state_change(&self, from: TaskState, to: TaskState) {
            self.transitions.lock().unwrap().push((from, to));
        }

        fn on_upload_progress(&self, _sent: u64, _total: u64) {
            self.upload_events.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _error: &TaskError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_state_change(TaskState::Idle, TaskState::Uploading);
        cb.on_upload_progress(10, 100);
        cb.on_progress(&ProgressSnapshot::default());
        cb.on_completed(&ResultDescriptor {
            processed_file_path: "a.pdf".into(),
            markdown_path: "a.md".into(),
        });
        cb.on_error(&TaskError::Superseded);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_state_change(TaskState::Idle, TaskState::Uploading);
        tracker.on_upload_progress(1, 2);
        tracker.on_upload_progress(2, 2);
        tracker.on_state_change(TaskState::Uploading, TaskState::Error);
        tracker.on_error(&TaskError::Timeout { secs: 300 });

        assert_eq!(
            *tracker.transitions.lock().unwrap(),
            vec![
                (TaskState::Idle, TaskState::Uploading),
                (TaskState::Uploading, TaskState::Error)
            ]
        );
        assert_eq!(tracker.upload_events.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_state_change(TaskState::Uploaded, TaskState::Processing);
        cb.on_progress(&ProgressSnapshot::default());
    }
}
