//! The upload → process → poll state machine.
//!
//! ## Cycle
//!
//! ```text
//! submit_file ──▶ validate ──▶ upload (byte progress) ──▶ uploaded
//!                                                            │
//! start_processing ──▶ process request ──▶ task_id ──▶ poll loop ──▶ completed | error
//! ```
//!
//! Every cycle gets a new generation number. The poll loop, its timeout and
//! every in-flight request carry the generation they were started under, and
//! their results are dropped once the orchestrator has moved on to a newer
//! one.

mod orchestrator;
mod poll;
pub mod state;

pub use orchestrator::TaskOrchestrator;
pub use state::{
    status_view, Lifecycle, ProgressSnapshot, ProgressStatus, ResultDescriptor, StatusView,
    TaskHandle, TaskSnapshot, TaskState, UploadDescriptor,
};

/// Replace `\` separators (the server may run on Windows) with `/`.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
