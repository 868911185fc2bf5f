//! The progress poll loop of one task cycle.
//!
//! One loop per [`super::TaskHandle`]. Ticks are sequential: the next poll is
//! scheduled only after the previous response was applied, so a terminal
//! response always lands before any later tick could fire. The loop exits on
//! the first of:
//!
//! * a terminal response (`completed`, `failed`, `success: false`),
//! * the processing deadline,
//! * cancellation by a newer cycle, a reset, or the orchestrator being dropped.

use super::orchestrator::{Shared, TickOutcome};
use crate::client::ConversionApi;
use crate::error::TaskError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(super) struct PollLoop {
    pub(super) shared: Arc<Shared>,
    pub(super) api: Arc<dyn ConversionApi>,
    pub(super) generation: u64,
    pub(super) task_id: String,
    pub(super) interval: Duration,
    pub(super) timeout: Duration,
    pub(super) cancel: CancellationToken,
}

impl PollLoop {
    pub(super) async fn run(self) {
        let deadline = time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(
            "Polling task {} every {:?} (deadline {:?})",
            self.task_id, self.interval, self.timeout
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = &mut deadline => {
                    self.expire();
                    break;
                }
                _ = ticker.tick() => {}
            }

            // The request itself is raced too: a reply that arrives after
            // cancellation or the deadline is never looked at.
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = &mut deadline => {
                    self.expire();
                    break;
                }
                r = self.api.poll_progress(&self.task_id) => r,
            };

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    warn!("Progress poll for task {} failed, retrying: {}", self.task_id, e);
                    continue;
                }
            };

            let outcome = self
                .shared
                .apply(self.generation, |inner, notices| inner.apply_tick(response, notices));
            if outcome != Some(TickOutcome::Continue) {
                break;
            }
        }
        debug!("Stopped polling task {}", self.task_id);
    }

    fn expire(&self) {
        let secs = self.timeout.as_secs();
        self.shared.apply(self.generation, |inner, notices| {
            warn!("Task {} did not finish within {}s", self.task_id, secs);
            inner.fail(TaskError::Timeout { secs }, notices);
        });
    }
}
