//! Run orchestrator: validates a plan, submits it once, classifies the
//! response, and settles back to idle after a delay.
//!
//! ```text
//! idle       -> submitting   (plan validated, request sent)
//! submitting -> idle         (success, after the success settle delay)
//! submitting -> failed       (transport error, non-2xx, or failure text)
//! failed     -> idle         (after the failure settle delay)
//! ```
//!
//! A plan that fails local validation never leaves `idle`. At most one
//! submission is in flight; a submit while not idle reports `Busy`.

pub mod classify;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{ExecutionBackend, SubmissionError};
use crate::plan::{PlanStore, assemble};

pub use classify::{FAILURE_INDICATORS, looks_like_failure};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Submitting,
    Failed,
}

impl RunStatus {
    /// Check whether `from -> to` is an edge of the run state graph.
    pub fn is_valid_transition(from: RunStatus, to: RunStatus) -> bool {
        matches!(
            (from, to),
            (RunStatus::Idle, RunStatus::Submitting)
                | (RunStatus::Submitting, RunStatus::Idle)
                | (RunStatus::Submitting, RunStatus::Failed)
                | (RunStatus::Failed, RunStatus::Idle)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Config and outcomes
// ---------------------------------------------------------------------------

/// Settle delays applied before returning to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub success_settle: Duration,
    pub failure_settle: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            success_settle: Duration::from_millis(2500),
            failure_settle: Duration::from_millis(5000),
        }
    }
}

/// Record of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub attempt_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Response text from the backend.
    pub output: String,
}

/// Result of [`RunOrchestrator::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Local validation failed; nothing was sent.
    Rejected { issues: Vec<String> },
    /// A previous submission has not settled yet.
    Busy { status: RunStatus },
    Succeeded(RunReport),
    Failed {
        attempt_id: Uuid,
        error: SubmissionError,
    },
    /// The orchestrator was shut down before the backend answered.
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct RunState {
    status: RunStatus,
    last_output: Option<String>,
}

impl RunState {
    fn transition(&mut self, to: RunStatus) -> bool {
        if !RunStatus::is_valid_transition(self.status, to) {
            tracing::warn!(from = %self.status, to = %to, "ignoring invalid run transition");
            return false;
        }
        tracing::debug!(from = %self.status, to = %to, "run transition");
        self.status = to;
        true
    }
}

/// Drives submissions of a [`PlanStore`] to an [`ExecutionBackend`].
///
/// Dropping the orchestrator (or calling [`Self::shutdown`], or cancelling
/// the parent token given to [`Self::with_cancel`]) cancels any in-flight
/// submission and pending settle timers.
pub struct RunOrchestrator {
    backend: Arc<dyn ExecutionBackend>,
    config: RunConfig,
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
}

impl RunOrchestrator {
    pub fn new(backend: Arc<dyn ExecutionBackend>, config: RunConfig) -> Self {
        Self::with_cancel(backend, config, &CancellationToken::new())
    }

    /// Create an orchestrator whose work is cancelled along with `parent`.
    pub fn with_cancel(
        backend: Arc<dyn ExecutionBackend>,
        config: RunConfig,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            backend,
            config,
            state: Arc::new(Mutex::new(RunState {
                status: RunStatus::Idle,
                last_output: None,
            })),
            cancel: parent.child_token(),
        }
    }

    pub fn status(&self) -> RunStatus {
        lock(&self.state).status
    }

    /// Response text of the most recent submission, kept after success and
    /// after failure.
    pub fn last_output(&self) -> Option<String> {
        lock(&self.state).last_output.clone()
    }

    /// Cancel the in-flight submission and pending settle timers.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Validate the store's plan and, if valid, submit it once.
    ///
    /// The plan stays editable; the payload is a snapshot taken after
    /// validation.
    pub async fn submit(&self, store: &mut PlanStore) -> RunOutcome {
        if self.cancel.is_cancelled() {
            return RunOutcome::Cancelled;
        }

        let status = self.status();
        if status != RunStatus::Idle {
            tracing::info!(status = %status, "submission ignored while busy");
            return RunOutcome::Busy { status };
        }

        if !store.validate_all() {
            let issues = store.issues();
            tracing::warn!(issues = issues.len(), "plan failed validation, not submitting");
            return RunOutcome::Rejected { issues };
        }

        {
            let mut state = lock(&self.state);
            if !state.transition(RunStatus::Submitting) {
                return RunOutcome::Busy {
                    status: state.status,
                };
            }
        }

        let payload = assemble(store.plan());
        let attempt_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            attempt_id = %attempt_id,
            backend = self.backend.name(),
            mode = %store.mode(),
            tasks = payload.task_count(),
            "submitting plan"
        );

        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::info!(attempt_id = %attempt_id, "submission cancelled");
                lock(&self.state).transition(RunStatus::Idle);
                return RunOutcome::Cancelled;
            }
            result = self.backend.submit(&payload) => result,
        };

        let result = result.and_then(|body| {
            if looks_like_failure(&body) {
                Err(SubmissionError::LogicalFailure { output: body })
            } else {
                Ok(body)
            }
        });

        match result {
            Ok(output) => {
                let finished_at = Utc::now();
                lock(&self.state).last_output = Some(output.clone());
                tracing::info!(
                    attempt_id = %attempt_id,
                    elapsed_ms = (finished_at - started_at).num_milliseconds(),
                    "plan submitted"
                );
                self.schedule_settle(RunStatus::Submitting, self.config.success_settle);
                RunOutcome::Succeeded(RunReport {
                    attempt_id,
                    started_at,
                    finished_at,
                    output,
                })
            }
            Err(error) => {
                {
                    let mut state = lock(&self.state);
                    state.last_output = Some(error.output().to_owned());
                    state.transition(RunStatus::Failed);
                }
                tracing::warn!(attempt_id = %attempt_id, error = %error, "run failed");
                self.schedule_settle(RunStatus::Failed, self.config.failure_settle);
                RunOutcome::Failed { attempt_id, error }
            }
        }
    }

    /// Return to idle after `delay`, unless cancelled first or the status
    /// has moved away from `from`.
    fn schedule_settle(&self, from: RunStatus, delay: Duration) {
        let state = Arc::clone(&self.state);
        let token = self.cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(from = %from, "settle timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    let mut state = lock(&state);
                    if state.status == from {
                        state.transition(RunStatus::Idle);
                    }
                }
            }
        });
    }
}

impl Drop for RunOrchestrator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
