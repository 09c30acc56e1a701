//! Integration tests for the run orchestrator state machine, driven by a
//! scripted in-memory backend under paused tokio time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use autopilot_core::backend::{ExecutionBackend, SubmissionError};
use autopilot_core::plan::{CapacityPolicy, Payload, PlanStore, Section};
use autopilot_core::run::{RunConfig, RunOrchestrator, RunOutcome, RunStatus};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// One scripted answer: a response after an optional delay.
struct Step {
    delay: Duration,
    response: Result<String, SubmissionError>,
}

/// Backend that replays scripted responses and records the payloads sent.
#[derive(Default)]
struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    payloads: Mutex<Vec<Payload>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn replying(response: Result<&str, SubmissionError>) -> Arc<Self> {
        Self::replying_after(Duration::ZERO, response)
    }

    fn replying_after(delay: Duration, response: Result<&str, SubmissionError>) -> Arc<Self> {
        let backend = Self::default();
        backend.steps.lock().unwrap().push_back(Step {
            delay,
            response: response.map(str::to_owned),
        });
        Arc::new(backend)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, payload: &Payload) -> Result<String, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("backend called more often than scripted");
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.response
    }
}

fn valid_store() -> PlanStore {
    let mut store = PlanStore::new(CapacityPolicy::default());
    store.add_task(Section::Pre).unwrap();
    store
        .edit_field(Section::Pre, 0, "url", "https://example.com/health")
        .unwrap();
    store
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    // Let woken settle tasks run.
    tokio::task::yield_now().await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn success_settles_to_idle_after_success_delay() {
    let backend = ScriptedBackend::replying(Ok("All tasks completed"));
    let orchestrator = RunOrchestrator::new(backend.clone(), RunConfig::default());
    let mut store = valid_store();

    let outcome = orchestrator.submit(&mut store).await;

    let RunOutcome::Succeeded(report) = outcome else {
        panic!("expected Succeeded, got: {outcome:?}");
    };
    assert_eq!(report.output, "All tasks completed");
    assert_eq!(orchestrator.status(), RunStatus::Submitting);
    assert_eq!(backend.payloads.lock().unwrap().len(), 1);

    advance(2400).await;
    assert_eq!(orchestrator.status(), RunStatus::Submitting);

    advance(200).await;
    assert_eq!(orchestrator.status(), RunStatus::Idle);
    assert_eq!(orchestrator.last_output().as_deref(), Some("All tasks completed"));
}

#[tokio::test(start_paused = true)]
async fn failure_text_drives_failed_then_idle() {
    let backend = ScriptedBackend::replying(Ok("Task failed: connection error"));
    let orchestrator = RunOrchestrator::new(backend, RunConfig::default());
    let mut store = valid_store();

    let outcome = orchestrator.submit(&mut store).await;

    assert!(
        matches!(
            &outcome,
            RunOutcome::Failed { error: SubmissionError::LogicalFailure { output }, .. }
                if output == "Task failed: connection error"
        ),
        "expected LogicalFailure, got: {outcome:?}"
    );
    assert_eq!(orchestrator.status(), RunStatus::Failed);
    assert_eq!(
        orchestrator.last_output().as_deref(),
        Some("Task failed: connection error")
    );

    advance(4900).await;
    assert_eq!(orchestrator.status(), RunStatus::Failed);
    advance(200).await;
    assert_eq!(orchestrator.status(), RunStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn transport_and_status_errors_are_failures() {
    for error in [
        SubmissionError::Transport("connection refused".to_owned()),
        SubmissionError::Status {
            status: 503,
            body: "unavailable".to_owned(),
        },
    ] {
        let backend = ScriptedBackend::replying(Err(error.clone()));
        let orchestrator = RunOrchestrator::new(backend, RunConfig::default());
        let mut store = valid_store();

        let outcome = orchestrator.submit(&mut store).await;
        assert!(
            matches!(&outcome, RunOutcome::Failed { error: e, .. } if *e == error),
            "expected Failed({error}), got: {outcome:?}"
        );
        assert_eq!(orchestrator.status(), RunStatus::Failed);
    }
}

#[tokio::test(start_paused = true)]
async fn invalid_plan_never_reaches_backend() {
    let backend = ScriptedBackend::replying(Ok("unused"));
    let orchestrator = RunOrchestrator::new(backend.clone(), RunConfig::default());
    let mut store = PlanStore::new(CapacityPolicy::default());

    let outcome = orchestrator.submit(&mut store).await;

    assert_eq!(
        outcome,
        RunOutcome::Rejected {
            issues: vec!["Please add at least one task before launching.".to_owned()]
        }
    );
    assert_eq!(orchestrator.status(), RunStatus::Idle);
    assert_eq!(backend.calls(), 0);
    assert!(store.show_errors());
}

#[tokio::test(start_paused = true)]
async fn submit_while_settling_is_busy() {
    let backend = ScriptedBackend::replying(Ok("done"));
    let orchestrator = RunOrchestrator::new(backend.clone(), RunConfig::default());
    let mut store = valid_store();

    assert!(orchestrator.submit(&mut store).await.is_success());
    let outcome = orchestrator.submit(&mut store).await;

    assert_eq!(
        outcome,
        RunOutcome::Busy {
            status: RunStatus::Submitting
        }
    );
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_submission_after_settle_is_accepted() {
    let backend = ScriptedBackend::replying(Ok("first"));
    backend.steps.lock().unwrap().push_back(Step {
        delay: Duration::ZERO,
        response: Ok("second".to_owned()),
    });
    let orchestrator = RunOrchestrator::new(backend.clone(), RunConfig::default());
    let mut store = valid_store();

    assert!(orchestrator.submit(&mut store).await.is_success());
    advance(2600).await;
    let outcome = orchestrator.submit(&mut store).await;

    assert!(
        matches!(&outcome, RunOutcome::Succeeded(r) if r.output == "second"),
        "got: {outcome:?}"
    );
    assert_eq!(backend.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn parent_cancel_aborts_in_flight_submission() {
    let backend = ScriptedBackend::replying_after(Duration::from_secs(60), Ok("late"));
    let parent = CancellationToken::new();
    let orchestrator = RunOrchestrator::with_cancel(backend, RunConfig::default(), &parent);
    let mut store = valid_store();

    let canceller = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let outcome = orchestrator.submit(&mut store).await;

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(orchestrator.status(), RunStatus::Idle);
    assert_eq!(orchestrator.submit(&mut store).await, RunOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_settle_timer() {
    let backend = ScriptedBackend::replying(Ok("Exception in task 1"));
    let orchestrator = RunOrchestrator::new(backend, RunConfig::default());
    let mut store = valid_store();

    assert!(matches!(
        orchestrator.submit(&mut store).await,
        RunOutcome::Failed { .. }
    ));
    orchestrator.shutdown();

    advance(6000).await;
    assert_eq!(orchestrator.status(), RunStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn custom_settle_delays_are_honoured() {
    let backend = ScriptedBackend::replying(Ok("ok"));
    let config = RunConfig {
        success_settle: Duration::from_millis(100),
        failure_settle: Duration::from_millis(200),
    };
    let orchestrator = RunOrchestrator::new(backend, config);
    let mut store = valid_store();

    assert!(orchestrator.submit(&mut store).await.is_success());
    advance(150).await;
    assert_eq!(orchestrator.status(), RunStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn plan_stays_editable_after_submission() {
    let backend = ScriptedBackend::replying(Ok("ok"));
    let orchestrator = RunOrchestrator::new(backend.clone(), RunConfig::default());
    let mut store = valid_store();

    assert!(orchestrator.submit(&mut store).await.is_success());
    store
        .edit_field(Section::Pre, 0, "url", "https://example.com/changed")
        .unwrap();

    let sent = backend.payloads.lock().unwrap();
    let Payload::Basic { basic } = &sent[0] else {
        panic!("expected basic payload, got: {:?}", sent[0]);
    };
    assert_eq!(
        basic[0].field("url").unwrap().display_text(),
        "https://example.com/health"
    );
}
