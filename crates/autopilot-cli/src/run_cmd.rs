//! CLI handler for `autopilot run`.
//!
//! Validates the draft, submits it once, and prints the backend's response.
//! Exit codes: 0 success, 1 validation rejection or failed run, 130 when
//! interrupted.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use autopilot_core::backend::HttpBackend;
use autopilot_core::plan::CapacityPolicy;
use autopilot_core::run::{RunOrchestrator, RunOutcome};

use crate::config::AutopilotConfig;
use crate::draft;

pub async fn run(plan_file: &Path, config: &AutopilotConfig) -> Result<()> {
    let mut store = draft::load_store(plan_file, CapacityPolicy::new(config.limit.clone()))?;

    let backend = HttpBackend::new(&config.backend_url, config.timeout)
        .context("failed to create backend client")?;

    // Ctrl+C cancels the in-flight submission; a second Ctrl+C exits.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let got_first_clone = Arc::clone(&got_first_signal);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nCancelling submission (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    let orchestrator = RunOrchestrator::with_cancel(Arc::new(backend), config.run, &cancel);

    println!(
        "Submitting {} task(s) in {} mode to {}...",
        store.plan().active_task_count(),
        store.mode(),
        config.backend_url
    );

    match orchestrator.submit(&mut store).await {
        RunOutcome::Succeeded(report) => {
            let elapsed = report.finished_at - report.started_at;
            println!("{}", report.output);
            println!();
            println!(
                "Run {} succeeded in {:.1}s.",
                report.attempt_id,
                elapsed.num_milliseconds() as f64 / 1000.0
            );
            Ok(())
        }
        RunOutcome::Rejected { issues } => {
            eprintln!("Plan is not valid, nothing was submitted:");
            for issue in &issues {
                eprintln!("  - {issue}");
            }
            std::process::exit(1);
        }
        RunOutcome::Failed { attempt_id, error } => {
            if !error.output().is_empty() {
                println!("{}", error.output());
                println!();
            }
            eprintln!("Run {attempt_id} failed: {error}");
            std::process::exit(1);
        }
        RunOutcome::Busy { status } => {
            eprintln!("A submission is already {status}.");
            std::process::exit(1);
        }
        RunOutcome::Cancelled => {
            eprintln!("Submission cancelled.");
            std::process::exit(130);
        }
    }
}
