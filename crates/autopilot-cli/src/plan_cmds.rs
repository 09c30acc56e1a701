//! CLI handlers for `autopilot plan` subcommands.
//!
//! Every edit loads the draft, applies one [`PlanStore`] operation, and saves
//! the draft back. Task numbers on the command line are 1-based.

use std::path::Path;

use anyhow::{Context, Result, bail};

use autopilot_core::plan::{CapacityPolicy, PlanStore, Section, assemble};
use autopilot_core::task::{FieldValue, JsonField, Task};
use autopilot_core::upload::HttpUploader;
use autopilot_core::validate::{FieldErrors, MessageStyle, validate_task};

use crate::PlanCommands;
use crate::config::AutopilotConfig;
use crate::draft;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    plan_file: &Path,
    config: &AutopilotConfig,
) -> Result<()> {
    let open = || draft::load_store(plan_file, CapacityPolicy::new(config.limit.clone()));

    match command {
        PlanCommands::New { mode, force } => {
            draft::create(plan_file, mode, force)?;
            println!("Plan draft created at {} ({mode} mode).", plan_file.display());
        }
        PlanCommands::Add { section } => {
            let mut store = open()?;
            let index = store.add_task(section)?;
            draft::save(plan_file, store.plan())?;
            println!(
                "Added task {} to {section} ({} of {} tasks used).",
                index + 1,
                store.policy().task_count(store.plan()),
                store.policy().limit().max_tasks
            );
        }
        PlanCommands::Remove { section, n } => {
            let mut store = open()?;
            let task = store.remove_task(section, to_index(n)?)?;
            draft::save(plan_file, store.plan())?;
            println!("Removed {} task {n} from {section}.", task.kind());
        }
        PlanCommands::Kind { section, n, kind } => {
            let mut store = open()?;
            store.change_kind(section, to_index(n)?, kind)?;
            draft::save(plan_file, store.plan())?;
            println!("Task {n} in {section} is now a {kind} task.");
        }
        PlanCommands::Set {
            section,
            n,
            field,
            value,
        } => {
            let mut store = open()?;
            let errors = store
                .edit_field(section, to_index(n)?, &field, &value)?
                .clone();
            draft::save(plan_file, store.plan())?;
            println!("Set {field} on task {n} in {section}.");
            print_field_errors(&errors);
        }
        PlanCommands::Attach {
            section,
            n,
            field,
            file,
        } => {
            let mut store = open()?;
            let uploader = HttpUploader::new(&config.backend_url, config.timeout)
                .context("failed to create upload client")?;
            let server_path = store
                .attach_file(section, to_index(n)?, &field, &file, &uploader)
                .await
                .with_context(|| format!("failed to attach {}", file.display()))?;
            draft::save(plan_file, store.plan())?;
            println!("Uploaded {} as {server_path}.", file.display());
        }
        PlanCommands::Mode { mode } => {
            let mut store = open()?;
            store.set_mode(mode);
            draft::save(plan_file, store.plan())?;
            println!("Plan is now in {mode} mode.");
        }
        PlanCommands::Validate => cmd_validate(&mut open()?)?,
        PlanCommands::Show { payload } => {
            let store = open()?;
            if payload {
                let json = serde_json::to_string_pretty(&assemble(store.plan()))
                    .context("failed to serialize payload")?;
                println!("{json}");
            } else {
                print_plan(&store);
            }
        }
    }

    Ok(())
}

/// Convert a 1-based task number from the command line.
fn to_index(n: usize) -> Result<usize> {
    match n.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("task numbers start at 1"),
    }
}

// -----------------------------------------------------------------------
// autopilot plan validate
// -----------------------------------------------------------------------

fn cmd_validate(store: &mut PlanStore) -> Result<()> {
    if store.validate_all() {
        println!(
            "Plan is valid: {} task(s) in {} mode.",
            store.plan().active_task_count(),
            store.mode()
        );
        return Ok(());
    }

    let issues = store.issues();
    println!("Plan is not valid:");
    for issue in &issues {
        println!("  - {issue}");
    }
    bail!("plan validation failed with {} issue(s)", issues.len())
}

// -----------------------------------------------------------------------
// autopilot plan show
// -----------------------------------------------------------------------

fn print_plan(store: &PlanStore) {
    let plan = store.plan();
    let policy = store.policy();
    println!(
        "Mode: {}    Tasks: {}/{} ({} plan)",
        plan.mode,
        policy.task_count(plan),
        policy.limit().max_tasks,
        policy.limit().plan
    );

    for section in [Section::Pre, Section::Post] {
        let tasks = plan.tasks(section);
        println!();
        if !plan.mode.is_active(section) {
            if !tasks.is_empty() {
                println!(
                    "[{section}] {} task(s), sent after pre but not checked in {} mode",
                    tasks.len(),
                    plan.mode
                );
            }
            continue;
        }

        println!("[{section}]");
        if tasks.is_empty() {
            println!("  (no tasks)");
        }
        for (i, task) in tasks.iter().enumerate() {
            print_task(i + 1, task);
        }
    }
}

fn print_task(number: usize, task: &Task) {
    let errors = validate_task(task, MessageStyle::Short);
    println!("  {number}. {}", task.kind());
    for (field, value) in task.entries() {
        let shown = compact(field, value);
        match errors.get(field) {
            Some(message) => println!("       {field:<22} {shown}  <- {message}"),
            None => println!("       {field:<22} {shown}"),
        }
    }
}

/// Single-line rendering of a field value; secrets are masked.
fn compact(field: &str, value: FieldValue<'_>) -> String {
    match value {
        FieldValue::Text(text) if field.to_lowercase().contains("password") && !text.is_empty() => {
            "********".to_owned()
        }
        FieldValue::Json(JsonField::Parsed(json)) => json.to_string(),
        other => other.display_text(),
    }
}

fn print_field_errors(errors: &FieldErrors) {
    if errors.is_empty() {
        return;
    }
    println!("Fields needing attention:");
    for (field, message) in errors {
        println!("  {field}: {message}");
    }
}
