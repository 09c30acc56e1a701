//! Editable plan state.
//!
//! [`PlanStore`] owns the plan, per-task validation errors aligned
//! index-for-index with each section, the show-errors flag, and the
//! plan-level issue recorded by whole-plan validation.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use super::{CapacityPolicy, Mode, Plan, Section};
use crate::task::{SchemaError, Task, TaskKind, defaults_for, is_file_field};
use crate::upload::{FileUploader, UploadError, UploadKind};
use crate::validate::{
    EMPTY_JSON, ExtensionMismatch, FieldErrors, INVALID_JSON, MessageStyle, REQUIRED,
    check_extension, validate_task,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from plan store mutations. A rejected mutation leaves the store
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("limit reached: the {plan} plan allows only {max} tasks")]
    CapacityExceeded { plan: String, max: usize },

    #[error("no task {} in {section} (section has {len})", .index + 1)]
    IndexOutOfRange {
        section: Section,
        index: usize,
        len: usize,
    },

    #[error("the {section} section is not editable in {mode} mode")]
    InactiveSection { section: Section, mode: Mode },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors from attaching a file to a task field.
#[derive(Debug, Error)]
pub enum AttachError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    ExtensionMismatch(#[from] ExtensionMismatch),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Plan-level problem found by [`PlanStore::validate_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanIssue {
    /// The active sections hold no tasks.
    NoTasks,
}

impl fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTasks => f.write_str("Please add at least one task before launching."),
        }
    }
}

// ---------------------------------------------------------------------------
// PlanStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlanStore {
    plan: Plan,
    policy: CapacityPolicy,
    pre_errors: Vec<FieldErrors>,
    post_errors: Vec<FieldErrors>,
    show_errors: bool,
    plan_issue: Option<PlanIssue>,
}

impl PlanStore {
    /// An empty basic-mode plan governed by `policy`.
    pub fn new(policy: CapacityPolicy) -> Self {
        Self::from_plan(Plan::default(), policy)
    }

    /// Wrap an existing plan, e.g. one loaded from a draft file. Error maps
    /// start empty and aligned with each section.
    pub fn from_plan(plan: Plan, policy: CapacityPolicy) -> Self {
        Self {
            pre_errors: vec![FieldErrors::new(); plan.pre.len()],
            post_errors: vec![FieldErrors::new(); plan.post.len()],
            plan,
            policy,
            show_errors: false,
            plan_issue: None,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }

    pub fn policy(&self) -> &CapacityPolicy {
        &self.policy
    }

    pub fn mode(&self) -> Mode {
        self.plan.mode
    }

    pub fn tasks(&self, section: Section) -> &[Task] {
        self.plan.tasks(section)
    }

    pub fn task(&self, section: Section, index: usize) -> Result<&Task, StoreError> {
        let tasks = self.plan.tasks(section);
        tasks.get(index).ok_or(StoreError::IndexOutOfRange {
            section,
            index,
            len: tasks.len(),
        })
    }

    /// Error maps of `section`, one per task.
    pub fn errors(&self, section: Section) -> &[FieldErrors] {
        match section {
            Section::Pre => &self.pre_errors,
            Section::Post => &self.post_errors,
        }
    }

    /// Whether errors should be surfaced to the user.
    pub fn show_errors(&self) -> bool {
        self.show_errors
    }

    pub fn plan_issue(&self) -> Option<PlanIssue> {
        self.plan_issue
    }

    // -- mutations ------------------------------------------------------------

    /// Append a default api task to `section`.
    pub fn add_task(&mut self, section: Section) -> Result<usize, StoreError> {
        self.ensure_active(section)?;
        if !self.policy.can_add(&self.plan) {
            let limit = self.policy.limit();
            tracing::warn!(
                section = %section,
                plan = %limit.plan,
                max = limit.max_tasks,
                "task limit reached"
            );
            return Err(StoreError::CapacityExceeded {
                plan: limit.plan.clone(),
                max: limit.max_tasks,
            });
        }

        let tasks = self.plan.tasks_mut(section);
        tasks.push(defaults_for(TaskKind::Api));
        let index = tasks.len() - 1;
        self.errors_mut(section).push(FieldErrors::new());
        tracing::info!(section = %section, index, "task added");
        Ok(index)
    }

    /// Replace the task at `index` and re-validate it.
    pub fn update_task(
        &mut self,
        section: Section,
        index: usize,
        task: Task,
    ) -> Result<&FieldErrors, StoreError> {
        self.ensure_active(section)?;
        *self.task_mut(section, index)? = task;
        Ok(self.revalidate(section, index))
    }

    /// Set one field from user-entered text and re-validate the task.
    pub fn edit_field(
        &mut self,
        section: Section,
        index: usize,
        field: &str,
        text: &str,
    ) -> Result<&FieldErrors, StoreError> {
        self.ensure_active(section)?;
        self.task_mut(section, index)?.set_field(field, text)?;
        tracing::debug!(section = %section, index, field, "field edited");
        Ok(self.revalidate(section, index))
    }

    /// Switch the task at `index` to `kind`, discarding its field values.
    pub fn change_kind(
        &mut self,
        section: Section,
        index: usize,
        kind: TaskKind,
    ) -> Result<(), StoreError> {
        self.ensure_active(section)?;
        self.task_mut(section, index)?.change_kind(kind);
        self.set_errors(section, index, FieldErrors::new());
        tracing::info!(section = %section, index, kind = %kind, "task kind changed");
        Ok(())
    }

    /// Remove the task at `index` together with its error map.
    pub fn remove_task(&mut self, section: Section, index: usize) -> Result<Task, StoreError> {
        self.ensure_active(section)?;
        self.task(section, index)?;
        let task = self.plan.tasks_mut(section).remove(index);
        let errors = self.errors_mut(section);
        if index < errors.len() {
            errors.remove(index);
        }
        tracing::info!(section = %section, index, "task removed");
        Ok(task)
    }

    /// Store `errors` for the task at `index`, growing the error sequence
    /// with empty maps if it is shorter.
    pub fn set_errors(&mut self, section: Section, index: usize, errors: FieldErrors) {
        let slots = self.errors_mut(section);
        if slots.len() <= index {
            slots.resize(index + 1, FieldErrors::new());
        }
        slots[index] = errors;
    }

    /// Change mode. Task data is kept; errors are cleared and hidden.
    pub fn set_mode(&mut self, mode: Mode) {
        self.plan.mode = mode;
        self.pre_errors = vec![FieldErrors::new(); self.plan.pre.len()];
        self.post_errors = vec![FieldErrors::new(); self.plan.post.len()];
        self.show_errors = false;
        self.plan_issue = None;
        tracing::info!(mode = %mode, "mode changed");
    }

    pub fn toggle_mode(&mut self) {
        self.set_mode(self.plan.mode.toggled());
    }

    /// Validate every task of the active sections. Returns `true` when the
    /// plan may be submitted.
    pub fn validate_all(&mut self) -> bool {
        self.show_errors = true;
        self.plan_issue = None;

        if self.plan.active_task_count() == 0 {
            tracing::warn!(mode = %self.plan.mode, "plan has no tasks");
            self.plan_issue = Some(PlanIssue::NoTasks);
            return false;
        }

        let mut valid = true;
        for &section in self.plan.mode.active_sections() {
            let errors: Vec<FieldErrors> = self
                .plan
                .tasks(section)
                .iter()
                .map(|task| validate_task(task, MessageStyle::Long))
                .collect();
            valid &= errors.iter().all(FieldErrors::is_empty);
            *self.errors_mut(section) = errors;
        }

        tracing::debug!(valid, "plan validated");
        valid
    }

    /// Human-readable list of the current problems in the active sections,
    /// e.g. `"Task 2 in pre section: headers cannot be empty JSON."`.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Some(issue) = self.plan_issue {
            issues.push(issue.to_string());
        }

        for &section in self.plan.mode.active_sections() {
            let tasks = self.plan.tasks(section);
            for (i, (task, errors)) in tasks.iter().zip(self.errors(section)).enumerate() {
                for (field, _) in task.entries() {
                    if let Some(message) = errors.get(field) {
                        issues.push(format!(
                            "Task {} in {section} section: {}.",
                            i + 1,
                            describe(field, message)
                        ));
                    }
                }
            }
        }
        issues
    }

    /// Upload `file` and store the returned server path in `field`.
    ///
    /// A file with the wrong extension is rejected before any upload: the
    /// field keeps its value and the mismatch is recorded in its error map.
    pub async fn attach_file(
        &mut self,
        section: Section,
        index: usize,
        field: &str,
        file: &Path,
        uploader: &dyn FileUploader,
    ) -> Result<String, AttachError> {
        self.ensure_active(section)?;
        let task = self.task(section, index)?;
        task.field(field).map_err(StoreError::from)?;
        if !is_file_field(field) {
            return Err(StoreError::from(SchemaError::NotAFileField(field.to_owned())).into());
        }

        let extension = match check_extension(field, file) {
            Ok(ext) => ext,
            Err(mismatch) => {
                tracing::warn!(
                    section = %section,
                    index,
                    field,
                    file = %mismatch.file_name,
                    expected = mismatch.expected,
                    "attachment rejected"
                );
                let mut errors = self
                    .errors(section)
                    .get(index)
                    .cloned()
                    .unwrap_or_default();
                errors.insert(field.to_owned(), mismatch.to_string());
                self.set_errors(section, index, errors);
                return Err(mismatch.into());
            }
        };

        let server_path = uploader
            .upload(file, UploadKind::from_extension(&extension))
            .await
            .inspect_err(|e| {
                tracing::warn!(section = %section, index, field, error = %e, "upload failed");
            })?;

        self.task_mut(section, index)?
            .set_field(field, &server_path)
            .map_err(StoreError::from)?;
        self.revalidate(section, index);
        tracing::info!(section = %section, index, field, path = %server_path, "file attached");
        Ok(server_path)
    }

    // -- helpers --------------------------------------------------------------

    fn ensure_active(&self, section: Section) -> Result<(), StoreError> {
        if self.plan.mode.is_active(section) {
            Ok(())
        } else {
            Err(StoreError::InactiveSection {
                section,
                mode: self.plan.mode,
            })
        }
    }

    fn task_mut(&mut self, section: Section, index: usize) -> Result<&mut Task, StoreError> {
        let tasks = self.plan.tasks_mut(section);
        let len = tasks.len();
        tasks.get_mut(index).ok_or(StoreError::IndexOutOfRange {
            section,
            index,
            len,
        })
    }

    fn errors_mut(&mut self, section: Section) -> &mut Vec<FieldErrors> {
        match section {
            Section::Pre => &mut self.pre_errors,
            Section::Post => &mut self.post_errors,
        }
    }

    fn revalidate(&mut self, section: Section, index: usize) -> &FieldErrors {
        let errors = validate_task(&self.plan.tasks(section)[index], MessageStyle::Short);
        self.set_errors(section, index, errors);
        &self.errors(section)[index]
    }
}

/// Phrase an error map entry as the tail of an issue sentence.
fn describe(field: &str, message: &str) -> String {
    match message {
        REQUIRED => format!("{field} is required"),
        EMPTY_JSON => format!("{field} cannot be empty JSON"),
        INVALID_JSON => format!("{field} is not valid JSON"),
        other => other.trim_end_matches('.').to_owned(),
    }
}
