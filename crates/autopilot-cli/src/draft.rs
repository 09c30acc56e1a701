//! On-disk draft of the plan being edited.
//!
//! Each CLI invocation loads the draft, applies one edit through a
//! [`PlanStore`], and writes it back. The file is pretty-printed JSON in the
//! same task shape the backend receives, plus the mode and a timestamp.
//!
//! Malformed JSON text is saved as a plain string, exactly as it would be
//! submitted, and listed under `malformed` so it is not read back as a valid
//! JSON string.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autopilot_core::plan::{CapacityPolicy, Mode, Plan, PlanStore, Section};
use autopilot_core::task::FieldValue;

/// Draft path used when `--plan-file` is not given.
pub const DEFAULT_DRAFT_PATH: &str = "autopilot-plan.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftFile {
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub plan: Plan,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed: Vec<MalformedField>,
}

/// A JSON field whose saved string is raw text that did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedField {
    pub section: Section,
    pub index: usize,
    pub field: String,
}

/// Read the draft at `path`.
pub fn load(path: &Path) -> Result<Plan> {
    let contents = std::fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read plan draft {} (run `autopilot plan new` first)",
            path.display()
        )
    })?;
    let draft: DraftFile = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse plan draft {}", path.display()))?;

    let mut plan = draft.plan;
    for marker in &draft.malformed {
        let restored = plan
            .tasks_mut(marker.section)
            .get_mut(marker.index)
            .and_then(|task| task.json_field_mut(&marker.field))
            .is_some_and(|field| field.mark_malformed());
        if !restored {
            bail!(
                "plan draft {} marks {} of task {} in {} as malformed JSON, but it holds no such text",
                path.display(),
                marker.field,
                marker.index + 1,
                marker.section
            );
        }
    }
    Ok(plan)
}

/// Load the draft at `path` into a store governed by `policy`.
pub fn load_store(path: &Path, policy: CapacityPolicy) -> Result<PlanStore> {
    Ok(PlanStore::from_plan(load(path)?, policy))
}

/// Write `plan` to `path`, stamping the update time.
pub fn save(path: &Path, plan: &Plan) -> Result<()> {
    let draft = DraftFile {
        updated_at: Utc::now(),
        plan: plan.clone(),
        malformed: malformed_fields(plan),
    };
    let contents = serde_json::to_string_pretty(&draft).context("failed to serialize plan draft")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write plan draft {}", path.display()))?;
    tracing::debug!(path = %path.display(), "plan draft saved");
    Ok(())
}

fn malformed_fields(plan: &Plan) -> Vec<MalformedField> {
    let mut found = Vec::new();
    for section in [Section::Pre, Section::Post] {
        for (index, task) in plan.tasks(section).iter().enumerate() {
            for (field, value) in task.entries() {
                if matches!(value, FieldValue::Json(json) if json.is_malformed()) {
                    found.push(MalformedField {
                        section,
                        index,
                        field: field.to_owned(),
                    });
                }
            }
        }
    }
    found
}

/// Create an empty draft in `mode`. Refuses to overwrite unless `force`.
pub fn create(path: &Path, mode: Mode, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "plan draft already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }
    save(path, &Plan::new(mode))
}
