//! Plan model: two ordered task sections, the active mode, capacity policy,
//! payload assembly, and the editable plan store.

pub mod assemble;
pub mod capacity;
pub mod store;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::task::Task;

pub use assemble::{Payload, assemble};
pub use capacity::{CapacityPolicy, SubscriptionLimit};
pub use store::{AttachError, PlanIssue, PlanStore, StoreError};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// One of the two pipeline stages of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Pre,
    Post,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pre => "pre",
            Self::Post => "post",
        };
        f.write_str(s)
    }
}

impl FromStr for Section {
    type Err = SectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            other => Err(SectionParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Section`] string.
#[derive(Debug, Clone)]
pub struct SectionParseError(pub String);

impl fmt::Display for SectionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid section: {:?} (expected pre or post)", self.0)
    }
}

impl std::error::Error for SectionParseError {}

// ---------------------------------------------------------------------------

/// Which sections take part in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Only `pre` is edited and submitted.
    #[default]
    Basic,
    /// Both `pre` and `post` are edited and submitted.
    Advanced,
}

impl Mode {
    /// Sections that are editable and submitted in this mode.
    pub fn active_sections(self) -> &'static [Section] {
        match self {
            Self::Basic => &[Section::Pre],
            Self::Advanced => &[Section::Pre, Section::Post],
        }
    }

    pub fn is_active(self, section: Section) -> bool {
        self.active_sections().contains(&section)
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Basic => Self::Advanced,
            Self::Advanced => Self::Basic,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

impl FromStr for Mode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            other => Err(ModeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Mode`] string.
#[derive(Debug, Clone)]
pub struct ModeParseError(pub String);

impl fmt::Display for ModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid mode: {:?} (expected basic or advanced)", self.0)
    }
}

impl std::error::Error for ModeParseError {}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// An automation plan. Task order within a section is execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub pre: Vec<Task>,
    #[serde(default)]
    pub post: Vec<Task>,
}

impl Plan {
    /// An empty plan in `mode`.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn tasks(&self, section: Section) -> &[Task] {
        match section {
            Section::Pre => &self.pre,
            Section::Post => &self.post,
        }
    }

    pub fn tasks_mut(&mut self, section: Section) -> &mut Vec<Task> {
        match section {
            Section::Pre => &mut self.pre,
            Section::Post => &mut self.post,
        }
    }

    /// Number of tasks in the sections active under the current mode.
    pub fn active_task_count(&self) -> usize {
        self.mode
            .active_sections()
            .iter()
            .map(|s| self.tasks(*s).len())
            .sum()
    }
}
