//! Plan assembly: the request body the execution backend expects.
//!
//! The backend branches on the top-level key, so the two shapes differ:
//!
//! ```text
//! basic:    { "basic": [task, ...] }
//! advanced: { "pre": [task, ...], "post": [task, ...] }
//! ```

use serde::{Deserialize, Serialize};

use super::{Mode, Plan};
use crate::task::Task;

/// Submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Advanced { pre: Vec<Task>, post: Vec<Task> },
    Basic { basic: Vec<Task> },
}

impl Payload {
    /// Total number of tasks carried.
    pub fn task_count(&self) -> usize {
        match self {
            Self::Basic { basic } => basic.len(),
            Self::Advanced { pre, post } => pre.len() + post.len(),
        }
    }
}

/// Build the payload for `plan` in its current mode.
///
/// Basic mode submits `pre` followed by `post` as one flat list, so tasks
/// left in `post` by an earlier advanced session still run, after `pre`.
pub fn assemble(plan: &Plan) -> Payload {
    match plan.mode {
        Mode::Basic => Payload::Basic {
            basic: plan.pre.iter().chain(&plan.post).cloned().collect(),
        },
        Mode::Advanced => Payload::Advanced {
            pre: plan.pre.clone(),
            post: plan.post.clone(),
        },
    }
}
