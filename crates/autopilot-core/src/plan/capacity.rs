//! Subscription capacity policy: how many tasks a plan may hold.

use serde::{Deserialize, Serialize};

use super::Plan;

/// Task allowance of the user's subscription tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionLimit {
    /// Tier name, e.g. `basic`.
    pub plan: String,
    /// Maximum number of tasks across the active sections.
    pub max_tasks: usize,
}

impl SubscriptionLimit {
    pub const DEFAULT_PLAN: &str = "basic";
    pub const DEFAULT_MAX_TASKS: usize = 5;

    pub fn new(plan: impl Into<String>, max_tasks: usize) -> Self {
        Self {
            plan: plan.into(),
            max_tasks,
        }
    }
}

impl Default for SubscriptionLimit {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PLAN, Self::DEFAULT_MAX_TASKS)
    }
}

/// Gates task insertion against a [`SubscriptionLimit`].
#[derive(Debug, Clone, Default)]
pub struct CapacityPolicy {
    limit: SubscriptionLimit,
}

impl CapacityPolicy {
    pub fn new(limit: SubscriptionLimit) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> &SubscriptionLimit {
        &self.limit
    }

    /// Tasks counted against the limit: `pre` in basic mode, `pre + post`
    /// in advanced mode.
    pub fn task_count(&self, plan: &Plan) -> usize {
        plan.active_task_count()
    }

    /// Whether one more task may be added to `plan`.
    pub fn can_add(&self, plan: &Plan) -> bool {
        self.task_count(plan) < self.limit.max_tasks
    }

    /// How many more tasks fit.
    pub fn remaining(&self, plan: &Plan) -> usize {
        self.limit.max_tasks.saturating_sub(self.task_count(plan))
    }
}
