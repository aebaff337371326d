//! What happened when an event was dispatched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Category;
use crate::resolve::ResolvedAction;

/// Result of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    /// The collaborator accepted the effect. `reference` is whatever id it
    /// returned (message id, work item id, ...), if any.
    Succeeded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    /// A work item with the same dedupe key already existed.
    Deduplicated { work_item_id: Uuid },
    Failed { reason: String, retriable: bool },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Position of the action in the recipe.
    pub index: usize,
    pub kind: String,
    #[serde(flatten)]
    pub status: ActionStatus,
    /// The fully-rendered request, when resolution got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedAction>,
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ActionStatus::Failed { .. })
    }
}

/// Overall result of one recipe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// `stop_on_error` was off and at least one action failed.
    CompletedWithErrors,
    /// `stop_on_error` was on and an action failed; later actions skipped.
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::CompletedWithErrors => write!(f, "completed_with_errors"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRun {
    pub recipe: String,
    pub category: Category,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ActionOutcome>,
}

impl RecipeRun {
    pub fn failures(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }
}

/// Everything one event caused, in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event_id: Uuid,
    pub event_type: String,
    pub org_id: Uuid,
    pub dry_run: bool,
    pub dispatched_at: DateTime<Utc>,
    pub runs: Vec<RecipeRun>,
}

impl DispatchReport {
    pub fn matched_recipes(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.recipe.as_str()).collect()
    }

    /// Number of actions that failed across every run.
    pub fn failure_count(&self) -> usize {
        self.runs.iter().map(|r| r.failures().count()).sum()
    }

    /// Number of actions that succeeded (deduplicated work items included).
    pub fn success_count(&self) -> usize {
        self.runs
            .iter()
            .flat_map(|r| &r.outcomes)
            .filter(|o| {
                matches!(o.status, ActionStatus::Succeeded { .. } | ActionStatus::Deduplicated { .. })
            })
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.runs.iter().all(|r| r.status == RunStatus::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(index: usize, status: ActionStatus) -> ActionOutcome {
        ActionOutcome { index, kind: "slack_notify".into(), status, resolved: None }
    }

    #[test]
    fn counts_across_runs() {
        let now = Utc::now();
        let run = |status, outcomes| RecipeRun {
            recipe: "r".into(),
            category: Category::Events,
            status,
            started_at: now,
            finished_at: now,
            outcomes,
        };
        let report = DispatchReport {
            event_id: Uuid::new_v4(),
            event_type: "event.capacity.reached".into(),
            org_id: Uuid::new_v4(),
            dry_run: false,
            dispatched_at: now,
            runs: vec![
                run(
                    RunStatus::CompletedWithErrors,
                    vec![
                        outcome(0, ActionStatus::Succeeded { reference: None }),
                        outcome(1, ActionStatus::Failed { reason: "x".into(), retriable: true }),
                    ],
                ),
                run(
                    RunStatus::Succeeded,
                    vec![outcome(0, ActionStatus::Deduplicated { work_item_id: Uuid::new_v4() })],
                ),
            ],
        };

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn outcome_status_is_flattened_on_the_wire() {
        let value = serde_json::to_value(outcome(
            2,
            ActionStatus::Skipped { reason: "dry run".into() },
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({ "index": 2, "kind": "slack_notify", "status": "skipped", "reason": "dry run" })
        );
    }
}
