//! Core domain models for the automation engine.
//!
//! These types are the source of truth for what a recipe looks like in
//! memory. They serialise to/from the JSONB `definition` column of the
//! `automation_rules` table.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use effects::{ExecutionContext, Priority};

use crate::filter::Condition;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Product area a recipe belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Donations,
    Membership,
    Grants,
    Events,
    Volunteers,
    Compliance,
    Board,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::Donations,
        Self::Membership,
        Self::Grants,
        Self::Events,
        Self::Volunteers,
        Self::Compliance,
        Self::Board,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donations => "donations",
            Self::Membership => "membership",
            Self::Grants => "grants",
            Self::Events => "events",
            Self::Volunteers => "volunteers",
            Self::Compliance => "compliance",
            Self::Board => "board",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One typed operation within a recipe.
///
/// `*_template` fields contain `{{placeholder}}` tokens rendered against the
/// event payload; `*_path` fields name a dotted payload path whose value is
/// used verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SendEmail {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_path: Option<String>,
        subject_template: String,
        body_template: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
    CreateWorkItem {
        title_template: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description_template: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee_path: Option<String>,
        #[serde(default)]
        priority: Priority,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_in_days: Option<u32>,
        /// Template for the idempotency key; must be stable per logical
        /// unit of work so redelivered events do not duplicate the item.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dedupe_key: Option<String>,
    },
    CreateTask {
        title_template: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_in_days: Option<u32>,
    },
    SlackNotify {
        channel: String,
        message_template: String,
    },
    AddTag {
        entity_type: String,
        entity_id_path: String,
        tag: String,
    },
    UpdateField {
        entity_type: String,
        entity_id_path: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_path: Option<String>,
    },
    UpdateStatus {
        entity_type: String,
        entity_id_path: String,
        status: String,
    },
    AssignReviewer {
        entity_type: String,
        entity_id_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reviewer_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reviewer_role: Option<String>,
    },
    CreatePaymentRequest {
        payee_path: String,
        amount_cents_path: String,
        description_template: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due_in_days: Option<u32>,
    },
}

impl Action {
    /// The wire name of this action kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SendEmail { .. } => "send_email",
            Self::CreateWorkItem { .. } => "create_work_item",
            Self::CreateTask { .. } => "create_task",
            Self::SlackNotify { .. } => "slack_notify",
            Self::AddTag { .. } => "add_tag",
            Self::UpdateField { .. } => "update_field",
            Self::UpdateStatus { .. } => "update_status",
            Self::AssignReviewer { .. } => "assign_reviewer",
            Self::CreatePaymentRequest { .. } => "create_payment_request",
        }
    }

    /// Every template string carried by this action, with its field name.
    pub fn templates(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        match self {
            Self::SendEmail { subject_template, body_template, .. } => {
                out.push(("subject_template", subject_template.as_str()));
                out.push(("body_template", body_template.as_str()));
            }
            Self::CreateWorkItem { title_template, description_template, dedupe_key, .. } => {
                out.push(("title_template", title_template.as_str()));
                if let Some(d) = description_template {
                    out.push(("description_template", d.as_str()));
                }
                if let Some(k) = dedupe_key {
                    out.push(("dedupe_key", k.as_str()));
                }
            }
            Self::CreateTask { title_template, .. } => {
                out.push(("title_template", title_template.as_str()));
            }
            Self::SlackNotify { message_template, .. } => {
                out.push(("message_template", message_template.as_str()));
            }
            Self::CreatePaymentRequest { description_template, .. } => {
                out.push(("description_template", description_template.as_str()));
            }
            Self::AddTag { .. }
            | Self::UpdateField { .. }
            | Self::UpdateStatus { .. }
            | Self::AssignReviewer { .. } => {}
        }
        out
    }

    /// Every payload path this action reads, with its field name.
    pub fn paths(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        match self {
            Self::SendEmail { to_path, .. } => {
                if let Some(p) = to_path {
                    out.push(("to_path", p.as_str()));
                }
            }
            Self::CreateWorkItem { assignee_path, .. } | Self::CreateTask { assignee_path, .. } => {
                if let Some(p) = assignee_path {
                    out.push(("assignee_path", p.as_str()));
                }
            }
            Self::SlackNotify { .. } => {}
            Self::AddTag { entity_id_path, .. } | Self::UpdateStatus { entity_id_path, .. } => {
                out.push(("entity_id_path", entity_id_path.as_str()));
            }
            Self::UpdateField { entity_id_path, value_path, .. } => {
                out.push(("entity_id_path", entity_id_path.as_str()));
                if let Some(p) = value_path {
                    out.push(("value_path", p.as_str()));
                }
            }
            Self::AssignReviewer { entity_id_path, reviewer_path, .. } => {
                out.push(("entity_id_path", entity_id_path.as_str()));
                if let Some(p) = reviewer_path {
                    out.push(("reviewer_path", p.as_str()));
                }
            }
            Self::CreatePaymentRequest { payee_path, amount_cents_path, .. } => {
                out.push(("payee_path", payee_path.as_str()));
                out.push(("amount_cents_path", amount_cents_path.as_str()));
            }
        }
        out
    }

    /// Returns the name of an either/or field pair that is not given exactly
    /// once (e.g. both `to` and `to_path`, or neither).
    pub fn ambiguous_source(&self) -> Option<&'static str> {
        fn exactly_one(a: bool, b: bool) -> bool {
            a ^ b
        }
        match self {
            Self::SendEmail { to, to_path, .. } if !exactly_one(to.is_some(), to_path.is_some()) => {
                Some("to / to_path")
            }
            Self::UpdateField { value, value_path, .. }
                if !exactly_one(value.is_some(), value_path.is_some()) =>
            {
                Some("value / value_path")
            }
            Self::AssignReviewer { reviewer_path, reviewer_role, .. }
                if !exactly_one(reviewer_path.is_some(), reviewer_role.is_some()) =>
            {
                Some("reviewer_path / reviewer_role")
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// A declarative automation rule: trigger + filter + ordered actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Display label, unique within a catalog.
    pub name: String,
    pub description: String,
    /// Dot-namespaced event names this recipe listens for.
    pub trigger_events: Vec<String>,
    /// Payload path → condition. All entries must hold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, Condition>>,
    pub actions: Vec<Action>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Abort the remaining actions of this recipe on the first failure.
    #[serde(default)]
    pub stop_on_error: bool,
    pub category: Category,
}

fn default_active() -> bool {
    true
}

impl Recipe {
    /// Does this recipe listen for `event_type`?
    pub fn listens_for(&self, event_type: &str) -> bool {
        self.trigger_events.iter().any(|t| t == event_type)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A domain event delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable id of the event. Redeliveries of the same event reuse it.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Event name, e.g. `donation.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Convenience constructor with a fresh id and the current time.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Build the request-scoped context for dispatching this event.
    pub fn context(&self, org_id: Uuid, actor_id: Option<Uuid>, dry_run: bool) -> ExecutionContext {
        ExecutionContext {
            org_id,
            actor_id,
            event_id: self.id,
            event_type: self.event_type.clone(),
            dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_decodes_by_type_tag() {
        let action: Action = serde_json::from_value(json!({
            "type": "create_work_item",
            "title_template": "Follow up with {{donor_name}}",
            "priority": "high",
            "dedupe_key": "major-gift-{{donation_id}}"
        }))
        .unwrap();

        match &action {
            Action::CreateWorkItem { priority, dedupe_key, due_in_days, .. } => {
                assert_eq!(*priority, Priority::High);
                assert_eq!(dedupe_key.as_deref(), Some("major-gift-{{donation_id}}"));
                assert_eq!(*due_in_days, None);
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(action.kind(), "create_work_item");
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let result: Result<Action, _> =
            serde_json::from_value(json!({ "type": "launch_rocket", "target": "moon" }));
        assert!(result.is_err());
    }

    #[test]
    fn recipe_defaults_apply() {
        let recipe: Recipe = serde_json::from_value(json!({
            "name": "Tag volunteers",
            "description": "",
            "trigger_events": ["volunteer.signed_up"],
            "actions": [{
                "type": "add_tag",
                "entity_type": "member",
                "entity_id_path": "member_id",
                "tag": "volunteer"
            }],
            "category": "volunteers"
        }))
        .unwrap();

        assert!(recipe.is_active);
        assert!(!recipe.stop_on_error);
        assert!(recipe.filters.is_none());
        assert!(recipe.listens_for("volunteer.signed_up"));
        assert!(!recipe.listens_for("volunteer.shift_completed"));
    }

    #[test]
    fn event_uses_type_key_on_the_wire() {
        let event: Event = serde_json::from_value(json!({
            "type": "donation.created",
            "payload": { "amount_cents": 2500 }
        }))
        .unwrap();
        assert_eq!(event.event_type, "donation.created");
        assert_eq!(event.payload["amount_cents"], 2500);
    }

    #[test]
    fn ambiguous_sources_are_reported() {
        let both = Action::SendEmail {
            to: Some("a@example.org".into()),
            to_path: Some("email".into()),
            subject_template: String::new(),
            body_template: String::new(),
            reply_to: None,
        };
        assert_eq!(both.ambiguous_source(), Some("to / to_path"));

        let neither = Action::AssignReviewer {
            entity_type: "grant_application".into(),
            entity_id_path: "application_id".into(),
            reviewer_path: None,
            reviewer_role: None,
        };
        assert_eq!(neither.ambiguous_source(), Some("reviewer_path / reviewer_role"));
    }

    #[test]
    fn category_parses_from_wire_name() {
        assert_eq!("grants".parse::<Category>(), Ok(Category::Grants));
        assert!("fundraising".parse::<Category>().is_err());
    }
}
