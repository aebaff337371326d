//! Turning an [`Action`] plus an event into a concrete effect request.
//!
//! Resolution is pure: it renders templates, reads `*_path` fields, and
//! computes due dates from the event's `occurred_at` so that a redelivered
//! event resolves to the same request.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use effects::{ChatMessage, EmailMessage, EntityRef, NewTask, NewWorkItem, PaymentRequest};

use crate::models::{Action, Event};
use crate::template::{lookup, render, MissingPolicy};
use crate::EngineError;

/// A fully-rendered action, ready for a collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedAction {
    SendEmail(EmailMessage),
    CreateWorkItem(NewWorkItem),
    CreateTask(NewTask),
    SlackNotify(ChatMessage),
    AddTag { entity: EntityRef, tag: String },
    UpdateField { entity: EntityRef, field: String, value: Value },
    UpdateStatus { entity: EntityRef, status: String },
    AssignReviewer { entity: EntityRef, reviewer: String },
    CreatePaymentRequest(PaymentRequest),
}

struct Resolver<'a> {
    event: &'a Event,
    recipe_name: &'a str,
    policy: MissingPolicy,
}

impl Resolver<'_> {
    fn text(&self, field: &'static str, template: &str) -> Result<String, EngineError> {
        render(template, &self.event.payload, self.policy)
            .map_err(|source| EngineError::Template { field, source })
    }

    /// Dedupe keys never render blanks: a blank would merge unrelated work.
    fn key(&self, template: &str) -> Result<String, EngineError> {
        render(template, &self.event.payload, MissingPolicy::Error)
            .map_err(|source| EngineError::Template { field: "dedupe_key", source })
    }

    fn value(&self, field: &'static str, path: &str) -> Result<&Value, EngineError> {
        lookup(&self.event.payload, path).ok_or_else(|| EngineError::UnresolvedPath {
            field,
            path: path.to_owned(),
        })
    }

    /// A path that must resolve to a non-empty string or a number.
    fn id(&self, field: &'static str, path: &str) -> Result<String, EngineError> {
        match self.value(field, path)? {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(invalid(field, path, "a non-empty string or number", other)),
        }
    }

    /// Like [`Self::id`], but `null` means "nobody".
    fn optional_id(&self, field: &'static str, path: Option<&str>) -> Result<Option<String>, EngineError> {
        let Some(path) = path else {
            return Ok(None);
        };
        if self.value(field, path)?.is_null() {
            return Ok(None);
        }
        self.id(field, path).map(Some)
    }

    fn entity(&self, entity_type: &str, entity_id_path: &str) -> Result<EntityRef, EngineError> {
        Ok(EntityRef {
            entity_type: entity_type.to_owned(),
            entity_id: self.id("entity_id_path", entity_id_path)?,
        })
    }

    fn due_on(&self, due_in_days: Option<u32>) -> Option<NaiveDate> {
        due_in_days.and_then(|days| {
            self.event
                .occurred_at
                .date_naive()
                .checked_add_days(Days::new(u64::from(days)))
        })
    }

    fn resolve(&self, action: &Action) -> Result<ResolvedAction, EngineError> {
        if let Some(pair) = action.ambiguous_source() {
            return Err(EngineError::AmbiguousSource(pair));
        }

        let resolved = match action {
            Action::SendEmail { to, to_path, subject_template, body_template, reply_to } => {
                let to = match (to, to_path) {
                    (Some(literal), _) => literal.clone(),
                    (None, Some(path)) => match self.value("to_path", path)? {
                        Value::String(s) if s.contains('@') => s.clone(),
                        other => return Err(invalid("to_path", path, "an email address", other)),
                    },
                    (None, None) => return Err(EngineError::AmbiguousSource("to / to_path")),
                };
                ResolvedAction::SendEmail(EmailMessage {
                    to,
                    reply_to: reply_to.clone(),
                    subject: self.text("subject_template", subject_template)?,
                    body: self.text("body_template", body_template)?,
                })
            }

            Action::CreateWorkItem {
                title_template,
                description_template,
                assignee_path,
                priority,
                due_in_days,
                dedupe_key,
            } => ResolvedAction::CreateWorkItem(NewWorkItem {
                title: self.text("title_template", title_template)?,
                description: description_template
                    .as_deref()
                    .map(|t| self.text("description_template", t))
                    .transpose()?,
                assignee_id: self.optional_id("assignee_path", assignee_path.as_deref())?,
                priority: *priority,
                due_on: self.due_on(*due_in_days),
                dedupe_key: dedupe_key.as_deref().map(|k| self.key(k)).transpose()?,
                source_recipe: self.recipe_name.to_owned(),
            }),

            Action::CreateTask { title_template, assignee_path, due_in_days } => {
                ResolvedAction::CreateTask(NewTask {
                    title: self.text("title_template", title_template)?,
                    assignee_id: self.optional_id("assignee_path", assignee_path.as_deref())?,
                    due_on: self.due_on(*due_in_days),
                    source_recipe: self.recipe_name.to_owned(),
                })
            }

            Action::SlackNotify { channel, message_template } => {
                ResolvedAction::SlackNotify(ChatMessage {
                    channel: channel.clone(),
                    text: self.text("message_template", message_template)?,
                })
            }

            Action::AddTag { entity_type, entity_id_path, tag } => ResolvedAction::AddTag {
                entity: self.entity(entity_type, entity_id_path)?,
                tag: tag.clone(),
            },

            Action::UpdateField { entity_type, entity_id_path, field, value, value_path } => {
                let value = match (value, value_path) {
                    (Some(literal), _) => literal.clone(),
                    (None, Some(path)) => self.value("value_path", path)?.clone(),
                    (None, None) => return Err(EngineError::AmbiguousSource("value / value_path")),
                };
                ResolvedAction::UpdateField {
                    entity: self.entity(entity_type, entity_id_path)?,
                    field: field.clone(),
                    value,
                }
            }

            Action::UpdateStatus { entity_type, entity_id_path, status } => {
                ResolvedAction::UpdateStatus {
                    entity: self.entity(entity_type, entity_id_path)?,
                    status: status.clone(),
                }
            }

            Action::AssignReviewer { entity_type, entity_id_path, reviewer_path, reviewer_role } => {
                let reviewer = match (reviewer_path, reviewer_role) {
                    (Some(path), _) => self.id("reviewer_path", path)?,
                    (None, Some(role)) => role.clone(),
                    (None, None) => {
                        return Err(EngineError::AmbiguousSource("reviewer_path / reviewer_role"))
                    }
                };
                ResolvedAction::AssignReviewer {
                    entity: self.entity(entity_type, entity_id_path)?,
                    reviewer,
                }
            }

            Action::CreatePaymentRequest {
                payee_path,
                amount_cents_path,
                description_template,
                due_in_days,
            } => {
                let amount = self.value("amount_cents_path", amount_cents_path)?;
                let amount_cents = amount
                    .as_i64()
                    .filter(|cents| *cents > 0)
                    .ok_or_else(|| {
                        invalid("amount_cents_path", amount_cents_path, "a positive integer", amount)
                    })?;
                ResolvedAction::CreatePaymentRequest(PaymentRequest {
                    payee_id: self.id("payee_path", payee_path)?,
                    amount_cents,
                    description: self.text("description_template", description_template)?,
                    due_on: self.due_on(*due_in_days),
                })
            }
        };

        Ok(resolved)
    }
}

fn invalid(field: &'static str, path: &str, expected: &'static str, found: &Value) -> EngineError {
    EngineError::InvalidValue {
        field,
        path: path.to_owned(),
        expected,
        found: found.to_string(),
    }
}

/// Resolve `action` for `event` on behalf of the recipe named `recipe_name`.
///
/// `policy` applies to text templates; dedupe keys always require every
/// placeholder to resolve.
pub fn resolve_action(
    action: &Action,
    event: &Event,
    recipe_name: &str,
    policy: MissingPolicy,
) -> Result<ResolvedAction, EngineError> {
    Resolver { event, recipe_name, policy }.resolve(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use effects::Priority;
    use serde_json::json;

    fn event(payload: Value) -> Event {
        let mut event = Event::new("grant.report.due", payload);
        event.occurred_at = Utc.with_ymd_and_hms(2026, 3, 30, 9, 0, 0).unwrap();
        event
    }

    fn report_item() -> Action {
        Action::CreateWorkItem {
            title_template: "Prepare {{funder_name}} report".into(),
            description_template: None,
            assignee_path: Some("grant_manager_id".into()),
            priority: Priority::High,
            due_in_days: Some(7),
            dedupe_key: Some("grant-report-{{grant_id}}-{{report_due_date}}".into()),
        }
    }

    #[test]
    fn work_item_resolves_key_assignee_and_due_date() {
        let ev = event(json!({
            "grant_id": 42,
            "funder_name": "Ford Foundation",
            "report_due_date": "2026-04-13",
            "grant_manager_id": "u-7"
        }));

        let resolved = resolve_action(&report_item(), &ev, "Grant Report Due Reminder", MissingPolicy::Blank)
            .unwrap();
        let ResolvedAction::CreateWorkItem(item) = resolved else {
            panic!("expected a work item");
        };
        assert_eq!(item.title, "Prepare Ford Foundation report");
        assert_eq!(item.dedupe_key.as_deref(), Some("grant-report-42-2026-04-13"));
        assert_eq!(item.assignee_id.as_deref(), Some("u-7"));
        assert_eq!(item.due_on, NaiveDate::from_ymd_opt(2026, 4, 6));
        assert_eq!(item.source_recipe, "Grant Report Due Reminder");
    }

    #[test]
    fn dedupe_key_placeholders_must_resolve() {
        let ev = event(json!({ "funder_name": "Ford", "grant_manager_id": null }));
        let err = resolve_action(&report_item(), &ev, "r", MissingPolicy::Blank).unwrap_err();
        assert!(matches!(err, EngineError::Template { field: "dedupe_key", .. }));
    }

    #[test]
    fn null_assignee_means_unassigned() {
        let ev = event(json!({
            "grant_id": 1,
            "funder_name": "F",
            "report_due_date": "d",
            "grant_manager_id": null
        }));
        let ResolvedAction::CreateWorkItem(item) =
            resolve_action(&report_item(), &ev, "r", MissingPolicy::Blank).unwrap()
        else {
            panic!("expected a work item");
        };
        assert_eq!(item.assignee_id, None);
    }

    #[test]
    fn email_recipient_comes_from_path() {
        let action = Action::SendEmail {
            to: None,
            to_path: Some("donor.email".into()),
            subject_template: "Thanks {{donor.name}}".into(),
            body_template: "{{missing}}!".into(),
            reply_to: Some("gifts@example.org".into()),
        };
        let ev = event(json!({ "donor": { "email": "jane@example.org", "name": "Jane" } }));

        let resolved = resolve_action(&action, &ev, "r", MissingPolicy::Blank).unwrap();
        assert_eq!(
            resolved,
            ResolvedAction::SendEmail(EmailMessage {
                to: "jane@example.org".into(),
                reply_to: Some("gifts@example.org".into()),
                subject: "Thanks Jane".into(),
                body: "!".into(),
            })
        );
    }

    #[test]
    fn non_address_recipient_is_rejected() {
        let action = Action::SendEmail {
            to: None,
            to_path: Some("donor_email".into()),
            subject_template: String::new(),
            body_template: String::new(),
            reply_to: None,
        };
        let err = resolve_action(&action, &event(json!({ "donor_email": 7 })), "r", MissingPolicy::Blank)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue { field: "to_path", .. }));

        let err = resolve_action(&action, &event(json!({})), "r", MissingPolicy::Blank).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedPath { field: "to_path", .. }));
    }

    #[test]
    fn payment_amount_must_be_positive_integer() {
        let action = Action::CreatePaymentRequest {
            payee_path: "grantee_id".into(),
            amount_cents_path: "amount_cents".into(),
            description_template: "Disbursement".into(),
            due_in_days: None,
        };

        let ok = resolve_action(
            &action,
            &event(json!({ "grantee_id": "org-9", "amount_cents": 500000 })),
            "r",
            MissingPolicy::Blank,
        )
        .unwrap();
        assert!(matches!(
            ok,
            ResolvedAction::CreatePaymentRequest(PaymentRequest { amount_cents: 500000, .. })
        ));

        for bad in [json!(-5), json!("500000"), json!(12.5)] {
            let err = resolve_action(
                &action,
                &event(json!({ "grantee_id": "org-9", "amount_cents": bad })),
                "r",
                MissingPolicy::Blank,
            )
            .unwrap_err();
            assert!(matches!(err, EngineError::InvalidValue { field: "amount_cents_path", .. }));
        }
    }

    #[test]
    fn update_field_reads_value_path_verbatim() {
        let action = Action::UpdateField {
            entity_type: "member".into(),
            entity_id_path: "member_id".into(),
            field: "tier".into(),
            value: None,
            value_path: Some("new_tier".into()),
        };
        let resolved = resolve_action(
            &action,
            &event(json!({ "member_id": 12, "new_tier": { "name": "gold" } })),
            "r",
            MissingPolicy::Blank,
        )
        .unwrap();
        assert_eq!(
            resolved,
            ResolvedAction::UpdateField {
                entity: EntityRef { entity_type: "member".into(), entity_id: "12".into() },
                field: "tier".into(),
                value: json!({ "name": "gold" }),
            }
        );
    }

    #[test]
    fn error_policy_surfaces_unresolved_text() {
        let action = Action::SlackNotify {
            channel: "#x".into(),
            message_template: "{{nope}}".into(),
        };
        let err = resolve_action(&action, &event(json!({})), "r", MissingPolicy::Error).unwrap_err();
        assert!(matches!(err, EngineError::Template { field: "message_template", .. }));
    }
}
