//! Event taxonomy: which payload fields each domain event carries.
//!
//! Recipe templates and `*_path` fields may only reference fields declared
//! here for every one of the recipe's trigger events.

use std::collections::{BTreeMap, BTreeSet};

/// Event name → top-level payload fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTaxonomy {
    events: BTreeMap<String, BTreeSet<String>>,
}

impl EventTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or extend) an event and its payload fields.
    pub fn declare(&mut self, event: &str, fields: &[&str]) -> &mut Self {
        self.events
            .entry(event.to_owned())
            .or_default()
            .extend(fields.iter().map(|f| (*f).to_owned()));
        self
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.contains_key(event)
    }

    /// Whether `path` resolves on `event`'s payload. Only the first segment
    /// is checked; nested structure is the event producer's business.
    pub fn has_path(&self, event: &str, path: &str) -> bool {
        let root = path.split('.').next().unwrap_or(path);
        self.events.get(event).is_some_and(|fields| fields.contains(root))
    }

    /// Declared event names, sorted.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    /// The payload fields of every event the built-in recipes listen for.
    pub fn builtin() -> Self {
        let mut t = Self::new();
        t.declare(
            "donation.created",
            &[
                "donation_id",
                "donor_id",
                "donor_name",
                "donor_email",
                "amount_cents",
                "amount_formatted",
                "is_first_donation",
                "is_recurring",
                "campaign_name",
                "donated_at",
            ],
        )
        .declare(
            "donation.refunded",
            &["donation_id", "donor_id", "donor_name", "amount_cents", "amount_formatted", "reason"],
        )
        .declare(
            "member.joined",
            &["member_id", "member_name", "member_email", "membership_tier", "joined_at"],
        )
        .declare(
            "membership.expiring",
            &[
                "member_id",
                "member_name",
                "member_email",
                "membership_tier",
                "expires_on",
                "days_until_expiry",
            ],
        )
        .declare(
            "membership.lapsed",
            &["member_id", "member_name", "member_email", "membership_tier", "expired_on"],
        )
        .declare(
            "grant.application.submitted",
            &[
                "application_id",
                "applicant_name",
                "applicant_email",
                "program_name",
                "requested_amount_cents",
                "program_officer_id",
            ],
        )
        .declare(
            "grant.report.due",
            &[
                "grant_id",
                "grant_name",
                "funder_name",
                "report_due_date",
                "days_until_due",
                "grant_manager_id",
            ],
        )
        .declare(
            "grant.disbursement.approved",
            &["disbursement_id", "grant_id", "grant_name", "grantee_id", "amount_cents"],
        )
        .declare(
            "event.registration.created",
            &[
                "registration_id",
                "event_id",
                "event_name",
                "event_date",
                "event_location",
                "attendee_name",
                "attendee_email",
            ],
        )
        .declare("event.capacity.reached", &["event_id", "event_name", "capacity"])
        .declare(
            "volunteer.signed_up",
            &[
                "volunteer_id",
                "member_id",
                "volunteer_name",
                "volunteer_email",
                "opportunity_name",
                "coordinator_id",
            ],
        )
        .declare(
            "volunteer.hours.logged",
            &["volunteer_id", "member_id", "volunteer_name", "hours", "total_hours"],
        )
        .declare(
            "compliance.document.expiring",
            &["document_id", "document_name", "owner_id", "expires_on", "days_until_expiry"],
        )
        .declare(
            "compliance.filing.due",
            &["filing_id", "filing_name", "due_date", "compliance_officer_id"],
        )
        .declare(
            "board.meeting.scheduled",
            &["meeting_id", "meeting_title", "meeting_date", "secretary_id"],
        )
        .declare(
            "board.vote.requested",
            &["motion_id", "motion_title", "vote_deadline", "secretary_id"],
        );
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_check_their_root() {
        let mut t = EventTaxonomy::new();
        t.declare("donation.created", &["donor"]);
        assert!(t.has_path("donation.created", "donor.email"));
        assert!(!t.has_path("donation.created", "amount_cents"));
        assert!(!t.has_path("donation.refunded", "donor"));
    }

    #[test]
    fn declare_extends_existing_events() {
        let mut t = EventTaxonomy::new();
        t.declare("member.joined", &["member_id"]).declare("member.joined", &["member_name"]);
        assert!(t.has_path("member.joined", "member_id"));
        assert!(t.has_path("member.joined", "member_name"));
        assert_eq!(t.events().count(), 1);
    }
}
