//! The automation recipes shipped with the product.
//!
//! Seeded into `automation_rules` per organization by the seeding endpoint.
//! Every placeholder and path used here must be declared for the recipe's
//! trigger events in [`crate::taxonomy::EventTaxonomy::builtin`].

use std::collections::BTreeMap;

use serde_json::Value;

use effects::Priority;

use crate::filter::Condition;
use crate::models::{Action, Category, Recipe};

fn recipe(
    name: &str,
    description: &str,
    category: Category,
    trigger_events: &[&str],
    actions: Vec<Action>,
) -> Recipe {
    Recipe {
        name: name.to_owned(),
        description: description.to_owned(),
        trigger_events: trigger_events.iter().map(|s| (*s).to_owned()).collect(),
        filters: None,
        actions,
        is_active: true,
        stop_on_error: false,
        category,
    }
}

fn with_filters(mut recipe: Recipe, filters: Vec<(&str, Condition)>) -> Recipe {
    recipe.filters = Some(
        filters
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect::<BTreeMap<_, _>>(),
    );
    recipe
}

fn stopping(mut recipe: Recipe) -> Recipe {
    recipe.stop_on_error = true;
    recipe
}

fn inactive(mut recipe: Recipe) -> Recipe {
    recipe.is_active = false;
    recipe
}

fn email(to_path: &str, subject: &str, body: &str) -> Action {
    Action::SendEmail {
        to: None,
        to_path: Some(to_path.to_owned()),
        subject_template: subject.to_owned(),
        body_template: body.to_owned(),
        reply_to: None,
    }
}

fn work_item(
    title: &str,
    description: Option<&str>,
    assignee_path: Option<&str>,
    priority: Priority,
    due_in_days: Option<u32>,
    dedupe_key: &str,
) -> Action {
    Action::CreateWorkItem {
        title_template: title.to_owned(),
        description_template: description.map(str::to_owned),
        assignee_path: assignee_path.map(str::to_owned),
        priority,
        due_in_days,
        dedupe_key: Some(dedupe_key.to_owned()),
    }
}

fn task(title: &str, assignee_path: Option<&str>, due_in_days: Option<u32>) -> Action {
    Action::CreateTask {
        title_template: title.to_owned(),
        assignee_path: assignee_path.map(str::to_owned),
        due_in_days,
    }
}

fn slack(channel: &str, message: &str) -> Action {
    Action::SlackNotify {
        channel: channel.to_owned(),
        message_template: message.to_owned(),
    }
}

fn tag(entity_type: &str, entity_id_path: &str, tag: &str) -> Action {
    Action::AddTag {
        entity_type: entity_type.to_owned(),
        entity_id_path: entity_id_path.to_owned(),
        tag: tag.to_owned(),
    }
}

fn set_field(entity_type: &str, entity_id_path: &str, field: &str, value: Value) -> Action {
    Action::UpdateField {
        entity_type: entity_type.to_owned(),
        entity_id_path: entity_id_path.to_owned(),
        field: field.to_owned(),
        value: Some(value),
        value_path: None,
    }
}

fn status(entity_type: &str, entity_id_path: &str, status: &str) -> Action {
    Action::UpdateStatus {
        entity_type: entity_type.to_owned(),
        entity_id_path: entity_id_path.to_owned(),
        status: status.to_owned(),
    }
}

/// The built-in recipe pack, in display order.
pub fn builtin_recipes() -> Vec<Recipe> {
    vec![
        // ------------------------------------------------------------------
        // Donations
        // ------------------------------------------------------------------
        recipe(
            "Donation Receipt (Immediate)",
            "Email a tax receipt to the donor as soon as a gift is recorded.",
            Category::Donations,
            &["donation.created"],
            vec![
                email(
                    "donor_email",
                    "Thank you for your gift, {{donor_name}}",
                    "Dear {{donor_name}},\n\nThank you for your generous gift of {{amount_formatted}} \
                     to {{campaign_name | our general fund}}. This email serves as your receipt.\n\n\
                     Donation ID: {{donation_id}}\nDate: {{donated_at}}",
                ),
                set_field("donation", "donation_id", "receipt_sent", Value::Bool(true)),
            ],
        ),
        with_filters(
            recipe(
                "Major Gift Alert ($1,000+)",
                "Alert development staff and queue a thank-you call for gifts of $1,000 or more.",
                Category::Donations,
                &["donation.created"],
                vec![
                    slack(
                        "#major-gifts",
                        ":tada: {{donor_name}} just gave {{amount_formatted}} to {{campaign_name | the general fund}}",
                    ),
                    work_item(
                        "Thank-you call: {{donor_name}} ({{amount_formatted}})",
                        Some("Call {{donor_name}} within 48 hours to thank them for their gift."),
                        None,
                        Priority::High,
                        Some(2),
                        "major-gift-call-{{donation_id}}",
                    ),
                    tag("donor", "donor_id", "major_donor"),
                ],
            ),
            vec![("amount_cents", Condition::gte(100_000))],
        ),
        with_filters(
            recipe(
                "First-Time Donor Welcome",
                "Welcome series and follow-up for a donor's first gift.",
                Category::Donations,
                &["donation.created"],
                vec![
                    email(
                        "donor_email",
                        "Welcome to our community, {{donor_name}}!",
                        "Dear {{donor_name}},\n\nYour first gift of {{amount_formatted}} means a lot. \
                         Here is what your support makes possible...",
                    ),
                    tag("donor", "donor_id", "first_time_donor"),
                    task("Personal note to new donor {{donor_name}}", None, Some(7)),
                ],
            ),
            vec![("is_first_donation", Condition::equals(true))],
        ),
        inactive(with_filters(
            recipe(
                "Recurring Donor Upgrade Ask",
                "Invite recurring donors to increase their monthly gift.",
                Category::Donations,
                &["donation.created"],
                vec![email(
                    "donor_email",
                    "Could you do a little more, {{donor_name}}?",
                    "Your monthly support of {{amount_formatted}} keeps our programs running...",
                )],
            ),
            vec![("is_recurring", Condition::equals(true))],
        )),
        recipe(
            "Refund Review",
            "Route refunded donations to finance for review.",
            Category::Donations,
            &["donation.refunded"],
            vec![
                work_item(
                    "Review refund for {{donor_name}} ({{amount_formatted}})",
                    Some("Reason given: {{reason | none provided}}"),
                    None,
                    Priority::Normal,
                    Some(3),
                    "refund-review-{{donation_id}}",
                ),
                slack("#finance", "Refund issued: {{amount_formatted}} to {{donor_name}}"),
            ],
        ),
        // ------------------------------------------------------------------
        // Membership
        // ------------------------------------------------------------------
        recipe(
            "New Member Onboarding",
            "Welcome email, tag, and an onboarding call task for new members.",
            Category::Membership,
            &["member.joined"],
            vec![
                email(
                    "member_email",
                    "Welcome aboard, {{member_name}}",
                    "Hi {{member_name}},\n\nYour {{membership_tier}} membership is active as of {{joined_at}}.",
                ),
                tag("member", "member_id", "new_member"),
                task("Onboarding call with {{member_name}}", None, Some(14)),
            ],
        ),
        with_filters(
            recipe(
                "Membership Renewal Reminder (30 days)",
                "Remind members whose membership expires within 30 days.",
                Category::Membership,
                &["membership.expiring"],
                vec![
                    email(
                        "member_email",
                        "Your {{membership_tier}} membership expires on {{expires_on}}",
                        "Hi {{member_name}},\n\nRenew in the next {{days_until_expiry}} days to keep your benefits.",
                    ),
                    work_item(
                        "Renewal outreach: {{member_name}}",
                        None,
                        None,
                        Priority::Normal,
                        Some(7),
                        "renewal-{{member_id}}-{{expires_on}}",
                    ),
                ],
            ),
            vec![("days_until_expiry", Condition::Compare(crate::filter::Comparison {
                gte: Some(Value::from(0)),
                lte: Some(Value::from(30)),
                ..Default::default()
            }))],
        ),
        stopping(recipe(
            "Lapsed Member Win-Back",
            "Mark the member lapsed, then send a win-back offer.",
            Category::Membership,
            &["membership.lapsed"],
            vec![
                status("member", "member_id", "lapsed"),
                email(
                    "member_email",
                    "We miss you, {{member_name}}",
                    "Your membership ended on {{expired_on}}. Rejoin this month and we'll waive the fee.",
                ),
            ],
        )),
        // ------------------------------------------------------------------
        // Grants
        // ------------------------------------------------------------------
        recipe(
            "Grant Application Triage",
            "Assign the program officer and acknowledge receipt to the applicant.",
            Category::Grants,
            &["grant.application.submitted"],
            vec![
                Action::AssignReviewer {
                    entity_type: "grant_application".into(),
                    entity_id_path: "application_id".into(),
                    reviewer_path: Some("program_officer_id".into()),
                    reviewer_role: None,
                },
                status("grant_application", "application_id", "under_review"),
                email(
                    "applicant_email",
                    "We received your application to {{program_name}}",
                    "Dear {{applicant_name}},\n\nYour application (ID {{application_id}}) is under review.",
                ),
            ],
        ),
        with_filters(
            recipe(
                "Grant Report Due Reminder",
                "Queue report preparation for the grant manager two weeks before the due date.",
                Category::Grants,
                &["grant.report.due"],
                vec![
                    work_item(
                        "Prepare {{funder_name}} report for {{grant_name}}",
                        Some("Report due {{report_due_date}}."),
                        Some("grant_manager_id"),
                        Priority::High,
                        Some(7),
                        "grant-report-{{grant_id}}-{{report_due_date}}",
                    ),
                    slack("#grants", "Report for {{grant_name}} is due {{report_due_date}}"),
                ],
            ),
            vec![("days_until_due", Condition::lte(14))],
        ),
        stopping(recipe(
            "Grant Disbursement Payable",
            "Create the payable for an approved disbursement, then mark it requested.",
            Category::Grants,
            &["grant.disbursement.approved"],
            vec![
                Action::CreatePaymentRequest {
                    payee_path: "grantee_id".into(),
                    amount_cents_path: "amount_cents".into(),
                    description_template: "{{grant_name}} disbursement {{disbursement_id}}".into(),
                    due_in_days: Some(10),
                },
                status("grant_disbursement", "disbursement_id", "payment_requested"),
            ],
        )),
        // ------------------------------------------------------------------
        // Events
        // ------------------------------------------------------------------
        recipe(
            "Event Registration Confirmation",
            "Confirm an event registration by email.",
            Category::Events,
            &["event.registration.created"],
            vec![email(
                "attendee_email",
                "You're registered: {{event_name}}",
                "Hi {{attendee_name}},\n\nSee you on {{event_date}} at {{event_location | the venue}}.\n\
                 Registration: {{registration_id}}",
            )],
        ),
        recipe(
            "Event Sold Out Alert",
            "Close registration and tell the events team when capacity is reached.",
            Category::Events,
            &["event.capacity.reached"],
            vec![
                status("event", "event_id", "sold_out"),
                slack("#events", "{{event_name}} reached capacity ({{capacity}} seats)"),
            ],
        ),
        // ------------------------------------------------------------------
        // Volunteers
        // ------------------------------------------------------------------
        recipe(
            "Volunteer Welcome",
            "Welcome new volunteers and hand them to the coordinator.",
            Category::Volunteers,
            &["volunteer.signed_up"],
            vec![
                email(
                    "volunteer_email",
                    "Thanks for volunteering, {{volunteer_name}}",
                    "Hi {{volunteer_name}},\n\nYou're signed up for {{opportunity_name}}.",
                ),
                tag("member", "member_id", "volunteer"),
                task(
                    "Orientation for {{volunteer_name}} ({{opportunity_name}})",
                    Some("coordinator_id"),
                    Some(5),
                ),
            ],
        ),
        with_filters(
            recipe(
                "Volunteer Milestone (100 Hours)",
                "Recognize volunteers who pass 100 logged hours.",
                Category::Volunteers,
                &["volunteer.hours.logged"],
                vec![
                    work_item(
                        "Recognize {{volunteer_name}} for {{total_hours}} volunteer hours",
                        None,
                        None,
                        Priority::Low,
                        Some(14),
                        "volunteer-100h-{{volunteer_id}}",
                    ),
                    tag("member", "member_id", "volunteer_100_hours"),
                ],
            ),
            vec![("total_hours", Condition::gte(100))],
        ),
        // ------------------------------------------------------------------
        // Compliance
        // ------------------------------------------------------------------
        with_filters(
            recipe(
                "Compliance Document Expiry",
                "Escalate documents expiring within 30 days to their owner.",
                Category::Compliance,
                &["compliance.document.expiring"],
                vec![
                    work_item(
                        "Renew {{document_name}} before {{expires_on}}",
                        None,
                        Some("owner_id"),
                        Priority::Urgent,
                        None,
                        "doc-expiry-{{document_id}}-{{expires_on}}",
                    ),
                    slack(
                        "#compliance",
                        "{{document_name}} expires in {{days_until_expiry}} days",
                    ),
                ],
            ),
            vec![("days_until_expiry", Condition::lte(30))],
        ),
        stopping(recipe(
            "Regulatory Filing Deadline",
            "Open a filing work item and route it to the compliance officer.",
            Category::Compliance,
            &["compliance.filing.due"],
            vec![
                work_item(
                    "File {{filing_name}} by {{due_date}}",
                    None,
                    Some("compliance_officer_id"),
                    Priority::Urgent,
                    None,
                    "filing-{{filing_id}}",
                ),
                Action::AssignReviewer {
                    entity_type: "compliance_filing".into(),
                    entity_id_path: "filing_id".into(),
                    reviewer_path: None,
                    reviewer_role: Some("compliance_officer".into()),
                },
            ],
        )),
        // ------------------------------------------------------------------
        // Board
        // ------------------------------------------------------------------
        recipe(
            "Board Meeting Packet",
            "Announce a board meeting and ask the secretary to assemble the packet.",
            Category::Board,
            &["board.meeting.scheduled"],
            vec![
                slack("#board", "Board meeting \"{{meeting_title}}\" scheduled for {{meeting_date}}"),
                task(
                    "Assemble board packet for {{meeting_title}}",
                    Some("secretary_id"),
                    Some(5),
                ),
            ],
        ),
        recipe(
            "Board Vote Requested",
            "Track a requested board vote until its deadline.",
            Category::Board,
            &["board.vote.requested"],
            vec![
                slack("#board", "Vote requested on \"{{motion_title}}\" (closes {{vote_deadline}})"),
                work_item(
                    "Collect votes: {{motion_title}}",
                    Some("Deadline {{vote_deadline}}"),
                    Some("secretary_id"),
                    Priority::High,
                    None,
                    "board-vote-{{motion_id}}",
                ),
            ],
        ),
    ]
}
