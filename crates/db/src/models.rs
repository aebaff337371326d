//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models; they carry no domain behaviour.
//! Domain types live in the `engine` and `effects` crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// automation_rules
// ---------------------------------------------------------------------------

/// A recipe seeded for one organization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AutomationRuleRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub category: String,
    pub trigger_events: Vec<String>,
    /// Full JSON recipe (filters, actions, flags).
    pub definition: serde_json::Value,
    pub is_active: bool,
    /// Index of the recipe in the catalog it was seeded from.
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Counts returned by a seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub inserted: usize,
    pub updated: usize,
}

// ---------------------------------------------------------------------------
// automation_outbox
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutboxRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub event_id: Uuid,
    /// Action kind, e.g. `send_email`.
    pub effect: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// automation_runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AutomationRunRow {
    pub id: Uuid,
    pub org_id: Uuid,
    pub event_id: Uuid,
    pub event_type: String,
    pub recipe: String,
    pub status: String,
    pub dry_run: bool,
    /// Serialized `Vec<ActionOutcome>`.
    pub outcomes: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
