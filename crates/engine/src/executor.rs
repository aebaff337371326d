//! Recipe execution engine.
//!
//! `ActionExecutor` is the central orchestrator:
//! 1. Matches the event against the catalog.
//! 2. Runs every matched recipe; recipes for one event are independent and
//!    run concurrently (bounded by `max_concurrent_recipes`).
//! 3. Within a recipe, resolves and performs actions strictly in order.
//! 4. Handles `EffectError::Retryable` (up to `max_retries`) and
//!    `EffectError::Fatal` (fail the action immediately).
//! 5. Honors `stop_on_error`: abort the rest of the recipe, or carry on and
//!    collect failures.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};

use effects::{EffectError, Effects, ExecutionContext, WorkItemOutcome};

use crate::catalog::Catalog;
use crate::matcher::matching;
use crate::models::{Action, Event, Recipe};
use crate::report::{ActionOutcome, ActionStatus, DispatchReport, RecipeRun, RunStatus};
use crate::resolve::{resolve_action, ResolvedAction};
use crate::template::MissingPolicy;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of times a retryable collaborator failure is retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
    /// Upper bound on recipes running at once for a single event.
    pub max_concurrent_recipes: usize,
    /// What unresolved placeholders in text templates render as.
    pub missing_policy: MissingPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            max_concurrent_recipes: 4,
            missing_policy: MissingPolicy::Blank,
        }
    }
}

// ---------------------------------------------------------------------------
// ActionExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator that dispatches one event at a time.
///
/// Holds no per-event state, so one executor can serve many events
/// concurrently.
pub struct ActionExecutor {
    effects: Effects,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(effects: Effects, config: ExecutorConfig) -> Self {
        Self { effects, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Match `event` against `catalog` and run every matching recipe.
    ///
    /// Never fails as a whole: every action failure is recorded in the
    /// returned report.
    #[instrument(skip_all, fields(event_type = %event.event_type, event_id = %event.id, org_id = %ctx.org_id))]
    pub async fn dispatch(
        &self,
        catalog: &Catalog,
        event: &Event,
        ctx: &ExecutionContext,
    ) -> DispatchReport {
        let dispatched_at = Utc::now();
        let matched = matching(catalog, event);
        info!("{} recipe(s) matched", matched.len());

        let pending: Vec<_> = matched
            .into_iter()
            .map(|recipe| self.run_recipe(recipe, event, ctx))
            .collect();
        let runs: Vec<RecipeRun> = stream::iter(pending)
            .buffered(self.config.max_concurrent_recipes.max(1))
            .collect()
            .await;

        DispatchReport {
            event_id: event.id,
            event_type: event.event_type.clone(),
            org_id: ctx.org_id,
            dry_run: ctx.dry_run,
            dispatched_at,
            runs,
        }
    }

    /// Run one recipe's actions in declared order.
    #[instrument(skip_all, fields(recipe = %recipe.name))]
    pub async fn run_recipe(
        &self,
        recipe: &Recipe,
        event: &Event,
        ctx: &ExecutionContext,
    ) -> RecipeRun {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(recipe.actions.len());
        let mut failed = false;
        let mut aborted = false;

        for (index, action) in recipe.actions.iter().enumerate() {
            if aborted {
                outcomes.push(ActionOutcome {
                    index,
                    kind: action.kind().to_owned(),
                    status: ActionStatus::Skipped {
                        reason: "aborted after an earlier action failed".into(),
                    },
                    resolved: None,
                });
                continue;
            }

            let outcome = self.run_action(recipe, index, action, event, ctx).await;
            if outcome.is_failure() {
                failed = true;
                if recipe.stop_on_error {
                    aborted = true;
                    error!(
                        "action #{} ({}) failed; stop_on_error set, skipping {} remaining action(s)",
                        index,
                        action.kind(),
                        recipe.actions.len() - index - 1
                    );
                }
            }
            outcomes.push(outcome);
        }

        let status = match (failed, aborted) {
            (_, true) => RunStatus::Aborted,
            (true, false) => RunStatus::CompletedWithErrors,
            (false, false) => RunStatus::Succeeded,
        };
        info!("recipe finished: {status}");

        RecipeRun {
            recipe: recipe.name.clone(),
            category: recipe.category,
            status,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    async fn run_action(
        &self,
        recipe: &Recipe,
        index: usize,
        action: &Action,
        event: &Event,
        ctx: &ExecutionContext,
    ) -> ActionOutcome {
        let kind = action.kind();
        let mut outcome = ActionOutcome {
            index,
            kind: kind.to_owned(),
            status: ActionStatus::Skipped { reason: String::new() },
            resolved: None,
        };

        let resolved = match resolve_action(action, event, &recipe.name, self.config.missing_policy) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("action #{} ({}) could not be resolved: {}", index, kind, e);
                outcome.status = failed(&e);
                return outcome;
            }
        };

        outcome.status = if ctx.dry_run {
            ActionStatus::Skipped { reason: "dry run".into() }
        } else {
            match self.perform(kind, &resolved, ctx).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("action #{} ({}) failed: {}", index, kind, e);
                    failed(&e)
                }
            }
        };
        outcome.resolved = Some(resolved);
        outcome
    }

    /// Hand a resolved action to its collaborator.
    async fn perform(
        &self,
        kind: &'static str,
        resolved: &ResolvedAction,
        ctx: &ExecutionContext,
    ) -> Result<ActionStatus, EngineError> {
        let fx = &self.effects;
        let succeeded = |reference: Option<String>| ActionStatus::Succeeded { reference };

        match resolved {
            ResolvedAction::SendEmail(message) => self
                .with_retry(kind, move || fx.mailer.send_email(ctx, message.clone()))
                .await
                .map(|id| succeeded(Some(id))),

            ResolvedAction::CreateWorkItem(item) => {
                let outcome = self
                    .with_retry(kind, move || fx.work_items.create_work_item(ctx, item.clone()))
                    .await?;
                Ok(match outcome {
                    WorkItemOutcome::Created(id) => succeeded(Some(id.to_string())),
                    WorkItemOutcome::Existing(id) => {
                        info!(
                            "work item for dedupe key {:?} already exists ({}), not creating another",
                            item.dedupe_key, id
                        );
                        ActionStatus::Deduplicated { work_item_id: id }
                    }
                })
            }

            ResolvedAction::CreateTask(task) => self
                .with_retry(kind, move || fx.work_items.create_task(ctx, task.clone()))
                .await
                .map(|id| succeeded(Some(id.to_string()))),

            ResolvedAction::SlackNotify(message) => self
                .with_retry(kind, move || fx.chat.notify(ctx, message.clone()))
                .await
                .map(|()| succeeded(None)),

            ResolvedAction::AddTag { entity, tag } => self
                .with_retry(kind, move || fx.entities.add_tag(ctx, entity, tag))
                .await
                .map(|()| succeeded(None)),

            ResolvedAction::UpdateField { entity, field, value } => self
                .with_retry(kind, move || fx.entities.update_field(ctx, entity, field, value.clone()))
                .await
                .map(|()| succeeded(None)),

            ResolvedAction::UpdateStatus { entity, status } => self
                .with_retry(kind, move || fx.entities.update_status(ctx, entity, status))
                .await
                .map(|()| succeeded(None)),

            ResolvedAction::AssignReviewer { entity, reviewer } => self
                .with_retry(kind, move || fx.entities.assign_reviewer(ctx, entity, reviewer))
                .await
                .map(|()| succeeded(None)),

            ResolvedAction::CreatePaymentRequest(request) => self
                .with_retry(kind, move || fx.payments.create_payment_request(ctx, request.clone()))
                .await
                .map(|id| succeeded(Some(id.to_string()))),
        }
    }

    // -----------------------------------------------------------------------
    // Internal: call a collaborator with retry logic.
    // -----------------------------------------------------------------------

    async fn with_retry<T, F, Fut>(&self, kind: &'static str, mut call: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EffectError>>,
    {
        let mut attempts = 0u32;

        loop {
            match call().await {
                Ok(value) => return Ok(value),

                Err(source @ EffectError::Fatal(_)) => {
                    return Err(EngineError::Effect { kind, source });
                }

                Err(source @ EffectError::Retryable(_)) => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(EngineError::Effect { kind, source });
                    }

                    let delay = backoff(self.config.retry_base_delay, attempts);

                    warn!(
                        "{} retryable error (attempt {}/{}), retrying in {:?}: {}",
                        kind, attempts, self.config.max_retries, delay, source
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Longest wait between two attempts, however many retries are configured.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`,
/// capped at [`MAX_RETRY_DELAY`].
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_RETRY_DELAY)
}

fn failed(e: &EngineError) -> ActionStatus {
    ActionStatus::Failed {
        reason: e.to_string(),
        retriable: e.is_retryable(),
    }
}
