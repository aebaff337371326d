//! `automation-recipes` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`   : start the API server.
//! - `migrate` : run pending database migrations.
//! - `seed`    : seed the built-in recipes for an organization.
//! - `recipes` : list the built-in recipes.
//! - `events`  : list every trigger event the catalog listens for.
//! - `check`   : validate the built-in catalog.
//! - `dispatch`: run an event file through the catalog with in-memory collaborators.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use effects::memory::InMemoryEffects;
use effects::Effects;
use engine::{ActionExecutor, Catalog, Category, Event, EventTaxonomy, ExecutorConfig};

#[derive(Parser)]
#[command(
    name = "automation-recipes",
    about = "Declarative automation recipes for nonprofit operations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ExecutorArgs {
    /// Retries for transient collaborator failures.
    #[arg(long, env = "AUTOMATION_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,
    /// Base back-off between retries, in milliseconds.
    #[arg(long, env = "AUTOMATION_RETRY_BASE_MS", default_value_t = 100)]
    retry_base_ms: u64,
    /// Recipes run at once for a single event.
    #[arg(long, env = "AUTOMATION_MAX_CONCURRENT_RECIPES", default_value_t = 4)]
    max_concurrent_recipes: usize,
}

impl ExecutorArgs {
    fn config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_ms),
            max_concurrent_recipes: self.max_concurrent_recipes,
            ..ExecutorConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "AUTOMATION_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        #[arg(long, env = "AUTOMATION_DB_MAX_CONNECTIONS", default_value_t = 10)]
        max_connections: u32,
        #[command(flatten)]
        executor: ExecutorArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Seed (or refresh) the built-in recipes for an organization.
    Seed {
        #[arg(long)]
        org: Uuid,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// List the built-in recipes.
    Recipes {
        /// Only show one category (donations, membership, grants, ...).
        #[arg(long)]
        category: Option<Category>,
        /// Print the recipes as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List every trigger event the catalog listens for.
    Events,
    /// Validate the built-in catalog against the event taxonomy.
    Check,
    /// Run an event JSON file through the catalog without touching a database.
    Dispatch {
        /// Path to a JSON event: `{"type": "...", "payload": {...}}`.
        path: PathBuf,
        #[arg(long)]
        org: Option<Uuid>,
        /// Resolve every action but perform none.
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        executor: ExecutorArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url, max_connections, executor } => {
            let pool = db::pool::create_pool(&database_url, max_connections)
                .await
                .context("failed to connect to database")?;
            let state = api::AppState {
                pool: pool.clone(),
                catalog: Arc::new(Catalog::builtin()),
                executor: Arc::new(ActionExecutor::new(db::pg_effects(pool), executor.config())),
            };
            info!("Starting API server on {bind}");
            api::serve(bind, state).await?;
        }
        Command::Migrate { database_url } => {
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Seed { org, database_url } => {
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            let catalog = Catalog::builtin();
            let summary = db::repository::rules::seed_recipes(&pool, org, catalog.recipes()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Recipes { category, json } => {
            let catalog = Catalog::builtin();
            let recipes: Vec<_> = match category {
                Some(category) => catalog.recipes_by_category(category),
                None => catalog.recipes().iter().collect(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&recipes)?);
            } else {
                for recipe in recipes {
                    let state = if recipe.is_active { "" } else { " (inactive)" };
                    println!(
                        "{:<12} {}{}  [{}]",
                        recipe.category.as_str(),
                        recipe.name,
                        state,
                        recipe.trigger_events.join(", ")
                    );
                }
            }
        }
        Command::Events => {
            for event in Catalog::builtin().all_trigger_events() {
                println!("{event}");
            }
        }
        Command::Check => {
            let catalog = Catalog::builtin();
            let issues = catalog.validate_against(&EventTaxonomy::builtin());
            if !issues.is_empty() {
                for issue in &issues {
                    eprintln!("{issue}");
                }
                bail!("catalog has {} issue(s)", issues.len());
            }
            println!("catalog OK: {} recipe(s)", catalog.len());
        }
        Command::Dispatch { path, org, dry_run, executor } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let event: Event = serde_json::from_str(&content)
                .with_context(|| format!("invalid event JSON in {}", path.display()))?;

            let effects = Arc::new(InMemoryEffects::new());
            let exec = ActionExecutor::new(Effects::from_shared(effects.clone()), executor.config());
            let ctx = event.context(org.unwrap_or_else(Uuid::new_v4), None, dry_run);

            let report = exec.dispatch(&Catalog::builtin(), &event, &ctx).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            info!(
                "{} recipe(s) matched, {} effect(s) recorded",
                report.runs.len(),
                effects.call_count()
            );
        }
    }

    Ok(())
}
