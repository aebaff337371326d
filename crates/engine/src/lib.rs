//! `engine` crate: recipe models, the built-in catalog, event matching,
//! templating, and the action executor.

pub mod models;
pub mod error;
pub mod filter;
pub mod template;
pub mod taxonomy;
pub mod seed;
pub mod catalog;
pub mod matcher;
pub mod resolve;
pub mod report;
pub mod executor;

pub use models::{Action, Category, Event, Recipe};
pub use error::EngineError;
pub use catalog::{Catalog, CatalogIssue};
pub use taxonomy::EventTaxonomy;
pub use matcher::matching;
pub use report::{ActionOutcome, ActionStatus, DispatchReport, RecipeRun, RunStatus};
pub use executor::{ActionExecutor, ExecutorConfig};
