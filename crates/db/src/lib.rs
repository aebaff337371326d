//! `db` crate: Postgres persistence for the automation engine.
//!
//! Provides a connection pool, typed row structs, repository functions for
//! every table in the automation schema, and the Postgres-backed
//! collaborator stores the executor writes through.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;
pub mod stores;

pub use pool::DbPool;
pub use error::DbError;
pub use stores::{pg_effects, PgOutbox, PgWorkItemStore};
