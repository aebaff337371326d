//! Repository functions: one function per database operation.
//!
//! Every function takes a `&PgPool` and returns a `Result<T, DbError>`.
//! No business logic: callers hand in already-built domain values.

pub mod rules;
pub mod work_items;
pub mod outbox;
pub mod runs;
