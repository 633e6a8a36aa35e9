//! # Launchpad Database Crate
//!
//! Clients for the two databases the application writes to, plus the
//! tag-driven table migration both of them share.
//!
//! ## Public API
//!
//! - `Postgresql`: the relational store, backed by a `sqlx` pool.
//! - `ClickHouse`: the analytics store, reached over its HTTP interface.
//! - `DdlOptions`: derives `ENGINE`/`PRIMARY KEY`/`ORDER BY` from schema tags.
//! - `run_migration` and `MigrationTarget`: the create-or-alter policy.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod clickhouse;
pub mod ddl;
pub mod error;
pub mod migration;
pub mod postgres;

// Re-export the key components to create a clean, public-facing API.
pub use clickhouse::{ClickHouse, ClickHouseSession};
pub use ddl::{DdlOptions, build_table_options};
pub use error::DbError;
pub use migration::{
    Dialect, MigrationPolicy, MigrationStep, MigrationTarget, plan_merge_tree, plan_plain,
    run_migration,
};
pub use postgres::Postgresql;
pub use sqlx::PgPool;
