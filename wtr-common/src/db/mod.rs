//! Database initialization, settings and repositories
//!
//! Repository functions take an explicit `&SqlitePool`; callers own the pool
//! and pass it down.

pub mod analytics;
pub mod email_jobs;
pub mod init;
pub mod leads;
pub mod migrations;
pub mod orders;
pub mod products;
pub mod schema_sync;
pub mod settings;
pub mod stats;
pub mod table_schemas;

pub use init::init_database;
