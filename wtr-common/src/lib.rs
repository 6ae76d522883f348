//! # WipeThatRecord Common Library
//!
//! Shared code for the WTR services:
//! - Database initialization, settings and repositories
//! - Entity models (leads, orders, products, analytics events, email jobs)
//! - Lead scoring and order pricing
//! - Event types (WtrEvent enum) and EventBus
//! - Configuration loading
//! - Admin request signing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod pricing;
pub mod scoring;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
