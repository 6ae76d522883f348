//! Shared API primitives

pub mod auth;
