//! Core data models for the migration engine.
//!
//! These are transient, request-scoped values. Listing entries serialize as
//! camelCase JSON via `serde`; nothing here is persisted.

pub mod descriptor;
pub mod transfer;
