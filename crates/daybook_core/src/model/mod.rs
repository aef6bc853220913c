//! Domain model for task and journal records.
//!
//! # Responsibility
//! - Define the canonical record shape held in memory by reconcilers.
//! - Define the loose ingestion shape accepted from remote documents.
//! - Define the partial update payload used by local mutations.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Tasks and journal entries share one record shape; kind-specific
//!   fields are optional.

pub mod patch;
pub mod raw;
pub mod record;
