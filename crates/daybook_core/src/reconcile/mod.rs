//! Client-side reconciliation of remote snapshots and local writes.
//!
//! # Responsibility
//! - Sanitize incoming records (`normalize`).
//! - Fold duplicate ids with last-writer-wins (`resolve`).
//! - Own the authoritative per-kind collection and its optimistic overlay
//!   (`Reconciler`).
//!
//! # Invariants
//! - A collection never holds two records with the same id.
//! - Every stored record went through normalization.
//! - Snapshot application is total: it never fails or half-applies.

use crate::model::record::RecordId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection;
pub mod normalize;
pub mod reconciler;
pub mod resolve;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised by local mutations on a reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// No record with this id is in the collection.
    NotFound(RecordId),
    /// Re-keying would collide with an existing record.
    DuplicateId(RecordId),
    /// Rollback requested for a record without a pending local write.
    NoPendingWrite(RecordId),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::DuplicateId(id) => write!(f, "record id already present: {id}"),
            Self::NoPendingWrite(id) => write!(f, "no pending local write for record: {id}"),
        }
    }
}

impl Error for ReconcileError {}
