//! Duplicate folding with last-writer-wins.
//!
//! # Invariants
//! - Output holds exactly one record per distinct input id.
//! - Output order is the order of each id's first occurrence.
//! - Strictly newer `updated_at` wins; on a tie a real name beats the
//!   normalizer placeholder; otherwise the retained record stays.

use crate::model::record::Record;
use crate::reconcile::collection::RecordCollection;
use std::cmp::Ordering;

/// Result of one resolve pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub records: RecordCollection,
    /// Number of input records discarded or replaced as duplicates.
    pub duplicates_folded: usize,
}

/// Folds `records` into one record per id.
pub fn resolve(records: impl IntoIterator<Item = Record>) -> RecordCollection {
    resolve_counted(records).records
}

/// Like [`resolve`], also counting folded duplicates.
pub fn resolve_counted(records: impl IntoIterator<Item = Record>) -> Resolution {
    let mut resolution = Resolution::default();
    for incoming in records {
        let keep_incoming = match resolution.records.get(&incoming.id) {
            None => true,
            Some(retained) => {
                resolution.duplicates_folded += 1;
                supersedes(&incoming, retained)
            }
        };
        if keep_incoming {
            resolution.records.upsert(incoming);
        }
    }
    resolution
}

/// Returns whether `incoming` should replace `retained` for the same id.
pub fn supersedes(incoming: &Record, retained: &Record) -> bool {
    match incoming.updated_at.cmp(&retained.updated_at) {
        Ordering::Greater => true,
        Ordering::Equal => retained.has_placeholder_name() && !incoming.has_placeholder_name(),
        Ordering::Less => false,
    }
}
