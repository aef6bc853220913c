//! Authoritative per-kind collection with an optimistic overlay.
//!
//! # Responsibility
//! - Replace the collection with each full snapshot from the store.
//! - Apply local insert/update/delete immediately, before the store confirms.
//! - Keep unconfirmed local writes alive across stale snapshots for a
//!   bounded number of deliveries.
//! - Notify observers after every change.
//!
//! # Invariants
//! - At most one record per id; every record is normalized.
//! - A pending write is dropped once a snapshot confirms it, once the
//!   presentation layer rolls it back, or once it has survived
//!   `pending_snapshot_limit` snapshots unconfirmed.
//! - Observers only ever see a fully applied collection.

use crate::config::OverlayConfig;
use crate::model::patch::RecordPatch;
use crate::model::raw::RawRecord;
use crate::model::record::{Record, RecordId, RecordKind, TaskStatus};
use crate::reconcile::collection::RecordCollection;
use crate::reconcile::normalize::{apply_patch, normalize};
use crate::reconcile::resolve::{resolve_counted, supersedes};
use crate::reconcile::{ReconcileError, ReconcileResult};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Kind of optimistic write waiting for store confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Insert,
    Update,
    Delete,
}

/// Overlay entry for one record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub op: PendingOp,
    /// Local version to keep visible; `None` for deletes.
    pub local: Option<Record>,
    /// Last version known to the store, restored on rollback; `None` when the
    /// record only exists locally.
    pub remote: Option<Record>,
    /// `updated_at` of the local version, or the delete time.
    pub stamped_at: i64,
    /// Snapshots seen since the write without confirming it.
    pub snapshots_seen: u32,
}

/// Reason a collection changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Snapshot,
    LocalInsert,
    LocalUpdate,
    LocalDelete,
    Rekey,
    Rollback,
    Cleared,
}

/// Notification sent to observers after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChange {
    pub kind: RecordKind,
    pub cause: ChangeCause,
    /// Monotonic per-reconciler change counter.
    pub revision: u64,
    pub len: usize,
}

/// Receiver of recomputation signals (stats caches, views, UI).
pub trait CollectionObserver: Send + Sync {
    fn collection_changed(&self, change: &CollectionChange);
}

/// Summary of one `apply_snapshot` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub received: usize,
    /// Collection size after the snapshot and overlay were applied.
    pub applied: usize,
    pub duplicates_folded: usize,
    /// Records that needed at least one normalization fallback.
    pub degraded: usize,
    pub confirmed: usize,
    pub still_pending: usize,
    pub expired: usize,
}

/// Result of a local mutation: the new record and the effective patch to
/// send to the store (cleaned, with derived fields and `updated_at` stamped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChange {
    pub record: Record,
    pub patch: RecordPatch,
}

enum Settlement {
    Confirmed,
    Retained(PendingWrite),
    Expired,
}

/// Single owner of one record kind's collection.
pub struct Reconciler {
    kind: RecordKind,
    overlay: OverlayConfig,
    collection: RecordCollection,
    pending: HashMap<RecordId, PendingWrite>,
    observers: Vec<Arc<dyn CollectionObserver>>,
    revision: u64,
}

impl Reconciler {
    pub fn new(kind: RecordKind, overlay: OverlayConfig) -> Self {
        Self {
            kind,
            overlay,
            collection: RecordCollection::new(),
            pending: HashMap::new(),
            observers: Vec::new(),
            revision: 0,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        self.collection.as_slice()
    }

    pub fn collection(&self) -> &RecordCollection {
        &self.collection
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.collection.get(id)
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pending(&self, id: &RecordId) -> Option<&PendingWrite> {
        self.pending.get(id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Registers an observer for change notifications.
    pub fn observe(&mut self, observer: Arc<dyn CollectionObserver>) {
        self.observers.push(observer);
    }

    /// Replaces the collection with a full store snapshot.
    ///
    /// Each raw record is normalized, duplicates are folded, and pending
    /// local writes are settled against the result (see module invariants).
    pub fn apply_snapshot(&mut self, raws: &[RawRecord], now_ms: i64) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome {
            received: raws.len(),
            ..SnapshotOutcome::default()
        };

        let mut normalized = Vec::with_capacity(raws.len());
        for raw in raws {
            let result = normalize(raw, self.kind, now_ms);
            if !result.is_clean() {
                outcome.degraded += 1;
                for warning in &result.warnings {
                    warn!(
                        "event=record_normalize module=reconcile status=degraded kind={} id={} field={} reason={}",
                        self.kind.as_str(),
                        result.record.id,
                        warning.field,
                        warning.reason
                    );
                }
            }
            normalized.push(result.record);
        }

        let resolution = resolve_counted(normalized);
        outcome.duplicates_folded = resolution.duplicates_folded;
        let mut next = resolution.records;

        let previous = std::mem::take(&mut self.collection);
        let mut unsettled = std::mem::take(&mut self.pending);
        let mut retained = HashMap::new();

        // Upserts settle in previous collection order so locally-only records
        // keep a stable position; deletes have no position and go last.
        let mut order: Vec<RecordId> = previous
            .ids()
            .filter(|id| unsettled.contains_key(*id))
            .cloned()
            .collect();
        let mut rest: Vec<RecordId> = unsettled
            .keys()
            .filter(|id| !previous.contains(id))
            .cloned()
            .collect();
        rest.sort();
        order.extend(rest);

        for id in order {
            let Some(write) = unsettled.remove(&id) else {
                continue;
            };
            match self.settle(&mut next, &id, write) {
                Settlement::Confirmed => outcome.confirmed += 1,
                Settlement::Expired => {
                    outcome.expired += 1;
                    debug!(
                        "event=pending_expire module=reconcile status=ok kind={} id={}",
                        self.kind.as_str(),
                        id
                    );
                }
                Settlement::Retained(write) => {
                    retained.insert(id, write);
                }
            }
        }

        outcome.still_pending = retained.len();
        outcome.applied = next.len();
        self.collection = next;
        self.pending = retained;

        info!(
            "event=snapshot_apply module=reconcile status=ok kind={} received={} applied={} folded={} degraded={} confirmed={} pending={} expired={}",
            self.kind.as_str(),
            outcome.received,
            outcome.applied,
            outcome.duplicates_folded,
            outcome.degraded,
            outcome.confirmed,
            outcome.still_pending,
            outcome.expired
        );
        self.notify(ChangeCause::Snapshot);
        outcome
    }

    fn settle(&self, next: &mut RecordCollection, id: &RecordId, mut write: PendingWrite) -> Settlement {
        match write.local.clone() {
            Some(local) => {
                if let Some(remote) = next.get(id) {
                    if remote.updated_at >= write.stamped_at {
                        return Settlement::Confirmed;
                    }
                }
                write.snapshots_seen += 1;
                if write.snapshots_seen > self.overlay.pending_snapshot_limit {
                    return Settlement::Expired;
                }
                let keep_local = next.get(id).map_or(true, |remote| supersedes(&local, remote));
                if keep_local {
                    next.upsert(local);
                }
                Settlement::Retained(write)
            }
            None => {
                if !next.contains(id) {
                    return Settlement::Confirmed;
                }
                write.snapshots_seen += 1;
                if write.snapshots_seen > self.overlay.pending_snapshot_limit {
                    return Settlement::Expired;
                }
                next.remove(id);
                Settlement::Retained(write)
            }
        }
    }

    /// Adds a new record built from `draft` under a fresh provisional id.
    pub fn apply_local_insert(&mut self, draft: &RecordPatch, owner_id: &str, now_ms: i64) -> LocalChange {
        let mut id = RecordId::generate();
        while self.collection.contains(&id) || self.pending.contains_key(&id) {
            id = RecordId::generate();
        }

        let mut effective = draft.clone();
        if effective.status == Some(TaskStatus::Completed) && effective.completed_at.is_none() {
            effective.completed_at = Some(Some(now_ms));
        }
        effective.updated_at = Some(now_ms);

        let mut record = Record::blank(id.clone(), self.kind, owner_id, now_ms);
        apply_patch(&mut record, &effective);
        mirror_cleaned(&mut effective, &record);
        self.collection.upsert(record.clone());
        self.pending.insert(
            id.clone(),
            PendingWrite {
                op: PendingOp::Insert,
                local: Some(record.clone()),
                remote: None,
                stamped_at: record.updated_at,
                snapshots_seen: 0,
            },
        );

        info!(
            "event=local_insert module=reconcile status=ok kind={} id={}",
            self.kind.as_str(),
            id
        );
        self.notify(ChangeCause::LocalInsert);
        LocalChange {
            record,
            patch: effective,
        }
    }

    /// Merges `patch` into an existing record and stamps `updated_at`.
    ///
    /// A status change into `Completed` sets `completed_at`; leaving it
    /// clears `completed_at`, unless the patch sets it explicitly.
    pub fn apply_local_update(
        &mut self,
        id: &RecordId,
        patch: &RecordPatch,
        now_ms: i64,
    ) -> ReconcileResult<LocalChange> {
        let current = self
            .collection
            .get(id)
            .cloned()
            .ok_or_else(|| ReconcileError::NotFound(id.clone()))?;

        let mut effective = patch.clone();
        if let (Some(status), None) = (patch.status, patch.completed_at) {
            if status.is_completed() && !current.is_completed() {
                effective.completed_at = Some(Some(now_ms));
            } else if !status.is_completed() && current.is_completed() {
                effective.completed_at = Some(None);
            }
        }

        let mut record = current.clone();
        apply_patch(&mut record, &effective);
        mirror_cleaned(&mut effective, &record);
        record.updated_at = now_ms
            .max(current.updated_at.saturating_add(1))
            .max(record.created_at);
        effective.updated_at = Some(record.updated_at);
        self.collection.upsert(record.clone());

        let write = match self.pending.remove(id) {
            Some(existing) => PendingWrite {
                op: existing.op,
                local: Some(record.clone()),
                remote: existing.remote,
                stamped_at: record.updated_at,
                snapshots_seen: 0,
            },
            None => PendingWrite {
                op: PendingOp::Update,
                local: Some(record.clone()),
                remote: Some(current),
                stamped_at: record.updated_at,
                snapshots_seen: 0,
            },
        };
        self.pending.insert(id.clone(), write);

        info!(
            "event=local_update module=reconcile status=ok kind={} id={}",
            self.kind.as_str(),
            id
        );
        self.notify(ChangeCause::LocalUpdate);
        Ok(LocalChange {
            record,
            patch: effective,
        })
    }

    /// Removes a record. Deleting an absent id is `NotFound`.
    pub fn apply_local_delete(&mut self, id: &RecordId, now_ms: i64) -> ReconcileResult<Record> {
        let removed = self
            .collection
            .remove(id)
            .ok_or_else(|| ReconcileError::NotFound(id.clone()))?;

        let remote = match self.pending.remove(id) {
            Some(existing) => existing.remote,
            None => Some(removed.clone()),
        };
        self.pending.insert(
            id.clone(),
            PendingWrite {
                op: PendingOp::Delete,
                local: None,
                remote,
                stamped_at: now_ms,
                snapshots_seen: 0,
            },
        );

        info!(
            "event=local_delete module=reconcile status=ok kind={} id={}",
            self.kind.as_str(),
            id
        );
        self.notify(ChangeCause::LocalDelete);
        Ok(removed)
    }

    /// Re-keys an optimistic insert to the id the store assigned.
    pub fn confirm_insert(&mut self, provisional: &RecordId, confirmed: &RecordId) -> ReconcileResult<()> {
        if provisional == confirmed {
            return Ok(());
        }
        if self.collection.contains(confirmed) {
            return Err(ReconcileError::DuplicateId(confirmed.clone()));
        }
        if !self.collection.rekey(provisional, confirmed) {
            return Err(ReconcileError::NotFound(provisional.clone()));
        }
        if let Some(mut write) = self.pending.remove(provisional) {
            if let Some(local) = write.local.as_mut() {
                local.id = confirmed.clone();
            }
            self.pending.insert(confirmed.clone(), write);
        }

        info!(
            "event=insert_rekey module=reconcile status=ok kind={} from={} to={}",
            self.kind.as_str(),
            provisional,
            confirmed
        );
        self.notify(ChangeCause::Rekey);
        Ok(())
    }

    /// Discards the pending local write for `id` and restores the last
    /// store-known version, or removes the record if it only existed locally.
    ///
    /// Returns the restored record.
    pub fn rollback(&mut self, id: &RecordId) -> ReconcileResult<Option<Record>> {
        let write = self
            .pending
            .remove(id)
            .ok_or_else(|| ReconcileError::NoPendingWrite(id.clone()))?;

        let restored = match write.remote {
            Some(remote) => {
                self.collection.upsert(remote.clone());
                Some(remote)
            }
            None => {
                self.collection.remove(id);
                None
            }
        };

        info!(
            "event=local_rollback module=reconcile status=ok kind={} id={}",
            self.kind.as_str(),
            id
        );
        self.notify(ChangeCause::Rollback);
        Ok(restored)
    }

    /// Drops all records and pending writes (sign-out).
    pub fn clear(&mut self) {
        self.collection.clear();
        self.pending.clear();
        self.notify(ChangeCause::Cleared);
    }

    fn notify(&mut self, cause: ChangeCause) {
        self.revision += 1;
        let change = CollectionChange {
            kind: self.kind,
            cause,
            revision: self.revision,
            len: self.collection.len(),
        };
        for observer in &self.observers {
            observer.collection_changed(&change);
        }
    }
}

/// Copies the cleaned values of every field `patch` sets back from `record`.
fn mirror_cleaned(patch: &mut RecordPatch, record: &Record) {
    if patch.name.is_some() {
        patch.name = Some(record.name.clone());
    }
    if patch.tags.is_some() {
        patch.tags = Some(record.tags.clone());
    }
    if patch.progress.is_some() {
        patch.progress = Some(record.progress);
    }
}
