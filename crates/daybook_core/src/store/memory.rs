//! In-process document store.
//!
//! Behaves like a hosted document database seen from one client: writes are
//! applied immediately and every subscriber of the touched collection gets a
//! fresh full snapshot. Test hooks can inject failures, push malformed or
//! duplicate documents, and raise subscription errors.

use super::hub::SubscriberHub;
use super::{
    merge_patch, record_body, DocumentStore, EventSink, StoreError, StoreOp, StorePayload,
    StoreResult, Subscription, SubscriptionKey,
};
use crate::model::patch::RecordPatch;
use crate::model::raw::RawRecord;
use crate::model::record::{Record, RecordId, RecordKind};
use crate::reconcile::normalize::parse_timestamp;
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredDocument {
    kind: RecordKind,
    id: String,
    owner_id: String,
    body: Value,
}

impl StoredDocument {
    fn created_at(&self) -> i64 {
        self.body
            .get("createdAt")
            .and_then(parse_timestamp)
            .unwrap_or_default()
    }

    fn to_raw(&self) -> RawRecord {
        RawRecord::from_document(self.id.clone(), self.body.clone())
    }
}

#[derive(Default)]
struct MemoryState {
    documents: Vec<StoredDocument>,
    hub: SubscriberHub,
    failures: HashMap<StoreOp, String>,
    server_ids: bool,
    next_server_id: u64,
}

impl MemoryState {
    fn take_failure(&mut self, op: StoreOp, id: Option<&RecordId>) -> StoreResult<()> {
        match self.failures.remove(&op) {
            Some(reason) => Err(StoreError::Rejected {
                op,
                id: id.cloned(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Owner's documents of `kind`, newest first.
    fn snapshot(&self, kind: RecordKind, owner_id: &str) -> Vec<RawRecord> {
        let mut documents: Vec<&StoredDocument> = self
            .documents
            .iter()
            .filter(|doc| doc.kind == kind && doc.owner_id == owner_id)
            .collect();
        documents.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        documents.into_iter().map(StoredDocument::to_raw).collect()
    }

    fn broadcast(&mut self, kind: RecordKind, owner_id: &str) {
        let snapshot = self.snapshot(kind, owner_id);
        let delivered = self
            .hub
            .publish(kind, owner_id, || StorePayload::Snapshot(snapshot.clone()));
        debug!(
            "event=snapshot_publish module=store status=ok store=memory kind={} documents={} delivered={}",
            kind.as_str(),
            snapshot.len(),
            delivered
        );
    }
}

/// Shared, cloneable in-memory store. Clones see the same documents.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that ignores the client id on create and assigns its own.
    pub fn with_server_ids() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                server_ids: true,
                ..MemoryState::default()
            })),
        }
    }

    /// Appends a document body as-is, bypassing all checks.
    ///
    /// Duplicate ids and malformed bodies are kept, as a legacy or
    /// multi-writer database would, and subscribers are notified.
    pub fn insert_raw(
        &self,
        kind: RecordKind,
        owner_id: &str,
        id: &str,
        body: Value,
    ) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.documents.push(StoredDocument {
            kind,
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            body,
        });
        state.broadcast(kind, owner_id);
        Ok(())
    }

    /// Makes the next `op` call fail with `reason`.
    pub fn fail_next(&self, op: StoreOp, reason: &str) -> StoreResult<()> {
        self.lock()?.failures.insert(op, reason.to_string());
        Ok(())
    }

    /// Delivers a subscription error to every subscriber of `kind` for `owner_id`.
    pub fn emit_error(&self, kind: RecordKind, owner_id: &str, message: &str) -> StoreResult<usize> {
        let mut state = self.lock()?;
        Ok(state.hub.publish(kind, owner_id, || {
            StorePayload::Error(StoreError::Unavailable(message.to_string()))
        }))
    }

    /// All stored documents of `kind`, in insertion order, for inspection.
    pub fn documents(&self, kind: RecordKind) -> StoreResult<Vec<RawRecord>> {
        Ok(self
            .lock()?
            .documents
            .iter()
            .filter(|doc| doc.kind == kind)
            .map(StoredDocument::to_raw)
            .collect())
    }

    pub fn subscriber_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.hub.len())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn subscribe(&self, key: SubscriptionKey, sink: EventSink) -> StoreResult<Subscription> {
        let mut state = self.lock()?;
        state.take_failure(StoreOp::Subscribe, None)?;

        let snapshot = state.snapshot(key.kind, &key.owner_id);
        let token = state.hub.add(key.clone(), sink);
        state.hub.send_to(token, StorePayload::Snapshot(snapshot));
        info!(
            "event=store_subscribe module=store status=ok store=memory kind={} generation={}",
            key.kind.as_str(),
            key.generation
        );

        let shared = Arc::downgrade(&self.state);
        Ok(Subscription::new(key, move || {
            if let Some(shared) = shared.upgrade() {
                if let Ok(mut state) = shared.lock() {
                    state.hub.remove(token);
                }
            }
        }))
    }

    fn create(&self, kind: RecordKind, record: &Record) -> StoreResult<RecordId> {
        let mut state = self.lock()?;
        state.take_failure(StoreOp::Create, Some(&record.id))?;

        let id = if state.server_ids {
            state.next_server_id += 1;
            format!("srv-{}", state.next_server_id)
        } else {
            record.id.as_str().to_string()
        };
        if state
            .documents
            .iter()
            .any(|doc| doc.kind == kind && doc.id == id)
        {
            return Err(StoreError::Rejected {
                op: StoreOp::Create,
                id: Some(RecordId::new(id)),
                reason: "document already exists".to_string(),
            });
        }

        state.documents.push(StoredDocument {
            kind,
            id: id.clone(),
            owner_id: record.owner_id.clone(),
            body: record_body(record)?,
        });
        state.broadcast(kind, &record.owner_id);
        Ok(RecordId::new(id))
    }

    fn update(&self, kind: RecordKind, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.take_failure(StoreOp::Update, Some(id))?;

        let document = state
            .documents
            .iter_mut()
            .find(|doc| doc.kind == kind && doc.id == id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        merge_patch(&mut document.body, patch)?;
        let owner_id = document.owner_id.clone();
        state.broadcast(kind, &owner_id);
        Ok(())
    }

    fn delete(&self, kind: RecordKind, id: &RecordId) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.take_failure(StoreOp::Delete, Some(id))?;

        let owner_id = state
            .documents
            .iter()
            .find(|doc| doc.kind == kind && doc.id == id.as_str())
            .map(|doc| doc.owner_id.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        state
            .documents
            .retain(|doc| !(doc.kind == kind && doc.id == id.as_str()));
        state.broadcast(kind, &owner_id);
        Ok(())
    }
}
