//! Remote document store contract and local adapters.
//!
//! # Responsibility
//! - Define the subscription + mutation surface the tracker talks to.
//! - Provide an in-process store (`MemoryDocumentStore`) and a SQLite-backed
//!   store (`SqliteDocumentStore`) implementing it.
//!
//! # Invariants
//! - Every subscription delivers the owner's full current document list,
//!   first right after subscribing and again after every change.
//! - Events carry the `SubscriptionKey` they were requested with, so late
//!   deliveries for an old session can be told apart.
//! - Dropping a `Subscription` stops further deliveries.

use crate::db::DbError;
use crate::model::patch::RecordPatch;
use crate::model::raw::RawRecord;
use crate::model::record::{Record, RecordId, RecordKind};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Sender;

mod hub;
pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Update,
    Delete,
    Subscribe,
}

impl StoreOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Subscribe => "subscribe",
        }
    }
}

impl Display for StoreOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a document store.
#[derive(Debug)]
pub enum StoreError {
    /// Store cannot be reached or its state is unusable.
    Unavailable(String),
    /// Store refused the operation.
    Rejected {
        op: StoreOp,
        id: Option<RecordId>,
        reason: String,
    },
    NotFound(RecordId),
    Db(DbError),
    Serialization(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::Rejected {
                op,
                id: Some(id),
                reason,
            } => write!(f, "store rejected {op} of {id}: {reason}"),
            Self::Rejected {
                op,
                id: None,
                reason,
            } => write!(f, "store rejected {op}: {reason}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(message) => write!(f, "invalid document body: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Identity of one subscription: which collection, whose documents, and
/// which session generation asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub kind: RecordKind,
    pub owner_id: String,
    pub generation: u64,
}

impl SubscriptionKey {
    pub fn new(kind: RecordKind, owner_id: impl Into<String>, generation: u64) -> Self {
        Self {
            kind,
            owner_id: owner_id.into(),
            generation,
        }
    }
}

#[derive(Debug)]
pub enum StorePayload {
    /// Full current document list for the subscription.
    Snapshot(Vec<RawRecord>),
    Error(StoreError),
}

/// One delivery on a subscription.
#[derive(Debug)]
pub struct StoreEvent {
    pub key: SubscriptionKey,
    pub payload: StorePayload,
}

/// Where a store pushes subscription events.
pub type EventSink = Sender<StoreEvent>;

/// Live subscription handle. Dropping it unsubscribes.
pub struct Subscription {
    key: SubscriptionKey,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(key: SubscriptionKey, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            key,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Document store consumed by the tracker.
///
/// Mutations are fire-and-confirm: the caller has already applied the
/// change locally and only needs success or an error back.
pub trait DocumentStore {
    /// Starts delivering snapshots for `key` into `sink`.
    fn subscribe(&self, key: SubscriptionKey, sink: EventSink) -> StoreResult<Subscription>;
    /// Persists a new document and returns the id it was stored under.
    fn create(&self, kind: RecordKind, record: &Record) -> StoreResult<RecordId>;
    /// Merges `patch` into an existing document.
    fn update(&self, kind: RecordKind, id: &RecordId, patch: &RecordPatch) -> StoreResult<()>;
    fn delete(&self, kind: RecordKind, id: &RecordId) -> StoreResult<()>;
}

/// Document body for `record`: its serialized fields without the id, which
/// stores keep in the envelope.
pub(crate) fn record_body(record: &Record) -> StoreResult<serde_json::Value> {
    let mut body = serde_json::to_value(record)?;
    if let Some(fields) = body.as_object_mut() {
        fields.remove("id");
    }
    Ok(body)
}

/// Merges a serialized patch into a document body. `null` clears a field.
pub(crate) fn merge_patch(body: &mut serde_json::Value, patch: &RecordPatch) -> StoreResult<()> {
    let changes = serde_json::to_value(patch)?;
    if !body.is_object() {
        *body = serde_json::Value::Object(serde_json::Map::new());
    }
    if let (Some(target), serde_json::Value::Object(changes)) = (body.as_object_mut(), changes) {
        target.extend(changes);
    }
    Ok(())
}
