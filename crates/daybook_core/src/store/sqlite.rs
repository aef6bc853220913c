//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist task and journal documents as JSON bodies in one `documents`
//!   table, keyed by collection and id.
//! - Publish a full owner snapshot to subscribers after every write.
//!
//! # Invariants
//! - Connections are fully migrated before the store is usable.
//! - Unparseable stored bodies are delivered as empty documents and left to
//!   the normalizer.

use super::hub::SubscriberHub;
use super::{
    merge_patch, record_body, DocumentStore, EventSink, StoreError, StoreOp, StorePayload,
    StoreResult, Subscription, SubscriptionKey,
};
use crate::db::{open_db, open_db_in_memory};
use crate::model::patch::RecordPatch;
use crate::model::raw::RawRecord;
use crate::model::record::{Record, RecordId, RecordKind};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SNAPSHOT_SQL: &str = "SELECT id, body
FROM documents
WHERE collection = ?1 AND owner_id = ?2
ORDER BY created_at DESC, id ASC;";

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    hub: Arc<Mutex<SubscriberHub>>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a store database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            hub: Arc::new(Mutex::new(SubscriberHub::default())),
        }
    }

    /// Number of stored documents in `kind`'s collection, across owners.
    pub fn count(&self, kind: RecordKind) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1;",
            params![kind.collection_name()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    fn hub(&self) -> StoreResult<MutexGuard<'_, SubscriberHub>> {
        self.hub
            .lock()
            .map_err(|_| StoreError::Unavailable("subscriber registry lock poisoned".to_string()))
    }

    fn publish(&self, conn: &Connection, kind: RecordKind, owner_id: &str) -> StoreResult<()> {
        let snapshot = load_snapshot(conn, kind, owner_id)?;
        let delivered = self
            .hub()?
            .publish(kind, owner_id, || StorePayload::Snapshot(snapshot.clone()));
        debug!(
            "event=snapshot_publish module=store status=ok store=sqlite kind={} documents={} delivered={}",
            kind.as_str(),
            snapshot.len(),
            delivered
        );
        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn subscribe(&self, key: SubscriptionKey, sink: EventSink) -> StoreResult<Subscription> {
        let snapshot = {
            let conn = self.conn()?;
            load_snapshot(&conn, key.kind, &key.owner_id)?
        };
        let token = {
            let mut hub = self.hub()?;
            let token = hub.add(key.clone(), sink);
            hub.send_to(token, StorePayload::Snapshot(snapshot));
            token
        };
        info!(
            "event=store_subscribe module=store status=ok store=sqlite kind={} generation={}",
            key.kind.as_str(),
            key.generation
        );

        let hub = Arc::downgrade(&self.hub);
        Ok(Subscription::new(key, move || {
            if let Some(hub) = hub.upgrade() {
                if let Ok(mut hub) = hub.lock() {
                    hub.remove(token);
                }
            }
        }))
    }

    fn create(&self, kind: RecordKind, record: &Record) -> StoreResult<RecordId> {
        let body = serde_json::to_string(&record_body(record)?)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO documents (collection, id, owner_id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                kind.collection_name(),
                record.id.as_str(),
                record.owner_id.as_str(),
                body,
                record.created_at,
                record.updated_at,
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Rejected {
                op: StoreOp::Create,
                id: Some(record.id.clone()),
                reason: "document already exists".to_string(),
            });
        }

        self.publish(&conn, kind, &record.owner_id)?;
        Ok(record.id.clone())
    }

    fn update(&self, kind: RecordKind, id: &RecordId, patch: &RecordPatch) -> StoreResult<()> {
        let conn = self.conn()?;
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT owner_id, body, updated_at FROM documents WHERE collection = ?1 AND id = ?2;",
                params![kind.collection_name(), id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (owner_id, body, updated_at) = row.ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let mut body = parse_body(id.as_str(), &body);
        merge_patch(&mut body, patch)?;
        conn.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4;",
            params![
                serde_json::to_string(&body)?,
                patch.updated_at.unwrap_or(updated_at),
                kind.collection_name(),
                id.as_str(),
            ],
        )?;

        self.publish(&conn, kind, &owner_id)
    }

    fn delete(&self, kind: RecordKind, id: &RecordId) -> StoreResult<()> {
        let conn = self.conn()?;
        let owner_id: Option<String> = conn
            .query_row(
                "SELECT owner_id FROM documents WHERE collection = ?1 AND id = ?2;",
                params![kind.collection_name(), id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let owner_id = owner_id.ok_or_else(|| StoreError::NotFound(id.clone()))?;

        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
            params![kind.collection_name(), id.as_str()],
        )?;
        self.publish(&conn, kind, &owner_id)
    }
}

fn load_snapshot(conn: &Connection, kind: RecordKind, owner_id: &str) -> StoreResult<Vec<RawRecord>> {
    let mut stmt = conn.prepare(SNAPSHOT_SQL)?;
    let rows = stmt.query_map(params![kind.collection_name(), owner_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut raws = Vec::new();
    for row in rows {
        let (id, body) = row?;
        let body = parse_body(&id, &body);
        raws.push(RawRecord::from_document(id, body));
    }
    Ok(raws)
}

fn parse_body(id: &str, body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|err| {
        warn!(
            "event=document_decode module=store status=degraded store=sqlite id={} error={}",
            id, err
        );
        Value::Null
    })
}
