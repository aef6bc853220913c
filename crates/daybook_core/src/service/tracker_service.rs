//! Per-session task/journal tracker.
//!
//! # Responsibility
//! - Own one reconciler per record kind for the signed-in user.
//! - Follow the current user: clear on sign-out, re-subscribe on sign-in.
//! - Apply local mutations optimistically, then forward them to the store.
//! - Expose collections, stats and views to the presentation layer.
//!
//! # Invariants
//! - Store events are applied only through `pump_events`, one at a time.
//! - Queued events are applied before each local mutation, so a pending
//!   write only counts snapshots delivered after it.
//! - Events from an earlier session generation are dropped.
//! - A subscription error never clears the last good collection.
//! - A failed remote mutation keeps the optimistic state and is reported
//!   both as the returned error and through `take_mutation_failures`.

use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::model::patch::RecordPatch;
use crate::model::record::{Record, RecordId, RecordKind, TaskStatus};
use crate::reconcile::reconciler::{CollectionObserver, Reconciler};
use crate::reconcile::ReconcileError;
use crate::stats::{compute_stats, DerivedStats};
use crate::store::{
    DocumentStore, StoreError, StoreEvent, StoreOp, StorePayload, Subscription, SubscriptionKey,
};
use crate::view::{unique_tags, view, ViewQuery};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Mutation attempted with no current user.
    NotSignedIn,
    Reconcile(ReconcileError),
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "no user is signed in"),
            Self::Reconcile(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotSignedIn => None,
            Self::Reconcile(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ReconcileError> for ServiceError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// A remote mutation that failed after its optimistic local change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFailure {
    pub kind: RecordKind,
    pub id: RecordId,
    pub op: StoreOp,
    /// Rendered store error.
    pub error: String,
}

struct Session {
    owner_id: String,
    subscriptions: HashMap<RecordKind, Subscription>,
}

/// Session-scoped façade over the reconcilers and the document store.
pub struct TrackerService<S: DocumentStore> {
    store: S,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
    tasks: Reconciler,
    journals: Reconciler,
    session: Option<Session>,
    generation: u64,
    sink: Sender<StoreEvent>,
    events: Receiver<StoreEvent>,
    subscription_errors: HashMap<RecordKind, StoreError>,
    failures: Vec<MutationFailure>,
}

impl<S: DocumentStore> TrackerService<S> {
    /// Creates a signed-out service on the system clock.
    pub fn new(store: S, config: CoreConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, config: CoreConfig, clock: Arc<dyn Clock>) -> Self {
        let (sink, events) = channel();
        Self {
            store,
            clock,
            tasks: Reconciler::new(RecordKind::Task, config.overlay.clone()),
            journals: Reconciler::new(RecordKind::Journal, config.overlay.clone()),
            config,
            session: None,
            generation: 0,
            sink,
            events,
            subscription_errors: HashMap::new(),
            failures: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Current user, if signed in.
    pub fn owner(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.owner_id.as_str())
    }

    /// Follows a change of the current user.
    ///
    /// Any change drops the old subscriptions, clears both collections and,
    /// for a concrete user, subscribes to both of their collections. Setting
    /// the same user again only retries kinds whose subscribe failed.
    pub fn set_owner(&mut self, owner_id: Option<&str>) -> ServiceResult<()> {
        let owner_id = owner_id.map(str::trim).filter(|owner| !owner.is_empty());
        if self.owner() == owner_id {
            return match owner_id {
                Some(_) => self.subscribe_missing(),
                None => Ok(()),
            };
        }

        self.generation += 1;
        self.session = None;
        self.tasks.clear();
        self.journals.clear();
        self.subscription_errors.clear();
        self.failures.clear();

        let Some(owner_id) = owner_id else {
            info!(
                "event=session_end module=service status=ok generation={}",
                self.generation
            );
            return Ok(());
        };

        self.session = Some(Session {
            owner_id: owner_id.to_string(),
            subscriptions: HashMap::with_capacity(RecordKind::ALL.len()),
        });
        let result = self.subscribe_missing();
        info!(
            "event=session_start module=service status={} generation={}",
            if result.is_err() { "degraded" } else { "ok" },
            self.generation
        );
        result
    }

    /// Subscribes every record kind the current session does not follow yet.
    ///
    /// A kind that fails keeps its error in `subscription_error` and is
    /// retried on the next call.
    fn subscribe_missing(&mut self) -> ServiceResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(ServiceError::NotSignedIn);
        };

        let mut first_error = None;
        for kind in RecordKind::ALL {
            if session.subscriptions.contains_key(&kind) {
                continue;
            }
            let key = SubscriptionKey::new(kind, session.owner_id.as_str(), self.generation);
            match self.store.subscribe(key, self.sink.clone()) {
                Ok(subscription) => {
                    session.subscriptions.insert(kind, subscription);
                }
                Err(err) => {
                    warn!(
                        "event=store_subscribe module=service status=error kind={} error={}",
                        kind.as_str(),
                        err
                    );
                    if first_error.is_none() {
                        first_error = Some(err.to_string());
                    }
                    self.subscription_errors.insert(kind, err);
                }
            }
        }

        match first_error {
            Some(message) => Err(ServiceError::Store(StoreError::Unavailable(message))),
            None => Ok(()),
        }
    }

    /// Whether the session holds a live subscription for `kind`.
    pub fn is_subscribed(&self, kind: RecordKind) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.subscriptions.contains_key(&kind))
    }

    /// Applies every queued store event in arrival order.
    ///
    /// Returns the number of events applied; stale events are not counted.
    pub fn pump_events(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            if !self.is_current(&event.key) {
                debug!(
                    "event=store_event_drop module=service status=stale kind={} generation={} current={}",
                    event.key.kind.as_str(),
                    event.key.generation,
                    self.generation
                );
                continue;
            }

            let kind = event.key.kind;
            match event.payload {
                StorePayload::Snapshot(raws) => {
                    let now_ms = self.clock.now_ms();
                    self.reconciler_mut(kind).apply_snapshot(&raws, now_ms);
                    self.subscription_errors.remove(&kind);
                }
                StorePayload::Error(err) => {
                    warn!(
                        "event=subscription_error module=service status=error kind={} error={}",
                        kind.as_str(),
                        err
                    );
                    self.subscription_errors.insert(kind, err);
                }
            }
            applied += 1;
        }
        applied
    }

    fn is_current(&self, key: &SubscriptionKey) -> bool {
        key.generation == self.generation && self.owner() == Some(key.owner_id.as_str())
    }

    /// Last subscription error for `kind`, until the next good snapshot.
    pub fn subscription_error(&self, kind: RecordKind) -> Option<&StoreError> {
        self.subscription_errors.get(&kind)
    }

    /// Drains the remote mutation failures recorded since the last call.
    pub fn take_mutation_failures(&mut self) -> Vec<MutationFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn reconciler(&self, kind: RecordKind) -> &Reconciler {
        match kind {
            RecordKind::Task => &self.tasks,
            RecordKind::Journal => &self.journals,
        }
    }

    fn reconciler_mut(&mut self, kind: RecordKind) -> &mut Reconciler {
        match kind {
            RecordKind::Task => &mut self.tasks,
            RecordKind::Journal => &mut self.journals,
        }
    }

    pub fn observe(&mut self, kind: RecordKind, observer: Arc<dyn CollectionObserver>) {
        self.reconciler_mut(kind).observe(observer);
    }

    pub fn records(&self, kind: RecordKind) -> &[Record] {
        self.reconciler(kind).records()
    }

    pub fn get(&self, kind: RecordKind, id: &RecordId) -> Option<&Record> {
        self.reconciler(kind).get(id)
    }

    pub fn stats(&self, kind: RecordKind) -> DerivedStats {
        compute_stats(self.records(kind), self.clock.now_ms(), &self.config.stats)
    }

    pub fn view(&self, kind: RecordKind, query: &ViewQuery) -> Vec<Record> {
        view(self.records(kind), query)
    }

    pub fn unique_tags(&self, kind: RecordKind) -> Vec<String> {
        unique_tags(self.records(kind))
    }

    /// Adds a record from `draft` and sends it to the store.
    ///
    /// If the store persists it under a different id, the local record is
    /// re-keyed and the returned record carries the store id.
    pub fn add(&mut self, kind: RecordKind, draft: &RecordPatch) -> ServiceResult<Record> {
        let owner_id = self.owner().ok_or(ServiceError::NotSignedIn)?.to_string();
        self.pump_events();
        let now_ms = self.clock.now_ms();
        let change = self
            .reconciler_mut(kind)
            .apply_local_insert(draft, &owner_id, now_ms);
        let mut record = change.record;

        match self.store.create(kind, &record) {
            Ok(confirmed) => {
                if confirmed != record.id {
                    self.reconciler_mut(kind).confirm_insert(&record.id, &confirmed)?;
                    record.id = confirmed;
                }
                Ok(record)
            }
            Err(err) => Err(self.record_failure(kind, record.id, StoreOp::Create, err)),
        }
    }

    /// Patches an existing record and sends the effective patch to the store.
    pub fn update(
        &mut self,
        kind: RecordKind,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> ServiceResult<Record> {
        if self.session.is_none() {
            return Err(ServiceError::NotSignedIn);
        }
        self.pump_events();
        let now_ms = self.clock.now_ms();
        let change = self.reconciler_mut(kind).apply_local_update(id, patch, now_ms)?;

        match self.store.update(kind, id, &change.patch) {
            Ok(()) => Ok(change.record),
            Err(err) => Err(self.record_failure(kind, id.clone(), StoreOp::Update, err)),
        }
    }

    /// Moves a task to `status`, maintaining its completion time.
    pub fn set_task_status(&mut self, id: &RecordId, status: TaskStatus) -> ServiceResult<Record> {
        self.update(RecordKind::Task, id, &RecordPatch::new().with_status(status))
    }

    pub fn delete(&mut self, kind: RecordKind, id: &RecordId) -> ServiceResult<()> {
        if self.session.is_none() {
            return Err(ServiceError::NotSignedIn);
        }
        self.pump_events();
        let now_ms = self.clock.now_ms();
        self.reconciler_mut(kind).apply_local_delete(id, now_ms)?;

        self.store
            .delete(kind, id)
            .map_err(|err| self.record_failure(kind, id.clone(), StoreOp::Delete, err))
    }

    /// Reverts the pending local change to `id`.
    ///
    /// Returns the restored store version, or `None` when the record only
    /// existed locally and has been removed.
    pub fn rollback(&mut self, kind: RecordKind, id: &RecordId) -> ServiceResult<Option<Record>> {
        Ok(self.reconciler_mut(kind).rollback(id)?)
    }

    fn record_failure(
        &mut self,
        kind: RecordKind,
        id: RecordId,
        op: StoreOp,
        err: StoreError,
    ) -> ServiceError {
        warn!(
            "event=store_mutation module=service status=error kind={} op={} id={} error={}",
            kind.as_str(),
            op,
            id,
            err
        );
        self.failures.push(MutationFailure {
            kind,
            id,
            op,
            error: err.to_string(),
        });
        ServiceError::Store(err)
    }
}
