//! Core domain logic for Daybook.
//! Task and journal records, their client-side reconciliation against a
//! remote document store, and the derived stats and views built on them.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod service;
pub mod stats;
pub mod store;
pub mod view;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, CoreConfig, DateField, OverlayConfig, StatsConfig, StreakAnchor};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::patch::RecordPatch;
pub use model::raw::RawRecord;
pub use model::record::{Mood, Priority, Record, RecordId, RecordKind, TaskStatus};
pub use reconcile::collection::RecordCollection;
pub use reconcile::normalize::{normalize, Normalized, NormalizeWarning};
pub use reconcile::reconciler::{
    ChangeCause, CollectionChange, CollectionObserver, LocalChange, PendingOp, PendingWrite,
    Reconciler, SnapshotOutcome,
};
pub use reconcile::resolve::resolve;
pub use reconcile::{ReconcileError, ReconcileResult};
pub use service::tracker_service::{MutationFailure, ServiceError, ServiceResult, TrackerService};
pub use stats::{compute_stats, DayStatusBucket, DerivedStats, StreakStats};
pub use store::{
    DocumentStore, MemoryDocumentStore, SqliteDocumentStore, StoreError, StoreEvent, StoreOp,
    StorePayload, StoreResult, Subscription, SubscriptionKey,
};
pub use view::{unique_tags, view, SortOrder, StatusFilter, ViewQuery};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
