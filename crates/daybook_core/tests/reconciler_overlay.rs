use daybook_core::{
    ChangeCause, CollectionChange, CollectionObserver, OverlayConfig, PendingOp, RawRecord,
    ReconcileError, Reconciler, RecordId, RecordKind, RecordPatch, TaskStatus,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn tasks() -> Reconciler {
    Reconciler::new(RecordKind::Task, OverlayConfig::default())
}

fn doc(id: &str, name: &str, updated_at: i64) -> RawRecord {
    RawRecord::from_document(
        id,
        json!({ "userId": "u1", "name": name, "createdAt": 1_000, "updatedAt": updated_at }),
    )
}

#[derive(Default)]
struct Recorder {
    changes: Mutex<Vec<CollectionChange>>,
}

impl CollectionObserver for Recorder {
    fn collection_changed(&self, change: &CollectionChange) {
        self.changes.lock().unwrap().push(change.clone());
    }
}

#[test]
fn snapshot_replaces_collection_and_folds_duplicates() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("a", "A", 1_000), doc("b", "B", 1_000)], 0);

    let outcome = reconciler.apply_snapshot(
        &[doc("c", "old", 1_000), doc("c", "new", 2_000), RawRecord::default()],
        5_000,
    );
    assert_eq!(outcome.received, 3);
    assert_eq!(outcome.duplicates_folded, 1);
    assert_eq!(outcome.degraded, 1);
    assert_eq!(reconciler.len(), 2);
    assert!(reconciler.get(&RecordId::from("a")).is_none());
    assert_eq!(reconciler.get(&RecordId::from("c")).unwrap().name, "new");
}

#[test]
fn local_update_survives_stale_snapshot() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("t1", "draft", 1_000)], 1_000);
    let id = RecordId::from("t1");

    reconciler
        .apply_local_update(&id, &RecordPatch::named("final"), 3_000)
        .unwrap();
    let outcome = reconciler.apply_snapshot(&[doc("t1", "draft", 1_000)], 3_500);

    let record = reconciler.get(&id).unwrap();
    assert_eq!(record.name, "final");
    assert_eq!(record.updated_at, 3_000);
    assert_eq!(outcome.still_pending, 1);
    assert_eq!(reconciler.pending(&id).unwrap().snapshots_seen, 1);
}

#[test]
fn snapshot_at_or_after_local_stamp_confirms_write() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("t1", "draft", 1_000)], 1_000);
    let id = RecordId::from("t1");
    reconciler
        .apply_local_update(&id, &RecordPatch::named("final"), 3_000)
        .unwrap();

    let outcome = reconciler.apply_snapshot(&[doc("t1", "server", 3_000)], 3_500);
    assert_eq!(outcome.confirmed, 1);
    assert_eq!(reconciler.pending_len(), 0);
    assert_eq!(reconciler.get(&id).unwrap().name, "server");
}

#[test]
fn unconfirmed_write_expires_after_snapshot_limit() {
    let mut reconciler = Reconciler::new(
        RecordKind::Task,
        OverlayConfig {
            pending_snapshot_limit: 2,
        },
    );
    reconciler.apply_snapshot(&[doc("t1", "draft", 1_000)], 1_000);
    let id = RecordId::from("t1");
    reconciler
        .apply_local_update(&id, &RecordPatch::named("final"), 3_000)
        .unwrap();

    for _ in 0..2 {
        reconciler.apply_snapshot(&[doc("t1", "draft", 1_000)], 4_000);
        assert_eq!(reconciler.get(&id).unwrap().name, "final");
    }
    let outcome = reconciler.apply_snapshot(&[doc("t1", "draft", 1_000)], 4_000);
    assert_eq!(outcome.expired, 1);
    assert_eq!(reconciler.get(&id).unwrap().name, "draft");
    assert!(reconciler.pending(&id).is_none());
}

#[test]
fn local_update_outlives_remote_version_stamped_by_a_faster_clock() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("t1", "remote", 10_000)], 5_000);
    let id = RecordId::from("t1");

    let change = reconciler
        .apply_local_update(&id, &RecordPatch::named("local edit"), 5_000)
        .unwrap();
    assert_eq!(change.record.updated_at, 10_001);
    assert_eq!(change.patch.updated_at, Some(10_001));

    let outcome = reconciler.apply_snapshot(&[doc("t1", "remote", 10_000)], 5_100);
    assert_eq!(outcome.confirmed, 0);
    assert_eq!(outcome.still_pending, 1);
    assert_eq!(reconciler.get(&id).unwrap().name, "local edit");

    let outcome = reconciler.apply_snapshot(&[doc("t1", "local edit", 10_001)], 5_200);
    assert_eq!(outcome.confirmed, 1);
    assert_eq!(reconciler.pending_len(), 0);
}

#[test]
fn unconfirmed_insert_disappears_after_snapshot_limit() {
    let mut reconciler = Reconciler::new(
        RecordKind::Task,
        OverlayConfig {
            pending_snapshot_limit: 2,
        },
    );
    let inserted = reconciler.apply_local_insert(&RecordPatch::named("Buy milk"), "u1", 2_000);
    let id = inserted.record.id;

    for _ in 0..2 {
        reconciler.apply_snapshot(&[doc("a", "A", 1_000)], 2_100);
        assert!(reconciler.get(&id).is_some());
    }
    let outcome = reconciler.apply_snapshot(&[doc("a", "A", 1_000)], 2_200);
    assert_eq!(outcome.expired, 1);
    assert!(reconciler.get(&id).is_none());
    assert!(reconciler.pending(&id).is_none());
    assert_eq!(reconciler.len(), 1);
}

#[test]
fn unconfirmed_delete_expires_and_record_reappears() {
    let mut reconciler = Reconciler::new(
        RecordKind::Task,
        OverlayConfig {
            pending_snapshot_limit: 2,
        },
    );
    reconciler.apply_snapshot(&[doc("a", "A", 1_000)], 1_000);
    let id = RecordId::from("a");
    reconciler.apply_local_delete(&id, 2_000).unwrap();

    for _ in 0..2 {
        reconciler.apply_snapshot(&[doc("a", "A", 1_000)], 2_100);
        assert!(reconciler.get(&id).is_none());
    }
    let outcome = reconciler.apply_snapshot(&[doc("a", "A", 1_000)], 2_200);
    assert_eq!(outcome.expired, 1);
    assert_eq!(reconciler.get(&id).unwrap().name, "A");
    assert_eq!(reconciler.pending_len(), 0);
}

#[test]
fn local_insert_is_normalized_like_store_records() {
    let mut reconciler = tasks();
    let draft = RecordPatch::named("   ")
        .with_tags(["work", " ", "Work", "  deep   focus "])
        .with_progress(200);

    let change = reconciler.apply_local_insert(&draft, "u1", 2_000);
    let record = reconciler.get(&change.record.id).unwrap();
    assert!(record.has_placeholder_name());
    assert_eq!(record.tags, vec!["work".to_string(), "deep focus".to_string()]);
    assert_eq!(record.progress, 100);
    assert_eq!(record.status, TaskStatus::default());
    assert_eq!((record.created_at, record.updated_at), (2_000, 2_000));

    assert_eq!(change.patch.name.as_deref(), Some(record.name.as_str()));
    assert_eq!(change.patch.tags.as_ref(), Some(&record.tags));
    assert_eq!(change.patch.progress, Some(100));
}

#[test]
fn local_insert_missing_from_snapshot_stays_visible_after_snapshot_records() {
    let mut reconciler = tasks();
    let inserted = reconciler.apply_local_insert(&RecordPatch::named("Buy milk"), "u1", 2_000);

    reconciler.apply_snapshot(&[doc("a", "A", 1_000)], 2_100);
    let names: Vec<&str> = reconciler.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "Buy milk"]);
    assert_eq!(
        reconciler.pending(&inserted.record.id).unwrap().op,
        PendingOp::Insert
    );
}

#[test]
fn pending_delete_hides_record_until_snapshot_drops_it() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("a", "A", 1_000), doc("b", "B", 1_000)], 1_000);
    let id = RecordId::from("a");
    reconciler.apply_local_delete(&id, 2_000).unwrap();

    reconciler.apply_snapshot(&[doc("a", "A", 1_000), doc("b", "B", 1_000)], 2_100);
    assert!(reconciler.get(&id).is_none());
    assert_eq!(reconciler.pending_len(), 1);

    let outcome = reconciler.apply_snapshot(&[doc("b", "B", 1_000)], 2_200);
    assert_eq!(outcome.confirmed, 1);
    assert_eq!(reconciler.pending_len(), 0);
}

#[test]
fn missing_ids_are_not_found() {
    let mut reconciler = tasks();
    let id = RecordId::from("ghost");
    assert_eq!(
        reconciler.apply_local_update(&id, &RecordPatch::named("x"), 1),
        Err(ReconcileError::NotFound(id.clone()))
    );
    assert_eq!(
        reconciler.apply_local_delete(&id, 1),
        Err(ReconcileError::NotFound(id.clone()))
    );
    assert_eq!(
        reconciler.rollback(&id),
        Err(ReconcileError::NoPendingWrite(id))
    );
}

#[test]
fn rollback_restores_store_version() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("t1", "draft", 1_000)], 1_000);
    let id = RecordId::from("t1");
    reconciler
        .apply_local_update(&id, &RecordPatch::named("typo"), 2_000)
        .unwrap();
    reconciler
        .apply_local_update(&id, &RecordPatch::new().with_status(TaskStatus::Paused), 2_500)
        .unwrap();

    let restored = reconciler.rollback(&id).unwrap().unwrap();
    assert_eq!(restored.name, "draft");
    assert_eq!(reconciler.get(&id).unwrap().status, TaskStatus::NotStarted);
    assert_eq!(reconciler.pending_len(), 0);
}

#[test]
fn rollback_of_deleted_record_brings_it_back() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("t1", "keep me", 1_000)], 1_000);
    let id = RecordId::from("t1");
    reconciler.apply_local_delete(&id, 2_000).unwrap();

    reconciler.rollback(&id).unwrap();
    assert_eq!(reconciler.get(&id).unwrap().name, "keep me");
}

#[test]
fn rollback_of_local_insert_removes_it() {
    let mut reconciler = tasks();
    let inserted = reconciler.apply_local_insert(&RecordPatch::named("oops"), "u1", 1_000);
    assert_eq!(reconciler.rollback(&inserted.record.id).unwrap(), None);
    assert!(reconciler.is_empty());
}

#[test]
fn confirm_insert_rekeys_record_and_pending_write() {
    let mut reconciler = tasks();
    let inserted = reconciler.apply_local_insert(&RecordPatch::named("Buy milk"), "u1", 1_000);
    let provisional = inserted.record.id.clone();
    let confirmed = RecordId::from("srv-1");

    reconciler.confirm_insert(&provisional, &confirmed).unwrap();
    assert!(reconciler.get(&provisional).is_none());
    assert_eq!(reconciler.get(&confirmed).unwrap().name, "Buy milk");
    assert_eq!(
        reconciler.pending(&confirmed).unwrap().local.as_ref().unwrap().id,
        confirmed
    );

    let outcome = reconciler.apply_snapshot(
        &[RawRecord::from_document(
            "srv-1",
            json!({ "name": "Buy milk", "createdAt": 1_000, "updatedAt": 1_000 }),
        )],
        1_100,
    );
    assert_eq!(outcome.confirmed, 1);
    assert_eq!(reconciler.len(), 1);
}

#[test]
fn confirm_insert_rejects_colliding_id() {
    let mut reconciler = tasks();
    reconciler.apply_snapshot(&[doc("taken", "A", 1_000)], 1_000);
    let inserted = reconciler.apply_local_insert(&RecordPatch::named("B"), "u1", 2_000);
    let taken = RecordId::from("taken");
    assert_eq!(
        reconciler.confirm_insert(&inserted.record.id, &taken),
        Err(ReconcileError::DuplicateId(taken))
    );
}

#[test]
fn observers_see_every_change_in_order() {
    let mut reconciler = tasks();
    let recorder = Arc::new(Recorder::default());
    reconciler.observe(recorder.clone());

    let inserted = reconciler.apply_local_insert(&RecordPatch::named("x"), "u1", 1_000);
    reconciler
        .apply_local_update(&inserted.record.id, &RecordPatch::named("y"), 1_100)
        .unwrap();
    reconciler.apply_local_delete(&inserted.record.id, 1_200).unwrap();
    reconciler.apply_snapshot(&[], 1_300);
    reconciler.clear();

    let changes = recorder.changes.lock().unwrap();
    let causes: Vec<ChangeCause> = changes.iter().map(|change| change.cause).collect();
    assert_eq!(
        causes,
        vec![
            ChangeCause::LocalInsert,
            ChangeCause::LocalUpdate,
            ChangeCause::LocalDelete,
            ChangeCause::Snapshot,
            ChangeCause::Cleared,
        ]
    );
    let revisions: Vec<u64> = changes.iter().map(|change| change.revision).collect();
    assert_eq!(revisions, vec![1, 2, 3, 4, 5]);
    assert_eq!(reconciler.revision(), 5);
}
