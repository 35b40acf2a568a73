//! End-to-end batch behavior

use crate::support::{page, urls, FaultyStorage, ScriptedExtractor, OWNER};
use futures::StreamExt;
use chrono::Utc;
use pagekeep::config::BatchConfig;
use pagekeep::ingest::{reconcile_stale_items, BatchOrchestrator, ExtractionError, ExtractionResult};
use pagekeep::state::ItemStatus;
use pagekeep::storage::{
    BatchRecord, BatchStatus, ItemFilter, SavedItem, SqliteStorage, Storage, StorageError,
};
use pagekeep::{BatchSummary, PagekeepError, ProgressSnapshot, ProgressStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn orchestrator<S: Storage + Send + 'static>(
    storage: S,
    extractor: &Arc<ScriptedExtractor>,
) -> BatchOrchestrator<S> {
    BatchOrchestrator::new(
        Arc::new(Mutex::new(storage)),
        extractor.clone(),
        BatchConfig::default(),
    )
}

fn sqlite_orchestrator(extractor: &Arc<ScriptedExtractor>) -> BatchOrchestrator<SqliteStorage> {
    orchestrator(SqliteStorage::new_in_memory().unwrap(), extractor)
}

/// All of the owner's items, oldest first
fn items_in_order<S: Storage + Send + 'static>(orch: &BatchOrchestrator<S>) -> Vec<SavedItem> {
    let mut items = orch
        .storage()
        .lock()
        .unwrap()
        .list_items(OWNER, &ItemFilter::default())
        .unwrap();
    items.reverse();
    items
}

/// Waits until the worker has recorded the end of the batch run
async fn finished_batch<S: Storage + Send + 'static>(
    orch: &BatchOrchestrator<S>,
    batch_id: i64,
) -> BatchRecord {
    for _ in 0..200 {
        let record = orch
            .storage()
            .lock()
            .unwrap()
            .get_batch(batch_id, OWNER)
            .unwrap();
        if record.status != BatchStatus::Running {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("batch {} never finished", batch_id);
}

fn snapshot(completed: usize, total: usize, url: &str, status: ProgressStatus) -> ProgressSnapshot {
    ProgressSnapshot {
        completed,
        total,
        url: url.to_string(),
        status,
    }
}

#[tokio::test]
async fn test_one_snapshot_per_url_in_order() {
    let list = [
        "https://one.test",
        "https://two.test",
        "https://three.test",
        "https://four.test",
        "https://five.test",
    ];
    let mut script = ScriptedExtractor::new();
    for url in &list {
        script = script.succeed(url, page("T", "body"));
    }
    let extractor = Arc::new(script);
    let orch = sqlite_orchestrator(&extractor);

    let stream = orch.run_batch(urls(&list), OWNER).await.unwrap();
    assert_eq!(stream.total(), 5);
    let snapshots: Vec<ProgressSnapshot> = stream.collect().await;

    assert_eq!(snapshots.len(), 5);
    for (i, s) in snapshots.iter().enumerate() {
        assert_eq!(s.completed, i + 1);
        assert_eq!(s.total, 5);
        assert_eq!(s.url, list[i]);
        assert_eq!(s.status, ProgressStatus::Success);
    }
    assert_eq!(extractor.calls(), urls(&list));
}

#[tokio::test]
async fn test_success_and_failure_scenario() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .succeed("https://a.test", page("A", "hello"))
            .fail(
                "https://b.test",
                ExtractionError::Upstream {
                    status: 502,
                    body: "bad gateway".to_string(),
                },
            ),
    );
    let orch = sqlite_orchestrator(&extractor);

    let stream = orch
        .run_batch(urls(&["https://a.test", "https://b.test"]), OWNER)
        .await
        .unwrap();
    let snapshots: Vec<ProgressSnapshot> = stream.collect().await;

    assert_eq!(
        snapshots,
        vec![
            snapshot(1, 2, "https://a.test", ProgressStatus::Success),
            snapshot(2, 2, "https://b.test", ProgressStatus::Failed),
        ]
    );

    let summary = BatchSummary::from_snapshots(&snapshots);
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.message(), "Imported 1 URLs and 1 imports failed");

    let items = items_in_order(&orch);
    assert_eq!(items.len(), 2);

    assert_eq!(items[0].status, ItemStatus::Completed);
    assert_eq!(items[0].title.as_deref(), Some("A"));
    assert_eq!(items[0].content.as_deref(), Some("hello"));

    assert_eq!(items[1].status, ItemStatus::Failed);
    assert!(items[1].has_no_content());
}

#[tokio::test]
async fn test_middle_failure_does_not_affect_neighbours() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .succeed("https://a.test", page("A", "first"))
            .fail("https://b.test", ExtractionError::Rejected("blocked".to_string()))
            .succeed("https://c.test", page("C", "third")),
    );
    let orch = sqlite_orchestrator(&extractor);

    let summary = orch
        .run_batch(
            urls(&["https://a.test", "https://b.test", "https://c.test"]),
            OWNER,
        )
        .await
        .unwrap()
        .summarize()
        .await;
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 1);

    let statuses: Vec<ItemStatus> = items_in_order(&orch).iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![ItemStatus::Completed, ItemStatus::Failed, ItemStatus::Completed]
    );
}

#[tokio::test]
async fn test_single_url_batch() {
    let extractor =
        Arc::new(ScriptedExtractor::new().succeed("https://solo.test", page("Solo", "only")));
    let orch = sqlite_orchestrator(&extractor);

    let mut stream = orch
        .run_batch(urls(&["https://solo.test"]), OWNER)
        .await
        .unwrap();
    let batch_id = stream.batch_id();

    let first = stream.next_snapshot().await.unwrap();
    assert_eq!(
        first,
        snapshot(1, 1, "https://solo.test", ProgressStatus::Success)
    );
    assert!(stream.next_snapshot().await.is_none());

    let items = items_in_order(&orch);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, ItemStatus::Completed);
    assert_eq!(items[0].batch_id, Some(batch_id));

    let record = finished_batch(&orch, batch_id).await;
    assert_eq!(record.status, BatchStatus::Completed);
    assert_eq!(record.success_count, 1);
}

#[tokio::test]
async fn test_empty_list_creates_nothing() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orch = sqlite_orchestrator(&extractor);

    let result = orch.run_batch(Vec::new(), OWNER).await;
    assert!(matches!(result, Err(PagekeepError::EmptyBatch)));
    assert!(items_in_order(&orch).is_empty());
    assert!(extractor.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_urls_are_independent_items() {
    let extractor =
        Arc::new(ScriptedExtractor::new().succeed("https://dup.test", page("Dup", "same")));
    let orch = sqlite_orchestrator(&extractor);

    let summary = orch
        .run_batch(urls(&["https://dup.test", "https://dup.test"]), OWNER)
        .await
        .unwrap()
        .summarize()
        .await;
    assert_eq!(summary.success_count, 2);

    let items = items_in_order(&orch);
    assert_eq!(items.len(), 2);
    assert_ne!(items[0].id, items[1].id);
}

#[tokio::test]
async fn test_unparsable_date_still_completes() {
    let extractor = Arc::new(ScriptedExtractor::new().succeed(
        "https://dated.test",
        ExtractionResult {
            title: Some("Dated".to_string()),
            markdown: Some("body".to_string()),
            author: Some("Ada".to_string()),
            published_at: Some("the other day".to_string()),
            ..Default::default()
        },
    ));
    let orch = sqlite_orchestrator(&extractor);

    let summary = orch
        .run_batch(urls(&["https://dated.test"]), OWNER)
        .await
        .unwrap()
        .summarize()
        .await;
    assert!(summary.all_succeeded());

    let items = items_in_order(&orch);
    let item = &items[0];
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.author.as_deref(), Some("Ada"));
    assert_eq!(item.published_at, None);
}

#[tokio::test]
async fn test_create_failure_reports_failed_and_continues() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .succeed("https://a.test", page("A", "first"))
            .succeed("https://c.test", page("C", "third")),
    );
    let storage = FaultyStorage::new().fail_create_for("https://b.test");
    let orch = orchestrator(storage, &extractor);

    let snapshots: Vec<ProgressSnapshot> = orch
        .run_batch(
            urls(&["https://a.test", "https://b.test", "https://c.test"]),
            OWNER,
        )
        .await
        .unwrap()
        .collect()
        .await;

    let statuses: Vec<ProgressStatus> = snapshots.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            ProgressStatus::Success,
            ProgressStatus::Failed,
            ProgressStatus::Success
        ]
    );

    // No record, and no extraction, for the URL that could not be created
    assert_eq!(items_in_order(&orch).len(), 2);
    assert_eq!(extractor.calls(), urls(&["https://a.test", "https://c.test"]));
}

#[tokio::test]
async fn test_success_write_failure_marks_failed() {
    let extractor =
        Arc::new(ScriptedExtractor::new().succeed("https://a.test", page("A", "hello")));
    let storage = FaultyStorage::new().fail_success_for("https://a.test");
    let orch = orchestrator(storage, &extractor);

    let snapshots: Vec<ProgressSnapshot> = orch
        .run_batch(urls(&["https://a.test"]), OWNER)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(snapshots[0].status, ProgressStatus::Failed);

    let items = items_in_order(&orch);
    let item = &items[0];
    assert_eq!(item.status, ItemStatus::Failed);
    assert!(item.has_no_content());
}

#[tokio::test]
async fn test_double_failure_is_retried_then_reconciled() {
    let extractor = Arc::new(ScriptedExtractor::new().fail(
        "https://b.test",
        ExtractionError::Transport("reset".to_string()),
    ));
    let storage = FaultyStorage::new().fail_failure_mark_for("https://b.test");
    let orch = orchestrator(storage, &extractor);

    let stream = orch
        .run_batch(urls(&["https://b.test"]), OWNER)
        .await
        .unwrap();
    let batch_id = stream.batch_id();
    let snapshots: Vec<ProgressSnapshot> = stream.collect().await;

    // The item still reports failed even though the store could not be updated
    assert_eq!(snapshots[0].status, ProgressStatus::Failed);
    assert_eq!(
        orch.storage().lock().unwrap().failure_mark_calls,
        BatchConfig::default().failure_mark_attempts as usize
    );

    let items = items_in_order(&orch);
    let stuck = &items[0];
    assert_eq!(stuck.status, ItemStatus::Pending);

    let record = finished_batch(&orch, batch_id).await;
    assert_eq!(record.status, BatchStatus::Completed);
    assert_eq!(record.failed_count, 1);

    // Once the store accepts writes again, reconciliation resolves the item
    orch.storage().lock().unwrap().heal();
    let resolved = orch.reconcile_stale_items(OWNER).unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, stuck.id);
    assert_eq!(resolved[0].status, ItemStatus::Failed);
}

#[tokio::test]
async fn test_reconcile_skips_running_batches() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orch = sqlite_orchestrator(&extractor);

    let (stale, finished, running) = {
        let mut storage = orch.storage().lock().unwrap();

        let old = storage.create_batch(OWNER, 2, "hash").unwrap();
        let stale = storage
            .create_item("https://stale.test", OWNER, Some(old))
            .unwrap();
        let finished = storage
            .create_item("https://done.test", OWNER, Some(old))
            .unwrap();
        storage
            .update_on_failure(finished.id, OWNER)
            .unwrap();
        storage
            .finish_batch(old, BatchStatus::Completed, 0, 2)
            .unwrap();

        let live = storage.create_batch(OWNER, 1, "hash").unwrap();
        let running = storage
            .create_item("https://live.test", OWNER, Some(live))
            .unwrap();

        (stale, finished, running)
    };

    let resolved = orch.reconcile_stale_items(OWNER).unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, stale.id);
    assert_eq!(resolved[0].status, ItemStatus::Failed);

    let storage = orch.storage().lock().unwrap();
    assert_eq!(
        storage.get_item(finished.id, OWNER).unwrap().status,
        ItemStatus::Failed
    );
    assert_eq!(
        storage.get_item(running.id, OWNER).unwrap().status,
        ItemStatus::Pending
    );
}

#[tokio::test]
async fn test_cancel_stops_batch() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .succeed("https://a.test", page("A", "first"))
            .hang("https://slow.test")
            .succeed("https://c.test", page("C", "third")),
    );
    let orch = sqlite_orchestrator(&extractor);

    let mut stream = orch
        .run_batch(
            urls(&["https://a.test", "https://slow.test", "https://c.test"]),
            OWNER,
        )
        .await
        .unwrap();
    let batch_id = stream.batch_id();

    let first = stream.next_snapshot().await.unwrap();
    assert_eq!(first.status, ProgressStatus::Success);

    stream.cancel();
    assert!(stream.next_snapshot().await.is_none());

    // The interrupted item, if it was started, is failed; nothing after it is created
    let items = items_in_order(&orch);
    assert_eq!(items[0].status, ItemStatus::Completed);
    assert!(items.iter().all(|i| i.status.is_terminal()));
    assert!(items.iter().all(|i| i.url != "https://c.test"));
    assert!(!extractor.calls().contains(&"https://c.test".to_string()));

    let record = finished_batch(&orch, batch_id).await;
    assert_eq!(record.status, BatchStatus::Cancelled);
    assert_eq!(record.success_count, 1);
    assert_eq!(record.failed_count, 0);
}

#[tokio::test]
async fn test_dropping_stream_cancels_batch() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .hang("https://slow.test")
            .succeed("https://b.test", page("B", "second")),
    );
    let orch = sqlite_orchestrator(&extractor);

    let stream = orch
        .run_batch(urls(&["https://slow.test", "https://b.test"]), OWNER)
        .await
        .unwrap();
    let batch_id = stream.batch_id();
    drop(stream);

    let record = finished_batch(&orch, batch_id).await;
    assert_eq!(record.status, BatchStatus::Cancelled);

    let items = items_in_order(&orch);
    assert!(items.iter().all(|i| i.url != "https://b.test"));
    assert!(items.iter().all(|i| i.status.is_terminal()));
}

#[tokio::test]
async fn test_batches_are_scoped_by_owner() {
    let extractor =
        Arc::new(ScriptedExtractor::new().succeed("https://a.test", page("A", "hello")));
    let orch = sqlite_orchestrator(&extractor);

    orch.run_batch(urls(&["https://a.test"]), "someone-else")
        .await
        .unwrap()
        .summarize()
        .await;

    assert!(items_in_order(&orch).is_empty());
}

#[tokio::test]
async fn test_stream_next_and_summarize_agree() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .succeed("https://a.test", page("A", "x"))
            .succeed("https://b.test", page("B", "y")),
    );
    let orch = sqlite_orchestrator(&extractor);

    let mut stream = orch
        .run_batch(urls(&["https://a.test", "https://b.test"]), OWNER)
        .await
        .unwrap();
    let first = stream.next().await.unwrap();
    assert_eq!(first.completed, 1);

    let rest = stream.summarize().await;
    assert_eq!(rest.total(), 1);
    assert_eq!(rest.message(), "Imported 1 URLs");
}

#[tokio::test]
async fn test_panicking_extractor_fails_only_its_item() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .succeed("https://a.test", page("A", "first"))
            .panic_on("https://b.test")
            .succeed("https://c.test", page("C", "third")),
    );
    let orch = sqlite_orchestrator(&extractor);

    let stream = orch
        .run_batch(
            urls(&["https://a.test", "https://b.test", "https://c.test"]),
            OWNER,
        )
        .await
        .unwrap();
    let batch_id = stream.batch_id();
    let snapshots: Vec<ProgressSnapshot> = stream.collect().await;

    assert_eq!(
        snapshots,
        vec![
            snapshot(1, 3, "https://a.test", ProgressStatus::Success),
            snapshot(2, 3, "https://b.test", ProgressStatus::Failed),
            snapshot(3, 3, "https://c.test", ProgressStatus::Success),
        ]
    );

    let statuses: Vec<ItemStatus> = items_in_order(&orch).iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![ItemStatus::Completed, ItemStatus::Failed, ItemStatus::Completed]
    );

    let record = finished_batch(&orch, batch_id).await;
    assert_eq!(record.status, BatchStatus::Completed);
    assert_eq!(record.success_count, 2);
    assert_eq!(record.failed_count, 1);
}

#[tokio::test]
async fn test_single_import_double_failure_is_reconciled() {
    let extractor = Arc::new(ScriptedExtractor::new().fail(
        "https://b.test",
        ExtractionError::Transport("reset".to_string()),
    ));
    let storage = FaultyStorage::new().fail_failure_mark_for("https://b.test");
    let orch = orchestrator(storage, &extractor);

    let stuck = orch.import_url("https://b.test", OWNER).await.unwrap();
    assert_eq!(stuck.status, ItemStatus::Processing);
    assert_eq!(stuck.batch_id, None);

    // Too young to be considered abandoned
    orch.storage().lock().unwrap().heal();
    assert!(orch.reconcile_stale_items(OWNER).unwrap().is_empty());

    let later = Utc::now() + chrono::Duration::seconds(1);
    let resolved = {
        let mut storage = orch.storage().lock().unwrap();
        reconcile_stale_items(&mut *storage, OWNER, later).unwrap()
    };
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, stuck.id);
    assert_eq!(resolved[0].status, ItemStatus::Failed);
}

#[tokio::test]
async fn test_reconcile_closes_abandoned_batch() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orch = sqlite_orchestrator(&extractor);

    // A run whose worker died before recording its end
    let (batch_id, done, stuck) = {
        let mut storage = orch.storage().lock().unwrap();
        let batch_id = storage.create_batch(OWNER, 3, "hash").unwrap();
        let done = storage
            .create_item("https://a.test", OWNER, Some(batch_id))
            .unwrap();
        storage.update_on_failure(done.id, OWNER).unwrap();
        let stuck = storage
            .create_item("https://b.test", OWNER, Some(batch_id))
            .unwrap();
        (batch_id, done, stuck)
    };

    // Still within the threshold, so it may yet be in flight
    assert!(orch.reconcile_stale_items(OWNER).unwrap().is_empty());

    let later = Utc::now() + chrono::Duration::seconds(1);
    let resolved = {
        let mut storage = orch.storage().lock().unwrap();
        reconcile_stale_items(&mut *storage, OWNER, later).unwrap()
    };
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, stuck.id);
    assert_eq!(resolved[0].status, ItemStatus::Failed);

    let storage = orch.storage().lock().unwrap();
    let record = storage.get_batch(batch_id, OWNER).unwrap();
    assert_eq!(record.status, BatchStatus::Cancelled);
    assert_eq!(record.failed_count, 1);
    assert!(record.finished_at.is_some());
    assert_eq!(
        storage.get_item(done.id, OWNER).unwrap().status,
        ItemStatus::Failed
    );
}

#[tokio::test]
async fn test_batch_urls_are_trimmed_before_extraction() {
    let extractor =
        Arc::new(ScriptedExtractor::new().succeed("https://a.test", page("A", "hello")));
    let orch = sqlite_orchestrator(&extractor);

    let snapshots: Vec<ProgressSnapshot> = orch
        .run_batch(urls(&[" https://a.test "]), OWNER)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        snapshots,
        vec![snapshot(1, 1, "https://a.test", ProgressStatus::Success)]
    );
    assert_eq!(extractor.calls(), urls(&["https://a.test"]));

    let items = items_in_order(&orch);
    assert_eq!(items[0].url, "https://a.test");
    assert_eq!(items[0].status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_cancel_without_reading_finishes_batch() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .succeed("https://a.test", page("A", "first"))
            .succeed("https://b.test", page("B", "second"))
            .succeed("https://c.test", page("C", "third")),
    );
    let orch = sqlite_orchestrator(&extractor);

    let stream = orch
        .run_batch(
            urls(&["https://a.test", "https://b.test", "https://c.test"]),
            OWNER,
        )
        .await
        .unwrap();
    let batch_id = stream.batch_id();

    // Let the worker fill the channel and block on the next send
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream.cancel();

    // The stream stays alive, so only the token can release the worker
    let record = finished_batch(&orch, batch_id).await;
    assert_eq!(record.status, BatchStatus::Cancelled);
    assert!(record.success_count < 3);
    assert!(!extractor.calls().contains(&"https://c.test".to_string()));
    drop(stream);
}

#[tokio::test]
async fn test_batch_record_is_scoped_by_owner() {
    let extractor =
        Arc::new(ScriptedExtractor::new().succeed("https://a.test", page("A", "hello")));
    let orch = sqlite_orchestrator(&extractor);

    let stream = orch
        .run_batch(urls(&["https://a.test"]), OWNER)
        .await
        .unwrap();
    let batch_id = stream.batch_id();
    stream.summarize().await;

    let result = orch
        .storage()
        .lock()
        .unwrap()
        .get_batch(batch_id, "someone-else");
    assert!(matches!(result, Err(StorageError::BatchNotFound(id)) if id == batch_id));
}
