//! Integration tests for the mailsize crate
//!
//! These tests drive complete scans against an in-memory mailbox and
//! verify folding, checkpointing, resumption and termination.

use mailsize::storage::CheckpointStore;
use mailsize::{
    AggregationState, CancelFlag, CheckpointError, FileCheckpointStore, InMemoryCheckpointStore,
    InMemoryMailbox, ItemMetadata, LabelCategory, LabelId, MessageId, ScanError, ScanOptions,
    ScanOutcome, Scanner, Termination, load_or_create_state, summary_lines,
};
use tempfile::TempDir;

fn options() -> ScanOptions {
    ScanOptions {
        page_size: 2,
        concurrency: 3,
    }
}

/// Two labels: L1 (user), L2 (system)
fn base_mailbox() -> InMemoryMailbox {
    InMemoryMailbox::new()
        .with_label("L1", "Receipts", LabelCategory::User)
        .with_label("L2", "INBOX", LabelCategory::System)
}

/// Three pages of two messages each
fn three_page_mailbox() -> InMemoryMailbox {
    base_mailbox().with_pages(vec![
        vec![
            ItemMetadata::new("m1", 100, ["L1"]),
            ItemMetadata::new("m2", 200, ["L1", "L2"]),
        ],
        vec![
            ItemMetadata::new("m3", 300, ["L2"]),
            ItemMetadata::new("m4", 400, ["L1"]),
        ],
        vec![
            ItemMetadata::new("m5", 500, ["L1", "L2"]),
            ItemMetadata::new("m6", 600, Vec::<&str>::new()),
        ],
    ])
}

fn run_scan(
    mailbox: &InMemoryMailbox,
    store: &dyn CheckpointStore,
) -> (AggregationState, Result<ScanOutcome, ScanError>) {
    let mut state = load_or_create_state(store, options().page_size).unwrap();
    let outcome = Scanner::new(mailbox, store, options()).run(&mut state);
    (state, outcome)
}

fn label_totals(state: &AggregationState, id: &str) -> (u64, u64) {
    let label = &state.labels[&LabelId::new(id)];
    (label.message_count, label.total_size)
}

#[test]
fn test_single_page_scan() {
    let mailbox = base_mailbox().with_page(
        None,
        vec![
            ItemMetadata::new("A", 100, ["L1"]),
            ItemMetadata::new("B", 50, ["L1", "L2"]),
        ],
        None,
    );
    let store = InMemoryCheckpointStore::new();

    let (state, outcome) = run_scan(&mailbox, &store);

    assert_eq!(outcome.unwrap(), ScanOutcome::Completed(Termination::EndOfList));
    assert!(state.completed);
    assert_eq!(state.processed_count, 2);
    assert_eq!(label_totals(&state, "L1"), (2, 150));
    assert_eq!(label_totals(&state, "L2"), (1, 50));

    // The system label is left out of the summary
    assert_eq!(summary_lines(&state), vec!["Receipts 2 150 B"]);

    // Checkpoint matches the returned state
    assert_eq!(store.load().unwrap().unwrap(), state);
}

#[test]
fn test_multi_page_scan() {
    let mailbox = three_page_mailbox();
    let store = InMemoryCheckpointStore::new();

    let (state, outcome) = run_scan(&mailbox, &store);

    assert_eq!(outcome.unwrap(), ScanOutcome::Completed(Termination::EndOfList));
    assert_eq!(state.processed_count, 6);
    assert_eq!(label_totals(&state, "L1"), (4, 1200));
    assert_eq!(label_totals(&state, "L2"), (3, 1000));
    assert_eq!(state.total_size(), 2200);
    assert_eq!(mailbox.label_calls(), 1);
    assert_eq!(mailbox.page_calls(), 3);
    assert_eq!(mailbox.fetched_ids().len(), 6);

    // Labels, three pages, then the final completed state
    assert_eq!(store.save_count(), 5);
}

#[test]
fn test_crash_then_resume_fetches_only_remaining_pages() {
    let mailbox = base_mailbox().with_pages(vec![
        vec![ItemMetadata::new("A", 100, ["L1"])],
        vec![ItemMetadata::new("B", 50, ["L1", "L2"])],
    ]);
    let store = InMemoryCheckpointStore::new();

    // First run dies while listing page 2
    mailbox.fail_listing_at(Some("page-1"));
    let (_, outcome) = run_scan(&mailbox, &store);
    match outcome {
        Err(ScanError::RemoteService { operation, .. }) => assert_eq!(operation, "list messages"),
        other => panic!("expected a remote service error, got {:?}", other),
    }

    let checkpoint = store.load().unwrap().unwrap();
    assert!(!checkpoint.completed);
    assert_eq!(checkpoint.cursor.as_deref(), Some("page-1"));
    assert_eq!(checkpoint.processed_count, 1);
    assert_eq!(label_totals(&checkpoint, "L1"), (1, 100));

    // Second run against a fresh mailbox only touches page 2
    let rerun = base_mailbox().with_pages(vec![
        vec![ItemMetadata::new("A", 100, ["L1"])],
        vec![ItemMetadata::new("B", 50, ["L1", "L2"])],
    ]);
    let (state, outcome) = run_scan(&rerun, &store);

    assert_eq!(outcome.unwrap(), ScanOutcome::Completed(Termination::EndOfList));
    assert_eq!(rerun.label_calls(), 0);
    assert_eq!(rerun.fetched_ids(), vec![MessageId::new("B")]);
    assert_eq!(state.processed_count, 2);
    assert_eq!(label_totals(&state, "L1"), (2, 150));
    assert_eq!(label_totals(&state, "L2"), (1, 50));
}

#[test]
fn test_resumed_scan_matches_uninterrupted_scan() {
    let uninterrupted_store = InMemoryCheckpointStore::new();
    let (uninterrupted, _) = run_scan(&three_page_mailbox(), &uninterrupted_store);

    let store = InMemoryCheckpointStore::new();
    let flaky = three_page_mailbox();
    flaky.fail_listing_at(Some("page-2"));
    assert!(run_scan(&flaky, &store).1.is_err());

    flaky.heal_listing();
    let (resumed, outcome) = run_scan(&flaky, &store);
    assert!(outcome.is_ok());
    assert_eq!(resumed, uninterrupted);
}

#[test]
fn test_completed_checkpoint_is_not_rescanned() {
    let store = InMemoryCheckpointStore::new();
    let (first, _) = run_scan(&three_page_mailbox(), &store);
    let saves = store.save_count();

    let mailbox = three_page_mailbox();
    let (second, outcome) = run_scan(&mailbox, &store);

    assert_eq!(outcome.unwrap(), ScanOutcome::AlreadyComplete);
    assert_eq!(second, first);
    assert_eq!(mailbox.label_calls(), 0);
    assert_eq!(mailbox.page_calls(), 0);
    assert_eq!(mailbox.handles_opened(), 0);
    assert_eq!(store.save_count(), saves);
}

#[test]
fn test_stalled_cursor_stops_the_scan() {
    let mailbox = base_mailbox()
        .with_page(None, vec![ItemMetadata::new("A", 100, ["L1"])], Some("x"))
        .with_page(Some("x"), vec![ItemMetadata::new("B", 50, ["L1"])], Some("x"));
    let store = InMemoryCheckpointStore::new();

    let (state, outcome) = run_scan(&mailbox, &store);

    assert_eq!(outcome.unwrap(), ScanOutcome::Completed(Termination::CursorStalled));
    assert!(state.completed);
    assert_eq!(state.termination, Some(Termination::CursorStalled));
    // The stalled page is not folded and its cursor stays visible
    assert_eq!(state.processed_count, 1);
    assert_eq!(state.cursor.as_deref(), Some("x"));
    assert_eq!(mailbox.page_calls(), 2);
    assert_eq!(store.load().unwrap().unwrap(), state);
}

#[test]
fn test_empty_mailbox() {
    let mailbox = base_mailbox();
    let store = InMemoryCheckpointStore::new();

    let (state, outcome) = run_scan(&mailbox, &store);

    assert_eq!(outcome.unwrap(), ScanOutcome::Completed(Termination::EndOfList));
    assert_eq!(state.processed_count, 0);
    assert_eq!(state.labels.len(), 2);
    assert!(summary_lines(&state).is_empty());
    assert_eq!(mailbox.handles_opened(), 0);
}

#[test]
fn test_unknown_label_is_fatal_and_page_is_not_folded() {
    let mailbox = base_mailbox().with_pages(vec![
        vec![ItemMetadata::new("A", 100, ["L1"])],
        vec![
            ItemMetadata::new("B", 50, ["L1"]),
            ItemMetadata::new("C", 70, ["GHOST"]),
        ],
    ]);
    let store = InMemoryCheckpointStore::new();

    let (state, outcome) = run_scan(&mailbox, &store);

    match outcome {
        Err(ScanError::UnknownLabel(err)) => {
            assert_eq!(err.item_id, MessageId::new("C"));
            assert_eq!(err.label_id, LabelId::new("GHOST"));
        }
        other => panic!("expected an unknown label error, got {:?}", other),
    }
    assert_eq!(state.processed_count, 1);
    assert_eq!(label_totals(&state, "L1"), (1, 100));
    assert_eq!(store.load().unwrap().unwrap(), state);
}

#[test]
fn test_failed_fetches_are_excluded_and_counted() {
    let mailbox = three_page_mailbox().with_failing_message("m4");
    let store = InMemoryCheckpointStore::new();

    let (state, outcome) = run_scan(&mailbox, &store);

    assert_eq!(outcome.unwrap(), ScanOutcome::Completed(Termination::EndOfList));
    assert_eq!(state.processed_count, 6);
    assert_eq!(state.failed_count, 1);
    assert_eq!(label_totals(&state, "L1"), (3, 800));
}

#[test]
fn test_cancelled_scan_keeps_last_checkpoint() {
    let mailbox = three_page_mailbox();
    let store = InMemoryCheckpointStore::new();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let mut state = load_or_create_state(&store, 2).unwrap();
    let outcome = Scanner::new(&mailbox, &store, options())
        .with_cancel_flag(cancel)
        .run(&mut state)
        .unwrap();

    assert_eq!(outcome, ScanOutcome::Interrupted);
    assert!(!state.completed);
    assert_eq!(state.processed_count, 0);
    assert_eq!(mailbox.page_calls(), 0);
    assert_eq!(store.load().unwrap().unwrap(), state);

    // A later uncancelled run finishes the job
    let (state, outcome) = run_scan(&mailbox, &store);
    assert!(outcome.is_ok());
    assert_eq!(state.processed_count, 6);
}

#[test]
fn test_checkpoint_page_size_wins() {
    let store = InMemoryCheckpointStore::new();
    store.save(&AggregationState::new(10)).unwrap();

    let state = load_or_create_state(&store, 50).unwrap();
    assert_eq!(state.page_size, 10);

    let fresh = load_or_create_state(&InMemoryCheckpointStore::new(), 50).unwrap();
    assert_eq!(fresh.page_size, 50);
}

#[test]
fn test_persistence_failure_is_fatal() {
    let mailbox = three_page_mailbox();
    let store = InMemoryCheckpointStore::new();
    store.set_fail_saves(true);

    let (_, outcome) = run_scan(&mailbox, &store);

    assert!(matches!(
        outcome,
        Err(ScanError::Checkpoint(CheckpointError::Persistence { .. }))
    ));
    assert_eq!(mailbox.page_calls(), 0);
}

#[test]
fn test_scan_with_file_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state").join("snapshot.json");
    let store = FileCheckpointStore::new(&path);

    let (state, outcome) = run_scan(&three_page_mailbox(), &store);
    assert!(outcome.is_ok());
    assert!(path.exists());

    // A second store on the same file sees the completed scan
    let reopened = FileCheckpointStore::new(&path);
    assert_eq!(reopened.load().unwrap().unwrap(), state);

    let mailbox = three_page_mailbox();
    let (_, outcome) = run_scan(&mailbox, &reopened);
    assert_eq!(outcome.unwrap(), ScanOutcome::AlreadyComplete);
    assert_eq!(mailbox.page_calls(), 0);
}
