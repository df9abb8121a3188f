use quill_persist::{MemoryStreamStore, PersistError, StreamStore};
use quill_types::{StreamOutcome, StreamStatus};
use std::sync::Arc;

#[tokio::test]
async fn test_appends_concatenate_in_call_order() {
    let store = MemoryStreamStore::new();
    let id = store.create_stream().await.unwrap();

    let chunks = ["Hel", "lo", ", ", "wörld", "", "!"];
    for (i, chunk) in chunks.iter().enumerate() {
        let generation = store.append_chunk(&id, chunk).await.unwrap();
        assert_eq!(generation, i as u64 + 1);
    }

    let read = store.read(&id, None).await.unwrap();
    assert_eq!(read.text, chunks.concat());
    assert_eq!(read.generation, chunks.len() as u64);
    assert_eq!(read.status, StreamStatus::Streaming);
}

#[tokio::test]
async fn test_new_stream_is_pending_and_empty() {
    let store = MemoryStreamStore::new();
    let id = store.create_stream().await.unwrap();

    let read = store.read(&id, None).await.unwrap();
    assert_eq!(read.status, StreamStatus::Pending);
    assert_eq!(read.text, "");
    assert_eq!(read.generation, 0);
}

#[tokio::test]
async fn test_finalize_twice_keeps_first_result() {
    let store = MemoryStreamStore::new();
    let id = store.create_stream().await.unwrap();

    let first = store.finalize(&id, "A", StreamOutcome::Done).await.unwrap();
    let second = store.finalize(&id, "B", StreamOutcome::Done).await.unwrap();
    let third = store.finalize(&id, "C", StreamOutcome::Error).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(third.text, "A");
    assert_eq!(third.status, StreamStatus::Done);
}

#[tokio::test]
async fn test_append_to_terminal_stream_is_rejected() {
    let store = MemoryStreamStore::new();
    let id = store.create_stream().await.unwrap();
    store.append_chunk(&id, "Hel").await.unwrap();
    store.finalize(&id, "Sorry", StreamOutcome::Error).await.unwrap();

    let err = store.append_chunk(&id, "lo").await.unwrap_err();
    assert!(matches!(
        err,
        PersistError::InvalidState { status: StreamStatus::Error, .. }
    ));

    let read = store.read(&id, None).await.unwrap();
    assert_eq!(read.text, "Sorry");
    assert_eq!(read.status, StreamStatus::Error);
    assert_eq!(read.generation, 1);
}

#[tokio::test]
async fn test_pending_can_finalize_directly() {
    let store = MemoryStreamStore::new();
    let id = store.create_stream().await.unwrap();

    let snapshot = store.finalize(&id, "failed early", StreamOutcome::Error).await.unwrap();
    assert_eq!(snapshot.status, StreamStatus::Error);
    assert_eq!(snapshot.generation, 0);
}

#[tokio::test]
async fn test_incremental_reads_replay_from_offset() {
    let store = MemoryStreamStore::new();
    let id = store.create_stream().await.unwrap();

    store.append_chunk(&id, "H").await.unwrap();
    let first = store.read(&id, Some(0)).await.unwrap();
    assert!(first.is_delta);
    assert_eq!(first.text, "H");

    store.append_chunk(&id, "i").await.unwrap();
    store.append_chunk(&id, "!").await.unwrap();
    let next = store.read(&id, Some(first.generation)).await.unwrap();
    assert!(next.is_delta);
    assert_eq!(next.text, "i!");
    assert_eq!(next.generation, 3);

    // Same offset read twice returns the same suffix
    let again = store.read(&id, Some(first.generation)).await.unwrap();
    assert_eq!(again, next);
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let store = Arc::new(MemoryStreamStore::new());
    let id = store.create_stream().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        let id = id.clone();
        handles.push(tokio::spawn(async move { store.claim(&id).await.unwrap() }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_readers_never_see_partial_chunks() {
    let store = Arc::new(MemoryStreamStore::new());
    let id = store.create_stream().await.unwrap();
    let chunk = "abcdefgh";

    let writer = {
        let store = Arc::clone(&store);
        let id = id.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                store.append_chunk(&id, chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        let id = id.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let read = store.read(&id, None).await.unwrap();
                assert_eq!(read.text.len(), read.generation as usize * chunk.len());
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}
