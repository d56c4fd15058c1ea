//! Tests for the bulk worker pool

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use ingest_api::{AckResult, BulkSink, IngestError};

use crate::config::RetryConfig;
use crate::sink::{WriteOutcome, spawn_workers, write_batch};
use crate::stats::PipelineStats;
use crate::test_support::{MemorySink, ack_with_statuses, batch_of, doc_ids};

fn retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_backoff_ms: 100,
        max_backoff_ms: 1_000,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_batch_delivered_exactly_once() {
    let sink = Arc::new(MemorySink::new().with_delay(Duration::from_millis(5)));
    let stats = Arc::new(PipelineStats::new());
    let (tx, rx) = mpsc::channel(1);

    let workers = spawn_workers(3, rx, sink.clone() as Arc<dyn BulkSink>, retry(3), stats.clone());

    for i in 0..10 {
        tx.send(batch_of([i])).await.unwrap();
    }
    drop(tx);
    for w in workers {
        w.await.unwrap();
    }

    let requests = sink.requests();
    assert_eq!(requests.len(), 10);
    let ids: Vec<u64> = requests.iter().flat_map(doc_ids).collect();
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 10);
    assert_eq!(unique, (0..10).collect::<HashSet<u64>>());
    assert_eq!(stats.snapshot().documents_indexed, 10);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_retried() {
    let sink = MemorySink::scripted(vec![Err(IngestError::io("connection refused"))]);
    let stats = PipelineStats::new();

    let outcome = write_batch(0, batch_of(0..2).into_request(), &sink, &retry(3), &stats).await;

    assert_eq!(outcome, WriteOutcome { indexed: 2, failed: 0, attempts: 2 });
    assert_eq!(sink.requests().len(), 2);
    assert_eq!(stats.snapshot().bulk_retries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_abandons_without_retry() {
    let sink = MemorySink::scripted(vec![Err(IngestError::http(400, "illegal_argument_exception"))]);
    let stats = PipelineStats::new();

    let outcome = write_batch(0, batch_of(0..4).into_request(), &sink, &retry(3), &stats).await;

    assert_eq!(outcome, WriteOutcome { indexed: 0, failed: 4, attempts: 1 });
    assert_eq!(sink.requests().len(), 1);
    assert_eq!(stats.snapshot().batches_abandoned, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_abandons_batch() {
    let sink = MemorySink::scripted(vec![
        Err(IngestError::http(503, "unavailable")),
        Err(IngestError::io("timeout")),
        Err(IngestError::io("timeout")),
    ]);
    let stats = PipelineStats::new();

    let outcome = write_batch(0, batch_of(0..3).into_request(), &sink, &retry(3), &stats).await;

    assert_eq!(outcome, WriteOutcome { indexed: 0, failed: 3, attempts: 3 });
    let s = stats.snapshot();
    assert_eq!(s.bulk_retries, 2);
    assert_eq!(s.batches_abandoned, 1);
    assert_eq!(s.documents_failed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_retries_only_retryable_documents() {
    let sink = MemorySink::scripted(vec![Ok(ack_with_statuses(&[201, 400, 503]))]);
    let stats = PipelineStats::new();

    let outcome = write_batch(0, batch_of(0..3).into_request(), &sink, &retry(3), &stats).await;

    assert_eq!(outcome, WriteOutcome { indexed: 2, failed: 1, attempts: 2 });
    let requests = sink.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(doc_ids(&requests[0]), vec![0, 1, 2]);
    assert_eq!(doc_ids(&requests[1]), vec![2]);

    let s = stats.snapshot();
    assert_eq!(s.documents_indexed, 2);
    assert_eq!(s.documents_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_without_retryable_items_stops() {
    let sink = MemorySink::scripted(vec![Ok(ack_with_statuses(&[201, 400]))]);
    let stats = PipelineStats::new();

    let outcome = write_batch(0, batch_of(0..2).into_request(), &sink, &retry(3), &stats).await;

    assert_eq!(outcome, WriteOutcome { indexed: 1, failed: 1, attempts: 1 });
    assert_eq!(stats.snapshot().bulk_retries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_acknowledgment_abandons_batch() {
    let ack = AckResult { took: 1, errors: true, items: Vec::new() };
    let sink = MemorySink::scripted(vec![Ok(ack)]);
    let stats = PipelineStats::new();

    let outcome = write_batch(0, batch_of(0..2).into_request(), &sink, &retry(3), &stats).await;

    assert_eq!(outcome, WriteOutcome { indexed: 0, failed: 2, attempts: 1 });
    assert_eq!(stats.snapshot().batches_abandoned, 1);
}
