use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use ingest_api::{AckResult, Batch, BulkRequest, BulkSink};

use crate::config::RetryConfig;
use crate::stats::PipelineStats;

/// Итог записи одного батча.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub indexed: usize,
    pub failed: usize,
    pub attempts: u32,
}

// ═══════════════════════════════════════════════════════════════
//  Worker Pool — hand-off channel → sink.bulk()
// ═══════════════════════════════════════════════════════════════

/// Запустить `count` воркеров на общем hand-off канале.
///
/// Каждый батч получает ровно один воркер. Воркеры завершаются,
/// когда accumulator закрыл канал и все батчи разобраны.
pub fn spawn_workers(
    count: usize,
    handoff: mpsc::Receiver<Batch>,
    sink: Arc<dyn BulkSink>,
    retry: RetryConfig,
    stats: Arc<PipelineStats>,
) -> Vec<JoinHandle<()>> {
    let handoff = Arc::new(Mutex::new(handoff));
    (0..count)
        .map(|worker| {
            let handoff = handoff.clone();
            let sink = sink.clone();
            let stats = stats.clone();
            tokio::spawn(async move {
                loop {
                    // Лок держится только на время ожидания батча
                    let batch = handoff.lock().await.recv().await;
                    let Some(batch) = batch else { break };
                    write_batch(worker, batch.into_request(), &*sink, &retry, &stats).await;
                }
                tracing::debug!(worker, "bulk worker stopped");
            })
        })
        .collect()
}

/// Отправить запрос в sink с повторами.
///
/// - transport / 429 / 5xx: повтор всего запроса;
/// - частичный отказ: повтор только документов с retryable статусом,
///   остальные отклонённые документы отбрасываются;
/// - после `max_attempts` попыток остаток батча отбрасывается.
///
/// Пока воркер ждёт backoff, он не берёт новые батчи.
pub async fn write_batch(
    worker: usize,
    request: BulkRequest,
    sink: &dyn BulkSink,
    retry: &RetryConfig,
    stats: &PipelineStats,
) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();
    let mut pending = request;

    loop {
        outcome.attempts += 1;
        let documents = pending.document_count();

        match sink.bulk(&pending).await {
            Ok(ack) if !ack.any_failures() => {
                tracing::info!(worker, documents, took_ms = ack.took, "indexed documents");
                stats.documents_indexed(documents);
                outcome.indexed += documents;
                return outcome;
            }
            Ok(ack) => {
                log_partial_failure(worker, &ack);
                match split_partial_failure(&ack, documents) {
                    Some((accepted, retryable)) => {
                        let dropped = documents - accepted - retryable.len();
                        stats.documents_indexed(accepted);
                        outcome.indexed += accepted;
                        if dropped > 0 {
                            tracing::error!(worker, documents = dropped, "documents rejected by sink, dropping");
                            stats.documents_failed(dropped);
                            outcome.failed += dropped;
                        }
                        if retryable.is_empty() {
                            return outcome;
                        }
                        pending = pending.retain_positions(&retryable);
                    }
                    None => {
                        tracing::error!(
                            worker,
                            documents,
                            items = ack.items.len(),
                            "acknowledgment does not match request, abandoning batch"
                        );
                        stats.batch_abandoned(documents);
                        outcome.failed += documents;
                        return outcome;
                    }
                }
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(worker, documents, attempt = outcome.attempts, error = ?e, "bulk request failed");
            }
            Err(e) => {
                tracing::error!(worker, documents, error = ?e, "bulk request rejected, abandoning batch");
                stats.batch_abandoned(documents);
                outcome.failed += documents;
                return outcome;
            }
        }

        if outcome.attempts >= retry.max_attempts {
            let documents = pending.document_count();
            tracing::error!(
                worker,
                documents,
                attempts = outcome.attempts,
                "retries exhausted, abandoning batch"
            );
            stats.batch_abandoned(documents);
            outcome.failed += documents;
            return outcome;
        }

        let delay = retry.backoff(outcome.attempts);
        tracing::warn!(
            worker,
            documents = pending.document_count(),
            delay_ms = delay.as_millis() as u64,
            "retrying bulk request"
        );
        stats.bulk_retry();
        tokio::time::sleep(delay).await;
    }
}

/// Разделить частичный отказ: (число принятых, позиции для повтора).
/// `None`, если items не соответствуют документам запроса.
fn split_partial_failure(ack: &AckResult, documents: usize) -> Option<(usize, Vec<usize>)> {
    if ack.items.len() != documents {
        return None;
    }
    let failed = ack.failed_positions().len();
    Some((documents - failed, ack.retryable_positions()))
}

fn log_partial_failure(worker: usize, ack: &AckResult) {
    let verbose = serde_json::to_string(ack).unwrap_or_default();
    tracing::warn!(
        worker,
        took_ms = ack.took,
        failed = ack.failed_positions().len(),
        result = %verbose,
        "bulk request partially failed"
    );
}
