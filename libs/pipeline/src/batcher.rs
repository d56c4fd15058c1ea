use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use ingest_api::{Batch, ParsedDocument, RawMessage};

use crate::config::PipelineConfig;
use crate::queue::QueueReceiver;
use crate::stats::PipelineStats;

/// Причина flush, попадает в лог.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Size,
    Interval,
    Shutdown,
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushTrigger::Size => f.write_str("size"),
            FlushTrigger::Interval => f.write_str("interval"),
            FlushTrigger::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Параметры accumulator'а.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub index: String,
    pub default_doc_type: String,
    pub flush_size: usize,
    pub flush_interval: Duration,
}

impl From<&PipelineConfig> for BatchSettings {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            index: cfg.index.clone(),
            default_doc_type: cfg.default_doc_type.clone(),
            flush_size: cfg.flush_size,
            flush_interval: cfg.flush_interval(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Accumulator — queue → Batch → worker hand-off
// ═══════════════════════════════════════════════════════════════

/// Однопоточный владелец текущего батча.
struct Accumulator {
    settings: BatchSettings,
    batch: Batch,
    handoff: mpsc::Sender<Batch>,
    stats: Arc<PipelineStats>,
}

impl Accumulator {
    /// Разобрать сообщение и добавить в батч. Битое сообщение
    /// логируется и пропускается, цикл продолжает работу.
    async fn ingest(&mut self, msg: RawMessage) -> bool {
        let doc = match ParsedDocument::parse(
            msg.as_bytes(),
            &self.settings.default_doc_type,
            Utc::now(),
        ) {
            Ok(doc) => doc,
            Err(e) => {
                self.stats.document_malformed();
                tracing::warn!(error = %e, bytes = msg.len(), "malformed document, skipping");
                return true;
            }
        };

        if let Err(e) = self.batch.append(&self.settings.index, &doc) {
            self.stats.document_malformed();
            tracing::warn!(error = %e, "document serialization failed, skipping");
            return true;
        }

        if self.batch.byte_size() >= self.settings.flush_size {
            return self.flush(FlushTrigger::Size).await;
        }
        true
    }

    /// Передать текущий батч воркерам и начать новый.
    /// Ждёт, пока воркер примет батч. `false`, если воркеры остановлены.
    async fn flush(&mut self, trigger: FlushTrigger) -> bool {
        if self.batch.is_empty() {
            return true;
        }
        let batch = std::mem::take(&mut self.batch);
        let documents = batch.document_count();
        tracing::info!(
            documents,
            bytes = batch.byte_size(),
            %trigger,
            "flushing batch"
        );
        self.stats.batch_flushed();

        if self.handoff.send(batch).await.is_err() {
            tracing::error!(documents, "worker pool closed, batch dropped");
            return false;
        }
        true
    }
}

/// Запустить accumulator.
///
/// Ждёт одновременно сообщение из очереди и тик таймера, обрабатывая
/// по одному событию за раз. При отмене `token` закрывает очередь,
/// дочитывает уже принятые сообщения, отправляет последний батч и
/// закрывает hand-off канал, чтобы воркеры завершились.
pub fn spawn_accumulator(
    settings: BatchSettings,
    mut queue: QueueReceiver,
    handoff: mpsc::Sender<Batch>,
    stats: Arc<PipelineStats>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = settings.flush_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut acc = Accumulator {
            settings,
            batch: Batch::new(),
            handoff,
            stats,
        };

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !acc.flush(FlushTrigger::Interval).await {
                        return;
                    }
                }
                msg = queue.recv() => {
                    match msg {
                        Some(msg) => {
                            if !acc.ingest(msg).await {
                                return;
                            }
                        }
                        None => break,
                    }
                }
                _ = token.cancelled() => {
                    queue.close();
                    while let Some(msg) = queue.recv().await {
                        if !acc.ingest(msg).await {
                            return;
                        }
                    }
                    break;
                }
            }
        }

        acc.flush(FlushTrigger::Shutdown).await;
        tracing::info!("accumulator stopped");
    })
}
