pub mod codec;
pub mod config;
pub mod error;
pub mod queue;
pub mod stats;
mod batcher;
mod connection;
mod sink;
mod source;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ingest_api::BulkSink;

pub use batcher::{BatchSettings, FlushTrigger, spawn_accumulator};
pub use connection::{Response, handle_connection};
pub use error::PipelineError;
pub use sink::{WriteOutcome, spawn_workers, write_batch};
pub use source::{bind_listener, spawn_acceptor};
pub use stats::{PipelineStats, StatsSnapshot};

use config::PipelineConfig;
use queue::message_queue;

/// Запущенный pipeline: acceptor + accumulator + воркеры.
pub struct Pipeline {
    local_addr: SocketAddr,
    stats: Arc<PipelineStats>,
    handles: Vec<JoinHandle<()>>,
}

/// Собрать и запустить pipeline.
///
/// acceptor → connection handlers → Message Queue → accumulator
/// → hand-off → workers → sink.
pub async fn spawn_pipeline(
    config: &PipelineConfig,
    sink: Arc<dyn BulkSink>,
    token: CancellationToken,
) -> Result<Pipeline, PipelineError> {
    config.validate()?;

    let listener = bind_listener(&config.bind_address()).await?;
    let local_addr = listener.local_addr().map_err(PipelineError::LocalAddr)?;

    let stats = Arc::new(PipelineStats::new());
    let (queue_tx, queue_rx) = message_queue(config.queue_cap);
    let (handoff_tx, handoff_rx) = mpsc::channel(config.handoff_buffer);

    let mut handles = spawn_workers(
        config.workers,
        handoff_rx,
        sink,
        config.retry,
        stats.clone(),
    );
    handles.push(spawn_accumulator(
        BatchSettings::from(config),
        queue_rx,
        handoff_tx,
        stats.clone(),
        token.clone(),
    ));
    handles.push(spawn_acceptor(listener, queue_tx, stats.clone(), token));

    tracing::info!(
        addr = %local_addr,
        queue_cap = config.queue_cap,
        workers = config.workers,
        flush_interval_secs = config.flush_interval_secs,
        flush_size = config.flush_size,
        "pipeline started"
    );

    Ok(Pipeline {
        local_addr,
        stats,
        handles,
    })
}

impl Pipeline {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Дождаться завершения задач после отмены token'а.
    /// По истечении `timeout` оставшиеся задачи прерываются.
    /// Возвращает `true`, если все задачи завершились сами.
    pub async fn drain(self, timeout: Duration) -> bool {
        let abort_handles: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();
        let join_all = async {
            for h in self.handles {
                let _ = h.await;
            }
        };

        match tokio::time::timeout(timeout, join_all).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "drain timeout, aborting tasks");
                for h in abort_handles {
                    h.abort();
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod sink_test;
