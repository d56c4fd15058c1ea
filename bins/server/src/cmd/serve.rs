use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ingest_api::BulkSink;
use pipeline::spawn_pipeline;
use sink_elasticsearch::ElasticsearchSink;

use crate::config::ServeArgs;
use crate::error::ServerError;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("rogue-server starting");

    // --- Load config ---
    let config = args.load()?;

    // --- Sink ---
    let sink = ElasticsearchSink::new(&config.sink_url, config.request_timeout())?;
    tracing::info!(
        url = %sink.bulk_url(),
        index = %config.index,
        timeout_secs = config.request_timeout_secs,
        "elasticsearch sink configured"
    );
    let sink: Arc<dyn BulkSink> = Arc::new(sink);

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();
    let pipeline = spawn_pipeline(&config, sink, token.clone()).await?;
    let stats = pipeline.stats().clone();
    tracing::info!(addr = %pipeline.local_addr(), "server ready");

    // --- Ожидание Ctrl+C ---
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");

    // Acceptor и handlers останавливаются, accumulator сбрасывает очередь
    token.cancel();

    let timeout = config.drain_timeout();
    if !pipeline.drain(timeout).await {
        tracing::warn!(timeout_secs = config.drain_timeout_secs, "pending batches may be lost");
    }

    let s = stats.snapshot();
    tracing::info!(
        connections = s.connections_total,
        accepted = s.messages_accepted,
        empty = s.messages_empty,
        oversized = s.messages_oversized,
        rejected = s.messages_rejected,
        malformed = s.documents_malformed,
        batches = s.batches_flushed,
        indexed = s.documents_indexed,
        failed = s.documents_failed,
        abandoned = s.batches_abandoned,
        retries = s.bulk_retries,
        "final stats"
    );

    tracing::info!("shutdown complete");
    Ok(())
}
