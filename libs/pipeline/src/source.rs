use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::PipelineError;
use crate::connection::handle_connection;
use crate::queue::QueueSender;
use crate::stats::PipelineStats;

/// Пауза после ошибки accept (например, исчерпаны дескрипторы).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════
//  Acceptor — listener → per-connection handler tasks
// ═══════════════════════════════════════════════════════════════

/// Открыть listener. Ошибка bind фатальна для процесса.
pub async fn bind_listener(addr: &str) -> Result<TcpListener, PipelineError> {
    let listener = TcpListener::bind(addr).await.map_err(|e| PipelineError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    tracing::info!(%addr, "tcp listener started");
    Ok(listener)
}

/// Запустить acceptor: одна задача на каждое принятое соединение,
/// без ограничения числа одновременных соединений.
pub fn spawn_acceptor(
    listener: TcpListener,
    queue: QueueSender,
    stats: Arc<PipelineStats>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = token.cancelled() => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "new connection");
                    stats.connection_opened();
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        queue.clone(),
                        stats.clone(),
                        token.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                    tokio::select! {
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                        _ = token.cancelled() => break,
                    }
                }
            }
        }
        tracing::info!("acceptor stopped");
    })
}
