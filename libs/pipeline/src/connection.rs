use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use ingest_api::{MAX_MESSAGE_SIZE, RawMessage};

use crate::codec::{Frame, MessageCodec};
use crate::queue::{PushError, QueueSender};
use crate::stats::PipelineStats;

// ═══════════════════════════════════════════════════════════════
//  Response
// ═══════════════════════════════════════════════════════════════

/// Статус, отправляемый клиенту на каждое сообщение.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// 200: сообщение принято в очередь.
    Accepted(usize),
    /// 204: пустая строка, ничего не поставлено в очередь.
    Empty,
    /// 400: превышен лимит размера; в очередь ушёл обрезанный префикс.
    TooLarge(usize),
    /// 503: очередь заполнена, сообщение отброшено.
    QueueFull,
}

impl Response {
    pub fn code(&self) -> u16 {
        match self {
            Response::Accepted(_) => 200,
            Response::Empty => 204,
            Response::TooLarge(_) => 400,
            Response::QueueFull => 503,
        }
    }

    /// Строка ответа: `<code>|<byteLen>|<info>\n`.
    pub fn encode(&self) -> String {
        let (len, info) = match *self {
            Response::Accepted(len) => (len, "received"),
            Response::Empty => (0, "received empty message"),
            Response::TooLarge(len) => (len, "exceeds message size limit"),
            Response::QueueFull => (0, "message queue full"),
        };
        format!("{}|{}|{}\n", self.code(), len, info)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Admission
// ═══════════════════════════════════════════════════════════════

/// Решение по одному сообщению: ответ клиенту и нужно ли закрыть соединение.
pub(crate) fn admit(frame: Frame, queue: &QueueSender, stats: &PipelineStats) -> (Response, bool) {
    if queue.is_full() {
        stats.message_rejected();
        tracing::debug!(depth = queue.depth(), "message queue full, rejecting");
        return (Response::QueueFull, false);
    }

    match frame {
        Frame::Oversized { prefix, len } => enqueue_truncated(prefix, len, queue, stats),
        Frame::Message(msg) if msg.is_empty() => {
            stats.message_empty();
            (Response::Empty, false)
        }
        Frame::Message(msg) => enqueue(msg, queue, stats),
    }
}

/// Поставить обрезанный префикс в очередь. Ответ 400 и закрытие
/// соединения не зависят от того, удалось ли поставить префикс.
pub(crate) fn enqueue_truncated(
    prefix: RawMessage,
    len: usize,
    queue: &QueueSender,
    stats: &PipelineStats,
) -> (Response, bool) {
    stats.message_oversized();
    tracing::warn!(len, limit = MAX_MESSAGE_SIZE, "message exceeds size limit, truncating");
    if queue.try_push(prefix).is_err() {
        tracing::warn!(len, "message queue unavailable, truncated message dropped");
    }
    (Response::TooLarge(len), true)
}

/// Поставить сообщение в очередь. Очередь могла заполниться после
/// проверки в `admit`: тогда 503 вместо 200.
pub(crate) fn enqueue(msg: RawMessage, queue: &QueueSender, stats: &PipelineStats) -> (Response, bool) {
    let len = msg.len();
    match queue.try_push(msg) {
        Ok(()) => {
            stats.message_accepted();
            (Response::Accepted(len), false)
        }
        Err(PushError::Full(_)) => {
            stats.message_rejected();
            tracing::debug!(depth = queue.depth(), "message queue filled up, rejecting");
            (Response::QueueFull, false)
        }
        Err(PushError::Closed(_)) => {
            stats.message_rejected();
            (Response::QueueFull, true)
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Connection Handler
// ═══════════════════════════════════════════════════════════════

/// Читает newline-delimited сообщения из одного соединения, кладёт
/// их в Message Queue и отвечает статусной строкой на каждое.
///
/// Соединение закрывается на EOF, ошибке чтения/записи, после 400
/// или по отмене `token`.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    queue: QueueSender,
    stats: Arc<PipelineStats>,
    token: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, MessageCodec::new(MAX_MESSAGE_SIZE));

    loop {
        let frame = tokio::select! {
            frame = frames.next() => frame,
            _ = token.cancelled() => break,
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                tracing::debug!(%peer, error = %e, "read error");
                break;
            }
            None => break,
        };

        let (response, close) = admit(frame, &queue, &stats);
        if let Err(e) = writer.write_all(response.encode().as_bytes()).await {
            tracing::debug!(%peer, error = %e, "write error");
            break;
        }
        if close {
            tracing::debug!(%peer, code = response.code(), "closing connection");
            break;
        }
    }

    let _ = writer.shutdown().await;
    tracing::debug!(%peer, "connection closed");
}
