use std::future::Future;
use std::pin::Pin;

mod ack;
mod batch;
mod document;
mod error;

pub use ack::{AckItem, AckResult};
pub use batch::{Batch, BulkRequest};
pub use document::{ParsedDocument, RawMessage, TIMESTAMP_FIELD, TYPE_FIELD};
pub use error::{ErrorKind, IngestError, is_retryable_status};

/// Максимальный размер одного сообщения (256 KiB). Более длинные
/// сообщения обрезаются до этого размера.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

// ════════════════════════════════════════════════════════════════
//  Sink Trait
// ════════════════════════════════════════════════════════════════

/// Downstream хранилище документов, принимающее bulk payload.
///
/// Один вызов `bulk` соответствует одному HTTP запросу на один flushed batch.
/// Реализации: Elasticsearch (`sink-elasticsearch`), in-memory в тестах.
pub trait BulkSink: Send + Sync {
    /// Отправить запрос и вернуть разобранный acknowledgment.
    fn bulk<'a>(
        &'a self,
        request: &'a BulkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<AckResult, IngestError>> + Send + 'a>>;
}
