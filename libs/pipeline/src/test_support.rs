//! In-memory sink and helpers shared by pipeline tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use ingest_api::{AckResult, Batch, BulkRequest, BulkSink, IngestError, ParsedDocument};

/// Записывает каждый запрос; отвечает по сценарию, затем успехом.
pub(crate) struct MemorySink {
    requests: Mutex<Vec<BulkRequest>>,
    script: Mutex<VecDeque<Result<AckResult, IngestError>>>,
    delay: Duration,
}

impl MemorySink {
    pub(crate) fn new() -> Self {
        Self::scripted(Vec::new())
    }

    pub(crate) fn scripted(responses: Vec<Result<AckResult, IngestError>>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(responses.into()),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn requests(&self) -> Vec<BulkRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl BulkSink for MemorySink {
    fn bulk<'a>(
        &'a self,
        request: &'a BulkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<AckResult, IngestError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| Ok(ack_with_statuses(&vec![201; request.document_count()])))
        })
    }
}

/// Acknowledgment с заданными статусами по документам.
pub(crate) fn ack_with_statuses(statuses: &[u16]) -> AckResult {
    let items: Vec<_> = statuses
        .iter()
        .map(|&status| {
            if status >= 300 {
                json!({"index": {"_index": "recon", "status": status, "error": {"type": "test"}}})
            } else {
                json!({"index": {"_index": "recon", "status": status}})
            }
        })
        .collect();
    let errors = statuses.iter().any(|&s| s >= 300);
    serde_json::from_value(json!({"took": 3, "errors": errors, "items": items})).unwrap()
}

/// Батч из документов `{"n": i}` для i в `ids`.
pub(crate) fn batch_of(ids: impl IntoIterator<Item = usize>) -> Batch {
    let mut batch = Batch::new();
    for i in ids {
        let doc = ParsedDocument::parse(format!(r#"{{"n":{i}}}"#).as_bytes(), "json", Utc::now())
            .unwrap();
        batch.append("recon", &doc).unwrap();
    }
    batch
}

/// Номера документов `n` из тела запроса, в порядке следования.
pub(crate) fn doc_ids(request: &BulkRequest) -> Vec<u64> {
    std::str::from_utf8(request.body())
        .unwrap()
        .lines()
        .skip(1)
        .step_by(2)
        .map(|line| {
            let doc: serde_json::Value = serde_json::from_str(line).unwrap();
            doc["n"].as_u64().unwrap()
        })
        .collect()
}
