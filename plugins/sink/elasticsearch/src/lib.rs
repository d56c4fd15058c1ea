use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ingest_api::{AckResult, BulkRequest, BulkSink, IngestError};

/// Elasticsearch `_bulk` sink.
///
/// Один flushed batch отправляется одним `POST {base_url}/_bulk` с NDJSON телом.
/// Ответ разбирается в [`AckResult`]; повторы решает вызывающий.
pub struct ElasticsearchSink {
    http: reqwest::Client,
    bulk_url: String,
}

impl ElasticsearchSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IngestError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(IngestError::config("elasticsearch url is empty"));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            bulk_url: format!("{base_url}/_bulk"),
        })
    }

    pub fn bulk_url(&self) -> &str {
        &self.bulk_url
    }

    async fn exec(&self, request: &BulkRequest) -> Result<AckResult, IngestError> {
        let resp = self
            .http
            .post(&self.bulk_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(request.body().clone())
            .send()
            .await
            .map_err(|e| IngestError::io(format!("ES request: {e}")))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| IngestError::io(format!("ES read: {e}")))?;

        if !status.is_success() {
            return Err(IngestError::http(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        let ack = AckResult::from_slice(&body)?;
        tracing::debug!(
            documents = request.document_count(),
            bytes = request.byte_size(),
            took_ms = ack.took,
            errors = ack.errors,
            "bulk request acknowledged"
        );
        Ok(ack)
    }
}

impl BulkSink for ElasticsearchSink {
    fn bulk<'a>(
        &'a self,
        request: &'a BulkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<AckResult, IngestError>> + Send + 'a>> {
        Box::pin(self.exec(request))
    }
}
