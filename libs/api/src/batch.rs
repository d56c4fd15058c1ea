use std::ops::Range;

use bytes::Bytes;
use serde_json::json;

use crate::{IngestError, ParsedDocument};

// ════════════════════════════════════════════════════════════════
//  Batch
// ════════════════════════════════════════════════════════════════

/// Накапливаемый bulk payload: пары (action header, document),
/// каждая строка завершается `\n`.
///
/// Изменяется только accumulator'ом. При flush батч целиком
/// переходит во владение воркера через [`Batch::into_request`].
#[derive(Debug, Default)]
pub struct Batch {
    body: Vec<u8>,
    /// Границы каждой пары header+document внутри `body`.
    entries: Vec<Range<usize>>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить документ в батч. Возвращает число добавленных байт.
    ///
    /// Header и документ сериализуются до записи, так что при ошибке
    /// батч остаётся неизменным.
    pub fn append(&mut self, index: &str, doc: &ParsedDocument) -> Result<usize, IngestError> {
        let header = serde_json::to_vec(&json!({
            "index": { "_index": index, "_type": doc.doc_type() }
        }))?;
        let document = doc.to_json()?;

        let start = self.body.len();
        self.body.extend_from_slice(&header);
        self.body.push(b'\n');
        self.body.extend_from_slice(&document);
        self.body.push(b'\n');
        self.entries.push(start..self.body.len());

        Ok(self.body.len() - start)
    }

    pub fn document_count(&self) -> usize {
        self.entries.len()
    }

    /// Суммарный размер сериализованных пар, включая разделители.
    pub fn byte_size(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Заморозить батч в готовый к отправке запрос.
    pub fn into_request(self) -> BulkRequest {
        BulkRequest {
            body: Bytes::from(self.body),
            entries: self.entries,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  BulkRequest
// ════════════════════════════════════════════════════════════════

/// Неизменяемое тело bulk запроса. Клонирование дешёвое (`Bytes`),
/// поэтому повторные попытки не копируют payload.
#[derive(Clone, Debug)]
pub struct BulkRequest {
    body: Bytes,
    entries: Vec<Range<usize>>,
}

impl BulkRequest {
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn document_count(&self) -> usize {
        self.entries.len()
    }

    pub fn byte_size(&self) -> usize {
        self.body.len()
    }

    /// Пара header+document под номером `position` (со строковыми `\n`).
    pub fn entry(&self, position: usize) -> Option<&[u8]> {
        self.entries.get(position).map(|r| &self.body[r.clone()])
    }

    /// Собрать новый запрос только из указанных позиций (порядок сохраняется).
    /// Несуществующие позиции игнорируются.
    pub fn retain_positions(&self, positions: &[usize]) -> BulkRequest {
        let mut body = Vec::new();
        let mut entries = Vec::with_capacity(positions.len());
        for &pos in positions {
            if let Some(entry) = self.entry(pos) {
                let start = body.len();
                body.extend_from_slice(entry);
                entries.push(start..body.len());
            }
        }
        BulkRequest {
            body: Bytes::from(body),
            entries,
        }
    }
}
