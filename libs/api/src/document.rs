use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::IngestError;

/// Поле с временем документа.
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Поле с типом документа; определяет `_type` в bulk заголовке.
pub const TYPE_FIELD: &str = "@type";

/// Сырое сообщение из TCP соединения: байты строки без `\n`.
///
/// Владение передаётся целиком: handler → queue → accumulator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    bytes: Vec<u8>,
}

impl RawMessage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for RawMessage {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

/// Разобранный JSON документ с гарантированными `@timestamp` и `@type`.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedDocument {
    fields: Map<String, Value>,
    doc_type: String,
}

impl ParsedDocument {
    /// Разобрать сообщение как JSON объект и дополнить производные поля.
    ///
    /// - `@timestamp`: сохраняется как есть, иначе время приёма (RFC 3339, UTC).
    /// - `@type`: строковое значение задаёт тип документа; если поле
    ///   отсутствует, записывается `default_type`. Нестроковое значение
    ///   остаётся в документе, но тип берётся из `default_type`.
    pub fn parse(
        raw: &[u8],
        default_type: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Self, IngestError> {
        let value: Value = serde_json::from_slice(raw)?;
        let Value::Object(mut fields) = value else {
            return Err(IngestError::format_err(format!(
                "expected JSON object, got {}",
                json_kind(&value)
            )));
        };

        if !fields.contains_key(TIMESTAMP_FIELD) {
            fields.insert(
                TIMESTAMP_FIELD.to_string(),
                Value::String(received_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }

        let doc_type = match fields.get(TYPE_FIELD) {
            Some(Value::String(t)) => t.clone(),
            Some(_) => default_type.to_string(),
            None => {
                fields.insert(TYPE_FIELD.to_string(), Value::String(default_type.to_string()));
                default_type.to_string()
            }
        };

        Ok(Self { fields, doc_type })
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn timestamp(&self) -> Option<&Value> {
        self.fields.get(TIMESTAMP_FIELD)
    }

    /// Сериализовать документ в одну JSON строку (без `\n`).
    pub fn to_json(&self) -> Result<Vec<u8>, IngestError> {
        Ok(serde_json::to_vec(&self.fields)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 6, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn fills_missing_timestamp_and_type() {
        let doc = ParsedDocument::parse(br#"{"msg":"hello"}"#, "json", at()).unwrap();
        assert_eq!(doc.doc_type(), "json");
        assert_eq!(doc.timestamp(), Some(&Value::String("2015-06-01T12:30:00Z".into())));
        assert_eq!(doc.fields()["@type"], "json");
        assert_eq!(doc.fields()["msg"], "hello");
    }

    #[test]
    fn keeps_declared_fields() {
        let raw = br#"{"@timestamp":"2014-01-01T00:00:00Z","@type":"nginx","code":200}"#;
        let doc = ParsedDocument::parse(raw, "json", at()).unwrap();
        assert_eq!(doc.doc_type(), "nginx");
        assert_eq!(doc.fields()["@timestamp"], "2014-01-01T00:00:00Z");
        assert_eq!(doc.fields().len(), 3);
    }

    #[test]
    fn non_string_type_falls_back_to_default() {
        let doc = ParsedDocument::parse(br#"{"@type":42}"#, "json", at()).unwrap();
        assert_eq!(doc.doc_type(), "json");
        assert_eq!(doc.fields()["@type"], 42);
    }

    #[test]
    fn rejects_non_object() {
        let err = ParsedDocument::parse(b"[1,2,3]", "json", at()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
        assert!(err.message().contains("array"));

        let err = ParsedDocument::parse(b"hello", "json", at()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }
}
