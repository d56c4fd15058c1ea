use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{IngestError, is_retryable_status};

/// Ответ sink'а на bulk запрос: `{took, errors, items}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AckResult {
    /// Время обработки на стороне sink'а, мс.
    #[serde(default)]
    pub took: u64,
    /// `true` если хотя бы один документ не принят.
    #[serde(default)]
    pub errors: bool,
    /// Результат по каждому документу, в порядке запроса.
    #[serde(default)]
    pub items: Vec<AckItem>,
}

impl AckResult {
    pub fn from_slice(body: &[u8]) -> Result<Self, IngestError> {
        serde_json::from_slice(body)
            .map_err(|e| IngestError::format_err(format!("bulk acknowledgment: {e}")))
    }

    pub fn any_failures(&self) -> bool {
        self.errors || self.items.iter().any(AckItem::is_failure)
    }

    /// Позиции документов, которые sink не принял.
    pub fn failed_positions(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_failure())
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Позиции отклонённых документов, которые имеет смысл отправить повторно.
    pub fn retryable_positions(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_failure() && item.is_retryable())
            .map(|(pos, _)| pos)
            .collect()
    }
}

/// Один элемент `items`: `{"<action>": {"status": .., "error": ..}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckItem(Map<String, Value>);

impl AckItem {
    fn action(&self) -> Option<&Map<String, Value>> {
        self.0.values().next().and_then(Value::as_object)
    }

    pub fn status(&self) -> Option<u16> {
        self.action()?
            .get("status")?
            .as_u64()
            .and_then(|s| u16::try_from(s).ok())
    }

    pub fn error(&self) -> Option<&Value> {
        self.action()?.get("error").filter(|e| !e.is_null())
    }

    pub fn is_failure(&self) -> bool {
        self.error().is_some() || self.status().is_some_and(|s| s >= 300)
    }

    pub fn is_retryable(&self) -> bool {
        self.status().is_some_and(is_retryable_status)
    }
}
