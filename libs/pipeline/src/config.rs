use std::time::Duration;

use serde::Deserialize;

use crate::PipelineError;

/// Верхняя граница периода flush (сутки).
pub const MAX_FLUSH_INTERVAL_SECS: u64 = 24 * 60 * 60;

// ═══════════════════════════════════════════════════════════════
//  Pipeline Config
// ═══════════════════════════════════════════════════════════════

/// Полная конфигурация pipeline. Собирается один раз после разбора
/// всех источников (файл, env, CLI) и передаётся в конструкторы компонентов.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Адрес для входящих TCP соединений.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Ёмкость Message Queue (handlers → accumulator).
    #[serde(default = "default_queue_cap")]
    pub queue_cap: usize,
    /// Базовый URL sink'а; bulk запросы уходят на `{sink_url}/_bulk`.
    #[serde(default = "default_sink_url")]
    pub sink_url: String,
    /// Количество bulk воркеров.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Период flush по таймеру, секунды.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Порог размера батча в байтах (header + document + `\n`).
    #[serde(default = "default_flush_size")]
    pub flush_size: usize,
    /// Имя индекса в bulk заголовке.
    #[serde(default = "default_index")]
    pub index: String,
    /// Тип документа, если `@type` не задан.
    #[serde(default = "default_doc_type")]
    pub default_doc_type: String,
    /// Ёмкость канала accumulator → workers.
    #[serde(default = "default_handoff_buffer")]
    pub handoff_buffer: usize,
    /// Таймаут одного bulk запроса, секунды.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Сколько ждать завершения задач при остановке, секунды.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            queue_cap: default_queue_cap(),
            sink_url: default_sink_url(),
            workers: default_workers(),
            flush_interval_secs: default_flush_interval_secs(),
            flush_size: default_flush_size(),
            index: default_index(),
            default_doc_type: default_doc_type(),
            handoff_buffer: default_handoff_buffer(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Проверить значения, при которых pipeline не может работать.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let checks: [(bool, &str); 9] = [
            (self.queue_cap == 0, "queue_cap must be greater than 0"),
            (self.workers == 0, "workers must be greater than 0"),
            (self.flush_interval_secs == 0, "flush_interval_secs must be greater than 0"),
            (
                self.flush_interval_secs > MAX_FLUSH_INTERVAL_SECS,
                "flush_interval_secs must not exceed one day",
            ),
            (self.flush_size == 0, "flush_size must be greater than 0"),
            (self.handoff_buffer == 0, "handoff_buffer must be greater than 0"),
            (self.retry.max_attempts == 0, "retry.max_attempts must be greater than 0"),
            (self.sink_url.trim().is_empty(), "sink_url must not be empty"),
            (self.index.trim().is_empty(), "index must not be empty"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(PipelineError::Config(reason.to_string())),
            None => Ok(()),
        }
    }
}

fn default_listen_addr() -> String {
    "localhost".into()
}
fn default_listen_port() -> u16 {
    6030
}
fn default_queue_cap() -> usize {
    10_000
}
fn default_sink_url() -> String {
    "http://localhost:9200".into()
}
fn default_workers() -> usize {
    3
}
fn default_flush_interval_secs() -> u64 {
    30
}
fn default_flush_size() -> usize {
    10 * 1024 * 1024
}
fn default_index() -> String {
    "recon".into()
}
fn default_doc_type() -> String {
    "json".into()
}
fn default_handoff_buffer() -> usize {
    1
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_drain_timeout_secs() -> u64 {
    5
}

// ═══════════════════════════════════════════════════════════════
//  Retry Config
// ═══════════════════════════════════════════════════════════════

/// Повторные попытки bulk запроса: экспоненциальный backoff с потолком.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Всего попыток на батч, включая первую.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Пауза после неудачной попытки номер `attempt` (с 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
