use std::io::ErrorKind;

use clap::{Args, Parser, Subcommand};

use pipeline::config::PipelineConfig;

use crate::error::ServerError;

pub const DEFAULT_CONFIG_PATH: &str = "rogue.toml";

#[derive(Parser)]
#[command(name = "rogue-server", about = "TCP → Elasticsearch ingestion server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

/// Флаги перекрывают значения из файла.
#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "ROGUE_CONFIG")]
    pub config: String,

    /// Адрес для входящих TCP соединений
    #[arg(long, env = "ROGUE_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    #[arg(long, env = "ROGUE_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// Ёмкость очереди сообщений
    #[arg(long, env = "ROGUE_QUEUE_CAP")]
    pub queue_cap: Option<usize>,

    /// Базовый URL Elasticsearch
    #[arg(long, env = "ROGUE_ELASTICSEARCH")]
    pub elasticsearch: Option<String>,

    /// Количество bulk воркеров
    #[arg(long, env = "ROGUE_WRITERS")]
    pub writers: Option<usize>,

    /// Период flush, секунды
    #[arg(long, env = "ROGUE_FLUSH_TIME")]
    pub flush_time: Option<u64>,

    /// Порог размера батча, байты
    #[arg(long, env = "ROGUE_FLUSH_SIZE")]
    pub flush_size: Option<usize>,
}

impl ServeArgs {
    /// Собрать итоговый `PipelineConfig`: файл, затем флаги, затем validate.
    pub fn load(&self) -> Result<PipelineConfig, ServerError> {
        let mut config = load_file(&self.config)?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(addr) = &self.listen_addr {
            config.listen_addr = addr.clone();
        }
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(cap) = self.queue_cap {
            config.queue_cap = cap;
        }
        if let Some(url) = &self.elasticsearch {
            config.sink_url = url.clone();
        }
        if let Some(writers) = self.writers {
            config.workers = writers;
        }
        if let Some(secs) = self.flush_time {
            config.flush_interval_secs = secs;
        }
        if let Some(size) = self.flush_size {
            config.flush_size = size;
        }
    }
}

/// Отсутствующий файл по умолчанию не ошибка, берутся defaults.
fn load_file(path: &str) -> Result<PipelineConfig, ServerError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound && path == DEFAULT_CONFIG_PATH => {
            tracing::info!(config = %path, "config file not found, using defaults");
            return Ok(PipelineConfig::default());
        }
        Err(e) => {
            return Err(ServerError::Config { context: "read", detail: format!("'{path}': {e}") });
        }
    };
    let config = toml::from_str(&content)
        .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })?;
    tracing::info!(config = %path, "loaded config");
    Ok(config)
}
