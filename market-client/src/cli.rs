use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use market_core::{PING_INTERVAL, RECONNECT_DELAY};

/// Market Client - подписка на push-поток рыночных данных.
///
/// Адрес эндпоинта выводится из origin: https -> wss, http -> ws, путь /ws.
/// Соединение держится keep-alive ping'ом и восстанавливается после обрыва.
#[derive(Parser, Debug, Clone)]
#[command(name = "market-client", version, about)]
pub(crate) struct Args {
    /// Origin приложения, например https://app.example.com или http://127.0.0.1:8080
    #[arg(long)]
    pub(crate) origin: String,

    /// Id пользователя для сообщения authenticate
    #[arg(long)]
    pub(crate) user_id: Option<String>,

    /// Файл символов (по одному или через запятую на строку). Нельзя вместе с --symbols
    #[arg(long, conflicts_with = "symbols")]
    pub(crate) symbols_file: Option<PathBuf>,

    /// Список символов строкой, например: "AAPL,TSLA" или "AAPL, TSLA, GOOG"
    #[arg(long, conflicts_with = "symbols_file")]
    pub(crate) symbols: Option<String>,

    /// Каналы через запятую, например: "market-indices,news"
    #[arg(long)]
    pub(crate) channels: Option<String>,

    /// Не переподключаться после обрыва
    #[arg(long)]
    pub(crate) no_reconnect: bool,

    /// Интервал keep-alive ping в секундах (0 — не пинговать)
    #[arg(long, default_value_t = PING_INTERVAL.as_secs())]
    pub(crate) ping_interval_secs: u64,

    /// Задержка перед переподключением в миллисекундах
    #[arg(long, default_value_t = RECONNECT_DELAY.as_millis() as u64)]
    pub(crate) reconnect_delay_ms: u64,
}

impl Args {
    /// Валидация аргументов, которую не выразить через clap
    pub(crate) fn validate(&self) -> Result<()> {
        if self.origin.trim().is_empty() {
            bail!("--origin is empty");
        }

        if let Some(path) = &self.symbols_file {
            let md = std::fs::metadata(path)
                .with_context(|| format!("symbols file not found: {:?}", path))?;
            if !md.is_file() {
                bail!("--symbols-file must point to a file: {:?}", path);
            }
        }

        Ok(())
    }

    pub(crate) fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub(crate) fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
