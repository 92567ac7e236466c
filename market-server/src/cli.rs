use clap::{ArgGroup, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config;

/// Market Server - dev push-сервер: раздаёт котировки, индексы и новости по WebSocket.
#[derive(Parser, Debug, Clone)]
#[command(name = "market-server", version, about)]
#[command(
    group(
        ArgGroup::new("tickers_source")
            .required(false)
            .multiple(false)
            .args(["tickers_file", "tickers"])
    )
)]
pub(crate) struct Args {
    /// Адрес WebSocket listener, например 0.0.0.0:8080
    #[arg(long, default_value = config::BIND_ADDR)]
    pub(crate) bind: SocketAddr,

    /// Источник тикеров: файл (по одному тикеру на строку, поддержка # комментариев)
    #[arg(long, conflicts_with = "tickers")]
    pub(crate) tickers_file: Option<PathBuf>,

    /// Источник тикеров: CSV строка "AAPL, TSLA, GOOG"
    #[arg(long, conflicts_with = "tickers_file")]
    pub(crate) tickers: Option<String>,

    /// Период рассылки цен, мс
    #[arg(long, default_value_t = config::PRICE_INTERVAL_MS)]
    pub(crate) price_interval_ms: u64,

    /// Период рассылки индексов, мс
    #[arg(long, default_value_t = config::INDEX_INTERVAL_MS)]
    pub(crate) index_interval_ms: u64,
}

impl Args {
    pub(crate) fn price_interval(&self) -> Duration {
        Duration::from_millis(self.price_interval_ms.max(1))
    }

    pub(crate) fn index_interval(&self) -> Duration {
        Duration::from_millis(self.index_interval_ms.max(1))
    }
}
