use std::io;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use market_core::symbols::{parse_symbols_csv, read_symbols, read_symbols_from_path};

const DEFAULT_TICKERS: &str = include_str!("../assets/tickers.txt");

/// Read timeout сессии = "тик" цикла
pub(crate) const SESSION_TICK: Duration = Duration::from_millis(50);
pub(crate) const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const PRICE_INTERVAL_MS: u64 = 1000;
pub(crate) const INDEX_INTERVAL_MS: u64 = 5000;
/// Новость и sentiment раз в столько индексных тиков
pub(crate) const NEWS_EVERY_INDEX_TICKS: u64 = 3;

pub(crate) const BIND_ADDR: &str = "0.0.0.0:8080";

pub(crate) fn load_server_tickers(
    path: Option<PathBuf>,
    inline: Option<&str>,
) -> io::Result<Vec<String>> {
    match (path, inline) {
        (Some(p), _) => read_symbols_from_path(p),
        (None, Some(raw)) => Ok(parse_symbols_csv(raw)),
        (None, None) => read_symbols(Cursor::new(DEFAULT_TICKERS)),
    }
}

pub(crate) type SessionId = u64;
