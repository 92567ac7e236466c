//! # market-core
//!
//! Общие типы и протокол для market-client / market-server.
//!
//! Этот крейт содержит:
//!
//! - [`protocol`] — JSON-сообщения клиент <-> сервер с дискриминатором `type`
//! - [`types`] — доменные типы (котировка, снапшот индекса)
//! - [`endpoint`] — вычисление URL push-эндпоинта из origin
//! - [`symbols`] — нормализация и чтение списков символов/каналов
//! - [`hub`] — bounded fan-out одного события на много читателей
//! - [`error`] — типы ошибок `market-core`
//!
//! ## Пример: разбор входящего кадра
//!
//! ```rust
//! use market_core::protocol::{parse_server_message, ServerMessage};
//!
//! let msg = parse_server_message(r#"{"type":"price","data":[{"symbol":"AAPL","price":101}]}"#).unwrap();
//! match msg {
//!     ServerMessage::Price { batch, .. } => assert_eq!(batch.quotes[0].symbol, "AAPL"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```
//!
//! ## Пример: адрес эндпоинта
//!
//! ```rust
//! use market_core::endpoint::stream_url;
//!
//! let url = stream_url("https://app.example.com/portfolio").unwrap();
//! assert_eq!(url.as_str(), "wss://app.example.com/ws");
//! ```
//!
//! ## Дизайн
//!
//! Здесь нет сети и собственных потоков: только типы, (де)сериализация
//! и мелкие утилиты, которые нужны и клиенту, и серверу, и тестам.

#![forbid(unsafe_code)]

/// Протокол сообщений.
pub mod protocol;

/// Доменные типы.
pub mod types;

/// URL эндпоинта.
pub mod endpoint;

/// Символы и каналы.
pub mod symbols;

/// Fan-out хаб.
pub mod hub;

/// Ошибки `market-core`.
pub mod error;

/// Общие константы
mod constants;
pub use constants::{
    MARKET_INDICES_CHANNEL, NEWS_CHANNEL, PING_INTERVAL, RECONNECT_DELAY, SENTIMENT_CHANNEL,
    STREAM_PATH,
};

// --- Re-exports (публичный фасад API) ---

pub use crate::error::{CoreError, EndpointError, HubError, ProtocolError};
pub use crate::hub::{BroadcastStats, Hub, SubscriberId};
pub use crate::protocol::{ClientMessage, QuoteBatch, ServerMessage};
pub use crate::types::{IndexSnapshot, Quote};
