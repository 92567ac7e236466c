//! # market-client
//!
//! Клиент push-потока рыночных данных.
//!
//! - [`client`] — state machine соединения: подписки, keep-alive ping,
//!   переподключение с фиксированной задержкой, разбор входящих сообщений
//! - [`store`] — таблица цен, снапшот индексов, `lastUpdate` и поток событий
//!   для наблюдателей
//! - [`transport`] — граница с сетью; [`ws`] — реализация на `tungstenite`
//! - [`clock`] — источник времени (реальный или ручной для тестов)
//! - [`runtime`] — цикл событий, который склеивает всё это в одном потоке
//!
//! ## Пример: клиент без сети
//!
//! ```rust
//! use market_client::{ClientConfig, ManualClock, MarketStreamClient, Transport, TransportError, TransportEvent};
//! use market_client::transport::ConnectionId;
//!
//! #[derive(Default)]
//! struct Null(Option<ConnectionId>);
//!
//! impl Transport for Null {
//!     fn open(&mut self, _: &url::Url) -> Result<ConnectionId, TransportError> {
//!         self.0 = Some(1);
//!         Ok(1)
//!     }
//!     fn send(&mut self, _: &str) -> Result<(), TransportError> { Ok(()) }
//!     fn close(&mut self) { self.0 = None; }
//!     fn current(&self) -> Option<ConnectionId> { self.0 }
//! }
//!
//! let cfg = ClientConfig::from_origin("http://localhost:8080").unwrap();
//! let mut client = MarketStreamClient::with_clock(cfg, Null::default(), ManualClock::new());
//! client.connect();
//! client.handle_event(TransportEvent::Opened);
//! client.handle_event(TransportEvent::Message(
//!     r#"{"type":"price","data":[{"symbol":"AAPL","price":190.1}]}"#.into(),
//! ));
//!
//! assert!(client.status().connected);
//! assert_eq!(client.view().price("AAPL").unwrap().price, 190.1);
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod runtime;
pub mod state;
pub mod store;
pub mod transport;
pub mod ws;

#[cfg(test)]
mod testing;

pub use crate::client::MarketStreamClient;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::ClientConfig;
pub use crate::error::TransportError;
pub use crate::runtime::{Command, RuntimeError, StreamHandle};
pub use crate::state::{ConnectionStatus, LinkState, Subscriptions};
pub use crate::store::{MarketView, StreamEvent};
pub use crate::transport::{Transport, TransportEvent};
pub use crate::ws::WsTransport;
