use std::collections::BTreeSet;
use std::io::{ErrorKind, Read, Write};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crossbeam_channel::Receiver;
use log::{debug, info, trace, warn};
use market_core::protocol::encode_server_message;
use market_core::symbols::{normalize_channel, normalize_symbol};
use market_core::{
    ClientMessage, MARKET_INDICES_CHANNEL, NEWS_CHANNEL, ProtocolError, SENTIMENT_CHANNEL,
    ServerMessage,
};
use thiserror::Error;
use tungstenite::{Message, WebSocket};

use crate::config::SessionId;
use crate::feed::{FeedEvent, MarketCache};
use crate::generator::now_rfc3339;

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode message: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Подписки одной сессии
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    user_id: Option<String>,
    symbols: BTreeSet<String>,
    channels: BTreeSet<String>,
}

impl SessionState {
    /// Обработка сообщения клиента; возвращает ответы
    pub(crate) fn on_client_message(
        &mut self,
        msg: ClientMessage,
        cache: &MarketCache,
    ) -> Vec<ServerMessage> {
        match msg {
            ClientMessage::Authenticate { user_id } => {
                info!("authenticated as {user_id:?}");
                self.user_id = Some(user_id);
                Vec::new()
            }
            ClientMessage::Subscribe { symbols, channels } => {
                let new_symbols: Vec<String> = symbols
                    .iter()
                    .filter_map(|s| normalize_symbol(s))
                    .filter(|s| self.symbols.insert(s.clone()))
                    .collect();
                let new_channels: Vec<String> = channels
                    .iter()
                    .filter_map(|c| normalize_channel(c))
                    .filter(|c| self.channels.insert(c.clone()))
                    .collect();
                debug!("subscribe +{new_symbols:?} +{new_channels:?}");

                let mut out = Vec::new();

                // сразу отдаём то, что уже известно
                let initial = cache.prices_for(new_symbols.iter().map(String::as_str));
                if !initial.is_empty() {
                    out.push(ServerMessage::InitialPrices {
                        timestamp: Some(now_rfc3339()),
                        batch: initial.into(),
                    });
                }
                if new_channels.iter().any(|c| c == MARKET_INDICES_CHANNEL) {
                    let indices = cache.indices();
                    if !indices.is_empty() {
                        out.push(ServerMessage::Index {
                            timestamp: Some(now_rfc3339()),
                            indices,
                        });
                    }
                }
                out
            }
            ClientMessage::Unsubscribe { symbols, channels } => {
                for s in symbols.iter().filter_map(|s| normalize_symbol(s)) {
                    self.symbols.remove(&s);
                }
                for c in channels.iter().filter_map(|c| normalize_channel(c)) {
                    self.channels.remove(&c);
                }
                Vec::new()
            }
            ClientMessage::Ping => vec![ServerMessage::Pong {
                timestamp: Some(now_rfc3339()),
            }],
        }
    }

    /// Что из общей рассылки нужно этой сессии
    pub(crate) fn filter(&self, ev: &FeedEvent) -> Option<ServerMessage> {
        let timestamp = Some(now_rfc3339());
        match ev {
            FeedEvent::Prices(quotes) => {
                let mine: Vec<_> = quotes
                    .iter()
                    .filter(|q| self.symbols.contains(&q.symbol))
                    .cloned()
                    .collect();
                if mine.is_empty() {
                    return None;
                }
                Some(ServerMessage::Price {
                    timestamp,
                    batch: mine.into(),
                })
            }
            FeedEvent::Indices(indices) if self.channels.contains(MARKET_INDICES_CHANNEL) => {
                Some(ServerMessage::Index {
                    timestamp,
                    indices: indices.clone(),
                })
            }
            FeedEvent::News(data) if self.channels.contains(NEWS_CHANNEL) => {
                Some(ServerMessage::News {
                    timestamp,
                    data: data.clone(),
                })
            }
            FeedEvent::Sentiment(data) if self.channels.contains(SENTIMENT_CHANNEL) => {
                Some(ServerMessage::Sentiment {
                    timestamp,
                    data: data.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Цикл одной WebSocket сессии. Read timeout сокета задаёт "тик" цикла.
pub(crate) fn run_session<S: Read + Write>(
    sid: SessionId,
    ws: &mut WebSocket<S>,
    rx: Receiver<Arc<FeedEvent>>,
    cache: &MarketCache,
    shutdown: &AtomicBool,
) -> Result<(), SessionError> {
    let mut state = SessionState::default();

    send(
        ws,
        &ServerMessage::Connection {
            message: Some(format!("connected to market-server (session {sid})")),
        },
    )?;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutting down session {sid}");
            let _ = ws.close(None);
            let _ = ws.flush();
            break;
        }

        // разгребаем очередь
        for ev in rx.try_iter() {
            if let Some(msg) = state.filter(&ev) {
                send(ws, &msg)?;
            }
        }

        match ws.read() {
            Ok(Message::Text(text)) => match ClientMessage::from_json(&text) {
                Ok(msg) => {
                    trace!("session {sid} <- {text}");
                    for reply in state.on_client_message(msg, cache) {
                        send(ws, &reply)?;
                    }
                }
                Err(e) => warn!("session {sid}: bad client message {text:?}: {e}"),
            },
            Ok(Message::Close(_)) => debug!("session {sid}: client closing"),
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
            {
                // просто "тик" цикла
                continue;
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        "session {sid} ended (user: {})",
        state.user_id.as_deref().unwrap_or("anonymous")
    );
    Ok(())
}

fn send<S: Read + Write>(ws: &mut WebSocket<S>, msg: &ServerMessage) -> Result<(), SessionError> {
    let text = encode_server_message(msg)?;
    ws.send(Message::Text(text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{IndexSnapshot, Quote};
    use serde_json::json;

    fn subscribe(symbols: &[&str], channels: &[&str]) -> ClientMessage {
        ClientMessage::Subscribe {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            channels: channels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn subscribe_replies_with_cached_prices_for_new_symbols_only() {
        let cache = MarketCache::default();
        cache.store_prices(&[Quote::new("AAPL", 190.0), Quote::new("MSFT", 410.0)]);
        let mut st = SessionState::default();

        let out = st.on_client_message(subscribe(&["aapl", "GOOG"], &[]), &cache);
        assert_eq!(out.len(), 1);
        match &out[0] {
            ServerMessage::InitialPrices { batch, .. } => {
                assert_eq!(batch.quotes, vec![Quote::new("AAPL", 190.0)]);
            }
            other => panic!("unexpected {other:?}"),
        }

        // AAPL уже есть — повторно не шлём
        assert!(st.on_client_message(subscribe(&["AAPL"], &[]), &cache).is_empty());
    }

    #[test]
    fn subscribing_to_indices_sends_latest_snapshot() {
        let cache = MarketCache::default();
        cache.store_indices(&[IndexSnapshot::new("DOW", 38000.0, 0.1)]);
        let mut st = SessionState::default();

        let out = st.on_client_message(subscribe(&[], &["market-indices"]), &cache);
        assert!(matches!(&out[..], [ServerMessage::Index { indices, .. }] if indices.len() == 1));
    }

    #[test]
    fn ping_gets_pong() {
        let mut st = SessionState::default();
        let out = st.on_client_message(ClientMessage::Ping, &MarketCache::default());
        assert!(matches!(&out[..], [ServerMessage::Pong { timestamp: Some(_) }]));
    }

    #[test]
    fn filter_follows_subscriptions() {
        let cache = MarketCache::default();
        let mut st = SessionState::default();
        st.on_client_message(subscribe(&["AAPL"], &["news"]), &cache);

        let prices = FeedEvent::Prices(vec![Quote::new("AAPL", 1.0), Quote::new("TSLA", 2.0)]);
        match st.filter(&prices) {
            Some(ServerMessage::Price { batch, .. }) => {
                assert_eq!(batch.quotes, vec![Quote::new("AAPL", 1.0)]);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(st.filter(&FeedEvent::News(json!({"headline": "x"}))).is_some());
        assert!(st.filter(&FeedEvent::Indices(vec![])).is_none());
        assert!(st.filter(&FeedEvent::Sentiment(json!({}))).is_none());

        st.on_client_message(
            ClientMessage::Unsubscribe {
                symbols: vec!["aapl".into()],
                channels: vec![],
            },
            &cache,
        );
        assert!(st.filter(&prices).is_none());
    }
}
