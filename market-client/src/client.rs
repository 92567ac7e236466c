//! State machine клиента потока котировок.
//!
//! ```text
//! Idle -> Connecting -> Open -> (close) -> Reconnecting --(delay)--> Connecting -> ...
//!   ^                                                                   |
//!   +------------------------------ disconnect() ------------------------+
//! ```
//!
//! Клиент однопоточный: все изменения статуса, цен и индексов происходят
//! в том вызове, который доставил событие ([`MarketStreamClient::handle_event`])
//! или сработавший таймер ([`MarketStreamClient::poll_timers`]). Таймеров
//! ровно два (keep-alive и переподключение), оба — поля клиента.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use market_core::protocol::parse_server_message;
use market_core::{ClientMessage, QuoteBatch, ServerMessage};

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::state::{ConnectionStatus, LinkState, Subscriptions};
use crate::store::{MarketStore, MarketView, StreamEvent};
use crate::transport::{Transport, TransportEvent};

pub struct MarketStreamClient<T: Transport, C: Clock = SystemClock> {
    config: ClientConfig,
    transport: T,
    clock: C,

    state: LinkState,
    /// идёт восстановление потерянного соединения
    retrying: bool,
    last_error: Option<String>,

    subscriptions: Subscriptions,
    store: MarketStore,

    ping_due: Option<Instant>,
    reconnect_due: Option<Instant>,
}

impl<T: Transport> MarketStreamClient<T, SystemClock> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_clock(config, transport, SystemClock)
    }
}

impl<T: Transport, C: Clock> MarketStreamClient<T, C> {
    pub fn with_clock(config: ClientConfig, transport: T, clock: C) -> Self {
        let mut subscriptions = Subscriptions::new();
        subscriptions.merge(&config.symbols, &config.channels);

        let store = MarketStore::new(config.observer_capacity);

        Self {
            config,
            transport,
            clock,
            state: LinkState::Idle,
            retrying: false,
            last_error: None,
            subscriptions,
            store,
            ping_due: None,
            reconnect_due: None,
        }
    }

    // --- операции для потребителей ---

    /// Открыть соединение. Ничего не делает, если оно уже открыто или открывается
    pub fn connect(&mut self) {
        match self.state {
            LinkState::Open | LinkState::Connecting => {
                debug!("connect ignored: link is {}", self.state);
                return;
            }
            LinkState::Reconnecting => self.cancel_reconnect(),
            LinkState::Idle => {}
        }

        info!("connecting to {}", self.config.url);
        self.set_state(LinkState::Connecting);

        match self.transport.open(&self.config.url) {
            Ok(conn) => debug!("connection #{conn} started"),
            Err(e) => {
                // попытка даже не стартовала: ведём себя как при close
                warn!("failed to start connection: {e}");
                self.last_error = Some(e.to_string());
                self.on_closed();
            }
        }
    }

    /// Остановить всё: таймеры, соединение, автопереподключение
    pub fn disconnect(&mut self) {
        self.cancel_reconnect();
        self.stop_ping();

        if self.state != LinkState::Idle {
            info!("disconnecting from {}", self.config.url);
            self.transport.close();
        }

        self.retrying = false;
        self.last_error = None;
        self.set_state(LinkState::Idle);
    }

    pub fn subscribe<S, Ch>(&mut self, symbols: &[S], channels: &[Ch])
    where
        S: AsRef<str>,
        Ch: AsRef<str>,
    {
        let delta = self.subscriptions.merge(symbols, channels);
        if delta.is_empty() {
            return;
        }

        if self.state == LinkState::Open {
            self.send(&ClientMessage::Subscribe {
                symbols: delta.symbols,
                channels: delta.channels,
            });
        } else {
            debug!("link is {}; subscription recorded for replay", self.state);
        }
    }

    pub fn unsubscribe<S, Ch>(&mut self, symbols: &[S], channels: &[Ch])
    where
        S: AsRef<str>,
        Ch: AsRef<str>,
    {
        let delta = self.subscriptions.remove(symbols, channels);
        if delta.is_empty() {
            return;
        }

        if self.state == LinkState::Open {
            self.send(&ClientMessage::Unsubscribe {
                symbols: delta.symbols,
                channels: delta.channels,
            });
        }
    }

    // --- вход от хоста ---

    /// Событие транспорта, в порядке доставки
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Error(error) => self.on_error(error),
            TransportEvent::Closed => self.on_closed(),
        }
    }

    /// Запускает наступившие таймеры
    pub fn poll_timers(&mut self) {
        let now = self.clock.now();

        if self.reconnect_due.is_some_and(|due| due <= now) {
            self.reconnect_due = None;
            debug!("reconnect timer fired");
            self.connect();
        }

        if self.ping_due.is_some_and(|due| due <= now) {
            if self.state == LinkState::Open {
                trace!("ping");
                self.send(&ClientMessage::Ping);
                self.start_ping();
            } else {
                self.stop_ping();
            }
        }
    }

    /// Ближайший дедлайн таймера, если что-то запланировано
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.ping_due, self.reconnect_due].into_iter().flatten().min()
    }

    /// Сколько осталось до ближайшего дедлайна по часам клиента
    pub fn time_to_next_deadline(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|due| due.saturating_duration_since(self.clock.now()))
    }

    // --- чтение ---

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_link(self.state, self.retrying, self.last_error.as_deref())
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Read-only вид для любого числа наблюдателей
    pub fn view(&self) -> MarketView {
        self.store.view()
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_ping_scheduled(&self) -> bool {
        self.ping_due.is_some()
    }

    pub fn is_reconnect_scheduled(&self) -> bool {
        self.reconnect_due.is_some()
    }

    // --- обработчики жизненного цикла ---

    fn on_opened(&mut self) {
        if self.state != LinkState::Connecting {
            debug!("open ignored: link is {}", self.state);
            return;
        }

        info!("connected to {}", self.config.url);
        self.retrying = false;
        self.last_error = None;
        self.set_state(LinkState::Open);

        if let Some(user_id) = self.config.user_id.clone() {
            self.send(&ClientMessage::Authenticate { user_id });
        }

        // сервер не помнит подписки между соединениями: шлём весь набор
        if !self.subscriptions.is_empty() {
            let full = self.subscriptions.full();
            self.send(&ClientMessage::Subscribe {
                symbols: full.symbols,
                channels: full.channels,
            });
        }

        self.start_ping();
    }

    fn on_error(&mut self, error: String) {
        if self.state == LinkState::Idle {
            debug!("error after disconnect ignored: {error}");
            return;
        }

        // только фиксируем: переподключение запускает close, а не error
        warn!("transport error: {error}");
        self.last_error = Some(error);
        self.publish_status();
    }

    fn on_closed(&mut self) {
        match self.state {
            LinkState::Idle => {
                debug!("close after disconnect ignored");
                return;
            }
            LinkState::Reconnecting => {
                debug!("close ignored: reconnect already scheduled");
                return;
            }
            LinkState::Connecting | LinkState::Open => {}
        }

        self.stop_ping();

        if self.config.auto_reconnect {
            info!(
                "connection closed; reconnecting in {:?}",
                self.config.reconnect_delay
            );
            self.retrying = true;
            self.schedule_reconnect();
            self.set_state(LinkState::Reconnecting);
        } else {
            info!("connection closed");
            self.retrying = false;
            self.set_state(LinkState::Idle);
        }
    }

    // --- входящие сообщения ---

    fn on_message(&mut self, text: &str) {
        if self.state != LinkState::Open {
            debug!("frame dropped: link is {}", self.state);
            return;
        }

        match parse_server_message(text) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => warn!("dropping malformed frame: {e}"),
        }
    }

    fn dispatch(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Connection { message } => {
                info!("server: {}", message.as_deref().unwrap_or("connection acknowledged"));
                self.store.publish(StreamEvent::Connected { message });
            }
            ServerMessage::InitialPrices { timestamp, batch } => {
                self.apply_quotes("initial-prices", timestamp.as_deref(), batch);
            }
            ServerMessage::Price { timestamp, batch } => {
                self.apply_quotes("price", timestamp.as_deref(), batch);
            }
            ServerMessage::Index { timestamp, indices } => {
                let at = self.stamp(timestamp.as_deref());
                debug!("index snapshot: {} entries", indices.len());
                self.store.replace_indices(indices, at);
            }
            ServerMessage::News { data, .. } => {
                self.store.publish(StreamEvent::News(data));
            }
            ServerMessage::Sentiment { data, .. } => {
                self.store.publish(StreamEvent::Sentiment(data));
            }
            ServerMessage::Pong { .. } => trace!("pong"),
            ServerMessage::Unknown { kind } => {
                debug!("ignoring message of unknown type {kind:?}");
            }
        }
    }

    fn apply_quotes(&mut self, kind: &str, timestamp: Option<&str>, batch: QuoteBatch) {
        if batch.skipped > 0 {
            warn!("{kind}: skipped {} malformed quote records", batch.skipped);
        }
        debug!("{kind}: {} quotes", batch.quotes.len());

        let at = self.stamp(timestamp);
        self.store.apply_prices(batch.quotes, at);
    }

    /// Время сообщения: из `timestamp`, иначе текущее
    fn stamp(&self, timestamp: Option<&str>) -> DateTime<Utc> {
        match timestamp.map(DateTime::parse_from_rfc3339) {
            Some(Ok(ts)) => ts.with_timezone(&Utc),
            Some(Err(e)) => {
                debug!("unparseable message timestamp: {e}");
                self.clock.utc_now()
            }
            None => self.clock.utc_now(),
        }
    }

    // --- исходящие ---

    fn send(&mut self, msg: &ClientMessage) {
        let text = match msg.to_json() {
            Ok(t) => t,
            Err(e) => {
                warn!("failed to encode {msg:?}: {e}");
                return;
            }
        };

        match self.transport.send(&text) {
            Ok(()) => debug!("sent {text}"),
            // закрытие придёт отдельным событием
            Err(e) => warn!("failed to send frame: {e}"),
        }
    }

    // --- таймеры ---

    fn start_ping(&mut self) {
        if self.config.ping_interval.is_zero() {
            self.ping_due = None;
            return;
        }
        self.ping_due = Some(self.clock.now() + self.config.ping_interval);
    }

    fn stop_ping(&mut self) {
        self.ping_due = None;
    }

    /// Не больше одного отложенного переподключения
    fn schedule_reconnect(&mut self) {
        if self.reconnect_due.is_none() {
            self.reconnect_due = Some(self.clock.now() + self.config.reconnect_delay);
        }
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect_due = None;
    }

    // --- статус ---

    fn set_state(&mut self, state: LinkState) {
        if self.state != state {
            debug!("link {} -> {}", self.state, state);
        }
        self.state = state;
        self.publish_status();
    }

    fn publish_status(&self) {
        self.store.set_status(self.status());
    }
}

impl<T: Transport, C: Clock> Drop for MarketStreamClient<T, C> {
    fn drop(&mut self) {
        if self.state != LinkState::Idle {
            self.disconnect();
        }
    }
}
