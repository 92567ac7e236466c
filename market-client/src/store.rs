//! Разделяемое состояние рынка.
//!
//! Пишет только клиент (из обработчика сообщений и жизненного цикла),
//! потребители получают [`MarketView`] и читают снимки. Изменения
//! дополнительно рассылаются событиями через [`Hub`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use log::warn;
use market_core::hub::DEFAULT_SUBSCRIBER_CAPACITY;
use market_core::symbols::normalize_symbol;
use market_core::{Hub, IndexSnapshot, Quote};
use serde_json::Value;

use crate::state::ConnectionStatus;

/// Событие для наблюдателей
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(ConnectionStatus),
    /// Сервер поприветствовал соединение
    Connected { message: Option<String> },
    /// Применённая пачка котировок
    Prices(Vec<Quote>),
    /// Новый полный список индексов
    Indices(Vec<IndexSnapshot>),
    /// Новости: состояние не храним, только пробрасываем
    News(Value),
    Sentiment(Value),
}

#[derive(Debug, Default)]
struct MarketData {
    status: ConnectionStatus,
    prices: HashMap<String, Quote>,
    indices: Vec<IndexSnapshot>,
    last_update: Option<DateTime<Utc>>,
}

struct Shared {
    data: RwLock<MarketData>,
    hub: Hub<StreamEvent>,
    next_observer: AtomicU64,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, MarketData> {
        match self.data.read() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("market data lock poisoned; continuing");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, MarketData> {
        match self.data.write() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("market data lock poisoned; continuing");
                poisoned.into_inner()
            }
        }
    }
}

/// Пишущая сторона. Принадлежит клиенту
pub(crate) struct MarketStore {
    shared: Arc<Shared>,
}

impl MarketStore {
    pub(crate) fn new(observer_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(MarketData::default()),
                hub: Hub::with_capacity(observer_capacity),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    pub(crate) fn view(&self) -> MarketView {
        MarketView {
            shared: self.shared.clone(),
        }
    }

    /// Публикует статус, только если он изменился
    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        {
            let mut data = self.shared.write();
            if data.status == status {
                return;
            }
            data.status = status.clone();
        }
        self.publish(StreamEvent::Status(status));
    }

    /// last-write-wins по символу. Ключ нормализуется так же, как
    /// подписки, записи без символа отбрасываются
    pub(crate) fn apply_prices(&self, quotes: Vec<Quote>, at: DateTime<Utc>) {
        let quotes: Vec<Quote> = quotes
            .into_iter()
            .filter_map(|mut q| {
                q.symbol = normalize_symbol(&q.symbol)?;
                Some(q)
            })
            .collect();
        {
            let mut data = self.shared.write();
            for q in &quotes {
                data.prices.insert(q.symbol.clone(), q.clone());
            }
            data.last_update = Some(at);
        }
        self.publish(StreamEvent::Prices(quotes));
    }

    /// Снапшот: список заменяется целиком
    pub(crate) fn replace_indices(&self, indices: Vec<IndexSnapshot>, at: DateTime<Utc>) {
        {
            let mut data = self.shared.write();
            data.indices = indices.clone();
            data.last_update = Some(at);
        }
        self.publish(StreamEvent::Indices(indices));
    }

    pub(crate) fn publish(&self, event: StreamEvent) {
        let stats = self.shared.hub.broadcast(event);
        if stats.dropped_full > 0 {
            warn!("observer queue full, events dropped: {stats}");
        }
    }
}

/// Read-only вид на состояние рынка. Дешёвый `Clone`
#[derive(Clone)]
pub struct MarketView {
    shared: Arc<Shared>,
}

impl MarketView {
    pub fn status(&self) -> ConnectionStatus {
        self.shared.read().status.clone()
    }

    pub fn price(&self, symbol: &str) -> Option<Quote> {
        let data = self.shared.read();
        normalize_symbol(symbol).and_then(|s| data.prices.get(&s).cloned())
    }

    pub fn latest_prices(&self) -> HashMap<String, Quote> {
        self.shared.read().prices.clone()
    }

    pub fn market_indices(&self) -> Vec<IndexSnapshot> {
        self.shared.read().indices.clone()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.shared.read().last_update
    }

    /// Новый независимый поток событий. Drop receiver = отписка
    pub fn events(&self) -> Receiver<Arc<StreamEvent>> {
        loop {
            let id = self.shared.next_observer.fetch_add(1, Ordering::Relaxed);
            if let Ok(rx) = self.shared.hub.add_subscriber(id) {
                return rx;
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.shared.hub.len()
    }
}

impl Default for MarketStore {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn fresh_store_is_empty_and_idle() {
        let store = MarketStore::default();
        let view = store.view();

        assert_eq!(view.status(), ConnectionStatus::default());
        assert!(view.latest_prices().is_empty());
        assert!(view.market_indices().is_empty());
        assert!(view.last_update().is_none());
    }

    #[test]
    fn prices_overwrite_per_symbol() {
        let store = MarketStore::default();
        let view = store.view();

        store.apply_prices(vec![Quote::new("AAPL", 100.0)], at("2024-01-01T00:00:00Z"));
        store.apply_prices(
            vec![Quote::new("AAPL", 101.0), Quote::new("MSFT", 50.0)],
            at("2024-01-01T00:00:01Z"),
        );

        let prices = view.latest_prices();
        assert_eq!(prices.len(), 2);
        assert_eq!(view.price("AAPL").unwrap().price, 101.0);
        assert_eq!(view.price("msft").unwrap().price, 50.0);
        assert_eq!(view.last_update(), Some(at("2024-01-01T00:00:01Z")));
    }

    #[test]
    fn symbol_case_maps_to_one_entry() {
        let store = MarketStore::default();
        let view = store.view();
        let rx = view.events();

        store.apply_prices(
            vec![Quote::new("aapl", 100.0), Quote::new(" AAPL ", 101.0)],
            at("2024-01-01T00:00:00Z"),
        );
        store.apply_prices(vec![Quote::new("", 1.0)], at("2024-01-01T00:00:01Z"));

        let prices = view.latest_prices();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["AAPL"].symbol, "AAPL");
        assert_eq!(prices["AAPL"].price, 101.0);

        let ev = rx.recv_timeout(Duration::from_millis(200)).unwrap();
        match &*ev {
            StreamEvent::Prices(q) => assert!(q.iter().all(|q| q.symbol == "AAPL")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn indices_are_replaced_wholesale() {
        let store = MarketStore::default();
        let view = store.view();
        let t = at("2024-01-01T00:00:00Z");

        store.replace_indices(
            vec![
                IndexSnapshot::new("SP500", 5000.0, 0.1),
                IndexSnapshot::new("NASDAQ", 16000.0, 0.2),
            ],
            t,
        );
        store.replace_indices(vec![IndexSnapshot::new("DOW", 38000.0, -0.1)], t);

        let names: Vec<String> = view.market_indices().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["DOW"]);
    }

    #[test]
    fn status_event_is_published_only_on_change() {
        let store = MarketStore::default();
        let rx = store.view().events();

        let open = ConnectionStatus {
            connected: true,
            ..Default::default()
        };
        store.set_status(open.clone());
        store.set_status(open.clone());

        let ev = rx.recv_timeout(Duration::from_millis(200)).unwrap();
        assert_eq!(*ev, StreamEvent::Status(open));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn each_observer_gets_its_own_stream() {
        let store = MarketStore::default();
        let view = store.view();
        let a = view.events();
        let b = view.clone().events();
        assert_eq!(view.observer_count(), 2);

        store.publish(StreamEvent::News(serde_json::json!({"headline": "x"})));

        assert!(matches!(*a.recv().unwrap(), StreamEvent::News(_)));
        assert!(matches!(*b.recv().unwrap(), StreamEvent::News(_)));

        drop(a);
        store.publish(StreamEvent::Sentiment(Value::Null));
        assert_eq!(view.observer_count(), 1);
    }
}
