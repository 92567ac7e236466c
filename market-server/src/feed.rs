//! Поток рыночных данных сервера: генерация по таймерам, кэш последних
//! значений для новых подписчиков и рассылка через хаб.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use market_core::{Hub, IndexSnapshot, Quote};
use serde_json::Value;

use crate::config::NEWS_EVERY_INDEX_TICKS;
use crate::generator::{IndexGenerator, QuoteGenerator, next_news, next_sentiment};

/// Одна рассылка для всех сессий
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FeedEvent {
    Prices(Vec<Quote>),
    Indices(Vec<IndexSnapshot>),
    News(Value),
    Sentiment(Value),
}

#[derive(Debug, Default)]
struct CacheData {
    prices: HashMap<String, Quote>,
    indices: Vec<IndexSnapshot>,
}

/// Последние значения: из них строится `initial-prices` при подписке
#[derive(Debug, Clone, Default)]
pub(crate) struct MarketCache {
    inner: Arc<RwLock<CacheData>>,
}

impl MarketCache {
    fn read(&self) -> RwLockReadGuard<'_, CacheData> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheData> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn store_prices(&self, quotes: &[Quote]) {
        let mut data = self.write();
        for q in quotes {
            data.prices.insert(q.symbol.clone(), q.clone());
        }
    }

    pub(crate) fn store_indices(&self, indices: &[IndexSnapshot]) {
        self.write().indices = indices.to_vec();
    }

    /// Последние котировки по символам, которые есть в кэше
    pub(crate) fn prices_for<'a>(&self, symbols: impl IntoIterator<Item = &'a str>) -> Vec<Quote> {
        let data = self.read();
        symbols
            .into_iter()
            .filter_map(|s| data.prices.get(s).cloned())
            .collect()
    }

    pub(crate) fn indices(&self) -> Vec<IndexSnapshot> {
        self.read().indices.clone()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FeedIntervals {
    pub(crate) prices: Duration,
    pub(crate) indices: Duration,
}

/// Цикл генератора. Работает до `shutdown`
pub(crate) fn run_feed(
    mut quotes: QuoteGenerator,
    mut indices: IndexGenerator,
    intervals: FeedIntervals,
    hub: Arc<Hub<FeedEvent>>,
    cache: MarketCache,
    shutdown: Arc<AtomicBool>,
) {
    let tickers: Vec<String> = quotes.tickers().map(str::to_string).collect();
    let tick = intervals.prices.min(intervals.indices).min(Duration::from_millis(100));

    let mut next_prices = Instant::now();
    let mut next_indices = Instant::now();
    let mut index_ticks: u64 = 0;

    info!(
        "feed started: {} tickers, prices every {:?}, indices every {:?}",
        tickers.len(),
        intervals.prices,
        intervals.indices
    );

    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();

        if now >= next_prices {
            let batch = quotes.next_batch();
            cache.store_prices(&batch);
            publish(&hub, FeedEvent::Prices(batch));
            next_prices = now + intervals.prices;
        }

        if now >= next_indices {
            let snap = indices.next_snapshot();
            cache.store_indices(&snap);
            publish(&hub, FeedEvent::Indices(snap));

            index_ticks += 1;
            if index_ticks % NEWS_EVERY_INDEX_TICKS == 0 {
                publish(&hub, FeedEvent::News(next_news(&tickers)));
                publish(&hub, FeedEvent::Sentiment(next_sentiment()));
            }
            next_indices = now + intervals.indices;
        }

        thread::sleep(tick);
    }

    info!("feed stopped");
}

fn publish(hub: &Hub<FeedEvent>, ev: FeedEvent) {
    let stats = hub.broadcast(ev);
    if stats.dropped_full > 0 {
        warn!("slow sessions, events dropped: {stats}");
    } else if stats.is_lossy() {
        debug!("broadcast: {stats}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorConfig;

    #[test]
    fn cache_returns_only_known_symbols() {
        let cache = MarketCache::default();
        cache.store_prices(&[Quote::new("AAPL", 1.0), Quote::new("MSFT", 2.0)]);
        cache.store_prices(&[Quote::new("AAPL", 3.0)]);

        let got = cache.prices_for(["AAPL", "GOOG"]);
        assert_eq!(got, vec![Quote::new("AAPL", 3.0)]);
    }

    #[test]
    fn feed_fills_cache_and_broadcasts() {
        let hub: Arc<Hub<FeedEvent>> = Arc::new(Hub::new());
        let rx = hub.add_subscriber(1).unwrap();
        let cache = MarketCache::default();
        let shutdown = Arc::new(AtomicBool::new(false));

        let h = {
            let hub = hub.clone();
            let cache = cache.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                run_feed(
                    QuoteGenerator::new(vec!["AAPL".into()], GeneratorConfig::default()),
                    IndexGenerator::new(GeneratorConfig::default()),
                    FeedIntervals {
                        prices: Duration::from_millis(10),
                        indices: Duration::from_millis(10),
                    },
                    hub,
                    cache,
                    shutdown,
                )
            })
        };

        let mut saw_prices = false;
        let mut saw_indices = false;
        while !(saw_prices && saw_indices) {
            match &*rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                FeedEvent::Prices(q) => saw_prices = q[0].symbol == "AAPL",
                FeedEvent::Indices(i) => saw_indices = i.len() == 3,
                _ => {}
            }
        }

        shutdown.store(true, Ordering::Relaxed);
        h.join().unwrap();

        assert_eq!(cache.prices_for(["AAPL"]).len(), 1);
        assert_eq!(cache.indices().len(), 3);
    }
}
