use chrono::{SecondsFormat, Utc};
use market_core::{IndexSnapshot, Quote};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub(crate) struct GeneratorConfig {
    /// Максимальный относительный шаг цены за тик (пример: 0.002 = 0.2%)
    pub(crate) max_rel_step: f64,
    /// Минимальная допустимая цена
    pub(crate) min_price: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_rel_step: 0.002,
            min_price: 1.0,
        }
    }
}

/// Состояние тикера: цена открытия сессии и текущая
#[derive(Debug, Clone)]
struct TickerState {
    open: f64,
    price: f64,
}

impl TickerState {
    fn new(price: f64) -> Self {
        Self { open: price, price }
    }

    fn step(&mut self, rel: f64, min: f64) {
        self.price = round2((self.price * (1.0 + rel)).max(min));
    }

    fn change(&self) -> f64 {
        round2(self.price - self.open)
    }

    fn change_percent(&self) -> f64 {
        round2((self.price - self.open) / self.open * 100.0)
    }
}

pub(crate) struct QuoteGenerator {
    cfg: GeneratorConfig,
    states: BTreeMap<String, TickerState>,

    /// Набор "высоколиквидных" тикеров для более крупного volume.
    high_volume: HashSet<String>,
}

impl QuoteGenerator {
    pub(crate) fn new(tickers: Vec<String>, cfg: GeneratorConfig) -> Self {
        let mut rng = rand::rng();

        let states = tickers
            .into_iter()
            .map(|t| {
                let start_price = round2(rng.random_range(50.0..500.0));
                (t, TickerState::new(start_price))
            })
            .collect::<BTreeMap<_, _>>();

        let high_volume = ["AAPL", "MSFT", "TSLA", "NVDA"]
            .into_iter()
            .map(|s| s.to_string())
            .collect::<HashSet<_>>();

        Self {
            cfg,
            states,
            high_volume,
        }
    }

    /// сгенерировать котировку для тикера
    pub(crate) fn next_quote(&mut self, ticker: &str) -> Option<Quote> {
        let mut rng = rand::rng();
        let delta = rng.random_range(-self.cfg.max_rel_step..self.cfg.max_rel_step);

        let st = self.states.get_mut(ticker)?;
        st.step(delta, self.cfg.min_price);

        // volume: популярные -> больше
        let volume: u64 = if self.high_volume.contains(ticker) {
            1000 + rng.random_range(0..5000)
        } else {
            100 + rng.random_range(0..1000)
        };

        let mut q = Quote::new(ticker, st.price);
        q.change = Some(st.change());
        q.change_percent = Some(st.change_percent());
        q.timestamp = Some(now_rfc3339());
        q.extra.insert("volume".into(), json!(volume));
        Some(q)
    }

    /// сгенерировать котировки для всех тикеров
    pub(crate) fn next_batch(&mut self) -> Vec<Quote> {
        let keys: Vec<String> = self.states.keys().cloned().collect();

        let mut out = Vec::with_capacity(keys.len());

        for t in keys {
            if let Some(q) = self.next_quote(&t) {
                out.push(q);
            }
        }

        out
    }

    pub(crate) fn tickers(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}

/// Индексы: тот же random walk, но от фиксированных уровней
pub(crate) struct IndexGenerator {
    cfg: GeneratorConfig,
    states: Vec<(&'static str, TickerState)>,
}

impl IndexGenerator {
    pub(crate) fn new(cfg: GeneratorConfig) -> Self {
        let states = [("S&P 500", 5100.0), ("NASDAQ", 16_000.0), ("DOW", 38_500.0)]
            .into_iter()
            .map(|(name, level)| (name, TickerState::new(level)))
            .collect();
        Self { cfg, states }
    }

    /// Полный снапшот всех индексов
    pub(crate) fn next_snapshot(&mut self) -> Vec<IndexSnapshot> {
        let mut rng = rand::rng();
        let step = self.cfg.max_rel_step / 2.0;

        self.states
            .iter_mut()
            .map(|(name, st)| {
                st.step(rng.random_range(-step..step), self.cfg.min_price);
                IndexSnapshot::new(*name, st.price, st.change_percent())
            })
            .collect()
    }
}

const HEADLINES: &[&str] = &[
    "reports quarterly earnings above expectations",
    "announces share buyback program",
    "shares move on analyst rating change",
    "faces regulatory review",
    "unveils new product line",
];

/// Новость про случайный тикер из списка
pub(crate) fn next_news(tickers: &[String]) -> Value {
    let mut rng = rand::rng();
    let symbol = tickers.choose(&mut rng).map_or("MARKET", String::as_str);
    let headline = HEADLINES.choose(&mut rng).copied().unwrap_or("trades");

    json!({
        "symbol": symbol,
        "headline": format!("{symbol} {headline}"),
        "publishedAt": now_rfc3339(),
    })
}

/// Настроение рынка в диапазоне [-1, 1]
pub(crate) fn next_sentiment() -> Value {
    let score = round2(rand::rng().random_range(-1.0..=1.0));
    let label = match score {
        s if s > 0.25 => "bullish",
        s if s < -0.25 => "bearish",
        _ => "neutral",
    };
    json!({ "score": score, "label": label })
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
