//! Точка входа `market-server`.
//!
//! Жизненный цикл:
//! - парсинг CLI и загрузка тикеров (по умолчанию — встроенный список)
//! - поток генератора: цены, индексы, новости -> хаб + кэш последних значений
//! - accept loop в основном потоке, одна сессия на поток
//! - корректная остановка по `Ctrl+C`

mod cli;
mod config;
mod feed;
mod generator;
mod listener;
mod session;

use std::net::TcpListener;
use std::sync::{Arc, atomic::AtomicBool, atomic::AtomicU64, atomic::Ordering};
use std::thread;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use market_core::Hub;

use crate::feed::{FeedIntervals, MarketCache};
use crate::generator::{GeneratorConfig, IndexGenerator, QuoteGenerator};
use crate::listener::SessionContext;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/trace
    env_logger::init();

    let args = cli::Args::parse();

    let tickers = config::load_server_tickers(args.tickers_file.clone(), args.tickers.as_deref())
        .context("load tickers")?;
    if tickers.is_empty() {
        anyhow::bail!("tickers list is empty");
    }
    info!("market-server: loaded {} tickers", tickers.len());

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    let ctx = SessionContext {
        hub: Arc::new(Hub::new()),
        cache: MarketCache::default(),
        next_id: Arc::new(AtomicU64::new(1)),
        shutdown: shutdown.clone(),
    };

    let feed = {
        let hub = ctx.hub.clone();
        let cache = ctx.cache.clone();
        let shutdown = shutdown.clone();
        let intervals = FeedIntervals {
            prices: args.price_interval(),
            indices: args.index_interval(),
        };
        thread::Builder::new()
            .name("feed".into())
            .spawn(move || {
                feed::run_feed(
                    QuoteGenerator::new(tickers, GeneratorConfig::default()),
                    IndexGenerator::new(GeneratorConfig::default()),
                    intervals,
                    hub,
                    cache,
                    shutdown,
                )
            })
            .context("spawn feed thread")?
    };

    let listener =
        TcpListener::bind(args.bind).with_context(|| format!("bind listener {}", args.bind))?;
    let result = listener::run_listener(listener, ctx);

    shutdown.store(true, Ordering::Relaxed);
    if feed.join().is_err() {
        warn!("feed thread panicked");
    }

    result
}
