//! Точка входа `market-client`.
//!
//! Жизненный цикл:
//! - парсинг CLI, вывод URL эндпоинта из origin, загрузка символов
//! - запуск цикла событий клиента в отдельном потоке (WebSocket + таймеры)
//! - печать событий потока через наблюдателя в основном потоке
//! - корректная остановка по `Ctrl+C`

mod cli;
mod symbols;

use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use market_client::{ClientConfig, StreamEvent, runtime};

const TICK_RATE_MS: u64 = 200;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/trace
    env_logger::init();

    let args = cli::Args::parse();
    args.validate()?;

    let symbols = symbols::load_symbols(&args)?;
    let channels = symbols::load_channels(&args);

    let mut config = ClientConfig::from_origin(&args.origin)?
        .with_auto_reconnect(!args.no_reconnect)
        .with_ping_interval(args.ping_interval())
        .with_reconnect_delay(args.reconnect_delay())
        .with_symbols(symbols.iter().cloned())
        .with_channels(channels.iter().cloned());
    if let Some(user_id) = &args.user_id {
        config = config.with_user_id(user_id.clone());
    }

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    info!(
        "Starting market-client: url={}, symbols={}, channels={}, reconnect={}",
        config.url,
        symbols.join(","),
        channels.join(","),
        config.auto_reconnect
    );

    let (handle, worker) = runtime::spawn(config, shutdown.clone())?;
    let events = handle.view().events();

    while !shutdown.load(Ordering::Relaxed) {
        match events.recv_timeout(Duration::from_millis(TICK_RATE_MS)) {
            Ok(event) => print_event(&event),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    if worker.join().is_err() {
        warn!("event loop thread panicked");
    }

    let view = handle.view();
    info!(
        "final: {} prices, {} indices, last update {}",
        view.latest_prices().len(),
        view.market_indices().len(),
        view.last_update()
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339())
    );

    Ok(())
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::Status(status) => info!("status: {status}"),
        StreamEvent::Connected { message } => {
            info!("server: {}", message.as_deref().unwrap_or("connected"))
        }
        StreamEvent::Prices(quotes) => {
            for q in quotes {
                info!("{q}");
            }
        }
        StreamEvent::Indices(indices) => {
            for i in indices {
                info!("{i}");
            }
        }
        StreamEvent::News(data) => info!("news: {data}"),
        StreamEvent::Sentiment(data) => debug!("sentiment: {data}"),
    }
}
