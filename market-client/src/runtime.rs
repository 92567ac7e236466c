//! Цикл событий: единственное место, где клиент получает управление.
//!
//! Сюда сходятся три источника: события транспорта, команды от
//! [`StreamHandle`] и таймеры клиента. Все они обрабатываются в одном
//! потоке по очереди, так что клиенту не нужны блокировки.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::client::MarketStreamClient;
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::store::MarketView;
use crate::transport::{ConnectionId, Transport, TransportEvent};
use crate::ws::WsTransport;

const TICK_RATE_MS: u64 = 200;

/// Команда потребителя циклу событий
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Subscribe {
        symbols: Vec<String>,
        channels: Vec<String>,
    },
    Unsubscribe {
        symbols: Vec<String>,
        channels: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("event loop is not running")]
    Stopped,

    #[error("failed to spawn event loop: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Ручка управления клиентом, живущим в цикле событий. Дешёвый `Clone`
#[derive(Clone)]
pub struct StreamHandle {
    commands: Sender<Command>,
    view: MarketView,
}

impl StreamHandle {
    pub fn new(commands: Sender<Command>, view: MarketView) -> Self {
        Self { commands, view }
    }

    pub fn connect(&self) -> Result<(), RuntimeError> {
        self.send(Command::Connect)
    }

    pub fn disconnect(&self) -> Result<(), RuntimeError> {
        self.send(Command::Disconnect)
    }

    pub fn subscribe<S, C>(&self, symbols: &[S], channels: &[C]) -> Result<(), RuntimeError>
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        self.send(Command::Subscribe {
            symbols: owned(symbols),
            channels: owned(channels),
        })
    }

    pub fn unsubscribe<S, C>(&self, symbols: &[S], channels: &[C]) -> Result<(), RuntimeError>
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        self.send(Command::Unsubscribe {
            symbols: owned(symbols),
            channels: owned(channels),
        })
    }

    pub fn view(&self) -> &MarketView {
        &self.view
    }

    fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.commands.send(cmd).map_err(|_| RuntimeError::Stopped)
    }
}

fn owned<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}

/// Запускает клиент с WebSocket транспортом в отдельном потоке и сразу
/// подключается. Поток живёт до `shutdown` или до отбрасывания всех ручек.
pub fn spawn(
    config: ClientConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<(StreamHandle, JoinHandle<()>), RuntimeError> {
    let (transport, events) = WsTransport::channel();
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();

    let mut client = MarketStreamClient::new(config, transport);
    let handle = StreamHandle::new(cmd_tx, client.view());

    let worker = thread::Builder::new()
        .name("market-stream".into())
        .spawn(move || {
            client.connect();
            run_event_loop(&mut client, &events, cmd_rx, &shutdown);
        })?;

    Ok((handle, worker))
}

/// Крутит клиент, пока не поднят `shutdown` или не закрыты все источники.
/// На выходе клиент отключается.
pub fn run_event_loop<T, C>(
    client: &mut MarketStreamClient<T, C>,
    events: &Receiver<(ConnectionId, TransportEvent)>,
    commands: Receiver<Command>,
    shutdown: &AtomicBool,
) where
    T: Transport,
    C: Clock,
{
    let tick = Duration::from_millis(TICK_RATE_MS);
    let mut commands = commands;
    let mut handles_alive = true;
    let mut handles_dropped = false;

    while !shutdown.load(Ordering::Relaxed) {
        let timeout = client
            .time_to_next_deadline()
            .map_or(tick, |left| left.min(tick));

        select! {
            recv(events) -> msg => match msg {
                Ok((conn, event)) => {
                    if client.transport().current() == Some(conn) {
                        client.handle_event(event);
                    } else {
                        trace!("stale event from connection #{conn}: {event:?}");
                    }
                }
                Err(_) => {
                    warn!("transport event channel closed");
                    break;
                }
            },
            recv(commands) -> cmd => match cmd {
                Ok(cmd) => apply(client, cmd),
                Err(_) => handles_dropped = true,
            },
            default(timeout) => {}
        }

        if handles_dropped && handles_alive {
            // ручек больше нет: клиент продолжает жить до shutdown
            debug!("all stream handles dropped");
            commands = crossbeam_channel::never();
            handles_alive = false;
        }

        client.poll_timers();
    }

    info!(
        "event loop stopping (handles alive: {handles_alive}, status: {})",
        client.status()
    );
    client.disconnect();
}

fn apply<T: Transport, C: Clock>(client: &mut MarketStreamClient<T, C>, cmd: Command) {
    debug!("command: {cmd:?}");
    match cmd {
        Command::Connect => client.connect(),
        Command::Disconnect => client.disconnect(),
        Command::Subscribe { symbols, channels } => client.subscribe(&symbols, &channels),
        Command::Unsubscribe { symbols, channels } => client.unsubscribe(&symbols, &channels),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::FakeTransport;

    fn client() -> MarketStreamClient<FakeTransport, ManualClock> {
        let cfg = ClientConfig::from_origin("http://localhost:8080").unwrap();
        MarketStreamClient::with_clock(cfg, FakeTransport::default(), ManualClock::new())
    }

    #[test]
    fn loop_applies_commands_and_drops_stale_events() {
        let mut client = client();
        let view = client.view();
        let (ev_tx, ev_rx) = crossbeam_channel::unbounded();
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        client.subscribe(&["aapl"], &["news"]);
        client.connect();

        // FakeTransport нумерует соединения с 1
        ev_tx.send((7, TransportEvent::Opened)).unwrap();
        ev_tx.send((1, TransportEvent::Opened)).unwrap();
        ev_tx
            .send((
                1,
                TransportEvent::Message(
                    r#"{"type":"price","data":[{"symbol":"AAPL","price":190.5}]}"#.into(),
                ),
            ))
            .unwrap();
        ev_tx
            .send((
                7,
                TransportEvent::Message(
                    r#"{"type":"price","data":[{"symbol":"AAPL","price":1}]}"#.into(),
                ),
            ))
            .unwrap();

        let handle = StreamHandle::new(cmd_tx, view.clone());
        let sd = shutdown.clone();
        let driver = thread::spawn(move || {
            for _ in 0..100 {
                if handle.view().price("AAPL").is_some() {
                    break;
                }
                thread::sleep(Duration::from_millis(20));
            }
            handle.subscribe(&["msft"], &[] as &[&str]).unwrap();
            thread::sleep(Duration::from_millis(400));
            sd.store(true, Ordering::Relaxed);
        });

        run_event_loop(&mut client, &ev_rx, cmd_rx, &shutdown);
        driver.join().unwrap();

        assert_eq!(client.transport().opens, 1);
        assert_eq!(client.transport().closes, 1);
        assert_eq!(
            client.transport().sent,
            vec![
                r#"{"type":"subscribe","symbols":["AAPL"],"channels":["news"]}"#.to_string(),
                r#"{"type":"subscribe","symbols":["MSFT"],"channels":[]}"#.to_string(),
            ]
        );
        assert_eq!(view.price("AAPL").unwrap().price, 190.5);
        // после выхода из цикла клиент отключён
        assert!(!view.status().connected);
    }

    #[test]
    fn dropped_handle_reports_stopped() {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let handle = StreamHandle::new(cmd_tx, client().view());
        drop(cmd_rx);
        assert!(matches!(handle.connect(), Err(RuntimeError::Stopped)));
    }
}
