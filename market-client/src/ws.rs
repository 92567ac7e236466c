//! WebSocket транспорт поверх `tungstenite`.
//!
//! На каждое соединение — свой I/O поток. Поток крутит цикл с коротким
//! read timeout (как UDP-приёмник: таймаут = "тик"), на каждом тике
//! выгребает исходящие кадры и отдаёт входящие события в общий канал
//! вместе с номером соединения.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, info, trace, warn};
use market_core::endpoint::is_secure;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::error::TransportError;
use crate::transport::{ConnectionId, Transport, TransportEvent};

const TICK_RATE_MS: u64 = 200;
const CONNECT_TIMEOUT_S: u64 = 10;
const WRITE_TIMEOUT_S: u64 = 5;

/// Событие с номером соединения, от которого оно пришло
pub type ConnectionEvent = (ConnectionId, TransportEvent);

enum Outbound {
    Text(String),
    Close,
}

struct Connection {
    id: ConnectionId,
    outbound: Sender<Outbound>,
}

pub struct WsTransport {
    events: Sender<ConnectionEvent>,
    next_id: ConnectionId,
    current: Option<Connection>,
}

impl WsTransport {
    /// Транспорт и приёмник его событий
    pub fn channel() -> (Self, Receiver<ConnectionEvent>) {
        install_crypto_provider();

        let (tx, rx) = crossbeam_channel::unbounded();
        let transport = Self {
            events: tx,
            next_id: 0,
            current: None,
        };
        (transport, rx)
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &Url) -> Result<ConnectionId, TransportError> {
        // новое соединение вытесняет старое
        self.close();

        // только проверка URL: резолвинг делает поток соединения
        let (host, port) = host_port(url)?;
        debug!(
            "opening {} connection to {host}:{port}",
            if is_secure(url) { "tls" } else { "plain" }
        );

        self.next_id += 1;
        let id = self.next_id;

        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        let events = self.events.clone();
        let url = url.clone();

        // поток не ждём при close: он может висеть в connect/handshake
        thread::Builder::new()
            .name(format!("ws-conn-{id}"))
            .spawn(move || run_connection(id, url, host, port, out_rx, events))?;

        self.current = Some(Connection {
            id,
            outbound: out_tx,
        });
        Ok(id)
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let conn = self.current.as_ref().ok_or(TransportError::NotConnected)?;
        conn.outbound
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| TransportError::WorkerGone)
    }

    fn close(&mut self) {
        if let Some(conn) = self.current.take() {
            debug!("closing connection #{}", conn.id);
            // поток мог уже завершиться сам
            let _ = conn.outbound.send(Outbound::Close);
        }
    }

    fn current(&self) -> Option<ConnectionId> {
        self.current.as_ref().map(|c| c.id)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Провайдер криптографии rustls для `wss://`. Повторный вызов безопасен
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn host_port(url: &Url) -> Result<(String, u16), TransportError> {
    let host = url
        .host_str()
        .ok_or_else(|| TransportError::Url(format!("no host in {url}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| TransportError::Url(format!("no port for {url}")))?;
    // IPv6 литерал приходит в скобках
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((host.to_string(), port))
}

/// Резолвит адрес и перебирает все результаты: `localhost` может дать
/// сначала `::1`, а сервер слушать только IPv4
fn dial(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(TransportError::Url(format!(
            "{host}:{port} resolved to nothing"
        )));
    }
    connect_any(&addrs)
}

fn connect_any(addrs: &[SocketAddr]) -> Result<TcpStream, TransportError> {
    let mut last = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, Duration::from_secs(CONNECT_TIMEOUT_S)) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!("connect to {addr} failed: {e}");
                last = Some(e);
            }
        }
    }
    Err(match last {
        Some(e) => TransportError::Io(e),
        None => TransportError::Url("no addresses to connect to".into()),
    })
}

fn run_connection(
    id: ConnectionId,
    url: Url,
    host: String,
    port: u16,
    outbound: Receiver<Outbound>,
    events: Sender<ConnectionEvent>,
) {
    let emit = |ev: TransportEvent| events.send((id, ev)).is_ok();

    let mut ws = match handshake(&url, &host, port) {
        Ok(ws) => ws,
        Err(e) => {
            warn!("connection #{id} to {url} failed: {e}");
            emit(TransportEvent::Error(e.to_string()));
            emit(TransportEvent::Closed);
            return;
        }
    };

    info!("connection #{id} open: {url}");
    if !emit(TransportEvent::Opened) {
        return;
    }

    match pump(&mut ws, &outbound, &emit) {
        Ok(()) => debug!("connection #{id} closed"),
        Err(e) => {
            warn!("connection #{id} failed: {e}");
            emit(TransportEvent::Error(e.to_string()));
        }
    }

    emit(TransportEvent::Closed);
}

fn handshake(
    url: &Url,
    host: &str,
    port: u16,
) -> Result<WebSocket<MaybeTlsStream<TcpStream>>, TransportError> {
    let tcp = dial(host, port)?;
    tcp.set_nodelay(true).ok();
    tcp.set_write_timeout(Some(Duration::from_secs(WRITE_TIMEOUT_S)))
        .ok();
    // на время handshake читаем блокирующе, но не бесконечно
    tcp.set_read_timeout(Some(Duration::from_secs(CONNECT_TIMEOUT_S)))
        .ok();

    // тот же сокет: после handshake выставим короткий таймаут
    let probe = tcp.try_clone()?;

    let (ws, response) = tungstenite::client_tls(url.as_str(), tcp)
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    trace!("handshake response: {}", response.status());

    probe.set_read_timeout(Some(Duration::from_millis(TICK_RATE_MS)))?;
    Ok(ws)
}

/// Цикл соединения. `Ok` — закрыто штатно (любой стороной)
fn pump(
    ws: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    outbound: &Receiver<Outbound>,
    emit: &impl Fn(TransportEvent) -> bool,
) -> Result<(), TransportError> {
    loop {
        // исходящие
        loop {
            match outbound.try_recv() {
                Ok(Outbound::Text(text)) => ws.send(Message::Text(text))?,
                Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                    let _ = ws.close(None);
                    let _ = ws.flush();
                    return Ok(());
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        // входящие
        match ws.read() {
            Ok(Message::Text(text)) => {
                if !emit(TransportEvent::Message(text)) {
                    // хост больше не слушает
                    let _ = ws.close(None);
                    return Ok(());
                }
            }
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => {
                    emit(TransportEvent::Message(text));
                }
                Err(_) => debug!("dropping non-utf8 binary frame"),
            },
            Ok(Message::Close(frame)) => {
                debug!("server closed: {frame:?}");
                // дальше read вернёт ConnectionClosed
            }
            // ping/pong/raw frame: ответ на ping tungstenite отправит сам
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
            {
                // просто "тик" цикла; заодно дотолкнём отложенные pong
                match ws.flush() {
                    Ok(()) => {}
                    Err(tungstenite::Error::Io(e))
                        if e.kind() == ErrorKind::WouldBlock
                            || e.kind() == ErrorKind::TimedOut => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}
