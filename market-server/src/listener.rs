use crate::config::{SESSION_TICK, SessionId, WRITE_TIMEOUT};
use crate::feed::{FeedEvent, MarketCache};
use crate::session::run_session;
use anyhow::Context;
use log::{info, warn};
use market_core::{Hub, STREAM_PATH};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, atomic::AtomicBool, atomic::AtomicU64, atomic::Ordering};
use std::thread;
use std::time::Duration;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;

/// Общее для всех сессий
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) hub: Arc<Hub<FeedEvent>>,
    pub(crate) cache: MarketCache,
    pub(crate) next_id: Arc<AtomicU64>,
    pub(crate) shutdown: Arc<AtomicBool>,
}

// accept loop + WebSocket handshake
pub(crate) fn run_listener(listener: TcpListener, ctx: SessionContext) -> anyhow::Result<()> {
    listener
        .set_nonblocking(true)
        .context("listener.set_nonblocking(true)")?;
    info!(
        "listening on ws://{}{}",
        listener.local_addr().context("listener.local_addr()")?,
        STREAM_PATH
    );
    let mut session_handles = Vec::new();

    loop {
        reap_finished_sessions(&mut session_handles);

        if ctx.shutdown.load(Ordering::Relaxed) {
            info!("shutting down listener");
            break;
        }

        match listener.accept() {
            Ok((stream, addr)) => {
                stream
                    .set_nonblocking(false)
                    .context("stream.set_nonblocking(false)")?;
                stream.set_nodelay(true).ok();
                stream.set_write_timeout(Some(WRITE_TIMEOUT)).ok();

                let ctx = ctx.clone();
                let h = thread::spawn(move || {
                    if let Err(e) = handle_conn(stream, addr, ctx) {
                        warn!("handle_conn error: {e}");
                    }
                });
                session_handles.push(h);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // нет новых соединений прямо сейчас
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                warn!("accept error: {e}");
                thread::sleep(Duration::from_millis(50));
            }
        }
    }

    for h in session_handles {
        if let Err(panic) = h.join() {
            warn!("session thread panicked: {:?}", panic);
        }
    }

    Ok(())
}

fn reap_finished_sessions(handles: &mut Vec<thread::JoinHandle<()>>) {
    let mut i = 0;
    while i < handles.len() {
        if handles[i].is_finished() {
            let h = handles.swap_remove(i);
            if let Err(panic) = h.join() {
                warn!("session thread panicked: {:?}", panic);
            }
        } else {
            i += 1;
        }
    }
}

/// Пускаем только на путь потока
fn check_path(req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == STREAM_PATH {
        return Ok(resp);
    }
    let mut err = ErrorResponse::new(Some(format!("no stream at {}", req.uri().path())));
    *err.status_mut() = StatusCode::NOT_FOUND;
    Err(err)
}

fn handle_conn(stream: TcpStream, addr: SocketAddr, ctx: SessionContext) -> anyhow::Result<()> {
    // handshake читаем блокирующе, но не бесконечно
    stream
        .set_read_timeout(Some(WRITE_TIMEOUT))
        .context("set handshake read timeout")?;

    let mut ws = tungstenite::accept_hdr(stream, check_path)
        .map_err(|e| anyhow::anyhow!("handshake with {addr} failed: {e}"))?;
    ws.get_ref()
        .set_read_timeout(Some(SESSION_TICK))
        .context("set session read timeout")?;

    let sid: SessionId = ctx.next_id.fetch_add(1, Ordering::Relaxed);
    let rx = ctx.hub.add_subscriber(sid)?;
    info!("session {sid} opened from {addr}");

    let res = run_session(sid, &mut ws, rx, &ctx.cache, &ctx.shutdown);

    ctx.hub.remove_subscriber(sid);

    if let Err(e) = res {
        warn!("session {sid} ended with error: {e}");
    }
    Ok(())
}
