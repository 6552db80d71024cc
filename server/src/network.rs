//! Server network layer: WebSocket accept loop and per-connection tasks

use crate::arena::Arena;
use crate::config::ServerConfig;
use crate::names::NameGenerator;
use crate::registry::OUTBOUND_CAPACITY;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ProtocolError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Relay server bound to a TCP port, accepting WebSocket clients
pub struct Server {
    listener: TcpListener,
    arena: Arc<Arena>,
}

impl Server {
    pub async fn bind(
        addr: &str,
        config: ServerConfig,
        names: Box<dyn NameGenerator>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            arena: Arc::new(Arena::new(config, names)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn arena(&self) -> Arc<Arena> {
        Arc::clone(&self.arena)
    }

    /// Accepts connections forever, spawning one task per client
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let arena = Arc::clone(&self.arena);
                    tokio::spawn(handle_connection(stream, addr, arena));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Upper bound on the closing handshake with a client that stopped reading
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Recurring timer whose first tick fires one full period after creation
fn periodic(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

/// Drives one client from handshake to close
///
/// Inbound frames, outbound frames, the three session timers and the
/// elimination signal are all handled from a single `select!` loop, so no two
/// handlers for the same session ever run at once. Leaving the loop drops
/// the timers before the close transition runs. A pending socket write still
/// yields to the elimination signal, so a client that stops reading cannot
/// hold its session open.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, arena: Arc<Arena>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut sink, mut inbound) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(OUTBOUND_CAPACITY);
    let session = arena.open(outbound_tx).await;
    debug!("Session {} is served from {}", session.id, addr);

    let config = arena.config().clone();
    let announce = sleep(config.announce_delay);
    tokio::pin!(announce);
    let mut announced = false;
    let mut reannounce = periodic(config.reannounce_interval);
    let mut collision = periodic(config.collision_interval);

    loop {
        tokio::select! {
            biased;

            _ = session.killed() => break,

            Some(frame) = outbound_rx.recv() => {
                let sent = tokio::select! {
                    biased;
                    _ = session.killed() => None,
                    result = sink.send(Message::binary(frame)) => Some(result),
                };
                match sent {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        debug!("Send to session {} failed: {}", session.id, e);
                        break;
                    }
                    None => break,
                }
            }

            message = inbound.next() => match message {
                Some(Ok(Message::Binary(frame))) => {
                    if let Err(e) = arena.handle_frame(&session, frame).await {
                        log_frame_error(session.id, &e);
                    }
                }
                Some(Ok(Message::Text(_))) => log_frame_error(session.id, &ProtocolError::NotBinary),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Connection error on session {}: {}", session.id, e);
                    break;
                }
            },

            _ = &mut announce, if !announced => {
                announced = true;
                arena.announce(&session).await;
            }

            _ = reannounce.tick() => arena.reannounce(&session).await,

            _ = collision.tick() => {
                arena.collide(&session).await;
            }
        }
    }

    arena.close(&session).await;
    match timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Closing session {} socket: {}", session.id, e),
        Err(_) => debug!("Session {} did not finish the closing handshake", session.id),
    }
}

fn log_frame_error(session_id: u32, error: &ProtocolError) {
    match error {
        ProtocolError::VersionMismatch { .. } => {
            debug!("Ignoring frame from session {}: {}", session_id, error)
        }
        _ => warn!("Dropping frame from session {}: {}", session_id, error),
    }
}
