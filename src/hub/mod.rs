//! Client Hub (C5): the WebSocket endpoint browser extensions connect to.
//!
//! One broadcast channel fans outbound frames (commands, pings) out to every
//! connected client — the wire is broadcast, not unicast (spec §5). Liveness
//! is tracked per connection; a sweep task periodically pings everyone and
//! force-closes any connection that has gone quiet for too long.

pub mod frames;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::correlator::{Broadcaster, Correlator};
use crate::model::{now_ms, LogEntry, LogLevel};
use crate::registry::{TabRegistry, TabUpdate};
use crate::store::log::LogStore;
use crate::store::net::NetStore;
use frames::ClientFrame;
pub use frames::ServerFrame;

const INJECT_MARKER_MESSAGE: &str = "--- marker ---";

/// Commands the sweep task sends to a single connection's own task, since
/// only that task owns the split `ws_tx` sink.
enum ClientCommand {
    Ping,
    Close,
}

struct ClientControl {
    /// Liveness flag (spec §4.4): set false when pinged, flipped back to
    /// true on the next pong or `heartbeat` frame. A client still false at
    /// the next sweep tick is terminated.
    alive: Arc<AtomicBool>,
    control: mpsc::Sender<ClientCommand>,
}

pub struct ClientHub {
    log_store: Arc<LogStore>,
    net_store: Arc<NetStore>,
    registry: Arc<TabRegistry>,
    correlator: Arc<Correlator>,
    outbound: broadcast::Sender<ServerFrame>,
    clients: Mutex<HashMap<u64, ClientControl>>,
    next_client_id: AtomicU64,
}

impl ClientHub {
    pub fn new(
        log_store: Arc<LogStore>,
        net_store: Arc<NetStore>,
        registry: Arc<TabRegistry>,
        correlator: Arc<Correlator>,
    ) -> Self {
        let (outbound, _rx) = broadcast::channel(1024);
        Self {
            log_store,
            net_store,
            registry,
            correlator,
            outbound,
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// Spawn the background liveness sweep. Called once after the hub is
    /// wrapped in an `Arc` (spec §4.4: a client still unresponsive after
    /// one full heartbeat interval is force-closed).
    pub fn spawn_heartbeat_sweep(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_stale_clients();
            }
        });
    }

    /// Spec §4.4's liveness algorithm: a client whose flag is still false
    /// (didn't respond to the previous tick's ping) is terminated; survivors
    /// are pinged — transport-level `Message::Ping` plus a `ping` frame —
    /// and their flag is reset to false until the next pong/heartbeat.
    fn sweep_stale_clients(&self) {
        let mut clients = self.clients.lock().unwrap();
        clients.retain(|_, control| {
            if !control.alive.load(Ordering::Relaxed) {
                let _ = control.control.try_send(ClientCommand::Close);
                false
            } else {
                control.alive.store(false, Ordering::Relaxed);
                let _ = control.control.try_send(ClientCommand::Ping);
                true
            }
        });
        let _ = self.outbound.send(ServerFrame::ping());
    }

    /// Handle one upgraded WebSocket connection end-to-end.
    async fn handle_connection(self: Arc<Self>, socket: WebSocket) {
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let alive = Arc::new(AtomicBool::new(true));
        let (control_tx, mut control_rx) = mpsc::channel(4);

        self.clients.lock().unwrap().insert(
            client_id,
            ClientControl {
                alive: alive.clone(),
                control: control_tx,
            },
        );

        let (mut ws_tx, mut ws_rx) = socket.split();
        let mut outbound_rx = self.outbound.subscribe();

        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let frame = match frame {
                        Ok(f) => f,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    if send_frame(&mut ws_tx, &frame).await.is_err() {
                        break;
                    }
                }
                cmd = control_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Ping) => {
                            if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                                break;
                            }
                        }
                        Some(ClientCommand::Close) | None => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                msg = ws_rx.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(_)) | None => break,
                    };
                    match msg {
                        Message::Text(text) => {
                            match serde_json::from_str::<ClientFrame>(&text) {
                                Ok(frame) => self.dispatch(frame, &alive),
                                Err(e) => tracing::warn!(error = %e, "dropping unparseable client frame"),
                            }
                        }
                        Message::Pong(_) => {
                            alive.store(true, Ordering::Relaxed);
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        }

        self.clients.lock().unwrap().remove(&client_id);
    }

    /// Apply one inbound frame's effects on the stores/registry/correlator.
    fn dispatch(&self, frame: ClientFrame, alive: &AtomicBool) {
        match frame {
            ClientFrame::Log(entry) => {
                self.registry
                    .ensure_minimal(entry.tab_id, &entry.session_id, &entry.url);
                self.log_store.add(entry);
            }
            ClientFrame::NetworkEntry(entry) => {
                self.registry
                    .ensure_minimal(entry.tab_id, &entry.session_id, &entry.page_url);
                self.net_store.add(entry);
            }
            ClientFrame::TabOpened(p) | ClientFrame::TabUpdated(p) => {
                self.registry.upsert(TabUpdate {
                    id: p.id,
                    url: p.url,
                    title: p.title,
                    session_id: p.session_id,
                    is_active: p.is_active,
                    last_navigation_at: p.last_navigation_at,
                });
            }
            ClientFrame::TabClosed(p) => self.registry.remove(p.id),
            ClientFrame::Heartbeat(_) => {
                alive.store(true, Ordering::Relaxed);
            }
            ClientFrame::InjectMarker(p) => {
                self.log_store.add(LogEntry {
                    id: Uuid::new_v4().to_string(),
                    timestamp: now_ms(),
                    level: LogLevel::Info,
                    message: INJECT_MARKER_MESSAGE.to_string(),
                    args: vec![],
                    stack: None,
                    tab_id: p.tab_id,
                    url: p.url,
                    session_id: p.session_id,
                });
            }
            ClientFrame::ExecuteJsResponse(payload)
            | ClientFrame::PageInfoResponse(payload)
            | ClientFrame::QueryDomResponse(payload)
            | ClientFrame::DomSnapshotResponse(payload) => {
                self.correlator.resolve(payload);
            }
        }
    }
}

impl Broadcaster for ClientHub {
    fn broadcast(&self, frame: ServerFrame) {
        let _ = self.outbound.send(frame);
    }
}

async fn send_frame<S>(tx: &mut S, frame: &ServerFrame) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

pub async fn ws_handler(
    State(hub): State<Arc<ClientHub>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| hub.handle_connection(socket))
}
