use crate::admission::{authorize, PeerPath, RejectReason};
use crate::error::RdvsError;
use crate::metrics::{counters, gauges, histograms};
use crate::registry::PeerHandle;
use crate::route::process_message;
use crate::server::ServerState;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRecv = SplitStream<WebSocketStream<TcpStream>>;

/// Transport-level frame cap. Kept well above the application size guard so
/// an oversized payload is dropped by us, not torn down by the protocol
/// layer: the connection must stay open.
const TRANSPORT_MESSAGE_CAP: usize = 64 * 1024;

/// Depth of the per-connection outbound queue; relays to a peer that has
/// fallen this far behind are dropped.
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Drive one accepted TCP connection through its full lifecycle: WebSocket
/// handshake, path authorization, registration, the message loop, and
/// finally deregistration. Any authorization failure closes the socket
/// without ever creating a registry entry.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), RdvsError> {
    let ws_config = WebSocketConfig::default()
        .max_message_size(Some(TRANSPORT_MESSAGE_CAP))
        .max_frame_size(Some(TRANSPORT_MESSAGE_CAP));

    let request_path = Arc::new(std::sync::OnceLock::new());
    let path_cell = request_path.clone();
    let ws_stream = tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        move |req: &Request<()>, resp: tokio_tungstenite::tungstenite::http::Response<()>| {
            let _ = path_cell.set(req.uri().path().to_string());
            Ok(resp)
        },
        Some(ws_config),
    )
    .await
    .map_err(RdvsError::WebSocket)?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let raw_path = request_path.get().map(String::as_str).unwrap_or("");
    let path = match authorize(raw_path, &state.registry) {
        Ok(path) => path,
        Err(reason) => {
            counters::registrations_total("rejected");
            tracing::warn!(%peer_addr, path = raw_path, "refusing connection: {}", reason);
            let _ = ws_tx.send(Message::Close(None)).await;
            return Err(RdvsError::Rejected(reason));
        }
    };

    let (deliver_tx, mut deliver_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);
    let registered_at = Instant::now();
    let handle = PeerHandle {
        tx: deliver_tx,
        registered_at,
    };

    // authorize() already screened for duplicates, but the authoritative
    // check is this insert; a lost race surfaces here.
    if state
        .registry
        .register(path.namespace, &path.session, &path.peer_id, handle)
        .is_err()
    {
        let reason = RejectReason::DuplicatePeer;
        counters::registrations_total("rejected");
        tracing::warn!(%peer_addr, path = raw_path, "refusing connection: {}", reason);
        let _ = ws_tx.send(Message::Close(None)).await;
        return Err(RdvsError::Rejected(reason));
    }

    counters::registrations_total("registered");
    gauges::inc_connections_active();
    tracing::info!(
        "new peer {}/{}/{} from {}",
        path.namespace,
        path.session,
        path.peer_id,
        peer_addr
    );

    let result = run_message_loop(&mut ws_tx, &mut ws_rx, &mut deliver_rx, &state, &path).await;

    state
        .registry
        .unregister(path.namespace, &path.session, &path.peer_id, registered_at);
    gauges::dec_connections_active();
    tracing::info!(
        "peer {}/{}/{} disconnected",
        path.namespace,
        path.session,
        path.peer_id
    );

    result
}

/// Select-loop for a registered connection: inbound frames go through the
/// size guard into the router, queued deliveries go out, and a ping tick
/// keeps the link alive and enforces the idle timeout.
async fn run_message_loop(
    ws_tx: &mut WsSink,
    ws_rx: &mut WsRecv,
    deliver_rx: &mut mpsc::Receiver<String>,
    state: &ServerState,
    path: &PeerPath,
) -> Result<(), RdvsError> {
    let mut ping_interval = interval(Duration::from_secs(state.config.ping_interval));
    let idle_timeout = Duration::from_secs(state.config.idle_timeout);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(text.as_str(), state, ws_tx, path).await?;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Binary frames carrying JSON text are accepted;
                        // anything non-UTF-8 is just an undecodable
                        // message. The size guard runs before any decode.
                        if oversized(data.len(), state, path) {
                            continue;
                        }
                        match std::str::from_utf8(&data) {
                            Ok(text) => handle_inbound(text, state, ws_tx, path).await?,
                            Err(_) => {
                                counters::messages_dropped_total("undecodable");
                                tracing::debug!(peer = %path.peer_id, "dropping non-utf8 binary message");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_tx.send(Message::Pong(data)).await {
                            tracing::debug!("failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(RdvsError::WebSocket(e)),
                    _ => {}
                }
            }
            Some(text) = deliver_rx.recv() => {
                last_activity = Instant::now();
                counters::payload_bytes_total("out", text.len() as u64);
                ws_tx.send(Message::Text(text.into())).await.map_err(RdvsError::WebSocket)?;
            }
            _ = ping_interval.tick() => {
                if last_activity.elapsed() >= idle_timeout {
                    tracing::debug!("idle timeout reached, closing connection");
                    return Ok(());
                }
                if let Err(e) = ws_tx.send(Message::Ping(vec![].into())).await {
                    tracing::debug!("failed to send ping: {}", e);
                }
            }
        }
    }
}

/// Size guard applied before any decoding. Returns true when the message
/// must be dropped; the connection stays open either way.
fn oversized(len: usize, state: &ServerState, path: &PeerPath) -> bool {
    if len <= state.config.max_message_size {
        return false;
    }
    counters::messages_dropped_total("oversize");
    tracing::warn!(
        "peer {}/{}/{} sent an oversized message ({} bytes), dropping",
        path.namespace,
        path.session,
        path.peer_id,
        len
    );
    true
}

/// Apply the size guard, then hand the payload to the router.
async fn handle_inbound(
    text: &str,
    state: &ServerState,
    ws_tx: &mut WsSink,
    path: &PeerPath,
) -> Result<(), RdvsError> {
    if oversized(text.len(), state, path) {
        return Ok(());
    }

    let start = Instant::now();
    process_message(text, state, ws_tx, path).await?;
    histograms::relay_latency_seconds(start.elapsed().as_secs_f64());
    Ok(())
}
