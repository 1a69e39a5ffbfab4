use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rdvs::config::ServerConfig;
use rdvs::ServerState;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsRecv = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub fn test_config(port: u16) -> ServerConfig {
    ServerConfig {
        port,
        metrics_addr: "127.0.0.1:0".parse().unwrap(),
        max_conns: 100,
        max_message_size: 1024,
        ping_interval: 30,
        idle_timeout: 120,
    }
}

pub async fn start_server() -> (SocketAddr, Arc<ServerState>) {
    start_server_with_max_message(1024).await
}

pub async fn start_server_with_max_message(
    max_message_size: usize,
) -> (SocketAddr, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = test_config(addr.port());
    config.max_message_size = max_message_size;
    let state = Arc::new(ServerState::new(config));

    let state_clone = state.clone();
    tokio::spawn(async move {
        if let Err(e) = rdvs::run(listener, state_clone).await {
            eprintln!("server error in test: {e}");
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, state)
}

pub struct TestClient {
    pub ws_tx: WsSink,
    pub ws_rx: WsRecv,
}

impl TestClient {
    /// Connect and register under the given `/<namespace>/<session>/<id>` path.
    pub async fn connect(addr: &SocketAddr, path: &str) -> Self {
        let url = format!("ws://{addr}{path}");
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let (ws_tx, ws_rx) = ws.split();
        Self { ws_tx, ws_rx }
    }

    /// Block until this client's registration is visible server-side by
    /// completing a list round-trip. Registration happens after the
    /// handshake returns, so peers that are about to be addressed by
    /// another client must sync first.
    pub async fn sync(&mut self) {
        self.send_json(&serde_json::json!({"id": "sync", "type": "list"}))
            .await
            .unwrap();
        let reply = self.recv_json().await;
        assert_eq!(reply["type"], "list");
    }

    pub async fn send_json(
        &mut self,
        value: &Value,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.ws_tx.send(Message::Text(value.to_string().into())).await
    }

    pub async fn send_text(
        &mut self,
        text: &str,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        self.ws_tx.send(Message::Text(text.to_string().into())).await
    }

    /// Receive the next text frame as JSON, panicking after 2 seconds.
    pub async fn recv_json(&mut self) -> Value {
        self.recv_json_timeout(Duration::from_secs(2))
            .await
            .expect("timed out waiting for a message")
    }

    /// Receive the next text frame as JSON, or `None` if the connection
    /// closes or the timeout elapses first.
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Option<Value> {
        let result = tokio::time::timeout(timeout, async {
            while let Some(msg) = self.ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        return Some(serde_json::from_str(text.as_str()).unwrap())
                    }
                    Ok(Message::Close(_)) | Err(_) => return None,
                    _ => {}
                }
            }
            None
        })
        .await;
        result.ok().flatten()
    }

    /// Assert that no text frame arrives within the given window.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Some(value) = self.recv_json_timeout(window).await {
            panic!("expected silence, got {value}");
        }
    }

    /// Assert that the server closes this connection.
    pub async fn expect_closed(mut self) {
        let result = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(msg) = self.ws_rx.next().await {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => return true,
                    _ => {}
                }
            }
            true
        })
        .await;
        assert!(result.unwrap_or(false), "expected connection to close");
    }
}
