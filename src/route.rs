use crate::admission::PeerPath;
use crate::error::RdvsError;
use crate::metrics::counters;
use crate::server::ServerState;
use futures_util::SinkExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tungstenite::Message;

/// Dispatch one inbound payload from a registered peer.
///
/// The caller has already applied the size guard; everything here either
/// answers the sender (a `"list"` request), relays the decoded object
/// verbatim to the peer named by its `id` field, or drops the message
/// silently. The sender never sees an error for a message-level failure.
pub(crate) async fn process_message<T>(
    text: &str,
    state: &ServerState,
    ws_tx: &mut T,
    path: &PeerPath,
) -> Result<(), RdvsError>
where
    T: futures_util::Sink<Message> + Unpin,
    T::Error: std::fmt::Debug,
{
    let Ok(decoded) = serde_json::from_str::<Value>(text) else {
        counters::messages_dropped_total("undecodable");
        tracing::debug!(peer = %path.peer_id, "dropping undecodable message");
        return Ok(());
    };

    let Some(dest_id) = decoded.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())
    else {
        counters::messages_dropped_total("missing_id");
        tracing::debug!(peer = %path.peer_id, "dropping message without id");
        return Ok(());
    };

    if decoded.get("type").and_then(Value::as_str) == Some("list") {
        let peer_ids = state.registry.list_peers(path.namespace, &path.session);
        let reply = serde_json::json!({
            "source_id": path.peer_id,
            "type": "list",
            "peer_ids": peer_ids,
        })
        .to_string();
        ws_tx
            .send(Message::Text(reply.into()))
            .await
            .map_err(|_| RdvsError::ConnectionClosed)?;
        counters::list_requests_total();
        return Ok(());
    }

    if let Some(dest) = state.registry.lookup(path.namespace, &path.session, dest_id) {
        match dest.tx.try_send(decoded.to_string()) {
            Ok(()) => {
                counters::messages_relayed_total();
                counters::payload_bytes_total("in", text.len() as u64);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                counters::messages_dropped_total("backpressure");
                tracing::debug!(dest = dest_id, "dropping message for slow peer");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Target task has exited but not yet unregistered; evict
                // the stale entry with its own token.
                counters::messages_dropped_total("offline");
                state
                    .registry
                    .unregister(path.namespace, &path.session, dest_id, dest.registered_at);
            }
        }
    } else {
        counters::messages_dropped_total("unknown_target");
        tracing::debug!(dest = dest_id, "dropping message for unknown peer");
    }

    Ok(())
}
