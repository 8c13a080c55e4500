use crate::fanout::Subscription;
use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Pump one subscription into a WebSocket until either side goes away.
///
/// The subscription is dropped on every exit path, which unregisters it.
pub(crate) async fn pump<T: Serialize>(
    mut socket: WebSocket,
    mut subscription: Subscription<Arc<T>>,
    shutdown: CancellationToken,
) {
    let subscriber = subscription.id();
    debug!(%subscriber, "Subscriber connected");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                // Best effort; the peer may already be gone.
                if let Err(e) = socket.send(Message::Close(None)).await {
                    debug!(%subscriber, error = %e, "Close frame not delivered");
                }
                break;
            }

            message = subscription.recv() => {
                let Some(message) = message else { break };
                let payload = match serde_json::to_string(message.as_ref()) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!(%subscriber, error = %e, "Failed to serialize message, dropping it");
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(payload.into())).await {
                    debug!(%subscriber, error = %e, "Write failed");
                    break;
                }
            }

            incoming = socket.recv() => match incoming {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Err(e)) => {
                    debug!(%subscriber, error = %e, "Read failed");
                    break;
                }
                // Subscribers only listen; anything they send is ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(%subscriber, "Subscriber disconnected");
}
