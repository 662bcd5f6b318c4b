//! Live dashboard WebSocket.
//!
//! One viewer at a time: the upgrade handler leases the event channel's
//! consuming end before upgrading, so a second viewer is refused with
//! `409 stream_busy` instead of silently splitting the stream.
//!
//! Besides classified alerts, the socket also carries `robot_status` notices
//! from the cache's `robot_updates` pub/sub channel.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        Extension,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use tokio_util::sync::CancellationToken;

use smartwh_events::ChannelConsumer;
use smartwh_infra::cache::{Cache, ROBOT_UPDATES_CHANNEL, Subscription};
use smartwh_stream::{LiveTransport, StreamSession, TransportError};

use crate::app::errors;
use crate::app::services::AppServices;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new().route("/dashboard", get(dashboard_stream))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/ws/dashboard
pub async fn dashboard_stream(
    Extension(services): Extension<Arc<AppServices>>,
    ws: WebSocketUpgrade,
) -> axum::response::Response {
    let consumer = match services.channel.try_attach() {
        Ok(c) => c,
        Err(busy) => {
            tracing::warn!("dashboard stream refused: {busy}");
            return errors::json_error(
                StatusCode::CONFLICT,
                "stream_busy",
                "another dashboard is already attached to the live stream",
            );
        }
    };

    // Subscribed before the handshake completes so no notice is missed.
    let updates = match services.cache.subscribe(ROBOT_UPDATES_CHANNEL).await {
        Ok(feed) => Some(feed),
        Err(err) => {
            tracing::warn!(error = %err, "robot updates unavailable; streaming alerts only");
            None
        }
    };

    // If the upgrade fails the closure is dropped and the lease with it.
    ws.on_upgrade(move |socket| run_dashboard(socket, services, consumer, updates))
}

async fn run_dashboard(
    socket: WebSocket,
    services: Arc<AppServices>,
    consumer: ChannelConsumer,
    updates: Option<Subscription>,
) {
    let (sink, stream) = socket.split();
    let config = services.session_config();
    let cancel = services.shutdown.child_token();

    let reader = tokio::spawn(drain_inbound(stream, cancel.clone()));

    let mut session = StreamSession::new(services.store.clone(), config);
    if let Some(feed) = updates {
        session = session.with_relay(feed);
    }
    let outcome = session
        .run(consumer, WsTransport { sink }, cancel.clone())
        .await;

    reader.abort();

    let mut sink = outcome.transport.sink;
    let _ = tokio::time::timeout(config.write_timeout, sink.send(Message::Close(None))).await;

    tracing::info!(
        session_id = %outcome.report.session_id,
        end_reason = ?outcome.report.end_reason,
        delivered = outcome.report.delivered_events,
        sent = outcome.report.sent_messages,
        relayed = outcome.report.relayed_messages,
        "dashboard socket closed"
    );
}

/// Discard client frames; fire `cancel` when the client goes away.
async fn drain_inbound(mut stream: SplitStream<WebSocket>, cancel: CancellationToken) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    cancel.cancel();
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

struct WsTransport {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(TransportError::write)
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(TransportError::write)
    }
}
