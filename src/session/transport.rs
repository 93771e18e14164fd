//! Websocket plumbing for a session
//!
//! A running session is three tasks sharing one [`CancellationToken`]:
//!
//! ```text
//!              ┌──────────────┐   Outbound    ┌─────────────┐
//!  requests ──►│ SessionCore  │──────────────►│ write_loop  │──► sink
//!              └──────────────┘       ▲       └─────────────┘
//!                     ▲               │ Ping
//!                     │        ┌──────┴────────┐
//!   stream ──► read_loop       │ keepalive_loop│
//!                              └───────────────┘
//! ```
//!
//! The reader and the writer both cancel the token when they exit, so a
//! failure in any task winds the whole session down.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::machine::{dispatch_all, Outbound, ReadOutcome, SessionCore};
use crate::client::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::constants::PING_PAYLOAD;
use crate::stats::ControlFrame;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(crate) type SharedCore = Arc<Mutex<SessionCore>>;

/// Open the websocket: resolve, TCP connect, TLS handshake and upgrade
pub(crate) async fn connect(config: &ClientConfig) -> Result<WsStream> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);

    let (stream, response) =
        tokio_tungstenite::connect_async_with_config(config.url(), Some(ws_config), true)
            .await
            .map_err(|e| {
                tracing::error!(
                    client_id = config.client_id,
                    host = %config.host,
                    port = config.port,
                    error = %e,
                    "Websocket connect failed"
                );
                ClientError::TransportError
            })?;

    tracing::debug!(
        client_id = config.client_id,
        status = %response.status(),
        "Websocket upgrade complete"
    );

    Ok(stream)
}

/// Sole owner of the sink; writes queued items in order
pub(crate) async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    shutdown: CancellationToken,
) {
    let _guard = shutdown.clone().drop_guard();

    loop {
        let item = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                flush(&mut sink, &mut outbound).await;
                break;
            }
            item = outbound.recv() => item,
        };

        match item {
            Some(Outbound::Text(text)) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "Write failed");
                    break;
                }
            }
            Some(Outbound::Ping(ack)) => {
                let result = sink.send(Message::Ping(PING_PAYLOAD.to_vec())).await;
                let failed = result.is_err();
                let _ = ack.send(result);
                if failed {
                    break;
                }
            }
            None => break,
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "Error closing websocket");
    }
}

/// Write requests queued before shutdown; pending pings are abandoned
async fn flush(
    sink: &mut SplitSink<WsStream, Message>,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
) {
    while let Ok(item) = outbound.try_recv() {
        if let Outbound::Text(text) = item {
            if sink.feed(Message::Text(text)).await.is_err() {
                return;
            }
        }
    }
    let _ = sink.flush().await;
}

/// Ping every `interval` until cancelled or a ping fails
pub(crate) async fn keepalive_loop(
    outbound: mpsc::UnboundedSender<Outbound>,
    core: SharedCore,
    interval: Duration,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let (ack, acked) = oneshot::channel();
        if outbound.send(Outbound::Ping(ack)).is_err() {
            break;
        }

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = acked => result,
        };

        match result {
            Ok(Ok(())) => core.lock().on_ping_sent(),
            Ok(Err(e)) => {
                let notifications = core.lock().on_ping_failed(&e.to_string());
                dispatch_all(notifications);
                shutdown.cancel();
                break;
            }
            // Writer exited without answering
            Err(_) => break,
        }
    }
}

/// Consume frames until the connection fails, a frame is unparsable, or
/// the session is shut down
///
/// A panic while handling a frame means the server broke the protocol
/// contract. It is caught here so the session halts and reports it instead
/// of dying with its state still `Running`.
pub(crate) async fn read_loop(
    stream: SplitStream<WsStream>,
    core: SharedCore,
    shutdown: CancellationToken,
) {
    let _guard = shutdown.clone().drop_guard();

    let frames = AssertUnwindSafe(read_frames(stream, Arc::clone(&core), shutdown));
    if let Err(panic) = frames.catch_unwind().await {
        let reason = panic_reason(panic.as_ref());
        let notifications = core.lock().on_contract_violation(&reason);
        dispatch_all(notifications);
    }

    tracing::debug!("Read loop finished");
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "read loop panicked".to_owned()
    }
}

async fn read_frames(
    mut stream: SplitStream<WsStream>,
    core: SharedCore,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                let notifications = core.lock().on_transport_error("connection shut down");
                dispatch_all(notifications);
                break;
            }
            frame = stream.next() => frame,
        };

        let outcome = match frame {
            Some(Ok(Message::Text(text))) => core.lock().on_frame(text.as_bytes()),
            Some(Ok(Message::Binary(data))) => core.lock().on_frame(&data),
            Some(Ok(Message::Ping(_))) => {
                core.lock().on_control_frame(ControlFrame::Ping);
                continue;
            }
            Some(Ok(Message::Pong(_))) => {
                core.lock().on_control_frame(ControlFrame::Pong);
                continue;
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(frame = ?frame, "Close frame received");
                core.lock().on_control_frame(ControlFrame::Close);
                continue;
            }
            Some(Ok(Message::Frame(_))) => continue,
            Some(Err(e)) => ReadOutcome::Halt(core.lock().on_transport_error(&e.to_string())),
            None => ReadOutcome::Halt(core.lock().on_transport_error("connection closed by peer")),
        };

        match outcome {
            ReadOutcome::Continue(notifications) => dispatch_all(notifications),
            ReadOutcome::Halt(notifications) => {
                dispatch_all(notifications);
                break;
            }
        }
    }
}
