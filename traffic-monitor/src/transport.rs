// traffic-monitor/src/transport.rs
use common::ControlMessage;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream};

use crate::error::ChannelError;
use crate::registry::ShutdownSignal;

/// Connection state of a push channel as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Closed,
}

/// Output of the transport task
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Status(ConnectionStatus),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub url: String,
    pub app_id: String,
    pub max_backoff: Duration,
}

enum SessionEnd {
    Shutdown,
    Dropped,
}

/// Exponential reconnect delay, capped
pub fn backoff_delay(attempts: u32, max_backoff: Duration) -> Duration {
    let secs = 2u64.saturating_pow(attempts.min(16));
    Duration::from_secs(secs).min(max_backoff)
}

/// Drive one push channel until shutdown is signalled.
///
/// Connects, sends `subscribe`, and forwards text frames. Lost connections
/// are retried with capped exponential backoff. On shutdown the channel sends
/// `unsubscribe` before closing.
pub async fn run_push_channel<F>(options: TransportOptions, mut shutdown: ShutdownSignal, on_event: F)
where
    F: Fn(TransportEvent) + Send + Sync + 'static,
{
    let mut reconnect_attempts: u32 = 0;
    on_event(TransportEvent::Status(ConnectionStatus::Connecting));

    loop {
        let connected = tokio::select! {
            _ = &mut shutdown => break,
            result = connect_async(options.url.as_str()) => result,
        };

        match connected {
            Ok((ws_stream, _)) => {
                reconnect_attempts = 0;
                match run_session(ws_stream, &options, &mut shutdown, &on_event).await {
                    Ok(SessionEnd::Shutdown) => break,
                    Ok(SessionEnd::Dropped) => {
                        tracing::warn!("Push channel for {} dropped", options.app_id);
                    },
                    Err(e) => {
                        tracing::error!("Push channel for {} failed: {}", options.app_id, e);
                    }
                }
            },
            Err(e) => {
                tracing::error!(
                    "Push channel connection error for {}: {}",
                    options.app_id,
                    ChannelError::Connect(e)
                );
            }
        }

        on_event(TransportEvent::Status(ConnectionStatus::Connecting));

        let backoff = backoff_delay(reconnect_attempts, options.max_backoff);
        reconnect_attempts += 1;
        tracing::info!("Reconnecting push channel for {} in {:?}", options.app_id, backoff);

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    on_event(TransportEvent::Status(ConnectionStatus::Closed));
    tracing::info!("Push channel stopped for {}", options.app_id);
}

async fn run_session<F>(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    options: &TransportOptions,
    shutdown: &mut ShutdownSignal,
    on_event: &F,
) -> Result<SessionEnd, ChannelError>
where
    F: Fn(TransportEvent),
{
    let (mut write, mut read) = ws_stream.split();

    let subscribe = serde_json::to_string(&ControlMessage::subscribe(&options.app_id))?;
    write.send(WsMessage::Text(subscribe)).await.map_err(ChannelError::Transport)?;

    tracing::info!("Push channel connected for {}", options.app_id);
    on_event(TransportEvent::Status(ConnectionStatus::Live));

    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let unsubscribe = serde_json::to_string(&ControlMessage::unsubscribe(&options.app_id))?;
                if let Err(e) = write.send(WsMessage::Text(unsubscribe)).await {
                    tracing::debug!("Could not send unsubscribe for {}: {}", options.app_id, e);
                }
                let _ = write.send(WsMessage::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            },
            msg = read.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => on_event(TransportEvent::Text(text)),
                Some(Ok(WsMessage::Close(_))) | None => return Ok(SessionEnd::Dropped),
                Some(Ok(_)) => {
                    // Binary, ping/pong and raw frames carry no traffic
                },
                Some(Err(e)) => return Err(ChannelError::Transport(e)),
            }
        }
    }
}
