// traffic-monitor/src/subscriber.rs
use common::{traffic_event_name, ChannelEnvelope, Config, RawLogEntry};
use std::time::Duration;
use uuid::Uuid;

use crate::registry::ChannelRegistry;
use crate::transport::{run_push_channel, ConnectionStatus, TransportEvent, TransportOptions};

/// What a subscription delivers to its owner
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Traffic(RawLogEntry),
    Status(ConnectionStatus),
}

/// Opens push channels through a shared [`ChannelRegistry`]
#[derive(Clone)]
pub struct FeedSubscriber {
    registry: ChannelRegistry,
    config: Config,
}

impl FeedSubscriber {
    pub fn new(registry: ChannelRegistry, config: Config) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Open the push channel for `app_id` and deliver its events to `sink`.
    ///
    /// Returns `None` when a channel for this id is already live or the push
    /// URL cannot be built.
    pub fn subscribe<F>(&self, app_id: &str, sink: F) -> Option<Subscription>
    where
        F: Fn(FeedEvent) + Send + Sync + 'static,
    {
        let url = match self.config.push_channel_url(app_id) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Cannot open push channel for {}: {}", app_id, e);
                return None;
            }
        };
        let options = TransportOptions {
            url: url.to_string(),
            app_id: app_id.to_string(),
            max_backoff: Duration::from_secs(self.config.reconnect_max_backoff_secs.max(1)),
        };
        let event_name = traffic_event_name(app_id);

        let id = self.registry.open_with(app_id, |channel_id, shutdown| {
            tracing::info!("Connecting push channel {} for {}", channel_id, app_id);
            let app = options.app_id.clone();
            tokio::spawn(run_push_channel(options, shutdown, move |event| match event {
                TransportEvent::Status(status) => sink(FeedEvent::Status(status)),
                TransportEvent::Text(text) => {
                    if let Some(raw) = decode_traffic(&app, &event_name, &text) {
                        sink(FeedEvent::Traffic(raw));
                    }
                }
            }));
        })?;

        Some(Subscription {
            app_id: app_id.to_string(),
            id,
            registry: self.registry.clone(),
            released: false,
        })
    }

    /// Release the channel for `app_id`; absent ids are a no-op
    pub fn unsubscribe(&self, app_id: &str) -> bool {
        self.registry.close(app_id)
    }
}

/// Decode one text frame into a traffic record, if it is one for this app
fn decode_traffic(app_id: &str, event_name: &str, text: &str) -> Option<RawLogEntry> {
    let envelope: ChannelEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Unreadable push frame for {}: {}", app_id, e);
            return None;
        }
    };

    if envelope.event != event_name {
        tracing::debug!("Ignoring push event {} for {}", envelope.event, app_id);
        return None;
    }

    if envelope.data.is_null() {
        tracing::warn!("Received empty traffic update for {}", app_id);
        return None;
    }

    match serde_json::from_value(envelope.data) {
        Ok(raw) => {
            tracing::debug!("Received traffic update for {}", app_id);
            Some(raw)
        },
        Err(e) => {
            tracing::warn!("Malformed traffic update for {}: {}", app_id, e);
            None
        }
    }
}

/// Handle to one open push channel.
///
/// Closing (or dropping) the handle releases the channel, unless the
/// registry already replaced it with a newer instance.
pub struct Subscription {
    app_id: String,
    id: Uuid,
    registry: ChannelRegistry,
    released: bool,
}

impl Subscription {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.close_instance(&self.app_id, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
