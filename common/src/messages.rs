// common/src/messages.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Control message sent by the client over the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ControlMessage {
    Subscribe {
        #[serde(rename = "appId")]
        app_id: String,
    },
    Unsubscribe {
        #[serde(rename = "appId")]
        app_id: String,
    },
}

impl ControlMessage {
    pub fn subscribe(app_id: &str) -> Self {
        Self::Subscribe { app_id: app_id.to_string() }
    }

    pub fn unsubscribe(app_id: &str) -> Self {
        Self::Unsubscribe { app_id: app_id.to_string() }
    }
}

/// Event envelope emitted by the server over the push channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Name of the event carrying traffic updates for one application
pub fn traffic_event_name(app_id: &str) -> String {
    format!("traffic-update-{}", app_id)
}
