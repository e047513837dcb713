use serde::Serialize;

use crate::{
    dto::{game::GameFrame, monitor::MonitorFrame},
    state::{game::GameSession, hub::Versioned, monitor::Snapshot},
};

#[derive(Clone, Debug)]
/// Serialized frame ready to be written to a WebSocket or SSE stream.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// JSON text of the frame.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// State type that can be pushed to subscribers.
pub trait StreamPayload: Send + Sync + 'static {
    /// SSE event name of the stream.
    const EVENT: &'static str;

    /// Render a published frame.
    fn encode(frame: &Versioned<Self>) -> serde_json::Result<ServerEvent>
    where
        Self: Sized;

    /// Wire form of a published frame, rendered once per version.
    fn event(frame: &Versioned<Self>) -> serde_json::Result<ServerEvent>
    where
        Self: Sized,
    {
        frame.encoded_with(Self::encode)
    }
}

impl StreamPayload for Snapshot {
    const EVENT: &'static str = "snapshot";

    fn encode(frame: &Versioned<Self>) -> serde_json::Result<ServerEvent> {
        ServerEvent::json(Self::EVENT.to_string(), &MonitorFrame::from(frame))
    }
}

impl StreamPayload for GameSession {
    const EVENT: &'static str = "game";

    fn encode(frame: &Versioned<Self>) -> serde_json::Result<ServerEvent> {
        ServerEvent::json(Self::EVENT.to_string(), &GameFrame::from(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::monitor::Monitor;

    #[test]
    fn snapshot_event_carries_version() {
        let frame = Versioned::new(4, Monitor::new(80.0).snapshot());
        let event = Snapshot::event(&frame).unwrap();
        assert_eq!(event.event.as_deref(), Some("snapshot"));

        let json: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(json["version"], 4);
        assert_eq!(json["nodes"], serde_json::json!({}));
    }
}
