//! Outbound notifications.
//!
//! Events carry no reply. Every controller owns an [`EventSink`] bound to its
//! map id; the host drains the shared receiver and forwards each
//! [`MapEvent`] as `{"map": id, "method": ..., "arguments": {...}}`.

use cartobridge_core::MapId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

pub const MAP_CLICK: &str = "map#onMapClick";
pub const MAP_LONG_PRESS: &str = "map#onMapLongPress";
pub const STYLE_LOADED: &str = "map#onStyleLoaded";
pub const MAP_IDLE: &str = "map#onIdle";
pub const CAMERA_MOVE_STARTED: &str = "camera#onMoveStarted";
pub const CAMERA_MOVE: &str = "camera#onMove";
pub const CAMERA_IDLE: &str = "camera#onIdle";
pub const TRACKING_CHANGED: &str = "map#onCameraTrackingChanged";
pub const TRACKING_DISMISSED: &str = "map#onCameraTrackingDismissed";

/// One notification for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEvent {
    pub map: MapId,
    pub method: String,
    pub arguments: Value,
}

impl MapEvent {
    pub fn new(map: MapId, method: impl Into<String>, arguments: Value) -> Self {
        Self {
            map,
            method: method.into(),
            arguments,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<MapEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<MapEvent>;

/// Creates the host-wide event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Sender bound to one map instance.
#[derive(Debug, Clone)]
pub struct EventSink {
    map: MapId,
    tx: EventSender,
}

impl EventSink {
    pub fn new(map: MapId, tx: EventSender) -> Self {
        Self { map, tx }
    }

    pub fn emit(&self, method: &str, arguments: Value) {
        trace!(map = %self.map, method, "Emitting event");
        if self.tx.send(MapEvent::new(self.map, method, arguments)).is_err() {
            trace!(map = %self.map, method, "Event receiver closed, event dropped");
        }
    }
}
