//! Per-map command dispatch and the multi-map host.
//!
//! - [`controller`]: one [`MapController`] per map view; plugins first, then
//!   the built-in `map#`, `camera#`, annotation and `location#` handlers
//! - [`annotations`]: symbol, circle and line annotation sets
//! - [`event`]: outbound notifications (`map#onStyleLoaded`, taps, camera)
//! - [`envelope`]: JSON request and reply envelopes
//! - [`host`]: [`MapHost`], creation and disposal of map instances
//!
//! # Example
//!
//! ```
//! use cartobridge_controller::{event_channel, MapHost, RequestEnvelope};
//! use cartobridge_core::AppConfig;
//! use serde_json::json;
//!
//! let (events, _rx) = event_channel();
//! let host = MapHost::headless(AppConfig::default(), events);
//!
//! let mut created = host.dispatch(&RequestEnvelope::new(1, 1, "host#createMap", json!({})));
//! assert!(created.try_recv().unwrap().is_success());
//!
//! let mut added = host.dispatch(&RequestEnvelope::new(
//!     1,
//!     2,
//!     "symbol#add",
//!     json!({"options": {"geometry": [52.5, 13.4]}}),
//! ));
//! assert_eq!(added.try_recv().unwrap().result(), Some(&json!("symbol_1")));
//! ```

pub mod annotations;
pub mod controller;
pub mod envelope;
pub mod event;
pub mod host;

pub use annotations::{AnnotationKind, AnnotationManager, AnnotationSet};
pub use controller::MapController;
pub use envelope::{ReplyEnvelope, ReplyError, RequestEnvelope, HOST_CREATE_MAP, HOST_DISPOSE_MAP};
pub use event::{event_channel, EventReceiver, EventSender, EventSink, MapEvent};
pub use host::{MapHost, ViewFactory};
