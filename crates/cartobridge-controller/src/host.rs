//! Multi-map host.
//!
//! `MapHost` owns every live [`MapController`], the shared
//! [`PluginRegistry`] and the event channel. Controllers sit behind their own
//! mutex inside a concurrent map, so commands for different maps can be
//! served from different threads while commands for one map run one at a
//! time in arrival order.

use crate::controller::MapController;
use crate::envelope::{ReplyEnvelope, RequestEnvelope, HOST_CREATE_MAP, HOST_DISPOSE_MAP};
use crate::event::{EventSender, EventSink};
use cartobridge_core::error::{ArgumentError, BridgeError, CODE_BAD_REQUEST};
use cartobridge_core::types::ViewportSize;
use cartobridge_core::{AppConfig, MapId, MethodCall, MethodResult, Response};
use cartobridge_map::{HeadlessMap, MapView};
use cartobridge_plugin_api::{PluginBuilder, PluginRegistry};
use cartobridge_plugins::builtin_builder;
use dashmap::{DashMap, DashSet};
use metrics::{counter, describe_counter};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Creates the backend view for a new map.
pub type ViewFactory = Box<dyn Fn(MapId, &AppConfig) -> Box<dyn MapView> + Send + Sync>;

/// Registry of live map instances.
pub struct MapHost {
    maps: DashMap<MapId, Arc<Mutex<MapController>>>,
    creating: DashSet<MapId>,
    registry: Arc<PluginRegistry>,
    config: Arc<AppConfig>,
    factory: ViewFactory,
    events: EventSender,
}

impl MapHost {
    pub fn new(config: AppConfig, factory: ViewFactory, events: EventSender) -> Self {
        describe_counter!(
            "cartobridge_commands_total",
            "Commands answered, labelled by the handler that answered"
        );
        describe_counter!("cartobridge_maps_created_total", "Map instances created");
        describe_counter!("cartobridge_maps_disposed_total", "Map instances disposed");

        Self {
            maps: DashMap::new(),
            creating: DashSet::new(),
            registry: Arc::new(PluginRegistry::new()),
            config: Arc::new(config),
            factory,
            events,
        }
    }

    /// A host whose maps run on the in-memory backend, sized from `map.viewport_*`.
    pub fn headless(config: AppConfig, events: EventSender) -> Self {
        Self::new(config, Box::new(headless_view), events)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn contains(&self, map: MapId) -> bool {
        self.maps.contains_key(&map)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Shared handle to one controller.
    pub fn controller(&self, map: MapId) -> Option<Arc<Mutex<MapController>>> {
        self.maps.get(&map).map(|entry| entry.value().clone())
    }

    /// Creates a map with the configured builtin plugins.
    ///
    /// Returns `Ok(false)` when the map already exists.
    pub fn create_map(&self, map: MapId, params: &Value) -> Result<bool, BridgeError> {
        self.create_map_with_plugins(map, params, Vec::new())
    }

    /// Creates a map, registering `extra` builders after the builtin ones.
    ///
    /// Builders are registered and configured from `plugins-options` before
    /// the first style loads, so every plugin is built on that load. The
    /// controller is initialized outside the map table's locks; a reservation
    /// keeps concurrent creates of the same id out.
    pub fn create_map_with_plugins(
        &self,
        map: MapId,
        params: &Value,
        extra: Vec<Box<dyn PluginBuilder>>,
    ) -> Result<bool, BridgeError> {
        if self.maps.contains_key(&map) || !self.creating.insert(map) {
            debug!(map = %map, "Map already exists, create ignored");
            return Ok(false);
        }
        // A create that finished between the check and the reservation.
        if self.maps.contains_key(&map) {
            self.creating.remove(&map);
            debug!(map = %map, "Map already exists, create ignored");
            return Ok(false);
        }

        let created = self
            .build_controller(map, params, extra)
            .map(|controller| self.maps.insert(map, Arc::new(Mutex::new(controller))));
        self.creating.remove(&map);
        created?;

        counter!("cartobridge_maps_created_total").increment(1);
        info!(map = %map, "Map created");
        Ok(true)
    }

    fn build_controller(
        &self,
        map: MapId,
        params: &Value,
        extra: Vec<Box<dyn PluginBuilder>>,
    ) -> Result<MapController, BridgeError> {
        for name in &self.config.plugins.enabled {
            match builtin_builder(name) {
                Some(builder) => {
                    self.registry.register_builder(map, builder);
                }
                None => warn!(map = %map, plugin = %name, "No builder for enabled plugin"),
            }
        }
        for builder in extra {
            self.registry.register_builder(map, builder);
        }
        if let Some(options) = params.get("plugins-options") {
            if let Err(e) = self.registry.configure_builders(map, options) {
                self.registry.dispose(map);
                return Err(ArgumentError::invalid("plugins-options", e.to_string()).into());
            }
        }

        let view = (self.factory)(map, &self.config);
        let mut controller = MapController::new(
            map,
            view,
            self.config.clone(),
            self.registry.clone(),
            EventSink::new(map, self.events.clone()),
        );
        controller.initialize(params);
        Ok(controller)
    }

    /// Disposes a map and its plugins. Unknown maps are a no-op.
    pub fn dispose_map(&self, map: MapId) -> bool {
        let Some((_, controller)) = self.maps.remove(&map) else {
            debug!(map = %map, "Dispose of unknown map ignored");
            return false;
        };
        controller.lock().dispose();
        counter!("cartobridge_maps_disposed_total").increment(1);
        true
    }

    /// Disposes every live map. Returns how many there were.
    pub fn dispose_all(&self) -> usize {
        let ids: Vec<MapId> = self.maps.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter(|id| self.dispose_map(*id)).count()
    }

    /// Routes `call` to the controller of `map`.
    pub fn handle(&self, map: MapId, call: &MethodCall, reply: MethodResult) {
        match self.controller(map) {
            Some(controller) => controller.lock().handle(call, reply),
            None => {
                debug!(map = %map, method = %call.method, "Command for unknown map");
                reply.error(CODE_BAD_REQUEST, BridgeError::UnknownMap(map.raw()).to_string());
            }
        }
    }

    /// Serves one request envelope, including the host-level methods.
    ///
    /// The receiver resolves when the command is answered, which may be
    /// after this call returns.
    pub fn dispatch(&self, request: &RequestEnvelope) -> oneshot::Receiver<Response> {
        let map = MapId::new(request.map);
        let (reply, rx) = MethodResult::channel(request.method.clone());
        match request.method.as_str() {
            HOST_CREATE_MAP => match self.create_map(map, &request.arguments) {
                Ok(_) => reply.success_null(),
                Err(e) => reply.error(e.code(), e.to_string()),
            },
            HOST_DISPOSE_MAP => {
                self.dispose_map(map);
                reply.success_null();
            }
            _ => {
                let call = MethodCall::new(request.method.clone(), request.arguments.clone());
                self.handle(map, &call, reply);
            }
        }
        rx
    }

    /// Parses and serves one JSON line.
    ///
    /// Returns the request id with the pending answer, or an immediate error
    /// reply when the line is not a request.
    pub fn dispatch_line(&self, line: &str) -> Result<(Value, oneshot::Receiver<Response>), Box<ReplyEnvelope>> {
        let request = RequestEnvelope::parse(line)?;
        Ok((request.id.clone(), self.dispatch(&request)))
    }
}

fn headless_view(_map: MapId, config: &AppConfig) -> Box<dyn MapView> {
    let ratio = config.map.pixel_ratio;
    let viewport = ViewportSize::new(config.map.viewport_width * ratio, config.map.viewport_height * ratio);
    Box::new(HeadlessMap::new(viewport))
}
