//! Common helpers for the integration tests

#![allow(dead_code)]

use cartobridge_controller::{event_channel, EventReceiver, MapEvent, MapHost, RequestEnvelope, HOST_CREATE_MAP};
use cartobridge_core::types::ViewportSize;
use cartobridge_core::{AppConfig, MapId, MethodCall, MethodResult, Response};
use cartobridge_map::{HeadlessMap, MapView};
use cartobridge_plugin_api::{Dispatch, MapPlugin, PluginBuilder, PluginContext, PluginResult};
use serde_json::{json, Value};

/// A host on the in-memory backend with the default configuration.
pub fn headless_host() -> (MapHost, EventReceiver) {
    headless_host_with(AppConfig::default())
}

pub fn headless_host_with(config: AppConfig) -> (MapHost, EventReceiver) {
    let (tx, rx) = event_channel();
    (MapHost::headless(config, tx), rx)
}

/// Sends one command and returns its answer, which must already be there.
pub fn request(host: &MapHost, map: i64, method: &str, arguments: Value) -> Response {
    let mut rx = host.dispatch(&RequestEnvelope::new(map, 0, method, arguments));
    rx.try_recv().unwrap_or_else(|_| panic!("{} was not answered synchronously", method))
}

/// Creates `map` and drops the events emitted while it loads.
pub fn create_map(host: &MapHost, map: i64, params: Value, events: &mut EventReceiver) {
    assert!(request(host, map, HOST_CREATE_MAP, params).is_success());
    drain(events);
}

/// Every event queued so far.
pub fn drain(events: &mut EventReceiver) -> Vec<MapEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn methods(events: &[MapEvent]) -> Vec<&str> {
    events.iter().map(|e| e.method.as_str()).collect()
}

/// A headless view with a style already loaded.
pub fn loaded_view() -> HeadlessMap {
    let mut view = HeadlessMap::new(ViewportSize::new(1080.0, 1920.0));
    view.load_style("test://style").expect("style loads");
    view.poll_events();
    view
}

pub fn heaven_model(id: &str, source_layer: &str) -> Value {
    json!({
        "id": id,
        "sourceUrl": format!("https://tiles.example.org/{}/{{z}}/{{x}}/{{y}}.pbf", id),
        "sourceLayer": source_layer,
        "color": 0xFF4CAF50u32
    })
}

pub fn route_model() -> Value {
    let directions = json!({
        "routes": [{"geometry": {"type": "LineString", "coordinates": [[113.30, 23.10], [113.32, 23.12], [113.35, 23.15]]}}],
        "waypoints": [{"location": [113.30, 23.10]}, {"location": [113.35, 23.15]}]
    });
    json!({
        "startLatLng": [23.099, 113.299],
        "endLatLng": [23.151, 113.351],
        "directionsResponse": directions.to_string()
    })
}

/// Builds an [`EchoPlugin`].
pub struct EchoBuilder {
    name: String,
    method: String,
    answer: String,
}

impl EchoBuilder {
    pub fn boxed(name: &str, method: &str, answer: &str) -> Box<dyn PluginBuilder> {
        Box::new(Self {
            name: name.to_string(),
            method: method.to_string(),
            answer: answer.to_string(),
        })
    }
}

impl PluginBuilder for EchoBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&mut self) -> PluginResult<Box<dyn MapPlugin>> {
        Ok(Box::new(EchoPlugin {
            name: self.name.clone(),
            method: self.method.clone(),
            answer: self.answer.clone(),
        }))
    }
}

/// Claims exactly one method and answers it with a fixed string.
pub struct EchoPlugin {
    name: String,
    method: String,
    answer: String,
}

impl MapPlugin for EchoPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_style_loaded(&mut self, _ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        Ok(())
    }

    fn on_method_call(&mut self, _ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) -> Dispatch {
        if call.method != self.method {
            return Dispatch::Unclaimed(reply);
        }
        reply.success(json!(self.answer));
        Dispatch::Claimed
    }
}

/// Offers `method` to the plugins of `map` and returns the answer if claimed.
pub fn offer(
    registry: &cartobridge_plugin_api::PluginRegistry,
    map: MapId,
    view: &mut HeadlessMap,
    method: &str,
) -> Option<Response> {
    let config = AppConfig::default();
    let (reply, mut rx) = MethodResult::channel(method);
    let mut ctx = PluginContext::new(map, view, &config);
    match registry.dispatch_command(map, &mut ctx, &MethodCall::new(method, Value::Null), reply) {
        Dispatch::Claimed => Some(rx.try_recv().expect("claimed command answered")),
        Dispatch::Unclaimed(_) => None,
    }
}
