//! Plugin registry and dispatch behaviour across map instances

mod common;

use cartobridge_core::{MapId, Response};
use cartobridge_plugin_api::{PluginContext, PluginRegistry};
use common::*;
use serde_json::{json, Value};

fn style_loaded(registry: &PluginRegistry, map: MapId, view: &mut cartobridge_map::HeadlessMap) {
    let config = cartobridge_core::AppConfig::default();
    let mut ctx = PluginContext::new(map, view, &config);
    registry.dispatch_style_loaded(map, &mut ctx);
}

#[test]
fn test_dispatch_before_build_is_unclaimed() {
    let registry = PluginRegistry::new();
    let map = MapId::new(1);
    let mut view = loaded_view();
    registry.register_builder(map, EchoBuilder::boxed("echo", "echo#ping", "pong"));

    assert!(offer(&registry, map, &mut view, "echo#ping").is_none());

    // Built but no style load seen yet.
    assert_eq!(registry.build_plugins(map), 1);
    assert!(offer(&registry, map, &mut view, "echo#ping").is_none());

    style_loaded(&registry, map, &mut view);
    let response = offer(&registry, map, &mut view, "echo#ping").unwrap();
    assert_eq!(response.result(), Some(&json!("pong")));
}

#[test]
fn test_last_registration_wins() {
    let registry = PluginRegistry::new();
    let map = MapId::new(1);
    let mut view = loaded_view();
    registry.register_builder(map, EchoBuilder::boxed("echo", "echo#ping", "first"));
    registry.register_builder(map, EchoBuilder::boxed("echo", "echo#ping", "second"));
    assert_eq!(registry.plugin_names(map), vec!["echo"]);

    registry.build_plugins(map);
    style_loaded(&registry, map, &mut view);
    let response = offer(&registry, map, &mut view, "echo#ping").unwrap();
    assert_eq!(response.result(), Some(&json!("second")));
}

#[test]
fn test_first_registered_claimer_answers() {
    let registry = PluginRegistry::new();
    let map = MapId::new(1);
    let mut view = loaded_view();
    registry.register_builder(map, EchoBuilder::boxed("a", "shared#who", "a"));
    registry.register_builder(map, EchoBuilder::boxed("b", "shared#who", "b"));
    registry.build_plugins(map);
    style_loaded(&registry, map, &mut view);

    let response = offer(&registry, map, &mut view, "shared#who").unwrap();
    assert_eq!(response.result(), Some(&json!("a")));
}

#[test]
fn test_dispose_then_dispatch_is_unclaimed() {
    let registry = PluginRegistry::new();
    let map = MapId::new(1);
    let mut view = loaded_view();
    registry.register_builder(map, EchoBuilder::boxed("echo", "echo#ping", "pong"));
    registry.build_plugins(map);
    style_loaded(&registry, map, &mut view);
    assert!(offer(&registry, map, &mut view, "echo#ping").is_some());

    assert!(registry.dispose(map));
    assert!(!registry.dispose(map));
    assert!(offer(&registry, map, &mut view, "echo#ping").is_none());
}

#[test]
fn test_instances_are_isolated() {
    let registry = PluginRegistry::new();
    let (one, two) = (MapId::new(1), MapId::new(2));
    let mut view = loaded_view();
    registry.register_builder(one, EchoBuilder::boxed("echo", "echo#ping", "one"));
    registry.register_builder(two, EchoBuilder::boxed("echo", "echo#ping", "two"));
    for map in [one, two] {
        registry.build_plugins(map);
        style_loaded(&registry, map, &mut view);
    }

    registry.dispose(one);
    assert!(offer(&registry, one, &mut view, "echo#ping").is_none());
    let response = offer(&registry, two, &mut view, "echo#ping").unwrap();
    assert_eq!(response.result(), Some(&json!("two")));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_host_routes_to_extra_plugins_in_order() {
    let (host, mut events) = headless_host();
    let extra = vec![
        EchoBuilder::boxed("a", "shared#who", "a"),
        EchoBuilder::boxed("b", "shared#who", "b"),
    ];
    assert!(host.create_map_with_plugins(MapId::new(3), &json!({}), extra).unwrap());
    drain(&mut events);

    assert_eq!(
        host.registry().plugin_names(MapId::new(3)),
        vec!["heaven_map", "map_route", "a", "b"]
    );
    let response = request(&host, 3, "shared#who", Value::Null);
    assert_eq!(response.result(), Some(&json!("a")));

    // Nobody claims it and the map has no builtin handler either.
    assert_eq!(request(&host, 3, "shared#nobody", Value::Null), Response::NotImplemented);
}

#[test]
fn test_heaven_overlay_is_idempotent() {
    let (host, mut events) = headless_host();
    create_map(&host, 1, json!({}), &mut events);

    let heaven_layers = |host: &cartobridge_controller::MapHost| -> Vec<String> {
        let controller = host.controller(MapId::new(1)).unwrap();
        let controller = controller.lock();
        let style = controller.view().style().unwrap();
        style.layer_ids().into_iter().filter(|id| id.contains("heaven")).collect()
    };

    let args = json!({"model": heaven_model("crime", "heaven")});
    let response = request(&host, 1, "heaven_map#addData", args.clone());
    assert_eq!(response.result(), Some(&json!("heaven_map#addData")));
    let once = heaven_layers(&host);
    assert!(!once.is_empty());

    request(&host, 1, "heaven_map#addData", args);
    assert_eq!(heaven_layers(&host), once);

    let response = request(&host, 1, "heaven_map#removeData", json!({"id": "crime"}));
    assert_eq!(response.result(), Some(&json!("heaven_map#removeData")));
    assert!(heaven_layers(&host).is_empty());

    let response = request(&host, 1, "heaven_map#removeData", json!({"id": "crime"}));
    assert!(response.is_success());
}

#[test]
fn test_plugin_models_survive_style_change() {
    let (host, mut events) = headless_host();
    let params = json!({
        "plugins-options": {"heaven_map": {"models": [heaven_model("crime", "heaven")]}}
    });
    create_map(&host, 1, params, &mut events);

    let has_heaven = |host: &cartobridge_controller::MapHost| {
        let controller = host.controller(MapId::new(1)).unwrap();
        let controller = controller.lock();
        let style = controller.view().style().unwrap();
        style.layer_ids().iter().any(|id| id.contains("heaven"))
    };
    assert!(has_heaven(&host));

    request(&host, 1, "map#setStyleString", json!({"styleString": "mapbox://styles/mapbox/dark-v10"}));
    assert!(has_heaven(&host));
}
