//! End-to-end behaviour of the headless bridge host

mod common;

use anyhow::Result;
use cartobridge_controller::event::{MAP_IDLE, STYLE_LOADED};
use cartobridge_controller::{ReplyEnvelope, HOST_DISPOSE_MAP};
use cartobridge_core::error::CODE_BAD_REQUEST;
use cartobridge_core::{AppConfig, LatLng, MapId, Response};
use cartobridge_plugins::route::ROUTE_LINE_LAYER;
use common::*;
use serde_json::{json, Value};
use std::io::Write;
use std::str::FromStr;

fn initial_camera() -> Value {
    json!({"bearing": 0.0, "target": [0.0, 0.0], "tilt": 0.0, "zoom": 10.0})
}

#[test]
fn test_create_emits_lifecycle_events() {
    let (host, mut events) = headless_host();
    assert!(request(&host, 1, "host#createMap", json!({})).is_success());

    let emitted = drain(&mut events);
    assert!(emitted.iter().all(|e| e.map == MapId::new(1)));
    let methods = methods(&emitted);
    assert!(methods.contains(&STYLE_LOADED));
    assert!(methods.contains(&MAP_IDLE));

    let response = request(&host, 1, "map#waitForMap", Value::Null);
    assert_eq!(response.result(), Some(&json!(true)));
}

#[test]
fn test_style_change_reports_new_style() {
    let (host, mut events) = headless_host();
    create_map(&host, 1, json!({}), &mut events);

    request(&host, 1, "map#setStyleString", json!({"styleString": "mapbox://styles/mapbox/dark-v10"}));
    let emitted = drain(&mut events);
    assert_eq!(methods(&emitted).iter().filter(|m| **m == STYLE_LOADED).count(), 1);

    let controller = host.controller(MapId::new(1)).unwrap();
    assert_eq!(controller.lock().current_style(), Some("mapbox://styles/mapbox/dark-v10"));
}

#[test]
fn test_style_change_leaves_camera_alone() {
    let (host, mut events) = headless_host();
    create_map(&host, 1, json!({}), &mut events);
    let camera = |host: &cartobridge_controller::MapHost| {
        let controller = host.controller(MapId::new(1)).unwrap();
        let camera = controller.lock().view().camera();
        camera
    };

    let response = request(&host, 1, "map_route#addRouteOverlay", json!({"model": route_model()}));
    assert!(response.is_success());
    assert!((camera(&host).target.latitude - 23.125).abs() < 0.05);

    let paris = json!({"bearing": 0.0, "target": [48.85, 2.35], "tilt": 0.0, "zoom": 5.0});
    request(&host, 1, "camera#move", json!({"cameraUpdate": ["newCameraPosition", paris]}));
    let before = camera(&host);
    assert_eq!(before.target, LatLng::new(48.85, 2.35));

    request(&host, 1, "map#setStyleString", json!({"styleString": "mapbox://styles/mapbox/dark-v10"}));
    assert_eq!(camera(&host), before);

    let controller = host.controller(MapId::new(1)).unwrap();
    let controller = controller.lock();
    let style = controller.view().style().unwrap();
    assert!(style.has_layer(ROUTE_LINE_LAYER));
}

#[test]
fn test_symbol_round_trip_through_host() {
    let (host, mut events) = headless_host();
    create_map(&host, 1, json!({"initialCameraPosition": initial_camera()}), &mut events);
    let center = json!({"x": 540.0, "y": 960.0});

    let response = request(
        &host,
        1,
        "symbol#add",
        json!({"options": {"geometry": [0.0, 0.0], "textField": "home"}}),
    );
    assert_eq!(response.result(), Some(&json!("symbol_1")));

    let response = request(&host, 1, "map#queryRenderedFeatures", center.clone());
    let features = response.result().unwrap()["features"].as_array().unwrap().clone();
    assert_eq!(features.len(), 1);
    let feature = geojson::Feature::from_str(features[0].as_str().unwrap()).unwrap();
    assert_eq!(feature.property("id"), Some(&json!("symbol_1")));
    assert_eq!(feature.property("textField"), Some(&json!("home")));

    assert!(request(&host, 1, "symbol#remove", json!({"symbol": "symbol_1"})).is_success());
    let response = request(&host, 1, "map#queryRenderedFeatures", center);
    assert_eq!(response.result(), Some(&json!({"features": []})));

    let response = request(&host, 1, "symbol#add", json!({"options": {"geometry": [0.0, 0.0]}}));
    assert_eq!(response.result(), Some(&json!("symbol_2")));
}

#[test]
fn test_empty_query_region_returns_no_features() {
    let (host, mut events) = headless_host();
    create_map(&host, 1, json!({"initialCameraPosition": initial_camera()}), &mut events);
    request(&host, 1, "circle#add", json!({"options": {"geometry": [0.0, 0.0]}}));

    let response = request(
        &host,
        1,
        "map#queryRenderedFeatures",
        json!({"left": 540.0, "top": 960.0, "right": 540.0, "bottom": 960.0}),
    );
    assert_eq!(response.result(), Some(&json!({"features": []})));

    let response = request(&host, 1, "map#queryRenderedFeatures", json!({}));
    assert_eq!(response.result(), Some(&json!({"features": []})));
}

#[test]
fn test_bounds_fit_contains_both_points_with_padding() {
    let (host, mut events) = headless_host();
    create_map(&host, 1, json!({}), &mut events);

    let south_west = LatLng::new(37.7749, -122.4194);
    let north_east = LatLng::new(37.8049, -122.3794);
    let distance = south_west.distance_to(&north_east);
    assert!((4_500.0..5_500.0).contains(&distance), "points are {} m apart", distance);

    let padding = 50.0;
    let update = json!([
        "newLatLngBounds",
        [south_west.to_value(), north_east.to_value()],
        padding
    ]);
    assert!(request(&host, 1, "camera#move", json!({"cameraUpdate": update})).is_success());

    let controller = host.controller(MapId::new(1)).unwrap();
    let controller = controller.lock();
    let view = controller.view();
    let viewport = view.viewport();
    for point in [&south_west, &north_east] {
        let screen = view.to_screen(point);
        assert!(screen.x >= padding - 1e-6 && screen.x <= viewport.width - padding + 1e-6, "{:?}", screen);
        assert!(screen.y >= padding - 1e-6 && screen.y <= viewport.height - padding + 1e-6, "{:?}", screen);
    }
}

#[test]
fn test_dispose_is_final_for_commands() {
    let (host, mut events) = headless_host();
    create_map(&host, 1, json!({}), &mut events);
    create_map(&host, 2, json!({}), &mut events);

    assert!(request(&host, 1, HOST_DISPOSE_MAP, Value::Null).is_success());
    assert!(request(&host, 1, HOST_DISPOSE_MAP, Value::Null).is_success());
    assert!(!host.registry().contains(MapId::new(1)));

    let response = request(&host, 1, "heaven_map#addData", json!({"model": heaven_model("x", "heaven")}));
    assert_eq!(response.error_code(), Some(CODE_BAD_REQUEST));

    let response = request(&host, 2, "heaven_map#addData", json!({"model": heaven_model("x", "heaven")}));
    assert!(response.is_success());
    assert_eq!(host.dispose_all(), 1);
    assert!(host.is_empty());
}

#[test]
fn test_reply_lines() -> Result<()> {
    let (host, _events) = headless_host();

    let (id, mut rx) = host
        .dispatch_line(r#"{"map": 9, "id": 1, "method": "host#createMap", "arguments": {}}"#)
        .map_err(|reply| anyhow::anyhow!("rejected: {:?}", reply))?;
    let reply = ReplyEnvelope::new(id, rx.try_recv()?);
    assert_eq!(serde_json::to_value(&reply)?, json!({"id": 1, "result": null}));

    let (id, mut rx) = host
        .dispatch_line(r#"{"map": 9, "id": 2, "method": "map#teleport"}"#)
        .map_err(|reply| anyhow::anyhow!("rejected: {:?}", reply))?;
    assert_eq!(rx.try_recv()?, Response::NotImplemented);
    let reply = ReplyEnvelope::new(id, Response::NotImplemented);
    assert_eq!(serde_json::to_value(&reply)?, json!({"id": 2, "notImplemented": true}));

    let rejected = host.dispatch_line(r#"{"id": 3}"#).unwrap_err();
    assert_eq!(rejected.id, json!(3));
    Ok(())
}

#[test]
fn test_host_from_config_file() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    writeln!(
        file,
        "map:\n  default_style: \"test://custom\"\nplugins:\n  enabled: [map_route]"
    )?;

    let config = AppConfig::from_config_builder(file.path())?;
    config.validate()?;
    let (host, mut events) = headless_host_with(config);
    create_map(&host, 1, json!({}), &mut events);

    assert_eq!(host.registry().plugin_names(MapId::new(1)), vec!["map_route"]);
    let controller = host.controller(MapId::new(1)).unwrap();
    assert_eq!(controller.lock().current_style(), Some("test://custom"));

    // heaven_map is not enabled, so nothing claims its commands.
    let response = request(&host, 1, "heaven_map#addData", json!({"model": heaven_model("x", "heaven")}));
    assert_eq!(response, Response::NotImplemented);
    Ok(())
}

#[test]
fn test_unknown_plugin_in_config_is_rejected() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    writeln!(file, "plugins:\n  enabled: [heaven_map, teleporter]")?;

    let config = AppConfig::from_config_builder(file.path())?;
    assert!(config.validate().is_err());
    Ok(())
}
