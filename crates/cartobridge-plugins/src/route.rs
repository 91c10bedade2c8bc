//! `map_route`: driving route overlays and navigation launch.
//!
//! The overlay is built from a directions response: the first route's
//! geometry becomes a line with direction arrows, dashed supplement lines join
//! the requested endpoints to the snapped waypoints, and start/end markers sit
//! on top. Every layer goes below the user-location shadow layer.

use cartobridge_core::error::{ArgumentError, MapError, CODE_MAP_ERROR};
use cartobridge_core::types::{EdgePadding, LatLng, LatLngBounds};
use cartobridge_core::{Args, MethodCall, MethodResult};
use cartobridge_map::expr::{get, interpolate_exponential, zoom};
use cartobridge_map::navigation::{NavigationRequest, DEFAULT_LANGUAGE, DEFAULT_PROFILE};
use cartobridge_map::overlay::{add_layer_if_absent, add_source_id_if_absent, remove_overlay};
use cartobridge_map::style::{LayerPosition, LayerSpec, SourceSpec, Style, StyleImage, LOCATION_SHADOW_LAYER};
use cartobridge_map::MapView;
use cartobridge_plugin_api::{Dispatch, MapPlugin, PluginBuilder, PluginContext, PluginError, PluginResult};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeoValue};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const PLUGIN_NAME: &str = "map_route";

pub const ROUTE_LINE_SOURCE: &str = "hyn-route-line-source";
pub const ROUTE_LINE_LAYER: &str = "hyn-route-line-layer";
pub const ROUTE_ARROW_LAYER: &str = "hyn-route-line-arrow-layer";
pub const ROUTE_ARROW_ICON: &str = "hyn-route-line-arrow-icon";
pub const ROUTE_SUPPLEMENT_SOURCE: &str = "hyn-route-supplement-line-source";
pub const ROUTE_SUPPLEMENT_LAYER: &str = "hyn-route-supplement-line-layer";
pub const ROUTE_START_END_SOURCE: &str = "hyn-route-start-end-source";
pub const ROUTE_START_END_LAYER: &str = "hyn-route-start-end-layer";
pub const ROUTE_START_ICON: &str = "hyn-route-line-start-icon";
pub const ROUTE_END_ICON: &str = "hyn-route-line-end-icon";
pub const ROUTE_ICON_PROPERTY: &str = "hyn-route-line-icon-property";
pub const ROUTE_ICON_ANCHOR_PROPERTY: &str = "hyn-route-line-icon-anchor-property";

/// Route layers, in the order they are drawn bottom to top.
pub const ROUTE_LAYERS: [&str; 4] = [
    ROUTE_SUPPLEMENT_LAYER,
    ROUTE_LINE_LAYER,
    ROUTE_ARROW_LAYER,
    ROUTE_START_END_LAYER,
];

pub const ROUTE_SOURCES: [&str; 3] = [ROUTE_LINE_SOURCE, ROUTE_START_END_SOURCE, ROUTE_SUPPLEMENT_SOURCE];

const DEFAULT_PADDING: f64 = 200.0;
const POLYLINE6_PRECISION: u32 = 6;

/// A route overlay request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteModel {
    pub start: LatLng,
    pub end: LatLng,
    pub directions_response: Value,
    pub padding: EdgePadding,
}

impl RouteModel {
    /// Parses `{startLatLng, endLatLng, directionsResponse, padding*}`.
    ///
    /// The directions response may be a JSON document or a string holding one.
    pub fn from_value(value: &Value) -> Result<Self, ArgumentError> {
        let args = Args::new(value);
        let padding = |name: &str| args.opt_f64(name).unwrap_or(DEFAULT_PADDING);
        Ok(Self {
            start: args.latlng("startLatLng")?,
            end: args.latlng("endLatLng")?,
            directions_response: directions_response(&args)?,
            padding: EdgePadding::new(
                padding("paddingLeft"),
                padding("paddingTop"),
                padding("paddingRight"),
                padding("paddingBottom"),
            ),
        })
    }

    /// Camera padding for the route fit: the side paddings are quartered.
    pub fn fit_padding(&self, pixel_ratio: f64) -> EdgePadding {
        EdgePadding::new(
            self.padding.left / 4.0 * pixel_ratio,
            self.padding.top * pixel_ratio,
            self.padding.right / 4.0 * pixel_ratio,
            self.padding.bottom * pixel_ratio,
        )
    }

    /// Snapped waypoint locations from the directions response.
    pub fn waypoints(&self) -> Vec<LatLng> {
        self.directions_response
            .get("waypoints")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|w| w.get("location").and_then(LatLng::from_lng_lat))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Coordinates of the first route.
    ///
    /// GeoJSON geometries are used as is, encoded polylines go through the
    /// backend decoder. When neither yields two points the waypoints, or
    /// failing that the endpoints, are chained instead.
    pub fn route_coordinates(&self, view: &dyn MapView) -> Vec<LatLng> {
        let geometry = self
            .directions_response
            .get("routes")
            .and_then(|routes| routes.get(0))
            .and_then(|route| route.get("geometry"));
        let decoded = match geometry {
            Some(Value::String(encoded)) => view.decode_route_geometry(encoded, POLYLINE6_PRECISION),
            Some(Value::Object(_)) => geometry
                .and_then(|g| g.get("coordinates"))
                .and_then(Value::as_array)
                .map(|coords| coords.iter().filter_map(LatLng::from_lng_lat).collect()),
            _ => None,
        };
        match decoded {
            Some(points) if points.len() >= 2 => points,
            _ => {
                debug!("Route geometry unavailable, chaining waypoints");
                let waypoints = self.waypoints();
                if waypoints.len() >= 2 {
                    waypoints
                } else {
                    vec![self.start, self.end]
                }
            }
        }
    }
}

fn directions_response(args: &Args<'_>) -> Result<Value, ArgumentError> {
    match args.value("directionsResponse")? {
        Value::String(raw) => {
            serde_json::from_str(raw).map_err(|e| ArgumentError::invalid("directionsResponse", e.to_string()))
        }
        value @ Value::Object(_) => Ok(value.clone()),
        _ => Err(ArgumentError::wrong_type("directionsResponse", "map or JSON string")),
    }
}

/// A navigation launch request.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationModel {
    pub start: LatLng,
    pub end: LatLng,
    pub directions_response: Value,
    pub profile: String,
    pub language: String,
    pub start_tips: Option<String>,
}

impl NavigationModel {
    pub fn from_value(value: &Value) -> Result<Self, ArgumentError> {
        let args = Args::new(value);
        Ok(Self {
            start: args.latlng("startLatLng")?,
            end: args.latlng("endLatLng")?,
            directions_response: directions_response(&args)?,
            profile: args.opt_str("profile").unwrap_or(DEFAULT_PROFILE).to_string(),
            language: args.opt_str("language").unwrap_or(DEFAULT_LANGUAGE).to_string(),
            start_tips: args.opt_str("startNavigationTips").map(str::to_string),
        })
    }
}

fn line_feature(points: &[LatLng]) -> Feature {
    let coords = points.iter().map(LatLng::to_position).collect();
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::LineString(coords))),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

fn marker_feature(point: &LatLng, icon: &str) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert(ROUTE_ICON_PROPERTY.to_string(), json!(icon));
    properties.insert(ROUTE_ICON_ANCHOR_PROPERTY.to_string(), json!("bottom"));
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::Point(point.to_position()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn line_width() -> Value {
    interpolate_exponential(1.2, zoom(), [(5.0, 10.0), (22.0, 22.0)])
}

/// Removes every route layer, then the route sources.
pub fn remove_route(style: &mut dyn Style) -> Result<usize, MapError> {
    let mut removed = remove_overlay(style, &ROUTE_LAYERS, None)?;
    for source in ROUTE_SOURCES {
        if style.remove_source(source)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Replaces the route overlay with one drawn along `coordinates`.
pub fn add_route(style: &mut dyn Style, model: &RouteModel, coordinates: &[LatLng]) -> Result<(), MapError> {
    remove_route(style)?;

    let waypoints = model.waypoints();
    let start_marker = waypoints.first().copied().unwrap_or(model.start);
    let mut supplement = Vec::new();
    if let (Some(first), Some(last)) = (waypoints.first(), waypoints.last()) {
        supplement.push(line_feature(&[model.start, *first]));
        supplement.push(line_feature(&[*last, model.end]));
    }

    add_source_id_if_absent(
        style,
        ROUTE_LINE_SOURCE,
        SourceSpec::geojson(collection(vec![line_feature(coordinates)])),
    )?;
    add_source_id_if_absent(
        style,
        ROUTE_START_END_SOURCE,
        SourceSpec::geojson(collection(vec![
            marker_feature(&start_marker, ROUTE_START_ICON),
            marker_feature(&model.end, ROUTE_END_ICON),
        ])),
    )?;
    add_source_id_if_absent(style, ROUTE_SUPPLEMENT_SOURCE, SourceSpec::geojson(collection(supplement)))?;

    for (icon, rgba) in [
        (ROUTE_ARROW_ICON, [255, 255, 255, 255]),
        (ROUTE_START_ICON, [76, 175, 80, 255]),
        (ROUTE_END_ICON, [244, 67, 54, 255]),
    ] {
        if !style.has_image(icon) {
            style.add_image(icon, StyleImage::solid(24, rgba));
        }
    }

    let below = || LayerPosition::Below(LOCATION_SHADOW_LAYER.to_string());
    let layers = [
        LayerSpec::line(ROUTE_SUPPLEMENT_LAYER, ROUTE_SUPPLEMENT_SOURCE)
            .paint("line-dasharray", json!([1.0, 1.0]))
            .paint("line-width", line_width())
            .paint("line-color", "#969696"),
        LayerSpec::line(ROUTE_LINE_LAYER, ROUTE_LINE_SOURCE)
            .layout("line-join", "round")
            .layout("line-cap", "round")
            .paint("line-width", line_width())
            .paint("line-color", "#4596fe"),
        LayerSpec::symbol(ROUTE_ARROW_LAYER, ROUTE_LINE_SOURCE)
            .layout("symbol-placement", "line")
            .layout("icon-allow-overlap", true)
            .layout("symbol-spacing", interpolate_exponential(1.0, zoom(), [(5.0, 30.0), (22.0, 50.0)]))
            .layout("icon-image", ROUTE_ARROW_ICON)
            .layout("icon-size", interpolate_exponential(1.2, zoom(), [(7.0, 0.4), (22.0, 0.9)])),
        LayerSpec::symbol(ROUTE_START_END_LAYER, ROUTE_START_END_SOURCE)
            .layout("icon-image", get(ROUTE_ICON_PROPERTY))
            .layout("icon-allow-overlap", true)
            .layout("icon-anchor", get(ROUTE_ICON_ANCHOR_PROPERTY))
            .layout("icon-size", 1.0)
            .layout("symbol-spacing", 1.0),
    ];
    for layer in layers {
        add_layer_if_absent(style, layer, below())?;
    }
    Ok(())
}

/// Draws `model` on the current style and returns the route coordinates.
fn draw_route(ctx: &mut PluginContext<'_>, model: &RouteModel) -> Result<Vec<LatLng>, MapError> {
    let coordinates = model.route_coordinates(&*ctx.view);
    let style = ctx.view.style_mut().ok_or(MapError::StyleNotLoaded)?;
    add_route(style, model, &coordinates)?;
    info!(map = %ctx.map_id, points = coordinates.len(), "Route overlay drawn");
    Ok(coordinates)
}

/// Animates the camera onto the route.
fn fit_route(ctx: &mut PluginContext<'_>, model: &RouteModel, coordinates: &[LatLng]) {
    if coordinates.len() < 2 {
        return;
    }
    if let Some(bounds) = LatLngBounds::from_points(coordinates.iter()) {
        let padding = model.fit_padding(ctx.config.map.pixel_ratio);
        let camera = ctx.view.projection().camera_for_bounds(&bounds, &padding, ctx.view.camera().zoom);
        ctx.view
            .animate_camera(camera, ctx.config.map.animation_duration(), Box::new(|_| {}));
    }
}

/// Holds the overlay to draw once the plugin is built.
#[derive(Debug, Default)]
pub struct MapRouteBuilder {
    model: Option<RouteModel>,
}

impl MapRouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route_overlay(&mut self, model: RouteModel) {
        self.model = Some(model);
    }

    pub fn remove_route_overlay(&mut self) {
        self.model = None;
    }
}

impl PluginBuilder for MapRouteBuilder {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    /// Accepts `{"model": route model}`.
    fn interpret_options(&mut self, options: &Value) -> PluginResult<()> {
        if let Some(model) = options.get("model").filter(|v| !v.is_null()) {
            let model =
                RouteModel::from_value(model).map_err(|e| PluginError::invalid_options(PLUGIN_NAME, e.to_string()))?;
            self.add_route_overlay(model);
        }
        Ok(())
    }

    fn build(&mut self) -> PluginResult<Box<dyn MapPlugin>> {
        Ok(Box::new(MapRoutePlugin::new(self.model.clone())))
    }
}

/// Live `map_route` plugin. The current overlay is redrawn after every style
/// load; the camera only follows an explicit add and the first draw of a seed.
#[derive(Debug)]
pub struct MapRoutePlugin {
    current: Option<RouteModel>,
    fit_pending: bool,
}

impl MapRoutePlugin {
    pub fn new(current: Option<RouteModel>) -> Self {
        let fit_pending = current.is_some();
        Self { current, fit_pending }
    }

    pub fn current(&self) -> Option<&RouteModel> {
        self.current.as_ref()
    }

    fn handle_add(&mut self, ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) {
        let model = match call.args().value("model").and_then(RouteModel::from_value) {
            Ok(model) => model,
            Err(e) => {
                debug!(error = %e, "Ignoring map_route#addRouteOverlay");
                reply.success_null();
                return;
            }
        };
        match draw_route(ctx, &model) {
            Ok(coordinates) => {
                fit_route(ctx, &model, &coordinates);
                self.current = Some(model);
                self.fit_pending = false;
                reply.success_null();
            }
            Err(e) => {
                warn!(error = %e, "Failed to add route overlay");
                reply.error(CODE_MAP_ERROR, e.to_string());
            }
        }
    }

    fn handle_remove(&mut self, ctx: &mut PluginContext<'_>, reply: MethodResult) {
        self.current = None;
        self.fit_pending = false;
        if let Some(style) = ctx.view.style_mut() {
            if let Err(e) = remove_route(style) {
                warn!(error = %e, "Failed to remove route overlay");
                reply.error(CODE_MAP_ERROR, e.to_string());
                return;
            }
        }
        reply.success_null();
    }

    fn handle_navigation(&mut self, ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) {
        let model = match call.args().value("model").and_then(NavigationModel::from_value) {
            Ok(model) => model,
            Err(e) => {
                debug!(error = %e, "Ignoring map_route#startNavigation");
                reply.success_null();
                return;
            }
        };
        let request = NavigationRequest::new(
            &ctx.config.navigation,
            model.start,
            model.end,
            &model.profile,
            &model.language,
            model.directions_response,
            model.start_tips,
        );
        match ctx.view.launch_navigation(request) {
            Ok(()) => reply.success_null(),
            Err(MapError::Unsupported { .. }) => reply.not_implemented(),
            Err(e) => reply.error(CODE_MAP_ERROR, e.to_string()),
        }
    }
}

impl MapPlugin for MapRoutePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn on_style_loaded(&mut self, ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        let Some(model) = self.current.as_ref() else {
            return Ok(());
        };
        let coordinates = draw_route(ctx, model)?;
        if std::mem::take(&mut self.fit_pending) {
            fit_route(ctx, model, &coordinates);
        }
        Ok(())
    }

    fn on_method_call(&mut self, ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) -> Dispatch {
        match call.method.as_str() {
            "map_route#addRouteOverlay" => self.handle_add(ctx, call, reply),
            "map_route#removeRouteOverlay" => self.handle_remove(ctx, reply),
            "map_route#startNavigation" => self.handle_navigation(ctx, call, reply),
            _ => return Dispatch::Unclaimed(reply),
        }
        Dispatch::Claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartobridge_core::codec::Response;
    use cartobridge_core::types::ViewportSize;
    use cartobridge_core::{AppConfig, CameraPosition, MapId};
    use cartobridge_map::style::LOCATION_SHADOW_LAYER;
    use cartobridge_map::HeadlessMap;

    fn directions() -> Value {
        json!({
            "routes": [{"geometry": {"type": "LineString", "coordinates": [[113.30, 23.10], [113.32, 23.12], [113.35, 23.15]]}}],
            "waypoints": [{"location": [113.30, 23.10]}, {"location": [113.35, 23.15]}]
        })
    }

    fn model_value() -> Value {
        json!({
            "startLatLng": [23.099, 113.299],
            "endLatLng": [23.151, 113.351],
            "directionsResponse": directions().to_string(),
            "paddingTop": 100
        })
    }

    fn view() -> HeadlessMap {
        let mut view = HeadlessMap::new(ViewportSize::new(1080.0, 1920.0));
        view.set_location_enabled(true);
        view.load_style("test://style").unwrap();
        view
    }

    fn call(plugin: &mut MapRoutePlugin, view: &mut HeadlessMap, method: &str, args: Value) -> Response {
        let config = AppConfig::default();
        let (reply, mut rx) = MethodResult::channel(method);
        let mut ctx = PluginContext::new(MapId::new(1), view, &config);
        assert!(plugin.on_method_call(&mut ctx, &MethodCall::new(method, args), reply).is_claimed());
        rx.try_recv().unwrap()
    }

    #[test]
    fn test_model_parsing() {
        let model = RouteModel::from_value(&model_value()).unwrap();
        assert_eq!(model.padding, EdgePadding::new(200.0, 100.0, 200.0, 200.0));
        assert_eq!(model.fit_padding(1.0), EdgePadding::new(50.0, 100.0, 50.0, 200.0));
        assert_eq!(model.waypoints().len(), 2);
        assert!(RouteModel::from_value(&json!({"startLatLng": [0, 0]})).is_err());
    }

    #[test]
    fn test_overlay_goes_below_location_layers_and_fits_camera() {
        let mut view = view();
        let mut plugin = MapRoutePlugin::new(None);
        let response = call(&mut plugin, &mut view, "map_route#addRouteOverlay", json!({"model": model_value()}));
        assert!(response.is_success());

        let ids = view.style().unwrap().layer_ids();
        let shadow = ids.iter().position(|id| id == LOCATION_SHADOW_LAYER).unwrap();
        for layer in ROUTE_LAYERS {
            let index = ids.iter().position(|id| id == layer).unwrap();
            assert!(index < shadow, "{layer} must sit below the shadow layer");
        }
        let camera = view.camera();
        assert!((camera.target.latitude - 23.125).abs() < 0.05);
        assert!(camera.zoom > 10.0);

        // Re-adding replaces the overlay instead of duplicating it.
        call(&mut plugin, &mut view, "map_route#addRouteOverlay", json!({"model": model_value()}));
        assert_eq!(view.style().unwrap().layer_ids(), ids);

        let response = call(&mut plugin, &mut view, "map_route#removeRouteOverlay", Value::Null);
        assert!(response.is_success());
        let style = view.style().unwrap();
        assert!(ROUTE_LAYERS.iter().all(|id| !style.has_layer(id)));
        assert!(ROUTE_SOURCES.iter().all(|id| !style.has_source(id)));

        // Removing again is a no-op.
        assert!(call(&mut plugin, &mut view, "map_route#removeRouteOverlay", Value::Null).is_success());
    }

    #[test]
    fn test_encoded_geometry_falls_back_to_waypoints() {
        let mut model = RouteModel::from_value(&model_value()).unwrap();
        model.directions_response["routes"][0]["geometry"] = json!("_p~iF~ps|U_ulLnnqC");
        let view = view();
        let points = model.route_coordinates(&view);
        assert_eq!(points, vec![LatLng::new(23.10, 113.30), LatLng::new(23.15, 113.35)]);

        let view = view.with_polyline_decoder(|_, precision| {
            assert_eq!(precision, 6);
            Some(vec![LatLng::new(1.0, 1.0), LatLng::new(2.0, 2.0), LatLng::new(3.0, 3.0)])
        });
        assert_eq!(model.route_coordinates(&view).len(), 3);
    }

    #[test]
    fn test_navigation_without_backend_support() {
        let mut view = view();
        let mut plugin = MapRoutePlugin::new(None);
        let args = json!({"model": {
            "startLatLng": [23.1, 113.3],
            "endLatLng": [23.2, 113.4],
            "directionsResponse": directions()
        }});
        let response = call(&mut plugin, &mut view, "map_route#startNavigation", args.clone());
        assert_eq!(response, Response::NotImplemented);

        let mut view = view.with_navigation();
        let response = call(&mut plugin, &mut view, "map_route#startNavigation", args);
        assert!(response.is_success());
        let request = &view.navigation_requests()[0];
        assert_eq!(request.route_options.profile, "driving");
        assert_eq!(request.route_options.language, "zh-Hans");
        assert_eq!(request.initial_camera.zoom, 15.0);
    }

    #[test]
    fn test_builder_seed_is_drawn_on_style_load() {
        let mut builder = MapRouteBuilder::new();
        builder.interpret_options(&json!({"model": model_value()})).unwrap();
        let mut plugin = builder.build().unwrap();
        let mut view = view();
        let config = AppConfig::default();
        let mut ctx = PluginContext::new(MapId::new(1), &mut view, &config);
        plugin.on_style_loaded(&mut ctx).unwrap();
        assert!(view.style().unwrap().has_layer(ROUTE_LINE_LAYER));
    }

    #[test]
    fn test_style_reload_redraws_without_moving_camera() {
        let mut view = view();
        let mut plugin = MapRoutePlugin::new(None);
        call(&mut plugin, &mut view, "map_route#addRouteOverlay", json!({"model": model_value()}));

        let elsewhere = CameraPosition {
            bearing: 0.0,
            target: LatLng::new(48.85, 2.35),
            tilt: 0.0,
            zoom: 5.0,
        };
        view.move_camera(elsewhere);
        view.load_style("test://night").unwrap();

        let config = AppConfig::default();
        let mut ctx = PluginContext::new(MapId::new(1), &mut view, &config);
        plugin.on_style_loaded(&mut ctx).unwrap();

        assert!(view.style().unwrap().has_layer(ROUTE_LINE_LAYER));
        assert_eq!(view.camera(), elsewhere);
        assert!(plugin.current().is_some());
    }

    #[test]
    fn test_seed_fits_camera_on_first_draw_only() {
        let mut view = view();
        let config = AppConfig::default();
        let mut plugin = MapRoutePlugin::new(Some(RouteModel::from_value(&model_value()).unwrap()));
        plugin
            .on_style_loaded(&mut PluginContext::new(MapId::new(1), &mut view, &config))
            .unwrap();
        assert!((view.camera().target.latitude - 23.125).abs() < 0.05);

        let elsewhere = CameraPosition {
            zoom: 3.0,
            ..CameraPosition::default()
        };
        view.move_camera(elsewhere);
        view.load_style("test://night").unwrap();
        plugin
            .on_style_loaded(&mut PluginContext::new(MapId::new(1), &mut view, &config))
            .unwrap();
        assert_eq!(view.camera(), elsewhere);
    }

    #[test]
    fn test_failed_redraw_keeps_overlay() {
        let mut view = HeadlessMap::new(ViewportSize::new(1080.0, 1920.0));
        let config = AppConfig::default();
        let mut plugin = MapRoutePlugin::new(Some(RouteModel::from_value(&model_value()).unwrap()));
        let result = plugin.on_style_loaded(&mut PluginContext::new(MapId::new(1), &mut view, &config));
        assert!(result.is_err());
        assert!(plugin.current().is_some());

        view.load_style("test://style").unwrap();
        plugin
            .on_style_loaded(&mut PluginContext::new(MapId::new(1), &mut view, &config))
            .unwrap();
        assert!(view.style().unwrap().has_layer(ROUTE_LINE_LAYER));
    }

    #[test]
    fn test_unrelated_methods_are_declined() {
        let mut view = view();
        let config = AppConfig::default();
        let mut plugin = MapRoutePlugin::new(None);
        let (reply, _rx) = MethodResult::channel("heaven_map#addData");
        let mut ctx = PluginContext::new(MapId::new(1), &mut view, &config);
        let call = MethodCall::new("heaven_map#addData", Value::Null);
        assert!(!plugin.on_method_call(&mut ctx, &call, reply).is_claimed());
    }
}
