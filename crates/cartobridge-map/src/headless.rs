//! In-memory map backend.
//!
//! `HeadlessMap` keeps the full style (ordered layers, sources, images) and a
//! Web Mercator camera, and answers rendered-feature queries by hit testing
//! GeoJSON sources against the layers that draw them. It never renders. The
//! CLI host and the test suites run on it; the `simulate_*` methods stand in
//! for user gestures.

use crate::filter::FeatureFilter;
use crate::map_view::{Completion, MapView, QueryRegion, UiSetting, ViewEvent};
use crate::navigation::NavigationRequest;
use crate::projection::{Projection, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};
use crate::style::{
    LayerKind, LayerPosition, LayerSpec, SourceSpec, Style, StyleImage, LOCATION_FOREGROUND_LAYER,
    LOCATION_SHADOW_LAYER, LOCATION_SOURCE,
};
use cartobridge_core::error::MapError;
use cartobridge_core::types::{
    CameraPosition, EdgePadding, LatLng, ScreenPoint, ScreenRect, TrackingMode, ViewportSize,
};
use geojson::{Feature, FeatureCollection, Value as GeoValue};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Hit radius for symbol layers, in pixels.
const SYMBOL_HIT_RADIUS: f64 = 12.0;
/// Hit radius for circle layers without a constant radius.
const CIRCLE_HIT_RADIUS: f64 = 8.0;
/// Minimum hit distance for lines.
const LINE_HIT_TOLERANCE: f64 = 4.0;

type PolylineDecoder = Box<dyn Fn(&str, u32) -> Option<Vec<LatLng>> + Send>;

/// A style held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct HeadlessStyle {
    url: String,
    name: String,
    sources: BTreeMap<String, SourceSpec>,
    layers: Vec<LayerSpec>,
    images: HashMap<String, StyleImage>,
}

impl HeadlessStyle {
    /// An empty style; its name is the URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            name: url.to_string(),
            ..Default::default()
        }
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// Layers in draw order.
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn image_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.images.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Style for HeadlessStyle {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), MapError> {
        if self.sources.contains_key(id) {
            return Err(MapError::SourceExists { id: id.to_string() });
        }
        self.sources.insert(id.to_string(), source);
        Ok(())
    }

    fn set_geojson(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError> {
        match self.sources.get_mut(id) {
            Some(SourceSpec::GeoJson { data: current }) => {
                *current = data;
                Ok(())
            }
            Some(other) => Err(MapError::backend(
                "set_geojson",
                format!("source '{}' is a {} source", id, other.kind()),
            )),
            None => Err(MapError::backend("set_geojson", format!("no source '{}'", id))),
        }
    }

    fn remove_source(&mut self, id: &str) -> Result<bool, MapError> {
        if let Some(layer) = self.layers.iter().find(|l| l.source.as_deref() == Some(id)) {
            return Err(MapError::backend(
                "remove_source",
                format!("source '{}' is in use by layer '{}'", id, layer.id),
            ));
        }
        Ok(self.sources.remove(id).is_some())
    }

    fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.id.clone()).collect()
    }

    fn has_layer(&self, id: &str) -> bool {
        self.position_of(id).is_some()
    }

    fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn add_layer(&mut self, layer: LayerSpec, position: LayerPosition) -> Result<(), MapError> {
        if self.has_layer(&layer.id) {
            return Err(MapError::LayerExists { id: layer.id });
        }
        if let Some(source) = layer.source.as_deref() {
            if !self.sources.contains_key(source) {
                return Err(MapError::MissingSource {
                    layer: layer.id.clone(),
                    source_id: source.to_string(),
                });
            }
        }
        let index = match &position {
            LayerPosition::Top => self.layers.len(),
            LayerPosition::Below(anchor) => self
                .position_of(anchor)
                .ok_or_else(|| MapError::backend("add_layer", format!("no anchor layer '{}'", anchor)))?,
            LayerPosition::Above(anchor) => self
                .position_of(anchor)
                .map(|i| i + 1)
                .ok_or_else(|| MapError::backend("add_layer", format!("no anchor layer '{}'", anchor)))?,
        };
        self.layers.insert(index, layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.layers.remove(index);
                true
            }
            None => false,
        }
    }

    fn has_image(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    fn add_image(&mut self, name: &str, image: StyleImage) {
        self.images.insert(name.to_string(), image);
    }

    fn remove_image(&mut self, name: &str) -> bool {
        self.images.remove(name).is_some()
    }
}

/// Chrome state recorded by [`HeadlessMap::apply_ui_setting`].
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub compass: bool,
    pub compass_margins: EdgePadding,
    pub rotate_gestures: bool,
    pub scroll_gestures: bool,
    pub tilt_gestures: bool,
    pub zoom_gestures: bool,
    pub logo: bool,
    pub attribution: bool,
    pub language: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            compass: true,
            compass_margins: EdgePadding::default(),
            rotate_gestures: true,
            scroll_gestures: true,
            tilt_gestures: true,
            zoom_gestures: true,
            logo: true,
            attribution: true,
            language: None,
        }
    }
}

/// In-memory [`MapView`].
pub struct HeadlessMap {
    viewport: ViewportSize,
    camera: CameraPosition,
    min_zoom: f64,
    max_zoom: f64,
    style: Option<HeadlessStyle>,
    map_loaded: bool,
    ui: UiState,
    location_enabled: bool,
    tracking_mode: TrackingMode,
    user_location: Option<LatLng>,
    events: VecDeque<ViewEvent>,
    navigation_enabled: bool,
    navigation_requests: Vec<NavigationRequest>,
    polyline_decoder: Option<PolylineDecoder>,
    cache_invalidations: usize,
    cache_failure: Option<String>,
    styles_requested: Vec<String>,
}

impl std::fmt::Debug for HeadlessMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessMap")
            .field("viewport", &self.viewport)
            .field("camera", &self.camera)
            .field("style", &self.style.as_ref().map(|s| s.url.clone()))
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl HeadlessMap {
    pub fn new(viewport: ViewportSize) -> Self {
        Self {
            viewport,
            camera: CameraPosition::default(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            style: None,
            map_loaded: false,
            ui: UiState::default(),
            location_enabled: false,
            tracking_mode: TrackingMode::None,
            user_location: None,
            events: VecDeque::new(),
            navigation_enabled: false,
            navigation_requests: Vec::new(),
            polyline_decoder: None,
            cache_invalidations: 0,
            cache_failure: None,
            styles_requested: Vec::new(),
        }
    }

    /// Accepts navigation launches instead of answering "unsupported".
    pub fn with_navigation(mut self) -> Self {
        self.navigation_enabled = true;
        self
    }

    /// Installs a polyline decoder for route geometries.
    pub fn with_polyline_decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&str, u32) -> Option<Vec<LatLng>> + Send + 'static,
    {
        self.polyline_decoder = Some(Box::new(decoder));
        self
    }

    pub fn with_camera(mut self, camera: CameraPosition) -> Self {
        self.camera = camera;
        self
    }

    /// Makes the next cache invalidations fail with `reason`.
    pub fn set_cache_failure(&mut self, reason: Option<String>) {
        self.cache_failure = reason;
    }

    pub fn set_user_location(&mut self, location: Option<LatLng>) {
        self.user_location = location;
    }

    pub fn headless_style(&self) -> Option<&HeadlessStyle> {
        self.style.as_ref()
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn location_enabled(&self) -> bool {
        self.location_enabled
    }

    pub fn tracking_mode(&self) -> TrackingMode {
        self.tracking_mode
    }

    pub fn navigation_requests(&self) -> &[NavigationRequest] {
        &self.navigation_requests
    }

    pub fn cache_invalidations(&self) -> usize {
        self.cache_invalidations
    }

    /// Style URLs in the order they were requested.
    pub fn styles_requested(&self) -> &[String] {
        &self.styles_requested
    }

    /// Queues a tap at `point`.
    pub fn simulate_click(&mut self, point: ScreenPoint) {
        self.events.push_back(ViewEvent::Click(point));
    }

    /// Queues a long press at `point`.
    pub fn simulate_long_press(&mut self, point: ScreenPoint) {
        self.events.push_back(ViewEvent::LongPress(point));
    }

    /// Pans by a user gesture, breaking camera tracking.
    pub fn simulate_pan(&mut self, dx: f64, dy: f64) {
        self.events.push_back(ViewEvent::CameraMoveStarted { gesture: true });
        if self.tracking_mode != TrackingMode::None {
            self.tracking_mode = TrackingMode::None;
            self.events.push_back(ViewEvent::TrackingDismissed);
            self.events.push_back(ViewEvent::TrackingChanged(TrackingMode::None));
        }
        let center = self.viewport.center();
        let target = self.to_coordinate(&ScreenPoint::new(center.x + dx, center.y + dy));
        self.camera.target = target;
        self.events.push_back(ViewEvent::CameraMove(self.camera));
        self.events.push_back(ViewEvent::CameraIdle(self.camera));
        self.events.push_back(ViewEvent::MapIdle);
    }

    fn set_camera(&mut self, camera: CameraPosition) {
        let mut camera = camera;
        camera.zoom = camera.zoom.clamp(self.min_zoom, self.max_zoom);
        self.camera = camera;
        self.events.push_back(ViewEvent::CameraMoveStarted { gesture: false });
        self.events.push_back(ViewEvent::CameraMove(self.camera));
        self.events.push_back(ViewEvent::CameraIdle(self.camera));
    }

    fn add_location_layers(style: &mut HeadlessStyle) {
        if !style.has_source(LOCATION_SOURCE) {
            let _ = style.add_source(LOCATION_SOURCE, SourceSpec::empty_geojson());
        }
        for id in [LOCATION_SHADOW_LAYER, LOCATION_FOREGROUND_LAYER] {
            if !style.has_layer(id) {
                let _ = style.add_layer(LayerSpec::symbol(id, LOCATION_SOURCE), LayerPosition::Top);
            }
        }
    }

    fn remove_location_layers(style: &mut HeadlessStyle) {
        style.remove_layer(LOCATION_FOREGROUND_LAYER);
        style.remove_layer(LOCATION_SHADOW_LAYER);
        let _ = style.remove_source(LOCATION_SOURCE);
    }

    fn hit_radius(layer: &LayerSpec) -> f64 {
        let number = |name: &str| layer.paint.get(name).and_then(Value::as_f64);
        match layer.kind {
            LayerKind::Circle => {
                number("circle-radius").unwrap_or(CIRCLE_HIT_RADIUS) + number("circle-stroke-width").unwrap_or(0.0)
            }
            LayerKind::Line => (number("line-width").unwrap_or(1.0) / 2.0).max(LINE_HIT_TOLERANCE),
            _ => SYMBOL_HIT_RADIUS,
        }
    }

    fn feature_hit(&self, projection: &Projection, feature: &Feature, region: &QueryRegion, radius: f64) -> bool {
        let Some(geometry) = feature.geometry.as_ref() else {
            return false;
        };
        let screen = |pos: &Vec<f64>| -> Option<ScreenPoint> {
            if pos.len() < 2 {
                return None;
            }
            Some(projection.to_screen(&self.camera, &LatLng::new(pos[1], pos[0])))
        };
        let point_hit = |pos: &Vec<f64>| -> bool {
            match (screen(pos), region) {
                (Some(s), QueryRegion::Point(p)) => distance(&s, p) <= radius,
                (Some(s), QueryRegion::Rect(r)) => r.contains(&s),
                (None, _) => false,
            }
        };
        let line_hit = |line: &Vec<Vec<f64>>| -> bool {
            let points: Vec<ScreenPoint> = line.iter().filter_map(|p| screen(p)).collect();
            match region {
                QueryRegion::Point(p) => points
                    .windows(2)
                    .any(|seg| segment_distance(p, &seg[0], &seg[1]) <= radius),
                QueryRegion::Rect(r) => points.iter().any(|s| r.contains(s)),
            }
        };
        let polygon_hit = |rings: &Vec<Vec<Vec<f64>>>| -> bool {
            let Some(outer) = rings.first() else {
                return false;
            };
            let ring: Vec<ScreenPoint> = outer.iter().filter_map(|p| screen(p)).collect();
            match region {
                QueryRegion::Point(p) => point_in_ring(p, &ring),
                QueryRegion::Rect(r) => ring.iter().any(|s| r.contains(s)),
            }
        };

        match &geometry.value {
            GeoValue::Point(pos) => point_hit(pos),
            GeoValue::MultiPoint(list) => list.iter().any(|p| point_hit(p)),
            GeoValue::LineString(line) => line_hit(line),
            GeoValue::MultiLineString(lines) => lines.iter().any(|l| line_hit(l)),
            GeoValue::Polygon(rings) => polygon_hit(rings),
            GeoValue::MultiPolygon(polys) => polys.iter().any(|p| polygon_hit(p)),
            GeoValue::GeometryCollection(_) => false,
        }
    }
}

impl MapView for HeadlessMap {
    fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    fn camera(&self) -> CameraPosition {
        self.camera
    }

    fn zoom_limits(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    fn set_zoom_limits(&mut self, min: Option<f64>, max: Option<f64>) {
        self.min_zoom = min.unwrap_or(DEFAULT_MIN_ZOOM);
        self.max_zoom = max.unwrap_or(DEFAULT_MAX_ZOOM).max(self.min_zoom);
        self.camera.zoom = self.camera.zoom.clamp(self.min_zoom, self.max_zoom);
    }

    fn move_camera(&mut self, camera: CameraPosition) {
        self.set_camera(camera);
    }

    fn animate_camera(&mut self, camera: CameraPosition, duration: Duration, done: Completion<bool>) {
        trace!(duration_ms = duration.as_millis() as u64, "Animating camera");
        self.set_camera(camera);
        self.events.push_back(ViewEvent::MapIdle);
        done(true);
    }

    fn load_style(&mut self, url: &str) -> Result<(), MapError> {
        if url.is_empty() {
            return Err(MapError::backend("load_style", "empty style url"));
        }
        debug!(url, "Loading style");
        self.styles_requested.push(url.to_string());
        let mut style = HeadlessStyle::new(url);
        if self.location_enabled {
            Self::add_location_layers(&mut style);
        }
        self.events.push_back(ViewEvent::StyleLoaded {
            name: style.name.clone(),
        });
        self.style = Some(style);
        if !self.map_loaded {
            self.map_loaded = true;
            self.events.push_back(ViewEvent::MapLoaded);
        }
        self.events.push_back(ViewEvent::MapIdle);
        Ok(())
    }

    fn style(&self) -> Option<&dyn Style> {
        self.style.as_ref().map(|s| s as &dyn Style)
    }

    fn style_mut(&mut self) -> Option<&mut dyn Style> {
        self.style.as_mut().map(|s| s as &mut dyn Style)
    }

    fn query_rendered_features(&self, region: QueryRegion, layer_ids: Option<&[String]>) -> Vec<Feature> {
        let Some(style) = self.style.as_ref() else {
            return Vec::new();
        };
        if let QueryRegion::Rect(rect) = region {
            if rect.is_empty() {
                return Vec::new();
            }
        }
        let projection = self.projection();
        let mut hits = Vec::new();

        // Topmost layer first, as a renderer reports them.
        for layer in style.layers.iter().rev() {
            if let Some(ids) = layer_ids {
                if !ids.iter().any(|id| *id == layer.id) {
                    continue;
                }
            }
            if matches!(layer.kind, LayerKind::Background | LayerKind::Heatmap) || !layer.visible_at(self.camera.zoom) {
                continue;
            }
            let Some(SourceSpec::GeoJson { data }) = layer.source.as_deref().and_then(|s| style.sources.get(s)) else {
                continue;
            };
            let layer_filter = match layer.filter.as_ref().map(FeatureFilter::parse) {
                Some(Ok(filter)) => Some(filter),
                Some(Err(e)) => {
                    warn!(layer = %layer.id, error = %e, "Ignoring unparseable layer filter");
                    None
                }
                None => None,
            };
            let radius = Self::hit_radius(layer);
            for feature in &data.features {
                if layer_filter.as_ref().map_or(true, |f| f.evaluate(feature))
                    && self.feature_hit(&projection, feature, &region, radius)
                {
                    hits.push(feature.clone());
                }
            }
        }
        hits
    }

    fn apply_ui_setting(&mut self, setting: UiSetting) {
        trace!(setting = ?setting, "UI setting");
        match setting {
            UiSetting::Compass(on) => self.ui.compass = on,
            UiSetting::CompassMargins(margins) => self.ui.compass_margins = margins,
            UiSetting::RotateGestures(on) => self.ui.rotate_gestures = on,
            UiSetting::ScrollGestures(on) => self.ui.scroll_gestures = on,
            UiSetting::TiltGestures(on) => self.ui.tilt_gestures = on,
            UiSetting::ZoomGestures(on) => self.ui.zoom_gestures = on,
            UiSetting::Logo(on) => self.ui.logo = on,
            UiSetting::Attribution(on) => self.ui.attribution = on,
            UiSetting::Language(code) => self.ui.language = code,
        }
    }

    fn set_location_enabled(&mut self, enabled: bool) {
        self.location_enabled = enabled;
        if let Some(style) = self.style.as_mut() {
            if enabled {
                Self::add_location_layers(style);
            } else {
                Self::remove_location_layers(style);
            }
        }
    }

    fn set_tracking_mode(&mut self, mode: TrackingMode) {
        if self.tracking_mode != mode {
            self.tracking_mode = mode;
            self.events.push_back(ViewEvent::TrackingChanged(mode));
        }
    }

    fn last_known_location(&self) -> Option<LatLng> {
        if self.location_enabled {
            self.user_location
        } else {
            None
        }
    }

    fn invalidate_ambient_cache(&mut self, done: Completion<Result<(), MapError>>) {
        self.cache_invalidations += 1;
        match &self.cache_failure {
            Some(reason) => done(Err(MapError::backend("invalidate_ambient_cache", reason.clone()))),
            None => done(Ok(())),
        }
    }

    fn decode_route_geometry(&self, encoded: &str, precision: u32) -> Option<Vec<LatLng>> {
        self.polyline_decoder.as_ref().and_then(|decode| decode(encoded, precision))
    }

    fn launch_navigation(&mut self, request: NavigationRequest) -> Result<(), MapError> {
        if !self.navigation_enabled {
            return Err(MapError::unsupported("navigation"));
        }
        self.navigation_requests.push(request);
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<ViewEvent> {
        self.events.drain(..).collect()
    }
}

fn distance(a: &ScreenPoint, b: &ScreenPoint) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

fn segment_distance(p: &ScreenPoint, a: &ScreenPoint, b: &ScreenPoint) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, &ScreenPoint::new(a.x + t * dx, a.y + t * dy))
}

fn point_in_ring(p: &ScreenPoint, ring: &[ScreenPoint]) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A rect query region from two corners.
pub fn rect_region(left: f64, top: f64, right: f64, bottom: f64) -> QueryRegion {
    QueryRegion::Rect(ScreenRect::new(left, top, right, bottom))
}
