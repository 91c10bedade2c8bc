//! Per-map command dispatcher.
//!
//! A [`MapController`] owns one live [`MapView`] and answers the commands
//! addressed to it. Every command is first offered to the plugin registry;
//! commands no plugin claims fall through to the built-in handlers, and
//! anything else is answered "not implemented".
//!
//! Backend callbacks are drained after every command (and by the host after
//! creation) through [`MapController::process_view_events`], which runs the
//! style-loaded sequence: annotations are redrawn, plugins are built on the
//! first load, plugins are notified, then the host hears `map#onStyleLoaded`.

use crate::annotations::{AnnotationKind, AnnotationManager};
use crate::event::{
    EventSink, CAMERA_IDLE, CAMERA_MOVE, CAMERA_MOVE_STARTED, MAP_CLICK, MAP_IDLE, MAP_LONG_PRESS, STYLE_LOADED,
    TRACKING_CHANGED, TRACKING_DISMISSED,
};
use cartobridge_core::camera::CameraUpdate;
use cartobridge_core::error::{ArgumentError, BridgeError};
use cartobridge_core::options::{CircleOptions, LineOptions, MapOptions, SymbolOptions};
use cartobridge_core::types::{CameraPosition, LatLngBounds, ScreenPoint, ScreenRect};
use cartobridge_core::{AppConfig, Args, MapId, MethodCall, MethodResult};
use cartobridge_map::filter::FeatureFilter;
use cartobridge_map::{MapView, QueryRegion, UiSetting, ViewEvent};
use cartobridge_plugin_api::{Dispatch, PluginContext, PluginRegistry};
use metrics::counter;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Upper bound on drain rounds, for backends that keep queueing events.
const MAX_EVENT_ROUNDS: usize = 32;

/// Dispatcher and state for one map view.
pub struct MapController {
    id: MapId,
    view: Box<dyn MapView>,
    config: Arc<AppConfig>,
    registry: Arc<PluginRegistry>,
    events: EventSink,
    annotations: AnnotationManager,
    current_style: Option<String>,
    map_ready: bool,
    track_camera_position: bool,
    camera_target_bounds: Option<LatLngBounds>,
    language_code: Option<String>,
    language_enabled: bool,
    pending_waits: Vec<MethodResult>,
}

impl MapController {
    pub fn new(
        id: MapId,
        view: Box<dyn MapView>,
        config: Arc<AppConfig>,
        registry: Arc<PluginRegistry>,
        events: EventSink,
    ) -> Self {
        Self {
            id,
            view,
            config,
            registry,
            events,
            annotations: AnnotationManager::new(),
            current_style: None,
            map_ready: false,
            track_camera_position: false,
            camera_target_bounds: None,
            language_code: None,
            language_enabled: true,
            pending_waits: Vec::new(),
        }
    }

    /// Applies creation parameters: initial camera, options, and the default
    /// style when the options name none.
    pub fn initialize(&mut self, params: &Value) {
        let args = Args::new(params);
        if let Some(camera) = args.get("initialCameraPosition").and_then(CameraPosition::from_value) {
            self.view.move_camera(camera);
        }
        let options = args.get("options").map(MapOptions::from_value).unwrap_or_default();
        let has_style = options
            .style_string
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        self.apply_options(options);
        if !has_style {
            let style = self.config.map.default_style.clone();
            self.set_style_string(&style);
        }
        self.process_view_events();
        debug!(map = %self.id, "Map initialized");
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn view(&self) -> &dyn MapView {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> &mut dyn MapView {
        self.view.as_mut()
    }

    pub fn annotations(&self) -> &AnnotationManager {
        &self.annotations
    }

    /// Name of the last style whose load was processed.
    pub fn current_style(&self) -> Option<&str> {
        self.current_style.as_deref()
    }

    pub fn is_map_ready(&self) -> bool {
        self.map_ready
    }

    /// Answers `call` exactly once through `reply`.
    pub fn handle(&mut self, call: &MethodCall, reply: MethodResult) {
        trace!(map = %self.id, method = %call.method, "Handling command");
        let dispatch = {
            let mut ctx = PluginContext::new(self.id, self.view.as_mut(), &self.config);
            self.registry.dispatch_command(self.id, &mut ctx, call, reply)
        };
        match dispatch {
            Dispatch::Claimed => {
                counter!("cartobridge_commands_total", "handler" => "plugin").increment(1);
            }
            Dispatch::Unclaimed(reply) => self.handle_builtin(call, reply),
        }
        self.process_view_events();
    }

    fn handle_builtin(&mut self, call: &MethodCall, reply: MethodResult) {
        let args = call.args();
        match call.method.as_str() {
            "map#waitForMap" => self.wait_for_map(reply),
            "map#update" => self.update(args, reply),
            "camera#move" => self.move_camera(args, reply),
            "camera#animate" | "camera#animateWithTime" => self.animate_camera(args, reply),
            "map#queryRenderedFeatures" => reply.success(self.query_rendered_features(args)),
            "map#invalidateAmbientCache" => self.invalidate_ambient_cache(reply),
            "map#setStyleString" => {
                match args.str("styleString") {
                    Ok(style) => self.set_style_string(style),
                    Err(e) => debug!(map = %self.id, error = %e, "Ignoring setStyleString"),
                }
                reply.success_null();
            }
            "location#enableLocation" => {
                self.view.set_location_enabled(true);
                reply.success_null();
            }
            "location#disableLocation" => {
                self.view.set_location_enabled(false);
                reply.success_null();
            }
            "location#lastKnownLocation" => {
                let location = self.view.last_known_location();
                reply.success(location.map_or(Value::Null, |l| l.to_value()));
            }
            _ => match call.namespace() {
                "symbol" => self.annotation_command::<SymbolOptions>(call.action(), args, reply),
                "circle" => self.annotation_command::<CircleOptions>(call.action(), args, reply),
                "line" => self.annotation_command::<LineOptions>(call.action(), args, reply),
                _ => self.not_implemented(call, reply),
            },
        }
    }

    fn not_implemented(&self, call: &MethodCall, reply: MethodResult) {
        debug!(map = %self.id, method = %call.method, "Method not implemented");
        counter!("cartobridge_commands_total", "handler" => "not_implemented").increment(1);
        reply.not_implemented();
    }

    /// Malformed arguments: the command is dropped and answered with null.
    fn ignore(&self, method: &str, error: ArgumentError, reply: MethodResult) {
        debug!(map = %self.id, method, error = %error, "Ignoring command with malformed arguments");
        counter!("cartobridge_commands_total", "handler" => "ignored").increment(1);
        reply.success_null();
    }

    fn wait_for_map(&mut self, reply: MethodResult) {
        counter!("cartobridge_commands_total", "handler" => "builtin").increment(1);
        if self.map_ready {
            reply.success(json!(true));
        } else {
            debug!(map = %self.id, "Map not ready, parking waitForMap");
            self.pending_waits.push(reply);
        }
    }

    fn update(&mut self, args: Args<'_>, reply: MethodResult) {
        counter!("cartobridge_commands_total", "handler" => "builtin").increment(1);
        let options = args.get("options").map(MapOptions::from_value).unwrap_or_default();
        self.apply_options(options);
        if self.track_camera_position {
            reply.success(self.view.camera().to_value());
        } else {
            reply.success_null();
        }
    }

    fn target_camera(&self, args: Args<'_>) -> Result<CameraPosition, ArgumentError> {
        let update = CameraUpdate::from_value(args.value("cameraUpdate")?, self.config.map.pixel_ratio)?;
        Ok(self.view.projection().apply(&self.view.camera(), &update))
    }

    fn within_target_bounds(&self, camera: &CameraPosition) -> bool {
        let allowed = self
            .camera_target_bounds
            .as_ref()
            .map_or(true, |bounds| bounds.contains(&camera.target));
        if !allowed {
            debug!(map = %self.id, target = ?camera.target, "Camera change leaves target bounds, refused");
        }
        allowed
    }

    fn move_camera(&mut self, args: Args<'_>, reply: MethodResult) {
        let camera = match self.target_camera(args) {
            Ok(camera) => camera,
            Err(e) => return self.ignore("camera#move", e, reply),
        };
        counter!("cartobridge_commands_total", "handler" => "builtin").increment(1);
        if self.within_target_bounds(&camera) {
            self.view.move_camera(camera);
        }
        reply.success_null();
    }

    fn animate_camera(&mut self, args: Args<'_>, reply: MethodResult) {
        let camera = match self.target_camera(args) {
            Ok(camera) => camera,
            Err(e) => return self.ignore("camera#animate", e, reply),
        };
        counter!("cartobridge_commands_total", "handler" => "builtin").increment(1);
        if !self.within_target_bounds(&camera) {
            return reply.success_null();
        }
        let duration = args
            .opt_f64("duration")
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or_else(|| self.config.map.animation_duration());
        let map = self.id;
        self.view.animate_camera(
            camera,
            duration,
            Box::new(move |finished| {
                trace!(map = %map, finished, "Camera animation done");
                reply.success_null();
            }),
        );
    }

    fn query_rendered_features(&self, args: Args<'_>) -> Value {
        counter!("cartobridge_commands_total", "handler" => "builtin").increment(1);
        let empty = json!({ "features": [] });
        let ratio = self.config.map.pixel_ratio;
        let side = |name: &str| args.opt_f64(name).map(|v| v * ratio);

        let region = match (side("x"), side("y")) {
            (Some(x), Some(y)) => QueryRegion::Point(ScreenPoint::new(x, y)),
            _ => match (side("left"), side("top"), side("right"), side("bottom")) {
                (Some(left), Some(top), Some(right), Some(bottom)) => {
                    QueryRegion::Rect(ScreenRect::new(left, top, right, bottom))
                }
                _ => {
                    debug!(map = %self.id, "Feature query without a point or rect");
                    return empty;
                }
            },
        };

        let layer_ids: Option<Vec<String>> = args
            .get("layerIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .filter(|ids: &Vec<String>| !ids.is_empty());

        let filter = match args.get("filter").map(FeatureFilter::parse) {
            Some(Ok(filter)) => Some(filter),
            Some(Err(e)) => {
                debug!(map = %self.id, error = %e, "Unusable feature filter");
                return empty;
            }
            None => None,
        };

        let features: Vec<Value> = self
            .view
            .query_rendered_features(region, layer_ids.as_deref())
            .into_iter()
            .filter(|feature| filter.as_ref().map_or(true, |f| f.evaluate(feature)))
            .filter_map(|feature| serde_json::to_string(&feature).ok())
            .map(Value::String)
            .collect();
        trace!(map = %self.id, count = features.len(), "Rendered features queried");
        json!({ "features": features })
    }

    fn invalidate_ambient_cache(&mut self, reply: MethodResult) {
        counter!("cartobridge_commands_total", "handler" => "builtin").increment(1);
        let map = self.id;
        self.view.invalidate_ambient_cache(Box::new(move |result| match result {
            Ok(()) => reply.success_null(),
            Err(e) => {
                warn!(map = %map, error = %e, "Ambient cache invalidation failed");
                let error = BridgeError::from(e);
                reply.error(error.code(), error.to_string());
            }
        }));
    }

    /// Loads a style by URL. Empty strings are ignored and inline style JSON
    /// is not supported.
    pub fn set_style_string(&mut self, style: &str) {
        let style = style.trim();
        if style.is_empty() {
            return;
        }
        if style.starts_with('{') || style.starts_with('[') {
            warn!(map = %self.id, "Inline style JSON is not supported");
            return;
        }
        // A reload of the same style must not look like a duplicate.
        self.current_style = None;
        if let Err(e) = self.view.load_style(style) {
            warn!(map = %self.id, style, error = %e, "Style load failed");
        }
    }

    /// Applies every option present in `options`.
    pub fn apply_options(&mut self, options: MapOptions) {
        if let Some(bounds) = options.camera_target_bounds {
            self.camera_target_bounds = bounds;
        }
        if let Some(on) = options.compass_enabled {
            self.view.apply_ui_setting(UiSetting::Compass(on));
        }
        if let Some((min, max)) = options.min_max_zoom {
            self.view.set_zoom_limits(min, max);
        }
        if let Some(on) = options.rotate_gestures_enabled {
            self.view.apply_ui_setting(UiSetting::RotateGestures(on));
        }
        if let Some(on) = options.scroll_gestures_enabled {
            self.view.apply_ui_setting(UiSetting::ScrollGestures(on));
        }
        if let Some(on) = options.tilt_gestures_enabled {
            self.view.apply_ui_setting(UiSetting::TiltGestures(on));
        }
        if let Some(on) = options.zoom_gestures_enabled {
            self.view.apply_ui_setting(UiSetting::ZoomGestures(on));
        }
        if let Some(on) = options.track_camera_position {
            self.track_camera_position = on;
        }
        if let Some(on) = options.my_location_enabled {
            self.view.set_location_enabled(on);
        }
        if let Some(mode) = options.my_location_tracking_mode {
            self.view.set_tracking_mode(mode);
        }
        if let Some(margins) = options.compass_margins {
            self.view.apply_ui_setting(UiSetting::CompassMargins(margins));
        }
        if let Some(on) = options.enable_logo {
            self.view.apply_ui_setting(UiSetting::Logo(on));
        }
        if let Some(on) = options.enable_attribution {
            self.view.apply_ui_setting(UiSetting::Attribution(on));
        }

        let language_changed = options.language_code.is_some() || options.language_enable.is_some();
        if let Some(code) = options.language_code {
            self.language_code = Some(code);
        }
        if let Some(on) = options.language_enable {
            self.language_enabled = on;
        }
        if language_changed {
            let language = self.language_code.clone().filter(|_| self.language_enabled);
            self.view.apply_ui_setting(UiSetting::Language(language));
        }

        if let Some(style) = options.style_string {
            self.set_style_string(&style);
        }
    }

    fn annotation_command<O: AnnotationKind>(&mut self, action: &str, args: Args<'_>, reply: MethodResult) {
        let method = format!("{}#{}", O::NAME, action);
        match action {
            "add" => match args.object("options") {
                Ok(_) => {
                    let options = args.get("options").map(O::from_value).unwrap_or_default();
                    let id = self.annotations.set_mut::<O>().add(options);
                    self.sync_annotations::<O>();
                    reply.success(json!(id));
                }
                Err(e) => return self.ignore(&method, e, reply),
            },
            "addList" => match args.list("options") {
                Ok(list) => {
                    let set = self.annotations.set_mut::<O>();
                    let ids: Vec<String> = list
                        .iter()
                        .filter(|options| options.is_object())
                        .map(|options| set.add(O::from_value(options)))
                        .collect();
                    self.sync_annotations::<O>();
                    reply.success(json!(ids));
                }
                Err(e) => return self.ignore(&method, e, reply),
            },
            "update" => match (args.str(O::NAME), args.value("options")) {
                (Ok(id), Ok(options)) => {
                    if !self.annotations.set_mut::<O>().update(id, O::from_value(options)) {
                        debug!(map = %self.id, annotation = id, "Update of unknown annotation ignored");
                    }
                    self.sync_annotations::<O>();
                    reply.success_null();
                }
                (Err(e), _) | (_, Err(e)) => return self.ignore(&method, e, reply),
            },
            "remove" => match args.str(O::NAME) {
                Ok(id) => {
                    if self.annotations.set_mut::<O>().remove(id) {
                        self.sync_annotations::<O>();
                    }
                    reply.success_null();
                }
                Err(e) => return self.ignore(&method, e, reply),
            },
            "removeList" => {
                let list_name = format!("{}s", O::NAME);
                let set = self.annotations.set_mut::<O>();
                match args.get(&list_name).and_then(Value::as_array) {
                    Some(ids) => {
                        for id in ids.iter().filter_map(Value::as_str) {
                            set.remove(id);
                        }
                    }
                    None => {
                        set.clear();
                    }
                }
                self.sync_annotations::<O>();
                reply.success_null();
            }
            _ => {
                debug!(map = %self.id, method = %method, "Method not implemented");
                counter!("cartobridge_commands_total", "handler" => "not_implemented").increment(1);
                return reply.not_implemented();
            }
        }
        counter!("cartobridge_commands_total", "handler" => "builtin").increment(1);
    }

    fn sync_annotations<O: AnnotationKind>(&mut self) {
        let Some(style) = self.view.style_mut() else {
            trace!(map = %self.id, "No style yet, annotations are drawn on load");
            return;
        };
        if let Err(e) = self.annotations.set::<O>().sync(style) {
            warn!(map = %self.id, kind = O::NAME, error = %e, "Annotation sync failed");
        }
    }

    /// Drains and handles queued backend callbacks.
    ///
    /// Returns the number of events handled.
    pub fn process_view_events(&mut self) -> usize {
        let mut handled = 0;
        for _ in 0..MAX_EVENT_ROUNDS {
            let events = self.view.poll_events();
            if events.is_empty() {
                return handled;
            }
            for event in events {
                handled += 1;
                self.on_view_event(event);
            }
        }
        warn!(map = %self.id, handled, "Backend kept queueing events, stopped draining");
        handled
    }

    fn on_view_event(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::StyleLoaded { name } => self.on_style_loaded(name),
            ViewEvent::MapLoaded => {
                self.map_ready = true;
                let ready = self.current_style.is_some();
                for wait in self.pending_waits.drain(..) {
                    wait.success(json!(ready));
                }
                debug!(map = %self.id, "Map loaded");
            }
            ViewEvent::MapIdle => self.events.emit(MAP_IDLE, json!({})),
            ViewEvent::CameraMoveStarted { gesture } => {
                self.events.emit(CAMERA_MOVE_STARTED, json!({ "isGesture": gesture }));
            }
            ViewEvent::CameraMove(position) => {
                if self.track_camera_position {
                    self.events.emit(CAMERA_MOVE, json!({ "position": position.to_value() }));
                }
            }
            ViewEvent::CameraIdle(position) => {
                let args = if self.track_camera_position {
                    json!({ "position": position.to_value() })
                } else {
                    json!({})
                };
                self.events.emit(CAMERA_IDLE, args);
            }
            ViewEvent::Click(point) => self.on_click(point),
            ViewEvent::LongPress(point) => self.events.emit(MAP_LONG_PRESS, self.point_args(&point)),
            ViewEvent::TrackingChanged(mode) => {
                self.events.emit(TRACKING_CHANGED, json!({ "mode": mode.index() }));
            }
            ViewEvent::TrackingDismissed => self.events.emit(TRACKING_DISMISSED, json!({})),
        }
    }

    fn on_style_loaded(&mut self, name: String) {
        if self.current_style.as_deref() == Some(name.as_str()) {
            debug!(map = %self.id, style = %name, "Duplicate style-loaded callback skipped");
            return;
        }
        self.current_style = Some(name);

        if let Some(style) = self.view.style_mut() {
            if let Err(e) = self.annotations.render(style) {
                warn!(map = %self.id, error = %e, "Annotation render failed");
            }
        }

        let built = self.registry.build_plugins(self.id);
        let notified = {
            let mut ctx = PluginContext::new(self.id, self.view.as_mut(), &self.config);
            self.registry.dispatch_style_loaded(self.id, &mut ctx)
        };
        info!(
            map = %self.id,
            style = ?self.current_style,
            built,
            notified,
            "Style loaded"
        );
        self.events.emit(STYLE_LOADED, json!({ "map": self.id.raw() }));
    }

    fn on_click(&mut self, point: ScreenPoint) {
        let layers = self.annotations.layer_ids();
        let tapped = self
            .view
            .query_rendered_features(QueryRegion::Point(point), Some(layers.as_slice()))
            .iter()
            .find_map(|feature| self.annotations.tap_event(feature));
        match tapped {
            Some((method, args)) => self.events.emit(&method, args),
            None => self.events.emit(MAP_CLICK, self.point_args(&point)),
        }
    }

    /// `{x, y, lng, lat}` for a view point, in logical pixels.
    fn point_args(&self, point: &ScreenPoint) -> Value {
        let ratio = self.config.map.pixel_ratio;
        let coordinate = self.view.to_coordinate(point);
        json!({
            "x": point.x / ratio,
            "y": point.y / ratio,
            "lng": coordinate.longitude,
            "lat": coordinate.latitude,
        })
    }

    /// Tears down the plugins of this map and answers parked waits.
    pub fn dispose(&mut self) {
        self.registry.dispose(self.id);
        for wait in self.pending_waits.drain(..) {
            wait.success(json!(false));
        }
        info!(map = %self.id, "Map disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{event_channel, EventReceiver, MapEvent};
    use cartobridge_core::types::{LatLng, ViewportSize};
    use cartobridge_core::Response;
    use cartobridge_map::{HeadlessMap, Style};

    const ID: MapId = MapId::new(1);

    fn initial_camera() -> Value {
        json!({"bearing": 0.0, "target": [0.0, 0.0], "tilt": 0.0, "zoom": 10.0})
    }

    fn bare(view: HeadlessMap) -> (MapController, EventReceiver) {
        let (tx, rx) = event_channel();
        let controller = MapController::new(
            ID,
            Box::new(view),
            Arc::new(AppConfig::default()),
            Arc::new(PluginRegistry::new()),
            EventSink::new(ID, tx),
        );
        (controller, rx)
    }

    fn controller() -> (MapController, EventReceiver) {
        let (mut controller, rx) = bare(HeadlessMap::new(ViewportSize::new(400.0, 400.0)));
        controller.initialize(&json!({ "initialCameraPosition": initial_camera() }));
        (controller, rx)
    }

    fn call(controller: &mut MapController, method: &str, args: Value) -> Response {
        let (reply, mut rx) = MethodResult::channel(method);
        controller.handle(&MethodCall::new(method, args), reply);
        rx.try_recv().expect("command must be answered")
    }

    fn drain(rx: &mut EventReceiver) -> Vec<MapEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_initialize_loads_default_style() {
        let (controller, mut rx) = controller();
        let default_style = AppConfig::default().map.default_style;
        assert_eq!(controller.current_style(), Some(default_style.as_str()));
        assert!(controller.is_map_ready());
        let events = drain(&mut rx);
        let loaded: Vec<_> = events.iter().filter(|e| e.method == STYLE_LOADED).collect();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].arguments, json!({"map": 1}));
    }

    #[test]
    fn test_wait_for_map_parks_until_loaded() {
        let (mut controller, _rx) = bare(HeadlessMap::new(ViewportSize::new(400.0, 400.0)));
        let (reply, mut wait) = MethodResult::channel("map#waitForMap");
        controller.handle(&MethodCall::new("map#waitForMap", Value::Null), reply);
        assert!(wait.try_recv().is_err());

        controller.initialize(&json!({}));
        assert_eq!(wait.try_recv().unwrap().result(), Some(&json!(true)));

        let response = call(&mut controller, "map#waitForMap", Value::Null);
        assert_eq!(response.result(), Some(&json!(true)));
    }

    #[test]
    fn test_dispose_answers_parked_waits() {
        let (mut controller, _rx) = bare(HeadlessMap::new(ViewportSize::new(400.0, 400.0)));
        let (reply, mut wait) = MethodResult::channel("map#waitForMap");
        controller.handle(&MethodCall::new("map#waitForMap", Value::Null), reply);
        controller.dispose();
        assert_eq!(wait.try_recv().unwrap().result(), Some(&json!(false)));
    }

    #[test]
    fn test_unknown_method_not_implemented() {
        let (mut controller, _rx) = controller();
        assert_eq!(call(&mut controller, "map#teleport", json!({})), Response::NotImplemented);
        assert_eq!(call(&mut controller, "symbol#explode", json!({})), Response::NotImplemented);
    }

    #[test]
    fn test_malformed_arguments_answer_null() {
        let (mut controller, _rx) = controller();
        let before = controller.view().camera();
        let response = call(&mut controller, "camera#move", json!({"cameraUpdate": ["warp"]}));
        assert_eq!(response.result(), Some(&Value::Null));
        assert_eq!(controller.view().camera(), before);

        let response = call(&mut controller, "symbol#add", json!({}));
        assert_eq!(response.result(), Some(&Value::Null));
        assert!(controller.annotations().set::<SymbolOptions>().is_empty());
    }

    #[test]
    fn test_camera_move() {
        let (mut controller, _rx) = controller();
        let response = call(
            &mut controller,
            "camera#move",
            json!({"cameraUpdate": ["newLatLngZoom", [48.85, 2.35], 12.0]}),
        );
        assert!(response.is_success());
        let camera = controller.view().camera();
        assert!((camera.target.latitude - 48.85).abs() < 1e-9);
        assert_eq!(camera.zoom, 12.0);
    }

    #[test]
    fn test_camera_target_bounds_refuse_outside_center() {
        let (mut controller, _rx) = controller();
        call(
            &mut controller,
            "map#update",
            json!({"options": {"cameraTargetBounds": [[[-1.0, -1.0], [1.0, 1.0]]]}}),
        );
        call(&mut controller, "camera#move", json!({"cameraUpdate": ["newLatLng", [10.0, 10.0]]}));
        assert_eq!(controller.view().camera().target, LatLng::new(0.0, 0.0));

        call(&mut controller, "camera#move", json!({"cameraUpdate": ["newLatLng", [0.5, 0.5]]}));
        assert_eq!(controller.view().camera().target, LatLng::new(0.5, 0.5));
    }

    #[test]
    fn test_animate_answers_from_completion() {
        let (mut controller, _rx) = controller();
        let response = call(
            &mut controller,
            "camera#animateWithTime",
            json!({"cameraUpdate": ["zoomTo", 14.0], "duration": 500}),
        );
        assert_eq!(response.result(), Some(&Value::Null));
        assert_eq!(controller.view().camera().zoom, 14.0);
    }

    #[test]
    fn test_update_returns_camera_when_tracking() {
        let (mut controller, _rx) = controller();
        let response = call(&mut controller, "map#update", json!({"options": {"compassEnabled": false}}));
        assert_eq!(response.result(), Some(&Value::Null));

        let response = call(&mut controller, "map#update", json!({"options": {"trackCameraPosition": true}}));
        assert_eq!(response.result(), Some(&initial_camera()));
    }

    #[test]
    fn test_symbol_round_trip_and_query() {
        let (mut controller, _rx) = controller();
        let response = call(
            &mut controller,
            "symbol#add",
            json!({"options": {"geometry": [0.0, 0.0], "iconImage": "airport-15"}}),
        );
        assert_eq!(response.result(), Some(&json!("symbol_1")));

        let response = call(&mut controller, "map#queryRenderedFeatures", json!({"x": 200.0, "y": 200.0}));
        let features = response.result().unwrap()["features"].as_array().unwrap().clone();
        assert_eq!(features.len(), 1);
        assert!(features[0].as_str().unwrap().contains("symbol_1"));

        call(&mut controller, "symbol#remove", json!({"symbol": "symbol_1"}));
        let response = call(&mut controller, "map#queryRenderedFeatures", json!({"x": 200.0, "y": 200.0}));
        assert_eq!(response.result(), Some(&json!({"features": []})));
    }

    #[test]
    fn test_add_list_and_remove_list() {
        let (mut controller, _rx) = controller();
        let response = call(
            &mut controller,
            "circle#addList",
            json!({"options": [{"geometry": [0.0, 0.0]}, {"geometry": [1.0, 1.0]}, 5]}),
        );
        assert_eq!(response.result(), Some(&json!(["circle_1", "circle_2"])));

        call(&mut controller, "circle#removeList", json!({"circles": ["circle_2", "circle_9"]}));
        assert_eq!(controller.annotations().set::<CircleOptions>().ids(), vec!["circle_1"]);

        call(&mut controller, "circle#removeList", json!({}));
        assert!(controller.annotations().set::<CircleOptions>().is_empty());
    }

    #[test]
    fn test_query_filter_and_empty_region() {
        let (mut controller, _rx) = controller();
        call(
            &mut controller,
            "symbol#add",
            json!({"options": {"geometry": [0.0, 0.0], "textField": "a"}}),
        );

        let query = |filter: Value| json!({"left": 0.0, "top": 0.0, "right": 400.0, "bottom": 400.0, "filter": filter});
        let response = call(&mut controller, "map#queryRenderedFeatures", query(json!(["==", "textField", "a"])));
        assert_eq!(response.result().unwrap()["features"].as_array().unwrap().len(), 1);

        let response = call(&mut controller, "map#queryRenderedFeatures", query(json!(["==", "textField", "b"])));
        assert_eq!(response.result(), Some(&json!({"features": []})));

        let response = call(&mut controller, "map#queryRenderedFeatures", query(json!(["bogus", 1])));
        assert_eq!(response.result(), Some(&json!({"features": []})));

        let response = call(
            &mut controller,
            "map#queryRenderedFeatures",
            json!({"left": 10.0, "top": 10.0, "right": 10.0, "bottom": 10.0}),
        );
        assert_eq!(response.result(), Some(&json!({"features": []})));
    }

    #[test]
    fn test_click_emits_tap_or_map_click() {
        let (mut controller, mut rx) = controller();
        call(&mut controller, "symbol#add", json!({"options": {"geometry": [0.0, 0.0]}}));
        drain(&mut rx);

        controller.on_view_event(ViewEvent::Click(ScreenPoint::new(200.0, 200.0)));
        let events = drain(&mut rx);
        assert_eq!(events[0].method, "symbol#onTap");
        assert_eq!(events[0].arguments, json!({"symbol": "symbol_1"}));

        controller.on_view_event(ViewEvent::Click(ScreenPoint::new(10.0, 10.0)));
        let events = drain(&mut rx);
        assert_eq!(events[0].method, MAP_CLICK);
        let args = &events[0].arguments;
        assert_eq!(args["x"], json!(10.0));
        assert!(args["lat"].as_f64().unwrap() > 0.0);
        assert!(args["lng"].as_f64().unwrap() < 0.0);
    }

    #[test]
    fn test_set_style_string() {
        let (mut controller, mut rx) = controller();
        call(&mut controller, "symbol#add", json!({"options": {"geometry": [0.0, 0.0]}}));
        drain(&mut rx);

        call(&mut controller, "map#setStyleString", json!({"styleString": "{\"version\": 8}"}));
        call(&mut controller, "map#setStyleString", json!({"styleString": ""}));
        assert!(drain(&mut rx).iter().all(|e| e.method != STYLE_LOADED));

        call(&mut controller, "map#setStyleString", json!({"styleString": "test://night"}));
        assert_eq!(controller.current_style(), Some("test://night"));
        assert!(drain(&mut rx).iter().any(|e| e.method == STYLE_LOADED));
        let style = controller.view().style().unwrap();
        assert!(style.has_layer(&SymbolOptions::layer_id()));
    }

    #[test]
    fn test_invalidate_ambient_cache() {
        let (mut controller, _rx) = controller();
        let response = call(&mut controller, "map#invalidateAmbientCache", Value::Null);
        assert_eq!(response.result(), Some(&Value::Null));

        let mut view = HeadlessMap::new(ViewportSize::new(400.0, 400.0));
        view.set_cache_failure(Some("disk full".to_string()));
        let (mut controller, _rx) = bare(view);
        controller.initialize(&json!({}));
        let response = call(&mut controller, "map#invalidateAmbientCache", Value::Null);
        assert_eq!(response.error_code(), Some("map_error"));
    }

    #[test]
    fn test_location_commands() {
        let mut view = HeadlessMap::new(ViewportSize::new(400.0, 400.0));
        view.set_user_location(Some(LatLng::new(1.5, 2.5)));
        let (mut controller, _rx) = bare(view);
        controller.initialize(&json!({}));

        let response = call(&mut controller, "location#lastKnownLocation", Value::Null);
        assert_eq!(response.result(), Some(&Value::Null));

        call(&mut controller, "location#enableLocation", Value::Null);
        let response = call(&mut controller, "location#lastKnownLocation", Value::Null);
        assert_eq!(response.result(), Some(&json!([1.5, 2.5])));
    }

    #[test]
    fn test_camera_events_follow_tracking_flag() {
        let (mut controller, mut rx) = controller();
        drain(&mut rx);
        call(&mut controller, "camera#move", json!({"cameraUpdate": ["zoomIn"]}));
        let methods: Vec<_> = drain(&mut rx).into_iter().map(|e| e.method).collect();
        assert!(methods.contains(&CAMERA_MOVE_STARTED.to_string()));
        assert!(!methods.contains(&CAMERA_MOVE.to_string()));

        call(&mut controller, "map#update", json!({"options": {"trackCameraPosition": true}}));
        call(&mut controller, "camera#move", json!({"cameraUpdate": ["zoomIn"]}));
        let methods: Vec<_> = drain(&mut rx).into_iter().map(|e| e.method).collect();
        assert!(methods.contains(&CAMERA_MOVE.to_string()));
    }
}
