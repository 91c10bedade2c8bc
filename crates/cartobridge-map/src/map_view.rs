//! The `MapView` trait: everything the bridge needs from a rendering backend.
//!
//! Backend callbacks that are not tied to one call (style loaded, camera
//! idle, taps) are queued by the backend and drained through
//! [`MapView::poll_events`]. Completions tied to one call (animations,
//! cache invalidation) are passed as one-shot callbacks.

use crate::navigation::NavigationRequest;
use crate::projection::Projection;
use crate::style::Style;
use cartobridge_core::error::MapError;
use cartobridge_core::types::{
    CameraPosition, EdgePadding, LatLng, ScreenPoint, ScreenRect, TrackingMode, ViewportSize,
};
use geojson::Feature;
use std::time::Duration;

/// One-shot completion callback.
pub type Completion<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Area of a rendered-feature query, in view pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryRegion {
    Point(ScreenPoint),
    Rect(ScreenRect),
}

/// Chrome and gesture settings that have no effect on the bridge itself.
#[derive(Debug, Clone, PartialEq)]
pub enum UiSetting {
    Compass(bool),
    CompassMargins(EdgePadding),
    RotateGestures(bool),
    ScrollGestures(bool),
    TiltGestures(bool),
    ZoomGestures(bool),
    Logo(bool),
    Attribution(bool),
    Language(Option<String>),
}

/// Callbacks queued by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The map finished its first load.
    MapLoaded,
    /// A style finished loading.
    StyleLoaded { name: String },
    /// Rendering settled.
    MapIdle,
    CameraMoveStarted { gesture: bool },
    CameraMove(CameraPosition),
    CameraIdle(CameraPosition),
    Click(ScreenPoint),
    LongPress(ScreenPoint),
    /// Camera tracking mode changed, e.g. through a gesture.
    TrackingChanged(TrackingMode),
    /// A gesture broke camera tracking.
    TrackingDismissed,
}

/// A live map view.
///
/// Implementations must be `Send` so a host can keep controllers on a worker
/// thread; the bridge never calls one view from two threads at once.
pub trait MapView: Send {
    fn viewport(&self) -> ViewportSize;

    fn camera(&self) -> CameraPosition;

    /// `(min, max)` zoom currently allowed.
    fn zoom_limits(&self) -> (f64, f64);

    /// `None` resets the corresponding limit to the backend default.
    fn set_zoom_limits(&mut self, min: Option<f64>, max: Option<f64>);

    /// Jumps to `camera`.
    fn move_camera(&mut self, camera: CameraPosition);

    /// Animates to `camera`; `done` receives `true` when the animation
    /// finished and `false` when it was cancelled.
    fn animate_camera(&mut self, camera: CameraPosition, duration: Duration, done: Completion<bool>);

    /// Projection for the current viewport and zoom limits.
    fn projection(&self) -> Projection {
        let (min, max) = self.zoom_limits();
        Projection::new(self.viewport()).with_zoom_limits(min, max)
    }

    /// Screen position of a coordinate under the current camera.
    fn to_screen(&self, point: &LatLng) -> ScreenPoint {
        self.projection().to_screen(&self.camera(), point)
    }

    /// Coordinate under a screen point.
    fn to_coordinate(&self, point: &ScreenPoint) -> LatLng {
        self.projection().to_coordinate(&self.camera(), point)
    }

    /// Starts loading a style. Completion is reported as [`ViewEvent::StyleLoaded`].
    fn load_style(&mut self, url: &str) -> Result<(), MapError>;

    /// The loaded style, if any.
    fn style(&self) -> Option<&dyn Style>;

    fn style_mut(&mut self) -> Option<&mut dyn Style>;

    /// Features drawn in `region`, optionally limited to `layer_ids`.
    fn query_rendered_features(&self, region: QueryRegion, layer_ids: Option<&[String]>) -> Vec<Feature>;

    fn apply_ui_setting(&mut self, setting: UiSetting);

    fn set_location_enabled(&mut self, enabled: bool);

    fn set_tracking_mode(&mut self, mode: TrackingMode);

    fn last_known_location(&self) -> Option<LatLng>;

    /// Invalidates the ambient tile cache; `done` runs when the backend finishes.
    fn invalidate_ambient_cache(&mut self, done: Completion<Result<(), MapError>>);

    /// Decodes an encoded polyline route geometry. Backends without a
    /// decoder return `None` and callers fall back to the waypoints.
    fn decode_route_geometry(&self, _encoded: &str, _precision: u32) -> Option<Vec<LatLng>> {
        None
    }

    /// Launches turn-by-turn navigation.
    fn launch_navigation(&mut self, _request: NavigationRequest) -> Result<(), MapError> {
        Err(MapError::unsupported("navigation"))
    }

    /// Drains queued backend callbacks in arrival order.
    fn poll_events(&mut self) -> Vec<ViewEvent>;
}
