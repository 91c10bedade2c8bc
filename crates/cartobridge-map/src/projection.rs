//! Web Mercator camera math on 512 px tiles.
//!
//! World pixel coordinates grow east and south; at zoom `z` the world is
//! `512 * 2^z` pixels wide. Screen conversions rotate by the camera bearing
//! and ignore tilt.

use cartobridge_core::camera::CameraUpdate;
use cartobridge_core::types::{
    CameraPosition, EdgePadding, LatLng, LatLngBounds, ScreenPoint, ViewportSize,
};
use std::f64::consts::PI;

/// Tile size in pixels.
pub const TILE_SIZE: f64 = 512.0;

/// Latitude limit of the projection.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Smallest allowed zoom when the backend sets no other limit.
pub const DEFAULT_MIN_ZOOM: f64 = 0.0;

/// Largest allowed zoom when the backend sets no other limit.
pub const DEFAULT_MAX_ZOOM: f64 = 22.0;

/// World size in pixels at `zoom`.
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Projects a coordinate to world pixels at `zoom`.
pub fn project(point: &LatLng, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = point.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (point.longitude + 180.0) / 360.0 * size;
    let y = (1.0 - ((PI / 4.0 + lat / 2.0).tan()).ln() / PI) / 2.0 * size;
    (x, y)
}

/// Inverse of [`project`].
pub fn unproject(x: f64, y: f64, zoom: f64) -> LatLng {
    let size = world_size(zoom);
    let longitude = x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * y / size;
    let latitude = n.sinh().atan().to_degrees();
    LatLng::new(latitude, longitude)
}

/// Camera-relative projection for one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub viewport: ViewportSize,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Projection {
    pub fn new(viewport: ViewportSize) -> Self {
        Self {
            viewport,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }

    pub fn with_zoom_limits(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom.max(min_zoom);
        self
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Screen position of `point` under `camera`.
    pub fn to_screen(&self, camera: &CameraPosition, point: &LatLng) -> ScreenPoint {
        let (cx, cy) = project(&camera.target, camera.zoom);
        let (px, py) = project(point, camera.zoom);
        let (dx, dy) = rotate(px - cx, py - cy, -camera.bearing);
        let center = self.viewport.center();
        ScreenPoint::new(center.x + dx, center.y + dy)
    }

    /// Coordinate under `point` on screen.
    pub fn to_coordinate(&self, camera: &CameraPosition, point: &ScreenPoint) -> LatLng {
        let center = self.viewport.center();
        let (dx, dy) = rotate(point.x - center.x, point.y - center.y, camera.bearing);
        let (cx, cy) = project(&camera.target, camera.zoom);
        unproject(cx + dx, cy + dy, camera.zoom)
    }

    /// Camera that fits `bounds` inside the viewport minus `padding`.
    ///
    /// Bearing and tilt are reset to zero. A degenerate box keeps `fallback_zoom`.
    pub fn camera_for_bounds(&self, bounds: &LatLngBounds, padding: &EdgePadding, fallback_zoom: f64) -> CameraPosition {
        let (x0, y1) = project(&bounds.southwest, 0.0);
        let (x1, y0) = project(&bounds.northeast, 0.0);
        let span_x = (x1 - x0).abs();
        let span_y = (y1 - y0).abs();
        let avail_w = (self.viewport.width - padding.left - padding.right).max(1.0);
        let avail_h = (self.viewport.height - padding.top - padding.bottom).max(1.0);

        let zoom = if span_x <= f64::EPSILON && span_y <= f64::EPSILON {
            fallback_zoom
        } else {
            let scale_x = if span_x > 0.0 { avail_w / span_x } else { f64::INFINITY };
            let scale_y = if span_y > 0.0 { avail_h / span_y } else { f64::INFINITY };
            scale_x.min(scale_y).log2()
        };
        let zoom = self.clamp_zoom(zoom);

        // Shift the centre so the box sits in the middle of the padded area.
        let scale = 2f64.powf(zoom);
        let mid_x = (x0 + x1) / 2.0 * scale + (padding.right - padding.left) / 2.0;
        let mid_y = (y0 + y1) / 2.0 * scale + (padding.bottom - padding.top) / 2.0;
        CameraPosition {
            bearing: 0.0,
            target: unproject(mid_x, mid_y, zoom),
            tilt: 0.0,
            zoom,
        }
    }

    /// Applies a camera update to `camera`.
    pub fn apply(&self, camera: &CameraPosition, update: &CameraUpdate) -> CameraPosition {
        let mut next = *camera;
        match update {
            CameraUpdate::NewCameraPosition(position) => next = *position,
            CameraUpdate::NewLatLng(target) => next.target = *target,
            CameraUpdate::NewLatLngBounds { bounds, padding } => {
                next = self.camera_for_bounds(bounds, padding, camera.zoom);
            }
            CameraUpdate::NewLatLngZoom { target, zoom } => {
                next.target = *target;
                next.zoom = *zoom;
            }
            CameraUpdate::ScrollBy { dx, dy } => {
                let center = self.viewport.center();
                next.target = self.to_coordinate(camera, &ScreenPoint::new(center.x + dx, center.y + dy));
            }
            CameraUpdate::ZoomBy { amount, focus } => {
                next.zoom = self.clamp_zoom(camera.zoom + amount);
                if let Some(focus) = focus {
                    // Keep the coordinate under the focus point fixed.
                    let anchor = self.to_coordinate(camera, focus);
                    let (fx, fy) = project(&anchor, camera.zoom);
                    let (cx, cy) = project(&camera.target, camera.zoom);
                    let factor = 2f64.powf(camera.zoom - next.zoom);
                    next.target = unproject(fx + (cx - fx) * factor, fy + (cy - fy) * factor, camera.zoom);
                }
            }
            CameraUpdate::ZoomIn => next.zoom = camera.zoom + 1.0,
            CameraUpdate::ZoomOut => next.zoom = camera.zoom - 1.0,
            CameraUpdate::ZoomTo(zoom) => next.zoom = *zoom,
            CameraUpdate::BearingTo(bearing) => next.bearing = bearing.rem_euclid(360.0),
            CameraUpdate::TiltTo(tilt) => next.tilt = tilt.clamp(0.0, 60.0),
        }
        next.zoom = self.clamp_zoom(next.zoom);
        next.target.latitude = next.target.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        next
    }

    /// Geographic area visible under `camera`, ignoring rotation.
    pub fn visible_bounds(&self, camera: &CameraPosition) -> LatLngBounds {
        let flat = CameraPosition {
            bearing: 0.0,
            ..*camera
        };
        let nw = self.to_coordinate(&flat, &ScreenPoint::new(0.0, 0.0));
        let se = self.to_coordinate(&flat, &ScreenPoint::new(self.viewport.width, self.viewport.height));
        LatLngBounds {
            southwest: LatLng::new(se.latitude, nw.longitude),
            northeast: LatLng::new(nw.latitude, se.longitude),
        }
    }
}

fn rotate(x: f64, y: f64, degrees: f64) -> (f64, f64) {
    if degrees == 0.0 {
        return (x, y);
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}
