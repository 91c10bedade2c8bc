//! Core geometry and identity types shared by every cartobridge crate.
//!
//! Coordinates travel over the channel as `[lat, lng]` arrays, camera
//! positions as `{bearing, target, tilt, zoom}` maps. The conversions in this
//! module are deliberately lenient: anything that does not look like the
//! expected shape yields `None` and the caller decides whether to ignore it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Identifier of one live map view, assigned by the host at creation.
///
/// The value is opaque to the bridge; it is only compared and hashed.
///
/// # Examples
///
/// ```
/// use cartobridge_core::types::MapId;
///
/// let id = MapId::new(7);
/// assert_eq!(id.to_string(), "map-7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(i64);

impl MapId {
    /// Wraps a host-assigned view id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw id as handed out by the host.
    pub const fn raw(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map-{}", self.0)
    }
}

impl From<i64> for MapId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parses a `[lat, lng]` array.
    pub fn from_value(value: &Value) -> Option<Self> {
        let list = value.as_array()?;
        if list.len() < 2 {
            return None;
        }
        let lat = list[0].as_f64()?;
        let lng = list[1].as_f64()?;
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        Some(Self::new(lat, lng))
    }

    /// Parses a GeoJSON-style `[lng, lat]` position.
    pub fn from_lng_lat(value: &Value) -> Option<Self> {
        let list = value.as_array()?;
        if list.len() < 2 {
            return None;
        }
        Some(Self::new(list[1].as_f64()?, list[0].as_f64()?))
    }

    /// Channel representation: `[lat, lng]`.
    pub fn to_value(&self) -> Value {
        json!([self.latitude, self.longitude])
    }

    /// GeoJSON position: `[lng, lat]`.
    pub fn to_position(&self) -> Vec<f64> {
        vec![self.longitude, self.latitude]
    }

    /// Great-circle distance in metres (haversine).
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_008.8;
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// An axis-aligned geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub southwest: LatLng,
    pub northeast: LatLng,
}

impl LatLngBounds {
    /// Smallest bounds containing every given point. `None` for an empty input.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a LatLng>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            southwest: *first,
            northeast: *first,
        };
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Grows the bounds to include `point`.
    pub fn extend(&mut self, point: &LatLng) {
        self.southwest.latitude = self.southwest.latitude.min(point.latitude);
        self.southwest.longitude = self.southwest.longitude.min(point.longitude);
        self.northeast.latitude = self.northeast.latitude.max(point.latitude);
        self.northeast.longitude = self.northeast.longitude.max(point.longitude);
    }

    /// Parses `[[lat, lng], [lat, lng]]`; the corners may come in any order.
    pub fn from_value(value: &Value) -> Option<Self> {
        let list = value.as_array()?;
        if list.len() < 2 {
            return None;
        }
        let a = LatLng::from_value(&list[0])?;
        let b = LatLng::from_value(&list[1])?;
        Self::from_points([a, b].iter())
    }

    pub fn to_value(&self) -> Value {
        json!([self.southwest.to_value(), self.northeast.to_value()])
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        point.latitude >= self.southwest.latitude
            && point.latitude <= self.northeast.latitude
            && point.longitude >= self.southwest.longitude
            && point.longitude <= self.northeast.longitude
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.southwest.latitude + self.northeast.latitude) / 2.0,
            (self.southwest.longitude + self.northeast.longitude) / 2.0,
        )
    }
}

/// Camera state of a map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub bearing: f64,
    pub target: LatLng,
    pub tilt: f64,
    pub zoom: f64,
}

impl Default for CameraPosition {
    fn default() -> Self {
        Self {
            bearing: 0.0,
            target: LatLng::new(0.0, 0.0),
            tilt: 0.0,
            zoom: 0.0,
        }
    }
}

impl CameraPosition {
    /// Parses `{bearing, target: [lat, lng], tilt, zoom}`. All four keys are required.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            bearing: map.get("bearing")?.as_f64()?,
            target: LatLng::from_value(map.get("target")?)?,
            tilt: map.get("tilt")?.as_f64()?,
            zoom: map.get("zoom")?.as_f64()?,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("bearing".into(), json!(self.bearing));
        map.insert("target".into(), self.target.to_value());
        map.insert("tilt".into(), json!(self.tilt));
        map.insert("zoom".into(), json!(self.zoom));
        Value::Object(map)
    }
}

/// A point in view-local logical pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in view-local logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ScreenRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn contains(&self, point: &ScreenPoint) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }

    /// A rect with no area selects nothing.
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

/// Padding, in logical pixels, kept free around fitted content.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgePadding {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl EdgePadding {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(padding: f64) -> Self {
        Self::new(padding, padding, padding, padding)
    }
}

/// Size of the map view in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width / 2.0, self.height / 2.0)
    }
}

/// How the camera follows the user location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    #[default]
    None,
    Tracking,
    TrackingCompass,
    TrackingGps,
}

impl TrackingMode {
    /// Maps the integer mode used on the channel.
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => TrackingMode::Tracking,
            2 => TrackingMode::TrackingCompass,
            3 => TrackingMode::TrackingGps,
            _ => TrackingMode::None,
        }
    }

    pub fn index(&self) -> i64 {
        match self {
            TrackingMode::None => 0,
            TrackingMode::Tracking => 1,
            TrackingMode::TrackingCompass => 2,
            TrackingMode::TrackingGps => 3,
        }
    }
}

/// A colour packed as `0xAARRGGBB`, the layout used on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Argb(pub u32);

impl Argb {
    /// Accepts any JSON integer; the upper bits of wider values are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(v) = value.as_i64() {
            return Some(Self(v as u32));
        }
        value.as_u64().map(|v| Self(v as u32))
    }

    /// `#RRGGBB`, alpha dropped.
    pub fn to_hex_rgb(&self) -> String {
        format!("#{:06X}", self.0 & 0x00FF_FFFF)
    }

    /// `rgba(r, g, b, a)` with alpha in `0..=1`.
    pub fn to_css_rgba(&self) -> String {
        let a = ((self.0 >> 24) & 0xFF) as f64 / 255.0;
        let r = (self.0 >> 16) & 0xFF;
        let g = (self.0 >> 8) & 0xFF;
        let b = self.0 & 0xFF;
        format!("rgba({}, {}, {}, {})", r, g, b, (a * 1000.0).round() / 1000.0)
    }
}
