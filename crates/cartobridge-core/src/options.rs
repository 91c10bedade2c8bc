//! Interpretation of map and annotation option maps.
//!
//! Option maps are partial: only the keys present are applied, unknown keys
//! are ignored, and a key with a value of the wrong type is skipped with a
//! debug log rather than failing the whole map.

use crate::types::{EdgePadding, LatLng, LatLngBounds, TrackingMode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

/// Map view options, as sent with `map#update` and at creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapOptions {
    /// `Some(None)` clears the bounds.
    pub camera_target_bounds: Option<Option<LatLngBounds>>,
    pub compass_enabled: Option<bool>,
    pub style_string: Option<String>,
    pub min_max_zoom: Option<(Option<f64>, Option<f64>)>,
    pub rotate_gestures_enabled: Option<bool>,
    pub scroll_gestures_enabled: Option<bool>,
    pub tilt_gestures_enabled: Option<bool>,
    pub zoom_gestures_enabled: Option<bool>,
    pub track_camera_position: Option<bool>,
    pub my_location_enabled: Option<bool>,
    pub my_location_tracking_mode: Option<TrackingMode>,
    pub compass_margins: Option<EdgePadding>,
    pub enable_logo: Option<bool>,
    pub enable_attribution: Option<bool>,
    pub language_code: Option<String>,
    pub language_enable: Option<bool>,
}

impl MapOptions {
    /// Reads every recognised key from an option map.
    pub fn from_value(value: &Value) -> Self {
        let mut options = MapOptions::default();
        let Some(map) = value.as_object() else {
            return options;
        };

        for (key, value) in map {
            match key.as_str() {
                "cameraTargetBounds" => {
                    // [bounds] or [null]
                    let bounds = value.as_array().and_then(|l| l.first()).unwrap_or(&Value::Null);
                    options.camera_target_bounds = Some(LatLngBounds::from_value(bounds));
                }
                "compassEnabled" => options.compass_enabled = flag(key, value),
                "styleString" => options.style_string = value.as_str().map(str::to_string),
                "minMaxZoomPreference" => {
                    if let Some(list) = value.as_array() {
                        let min = list.first().and_then(Value::as_f64);
                        let max = list.get(1).and_then(Value::as_f64);
                        options.min_max_zoom = Some((min, max));
                    }
                }
                "rotateGesturesEnabled" => options.rotate_gestures_enabled = flag(key, value),
                "scrollGesturesEnabled" => options.scroll_gestures_enabled = flag(key, value),
                "tiltGesturesEnabled" => options.tilt_gestures_enabled = flag(key, value),
                "zoomGesturesEnabled" => options.zoom_gestures_enabled = flag(key, value),
                "trackCameraPosition" => options.track_camera_position = flag(key, value),
                "myLocationEnabled" => options.my_location_enabled = flag(key, value),
                "myLocationTrackingMode" => {
                    options.my_location_tracking_mode = value.as_i64().map(TrackingMode::from_index)
                }
                "compassMargins" => {
                    if let Some(list) = value.as_array() {
                        let side = |i: usize| list.get(i).and_then(Value::as_f64).unwrap_or(0.0);
                        options.compass_margins = Some(EdgePadding::new(side(0), side(1), side(2), side(3)));
                    }
                }
                "enableLogo" => options.enable_logo = flag(key, value),
                "enableAttribution" => options.enable_attribution = flag(key, value),
                "languageCode" => options.language_code = value.as_str().map(str::to_string),
                "languageEnable" => options.language_enable = flag(key, value),
                other => debug!(key = other, "Ignoring unknown map option"),
            }
        }
        options
    }
}

fn flag(key: &str, value: &Value) -> Option<bool> {
    let parsed = value.as_bool();
    if parsed.is_none() {
        debug!(key, "Map option is not a bool");
    }
    parsed
}

/// Serde adapter for an optional `[lat, lng]` coordinate.
pub mod latlng_wire {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<LatLng>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(point) => [point.latitude, point.longitude].serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<LatLng>, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(LatLng::from_value))
    }
}

/// Serde adapter for an optional list of `[lat, lng]` coordinates.
pub mod latlng_list_wire {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Vec<LatLng>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(points) => points
                .iter()
                .map(|p| [p.latitude, p.longitude])
                .collect::<Vec<_>>()
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<LatLng>>, D::Error> {
        let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
        Ok(raw.map(|list| list.iter().filter_map(LatLng::from_value).collect()))
    }
}

/// Partial annotation options that can be layered over earlier values.
pub trait AnnotationOptions: Default + Clone + Serialize + DeserializeOwned {
    /// Overwrites every field that `patch` sets.
    fn merge(&mut self, patch: Self);

    /// Parses an option map, keeping the keys that have the right type.
    fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        let mut options = Self::default();
        for (key, field) in map {
            let mut single = Map::new();
            single.insert(key.clone(), field.clone());
            match serde_json::from_value::<Self>(Value::Object(single)) {
                Ok(patch) => options.merge(patch),
                Err(e) => debug!(key = %key, error = %e, "Skipping annotation option"),
            }
        }
        options
    }

    /// Renders the set fields back into a property map.
    fn to_properties(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

macro_rules! merge_fields {
    ($self:ident, $patch:ident, $($field:ident),+ $(,)?) => {
        $(
            if $patch.$field.is_some() {
                $self.$field = $patch.$field;
            }
        )+
    };
}

/// Symbol annotation options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SymbolOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_rotate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_offset: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_halo_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_halo_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_halo_blur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_max_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_letter_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_justify: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_rotate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_transform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_offset: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_halo_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_halo_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_halo_blur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", with = "latlng_wire")]
    pub geometry: Option<LatLng>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
}

impl AnnotationOptions for SymbolOptions {
    fn merge(&mut self, patch: Self) {
        merge_fields!(
            self,
            patch,
            icon_size,
            icon_image,
            icon_rotate,
            icon_offset,
            icon_anchor,
            icon_opacity,
            icon_color,
            icon_halo_color,
            icon_halo_width,
            icon_halo_blur,
            text_field,
            text_size,
            text_max_width,
            text_letter_spacing,
            text_justify,
            text_anchor,
            text_rotate,
            text_transform,
            text_offset,
            text_opacity,
            text_color,
            text_halo_color,
            text_halo_width,
            text_halo_blur,
            geometry,
            z_index,
            draggable,
        );
    }
}

/// Circle annotation options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CircleOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_blur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_stroke_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_stroke_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", with = "latlng_wire")]
    pub geometry: Option<LatLng>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
}

impl AnnotationOptions for CircleOptions {
    fn merge(&mut self, patch: Self) {
        merge_fields!(
            self,
            patch,
            circle_radius,
            circle_color,
            circle_blur,
            circle_opacity,
            circle_stroke_width,
            circle_stroke_color,
            circle_stroke_opacity,
            geometry,
            draggable,
        );
    }
}

/// Line annotation options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_join: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_gap_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_blur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "latlng_list_wire")]
    pub geometry: Option<Vec<LatLng>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
}

impl AnnotationOptions for LineOptions {
    fn merge(&mut self, patch: Self) {
        merge_fields!(
            self,
            patch,
            line_join,
            line_opacity,
            line_color,
            line_width,
            line_gap_width,
            line_offset,
            line_blur,
            line_pattern,
            geometry,
            draggable,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_options_partial() {
        let options = MapOptions::from_value(&json!({
            "compassEnabled": false,
            "trackCameraPosition": true,
            "minMaxZoomPreference": [3.0, null],
            "myLocationTrackingMode": 2,
            "somethingElse": 1,
        }));
        assert_eq!(options.compass_enabled, Some(false));
        assert_eq!(options.track_camera_position, Some(true));
        assert_eq!(options.min_max_zoom, Some((Some(3.0), None)));
        assert_eq!(options.my_location_tracking_mode, Some(TrackingMode::TrackingCompass));
        assert!(options.style_string.is_none());
    }

    #[test]
    fn test_camera_target_bounds_clear() {
        let options = MapOptions::from_value(&json!({"cameraTargetBounds": [null]}));
        assert_eq!(options.camera_target_bounds, Some(None));

        let options = MapOptions::from_value(&json!({"cameraTargetBounds": [[[0.0, 0.0], [1.0, 1.0]]]}));
        assert!(matches!(options.camera_target_bounds, Some(Some(_))));
    }

    #[test]
    fn test_wrong_typed_flag_is_skipped() {
        let options = MapOptions::from_value(&json!({"compassEnabled": "yes"}));
        assert_eq!(options.compass_enabled, None);
    }

    #[test]
    fn test_symbol_options_merge() {
        let mut options = SymbolOptions::from_value(&json!({
            "iconImage": "airport-15",
            "geometry": [1.0, 2.0],
            "iconSize": "huge",
        }));
        assert_eq!(options.icon_image.as_deref(), Some("airport-15"));
        assert_eq!(options.geometry, Some(LatLng::new(1.0, 2.0)));
        assert_eq!(options.icon_size, None);

        options.merge(SymbolOptions::from_value(&json!({"textField": "hi"})));
        assert_eq!(options.icon_image.as_deref(), Some("airport-15"));
        assert_eq!(options.text_field.as_deref(), Some("hi"));

        let props = options.to_properties();
        assert_eq!(props["geometry"], json!([1.0, 2.0]));
        assert!(!props.contains_key("iconSize"));
    }

    #[test]
    fn test_line_geometry() {
        let options = LineOptions::from_value(&json!({
            "geometry": [[0.0, 0.0], [1.0, 1.0]],
            "lineWidth": 4,
        }));
        assert_eq!(options.geometry.as_ref().map(Vec::len), Some(2));
        assert_eq!(options.line_width, Some(4.0));
    }
}
