//! Style model: sources, layers, images and the `Style` trait a backend implements.
//!
//! Layers are described the way the style specification describes them, with
//! `paint` and `layout` properties as raw JSON values, so that expressions
//! built with [`crate::expr`] pass through untouched.

use cartobridge_core::error::MapError;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// TileJSON version advertised by vector sources.
pub const TILEJSON_VERSION: &str = "2.1.0";

/// Source drawn by the user-location component.
pub const LOCATION_SOURCE: &str = "mapbox-location-source";
/// Bottom layer of the user-location component.
pub const LOCATION_SHADOW_LAYER: &str = "mapbox-location-shadow-layer";
/// Top layer of the user-location component.
pub const LOCATION_FOREGROUND_LAYER: &str = "mapbox-location-foreground-layer";

/// Id prefix of the layers that draw host symbol annotations.
pub const ANNOTATION_SYMBOL_LAYER_PREFIX: &str = "cartobridge-symbol-layer";
/// Id prefix of the layers that draw host circle annotations.
pub const ANNOTATION_CIRCLE_LAYER_PREFIX: &str = "cartobridge-circle-layer";
/// Id prefix of the layers that draw host line annotations.
pub const ANNOTATION_LINE_LAYER_PREFIX: &str = "cartobridge-line-layer";

/// A data source in the style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    Vector {
        tilejson: String,
        tiles: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_zoom: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_zoom: Option<f64>,
    },
    #[serde(rename = "geojson")]
    GeoJson { data: FeatureCollection },
}

impl SourceSpec {
    /// A vector tile source with one tile URL template.
    pub fn vector_tiles(template: impl Into<String>) -> Self {
        SourceSpec::Vector {
            tilejson: TILEJSON_VERSION.to_string(),
            tiles: vec![template.into()],
            min_zoom: None,
            max_zoom: None,
        }
    }

    pub fn geojson(data: FeatureCollection) -> Self {
        SourceSpec::GeoJson { data }
    }

    /// An empty GeoJSON source.
    pub fn empty_geojson() -> Self {
        Self::geojson(FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Vector { .. } => "vector",
            SourceSpec::GeoJson { .. } => "geojson",
        }
    }
}

/// Layer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    Circle,
    Symbol,
    Heatmap,
    Line,
    Fill,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Background => "background",
            LayerKind::Circle => "circle",
            LayerKind::Symbol => "symbol",
            LayerKind::Heatmap => "heatmap",
            LayerKind::Line => "line",
            LayerKind::Fill => "fill",
        };
        f.write_str(name)
    }
}

/// A style layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "source-layer", default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    #[serde(rename = "minzoom", default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<f64>,
    #[serde(rename = "maxzoom", default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub paint: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, kind: LayerKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: Some(source.into()),
            source_layer: None,
            min_zoom: None,
            max_zoom: None,
            filter: None,
            paint: Map::new(),
            layout: Map::new(),
        }
    }

    pub fn circle(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, LayerKind::Circle, source)
    }

    pub fn symbol(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, LayerKind::Symbol, source)
    }

    pub fn heatmap(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, LayerKind::Heatmap, source)
    }

    pub fn line(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(id, LayerKind::Line, source)
    }

    /// A background layer, which has no source.
    pub fn background(id: impl Into<String>) -> Self {
        Self {
            source: None,
            ..Self::new(id, LayerKind::Background, "")
        }
    }

    pub fn source_layer(mut self, source_layer: impl Into<String>) -> Self {
        self.source_layer = Some(source_layer.into());
        self
    }

    pub fn max_zoom(mut self, zoom: f64) -> Self {
        self.max_zoom = Some(zoom);
        self
    }

    pub fn min_zoom(mut self, zoom: f64) -> Self {
        self.min_zoom = Some(zoom);
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn paint(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.paint.insert(name.to_string(), value.into());
        self
    }

    pub fn layout(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.layout.insert(name.to_string(), value.into());
        self
    }

    /// Whether the layer draws at `zoom` (min inclusive, max exclusive).
    pub fn visible_at(&self, zoom: f64) -> bool {
        if self.layout.get("visibility").and_then(Value::as_str) == Some("none") {
            return false;
        }
        self.min_zoom.map_or(true, |min| zoom >= min) && self.max_zoom.map_or(true, |max| zoom < max)
    }
}

/// Where a new layer goes in the draw order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerPosition {
    /// Drawn last, on top of everything.
    Top,
    /// Drawn directly below the named layer.
    Below(String),
    /// Drawn directly above the named layer.
    Above(String),
}

/// A bitmap registered with the style under a name.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleImage {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub sdf: bool,
    /// Premultiplied RGBA, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl StyleImage {
    /// A solid-colour square, used for stock markers.
    pub fn solid(size: u32, rgba: [u8; 4]) -> Self {
        let data = rgba.iter().copied().cycle().take((size * size * 4) as usize).collect();
        Self {
            width: size,
            height: size,
            pixel_ratio: 1.0,
            sdf: false,
            data,
        }
    }
}

/// A loaded map style.
///
/// Implementations keep layers in draw order. The mutating methods report
/// conflicts instead of silently overwriting; use [`crate::overlay`] for
/// idempotent creation.
pub trait Style: Send {
    /// Style name as reported by the backend, used to detect reloads.
    fn name(&self) -> &str;

    fn url(&self) -> &str;

    fn source_ids(&self) -> Vec<String>;

    fn has_source(&self, id: &str) -> bool;

    fn source(&self, id: &str) -> Option<&SourceSpec>;

    /// Fails with [`MapError::SourceExists`] when the id is taken.
    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), MapError>;

    /// Replaces the data of a GeoJSON source.
    fn set_geojson(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError>;

    /// Returns `Ok(false)` when no such source exists.
    fn remove_source(&mut self, id: &str) -> Result<bool, MapError>;

    /// Layer ids in draw order, bottom first.
    fn layer_ids(&self) -> Vec<String>;

    fn has_layer(&self, id: &str) -> bool;

    fn layer(&self, id: &str) -> Option<&LayerSpec>;

    /// Fails when the id is taken, the source is missing or the
    /// relative position names a layer that does not exist.
    fn add_layer(&mut self, layer: LayerSpec, position: LayerPosition) -> Result<(), MapError>;

    fn remove_layer(&mut self, id: &str) -> bool;

    fn has_image(&self, name: &str) -> bool;

    fn add_image(&mut self, name: &str, image: StyleImage);

    fn remove_image(&mut self, name: &str) -> bool;
}
