//! Symbol, circle and line annotations.
//!
//! Each kind keeps its own ordered set with generated ids (`symbol_1`,
//! `circle_1`, ...) and is drawn through one GeoJSON source and one
//! data-driven layer: every option becomes a feature property and the layer
//! reads it back with a `["get", name]` expression. A new style drops the
//! source and layer, so [`AnnotationManager::render`] runs after every style
//! load.

use cartobridge_core::error::MapError;
use cartobridge_core::options::{AnnotationOptions, CircleOptions, LineOptions, SymbolOptions};
use cartobridge_core::types::LatLng;
use cartobridge_map::expr::get;
use cartobridge_map::overlay::{add_layer_if_absent, add_source_id_if_absent};
use cartobridge_map::style::{
    LayerPosition, LayerSpec, SourceSpec, Style, ANNOTATION_CIRCLE_LAYER_PREFIX, ANNOTATION_LINE_LAYER_PREFIX,
    ANNOTATION_SYMBOL_LAYER_PREFIX,
};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value as GeoValue};
use serde_json::{json, Value};
use tracing::debug;

/// Feature property holding the annotation id.
pub const ID_PROPERTY: &str = "id";

/// `(style property, option key)` pairs for symbol layers.
const SYMBOL_LAYOUT: &[(&str, &str)] = &[
    ("icon-size", "iconSize"),
    ("icon-image", "iconImage"),
    ("icon-rotate", "iconRotate"),
    ("icon-offset", "iconOffset"),
    ("icon-anchor", "iconAnchor"),
    ("text-field", "textField"),
    ("text-size", "textSize"),
    ("text-max-width", "textMaxWidth"),
    ("text-letter-spacing", "textLetterSpacing"),
    ("text-justify", "textJustify"),
    ("text-anchor", "textAnchor"),
    ("text-rotate", "textRotate"),
    ("text-transform", "textTransform"),
    ("text-offset", "textOffset"),
    ("symbol-sort-key", "zIndex"),
];

const SYMBOL_PAINT: &[(&str, &str)] = &[
    ("icon-opacity", "iconOpacity"),
    ("icon-color", "iconColor"),
    ("icon-halo-color", "iconHaloColor"),
    ("icon-halo-width", "iconHaloWidth"),
    ("icon-halo-blur", "iconHaloBlur"),
    ("text-opacity", "textOpacity"),
    ("text-color", "textColor"),
    ("text-halo-color", "textHaloColor"),
    ("text-halo-width", "textHaloWidth"),
    ("text-halo-blur", "textHaloBlur"),
];

const CIRCLE_PAINT: &[(&str, &str)] = &[
    ("circle-radius", "circleRadius"),
    ("circle-color", "circleColor"),
    ("circle-blur", "circleBlur"),
    ("circle-opacity", "circleOpacity"),
    ("circle-stroke-width", "circleStrokeWidth"),
    ("circle-stroke-color", "circleStrokeColor"),
    ("circle-stroke-opacity", "circleStrokeOpacity"),
];

const LINE_LAYOUT: &[(&str, &str)] = &[("line-join", "lineJoin")];

const LINE_PAINT: &[(&str, &str)] = &[
    ("line-opacity", "lineOpacity"),
    ("line-color", "lineColor"),
    ("line-width", "lineWidth"),
    ("line-gap-width", "lineGapWidth"),
    ("line-offset", "lineOffset"),
    ("line-blur", "lineBlur"),
    ("line-pattern", "linePattern"),
];

/// An annotation kind with its own id space, source and layer.
pub trait AnnotationKind: AnnotationOptions {
    /// Namespace on the channel and id prefix, e.g. `"symbol"`.
    const NAME: &'static str;

    const LAYER_PREFIX: &'static str;

    fn geometry(&self) -> Option<Geometry>;

    /// The data-driven layer drawing this kind.
    fn layer(id: &str, source: &str) -> LayerSpec;

    fn set(manager: &AnnotationManager) -> &AnnotationSet<Self>;

    fn set_mut(manager: &mut AnnotationManager) -> &mut AnnotationSet<Self>;

    fn layer_id() -> String {
        format!("{}-1", Self::LAYER_PREFIX)
    }

    fn source_id() -> String {
        format!("cartobridge-{}-source-1", Self::NAME)
    }
}

fn data_driven(mut layer: LayerSpec, layout: &[(&str, &str)], paint: &[(&str, &str)]) -> LayerSpec {
    for (property, key) in layout {
        layer = layer.layout(property, get(key));
    }
    for (property, key) in paint {
        layer = layer.paint(property, get(key));
    }
    layer
}

fn point(position: &Option<LatLng>) -> Option<Geometry> {
    position.map(|p| Geometry::new(GeoValue::Point(p.to_position())))
}

impl AnnotationKind for SymbolOptions {
    const NAME: &'static str = "symbol";
    const LAYER_PREFIX: &'static str = ANNOTATION_SYMBOL_LAYER_PREFIX;

    fn geometry(&self) -> Option<Geometry> {
        point(&self.geometry)
    }

    fn layer(id: &str, source: &str) -> LayerSpec {
        data_driven(LayerSpec::symbol(id, source), SYMBOL_LAYOUT, SYMBOL_PAINT)
            .layout("icon-allow-overlap", true)
            .layout("text-allow-overlap", true)
    }

    fn set(manager: &AnnotationManager) -> &AnnotationSet<Self> {
        &manager.symbols
    }

    fn set_mut(manager: &mut AnnotationManager) -> &mut AnnotationSet<Self> {
        &mut manager.symbols
    }
}

impl AnnotationKind for CircleOptions {
    const NAME: &'static str = "circle";
    const LAYER_PREFIX: &'static str = ANNOTATION_CIRCLE_LAYER_PREFIX;

    fn geometry(&self) -> Option<Geometry> {
        point(&self.geometry)
    }

    fn layer(id: &str, source: &str) -> LayerSpec {
        data_driven(LayerSpec::circle(id, source), &[], CIRCLE_PAINT)
    }

    fn set(manager: &AnnotationManager) -> &AnnotationSet<Self> {
        &manager.circles
    }

    fn set_mut(manager: &mut AnnotationManager) -> &mut AnnotationSet<Self> {
        &mut manager.circles
    }
}

impl AnnotationKind for LineOptions {
    const NAME: &'static str = "line";
    const LAYER_PREFIX: &'static str = ANNOTATION_LINE_LAYER_PREFIX;

    fn geometry(&self) -> Option<Geometry> {
        let points = self.geometry.as_ref()?;
        if points.len() < 2 {
            return None;
        }
        Some(Geometry::new(GeoValue::LineString(
            points.iter().map(LatLng::to_position).collect(),
        )))
    }

    fn layer(id: &str, source: &str) -> LayerSpec {
        data_driven(LayerSpec::line(id, source), LINE_LAYOUT, LINE_PAINT)
    }

    fn set(manager: &AnnotationManager) -> &AnnotationSet<Self> {
        &manager.lines
    }

    fn set_mut(manager: &mut AnnotationManager) -> &mut AnnotationSet<Self> {
        &mut manager.lines
    }
}

/// Ordered annotations of one kind.
#[derive(Debug, Clone)]
pub struct AnnotationSet<O> {
    entries: Vec<(String, O)>,
    next_id: u64,
}

impl<O> Default for AnnotationSet<O> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl<O: AnnotationKind> AnnotationSet<O> {
    /// Stores `options` under a fresh id and returns it.
    pub fn add(&mut self, options: O) -> String {
        let id = format!("{}_{}", O::NAME, self.next_id);
        self.next_id += 1;
        self.entries.push((id.clone(), options));
        id
    }

    /// Merges `patch` into an existing annotation.
    pub fn update(&mut self, id: &str, patch: O) -> bool {
        match self.entries.iter_mut().find(|(key, _)| key == id) {
            Some((_, options)) => {
                options.merge(patch);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| key != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn get(&self, id: &str) -> Option<&O> {
        self.entries.iter().find(|(key, _)| key == id).map(|(_, options)| options)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One feature per annotation that has a geometry, in insertion order.
    pub fn feature_collection(&self) -> FeatureCollection {
        let features = self
            .entries
            .iter()
            .filter_map(|(id, options)| {
                let geometry = options.geometry()?;
                let mut properties = options.to_properties();
                properties.remove("geometry");
                properties.insert(ID_PROPERTY.to_string(), json!(id));
                Some(Feature {
                    bbox: None,
                    geometry: Some(geometry),
                    id: Some(Id::String(id.clone())),
                    properties: Some(properties),
                    foreign_members: None,
                })
            })
            .collect();
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    /// Makes sure the source and layer exist, then replaces the source data.
    pub fn sync(&self, style: &mut dyn Style) -> Result<(), MapError> {
        let source = O::source_id();
        add_source_id_if_absent(style, &source, SourceSpec::empty_geojson())?;
        add_layer_if_absent(style, O::layer(&O::layer_id(), &source), LayerPosition::Top)?;
        style.set_geojson(&source, self.feature_collection())
    }
}

/// All annotations of one map.
#[derive(Debug, Clone, Default)]
pub struct AnnotationManager {
    symbols: AnnotationSet<SymbolOptions>,
    circles: AnnotationSet<CircleOptions>,
    lines: AnnotationSet<LineOptions>,
}

impl AnnotationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<O: AnnotationKind>(&self) -> &AnnotationSet<O> {
        O::set(self)
    }

    pub fn set_mut<O: AnnotationKind>(&mut self) -> &mut AnnotationSet<O> {
        O::set_mut(self)
    }

    /// Draws every kind into `style`; lines lowest, symbols on top.
    pub fn render(&self, style: &mut dyn Style) -> Result<(), MapError> {
        self.lines.sync(style)?;
        self.circles.sync(style)?;
        self.symbols.sync(style)?;
        debug!(
            symbols = self.symbols.len(),
            circles = self.circles.len(),
            lines = self.lines.len(),
            "Annotations rendered"
        );
        Ok(())
    }

    /// Layer ids to hit-test for taps, topmost first.
    pub fn layer_ids(&self) -> Vec<String> {
        vec![
            SymbolOptions::layer_id(),
            CircleOptions::layer_id(),
            LineOptions::layer_id(),
        ]
    }

    /// The tap event for a rendered annotation feature, if it is one of ours.
    pub fn tap_event(&self, feature: &Feature) -> Option<(String, Value)> {
        let id = feature.property(ID_PROPERTY).and_then(Value::as_str)?;
        if self.symbols.contains(id) {
            Some(tap::<SymbolOptions>(id))
        } else if self.circles.contains(id) {
            Some(tap::<CircleOptions>(id))
        } else if self.lines.contains(id) {
            Some(tap::<LineOptions>(id))
        } else {
            None
        }
    }
}

fn tap<O: AnnotationKind>(id: &str) -> (String, Value) {
    let mut args = serde_json::Map::new();
    args.insert(O::NAME.to_string(), json!(id));
    (format!("{}#onTap", O::NAME), Value::Object(args))
}
