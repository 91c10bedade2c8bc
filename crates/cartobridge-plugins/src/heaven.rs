//! `heaven_map`: vector-tile data overlays.
//!
//! Each data model becomes one vector source (`source-heaven-<id>`) and one
//! layer (`layer-heaven-<id>`). The layer kind follows the model's source
//! layer: `poi` draws a heatmap with a companion circle layer, a source layer
//! with a stock icon draws symbols, anything else draws plain circles.

use cartobridge_core::error::{ArgumentError, MapError, CODE_MAP_ERROR};
use cartobridge_core::types::Argb;
use cartobridge_core::{Args, MethodCall, MethodResult};
use cartobridge_map::expr::{get, heatmap_density, interpolate_linear, rgba, zoom};
use cartobridge_map::overlay::{
    add_layer_if_absent, add_source_if_absent, last_layer_with_prefix, remove_overlay, StyleKey, StyleKeyError,
};
use cartobridge_map::style::{LayerPosition, LayerSpec, SourceSpec, Style, StyleImage, ANNOTATION_SYMBOL_LAYER_PREFIX};
use cartobridge_plugin_api::{Dispatch, MapPlugin, PluginBuilder, PluginContext, PluginError, PluginResult};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const PLUGIN_NAME: &str = "heaven_map";

/// Marker image registered on every style load.
pub const MARKER_IMAGE: &str = "hyn-marker-image";

const NAMESPACE: &str = "heaven";
const CIRCLE_NAMESPACE: &str = "heaven_circle";
const DEFAULT_SOURCE_LAYER: &str = "heaven";
const HEATMAP_SOURCE_LAYER: &str = "poi";
const HEATMAP_MAX_ZOOM: f64 = 18.0;

/// Source layers drawn with a stock icon, and the icon colour.
const ICON_SOURCE_LAYERS: &[(&str, [u8; 4])] = &[("police", [30, 90, 200, 255]), ("embassy", [200, 40, 40, 255])];

/// One data overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct HeavenDataModel {
    pub id: String,
    pub source_url: String,
    pub source_layer: String,
    pub color: Argb,
}

impl HeavenDataModel {
    /// Parses `{id, sourceUrl, sourceLayer?, color}`.
    pub fn from_value(value: &Value) -> Result<Self, ArgumentError> {
        let args = Args::new(value);
        let color = args.value("color")?;
        Ok(Self {
            id: args.str("id")?.to_string(),
            source_url: args.str("sourceUrl")?.to_string(),
            source_layer: args.opt_str("sourceLayer").unwrap_or(DEFAULT_SOURCE_LAYER).to_string(),
            color: Argb::from_value(color).ok_or_else(|| ArgumentError::wrong_type("color", "ARGB integer"))?,
        })
    }

    fn icon(&self) -> Result<Option<(String, [u8; 4])>, StyleKeyError> {
        let Some((name, rgba)) = ICON_SOURCE_LAYERS.iter().find(|(name, _)| *name == self.source_layer) else {
            return Ok(None);
        };
        Ok(Some((StyleKey::layer(NAMESPACE, *name)?.to_string(), *rgba)))
    }
}

/// Derived style ids of one data model.
struct HeavenKeys {
    source: StyleKey,
    layer: String,
    circle: String,
}

impl HeavenKeys {
    fn new(id: &str) -> Result<Self, StyleKeyError> {
        Ok(Self {
            source: StyleKey::source(NAMESPACE, id)?,
            layer: StyleKey::layer(NAMESPACE, id)?.to_string(),
            circle: StyleKey::layer(CIRCLE_NAMESPACE, id)?.to_string(),
        })
    }
}

/// Adds the source and layers of `model`. Objects already present are kept.
pub fn add_data(style: &mut dyn Style, model: &HeavenDataModel) -> Result<(), MapError> {
    let keys = HeavenKeys::new(&model.id)?;
    let source_id = keys.source.to_string();
    add_source_if_absent(style, &keys.source, SourceSpec::vector_tiles(&model.source_url))?;

    let anchor = last_layer_with_prefix(style, ANNOTATION_SYMBOL_LAYER_PREFIX);
    let below = anchor.clone().map_or(LayerPosition::Top, LayerPosition::Below);
    let above = anchor.map_or(LayerPosition::Top, LayerPosition::Above);

    if model.source_layer == HEATMAP_SOURCE_LAYER {
        add_layer_if_absent(style, heatmap_layer(&keys.layer, &source_id, &model.source_layer), above)?;
        let circle = poi_circle_layer(&keys.circle, &source_id, &model.source_layer);
        add_layer_if_absent(style, circle, LayerPosition::Below(keys.layer))?;
    } else if let Some((icon, rgba)) = model.icon()? {
        if !style.has_image(&icon) {
            style.add_image(&icon, StyleImage::solid(32, rgba));
        }
        let layer = LayerSpec::symbol(&keys.layer, &source_id)
            .source_layer(&model.source_layer)
            .layout("icon-image", icon);
        add_layer_if_absent(style, layer, below)?;
    } else {
        let layer = LayerSpec::circle(&keys.layer, &source_id)
            .source_layer(&model.source_layer)
            .paint("circle-radius", 8.0)
            .paint("circle-color", model.color.to_hex_rgb())
            .paint("circle-stroke-color", "#ffffff")
            .paint("circle-stroke-width", 2.0)
            .paint("circle-stroke-opacity", 0.8)
            .paint("circle-pitch-alignment", "map");
        add_layer_if_absent(style, layer, below)?;
    }
    debug!(id = %model.id, source_layer = %model.source_layer, "Heaven data added");
    Ok(())
}

/// Removes every layer a model with `id` may have added, then its source.
pub fn remove_data(style: &mut dyn Style, id: &str) -> Result<usize, MapError> {
    let keys = HeavenKeys::new(id)?;
    remove_overlay(style, &[keys.circle, keys.layer], Some(&keys.source.to_string()))
}

fn heatmap_layer(id: &str, source: &str, source_layer: &str) -> LayerSpec {
    let ramp = [
        (0.0, rgba(33, 102, 172, 0.0)),
        (0.2, rgba(103, 169, 207, 1.0)),
        (0.4, rgba(209, 229, 240, 1.0)),
        (0.6, rgba(253, 219, 199, 1.0)),
        (0.8, rgba(239, 138, 98, 1.0)),
        (1.0, rgba(178, 24, 43, 1.0)),
    ];
    LayerSpec::heatmap(id, source)
        .source_layer(source_layer)
        .max_zoom(HEATMAP_MAX_ZOOM)
        .paint("heatmap-color", interpolate_linear(heatmap_density(), ramp))
        .paint("heatmap-weight", interpolate_linear(get("mag"), [(0.0, 0), (6.0, 1)]))
        .paint("heatmap-intensity", interpolate_linear(zoom(), [(0.0, 1), (18.0, 3)]))
        .paint("heatmap-radius", interpolate_linear(zoom(), [(0.0, 2), (18.0, 20)]))
        .paint("heatmap-opacity", interpolate_linear(zoom(), [(7.0, 1), (18.0, 0)]))
}

fn poi_circle_layer(id: &str, source: &str, source_layer: &str) -> LayerSpec {
    let radius = interpolate_linear(
        zoom(),
        [
            (7.0, interpolate_linear(get("mag"), [(1.0, 1), (6.0, 4)])),
            (16.0, interpolate_linear(get("mag"), [(1.0, 5), (6.0, 50)])),
        ],
    );
    let color = interpolate_linear(
        get("mag"),
        [
            (1.0, rgba(33, 102, 172, 0.0)),
            (2.0, rgba(103, 169, 207, 1.0)),
            (3.0, rgba(209, 229, 240, 1.0)),
            (4.0, rgba(253, 219, 199, 1.0)),
            (5.0, rgba(239, 138, 98, 1.0)),
            (6.0, rgba(178, 24, 43, 1.0)),
        ],
    );
    LayerSpec::circle(id, source)
        .source_layer(source_layer)
        .paint("circle-radius", radius)
        .paint("circle-color", color)
        .paint("circle-opacity", interpolate_linear(zoom(), [(7.0, 0), (8.0, 1)]))
        .paint("circle-stroke-color", "white")
        .paint("circle-stroke-width", 1.0)
}

/// Collects seed models before the plugin is built.
#[derive(Debug, Default)]
pub struct HeavenMapBuilder {
    models: Vec<HeavenDataModel>,
}

impl HeavenMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `model`, replacing a seed with the same id.
    pub fn add_data(&mut self, model: HeavenDataModel) {
        upsert(&mut self.models, model);
    }

    pub fn remove_data(&mut self, id: &str) {
        self.models.retain(|m| m.id != id);
    }

    pub fn models(&self) -> &[HeavenDataModel] {
        &self.models
    }
}

impl PluginBuilder for HeavenMapBuilder {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    /// Accepts `{"models": [model, ...]}`.
    fn interpret_options(&mut self, options: &Value) -> PluginResult<()> {
        let Some(models) = options.get("models") else {
            return Ok(());
        };
        let models = models
            .as_array()
            .ok_or_else(|| PluginError::invalid_options(PLUGIN_NAME, "'models' must be a list"))?;
        for value in models {
            let model = HeavenDataModel::from_value(value)
                .map_err(|e| PluginError::invalid_options(PLUGIN_NAME, e.to_string()))?;
            self.add_data(model);
        }
        Ok(())
    }

    fn build(&mut self) -> PluginResult<Box<dyn MapPlugin>> {
        Ok(Box::new(HeavenMapPlugin::new(self.models.clone())))
    }
}

/// Live `heaven_map` plugin.
///
/// Keeps the set of active models and re-applies it after every style load,
/// since a new style starts without custom sources.
#[derive(Debug)]
pub struct HeavenMapPlugin {
    models: Vec<HeavenDataModel>,
}

impl HeavenMapPlugin {
    pub fn new(models: Vec<HeavenDataModel>) -> Self {
        Self { models }
    }

    pub fn models(&self) -> &[HeavenDataModel] {
        &self.models
    }

    fn handle_add(&mut self, ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) {
        let model = match call.args().value("model").and_then(HeavenDataModel::from_value) {
            Ok(model) => model,
            Err(e) => {
                debug!(error = %e, "Ignoring heaven_map#addData");
                reply.success(json!("heaven_map#addData"));
                return;
            }
        };
        let result = match ctx.view.style_mut() {
            Some(style) => add_data(style, &model),
            None => Err(MapError::StyleNotLoaded),
        };
        match result {
            Ok(()) => {
                // The map keeps the first model added under an id.
                if !self.models.iter().any(|m| m.id == model.id) {
                    self.models.push(model);
                }
                reply.success(json!("heaven_map#addData"));
            }
            Err(e) => {
                warn!(id = %model.id, error = %e, "Failed to add heaven data");
                reply.error(CODE_MAP_ERROR, e.to_string());
            }
        }
    }

    fn handle_remove(&mut self, ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) {
        if let Ok(id) = call.args().str("id") {
            self.models.retain(|m| m.id != id);
            if let Some(style) = ctx.view.style_mut() {
                if let Err(e) = remove_data(style, id) {
                    warn!(id, error = %e, "Failed to remove heaven data");
                    reply.error(CODE_MAP_ERROR, e.to_string());
                    return;
                }
            }
        }
        reply.success(json!("heaven_map#removeData"));
    }
}

impl MapPlugin for HeavenMapPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn on_style_loaded(&mut self, ctx: &mut PluginContext<'_>) -> PluginResult<()> {
        let style = ctx.view.style_mut().ok_or(MapError::StyleNotLoaded)?;
        info!(map = %ctx.map_id, style = style.url(), models = self.models.len(), "Applying heaven data");
        for model in &self.models {
            add_data(style, model)?;
        }
        if !style.has_image(MARKER_IMAGE) {
            style.add_image(MARKER_IMAGE, StyleImage::solid(48, [255, 87, 34, 255]));
        }
        Ok(())
    }

    fn on_method_call(&mut self, ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) -> Dispatch {
        match call.method.as_str() {
            "heaven_map#addData" => self.handle_add(ctx, call, reply),
            "heaven_map#removeData" => self.handle_remove(ctx, call, reply),
            _ => return Dispatch::Unclaimed(reply),
        }
        Dispatch::Claimed
    }
}

fn upsert(models: &mut Vec<HeavenDataModel>, model: HeavenDataModel) {
    match models.iter_mut().find(|m| m.id == model.id) {
        Some(existing) => *existing = model,
        None => models.push(model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartobridge_core::types::ViewportSize;
    use cartobridge_core::{AppConfig, MapId};
    use cartobridge_map::headless::HeadlessStyle;
    use cartobridge_map::{HeadlessMap, LayerKind, MapView};

    fn model(id: &str, source_layer: Option<&str>) -> HeavenDataModel {
        let mut value = json!({"id": id, "sourceUrl": "https://tiles.example.org/{z}/{x}/{y}.pbf", "color": 0xFF2196F3u32});
        if let Some(layer) = source_layer {
            value["sourceLayer"] = json!(layer);
        }
        HeavenDataModel::from_value(&value).unwrap()
    }

    fn style_with_anchor() -> HeadlessStyle {
        let mut style = HeadlessStyle::new("test://style");
        style.add_source("annotations", SourceSpec::empty_geojson()).unwrap();
        style
            .add_layer(LayerSpec::symbol("cartobridge-symbol-layer-1", "annotations"), LayerPosition::Top)
            .unwrap();
        style
    }

    #[test]
    fn test_model_defaults() {
        let model = model("a", None);
        assert_eq!(model.source_layer, "heaven");
        assert_eq!(model.color.to_hex_rgb(), "#2196F3");
        assert!(HeavenDataModel::from_value(&json!({"id": "a"})).is_err());
    }

    #[test]
    fn test_add_is_idempotent_and_remove_inverts() {
        let mut style = style_with_anchor();
        let before = style.layer_ids();
        let police = model("police", Some("police"));

        add_data(&mut style, &police).unwrap();
        let once = style.layer_ids();
        add_data(&mut style, &police).unwrap();
        assert_eq!(style.layer_ids(), once);
        assert_eq!(
            once,
            vec!["layer-heaven-police", "cartobridge-symbol-layer-1"],
            "data layers go below the annotation layer"
        );
        assert!(style.has_image("layer-heaven-police"));

        assert_eq!(remove_data(&mut style, "police").unwrap(), 2);
        assert_eq!(style.layer_ids(), before);
        assert!(!style.has_source("source-heaven-police"));
        assert_eq!(remove_data(&mut style, "police").unwrap(), 0);
    }

    #[test]
    fn test_poi_draws_heatmap_above_anchor() {
        let mut style = style_with_anchor();
        add_data(&mut style, &model("hot", Some("poi"))).unwrap();
        assert_eq!(
            style.layer_ids(),
            vec!["cartobridge-symbol-layer-1", "layer-heaven_circle-hot", "layer-heaven-hot"]
        );
        let heatmap = style.layer("layer-heaven-hot").unwrap();
        assert_eq!(heatmap.kind, LayerKind::Heatmap);
        assert_eq!(heatmap.max_zoom, Some(18.0));
        assert_eq!(remove_data(&mut style, "hot").unwrap(), 3);
    }

    #[test]
    fn test_plain_circle_without_anchor_goes_on_top() {
        let mut style = HeadlessStyle::new("test://style");
        add_data(&mut style, &model("x", None)).unwrap();
        let layer = style.layer("layer-heaven-x").unwrap();
        assert_eq!(layer.kind, LayerKind::Circle);
        assert_eq!(layer.paint["circle-color"], json!("#2196F3"));
        assert_eq!(layer.source_layer.as_deref(), Some("heaven"));
    }

    #[test]
    fn test_seeded_models_apply_on_every_style_load() {
        let mut builder = HeavenMapBuilder::new();
        builder
            .interpret_options(&json!({"models": [{"id": "a", "sourceUrl": "u", "color": 1}]}))
            .unwrap();
        builder.add_data(model("b", None));
        builder.remove_data("b");
        let mut plugin = builder.build().unwrap();

        let mut view = HeadlessMap::new(ViewportSize::new(400.0, 400.0));
        let config = AppConfig::default();
        for url in ["test://one", "test://two"] {
            view.load_style(url).unwrap();
            let mut ctx = PluginContext::new(MapId::new(1), &mut view, &config);
            plugin.on_style_loaded(&mut ctx).unwrap();
            let style = view.style().unwrap();
            assert!(style.has_layer("layer-heaven-a"));
            assert!(!style.has_layer("layer-heaven-b"));
            assert!(style.has_image(MARKER_IMAGE));
        }
    }

    #[test]
    fn test_re_add_keeps_the_drawn_model() {
        let mut plugin = HeavenMapBuilder::new().build().unwrap();
        let mut view = HeadlessMap::new(ViewportSize::new(400.0, 400.0));
        let config = AppConfig::default();
        view.load_style("test://day").unwrap();

        for color in [0xFFFF0000u32, 0xFF0000FFu32] {
            let args = json!({"model": {"id": "x", "sourceUrl": "u", "color": color}});
            let (reply, mut rx) = MethodResult::channel("heaven_map#addData");
            let mut ctx = PluginContext::new(MapId::new(1), &mut view, &config);
            let call = MethodCall::new("heaven_map#addData", args);
            assert!(plugin.on_method_call(&mut ctx, &call, reply).is_claimed());
            assert!(rx.try_recv().unwrap().is_success());
        }
        let color = |view: &HeadlessMap| {
            let layer = view.headless_style().unwrap().layer("layer-heaven-x").unwrap();
            layer.paint["circle-color"].clone()
        };
        assert_eq!(color(&view), json!("#FF0000"));

        view.load_style("test://night").unwrap();
        let mut ctx = PluginContext::new(MapId::new(1), &mut view, &config);
        plugin.on_style_loaded(&mut ctx).unwrap();
        assert_eq!(color(&view), json!("#FF0000"));
    }
}
