//! Idempotent creation and removal of overlay sources and layers.
//!
//! Overlay plugins name their style objects through a [`StyleKey`], rendered
//! as `"<kind>-<namespace>-<id>"`. Namespaces may not contain `-`, which keeps
//! the mapping injective: two distinct keys never render to the same string.
//! Adding an object that already exists is a no-op, and removal is the exact
//! inverse (layers first, then the source).

use crate::style::{LayerPosition, LayerSpec, SourceSpec, Style};
use cartobridge_core::error::MapError;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// Delimiter between key parts.
pub const KEY_DELIMITER: char = '-';

/// Which kind of style object a key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Source,
    Layer,
}

impl ObjectKind {
    fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Source => "source",
            ObjectKind::Layer => "layer",
        }
    }
}

/// Structured id of an overlay source or layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleKey {
    kind: ObjectKind,
    namespace: String,
    id: String,
}

/// Errors raised when building or parsing a [`StyleKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StyleKeyError {
    #[error("Namespace '{0}' must be non-empty and must not contain '-'")]
    BadNamespace(String),
    #[error("'{0}' is not a style key")]
    Unparseable(String),
}

impl From<StyleKeyError> for MapError {
    fn from(e: StyleKeyError) -> Self {
        MapError::backend("style_key", e.to_string())
    }
}

impl StyleKey {
    /// Builds a key. The domain id may contain any character.
    pub fn new(kind: ObjectKind, namespace: &str, id: impl Into<String>) -> Result<Self, StyleKeyError> {
        if namespace.is_empty() || namespace.contains(KEY_DELIMITER) {
            return Err(StyleKeyError::BadNamespace(namespace.to_string()));
        }
        Ok(Self {
            kind,
            namespace: namespace.to_string(),
            id: id.into(),
        })
    }

    pub fn source(namespace: &str, id: impl Into<String>) -> Result<Self, StyleKeyError> {
        Self::new(ObjectKind::Source, namespace, id)
    }

    pub fn layer(namespace: &str, id: impl Into<String>) -> Result<Self, StyleKeyError> {
        Self::new(ObjectKind::Layer, namespace, id)
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.kind.as_str(),
            self.namespace,
            self.id,
            d = KEY_DELIMITER
        )
    }
}

impl FromStr for StyleKey {
    type Err = StyleKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparseable = || StyleKeyError::Unparseable(s.to_string());
        let mut parts = s.splitn(3, KEY_DELIMITER);
        let kind = match parts.next() {
            Some("source") => ObjectKind::Source,
            Some("layer") => ObjectKind::Layer,
            _ => return Err(unparseable()),
        };
        let namespace = parts.next().ok_or_else(unparseable)?;
        let id = parts.next().ok_or_else(unparseable)?;
        Self::new(kind, namespace, id)
    }
}

/// Adds `source` under `key` unless a source with that id already exists.
///
/// Returns whether the source was added.
pub fn add_source_if_absent(style: &mut dyn Style, key: &StyleKey, source: SourceSpec) -> Result<bool, MapError> {
    add_source_id_if_absent(style, &key.to_string(), source)
}

/// Like [`add_source_if_absent`] for a fixed, non-structured id.
pub fn add_source_id_if_absent(style: &mut dyn Style, id: &str, source: SourceSpec) -> Result<bool, MapError> {
    if style.has_source(id) {
        trace!(source = id, "Source already present");
        return Ok(false);
    }
    style.add_source(id, source)?;
    debug!(source = id, "Source added");
    Ok(true)
}

/// Adds `layer` relative to `anchor` unless a layer with its id already exists.
///
/// The layer goes on top when the anchor is absent from the style.
/// Returns whether the layer was added.
pub fn add_layer_if_absent(style: &mut dyn Style, layer: LayerSpec, anchor: LayerPosition) -> Result<bool, MapError> {
    if style.has_layer(&layer.id) {
        trace!(layer = %layer.id, "Layer already present");
        return Ok(false);
    }
    let position = resolve_anchor(style, anchor);
    let id = layer.id.clone();
    style.add_layer(layer, position.clone())?;
    debug!(layer = %id, position = ?position, "Layer added");
    Ok(true)
}

/// Falls back to [`LayerPosition::Top`] when the anchor layer is missing.
pub fn resolve_anchor(style: &dyn Style, anchor: LayerPosition) -> LayerPosition {
    match &anchor {
        LayerPosition::Below(id) | LayerPosition::Above(id) if !style.has_layer(id) => LayerPosition::Top,
        _ => anchor,
    }
}

/// Id of the topmost layer whose id starts with `prefix`.
pub fn last_layer_with_prefix(style: &dyn Style, prefix: &str) -> Option<String> {
    style.layer_ids().into_iter().rev().find(|id| id.starts_with(prefix))
}

/// Removes the given layers, then the source. Unknown ids are skipped.
///
/// Returns the number of style objects removed.
pub fn remove_overlay<S: AsRef<str>>(style: &mut dyn Style, layers: &[S], source: Option<&str>) -> Result<usize, MapError> {
    let mut removed = 0;
    for layer in layers {
        if style.remove_layer(layer.as_ref()) {
            removed += 1;
        }
    }
    if let Some(source) = source {
        if style.remove_source(source)? {
            removed += 1;
        }
    }
    debug!(removed, "Overlay removed");
    Ok(removed)
}
