//! Map backend abstraction for the cartobridge map bridge.
//!
//! This crate describes what the bridge needs from a rendering SDK and
//! provides the pieces every backend shares:
//!
//! - [`MapView`](map_view::MapView) and [`Style`](style::Style): the backend traits
//! - [`style`]: sources, layers and images in style-specification form
//! - [`overlay`]: structured style keys and idempotent add/remove helpers
//! - [`expr`]: builders for style expressions
//! - [`filter`]: evaluation of feature filter expressions
//! - [`projection`]: Web Mercator camera math and bounds fitting
//! - [`navigation`]: turn-by-turn navigation requests
//! - [`headless`]: a complete in-memory backend
//!
//! # Examples
//!
//! ```rust
//! use cartobridge_map::headless::HeadlessStyle;
//! use cartobridge_map::overlay::{add_layer_if_absent, add_source_if_absent, StyleKey};
//! use cartobridge_map::style::{LayerPosition, LayerSpec, SourceSpec, Style};
//!
//! let mut style = HeadlessStyle::new("https://tiles.example.org/style.json");
//! let source = StyleKey::source("heaven", "police").unwrap();
//! let layer = StyleKey::layer("heaven", "police").unwrap();
//!
//! add_source_if_absent(&mut style, &source, SourceSpec::vector_tiles("https://t/{z}/{x}/{y}")).unwrap();
//! let spec = LayerSpec::circle(layer.to_string(), source.to_string());
//! add_layer_if_absent(&mut style, spec.clone(), LayerPosition::Top).unwrap();
//!
//! // A second add changes nothing.
//! assert!(!add_layer_if_absent(&mut style, spec, LayerPosition::Top).unwrap());
//! assert_eq!(style.layer_ids(), vec!["layer-heaven-police"]);
//! ```

pub mod expr;
pub mod filter;
pub mod headless;
pub mod map_view;
pub mod navigation;
pub mod overlay;
pub mod projection;
pub mod style;

pub use headless::{HeadlessMap, HeadlessStyle};
pub use map_view::{Completion, MapView, QueryRegion, UiSetting, ViewEvent};
pub use navigation::NavigationRequest;
pub use overlay::StyleKey;
pub use style::{LayerKind, LayerPosition, LayerSpec, SourceSpec, Style, StyleImage};
