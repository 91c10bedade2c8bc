//! Built-in map plugins.
//!
//! - [`heaven`]: vector-tile data overlays (`heaven_map#*`)
//! - [`route`]: route overlays and navigation launch (`map_route#*`)
//!
//! [`builtin_builder`] maps a configured plugin name to a fresh builder.

pub mod heaven;
pub mod route;

use cartobridge_plugin_api::PluginBuilder;

pub use heaven::{HeavenDataModel, HeavenMapBuilder, HeavenMapPlugin};
pub use route::{MapRouteBuilder, MapRoutePlugin, RouteModel};

/// A new builder for the built-in plugin called `name`.
pub fn builtin_builder(name: &str) -> Option<Box<dyn PluginBuilder>> {
    match name {
        heaven::PLUGIN_NAME => Some(Box::new(HeavenMapBuilder::new())),
        route::PLUGIN_NAME => Some(Box::new(MapRouteBuilder::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartobridge_core::config::BUILTIN_PLUGINS;

    #[test]
    fn test_every_builtin_has_a_builder() {
        for name in BUILTIN_PLUGINS {
            let builder = builtin_builder(name).unwrap();
            assert_eq!(builder.name(), *name);
        }
        assert!(builtin_builder("nope").is_none());
    }
}
