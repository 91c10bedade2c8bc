// Cartobridge Plugin API
// Per-map plugin registry with ordered first-responder command dispatch

pub mod error;
pub mod plugin;
pub mod registry;

pub use error::{PluginError, PluginResult};
pub use plugin::{Dispatch, MapPlugin, PluginBuilder, PluginContext};
pub use registry::PluginRegistry;

// Re-export the types plugins interact with
pub use cartobridge_core::{MethodCall, MethodResult, MapId};
pub use cartobridge_map::{MapView, Style};

/// Plugin API version
pub const PLUGIN_API_VERSION: &str = "0.2.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version() {
        assert_eq!(PLUGIN_API_VERSION, "0.2.0");
    }
}
