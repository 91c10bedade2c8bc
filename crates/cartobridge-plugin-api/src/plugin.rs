//! Plugin and builder traits.
//!
//! A [`PluginBuilder`] is registered per map instance and produces exactly one
//! [`MapPlugin`] when the first style loads. Plugins see the live map through a
//! [`PluginContext`] and answer commands first-responder style: a plugin either
//! claims a command (and takes over its reply slot) or hands the slot back.

use crate::error::PluginResult;
use cartobridge_core::{AppConfig, MapId, MethodCall, MethodResult};
use cartobridge_map::MapView;
use serde_json::Value;

/// Live handles passed to every plugin hook.
pub struct PluginContext<'a> {
    pub map_id: MapId,
    pub view: &'a mut dyn MapView,
    pub config: &'a AppConfig,
}

impl<'a> PluginContext<'a> {
    pub fn new(map_id: MapId, view: &'a mut dyn MapView, config: &'a AppConfig) -> Self {
        Self { map_id, view, config }
    }
}

/// Outcome of offering a command to a handler.
#[derive(Debug)]
pub enum Dispatch {
    /// The handler took the command and owns its reply.
    Claimed,
    /// Nobody took the command; the reply slot is handed back unanswered.
    Unclaimed(MethodResult),
}

impl Dispatch {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Dispatch::Claimed)
    }
}

/// A plugin bound to one map instance.
pub trait MapPlugin: Send {
    /// Name the plugin was registered under.
    fn name(&self) -> &str;

    /// Called after every style load, before any command reaches the plugin.
    fn on_style_loaded(&mut self, ctx: &mut PluginContext<'_>) -> PluginResult<()>;

    /// Claims `call` by answering `reply` and returning [`Dispatch::Claimed`],
    /// or declines with [`Dispatch::Unclaimed`].
    fn on_method_call(&mut self, ctx: &mut PluginContext<'_>, call: &MethodCall, reply: MethodResult) -> Dispatch;

    /// Called once when the map instance is disposed or its plugins are reset.
    fn on_destroy(&mut self) {}
}

/// Named factory for one [`MapPlugin`].
pub trait PluginBuilder: Send {
    fn name(&self) -> &str;

    /// Applies the per-instance configuration blob found under the plugin's
    /// name in the creation parameters.
    fn interpret_options(&mut self, _options: &Value) -> PluginResult<()> {
        Ok(())
    }

    fn build(&mut self) -> PluginResult<Box<dyn MapPlugin>>;
}
