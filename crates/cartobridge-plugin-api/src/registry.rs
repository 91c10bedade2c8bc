//! Multi-instance plugin registry.
//!
//! Every map instance owns an ordered list of plugin slots. A slot starts as a
//! registered builder and becomes a built plugin the first time
//! [`PluginRegistry::build_plugins`] runs for the instance. Commands are offered
//! to built plugins in registration order and the first claim wins.
//!
//! Instances are independent: each one sits behind its own mutex inside a
//! concurrent map, so a slow plugin on one map never blocks another map.
//! Panics raised by plugin code are caught here and never escape into the
//! host; the affected command is answered through its reply slot.

use crate::error::{PluginError, PluginResult};
use crate::plugin::{Dispatch, MapPlugin, PluginBuilder, PluginContext};
use cartobridge_core::{MapId, MethodCall, MethodResult};
use dashmap::DashMap;
use metrics::{counter, describe_counter};
use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

enum SlotState {
    Pending,
    Built {
        plugin: Box<dyn MapPlugin>,
        style_loaded: bool,
    },
    Failed,
}

struct Slot {
    name: String,
    builder: Box<dyn PluginBuilder>,
    state: SlotState,
}

#[derive(Default)]
struct InstanceEntry {
    slots: Vec<Slot>,
    frozen: bool,
    disposed: bool,
}

impl InstanceEntry {
    fn teardown(&mut self, map_id: MapId) -> usize {
        let mut count = 0;
        for slot in &mut self.slots {
            if let SlotState::Built { mut plugin, .. } = std::mem::replace(&mut slot.state, SlotState::Pending) {
                if catch_unwind(AssertUnwindSafe(|| plugin.on_destroy())).is_err() {
                    record_panic(map_id, &slot.name, "teardown");
                }
                count += 1;
            }
        }
        count
    }
}

/// Table of plugin builders and built plugins, keyed by map instance.
pub struct PluginRegistry {
    instances: DashMap<MapId, Arc<Mutex<InstanceEntry>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        describe_counter!(
            "cartobridge_plugin_commands_total",
            "Commands offered to plugins, by outcome"
        );
        describe_counter!(
            "cartobridge_plugin_panics_total",
            "Panics caught at the plugin boundary"
        );
        describe_counter!("cartobridge_plugins_built_total", "Plugins built");

        Self {
            instances: DashMap::new(),
        }
    }

    fn entry(&self, map_id: MapId) -> Option<Arc<Mutex<InstanceEntry>>> {
        self.instances.get(&map_id).map(|e| e.value().clone())
    }

    /// Registers `builder` under its name for `map_id`.
    ///
    /// Replacing an existing builder keeps its position in dispatch order.
    /// Returns `false` when building has already begun for the instance, in
    /// which case nothing changes.
    pub fn register_builder(&self, map_id: MapId, builder: Box<dyn PluginBuilder>) -> bool {
        let entry = self
            .instances
            .entry(map_id)
            .or_insert_with(|| Arc::new(Mutex::new(InstanceEntry::default())))
            .value()
            .clone();
        let mut entry = entry.lock();
        let name = builder.name().to_string();

        if entry.disposed {
            warn!(map = %map_id, plugin = %name, "Ignoring registration for disposed map");
            return false;
        }
        if entry.frozen {
            warn!(map = %map_id, plugin = %name, "Plugins already built, ignoring registration");
            return false;
        }

        match entry.slots.iter_mut().find(|slot| slot.name == name) {
            Some(slot) => {
                debug!(map = %map_id, plugin = %name, "Replacing plugin builder");
                slot.builder = builder;
                slot.state = SlotState::Pending;
            }
            None => {
                debug!(map = %map_id, plugin = %name, "Registering plugin builder");
                entry.slots.push(Slot {
                    name,
                    builder,
                    state: SlotState::Pending,
                });
            }
        }
        true
    }

    /// Hands each builder the member of `options` named after it.
    ///
    /// Builders without a member are left alone. The first rejected blob
    /// aborts with an error; earlier builders keep their new options.
    pub fn configure_builders(&self, map_id: MapId, options: &Value) -> PluginResult<()> {
        let entry = self.entry(map_id).ok_or(PluginError::UnknownInstance(map_id))?;
        let mut entry = entry.lock();
        for slot in &mut entry.slots {
            let Some(blob) = options.get(&slot.name).filter(|v| !v.is_null()) else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| slot.builder.interpret_options(blob))) {
                Ok(result) => result?,
                Err(_) => {
                    record_panic(map_id, &slot.name, "configure");
                    return Err(PluginError::Panicked {
                        plugin: slot.name.clone(),
                        phase: "configure",
                    });
                }
            }
        }
        Ok(())
    }

    /// Builds every registered plugin that is not built yet.
    ///
    /// Freezes the builder set for the instance. A builder that fails or
    /// panics is marked failed and is not retried. Returns the number of
    /// plugins built by this call.
    pub fn build_plugins(&self, map_id: MapId) -> usize {
        let Some(entry) = self.entry(map_id) else {
            return 0;
        };
        let mut entry = entry.lock();
        if entry.disposed {
            return 0;
        }
        entry.frozen = true;

        let mut built = 0;
        for slot in &mut entry.slots {
            if !matches!(slot.state, SlotState::Pending) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| slot.builder.build()));
            slot.state = match outcome {
                Ok(Ok(plugin)) => {
                    info!(map = %map_id, plugin = %slot.name, "Built plugin");
                    counter!("cartobridge_plugins_built_total").increment(1);
                    built += 1;
                    SlotState::Built {
                        plugin,
                        style_loaded: false,
                    }
                }
                Ok(Err(e)) => {
                    error!(map = %map_id, plugin = %slot.name, error = %e, "Plugin build failed");
                    SlotState::Failed
                }
                Err(_) => {
                    record_panic(map_id, &slot.name, "build");
                    SlotState::Failed
                }
            };
        }
        built
    }

    /// Runs every built plugin's style-loaded hook in registration order.
    ///
    /// Returns the number of plugins notified.
    pub fn dispatch_style_loaded(&self, map_id: MapId, ctx: &mut PluginContext<'_>) -> usize {
        let Some(entry) = self.entry(map_id) else {
            return 0;
        };
        let mut entry = entry.lock();
        if entry.disposed {
            return 0;
        }

        let mut notified = 0;
        for slot in &mut entry.slots {
            let SlotState::Built { plugin, style_loaded } = &mut slot.state else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| plugin.on_style_loaded(ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(map = %map_id, plugin = %slot.name, error = %e, "Style-loaded hook failed");
                }
                Err(_) => record_panic(map_id, &slot.name, "style_loaded"),
            }
            *style_loaded = true;
            notified += 1;
        }
        notified
    }

    /// Offers `call` to the built plugins of `map_id` in registration order.
    ///
    /// Plugins that have not seen a style load yet are skipped. When no
    /// plugin claims the command the reply slot comes back unanswered.
    pub fn dispatch_command(
        &self,
        map_id: MapId,
        ctx: &mut PluginContext<'_>,
        call: &MethodCall,
        reply: MethodResult,
    ) -> Dispatch {
        let Some(entry) = self.entry(map_id) else {
            counter!("cartobridge_plugin_commands_total", "outcome" => "unclaimed").increment(1);
            return Dispatch::Unclaimed(reply);
        };
        let mut entry = entry.lock();
        if entry.disposed {
            return Dispatch::Unclaimed(reply);
        }

        let mut reply = reply;
        for slot in &mut entry.slots {
            let SlotState::Built {
                plugin,
                style_loaded: true,
            } = &mut slot.state
            else {
                continue;
            };
            // The slot moves into the handler; if it panics the slot is dropped
            // during unwinding and answers with a plugin_panic error.
            match catch_unwind(AssertUnwindSafe(|| plugin.on_method_call(ctx, call, reply))) {
                Ok(Dispatch::Claimed) => {
                    debug!(map = %map_id, plugin = %slot.name, method = %call.method, "Command claimed");
                    counter!("cartobridge_plugin_commands_total", "outcome" => "claimed").increment(1);
                    return Dispatch::Claimed;
                }
                Ok(Dispatch::Unclaimed(returned)) => reply = returned,
                Err(_) => {
                    record_panic(map_id, &slot.name, "command");
                    counter!("cartobridge_plugin_commands_total", "outcome" => "panicked").increment(1);
                    return Dispatch::Claimed;
                }
            }
        }
        counter!("cartobridge_plugin_commands_total", "outcome" => "unclaimed").increment(1);
        Dispatch::Unclaimed(reply)
    }

    /// Tears down every built plugin of `map_id` and forgets the instance.
    ///
    /// Returns `false` when the instance was unknown.
    pub fn dispose(&self, map_id: MapId) -> bool {
        let Some((_, entry)) = self.instances.remove(&map_id) else {
            debug!(map = %map_id, "Dispose of unknown map ignored");
            return false;
        };
        let mut entry = entry.lock();
        let torn_down = entry.teardown(map_id);
        entry.slots.clear();
        entry.disposed = true;
        info!(map = %map_id, plugins = torn_down, "Disposed map plugins");
        true
    }

    /// Tears down built plugins and marks every builder unbuilt, so the next
    /// [`build_plugins`](Self::build_plugins) constructs fresh plugins.
    ///
    /// Also reopens the instance for registrations. Returns the number of
    /// plugins torn down.
    pub fn reset_plugins(&self, map_id: MapId) -> usize {
        let Some(entry) = self.entry(map_id) else {
            return 0;
        };
        let mut entry = entry.lock();
        let torn_down = entry.teardown(map_id);
        for slot in &mut entry.slots {
            slot.state = SlotState::Pending;
        }
        entry.frozen = false;
        info!(map = %map_id, plugins = torn_down, "Reset map plugins");
        torn_down
    }

    /// Registered plugin names in dispatch order.
    pub fn plugin_names(&self, map_id: MapId) -> Vec<String> {
        self.entry(map_id)
            .map(|entry| entry.lock().slots.iter().map(|slot| slot.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_built(&self, map_id: MapId, name: &str) -> bool {
        self.entry(map_id).is_some_and(|entry| {
            entry
                .lock()
                .slots
                .iter()
                .any(|slot| slot.name == name && matches!(slot.state, SlotState::Built { .. }))
        })
    }

    /// Whether `map_id` has an entry.
    pub fn contains(&self, map_id: MapId) -> bool {
        self.instances.contains_key(&map_id)
    }

    /// Number of map instances with an entry.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn record_panic(map_id: MapId, plugin: &str, phase: &'static str) {
    error!(map = %map_id, plugin, phase, "Plugin panicked");
    counter!("cartobridge_plugin_panics_total", "phase" => phase).increment(1);
}
