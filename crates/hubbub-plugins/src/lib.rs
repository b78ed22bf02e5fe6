//! Bundled plugins.
//!
//! Small but real: together they exercise every arm of the plugin
//! contract (commands, event hooks, HTTP routes, cleanup).

pub mod ping;
pub mod seen;

use std::sync::Arc;

use hubbub_core::PluginRegistry;

pub use ping::PingPlugin;
pub use seen::SeenPlugin;

/// The default plugin registry with every bundled plugin.
pub fn registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(PingPlugin));
    registry.register(Arc::new(SeenPlugin));
    registry
}
