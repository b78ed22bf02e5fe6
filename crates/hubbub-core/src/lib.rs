//! hubbub-core: the plugin hook runtime.
//!
//! Everything the bot does flows through here: per-event hook chains
//! contributed by plugins, dispatch with failure isolation, and the
//! hot-reload path that swaps a connection's entire plugin state without a
//! process restart.
//!
//! The wire-level IRC client is not part of this crate. The connection
//! layer hands inbound [`hubbub_types::Event`]s to [`dispatch`] and drains
//! the outbound line channel of each [`BotConnection`].

pub mod baseline;
pub mod connection;
pub mod dispatch;
pub mod hook;
pub mod loader;
pub mod registry;
pub mod reload;
pub mod routes;
pub mod table;

pub use connection::{BotConnection, BotState, CleanupFn, ModuleState};
pub use dispatch::dispatch;
pub use hook::{
    Command, CommandEntry, CommandFn, EventContext, FnCommand, FnHook, Hook, HookEntry, HookFn,
    HookFuture, Invocation,
};
pub use loader::{LoadError, Plugin, PluginRegistry, Registrar, load, load_all, safe_load};
pub use registry::BotRegistry;
pub use reload::{reload_all, reload_bot};
pub use routes::{
    FnRouteHandler, PluginRoute, RouteFn, RouteFuture, RouteHandler, RoutePublisher,
    collect_routes,
};
pub use table::HookTable;
