//! Plugin resolution and loading.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::connection::{BotConnection, CleanupFn};
use crate::hook::{Command, CommandEntry, CommandFn, FnCommand, FnHook, Hook, HookFn};
use crate::routes::{FnRouteHandler, PluginRoute, RouteFn, RouteHandler};

/// A named plugin: the registration entrypoint the loader invokes.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name; config plugin lists refer to this.
    fn name(&self) -> &str;

    /// Called once per load with the owning connection. Registrations go
    /// through `reg`; none of them take effect unless this returns `Ok`.
    async fn register(&self, bot: &Arc<BotConnection>, reg: &mut Registrar)
    -> anyhow::Result<()>;
}

/// Explicit name → plugin map, populated at startup.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Replaces a previously registered plugin with the same
    /// name.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Registered plugin names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Staging area a plugin registers into.
///
/// Discarded wholesale when the registration entrypoint fails, so a broken
/// plugin contributes nothing.
pub struct Registrar {
    module: String,
    server_id: String,
    hooks: Vec<(String, Arc<dyn Hook>)>,
    commands: Vec<CommandEntry>,
    routes: Vec<PluginRoute>,
    cleanup: Option<CleanupFn>,
}

impl Registrar {
    pub(crate) fn new(module: &str, server_id: &str) -> Self {
        Self {
            module: module.to_string(),
            server_id: server_id.to_string(),
            hooks: Vec::new(),
            commands: Vec::new(),
            routes: Vec::new(),
            cleanup: None,
        }
    }

    /// Hook an event kind.
    pub fn on(&mut self, kind: &str, hook: Arc<dyn Hook>) {
        self.hooks.push((kind.to_string(), hook));
    }

    /// Hook an event kind with a closure.
    pub fn on_fn(&mut self, kind: &str, f: HookFn) {
        self.on(kind, Arc::new(FnHook(f)));
    }

    /// Register a command answering to one or more names.
    pub fn command(&mut self, names: &[&str], help: &str, handler: Arc<dyn Command>) {
        self.commands.push(CommandEntry {
            module: self.module.clone(),
            names: names.iter().map(|n| n.to_lowercase()).collect(),
            help: help.to_string(),
            handler,
        });
    }

    /// Register a command with a closure handler.
    pub fn command_fn(&mut self, names: &[&str], help: &str, f: CommandFn) {
        self.command(names, help, Arc::new(FnCommand(f)));
    }

    /// Contribute an HTTP route.
    pub fn route(&mut self, method: &str, path: &str, handler: Arc<dyn RouteHandler>) {
        self.routes.push(PluginRoute {
            method: method.to_uppercase(),
            path: path.to_string(),
            module: self.module.clone(),
            server: self.server_id.clone(),
            handler,
        });
    }

    /// Contribute an HTTP route with a closure handler.
    pub fn route_fn(&mut self, method: &str, path: &str, f: RouteFn) {
        self.route(method, path, Arc::new(FnRouteHandler(f)));
    }

    /// Register the module's cleanup callback, invoked once before the
    /// module is replaced or removed. A later registration wins.
    pub fn on_cleanup<F, Fut>(&mut self, f: F)
    where
        F: FnOnce() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.cleanup = Some(Box::new(move || {
            let fut: futures::future::BoxFuture<'static, anyhow::Result<()>> = Box::pin(f());
            fut
        }));
    }

    fn into_module(self) -> StagedModule {
        StagedModule {
            name: self.module,
            hooks: self.hooks,
            commands: self.commands,
            routes: self.routes,
            cleanup: self.cleanup,
        }
    }
}

/// The output of a successful registration, ready to install.
pub(crate) struct StagedModule {
    pub name: String,
    pub hooks: Vec<(String, Arc<dyn Hook>)>,
    pub commands: Vec<CommandEntry>,
    pub routes: Vec<PluginRoute>,
    pub cleanup: Option<CleanupFn>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unknown plugin: {0}")]
    Unknown(String),
    #[error("plugin {name} failed to register: {reason:#}")]
    Registration { name: String, reason: anyhow::Error },
}

/// Resolve `name` and run its registration entrypoint against `bot`.
///
/// On success the staged module is installed in one step; on failure the
/// connection is left exactly as it was. Loading a name that is already
/// loaded replaces the old module, running its cleanup first.
pub async fn load(
    plugins: &PluginRegistry,
    bot: &Arc<BotConnection>,
    name: &str,
) -> Result<(), LoadError> {
    let plugin = plugins
        .get(name)
        .ok_or_else(|| LoadError::Unknown(name.to_string()))?;

    let mut reg = Registrar::new(name, bot.server_id());
    plugin
        .register(bot, &mut reg)
        .await
        .map_err(|reason| LoadError::Registration {
            name: name.to_string(),
            reason,
        })?;

    if let Some(cleanup) = bot.take_module_cleanup(name).await {
        if let Err(e) = cleanup().await {
            warn!(server = %bot.server_id(), module = name, "cleanup failed: {e:#}");
        }
    }

    let staged = reg.into_module();
    let (hooks, commands, routes) = (staged.hooks.len(), staged.commands.len(), staged.routes.len());
    bot.install_module(staged).await;
    info!(
        server = %bot.server_id(),
        module = name,
        hooks,
        commands,
        routes,
        "plugin loaded"
    );
    Ok(())
}

/// Error-to-boolean wrapper for administrative callers.
pub async fn safe_load(plugins: &PluginRegistry, bot: &Arc<BotConnection>, name: &str) -> bool {
    match load(plugins, bot, name).await {
        Ok(()) => true,
        Err(e) => {
            warn!(server = %bot.server_id(), module = name, "plugin load failed: {e:#}");
            false
        }
    }
}

/// Load every plugin named in the connection's current configuration,
/// continuing past individual failures. Returns the number loaded.
pub async fn load_all(plugins: &PluginRegistry, bot: &Arc<BotConnection>) -> usize {
    let config = bot.config().await;
    let mut loaded = 0;
    for name in &config.plugins {
        if safe_load(plugins, bot, name).await {
            loaded += 1;
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hubbub_types::kinds;

    use super::*;
    use crate::testutil;

    fn counting_plugin(name: &'static str, calls: Arc<AtomicUsize>) -> Arc<dyn Plugin> {
        testutil::plugin(name, move |_bot, reg| {
            let calls = calls.clone();
            reg.on_fn(
                kinds::PRIVMSG,
                Arc::new(move |_ctx| {
                    let calls = calls.clone();
                    Box::pin(async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            );
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_load_unknown_plugin() {
        let plugins = PluginRegistry::new();
        let (bot, _rx) = testutil::bot_with_plugins(&[]);
        let err = load(&plugins, &bot, "ghost").await.unwrap_err();
        assert!(matches!(err, LoadError::Unknown(_)));
        assert!(!safe_load(&plugins, &bot, "ghost").await);
    }

    #[tokio::test]
    async fn test_failed_registration_contributes_nothing() {
        let mut plugins = PluginRegistry::new();
        plugins.register(testutil::plugin("broken", |_bot, reg| {
            // Registers a hook and a route, then fails: none of it may
            // survive.
            reg.on_fn(kinds::PRIVMSG, Arc::new(|_ctx| Box::pin(async { Ok(()) })));
            reg.route_fn(
                "GET",
                "/broken",
                Arc::new(|_req| Box::pin(async { Ok(hubbub_types::RouteResponse::ok("")) })),
            );
            anyhow::bail!("registration exploded")
        }));

        let (bot, _rx) = testutil::bot_with_plugins(&[]);
        assert!(!safe_load(&plugins, &bot, "broken").await);
        assert!(bot.module_names().await.is_empty());
        assert!(bot.routes().await.is_empty());
        let (_config, table) = bot.snapshot().await;
        // Only the baseline command router remains on PRIVMSG.
        assert_eq!(table.hooks_for(kinds::PRIVMSG).len(), 1);
    }

    #[tokio::test]
    async fn test_load_all_continues_past_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut plugins = PluginRegistry::new();
        plugins.register(counting_plugin("good1", calls.clone()));
        plugins.register(testutil::plugin("bad", |_bot, _reg| {
            anyhow::bail!("nope")
        }));
        plugins.register(counting_plugin("good2", calls.clone()));

        // "missing" is not in the registry at all.
        let (bot, _rx) = testutil::bot_with_plugins(&["good1", "bad", "good2", "missing"]);
        let loaded = load_all(&plugins, &bot).await;

        assert_eq!(loaded, 2);
        assert_eq!(bot.module_names().await, vec!["good1", "good2"]);
    }

    #[tokio::test]
    async fn test_duplicate_load_replaces_and_cleans_up() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut plugins = PluginRegistry::new();
        let counter = cleanups.clone();
        plugins.register(testutil::plugin("dup", move |_bot, reg| {
            let counter = counter.clone();
            reg.on_fn(kinds::JOIN, Arc::new(|_ctx| Box::pin(async { Ok(()) })));
            reg.on_cleanup(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        }));

        let (bot, _rx) = testutil::bot_with_plugins(&[]);
        load(&plugins, &bot, "dup").await.unwrap();
        load(&plugins, &bot, "dup").await.unwrap();

        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(bot.module_names().await, vec!["dup"]);
        let (_config, table) = bot.snapshot().await;
        assert_eq!(table.hooks_for(kinds::JOIN).len(), 1);
    }
}
