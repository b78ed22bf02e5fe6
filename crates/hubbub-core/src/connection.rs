//! One server connection and its guarded composite state.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{RwLock, mpsc};
use tracing::warn;

use hubbub_config::ServerConfig;

use crate::hook::HookEntry;
use crate::loader::StagedModule;
use crate::routes::PluginRoute;
use crate::table::HookTable;

/// Async no-argument cleanup callback a module may register. Invoked at
/// most once, before the module is replaced or removed.
pub type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// The state one loaded module owns on one connection.
///
/// Hooks and commands themselves live in the connection's [`HookTable`],
/// tagged with the module name; this records what else the module brought
/// along.
pub struct ModuleState {
    pub name: String,
    pub routes: Vec<PluginRoute>,
    pub cleanup: Option<CleanupFn>,
}

/// A connection's composite state: configuration, loaded modules and hook
/// table.
///
/// Always replaced together under the write lock — a reader never sees the
/// config from before an update next to the hooks from after it.
pub struct BotState {
    pub config: Arc<ServerConfig>,
    pub modules: Vec<ModuleState>,
    pub hooks: Arc<HookTable>,
}

/// One running server connection.
///
/// Owned by the runtime; dispatch and the reload path hold `Arc`
/// references. Outbound traffic goes through an mpsc channel the wire
/// layer drains.
pub struct BotConnection {
    server_id: String,
    outbound: mpsc::Sender<String>,
    state: RwLock<BotState>,
}

impl BotConnection {
    /// Create a connection with baseline hooks and no modules loaded.
    pub fn new(
        server_id: impl Into<String>,
        config: ServerConfig,
        outbound: mpsc::Sender<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            server_id: server_id.into(),
            outbound,
            state: RwLock::new(BotState {
                config: Arc::new(config),
                modules: Vec::new(),
                hooks: Arc::new(HookTable::baseline()),
            }),
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Consistent snapshot of the parts of the composite state a dispatch
    /// needs. Taken under one read lock; the lock is not held while hooks
    /// run.
    pub async fn snapshot(&self) -> (Arc<ServerConfig>, Arc<HookTable>) {
        let st = self.state.read().await;
        (st.config.clone(), st.hooks.clone())
    }

    /// Current configuration.
    pub async fn config(&self) -> Arc<ServerConfig> {
        self.state.read().await.config.clone()
    }

    /// Names of the currently loaded modules, in load order.
    pub async fn module_names(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .modules
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    /// Route contributions of the loaded modules, in load order.
    pub async fn routes(&self) -> Vec<PluginRoute> {
        self.state
            .read()
            .await
            .modules
            .iter()
            .flat_map(|m| m.routes.iter().cloned())
            .collect()
    }

    /// Queue a raw line for the wire.
    pub async fn send_line(&self, line: impl Into<String>) -> anyhow::Result<()> {
        self.outbound
            .send(line.into())
            .await
            .map_err(|_| anyhow::anyhow!("outbound channel for {} is closed", self.server_id))
    }

    /// Send a PRIVMSG.
    pub async fn privmsg(&self, target: &str, text: impl Into<String>) -> anyhow::Result<()> {
        self.send_line(format!("PRIVMSG {} :{}", target, text.into()))
            .await
    }

    /// Send a NOTICE.
    pub async fn notice(&self, target: &str, text: impl Into<String>) -> anyhow::Result<()> {
        self.send_line(format!("NOTICE {} :{}", target, text.into()))
            .await
    }

    /// Take every pending cleanup callback out of the loaded modules.
    ///
    /// Leaves the modules themselves (and the hook table) in place so the
    /// composite state stays consistent for concurrent readers; only the
    /// one-shot cleanup slots are emptied.
    pub(crate) async fn take_cleanups(&self) -> Vec<(String, CleanupFn)> {
        let mut st = self.state.write().await;
        let mut out = Vec::new();
        for m in st.modules.iter_mut() {
            if let Some(c) = m.cleanup.take() {
                out.push((m.name.clone(), c));
            }
        }
        out
    }

    /// Take the cleanup of a single module, if it is loaded and has one.
    pub(crate) async fn take_module_cleanup(&self, name: &str) -> Option<CleanupFn> {
        let mut st = self.state.write().await;
        st.modules
            .iter_mut()
            .find(|m| m.name == name)
            .and_then(|m| m.cleanup.take())
    }

    /// Reset the composite state for a reload: new (or kept) config, empty
    /// module list, fresh baseline hook table — one assignment under the
    /// write lock.
    pub(crate) async fn reset(&self, new_config: Option<ServerConfig>) {
        let mut st = self.state.write().await;
        let config = new_config
            .map(Arc::new)
            .unwrap_or_else(|| st.config.clone());
        *st = BotState {
            config,
            modules: Vec::new(),
            hooks: Arc::new(HookTable::baseline()),
        };
    }

    /// Install a successfully staged module.
    ///
    /// Its hooks and commands join a copy of the current table; the table
    /// and the module list are then swapped in together, so a concurrent
    /// dispatch sees either none or all of the module.
    pub(crate) async fn install_module(&self, staged: StagedModule) {
        let mut st = self.state.write().await;
        let mut table = (*st.hooks).clone();
        table.remove_module(&staged.name);
        st.modules.retain(|m| m.name != staged.name);

        for (kind, hook) in staged.hooks {
            table.on(
                &kind,
                HookEntry {
                    module: staged.name.clone(),
                    hook,
                },
            );
        }
        for command in staged.commands {
            table.add_command(command);
        }
        st.hooks = Arc::new(table);
        st.modules.push(ModuleState {
            name: staged.name,
            routes: staged.routes,
            cleanup: staged.cleanup,
        });
    }

    /// Run cleanups and drop all modules; used when the connection is torn
    /// down.
    pub(crate) async fn teardown(&self) {
        for (module, cleanup) in self.take_cleanups().await {
            if let Err(e) = cleanup().await {
                warn!(server = %self.server_id, module = %module, "cleanup failed: {e:#}");
            }
        }
        self.reset(None).await;
    }
}
