//! Hook and command interfaces.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hubbub_config::ServerConfig;
use hubbub_types::Event;

use crate::connection::BotConnection;
use crate::table::HookTable;

/// Context handed to every hook, immutable for the duration of one
/// dispatch.
///
/// `config` and `table` are the snapshot the dispatch was taken against; a
/// reload running concurrently with the dispatch is invisible here.
#[derive(Clone)]
pub struct EventContext {
    /// The inbound event.
    pub event: Event,
    /// The connection the event arrived on.
    pub bot: Arc<BotConnection>,
    /// Connection configuration at snapshot time.
    pub config: Arc<ServerConfig>,
    /// Hook table at snapshot time.
    pub table: Arc<HookTable>,
}

impl EventContext {
    /// Send a PRIVMSG back to where the event came from: the channel when
    /// there is one, otherwise the sender.
    pub async fn reply(&self, text: impl Into<String>) -> anyhow::Result<()> {
        self.bot.privmsg(self.event.reply_target(), text).await
    }
}

/// Boxed future returned by closure-backed hooks and commands.
pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Closure form of a hook callback.
pub type HookFn = Arc<dyn Fn(EventContext) -> HookFuture + Send + Sync>;

/// Closure form of a command handler.
pub type CommandFn = Arc<dyn Fn(EventContext, Invocation) -> HookFuture + Send + Sync>;

/// A registered event callback.
#[async_trait::async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, ctx: &EventContext) -> anyhow::Result<()>;
}

/// Adapter turning a [`HookFn`] closure into a [`Hook`].
pub struct FnHook(pub HookFn);

#[async_trait::async_trait]
impl Hook for FnHook {
    async fn call(&self, ctx: &EventContext) -> anyhow::Result<()> {
        (self.0)(ctx.clone()).await
    }
}

/// One entry in a hook chain: the callback plus the module it belongs to,
/// carried for diagnostics.
#[derive(Clone)]
pub struct HookEntry {
    pub module: String,
    pub hook: Arc<dyn Hook>,
}

/// A parsed command invocation: `!seen alice` becomes name `seen`,
/// args `["alice"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
}

/// A registered command handler.
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    async fn run(&self, ctx: &EventContext, inv: &Invocation) -> anyhow::Result<()>;
}

/// Adapter turning a [`CommandFn`] closure into a [`Command`].
pub struct FnCommand(pub CommandFn);

#[async_trait::async_trait]
impl Command for FnCommand {
    async fn run(&self, ctx: &EventContext, inv: &Invocation) -> anyhow::Result<()> {
        (self.0)(ctx.clone(), inv.clone()).await
    }
}

/// One command registration: a handler answering to one or more names.
#[derive(Clone)]
pub struct CommandEntry {
    pub module: String,
    pub names: Vec<String>,
    pub help: String,
    pub handler: Arc<dyn Command>,
}

impl CommandEntry {
    /// Whether this command answers to `name` (case-insensitive).
    pub fn answers_to(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}
