//! Baseline hooks: the minimal behavior every connection keeps through
//! every reload, independent of which plugins are loaded.

use std::sync::Arc;

use tracing::{debug, warn};

use hubbub_types::kinds;

use crate::hook::{Command, CommandEntry, EventContext, Hook, HookEntry, Invocation};
use crate::table::HookTable;

/// Module name the baseline entries are registered under.
pub const CORE_MODULE: &str = "core";

/// Install the baseline hook set into a fresh table.
pub(crate) fn install(table: &mut HookTable) {
    table.on(
        kinds::PRIVMSG,
        HookEntry {
            module: CORE_MODULE.to_string(),
            hook: Arc::new(CommandRouter),
        },
    );
    table.add_command(CommandEntry {
        module: CORE_MODULE.to_string(),
        names: vec!["help".to_string()],
        help: "list commands, or describe one: help [command]".to_string(),
        handler: Arc::new(HelpCommand),
    });
    table.add_command(CommandEntry {
        module: CORE_MODULE.to_string(),
        names: vec!["version".to_string()],
        help: "show the bot version".to_string(),
        handler: Arc::new(VersionCommand),
    });
}

/// Split a message into a command invocation if it starts with the prefix.
pub fn parse_command(prefix: &str, message: &str) -> Option<Invocation> {
    if prefix.is_empty() {
        return None;
    }
    let rest = message.strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_lowercase();
    let args = words.map(str::to_string).collect();
    Some(Invocation { name, args })
}

/// Routes prefixed messages to the command map of the dispatch snapshot.
///
/// Looks commands up in `ctx.table` rather than the connection's live
/// state, so a command invocation always runs against the same table its
/// hook chain came from.
struct CommandRouter;

#[async_trait::async_trait]
impl Hook for CommandRouter {
    async fn call(&self, ctx: &EventContext) -> anyhow::Result<()> {
        let Some(inv) = parse_command(&ctx.config.command_prefix, &ctx.event.message) else {
            return Ok(());
        };
        match ctx.table.command(&inv.name) {
            Some(entry) => {
                // Contained here so the failure is attributed to the
                // command's owning module, not to the router.
                if let Err(e) = entry.handler.run(ctx, &inv).await {
                    warn!(
                        module = %entry.module,
                        command = %inv.name,
                        "command failed: {e:#}"
                    );
                }
            }
            None => debug!(command = %inv.name, "unknown command"),
        }
        Ok(())
    }
}

struct HelpCommand;

#[async_trait::async_trait]
impl Command for HelpCommand {
    async fn run(&self, ctx: &EventContext, inv: &Invocation) -> anyhow::Result<()> {
        let reply = match inv.args.first() {
            Some(name) => match ctx.table.command(name) {
                Some(entry) => format!("{}: {}", entry.names.join("/"), entry.help),
                None => format!("no such command: {name}"),
            },
            None => {
                let names: Vec<&str> = ctx
                    .table
                    .commands()
                    .iter()
                    .filter_map(|c| c.names.first().map(String::as_str))
                    .collect();
                format!("commands: {}", names.join(", "))
            }
        };
        ctx.reply(reply).await
    }
}

struct VersionCommand;

#[async_trait::async_trait]
impl Command for VersionCommand {
    async fn run(&self, ctx: &EventContext, _inv: &Invocation) -> anyhow::Result<()> {
        ctx.reply(concat!("hubbub v", env!("CARGO_PKG_VERSION"))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_basic() {
        let inv = parse_command("!", "!seen alice").unwrap();
        assert_eq!(inv.name, "seen");
        assert_eq!(inv.args, vec!["alice"]);
    }

    #[test]
    fn test_parse_command_lowercases_name_only() {
        let inv = parse_command("!", "!SEEN Alice").unwrap();
        assert_eq!(inv.name, "seen");
        assert_eq!(inv.args, vec!["Alice"]);
    }

    #[test]
    fn test_parse_command_non_prefixed() {
        assert!(parse_command("!", "hello there").is_none());
    }

    #[test]
    fn test_parse_command_bare_prefix() {
        assert!(parse_command("!", "!").is_none());
        assert!(parse_command("!", "!   ").is_none());
    }

    #[test]
    fn test_parse_command_multichar_prefix() {
        let inv = parse_command("@@", "@@ping").unwrap();
        assert_eq!(inv.name, "ping");
        assert!(inv.args.is_empty());
    }

    #[test]
    fn test_parse_command_empty_prefix_never_matches() {
        assert!(parse_command("", "anything").is_none());
    }
}
