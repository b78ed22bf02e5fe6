//! Event dispatch with failure containment.

use std::sync::Arc;

use tracing::{debug, error, warn};

use hubbub_types::Event;

use crate::connection::BotConnection;
use crate::hook::EventContext;

/// Dispatch one inbound event against a connection's current hook table.
///
/// Every hook registered for the event's kind runs exactly once, in
/// registration order, each behind its own failure guard; one failing hook
/// never stops the rest. The outer guard contains anything failing before
/// the chain runs (the ignore check, the snapshot, the lookup), so this
/// function never raises to the connection layer.
pub async fn dispatch(bot: &Arc<BotConnection>, event: Event) {
    if let Err(e) = try_dispatch(bot, event).await {
        error!(server = %bot.server_id(), "dispatch dropped event: {e:#}");
    }
}

async fn try_dispatch(bot: &Arc<BotConnection>, event: Event) -> anyhow::Result<()> {
    let (config, table) = bot.snapshot().await;

    if is_ignored(&config.ignore, &event.nick) {
        debug!(server = %bot.server_id(), nick = %event.nick, "ignoring event");
        return Ok(());
    }

    let kind = event.kind.clone();
    let ctx = EventContext {
        event,
        bot: bot.clone(),
        config,
        table: table.clone(),
    };

    for entry in table.hooks_for(&kind) {
        if let Err(e) = entry.hook.call(&ctx).await {
            warn!(
                server = %bot.server_id(),
                module = %entry.module,
                kind = %kind,
                "hook failed: {e:#}"
            );
        }
    }
    Ok(())
}

fn is_ignored(ignore: &[String], nick: &str) -> bool {
    !nick.is_empty() && ignore.iter().any(|n| n.eq_ignore_ascii_case(nick))
}
