//! The `seen` plugin: remembers when each nick was last active.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;
use tracing::info;

use hubbub_core::{BotConnection, Plugin, Registrar};
use hubbub_types::{RouteResponse, kinds};

#[derive(Debug, Clone)]
struct SeenRecord {
    at_millis: i64,
    doing: String,
}

type SeenDb = Arc<Mutex<HashMap<String, SeenRecord>>>;

pub struct SeenPlugin;

#[async_trait::async_trait]
impl Plugin for SeenPlugin {
    fn name(&self) -> &str {
        "seen"
    }

    async fn register(
        &self,
        _bot: &Arc<BotConnection>,
        reg: &mut Registrar,
    ) -> anyhow::Result<()> {
        // Per-connection state; a reload rebuilds it from scratch.
        let db: SeenDb = Arc::new(Mutex::new(HashMap::new()));

        let talk = db.clone();
        reg.on_fn(
            kinds::PRIVMSG,
            Arc::new(move |ctx| {
                let db = talk.clone();
                Box::pin(async move {
                    let doing = match &ctx.event.channel {
                        Some(channel) => format!("talking in {channel}"),
                        None => "talking in private".to_string(),
                    };
                    record(&db, &ctx.event.nick, ctx.event.timestamp, doing).await;
                    Ok(())
                })
            }),
        );

        let joins = db.clone();
        reg.on_fn(
            kinds::JOIN,
            Arc::new(move |ctx| {
                let db = joins.clone();
                Box::pin(async move {
                    let doing = match &ctx.event.channel {
                        Some(channel) => format!("joining {channel}"),
                        None => "joining".to_string(),
                    };
                    record(&db, &ctx.event.nick, ctx.event.timestamp, doing).await;
                    Ok(())
                })
            }),
        );

        let lookup = db.clone();
        reg.command_fn(
            &["seen"],
            "when a nick was last active: seen <nick>",
            Arc::new(move |ctx, inv| {
                let db = lookup.clone();
                Box::pin(async move {
                    let Some(nick) = inv.args.first() else {
                        return ctx.reply("usage: seen <nick>").await;
                    };
                    let reply = match db.lock().await.get(&nick.to_lowercase()) {
                        Some(rec) => {
                            format!("{nick} was last seen {} at {}", rec.doing, format_at(rec.at_millis))
                        }
                        None => format!("never seen {nick}"),
                    };
                    ctx.reply(reply).await
                })
            }),
        );

        let web = db.clone();
        reg.route_fn(
            "GET",
            "/seen",
            Arc::new(move |req| {
                let db = web.clone();
                Box::pin(async move {
                    let Some(nick) = req.params.get("nick") else {
                        return Ok(RouteResponse {
                            status: 400,
                            content_type: "text/plain; charset=utf-8".to_string(),
                            body: "missing nick parameter".to_string(),
                        });
                    };
                    let body = match db.lock().await.get(&nick.to_lowercase()) {
                        Some(rec) => {
                            format!("{nick} was last seen {} at {}", rec.doing, format_at(rec.at_millis))
                        }
                        None => format!("never seen {nick}"),
                    };
                    Ok(RouteResponse::ok(body))
                })
            }),
        );

        reg.on_cleanup(move || async move {
            let entries = db.lock().await.len();
            info!(entries, "seen database discarded");
            Ok(())
        });
        Ok(())
    }
}

async fn record(db: &SeenDb, nick: &str, at_millis: i64, doing: String) {
    if nick.is_empty() {
        return;
    }
    db.lock()
        .await
        .insert(nick.to_lowercase(), SeenRecord { at_millis, doing });
}

fn format_at(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "an unknown time".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use hubbub_config::ServerConfig;
    use hubbub_core::{BotConnection, PluginRegistry, dispatch, load};
    use hubbub_types::{Event, RouteRequest};

    use super::*;

    fn bot() -> (Arc<BotConnection>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (BotConnection::new("test", ServerConfig::default(), tx), rx)
    }

    fn plugins() -> PluginRegistry {
        let mut plugins = PluginRegistry::new();
        plugins.register(Arc::new(SeenPlugin));
        plugins
    }

    #[tokio::test]
    async fn test_seen_after_privmsg() {
        let (bot, mut rx) = bot();
        load(&plugins(), &bot, "seen").await.unwrap();

        dispatch(&bot, Event::privmsg("Alice", "#rust", "hello")).await;
        dispatch(&bot, Event::privmsg("bob", "#rust", "!seen alice")).await;

        let line = rx.recv().await.unwrap();
        assert!(line.contains("alice was last seen talking in #rust"), "got: {line}");
    }

    #[tokio::test]
    async fn test_seen_after_join() {
        let (bot, mut rx) = bot();
        load(&plugins(), &bot, "seen").await.unwrap();

        dispatch(&bot, Event::join("carol", "#ops")).await;
        dispatch(&bot, Event::privmsg("bob", "#rust", "!seen carol")).await;

        let line = rx.recv().await.unwrap();
        assert!(line.contains("carol was last seen joining #ops"), "got: {line}");
    }

    #[tokio::test]
    async fn test_seen_unknown_nick() {
        let (bot, mut rx) = bot();
        load(&plugins(), &bot, "seen").await.unwrap();

        dispatch(&bot, Event::privmsg("bob", "#rust", "!seen nobody")).await;
        let line = rx.recv().await.unwrap();
        assert!(line.contains("never seen nobody"), "got: {line}");
    }

    #[tokio::test]
    async fn test_seen_usage_without_args() {
        let (bot, mut rx) = bot();
        load(&plugins(), &bot, "seen").await.unwrap();

        dispatch(&bot, Event::privmsg("bob", "#rust", "!seen")).await;
        let line = rx.recv().await.unwrap();
        assert!(line.contains("usage: seen <nick>"), "got: {line}");
    }

    #[tokio::test]
    async fn test_seen_route() {
        let (bot, _rx) = bot();
        load(&plugins(), &bot, "seen").await.unwrap();

        dispatch(&bot, Event::privmsg("alice", "#rust", "hi")).await;

        let routes = bot.routes().await;
        let route = routes.iter().find(|r| r.path == "/seen").unwrap();

        let missing = route.handler.handle(RouteRequest::get("/seen")).await.unwrap();
        assert_eq!(missing.status, 400);

        let found = route
            .handler
            .handle(RouteRequest::get("/seen").with_param("nick", "alice"))
            .await
            .unwrap();
        assert_eq!(found.status, 200);
        assert!(found.body.contains("talking in #rust"));
    }
}
