//! The `ping` plugin: liveness checks over IRC and HTTP.

use std::sync::Arc;

use hubbub_core::{BotConnection, Plugin, Registrar};
use hubbub_types::RouteResponse;

pub struct PingPlugin;

#[async_trait::async_trait]
impl Plugin for PingPlugin {
    fn name(&self) -> &str {
        "ping"
    }

    async fn register(
        &self,
        _bot: &Arc<BotConnection>,
        reg: &mut Registrar,
    ) -> anyhow::Result<()> {
        reg.command_fn(
            &["ping"],
            "reply with pong",
            Arc::new(|ctx, _inv| Box::pin(async move { ctx.reply("pong").await })),
        );
        reg.route_fn(
            "GET",
            "/ping",
            Arc::new(|_req| Box::pin(async { Ok(RouteResponse::ok("pong")) })),
        );
        Ok(())
    }
}
