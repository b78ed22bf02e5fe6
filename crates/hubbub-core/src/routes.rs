//! Plugin HTTP route contributions.
//!
//! The web crate turns these into the one served table; this module only
//! defines the contribution type, the handler contract, and the
//! registry-order flattening the reload path uses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hubbub_types::{RouteRequest, RouteResponse};

use crate::registry::BotRegistry;

/// Boxed future returned by closure-backed route handlers.
pub type RouteFuture = Pin<Box<dyn Future<Output = anyhow::Result<RouteResponse>> + Send>>;

/// Closure form of a route handler.
pub type RouteFn = Arc<dyn Fn(RouteRequest) -> RouteFuture + Send + Sync>;

/// A plugin-provided HTTP handler.
#[async_trait::async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, req: RouteRequest) -> anyhow::Result<RouteResponse>;
}

/// Adapter turning a [`RouteFn`] closure into a [`RouteHandler`].
pub struct FnRouteHandler(pub RouteFn);

#[async_trait::async_trait]
impl RouteHandler for FnRouteHandler {
    async fn handle(&self, req: RouteRequest) -> anyhow::Result<RouteResponse> {
        (self.0)(req).await
    }
}

/// One route contributed by a module on one connection. A `"*"` method or
/// path matches anything; the fallback entry uses both.
#[derive(Clone)]
pub struct PluginRoute {
    pub method: String,
    pub path: String,
    pub module: String,
    pub server: String,
    pub handler: Arc<dyn RouteHandler>,
}

impl PluginRoute {
    pub fn matches(&self, method: &str, path: &str) -> bool {
        (self.method == "*" || self.method.eq_ignore_ascii_case(method))
            && (self.path == "*" || self.path == path)
    }
}

/// Where a recomputed route set gets published. Implemented by the web
/// serving table; the reload path hands it the flattened contributions.
pub trait RoutePublisher: Send + Sync {
    fn publish(&self, routes: Vec<PluginRoute>);
}

/// Flatten route contributions: every connection in registration order,
/// every module in load order. Pure function of current registry state —
/// two calls with no intervening mutation yield identical tables.
pub async fn collect_routes(registry: &BotRegistry) -> Vec<PluginRoute> {
    let mut out = Vec::new();
    for bot in registry.snapshot().iter() {
        out.extend(bot.routes().await);
    }
    out
}
