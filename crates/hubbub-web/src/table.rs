//! The aggregated route table and its serving slot.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use hubbub_core::{BotRegistry, PluginRoute, RouteHandler, RoutePublisher, collect_routes};
use hubbub_types::{RouteRequest, RouteResponse};

/// Handler behind the fixed fallback entry.
struct NotFoundHandler;

#[async_trait::async_trait]
impl RouteHandler for NotFoundHandler {
    async fn handle(&self, _req: RouteRequest) -> anyhow::Result<RouteResponse> {
        Ok(RouteResponse::not_found())
    }
}

/// One ordered route table, always terminated by the fallback entry.
/// Rebuilt on reload, never mutated in place.
pub struct RouteTable {
    entries: Vec<PluginRoute>,
}

impl RouteTable {
    /// Build a table from flattened contributions; the fallback entry is
    /// appended last.
    pub fn from_routes(routes: Vec<PluginRoute>) -> Self {
        let mut entries = routes;
        entries.push(PluginRoute {
            method: "*".to_string(),
            path: "*".to_string(),
            module: "core".to_string(),
            server: "*".to_string(),
            handler: Arc::new(NotFoundHandler),
        });
        Self { entries }
    }

    /// Aggregate the current registry state into a fresh table.
    pub async fn collect(registry: &BotRegistry) -> Self {
        Self::from_routes(collect_routes(registry).await)
    }

    /// All entries, fallback included, in match order.
    pub fn entries(&self) -> &[PluginRoute] {
        &self.entries
    }

    /// Match top-to-bottom, first match wins, and answer the request. A
    /// failing handler degrades to a 500 for that request only.
    pub async fn respond(&self, req: RouteRequest) -> RouteResponse {
        for entry in &self.entries {
            if !entry.matches(&req.method, &req.path) {
                continue;
            }
            return match entry.handler.handle(req.clone()).await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(
                        module = %entry.module,
                        path = %req.path,
                        "route handler failed: {e:#}"
                    );
                    RouteResponse {
                        status: 500,
                        content_type: "text/plain; charset=utf-8".to_string(),
                        body: "internal error".to_string(),
                    }
                }
            };
        }
        // Unreachable while the fallback entry is in place; kept total.
        RouteResponse::not_found()
    }
}

/// The serving slot: requests read the current table as an `Arc`
/// snapshot, installs atomically replace it. A request arriving during a
/// reload sees the entirely-old or entirely-new table.
pub struct ServingTable {
    current: RwLock<Arc<RouteTable>>,
}

impl ServingTable {
    /// Starts with the fallback-only table.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RouteTable::from_routes(Vec::new()))),
        }
    }

    /// The table requests are currently matched against.
    pub fn current(&self) -> Arc<RouteTable> {
        self.current.read().clone()
    }

    /// Swap in a rebuilt table in one visible step.
    pub fn install(&self, table: RouteTable) {
        debug!(entries = table.entries().len(), "installing route table");
        *self.current.write() = Arc::new(table);
    }

    /// Match and answer one decoded request against the current table.
    pub async fn respond(&self, req: RouteRequest) -> RouteResponse {
        self.current().respond(req).await
    }
}

impl Default for ServingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutePublisher for ServingTable {
    fn publish(&self, routes: Vec<PluginRoute>) {
        self.install(RouteTable::from_routes(routes));
    }
}
