//! hubbub-web: the process-wide HTTP surface.
//!
//! Every loaded module may contribute routes; they are flattened into one
//! ordered table, served behind a query-decoding layer with a fixed 404
//! fallback. The table is rebuilt on reload and swapped in atomically —
//! in-flight requests finish against the table they started with.

pub mod table;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tracing::info;

use hubbub_config::WebConfig;
use hubbub_types::{RouteRequest, RouteResponse};

pub use table::{RouteTable, ServingTable};

/// Start the web server. Runs until the listener fails.
pub async fn serve(config: &WebConfig, serving: Arc<ServingTable>) -> anyhow::Result<()> {
    let app = router(serving);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("web listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// The axum application: one fallback handler over the serving table.
pub fn router(serving: Arc<ServingTable>) -> Router {
    Router::new().fallback(handle).with_state(serving)
}

async fn handle(
    State(serving): State<Arc<ServingTable>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let req = RouteRequest {
        method: method.as_str().to_uppercase(),
        path: uri.path().to_string(),
        params,
    };
    to_axum(serving.respond(req).await)
}

fn to_axum(resp: RouteResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, resp.content_type)],
        resp.body,
    )
        .into_response()
}
