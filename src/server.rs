//! Metrics exposition HTTP server.
//!
//! Serves the configured metrics path (with and without a trailing slash)
//! and a static landing page at `/`. Every GET on the metrics path triggers
//! one collection pass before rendering — the exporter is pull-driven and
//! holds no background refresh loop.
//!
//! Collector failures never surface here; they are absorbed as error
//! counters and the scrape renders 200. A 500 is only possible when the
//! gathered families cannot be encoded.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::{error, info};

use crate::collectors::ScrapeRegistry;
use crate::config::ServerConfig;
use crate::exposition;

#[derive(Clone)]
pub struct AppState {
    metrics_path: String,
    registry: Arc<ScrapeRegistry>,
}

impl AppState {
    pub fn new(metrics_path: &str, registry: Arc<ScrapeRegistry>) -> Self {
        let mut path = metrics_path.trim_end_matches('/').to_string();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            metrics_path: path,
            registry,
        }
    }
}

/// Builds the router. Exposed separately from [`start`] so tests can bind an
/// ephemeral port.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new().route("/", get(root_handler));
    if state.metrics_path != "/" && !state.metrics_path.is_empty() {
        router = router
            .route(&state.metrics_path, get(metrics_handler))
            .route(&format!("{}/", state.metrics_path), get(metrics_handler));
    }
    router.with_state(state)
}

/// Binds the listen address and serves until the process is terminated.
pub async fn start(config: &ServerConfig, registry: Arc<ScrapeRegistry>) -> anyhow::Result<()> {
    let state = AppState::new(&config.metrics_path, registry);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("listening on {}", addr);
    info!("metrics served at http://{}{}", addr, state.metrics_path);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[derive(Deserialize)]
struct RenderQuery {
    format: Option<String>,
}

async fn metrics_handler(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Response {
    let families = state.registry.gather().await;

    if query.format.as_deref() == Some("json") {
        match exposition::render_json(&families) {
            Ok(body) => (
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(err) => {
                error!("failed to render metrics as JSON: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error fetching metrics : {}", err),
                )
                    .into_response()
            }
        }
    } else {
        match exposition::render_text(&families) {
            Ok(body) => (
                [(header::CONTENT_TYPE, exposition::TEXT_CONTENT_TYPE)],
                body,
            )
                .into_response(),
            Err(err) => {
                error!("failed to encode metrics: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Error encoding metric family: {}", err),
                )
                    .into_response()
            }
        }
    }
}

async fn root_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
<head><title>OpenEBS Exporter</title></head>
<body>
<h1>OpenEBS Exporter</h1>
<p><a href="{0}">Metrics</a></p>
</body>
</html>"#,
        state.metrics_path
    ))
}
