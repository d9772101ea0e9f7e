use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use purge_relay_core::{PublishEvent, Settings};
use purge_relay_targets::{ReqwestTransport, TargetReport, Transport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::publish::collect_reports;

#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
}

/// Body of `POST /hooks/publish`
#[derive(Debug, Deserialize)]
struct PublishHook {
    /// Post IDs arrive as numbers or strings depending on the sender
    #[serde(default)]
    content_id: Option<serde_json::Value>,
    url: String,
}

#[derive(Debug, Serialize)]
struct HookResponse {
    accepted: bool,
    results: Vec<TargetReport>,
}

/// Serve the publish webhook until interrupted
pub async fn run(settings: Settings, host: IpAddr, port: u16) -> Result<()> {
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new().context("Failed to create HTTP client")?);

    let open = settings.hook_token.is_none();
    let app = router(settings, transport);

    let addr = SocketAddr::from((host, port));
    println!("🚀 Listening for publish events at: http://{}/hooks/publish", addr);
    if open {
        println!("   ⚠ HOOK_TOKEN not set - anyone who can reach this port can purge");
    }
    println!("   Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to port")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("listener stopped");
    Ok(())
}

fn router(settings: Settings, transport: Arc<dyn Transport>) -> Router {
    let state = AppState {
        settings: Arc::new(settings),
        transport,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/hooks/publish", post(publish_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn publish_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PublishHook>, JsonRejection>,
) -> Response {
    if !authorized(&headers, state.settings.hook_token.as_deref()) {
        return error_response(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
    }

    let Json(hook) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(rejection.status(), &rejection.body_text()),
    };

    if hook.url.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "url must not be empty");
    }

    let mut event = PublishEvent::new(hook.url.trim());
    if let Some(id) = hook.content_id {
        event = event.with_content_id(match id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
    }

    let results = collect_reports(&state.settings, state.transport.clone(), &event).await;

    (
        StatusCode::ACCEPTED,
        Json(HookResponse {
            accepted: true,
            results,
        }),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap, token: Option<&str>) -> bool {
    let Some(expected) = token else {
        return true;
    };

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|presented| {
            presented.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 1
        })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "accepted": false, "error": message }))).into_response()
}
