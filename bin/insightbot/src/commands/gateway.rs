use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use insightbot_agent::{NoFeedback, WorkflowEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::engine::build_engine;

#[derive(Clone)]
struct GatewayState {
    engine: Arc<WorkflowEngine>,
}

#[derive(Deserialize)]
struct ChatParams {
    query: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    query: String,
    response: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn log_requests(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();
    info!(%request_id, %method, %uri, "Request received");

    let response = next.run(req).await;

    info!(
        %request_id,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}

async fn handle_root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Welcome to the insightbot chat API" }))
}

async fn handle_chat(State(state): State<GatewayState>, Query(params): Query<ChatParams>) -> Response {
    let Some(query) = params.query else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing required query parameter 'query'" })),
        )
            .into_response();
    };

    let response = state.engine.run_cycle(&query).await;
    info!(query = %query.chars().take(50).collect::<String>(), "Query processed");
    Json(ChatResponse { query, response }).into_response()
}

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: "chatbot-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn app(engine: Arc<WorkflowEngine>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/chat", get(handle_chat))
        .route("/health", get(handle_health))
        .layer(middleware::from_fn(log_requests))
        .layer(CorsLayer::permissive())
        .with_state(GatewayState { engine })
}

pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let (engine, config) = build_engine(Arc::new(NoFeedback))?;
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Gateway listening");

    axum::serve(listener, app(Arc::new(engine)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
