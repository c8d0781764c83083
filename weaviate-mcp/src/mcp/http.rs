//! Streamable-HTTP transport
//!
//! `POST /mcp` takes one JSON-RPC message per request and answers with the
//! JSON-RPC response, or `202 Accepted` with an empty body for notifications.
//! `GET /health` reports liveness without touching the backend.

use super::server::McpServer;
use crate::error::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Build the HTTP router for `server`
pub fn router(server: McpServer) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(health))
        .with_state(Arc::new(server))
}

/// Serve HTTP on `addr` until `shutdown` resolves
pub async fn serve_http<F>(server: McpServer, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Weaviate MCP server listening on http://{}/mcp", listener.local_addr()?);

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn handle_mcp(State(server): State<Arc<McpServer>>, body: String) -> Response {
    tracing::debug!("Received: {}", body);
    match server.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
