//! Axum-based RPC server.
//!
//! `POST /` takes one JSON request tagged by `action`; `GET /health`
//! answers `ok`. Storage calls block, so each request runs on tokio's
//! blocking pool.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use mapkeeper_store::MapBackend;

use crate::error::RpcError;
use crate::handlers::{dispatch, RpcRequest, RpcResponse};
use crate::service::MapService;

/// Build the router serving `service`.
pub fn router<B: MapBackend>(service: Arc<MapService<B>>) -> Router {
    Router::new()
        .route("/", post(rpc_handler::<B>))
        .route("/health", get(health_handler))
        .with_state(service)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn rpc_handler<B: MapBackend>(
    State(service): State<Arc<MapService<B>>>,
    Json(request): Json<RpcRequest>,
) -> Result<Json<RpcResponse>, RpcError> {
    let response = tokio::task::spawn_blocking(move || dispatch(&service, request))
        .await
        .map_err(|e| RpcError::Worker(e.to_string()))??;
    Ok(Json(response))
}

pub struct RpcServer<B: MapBackend> {
    pub addr: SocketAddr,
    service: Arc<MapService<B>>,
}

impl<B: MapBackend> RpcServer<B> {
    pub fn new(addr: SocketAddr, service: Arc<MapService<B>>) -> Self {
        Self { addr, service }
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "RPC server listening");
        axum::serve(listener, router(self.service))
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("RPC server stopped");
        Ok(())
    }
}
