//! MapKeeper daemon wiring: configuration, backend selection, the RPC
//! server, periodic checkpoints and graceful shutdown.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use mapkeeper_nullables::NullBackend;
use mapkeeper_rpc::{MapService, RpcServer};
use mapkeeper_store::{MapBackend, RetryPolicy};
use mapkeeper_store_lmdb::LmdbBackend;

pub use checkpoint::spawn_checkpointer;
pub use config::{BackendKind, NodeConfig};
pub use error::DaemonError;
pub use shutdown::ShutdownController;

/// Open the configured backend and serve until `shutdown` fires.
pub async fn run(config: NodeConfig, shutdown: ShutdownController) -> Result<(), DaemonError> {
    config.validate()?;
    let retry = RetryPolicy::new(config.retry_budget);

    match config.backend {
        BackendKind::Lmdb => {
            let env_config = config.environment_config();
            let backend = tokio::task::spawn_blocking(move || LmdbBackend::open(env_config, retry))
                .await
                .map_err(|e| DaemonError::Config(format!("backend open task failed: {e}")))??;
            let backend = Arc::new(backend);
            serve(Arc::clone(&backend), &config, shutdown).await?;
            match Arc::try_unwrap(backend) {
                Ok(backend) => backend.close()?,
                Err(_) => tracing::warn!("LMDB backend still referenced, closing on drop"),
            }
        }
        BackendKind::Memory => {
            tracing::warn!("using the in-memory backend; maps are lost on exit");
            serve(Arc::new(NullBackend::with_retry(retry)), &config, shutdown).await?;
        }
    }
    tracing::info!("MapKeeper daemon exited cleanly");
    Ok(())
}

async fn serve<B: MapBackend>(
    backend: Arc<B>,
    config: &NodeConfig,
    shutdown: ShutdownController,
) -> Result<(), DaemonError> {
    let service = Arc::new(MapService::new(Arc::clone(&backend)));
    let loaded = service.load()?;
    tracing::info!(
        maps = loaded,
        backend = ?config.backend,
        retry_budget = config.retry_budget,
        "map service ready"
    );

    let checkpointer = spawn_checkpointer(
        Arc::clone(&backend),
        Duration::from_millis(config.checkpoint_interval_ms),
        shutdown.subscribe(),
    );

    let server = RpcServer::new(config.rpc_addr(), Arc::clone(&service));
    let served = server.serve(shutdown.signalled()).await;

    // Stop the checkpointer even if the server failed to start.
    shutdown.shutdown();
    if let Err(e) = checkpointer.await {
        tracing::warn!(error = %e, "checkpoint task ended abnormally");
    }

    service.registry().close_all()?;
    backend.checkpoint()?;
    served?;
    Ok(())
}

/// Names of the maps persisted under `config`.
pub fn list_maps(config: &NodeConfig) -> Result<Vec<String>, DaemonError> {
    match config.backend {
        BackendKind::Lmdb => {
            let backend = LmdbBackend::open(
                config.environment_config(),
                RetryPolicy::new(config.retry_budget),
            )?;
            let names = backend.list_maps()?;
            backend.close()?;
            Ok(names)
        }
        BackendKind::Memory => Ok(Vec::new()),
    }
}
