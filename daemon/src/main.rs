//! MapKeeper daemon: entry point for serving ordered key-value maps.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use mapkeeper_daemon::{BackendKind, NodeConfig, ShutdownController};
use mapkeeper_utils::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "mapkeeper-daemon", about = "MapKeeper ordered key-value map server")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "MAPKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "MAPKEEPER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage engine.
    #[arg(long, value_enum, env = "MAPKEEPER_BACKEND")]
    backend: Option<BackendKind>,

    /// RPC bind address.
    #[arg(long, env = "MAPKEEPER_RPC_HOST")]
    rpc_host: Option<IpAddr>,

    /// RPC server port.
    #[arg(long, env = "MAPKEEPER_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Attempts per store operation under contention.
    #[arg(long, env = "MAPKEEPER_RETRY_BUDGET")]
    retry_budget: Option<u32>,

    /// Milliseconds between checkpoints.
    #[arg(long, env = "MAPKEEPER_CHECKPOINT_INTERVAL_MS")]
    checkpoint_interval_ms: Option<u64>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "MAPKEEPER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "MAPKEEPER_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Serve maps over RPC until SIGINT or SIGTERM.
    Run,
    /// Print the persisted map names and exit.
    Maps,
}

impl Cli {
    /// File values (or defaults), overridden by flags and env vars.
    fn resolve_config(&self) -> anyhow::Result<NodeConfig> {
        let base = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)?,
            None => NodeConfig::default(),
        };
        Ok(NodeConfig {
            data_dir: self.data_dir.clone().unwrap_or(base.data_dir),
            backend: self.backend.unwrap_or(base.backend),
            rpc_host: self.rpc_host.unwrap_or(base.rpc_host),
            rpc_port: self.rpc_port.unwrap_or(base.rpc_port),
            retry_budget: self.retry_budget.unwrap_or(base.retry_budget),
            checkpoint_interval_ms: self
                .checkpoint_interval_ms
                .unwrap_or(base.checkpoint_interval_ms),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            log_format: self.log_format.unwrap_or(base.log_format),
            ..base
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(config.log_format, &config.log_level)?;
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Run => {
            tracing::info!(
                data_dir = %config.data_dir.display(),
                rpc = %config.rpc_addr(),
                backend = ?config.backend,
                "starting MapKeeper daemon"
            );
            let shutdown = ShutdownController::new();
            let signals = shutdown.clone();
            tokio::spawn(async move { signals.wait_for_signal().await });
            mapkeeper_daemon::run(config, shutdown).await?;
        }
        Command::Maps => {
            for name in mapkeeper_daemon::list_maps(&config)? {
                println!("{name}");
            }
        }
    }

    Ok(())
}
