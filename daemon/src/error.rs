use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] mapkeeper_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] mapkeeper_store_lmdb::LmdbError),

    #[error("RPC error: {0}")]
    Rpc(#[from] mapkeeper_rpc::RpcError),

    #[error("logging error: {0}")]
    Logging(#[from] mapkeeper_utils::LoggingError),
}
