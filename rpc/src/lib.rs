//! Map service and RPC server for MapKeeper.
//!
//! Provides:
//! - the name → map registry shared by request handlers
//! - the map service with its wire response codes
//! - the HTTP/JSON transport (`POST /`, `GET /health`)

pub mod error;
pub mod handlers;
pub mod registry;
pub mod server;
pub mod service;

pub use error::RpcError;
pub use handlers::{dispatch, RpcRequest, RpcResponse};
pub use registry::{MapRegistry, RegistryError};
pub use server::{router, RpcServer};
pub use service::{MapService, ResponseCode};
