//! RPC request and response bodies, and dispatch onto the map service.
//!
//! Keys and values are hex strings on the wire.

use mapkeeper_store::{MapBackend, Record, ScanLimits, ScanOrder, ScanRange};
use mapkeeper_utils::StatsSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::service::{MapService, ResponseCode};

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RpcRequest {
    Ping,
    AddMap { map: String },
    DropMap { map: String },
    ListMaps,
    Get { map: String, key: String },
    Put { map: String, key: String, value: String },
    Insert { map: String, key: String, value: String },
    Update { map: String, key: String, value: String },
    Remove { map: String, key: String },
    Scan(ScanRequest),
    Stats,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScanRequest {
    pub map: String,
    #[serde(default = "default_order")]
    pub order: ScanOrder,
    #[serde(default)]
    pub start: String,
    #[serde(default = "default_true")]
    pub start_included: bool,
    /// Empty means unbounded.
    #[serde(default)]
    pub end: String,
    #[serde(default = "default_true")]
    pub end_included: bool,
    /// Zero means unlimited.
    #[serde(default)]
    pub max_records: u32,
    /// Zero means unlimited.
    #[serde(default)]
    pub max_bytes: u32,
}

fn default_order() -> ScanOrder {
    ScanOrder::Ascending
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordBody {
    pub key: String,
    pub value: String,
}

impl From<&Record> for RecordBody {
    fn from(r: &Record) -> Self {
        Self {
            key: hex::encode(&r.key),
            value: hex::encode(&r.value),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcResponse {
    pub code: ResponseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordBody>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
}

impl RpcResponse {
    pub fn code(code: ResponseCode) -> Self {
        Self {
            code,
            value: None,
            maps: None,
            records: None,
            stats: None,
        }
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────

fn decode(field: &'static str, s: &str) -> Result<Vec<u8>, RpcError> {
    hex::decode(s).map_err(|source| RpcError::InvalidHex { field, source })
}

fn check_map_name(name: &str) -> Result<(), RpcError> {
    if name.is_empty() {
        return Err(RpcError::InvalidRequest("map name must not be empty".into()));
    }
    Ok(())
}

/// Execute one request. Blocks on storage; call from a blocking thread.
pub fn dispatch<B: MapBackend>(
    service: &MapService<B>,
    request: RpcRequest,
) -> Result<RpcResponse, RpcError> {
    let response = match request {
        RpcRequest::Ping => RpcResponse::code(service.ping()),
        RpcRequest::AddMap { map } => {
            check_map_name(&map)?;
            RpcResponse::code(service.add_map(&map))
        }
        RpcRequest::DropMap { map } => RpcResponse::code(service.drop_map(&map)),
        RpcRequest::ListMaps => {
            let (code, maps) = service.list_maps();
            RpcResponse {
                maps: Some(maps),
                ..RpcResponse::code(code)
            }
        }
        RpcRequest::Get { map, key } => {
            let result = service.get(&map, &decode("key", &key)?);
            RpcResponse {
                value: result.value.map(hex::encode),
                ..RpcResponse::code(result.code)
            }
        }
        RpcRequest::Put { map, key, value } => RpcResponse::code(service.put(
            &map,
            &decode("key", &key)?,
            &decode("value", &value)?,
        )),
        RpcRequest::Insert { map, key, value } => RpcResponse::code(service.insert(
            &map,
            &decode("key", &key)?,
            &decode("value", &value)?,
        )),
        RpcRequest::Update { map, key, value } => RpcResponse::code(service.update(
            &map,
            &decode("key", &key)?,
            &decode("value", &value)?,
        )),
        RpcRequest::Remove { map, key } => {
            RpcResponse::code(service.remove(&map, &decode("key", &key)?))
        }
        RpcRequest::Scan(req) => {
            let range = ScanRange::new(
                req.order,
                decode("start", &req.start)?,
                req.start_included,
                decode("end", &req.end)?,
                req.end_included,
            );
            let limits = ScanLimits::new(req.max_records, req.max_bytes);
            let result = service.scan(&req.map, &range, limits);
            RpcResponse {
                records: Some(result.records.iter().map(RecordBody::from).collect()),
                ..RpcResponse::code(result.code)
            }
        }
        RpcRequest::Stats => RpcResponse {
            stats: Some(service.stats()),
            ..RpcResponse::code(ResponseCode::Success)
        },
    };
    Ok(response)
}
