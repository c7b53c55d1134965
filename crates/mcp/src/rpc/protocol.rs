//! JSON-RPC 2.0 envelopes and the MCP handshake vocabulary.

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Supported protocol revisions, newest first.
pub const PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const SERVER_NAME: &str = "meetup-mcp";

/// Header carrying the MCP session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// The requested protocol revision if supported, otherwise the newest.
pub fn negotiate(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|requested| PROTOCOL_VERSIONS.iter().find(|v| **v == requested))
        .copied()
        .unwrap_or(PROTOCOL_VERSIONS[0])
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerInfo {
    pub name: &'static str,
    pub version: &'static str,
}

pub fn server_info() -> ServerInfo {
    ServerInfo {
        name: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
    }
}

/// A JSON-RPC error object.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const UNAUTHORIZED: i32 = -32001;
    pub const FORBIDDEN: i32 = -32003;
    pub const NOT_FOUND: i32 = -32004;
    pub const UPSTREAM: i32 = -32010;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, message)
    }
}

/// Methods this server implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Initialized,
    ListTools,
    CallTool,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "notifications/initialized" => Some(Self::Initialized),
            "tools/list" => Some(Self::ListTools),
            "tools/call" => Some(Self::CallTool),
            _ => None,
        }
    }
}

/// A structurally valid request envelope.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub id: Value,
    pub method: String,
    pub params: Value,
}

impl Envelope {
    /// Parse a request body. On failure returns the id to answer with
    /// (`null` when unknown) and an invalid-request error.
    pub fn parse(body: &[u8]) -> Result<Self, (Value, RpcError)> {
        let invalid = || RpcError::new(RpcError::INVALID_REQUEST, "Invalid JSON-RPC request");
        let Ok(Value::Object(mut object)) = serde_json::from_slice::<Value>(body) else {
            return Err((Value::Null, invalid()));
        };

        let id = object.remove("id").unwrap_or(Value::Null);
        let version_ok = object.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
        let method = match object.remove("method") {
            Some(Value::String(method)) if version_ok => method,
            _ => return Err((id, invalid())),
        };
        let params = object.remove("params").unwrap_or(Value::Null);
        Ok(Self { id, method, params })
    }
}

pub fn success(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub fn failure(id: Value, error: &RpcError) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}
