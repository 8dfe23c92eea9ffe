//! Wire-level types: peer addresses, frames, and the transport error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Address of a peer, as listed in the cluster config.
///
/// `network` is kept for config compatibility; only `"tcp"` is served.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub network: String,
    pub address: String,
}

impl Connection {
    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            network: "tcp".to_string(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.network, self.address)
    }
}

/// One request frame: a method name plus its JSON-encoded parameters.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub params: Value,
}

/// One reply frame. Exactly one of `result`/`error` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(value: Value) -> Self {
        Self {
            result: Some(value),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Transport and dispatch errors.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("i/o error talking to {address}: {source}")]
    Io {
        address: String,
        source: std::io::Error,
    },

    #[error("call to {address} timed out")]
    Timeout { address: String },

    #[error("peer {address} closed the connection")]
    ConnectionClosed { address: String },

    #[error("remote error: {0}")]
    Remote(String),

    #[error("no such method: {0}")]
    NoSuchMethod(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
