//! Outgoing RPC side: a client with a bounded connection cache.
//!
//! Connections are cached per peer address and reused across calls; a cache
//! entry is dropped as soon as a call over it fails, so the next call dials
//! fresh. The cache is bounded: at capacity the oldest entry is evicted.
//! Each call runs one request/reply exchange under the connection's own
//! async lock, with the whole exchange (including dialing) bounded by the
//! configured timeout.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::wire::{Connection, Request, Response, RpcError};

/// Default bound on the whole invoke (dial + exchange).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of cached peer connections.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

struct PeerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

type SharedConn = Arc<tokio::sync::Mutex<PeerConn>>;

struct Cache {
    conns: HashMap<String, SharedConn>,
    /// Insertion order, for eviction at capacity.
    order: VecDeque<String>,
    capacity: usize,
}

impl Cache {
    fn get(&self, address: &str) -> Option<SharedConn> {
        self.conns.get(address).cloned()
    }

    fn insert(&mut self, address: String, conn: SharedConn) {
        if !self.conns.contains_key(&address) {
            while self.conns.len() >= self.capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.conns.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.order.push_back(address.clone());
        }
        self.conns.insert(address, conn);
    }

    fn evict(&mut self, address: &str) {
        self.conns.remove(address);
        self.order.retain(|a| a != address);
    }
}

/// RPC client with a bounded, evict-on-failure connection cache.
pub struct RpcClient {
    cache: Mutex<Cache>,
    timeout: Duration,
}

impl RpcClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cache: Mutex::new(Cache {
                conns: HashMap::new(),
                order: VecDeque::new(),
                capacity: DEFAULT_CACHE_CAPACITY,
            }),
            timeout,
        }
    }

    /// Invoke `method` on the peer at `conn`, serializing `req` and
    /// deserializing the reply.
    pub async fn invoke<Req, Resp>(
        &self,
        conn: &Connection,
        method: &str,
        req: &Req,
    ) -> Result<Resp, RpcError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let params = serde_json::to_value(req)?;
        let result = tokio::time::timeout(self.timeout, self.exchange(conn, method, params)).await;
        match result {
            Ok(Ok(value)) => Ok(serde_json::from_value(value)?),
            Ok(Err(e)) => {
                self.cache.lock().evict(&conn.address);
                Err(e)
            }
            Err(_) => {
                self.cache.lock().evict(&conn.address);
                Err(RpcError::Timeout {
                    address: conn.address.clone(),
                })
            }
        }
    }

    async fn exchange(
        &self,
        conn: &Connection,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let shared = self.connection(conn).await?;
        let mut guard = shared.lock().await;

        let mut frame = serde_json::to_vec(&Request {
            method: method.to_string(),
            params,
        })?;
        frame.push(b'\n');

        let io_err = |source| RpcError::Io {
            address: conn.address.clone(),
            source,
        };

        guard.writer.write_all(&frame).await.map_err(io_err)?;
        guard.writer.flush().await.map_err(io_err)?;

        let mut line = String::new();
        let n = guard.reader.read_line(&mut line).await.map_err(io_err)?;
        if n == 0 {
            return Err(RpcError::ConnectionClosed {
                address: conn.address.clone(),
            });
        }

        let response: Response = serde_json::from_str(&line)?;
        match (response.result, response.error) {
            (Some(value), None) => Ok(value),
            (_, Some(message)) => Err(RpcError::Remote(message)),
            (None, None) => Err(RpcError::Remote("empty response".to_string())),
        }
    }

    async fn connection(&self, conn: &Connection) -> Result<SharedConn, RpcError> {
        if let Some(existing) = self.cache.lock().get(&conn.address) {
            return Ok(existing);
        }

        debug!(address = %conn.address, "dialing peer");
        let stream =
            TcpStream::connect(&conn.address)
                .await
                .map_err(|source| RpcError::Connect {
                    address: conn.address.clone(),
                    source,
                })?;
        let (read, write) = stream.into_split();
        let shared = Arc::new(tokio::sync::Mutex::new(PeerConn {
            reader: BufReader::new(read),
            writer: write,
        }));

        self.cache.lock().insert(conn.address.clone(), shared.clone());
        Ok(shared)
    }
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new()
    }
}
