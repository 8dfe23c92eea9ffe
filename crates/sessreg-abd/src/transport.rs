//! Transport seam for the ABD variant, plus the RPC adapters.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sessreg_rpc::{Connection, RpcClient, RpcError, Service};

use crate::protocol::{ReadReply, ReadRequest, WriteReply, WriteRequest};
use crate::server::AbdServer;

/// Remotely callable method names.
pub mod methods {
    pub const READ: &str = "abd.read";
    pub const WRITE: &str = "abd.write";
}

/// Calls into the servers of one ABD cluster.
#[async_trait]
pub trait AbdTransport: Send + Sync + 'static {
    fn server_count(&self) -> usize;

    async fn read(&self, server: usize, req: &ReadRequest) -> Result<ReadReply, RpcError>;

    async fn write(&self, server: usize, req: &WriteRequest) -> Result<WriteReply, RpcError>;
}

/// In-process transport for tests: direct calls, with servers optionally
/// marked down.
pub struct LocalAbdTransport {
    servers: Vec<Arc<AbdServer>>,
    down: Mutex<HashSet<usize>>,
}

impl LocalAbdTransport {
    pub fn new(n: usize) -> Self {
        Self {
            servers: (0..n).map(|i| Arc::new(AbdServer::new(i as u64))).collect(),
            down: Mutex::new(HashSet::new()),
        }
    }

    pub fn server(&self, idx: usize) -> &Arc<AbdServer> {
        &self.servers[idx]
    }

    pub fn set_down(&self, idx: usize, down: bool) {
        let mut set = self.down.lock();
        if down {
            set.insert(idx);
        } else {
            set.remove(&idx);
        }
    }

    fn check_up(&self, idx: usize) -> Result<(), RpcError> {
        if self.down.lock().contains(&idx) {
            return Err(RpcError::Connect {
                address: format!("abd-server-{idx}"),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "server marked down",
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AbdTransport for LocalAbdTransport {
    fn server_count(&self) -> usize {
        self.servers.len()
    }

    async fn read(&self, server: usize, req: &ReadRequest) -> Result<ReadReply, RpcError> {
        self.check_up(server)?;
        Ok(self.servers[server].read(req))
    }

    async fn write(&self, server: usize, req: &WriteRequest) -> Result<WriteReply, RpcError> {
        self.check_up(server)?;
        Ok(self.servers[server].write(req))
    }
}

/// Wire transport: one [`Connection`] per server.
pub struct RpcAbdTransport {
    client: Arc<RpcClient>,
    servers: Vec<Connection>,
}

impl RpcAbdTransport {
    pub fn new(client: Arc<RpcClient>, servers: Vec<Connection>) -> Self {
        Self { client, servers }
    }
}

#[async_trait]
impl AbdTransport for RpcAbdTransport {
    fn server_count(&self) -> usize {
        self.servers.len()
    }

    async fn read(&self, server: usize, req: &ReadRequest) -> Result<ReadReply, RpcError> {
        self.client
            .invoke(&self.servers[server], methods::READ, req)
            .await
    }

    async fn write(&self, server: usize, req: &WriteRequest) -> Result<WriteReply, RpcError> {
        self.client
            .invoke(&self.servers[server], methods::WRITE, req)
            .await
    }
}

/// RPC adapter around an ABD server.
pub struct AbdService {
    server: Arc<AbdServer>,
}

impl AbdService {
    pub fn new(server: Arc<AbdServer>) -> Self {
        Self { server }
    }
}

impl Service for AbdService {
    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            methods::READ => {
                let req: ReadRequest = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.server.read(&req))?)
            }
            methods::WRITE => {
                let req: WriteRequest = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.server.write(&req))?)
            }
            other => Err(RpcError::NoSuchMethod(other.to_string())),
        }
    }
}
