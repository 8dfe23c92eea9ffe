//! The async seam between clients/drivers and replicas.
//!
//! Session clients and the gossip driver address replicas by index and do
//! not care whether a call crosses a network. [`CausalTransport`] is that
//! seam; [`RpcTransport`] carries it over `sessreg-rpc`, and the in-process
//! [`crate::cluster::Cluster`] implements it directly for tests.

use std::sync::Arc;

use async_trait::async_trait;
use sessreg_rpc::{Connection, RpcClient, RpcError};

use crate::op::Operation;
use crate::protocol::{ClientReply, ClientRequest, GossipAck, GossipRequest};
use crate::service::methods;

/// Calls into the replicas of one fixed cluster.
#[async_trait]
pub trait CausalTransport: Send + Sync + 'static {
    /// Number of replicas in the cluster (the vector-clock length).
    fn replica_count(&self) -> usize;

    async fn process_client_request(
        &self,
        replica: usize,
        req: &ClientRequest,
    ) -> Result<ClientReply, RpcError>;

    async fn receive_gossip(
        &self,
        replica: usize,
        req: &GossipRequest,
    ) -> Result<GossipAck, RpcError>;

    /// Fetch a replica's applied log (the `print_operations` diagnostic).
    async fn operations(&self, replica: usize) -> Result<Vec<Operation>, RpcError>;
}

/// [`CausalTransport`] over the wire, one [`Connection`] per replica.
pub struct RpcTransport {
    client: Arc<RpcClient>,
    servers: Vec<Connection>,
}

impl RpcTransport {
    pub fn new(client: Arc<RpcClient>, servers: Vec<Connection>) -> Self {
        Self { client, servers }
    }
}

#[async_trait]
impl CausalTransport for RpcTransport {
    fn replica_count(&self) -> usize {
        self.servers.len()
    }

    async fn process_client_request(
        &self,
        replica: usize,
        req: &ClientRequest,
    ) -> Result<ClientReply, RpcError> {
        self.client
            .invoke(&self.servers[replica], methods::PROCESS_CLIENT_REQUEST, req)
            .await
    }

    async fn receive_gossip(
        &self,
        replica: usize,
        req: &GossipRequest,
    ) -> Result<GossipAck, RpcError> {
        self.client
            .invoke(&self.servers[replica], methods::RECEIVE_GOSSIP, req)
            .await
    }

    async fn operations(&self, replica: usize) -> Result<Vec<Operation>, RpcError> {
        self.client
            .invoke(&self.servers[replica], methods::PRINT_OPERATIONS, &())
            .await
    }
}
