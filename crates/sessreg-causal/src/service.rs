//! Exposes a [`Replica`] as an RPC [`Service`].

use std::sync::Arc;

use serde_json::Value;
use sessreg_rpc::{RpcError, Service};
use tracing::info;

use crate::protocol::{ClientRequest, GossipRequest};
use crate::replica::Replica;

/// Remotely callable method names.
pub mod methods {
    pub const PROCESS_CLIENT_REQUEST: &str = "register.process_client_request";
    pub const RECEIVE_GOSSIP: &str = "register.receive_gossip";
    pub const PRINT_OPERATIONS: &str = "register.print_operations";
}

/// RPC adapter around a replica.
pub struct ReplicaService {
    replica: Arc<Replica>,
}

impl ReplicaService {
    pub fn new(replica: Arc<Replica>) -> Self {
        Self { replica }
    }
}

impl Service for ReplicaService {
    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            methods::PROCESS_CLIENT_REQUEST => {
                let req: ClientRequest = serde_json::from_value(params)?;
                Ok(serde_json::to_value(
                    self.replica.process_client_request(&req),
                )?)
            }
            methods::RECEIVE_GOSSIP => {
                let req: GossipRequest = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.replica.receive_gossip(&req))?)
            }
            methods::PRINT_OPERATIONS => {
                let operations = self.replica.operations();
                info!(
                    replica = self.replica.id(),
                    count = operations.len(),
                    "applied log requested"
                );
                Ok(serde_json::to_value(operations)?)
            }
            other => Err(RpcError::NoSuchMethod(other.to_string())),
        }
    }
}
