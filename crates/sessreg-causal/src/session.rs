//! The client side of a session.
//!
//! A session carries two vectors, `read` and `write`, both initially zero
//! and coordinate-wise non-decreasing over the session's lifetime. Every
//! request ships both vectors; every successful reply overwrites both
//! wholesale. Replicas are tried in a fresh random order per operation so
//! no single replica becomes a hotspot, and a refusal or transport error
//! just moves on to the next candidate.
//!
//! Operations on one session are serialized, network round trip included:
//! a concurrent caller that snapshotted the vectors before another call's
//! reply landed would otherwise overwrite that reply's advancement.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::protocol::{ClientRequest, OpType, SessionType};
use crate::transport::CausalTransport;

/// Failure of a whole client operation (every replica refused or errored).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no replica accepted the request after {attempts} attempts")]
    NoReplicaAccepted { attempts: usize },
}

#[derive(Debug)]
struct Vectors {
    read: Vec<u64>,
    write: Vec<u64>,
}

/// A client session against the replicated register.
pub struct SessionClient<T: CausalTransport> {
    id: u64,
    transport: Arc<T>,
    /// Held across the whole of [`Self::request`]; one operation at a time
    /// per session.
    op_lock: tokio::sync::Mutex<()>,
    vectors: Mutex<Vectors>,
}

impl<T: CausalTransport> SessionClient<T> {
    pub fn new(id: u64, transport: Arc<T>) -> Self {
        let n = transport.replica_count();
        Self {
            id,
            transport,
            op_lock: tokio::sync::Mutex::new(()),
            vectors: Mutex::new(Vectors {
                read: vec![0; n],
                write: vec![0; n],
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read the register under the given session guarantee.
    pub async fn read(&self, session: SessionType) -> Result<u64, ClientError> {
        self.request(OpType::Read, 0, session).await
    }

    /// Write the register under the given session guarantee; returns the
    /// written value.
    pub async fn write(&self, value: u64, session: SessionType) -> Result<u64, ClientError> {
        self.request(OpType::Write, value, session).await
    }

    /// Snapshot of the session's read vector (for assertions).
    pub fn read_vector(&self) -> Vec<u64> {
        self.vectors.lock().read.clone()
    }

    /// Snapshot of the session's write vector (for assertions).
    pub fn write_vector(&self) -> Vec<u64> {
        self.vectors.lock().write.clone()
    }

    async fn request(
        &self,
        op_type: OpType,
        data: u64,
        session: SessionType,
    ) -> Result<u64, ClientError> {
        let _serial = self.op_lock.lock().await;

        let mut order: Vec<usize> = (0..self.transport.replica_count()).collect();
        order.shuffle(&mut rand::thread_rng());

        for replica in order {
            let req = {
                let vectors = self.vectors.lock();
                ClientRequest {
                    op_type,
                    session_type: session,
                    data,
                    read_vector: vectors.read.clone(),
                    write_vector: vectors.write.clone(),
                }
            };

            match self.transport.process_client_request(replica, &req).await {
                Ok(reply) if reply.succeeded => {
                    let mut vectors = self.vectors.lock();
                    vectors.read = reply.read_vector;
                    vectors.write = reply.write_vector;
                    return Ok(reply.data);
                }
                Ok(_) => {
                    debug!(client = self.id, replica, "replica refused, trying next");
                }
                Err(e) => {
                    debug!(client = self.id, replica, error = %e, "replica unreachable, trying next");
                }
            }
        }

        Err(ClientError::NoReplicaAccepted {
            attempts: self.transport.replica_count(),
        })
    }
}
