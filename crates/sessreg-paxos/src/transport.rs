//! Transport seam for the Paxos variant, plus the RPC adapters.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sessreg_rpc::{Connection, RpcClient, RpcError, Service};

use crate::acceptor::Acceptor;
use crate::protocol::{
    AcceptReply, AcceptRequest, PrepareReply, PrepareRequest, ReadReply, ReadRequest,
};
use crate::sequencer::Sequencer;

/// Remotely callable method names.
pub mod methods {
    pub const PREPARE: &str = "paxos.prepare";
    pub const ACCEPT: &str = "paxos.accept";
    pub const QUORUM_READ: &str = "paxos.quorum_read";
    pub const NEXT_PROPOSAL: &str = "sequencer.next_proposal";
}

/// Calls into the acceptors and the sequencer of one Paxos cluster.
#[async_trait]
pub trait PaxosTransport: Send + Sync + 'static {
    fn acceptor_count(&self) -> usize;

    async fn prepare(
        &self,
        acceptor: usize,
        req: &PrepareRequest,
    ) -> Result<PrepareReply, RpcError>;

    async fn accept(&self, acceptor: usize, req: &AcceptRequest) -> Result<AcceptReply, RpcError>;

    async fn quorum_read(&self, acceptor: usize, req: &ReadRequest)
        -> Result<ReadReply, RpcError>;

    async fn next_proposal(&self) -> Result<u64, RpcError>;
}

/// In-process transport for tests: direct calls, with acceptors optionally
/// marked down.
pub struct LocalPaxosTransport {
    acceptors: Vec<Arc<Acceptor>>,
    sequencer: Arc<Sequencer>,
    down: Mutex<HashSet<usize>>,
}

impl LocalPaxosTransport {
    pub fn new(n: usize) -> Self {
        Self {
            acceptors: (0..n).map(|i| Arc::new(Acceptor::new(i as u64))).collect(),
            sequencer: Arc::new(Sequencer::new()),
            down: Mutex::new(HashSet::new()),
        }
    }

    pub fn acceptor(&self, idx: usize) -> &Arc<Acceptor> {
        &self.acceptors[idx]
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
                address: format!("acceptor-{idx}"),
                source: std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "acceptor marked down",
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaxosTransport for LocalPaxosTransport {
    fn acceptor_count(&self) -> usize {
        self.acceptors.len()
    }

    async fn prepare(
        &self,
        acceptor: usize,
        req: &PrepareRequest,
    ) -> Result<PrepareReply, RpcError> {
        self.check_up(acceptor)?;
        Ok(self.acceptors[acceptor].prepare(req))
    }

    async fn accept(&self, acceptor: usize, req: &AcceptRequest) -> Result<AcceptReply, RpcError> {
        self.check_up(acceptor)?;
        Ok(self.acceptors[acceptor].accept(req))
    }

    async fn quorum_read(
        &self,
        acceptor: usize,
        req: &ReadRequest,
    ) -> Result<ReadReply, RpcError> {
        self.check_up(acceptor)?;
        Ok(self.acceptors[acceptor].quorum_read(req))
    }

    async fn next_proposal(&self) -> Result<u64, RpcError> {
        Ok(self.sequencer.next_proposal())
    }
}

/// Wire transport: one [`Connection`] per acceptor plus the sequencer's.
pub struct RpcPaxosTransport {
    client: Arc<RpcClient>,
    acceptors: Vec<Connection>,
    sequencer: Connection,
}

impl RpcPaxosTransport {
    pub fn new(client: Arc<RpcClient>, acceptors: Vec<Connection>, sequencer: Connection) -> Self {
        Self {
            client,
            acceptors,
            sequencer,
        }
    }
}

#[async_trait]
impl PaxosTransport for RpcPaxosTransport {
    fn acceptor_count(&self) -> usize {
        self.acceptors.len()
    }

    async fn prepare(
        &self,
        acceptor: usize,
        req: &PrepareRequest,
    ) -> Result<PrepareReply, RpcError> {
        self.client
            .invoke(&self.acceptors[acceptor], methods::PREPARE, req)
            .await
    }

    async fn accept(&self, acceptor: usize, req: &AcceptRequest) -> Result<AcceptReply, RpcError> {
        self.client
            .invoke(&self.acceptors[acceptor], methods::ACCEPT, req)
            .await
    }

    async fn quorum_read(
        &self,
        acceptor: usize,
        req: &ReadRequest,
    ) -> Result<ReadReply, RpcError> {
        self.client
            .invoke(&self.acceptors[acceptor], methods::QUORUM_READ, req)
            .await
    }

    async fn next_proposal(&self) -> Result<u64, RpcError> {
        self.client
            .invoke(&self.sequencer, methods::NEXT_PROPOSAL, &())
            .await
    }
}

/// RPC adapter around an acceptor.
pub struct AcceptorService {
    acceptor: Arc<Acceptor>,
}

impl AcceptorService {
    pub fn new(acceptor: Arc<Acceptor>) -> Self {
        Self { acceptor }
    }
}

impl Service for AcceptorService {
    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            methods::PREPARE => {
                let req: PrepareRequest = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.acceptor.prepare(&req))?)
            }
            methods::ACCEPT => {
                let req: AcceptRequest = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.acceptor.accept(&req))?)
            }
            methods::QUORUM_READ => {
                let req: ReadRequest = serde_json::from_value(params)?;
                Ok(serde_json::to_value(self.acceptor.quorum_read(&req))?)
            }
            other => Err(RpcError::NoSuchMethod(other.to_string())),
        }
    }
}

/// RPC adapter around the sequencer.
pub struct SequencerService {
    sequencer: Arc<Sequencer>,
}

impl SequencerService {
    pub fn new(sequencer: Arc<Sequencer>) -> Self {
        Self { sequencer }
    }
}

impl Service for SequencerService {
    fn dispatch(&self, method: &str, _params: Value) -> Result<Value, RpcError> {
        match method {
            methods::NEXT_PROPOSAL => Ok(serde_json::to_value(self.sequencer.next_proposal())?),
            other => Err(RpcError::NoSuchMethod(other.to_string())),
        }
    }
}
