//! Causally consistent replicated register with session guarantees.
//!
//! A fixed cluster of `N` replicas holds one integer register. Clients talk
//! to any replica, carrying a session type and two vector clocks (`read` and
//! `write`); a replica refuses a request whose causal prerequisites it has
//! not yet seen, and the client retries elsewhere. Replicas converge through
//! anti-entropy gossip: each pushes its locally originated writes to every
//! peer, and receivers admit operations in dependency order into a
//! deterministic, totally ordered log.
//!
//! # Pieces
//!
//! - [`op`]: the write record, its total order, and the one-off admission
//!   rule that lets a peer's next contiguous write in before the rest of the
//!   originator's prefix arrives.
//! - [`replica`]: the state machine — dependency check, read/write paths,
//!   gossip merge.
//! - [`session`]: the client side — session vectors, replica selection,
//!   retry on refusal.
//! - [`gossip`]: the background anti-entropy driver.
//! - [`cluster`]: an in-process cluster harness for tests and simulations.
//!
//! # Guarantees
//!
//! The five Terry session guarantees (causal, monotonic reads, monotonic
//! writes, read-your-writes, writes-follow-reads) plus eventual convergence.
//! Nothing stronger: no linearizability, no persistence, no fault tolerance
//! beyond retrying another replica.

pub mod cluster;
pub mod gossip;
pub mod op;
pub mod protocol;
pub mod replica;
pub mod service;
pub mod session;
pub mod transport;

pub use cluster::Cluster;
pub use gossip::{GossipDriver, GossipHandle, DEFAULT_GOSSIP_PERIOD};
pub use op::Operation;
pub use protocol::{
    ClientReply, ClientRequest, GossipAck, GossipRequest, OpType, SessionType,
};
pub use replica::{Replica, ReplicaId};
pub use session::{ClientError, SessionClient};
pub use transport::{CausalTransport, RpcTransport};
