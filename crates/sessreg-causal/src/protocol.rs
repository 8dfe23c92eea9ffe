//! Message shapes exchanged between session clients and replicas.

use serde::{Deserialize, Serialize};

use crate::op::Operation;

/// Which of the Terry session guarantees a request asks for.
///
/// The choice only affects the server-side dependency check; the reply
/// shape is the same for all five.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Causal,
    MonotonicReads,
    MonotonicWrites,
    ReadYourWrites,
    WritesFollowReads,
}

/// Read or write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Read,
    Write,
}

/// A client request against the register.
///
/// `data` is only meaningful for writes. The two vectors are the client's
/// session state and must be carried unmodified between calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub op_type: OpType,
    pub session_type: SessionType,
    pub data: u64,
    pub read_vector: Vec<u64>,
    pub write_vector: Vec<u64>,
}

/// Reply to a [`ClientRequest`].
///
/// `succeeded == false` means the dependency check refused the request; the
/// replica did not mutate and the client should try another replica. On
/// success the client overwrites its session vectors wholesale with the two
/// vectors returned here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientReply {
    pub succeeded: bool,
    pub op_type: OpType,
    pub data: u64,
    pub read_vector: Vec<u64>,
    pub write_vector: Vec<u64>,
}

/// One anti-entropy push: every operation the sender originated since its
/// last tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GossipRequest {
    pub from_id: u64,
    pub operations: Vec<Operation>,
}

/// Acknowledgment of a gossip push. Carries nothing; receipt is enough.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GossipAck {}
