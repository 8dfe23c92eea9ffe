//! Paxos message shapes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub proposal: u64,
}

/// Phase-1 reply. `accepted_proposal == 0` means nothing accepted yet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrepareReply {
    pub promised: bool,
    pub accepted_proposal: u64,
    pub accepted_value: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub proposal: u64,
    pub value: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptReply {
    pub succeeded: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {}

/// Quorum-read reply: the acceptor's current accepted pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadReply {
    pub accepted_proposal: u64,
    pub accepted_value: u64,
}
