//! The acceptor: promise bookkeeping and the accepted pair.

use parking_lot::Mutex;
use tracing::debug;

use crate::protocol::{
    AcceptReply, AcceptRequest, PrepareReply, PrepareRequest, ReadReply, ReadRequest,
};

#[derive(Debug, Default)]
struct State {
    highest_promised: u64,
    accepted: Option<(u64, u64)>,
}

/// One Paxos acceptor. Proposal numbers come from the sequencer and start
/// at 1, so 0 always means "none yet".
#[derive(Debug)]
pub struct Acceptor {
    id: u64,
    state: Mutex<State>,
}

impl Acceptor {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: Mutex::new(State::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Phase 1: promise `proposal` iff it exceeds every earlier promise,
    /// reporting the highest accepted pair either way.
    pub fn prepare(&self, req: &PrepareRequest) -> PrepareReply {
        let mut state = self.state.lock();
        let promised = req.proposal > state.highest_promised;
        if promised {
            state.highest_promised = req.proposal;
        }
        let (accepted_proposal, accepted_value) = state.accepted.unwrap_or((0, 0));
        debug!(
            acceptor = self.id,
            proposal = req.proposal,
            promised,
            "prepare"
        );
        PrepareReply {
            promised,
            accepted_proposal,
            accepted_value,
        }
    }

    /// Phase 2: accept unless a higher proposal has been promised since.
    pub fn accept(&self, req: &AcceptRequest) -> AcceptReply {
        let mut state = self.state.lock();
        let succeeded = req.proposal >= state.highest_promised;
        if succeeded {
            state.highest_promised = req.proposal;
            state.accepted = Some((req.proposal, req.value));
        }
        debug!(
            acceptor = self.id,
            proposal = req.proposal,
            value = req.value,
            succeeded,
            "accept"
        );
        AcceptReply { succeeded }
    }

    /// Report the current accepted pair for a quorum read.
    pub fn quorum_read(&self, _req: &ReadRequest) -> ReadReply {
        let state = self.state.lock();
        let (accepted_proposal, accepted_value) = state.accepted.unwrap_or((0, 0));
        ReadReply {
            accepted_proposal,
            accepted_value,
        }
    }
}
