//! The proposer: two majority phases per write, one per read.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{AcceptRequest, PrepareRequest, ReadRequest};
use crate::transport::PaxosTransport;

#[derive(Debug, Error)]
pub enum PaxosError {
    #[error("{phase} quorum not reached: {got} of {needed}")]
    QuorumNotReached {
        phase: &'static str,
        got: usize,
        needed: usize,
    },

    #[error("sequencer unavailable: {0}")]
    Sequencer(#[from] sessreg_rpc::RpcError),
}

/// A proposer client over one Paxos cluster.
pub struct Proposer<T: PaxosTransport> {
    id: u64,
    transport: Arc<T>,
}

impl<T: PaxosTransport> Proposer<T> {
    pub fn new(id: u64, transport: Arc<T>) -> Self {
        Self { id, transport }
    }

    fn majority(&self) -> usize {
        self.transport.acceptor_count() / 2 + 1
    }

    /// Propose `value`. Returns the value actually chosen, which is the
    /// highest previously accepted value if phase 1 uncovered one.
    ///
    /// Quorum failure in either phase is an error; retry with a fresh call
    /// (which fetches a fresh proposal number).
    pub async fn write(&self, value: u64) -> Result<u64, PaxosError> {
        let proposal = self.transport.next_proposal().await?;
        let needed = self.majority();

        // Phase 1: collect promises and the highest accepted pair.
        let mut promised = 0;
        let mut adopted = (0u64, value);
        for acceptor in 0..self.transport.acceptor_count() {
            match self
                .transport
                .prepare(acceptor, &PrepareRequest { proposal })
                .await
            {
                Ok(reply) if reply.promised => {
                    promised += 1;
                    if reply.accepted_proposal > adopted.0 {
                        adopted = (reply.accepted_proposal, reply.accepted_value);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(proposer = self.id, acceptor, error = %e, "prepare failed"),
            }
        }
        if promised < needed {
            return Err(PaxosError::QuorumNotReached {
                phase: "prepare",
                got: promised,
                needed,
            });
        }

        let chosen = adopted.1;
        debug!(
            proposer = self.id,
            proposal,
            value = chosen,
            "prepare majority reached"
        );

        // Phase 2: push the adopted value.
        let mut accepted = 0;
        for acceptor in 0..self.transport.acceptor_count() {
            match self
                .transport
                .accept(
                    acceptor,
                    &AcceptRequest {
                        proposal,
                        value: chosen,
                    },
                )
                .await
            {
                Ok(reply) if reply.succeeded => accepted += 1,
                Ok(_) => {}
                Err(e) => warn!(proposer = self.id, acceptor, error = %e, "accept failed"),
            }
        }
        if accepted < needed {
            return Err(PaxosError::QuorumNotReached {
                phase: "accept",
                got: accepted,
                needed,
            });
        }

        Ok(chosen)
    }

    /// Read the register: gather accepted pairs from a majority and return
    /// the value of the highest proposal (0 if nothing is chosen yet).
    pub async fn read(&self) -> Result<u64, PaxosError> {
        let needed = self.majority();
        let mut replies = 0;
        let mut best = (0u64, 0u64);
        for acceptor in 0..self.transport.acceptor_count() {
            match self.transport.quorum_read(acceptor, &ReadRequest {}).await {
                Ok(reply) => {
                    replies += 1;
                    if reply.accepted_proposal > best.0 {
                        best = (reply.accepted_proposal, reply.accepted_value);
                    }
                }
                Err(e) => warn!(proposer = self.id, acceptor, error = %e, "quorum read failed"),
            }
        }
        if replies < needed {
            return Err(PaxosError::QuorumNotReached {
                phase: "read",
                got: replies,
                needed,
            });
        }
        Ok(best.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AcceptRequest, PrepareRequest};
    use crate::transport::LocalPaxosTransport;

    #[tokio::test]
    async fn writes_and_reads_a_value() {
        let transport = Arc::new(LocalPaxosTransport::new(3));
        let proposer = Proposer::new(0, transport.clone());

        assert_eq!(proposer.write(42).await.unwrap(), 42);
        assert_eq!(proposer.read().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn adopts_a_previously_accepted_value() {
        let transport = Arc::new(LocalPaxosTransport::new(3));

        // A majority already accepted 7 under proposal 1.
        for idx in 0..2 {
            let acceptor = transport.acceptor(idx);
            acceptor.prepare(&PrepareRequest { proposal: 1 });
            acceptor.accept(&AcceptRequest {
                proposal: 1,
                value: 7,
            });
        }
        // Keep the sequencer ahead of the seeded proposal.
        transport.next_proposal().await.unwrap();

        // A later proposer must carry 7, not its own value.
        let proposer = Proposer::new(1, transport.clone());
        assert_eq!(proposer.write(99).await.unwrap(), 7);
        assert_eq!(proposer.read().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn quorum_failure_is_an_error() {
        let transport = Arc::new(LocalPaxosTransport::new(3));
        transport.set_down(0, true);
        transport.set_down(1, true);

        let proposer = Proposer::new(0, transport.clone());
        match proposer.write(5).await {
            Err(PaxosError::QuorumNotReached { phase, .. }) => assert_eq!(phase, "prepare"),
            other => panic!("expected quorum failure, got {other:?}"),
        }
        assert!(proposer.read().await.is_err());
    }

    #[tokio::test]
    async fn one_acceptor_down_still_reaches_quorum() {
        let transport = Arc::new(LocalPaxosTransport::new(3));
        transport.set_down(2, true);

        let proposer = Proposer::new(0, transport.clone());
        assert_eq!(proposer.write(11).await.unwrap(), 11);
        assert_eq!(proposer.read().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn later_proposal_wins_the_register() {
        let transport = Arc::new(LocalPaxosTransport::new(3));

        let first = Proposer::new(0, transport.clone());
        let chosen = first.write(1).await.unwrap();
        assert_eq!(chosen, 1);

        // Once a value is chosen, every later proposal re-chooses it.
        let second = Proposer::new(1, transport.clone());
        assert_eq!(second.write(2).await.unwrap(), 1);
        assert_eq!(second.read().await.unwrap(), 1);
    }
}
