//! Single-decree Paxos over a register, classroom edition.
//!
//! One register, `N` acceptors, a central sequencer handing out
//! monotonically increasing proposal numbers, and a proposer client that
//! runs the two classic phases against a majority:
//!
//! 1. **Prepare(n)**: acceptors promise not to accept anything below `n`
//!    and report their highest accepted `(n, value)` pair.
//! 2. **Accept(n, v)**: `v` is the highest previously accepted value seen
//!    in phase 1, or the proposer's own; acceptors accept unless they have
//!    promised a higher `n` in the meantime.
//!
//! Reads gather the accepted pairs from a majority and take the value of
//! the highest proposal. Falling short of a majority in any phase is an
//! error; the caller retries with a fresh proposal number.

pub mod acceptor;
pub mod proposer;
pub mod protocol;
pub mod sequencer;
pub mod transport;

pub use acceptor::Acceptor;
pub use proposer::{PaxosError, Proposer};
pub use protocol::{
    AcceptReply, AcceptRequest, PrepareReply, PrepareRequest, ReadReply, ReadRequest,
};
pub use sequencer::Sequencer;
pub use transport::{LocalPaxosTransport, PaxosTransport, RpcPaxosTransport};
