//! The replica state machine.
//!
//! One exclusive lock guards the whole state: the current clock, the
//! register value, the applied log, the locally originated log awaiting
//! gossip, and the pending set of gossiped operations that are not yet
//! admissible. Every public operation takes the lock for its entire body;
//! nothing blocks while holding it.
//!
//! A refused dependency check is a normal reply (`succeeded == false`), not
//! an error: the replica is merely not caught up yet, and the client is
//! expected to try another one.

use parking_lot::Mutex;
use sessreg_clock as clock;
use tracing::debug;

use crate::op::{self, Operation};
use crate::protocol::{ClientReply, ClientRequest, GossipAck, GossipRequest, OpType, SessionType};

/// Index of a replica in the fixed cluster, also its tie-breaker.
pub type ReplicaId = u64;

#[derive(Debug)]
struct State {
    /// Pointwise max of the applied log's clocks; all zeros when empty.
    vc: Vec<u64>,
    /// Data of the last applied operation, 0 when the log is empty.
    value: u64,
    /// All applied operations, sorted under [`op::order`] (oldest first).
    applied_log: Vec<Operation>,
    /// Locally originated operations not yet handed to the gossip driver.
    my_log: Vec<Operation>,
    /// Gossiped operations whose dependencies are not yet met.
    pending: Vec<Operation>,
}

/// One of the `N` replicas of the register.
#[derive(Debug)]
pub struct Replica {
    id: ReplicaId,
    state: Mutex<State>,
}

impl Replica {
    /// Create replica `id` of a cluster of `cluster_size` replicas.
    pub fn new(id: ReplicaId, cluster_size: usize) -> Self {
        assert!(
            (id as usize) < cluster_size,
            "replica id {id} out of range for cluster of {cluster_size}"
        );
        Self {
            id,
            state: Mutex::new(State {
                vc: vec![0; cluster_size],
                value: 0,
                applied_log: Vec::new(),
                my_log: Vec::new(),
                pending: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    /// The server-side session predicate: may this request run here yet?
    pub fn dependency_check(vc: &[u64], req: &ClientRequest) -> bool {
        match req.session_type {
            SessionType::Causal => {
                clock::dominates(vc, &req.write_vector) && clock::dominates(vc, &req.read_vector)
            }
            SessionType::MonotonicReads => clock::dominates(vc, &req.read_vector),
            SessionType::MonotonicWrites => clock::dominates(vc, &req.write_vector),
            SessionType::ReadYourWrites => clock::dominates(vc, &req.write_vector),
            SessionType::WritesFollowReads => clock::dominates(vc, &req.read_vector),
        }
    }

    /// Serve one client read or write.
    ///
    /// Every vector placed in the reply or recorded in an operation is an
    /// independent copy; the live clock is never shared out.
    pub fn process_client_request(&self, req: &ClientRequest) -> ClientReply {
        let mut state = self.state.lock();

        if !Self::dependency_check(&state.vc, req) {
            debug!(
                replica = self.id,
                session = ?req.session_type,
                "dependency check refused request"
            );
            return ClientReply {
                succeeded: false,
                op_type: req.op_type,
                data: 0,
                read_vector: req.read_vector.clone(),
                write_vector: req.write_vector.clone(),
            };
        }

        match req.op_type {
            OpType::Read => ClientReply {
                succeeded: true,
                op_type: OpType::Read,
                data: state.value,
                read_vector: clock::max_of(&req.read_vector, &state.vc),
                write_vector: req.write_vector.clone(),
            },
            OpType::Write => {
                state.vc[self.id as usize] += 1;
                let operation = Operation {
                    kind: OpType::Write,
                    vc: state.vc.clone(),
                    origin: self.id,
                    data: req.data,
                };
                // The new clock dominates every applied operation, so a
                // plain append keeps the log sorted.
                state.applied_log.push(operation.clone());
                state.my_log.push(operation);
                state.value = req.data;
                debug!(replica = self.id, value = req.data, "accepted write");
                ClientReply {
                    succeeded: true,
                    op_type: OpType::Write,
                    data: req.data,
                    read_vector: req.read_vector.clone(),
                    write_vector: state.vc.clone(),
                }
            }
        }
    }

    /// Merge one gossip push from a peer.
    ///
    /// Incoming operations join the pending set (sorted, deduplicated),
    /// then the admissible prefix is applied: already-covered operations
    /// are dropped as duplicates, one-off-admissible ones are appended, and
    /// the scan stops at the first operation with unmet dependencies.
    pub fn receive_gossip(&self, req: &GossipRequest) -> GossipAck {
        if req.operations.is_empty() {
            return GossipAck {};
        }

        let mut state = self.state.lock();
        debug!(
            replica = self.id,
            from = req.from_id,
            count = req.operations.len(),
            "merging gossip"
        );

        let mut merged = std::mem::take(&mut state.pending);
        merged.extend(req.operations.iter().cloned());
        state.pending = op::dedup_and_sort(merged);

        let mut cur = op::max_version(&state.applied_log)
            .unwrap_or_else(|| vec![0; state.vc.len()]);

        let mut admitted = 0;
        while admitted < state.pending.len() {
            let candidate = &state.pending[admitted];
            if clock::dominates(&cur, &candidate.vc) {
                // Already covered by the applied log: a duplicate.
                admitted += 1;
            } else if op::admissible(&cur, candidate) {
                cur = clock::max_of(&cur, &candidate.vc);
                let candidate = candidate.clone();
                state.applied_log.push(candidate);
                admitted += 1;
            } else {
                break;
            }
        }
        state.pending.drain(..admitted);

        state.applied_log = op::dedup_and_sort(std::mem::take(&mut state.applied_log));
        if let Some(vc) = op::max_version(&state.applied_log) {
            state.value = state.applied_log.last().map(|o| o.data).unwrap_or(0);
            state.vc = vc;
        }

        GossipAck {}
    }

    /// Snapshot of the applied log, for diagnostics and tests.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().applied_log.clone()
    }

    /// Atomically snapshot and clear the locally originated log.
    ///
    /// The gossip driver calls this once per tick; atomicity guarantees a
    /// write accepted mid-tick is never dropped between snapshot and clear.
    pub fn take_local_ops(&self) -> Vec<Operation> {
        std::mem::take(&mut self.state.lock().my_log)
    }

    /// Current clock snapshot.
    pub fn clock(&self) -> Vec<u64> {
        self.state.lock().vc.clone()
    }

    /// Current register value.
    pub fn value(&self) -> u64 {
        self.state.lock().value
    }

    /// Number of operations waiting on unmet dependencies.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}
