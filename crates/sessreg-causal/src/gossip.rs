//! The anti-entropy driver.
//!
//! One background task per replica. Each tick it atomically drains the
//! replica's locally originated log and pushes the batch to every peer, so
//! each operation is sent exactly once per origin; receivers deduplicate.
//! The replica lock is held only for the drain — the pushes happen outside
//! it. An RPC failure is logged and otherwise ignored; the tick moves on.
//!
//! The driver stops cooperatively through [`GossipHandle::stop`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::GossipRequest;
use crate::replica::Replica;
use crate::transport::CausalTransport;

pub const DEFAULT_GOSSIP_PERIOD: Duration = Duration::from_millis(50);

/// Periodically pushes a replica's own writes to its peers.
pub struct GossipDriver<T: CausalTransport> {
    replica: Arc<Replica>,
    transport: Arc<T>,
    period: Duration,
}

/// Stops the spawned driver and waits for it to finish.
pub struct GossipHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GossipHandle {
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

impl<T: CausalTransport> GossipDriver<T> {
    pub fn new(replica: Arc<Replica>, transport: Arc<T>) -> Self {
        Self::with_period(replica, transport, DEFAULT_GOSSIP_PERIOD)
    }

    pub fn with_period(replica: Arc<Replica>, transport: Arc<T>, period: Duration) -> Self {
        Self {
            replica,
            transport,
            period,
        }
    }

    /// Spawn the driver loop onto the current runtime.
    pub fn spawn(self) -> GossipHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            debug!(replica = self.replica.id(), "gossip driver started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.period) => self.tick().await,
                    changed = stopped.changed() => {
                        // A dropped handle counts as a stop request too.
                        if changed.is_err() || *stopped.borrow() {
                            debug!(replica = self.replica.id(), "gossip driver stopping");
                            break;
                        }
                    }
                }
            }
        });
        GossipHandle { stop, task }
    }

    /// One round: drain the local log, push it to every peer.
    async fn tick(&self) {
        let operations = self.replica.take_local_ops();
        if operations.is_empty() {
            return;
        }

        let request = GossipRequest {
            from_id: self.replica.id(),
            operations,
        };
        for peer in 0..self.transport.replica_count() {
            if peer as u64 == self.replica.id() {
                continue;
            }
            if let Err(e) = self.transport.receive_gossip(peer, &request).await {
                warn!(
                    replica = self.replica.id(),
                    peer,
                    error = %e,
                    "gossip push failed, dropping until a later origin write"
                );
            }
        }
    }
}
