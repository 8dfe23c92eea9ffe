//! The ABD client: two-phase reads and writes over a majority.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{ReadRequest, WriteRequest};
use crate::transport::AbdTransport;

#[derive(Debug, Error)]
pub enum AbdError {
    #[error("{phase} quorum not reached: {got} of {needed}")]
    QuorumNotReached {
        phase: &'static str,
        got: usize,
        needed: usize,
    },
}

/// A client of one ABD cluster.
pub struct AbdClient<T: AbdTransport> {
    id: u64,
    transport: Arc<T>,
}

impl<T: AbdTransport> AbdClient<T> {
    pub fn new(id: u64, transport: Arc<T>) -> Self {
        Self { id, transport }
    }

    fn majority(&self) -> usize {
        self.transport.server_count() / 2 + 1
    }

    /// Query a majority and return the highest `(version, value)` seen.
    async fn read_quorum(&self, phase: &'static str) -> Result<(u64, u64), AbdError> {
        let needed = self.majority();
        let mut replies = 0;
        let mut best = (0u64, 0u64);
        for server in 0..self.transport.server_count() {
            match self.transport.read(server, &ReadRequest {}).await {
                Ok(reply) => {
                    replies += 1;
                    if reply.version > best.0 {
                        best = (reply.version, reply.value);
                    }
                }
                Err(e) => warn!(client = self.id, server, error = %e, "read failed"),
            }
        }
        if replies < needed {
            return Err(AbdError::QuorumNotReached {
                phase,
                got: replies,
                needed,
            });
        }
        Ok(best)
    }

    /// Push `(version, value)` to a majority.
    async fn write_quorum(
        &self,
        phase: &'static str,
        version: u64,
        value: u64,
    ) -> Result<(), AbdError> {
        let needed = self.majority();
        let mut acks = 0;
        for server in 0..self.transport.server_count() {
            match self
                .transport
                .write(server, &WriteRequest { version, value })
                .await
            {
                Ok(_) => acks += 1,
                Err(e) => warn!(client = self.id, server, error = %e, "write failed"),
            }
        }
        if acks < needed {
            return Err(AbdError::QuorumNotReached {
                phase,
                got: acks,
                needed,
            });
        }
        Ok(())
    }

    /// Write `value`: learn the highest version from a majority, then store
    /// the value at `version + 1` on a majority.
    pub async fn write(&self, value: u64) -> Result<(), AbdError> {
        let (version, _) = self.read_quorum("write-read").await?;
        debug!(client = self.id, version = version + 1, value, "writing");
        self.write_quorum("write", version + 1, value).await
    }

    /// Read the register: take the highest pair from a majority, write it
    /// back to a majority, and return the value.
    pub async fn read(&self) -> Result<u64, AbdError> {
        let (version, value) = self.read_quorum("read").await?;
        if version > 0 {
            self.write_quorum("read-back", version, value).await?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ReadRequest;
    use crate::transport::LocalAbdTransport;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let transport = Arc::new(LocalAbdTransport::new(3));
        let client = AbdClient::new(0, transport.clone());

        client.write(42).await.unwrap();
        assert_eq!(client.read().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn versions_increase_across_writes() {
        let transport = Arc::new(LocalAbdTransport::new(3));
        let client = AbdClient::new(0, transport.clone());

        client.write(1).await.unwrap();
        client.write(2).await.unwrap();
        client.write(3).await.unwrap();

        assert_eq!(client.read().await.unwrap(), 3);
        let reply = transport.server(0).read(&ReadRequest {});
        assert_eq!(reply.version, 3);
    }

    #[tokio::test]
    async fn read_writes_back_to_lagging_servers() {
        let transport = Arc::new(LocalAbdTransport::new(3));
        let client = AbdClient::new(0, transport.clone());

        // Server 2 misses the write.
        transport.set_down(2, true);
        client.write(7).await.unwrap();
        transport.set_down(2, false);
        assert_eq!(transport.server(2).read(&ReadRequest {}).version, 0);

        // The read's write-back phase catches it up.
        assert_eq!(client.read().await.unwrap(), 7);
        assert_eq!(transport.server(2).read(&ReadRequest {}).version, 1);
        assert_eq!(transport.server(2).read(&ReadRequest {}).value, 7);
    }

    #[tokio::test]
    async fn majority_down_is_an_error() {
        let transport = Arc::new(LocalAbdTransport::new(3));
        transport.set_down(0, true);
        transport.set_down(1, true);

        let client = AbdClient::new(0, transport.clone());
        assert!(client.write(5).await.is_err());
        assert!(client.read().await.is_err());
    }

    #[tokio::test]
    async fn one_server_down_still_reaches_quorum() {
        let transport = Arc::new(LocalAbdTransport::new(3));
        transport.set_down(1, true);

        let client = AbdClient::new(0, transport.clone());
        client.write(9).await.unwrap();
        assert_eq!(client.read().await.unwrap(), 9);
    }
}
