//! The ABD register server: a versioned cell behind one lock.

use parking_lot::Mutex;
use tracing::debug;

use crate::protocol::{ReadReply, ReadRequest, WriteReply, WriteRequest};

#[derive(Debug, Default)]
struct State {
    version: u64,
    value: u64,
}

#[derive(Debug)]
pub struct AbdServer {
    id: u64,
    state: Mutex<State>,
}

impl AbdServer {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: Mutex::new(State::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn read(&self, _req: &ReadRequest) -> ReadReply {
        let state = self.state.lock();
        ReadReply {
            version: state.version,
            value: state.value,
        }
    }

    /// Adopt the pair iff it is strictly newer; stale writes are ignored.
    pub fn write(&self, req: &WriteRequest) -> WriteReply {
        let mut state = self.state.lock();
        if req.version > state.version {
            state.version = req.version;
            state.value = req.value;
            debug!(
                server = self.id,
                version = req.version,
                value = req.value,
                "adopted write"
            );
        } else {
            debug!(server = self.id, version = req.version, "ignored stale write");
        }
        WriteReply {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_version_zero_value_zero() {
        let server = AbdServer::new(0);
        let reply = server.read(&ReadRequest {});
        assert_eq!(reply.version, 0);
        assert_eq!(reply.value, 0);
    }

    #[test]
    fn adopts_only_strictly_newer_versions() {
        let server = AbdServer::new(0);
        server.write(&WriteRequest {
            version: 2,
            value: 20,
        });
        assert_eq!(server.read(&ReadRequest {}).value, 20);

        // Same version: ignored.
        server.write(&WriteRequest {
            version: 2,
            value: 99,
        });
        assert_eq!(server.read(&ReadRequest {}).value, 20);

        // Older version: ignored.
        server.write(&WriteRequest {
            version: 1,
            value: 10,
        });
        assert_eq!(server.read(&ReadRequest {}).value, 20);

        server.write(&WriteRequest {
            version: 3,
            value: 30,
        });
        assert_eq!(server.read(&ReadRequest {}).value, 30);
    }
}
