//! Incoming RPC side: method dispatch and the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::wire::{Request, Response, RpcError};

/// A remotely callable service: dispatches one method call at a time.
///
/// Implementations hold their own state lock; dispatch bodies are synchronous
/// and bounded (no network calls inside a handler).
pub trait Service: Send + Sync + 'static {
    fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

/// Listening side of the transport.
pub struct RpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RpcServer {
    /// Bind to `address` (e.g. `"127.0.0.1:0"` for an ephemeral port).
    pub async fn bind(address: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address, useful with ephemeral ports.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept loop: one task per inbound connection, requests answered in
    /// order per connection. Runs until the listener errors.
    pub async fn run(self, service: Arc<dyn Service>) -> std::io::Result<()> {
        debug!(address = %self.local_addr, "rpc server listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let service = service.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, service).await {
                    debug!(%peer, error = %e, "connection closed");
                }
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    service: Arc<dyn Service>,
) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match service.dispatch(&request.method, request.params) {
                Ok(value) => Response::ok(value),
                Err(e) => {
                    warn!(method = %request.method, error = %e, "dispatch failed");
                    Response::err(e.to_string())
                }
            },
            Err(e) => Response::err(format!("malformed request: {e}")),
        };

        let mut frame = serde_json::to_vec(&response).unwrap_or_else(|e| {
            serde_json::to_vec(&Response::err(format!("encode failed: {e}")))
                .expect("plain error response encodes")
        });
        frame.push(b'\n');
        write.write_all(&frame).await?;
        write.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RpcClient;
    use crate::wire::Connection;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct EchoRequest {
        text: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct EchoReply {
        text: String,
        calls: u64,
    }

    struct EchoService {
        calls: parking_lot::Mutex<u64>,
    }

    impl Service for EchoService {
        fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
            match method {
                "echo" => {
                    let req: EchoRequest = serde_json::from_value(params)?;
                    let mut calls = self.calls.lock();
                    *calls += 1;
                    Ok(serde_json::to_value(EchoReply {
                        text: req.text,
                        calls: *calls,
                    })?)
                }
                other => Err(RpcError::NoSuchMethod(other.to_string())),
            }
        }
    }

    async fn start_echo() -> Connection {
        let server = RpcServer::bind("127.0.0.1:0").await.unwrap();
        let address = server.local_addr().to_string();
        tokio::spawn(server.run(Arc::new(EchoService {
            calls: parking_lot::Mutex::new(0),
        })));
        Connection::tcp(address)
    }

    #[tokio::test]
    async fn round_trip() {
        let conn = start_echo().await;
        let client = RpcClient::new();

        let reply: EchoReply = client
            .invoke(
                &conn,
                "echo",
                &EchoRequest {
                    text: "hello".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(reply.text, "hello");
        assert_eq!(reply.calls, 1);
    }

    #[tokio::test]
    async fn connection_is_reused_across_calls() {
        let conn = start_echo().await;
        let client = RpcClient::new();

        for expected in 1..=3u64 {
            let reply: EchoReply = client
                .invoke(
                    &conn,
                    "echo",
                    &EchoRequest {
                        text: "again".to_string(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(reply.calls, expected);
        }
    }

    #[tokio::test]
    async fn unknown_method_is_a_remote_error() {
        let conn = start_echo().await;
        let client = RpcClient::new();

        let result: Result<EchoReply, _> = client
            .invoke(
                &conn,
                "nope",
                &EchoRequest {
                    text: String::new(),
                },
            )
            .await;
        match result {
            Err(RpcError::Remote(message)) => assert!(message.contains("no such method")),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_peer_is_a_connect_error() {
        // Bind-then-drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = RpcClient::with_timeout(Duration::from_millis(500));
        let result: Result<EchoReply, _> = client
            .invoke(
                &Connection::tcp(address),
                "echo",
                &EchoRequest {
                    text: String::new(),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(RpcError::Connect { .. }) | Err(RpcError::Timeout { .. })
        ));
    }
}
