//! End-to-end over real TCP: replicas served through `sessreg-rpc`, the
//! session client and gossip drivers running over the wire transport.

use std::sync::Arc;
use std::time::Duration;

use sessreg_causal::service::ReplicaService;
use sessreg_causal::{
    CausalTransport, GossipDriver, GossipHandle, Replica, RpcTransport, SessionClient, SessionType,
};
use sessreg_rpc::{Connection, RpcClient, RpcServer};

struct WireCluster {
    transport: Arc<RpcTransport>,
    drivers: Vec<GossipHandle>,
}

async fn start_cluster(n: usize) -> WireCluster {
    // Bind every listener first so all addresses are known before any
    // replica starts gossiping.
    let mut servers = Vec::with_capacity(n);
    let mut conns = Vec::with_capacity(n);
    for _ in 0..n {
        let server = RpcServer::bind("127.0.0.1:0").await.expect("bind");
        conns.push(Connection::tcp(server.local_addr().to_string()));
        servers.push(server);
    }

    let mut drivers = Vec::with_capacity(n);
    for (id, server) in servers.into_iter().enumerate() {
        let replica = Arc::new(Replica::new(id as u64, n));
        tokio::spawn(server.run(Arc::new(ReplicaService::new(replica.clone()))));

        let transport = Arc::new(RpcTransport::new(Arc::new(RpcClient::new()), conns.clone()));
        drivers.push(
            GossipDriver::with_period(replica, transport, Duration::from_millis(20)).spawn(),
        );
    }

    let transport = Arc::new(RpcTransport::new(Arc::new(RpcClient::new()), conns));
    WireCluster { transport, drivers }
}

async fn wait_for_log_length(transport: &RpcTransport, n: usize, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    'outer: loop {
        assert!(
            tokio::time::Instant::now() < deadline,
            "replicas did not converge over the wire in time"
        );
        for replica in 0..n {
            match transport.operations(replica).await {
                Ok(ops) if ops.len() == expected => continue,
                _ => {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    continue 'outer;
                }
            }
        }
        break;
    }
}

#[tokio::test]
async fn write_read_and_converge_over_tcp() {
    let cluster = start_cluster(3).await;
    let client = SessionClient::new(0, cluster.transport.clone());

    client.write(42, SessionType::Causal).await.unwrap();
    assert_eq!(client.read(SessionType::Causal).await.unwrap(), 42);

    wait_for_log_length(&cluster.transport, 3, 1).await;

    // Every replica serves the session and reports the same log.
    for replica in 0..3 {
        let ops = cluster.transport.operations(replica).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].data, 42);
    }

    for handle in cluster.drivers {
        handle.stop().await;
    }
}

#[tokio::test]
async fn two_sessions_converge_over_tcp() {
    let cluster = start_cluster(3).await;
    let alice = SessionClient::new(0, cluster.transport.clone());
    let bob = SessionClient::new(1, cluster.transport.clone());

    alice.write(100, SessionType::Causal).await.unwrap();
    bob.write(200, SessionType::Causal).await.unwrap();

    wait_for_log_length(&cluster.transport, 3, 2).await;

    let reference = cluster.transport.operations(0).await.unwrap();
    for replica in 1..3 {
        assert_eq!(
            cluster.transport.operations(replica).await.unwrap(),
            reference
        );
    }

    // Quiesced: both sessions read the same register value everywhere.
    let a = alice.read(SessionType::Causal).await.unwrap();
    let b = bob.read(SessionType::Causal).await.unwrap();
    assert_eq!(a, b);

    for handle in cluster.drivers {
        handle.stop().await;
    }
}
