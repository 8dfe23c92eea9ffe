//! Convergence under the real background gossip driver.

use std::sync::Arc;
use std::time::Duration;

use sessreg_causal::{Cluster, GossipDriver, GossipHandle, SessionClient, SessionType};

fn spawn_drivers(cluster: &Arc<Cluster>) -> Vec<GossipHandle> {
    (0..cluster.len())
        .map(|idx| {
            GossipDriver::with_period(
                cluster.replica(idx).clone(),
                cluster.clone(),
                Duration::from_millis(10),
            )
            .spawn()
        })
        .collect()
}

async fn wait_for_convergence(cluster: &Cluster) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cluster.converged() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "cluster did not converge in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn background_gossip_converges_a_single_write() {
    let cluster = Arc::new(Cluster::new(3));
    let drivers = spawn_drivers(&cluster);

    let client = SessionClient::new(0, cluster.clone());
    client.write(42, SessionType::Causal).await.unwrap();

    wait_for_convergence(&cluster).await;
    for idx in 0..cluster.len() {
        assert_eq!(cluster.replica(idx).value(), 42);
    }

    for handle in drivers {
        handle.stop().await;
    }
}

#[tokio::test]
async fn interleaved_sessions_converge_to_one_log() {
    let cluster = Arc::new(Cluster::new(3));
    let drivers = spawn_drivers(&cluster);

    let clients: Vec<_> = (0..3u64)
        .map(|id| SessionClient::new(id, cluster.clone()))
        .collect();

    let mut written = 0u64;
    for round in 0..5u64 {
        for client in &clients {
            client
                .write(round * 10 + client.id(), SessionType::Causal)
                .await
                .unwrap();
            written += 1;
            client.read(SessionType::Causal).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    wait_for_convergence(&cluster).await;

    // One identical, duplicate-free log everywhere, holding every write.
    let log = cluster.replica(0).operations();
    assert_eq!(log.len() as u64, written);
    for idx in 1..cluster.len() {
        assert_eq!(cluster.replica(idx).operations(), log);
    }

    // After quiescence every session can read anywhere.
    for client in &clients {
        client.read(SessionType::Causal).await.unwrap();
    }

    for handle in drivers {
        handle.stop().await;
    }
}

#[tokio::test]
async fn driver_stops_cleanly() {
    let cluster = Arc::new(Cluster::new(2));
    let handle = GossipDriver::with_period(
        cluster.replica(0).clone(),
        cluster.clone(),
        Duration::from_millis(10),
    )
    .spawn();

    // Stopping is prompt even while the driver is mid-sleep.
    tokio::time::timeout(Duration::from_secs(1), handle.stop())
        .await
        .expect("driver stopped within the timeout");
}
