//! sessreg scenario runner
//!
//! Drives the in-memory cluster harness through the session-guarantee and
//! convergence scenarios at configurable scale, without any networking.
//! Useful for eyeballing protocol behavior and as a quick smoke check.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sessreg_causal::{
    ClientRequest, Cluster, GossipDriver, OpType, SessionClient, SessionType,
};

fn main() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("quick") => {
            rt.block_on(run_sessions());
            rt.block_on(run_convergence(3, 5));
        }
        Some("sessions") => rt.block_on(run_sessions()),
        Some("convergence") => {
            let replicas = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(3);
            let writes = args.get(3).and_then(|a| a.parse().ok()).unwrap_or(10);
            rt.block_on(run_convergence(replicas, writes));
        }
        Some("scaling") => rt.block_on(run_scaling()),
        Some("help" | "--help" | "-h") => print_usage(),
        Some(other) => {
            println!("unknown scenario: {other}");
            print_usage();
        }
    }
}

fn print_usage() {
    println!("Usage: sessreg [scenario]");
    println!();
    println!("Scenarios:");
    println!("  quick                sessions walkthrough + small convergence run (default)");
    println!("  sessions             session-guarantee walkthrough (refusal, retry, gossip)");
    println!("  convergence [n] [w]  n replicas, w writes per client, background gossip");
    println!("  scaling              convergence timing across cluster sizes");
}

fn session_read_at(cluster: &Cluster, idx: usize, client: &SessionClient<Cluster>) -> String {
    let reply = cluster.replica(idx).process_client_request(&ClientRequest {
        op_type: OpType::Read,
        session_type: SessionType::Causal,
        data: 0,
        read_vector: client.read_vector(),
        write_vector: client.write_vector(),
    });
    if reply.succeeded {
        format!("ok, value {}", reply.data)
    } else {
        "refused (not caught up)".to_string()
    }
}

/// Walk through the session-guarantee behavior step by step.
async fn run_sessions() {
    println!("── session guarantees ──────────────────────────────");

    let cluster = Arc::new(Cluster::new(3));
    let client = SessionClient::new(0, cluster.clone());

    client
        .write(42, SessionType::Causal)
        .await
        .expect("a replica accepts the write");
    let origin = client
        .write_vector()
        .iter()
        .position(|&e| e == 1)
        .expect("one coordinate advanced");
    println!(
        "client wrote 42; replica {origin} accepted (write vector {:?})",
        client.write_vector()
    );

    // Before gossip, only the origin can serve this session.
    for idx in 0..cluster.len() {
        println!("  read at replica {idx}: {}", session_read_at(&cluster, idx, &client));
    }

    let value = client
        .read(SessionType::Causal)
        .await
        .expect("the origin serves the session read");
    println!("session read returned {value} after retrying to the origin");

    cluster.gossip_round();
    println!("gossip round ran; every replica now serves the session:");
    for idx in 0..cluster.len() {
        println!("  read at replica {idx}: {}", session_read_at(&cluster, idx, &client));
    }
    println!();
}

/// Concurrent sessions with background gossip, timed until convergence.
async fn run_convergence(replicas: usize, writes_per_client: u64) {
    println!("── convergence: {replicas} replicas, {writes_per_client} writes per client ──");

    let start = Instant::now();
    let cluster = run_workload(replicas, writes_per_client).await;
    let elapsed = start.elapsed();

    let log = cluster.replica(0).operations();
    println!("  total writes   : {}", replicas as u64 * writes_per_client);
    println!("  log length     : {}", log.len());
    println!("  final value    : {}", cluster.replica(0).value());
    println!("  final clock    : {:?}", cluster.replica(0).clock());
    println!("  converged in   : {elapsed:.1?}");
    println!();
}

/// Convergence timing across cluster sizes.
async fn run_scaling() {
    println!("  replicas │ writes │ converged in");
    println!("  ─────────┼────────┼─────────────");
    for replicas in [2usize, 3, 5, 8] {
        let writes = 5u64;
        let start = Instant::now();
        run_workload(replicas, writes).await;
        println!(
            "  {replicas:>8} │ {:>6} │ {:>11.1?}",
            replicas as u64 * writes,
            start.elapsed()
        );
    }
}

/// One full run: spawn gossip drivers, issue the writes, wait for
/// convergence, stop the drivers, and hand the cluster back.
async fn run_workload(replicas: usize, writes_per_client: u64) -> Arc<Cluster> {
    let cluster = Arc::new(Cluster::new(replicas));
    let drivers: Vec<_> = (0..replicas)
        .map(|idx| {
            GossipDriver::with_period(
                cluster.replica(idx).clone(),
                cluster.clone(),
                Duration::from_millis(10),
            )
            .spawn()
        })
        .collect();

    let clients: Vec<_> = (0..replicas as u64)
        .map(|id| SessionClient::new(id, cluster.clone()))
        .collect();
    for round in 0..writes_per_client {
        for client in &clients {
            client
                .write(round * 100 + client.id(), SessionType::Causal)
                .await
                .expect("write accepted");
        }
    }

    while !cluster.converged() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for handle in drivers {
        handle.stop().await;
    }
    cluster
}
