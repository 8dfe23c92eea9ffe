//! # sessreg-node
//!
//! One process of a sessreg cluster: a register server, a workload client,
//! or the Paxos sequencer, selected by subcommand. The cluster layout and
//! the client's workload script come from a JSON config file.
//!
//! ```text
//! sessreg-node server 0 --config cluster.json
//! sessreg-node client 0 --config cluster.json --protocol causal
//! sessreg-node sequencer --config cluster.json --protocol paxos
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sessreg_abd::{AbdClient, AbdServer, RpcAbdTransport};
use sessreg_causal::service::ReplicaService;
use sessreg_causal::{
    CausalTransport, GossipDriver, Replica, RpcTransport, SessionClient, SessionType,
};
use sessreg_paxos::transport::{AcceptorService, SequencerService};
use sessreg_paxos::{Acceptor, Proposer, RpcPaxosTransport, Sequencer};
use sessreg_rpc::{RpcClient, RpcServer};

mod config;
use config::{Config, WorkloadKind};

#[derive(Parser)]
#[command(name = "sessreg-node")]
#[command(about = "Replicated-register node: server, client, or sequencer")]
#[command(version)]
struct Cli {
    /// Path to the cluster config file.
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Which register protocol this cluster runs.
    #[arg(long, global = true, value_enum, default_value_t = Protocol::Causal)]
    protocol: Protocol,

    #[command(subcommand)]
    role: Role,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Protocol {
    Causal,
    Paxos,
    Abd,
}

#[derive(Subcommand)]
enum Role {
    /// Run replica `id` (an acceptor under paxos).
    Server { id: u64 },
    /// Run workload client `id`.
    Client { id: u64 },
    /// Run the Paxos proposal-number sequencer.
    Sequencer,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.role {
        Role::Server { id } => run_server(cli.protocol, id, &config).await,
        Role::Client { id } => run_client(cli.protocol, id, &config).await,
        Role::Sequencer => run_sequencer(cli.protocol, &config).await,
    }
}

fn server_address(config: &Config, id: u64) -> anyhow::Result<&str> {
    let conn = config
        .servers
        .get(id as usize)
        .with_context(|| format!("no server {id} in config ({} listed)", config.servers.len()))?;
    Ok(&conn.address)
}

async fn run_server(protocol: Protocol, id: u64, config: &Config) -> anyhow::Result<()> {
    let address = server_address(config, id)?;
    let server = RpcServer::bind(address)
        .await
        .with_context(|| format!("binding server {id} to {address}"))?;
    info!(id, %address, ?protocol, "server listening");

    match protocol {
        Protocol::Causal => {
            let replica = Arc::new(Replica::new(id, config.servers.len()));
            let transport = Arc::new(RpcTransport::new(
                Arc::new(RpcClient::new()),
                config.servers.clone(),
            ));
            let gossip = GossipDriver::new(replica.clone(), transport).spawn();
            let result = server.run(Arc::new(ReplicaService::new(replica))).await;
            gossip.stop().await;
            result?;
        }
        Protocol::Paxos => {
            let acceptor = Arc::new(Acceptor::new(id));
            server.run(Arc::new(AcceptorService::new(acceptor))).await?;
        }
        Protocol::Abd => {
            let register = Arc::new(AbdServer::new(id));
            server
                .run(Arc::new(sessreg_abd::transport::AbdService::new(register)))
                .await?;
        }
    }
    Ok(())
}

async fn run_sequencer(protocol: Protocol, config: &Config) -> anyhow::Result<()> {
    anyhow::ensure!(
        matches!(protocol, Protocol::Paxos),
        "only the paxos protocol uses a sequencer"
    );
    let conn = config
        .sequencer
        .first()
        .context("config lists no sequencer")?;
    let server = RpcServer::bind(&conn.address)
        .await
        .with_context(|| format!("binding sequencer to {}", conn.address))?;
    info!(address = %conn.address, "sequencer listening");
    server
        .run(Arc::new(SequencerService::new(Arc::new(Sequencer::new()))))
        .await?;
    Ok(())
}

async fn run_client(protocol: Protocol, id: u64, config: &Config) -> anyhow::Result<()> {
    info!(id, ?protocol, ops = config.workloads.len(), "client starting");
    match protocol {
        Protocol::Causal => run_causal_client(id, config).await,
        Protocol::Paxos => run_paxos_client(id, config).await,
        Protocol::Abd => run_abd_client(id, config).await,
    }
}

async fn run_causal_client(id: u64, config: &Config) -> anyhow::Result<()> {
    let transport = Arc::new(RpcTransport::new(
        Arc::new(RpcClient::new()),
        config.servers.clone(),
    ));
    let client = SessionClient::new(id, transport.clone());

    for op in &config.workloads {
        match op.kind {
            WorkloadKind::Read => {
                let value = client.read(SessionType::Causal).await?;
                info!(client = id, value, "read");
            }
            WorkloadKind::Write => {
                client.write(op.value, SessionType::Causal).await?;
                info!(client = id, value = op.value, "write");
            }
        }
        if op.delay > 0 {
            tokio::time::sleep(Duration::from_millis(op.delay)).await;
        }
    }

    // Let the last gossip round land, then show each replica's log.
    tokio::time::sleep(Duration::from_millis(500)).await;
    for replica in 0..config.servers.len() {
        match transport.operations(replica).await {
            Ok(operations) => {
                let last = operations.last().map(|op| op.data);
                info!(client = id, replica, ops = operations.len(), ?last, "applied log");
            }
            Err(e) => info!(client = id, replica, error = %e, "log unavailable"),
        }
    }
    Ok(())
}

async fn run_paxos_client(id: u64, config: &Config) -> anyhow::Result<()> {
    let sequencer = config
        .sequencer
        .first()
        .context("config lists no sequencer")?
        .clone();
    let transport = Arc::new(RpcPaxosTransport::new(
        Arc::new(RpcClient::new()),
        config.servers.clone(),
        sequencer,
    ));
    let proposer = Proposer::new(id, transport);

    for op in &config.workloads {
        match op.kind {
            WorkloadKind::Read => {
                let value = proposer.read().await?;
                info!(client = id, value, "quorum read");
            }
            WorkloadKind::Write => {
                let chosen = proposer.write(op.value).await?;
                info!(client = id, proposed = op.value, chosen, "write");
            }
        }
        if op.delay > 0 {
            tokio::time::sleep(Duration::from_millis(op.delay)).await;
        }
    }
    Ok(())
}

async fn run_abd_client(id: u64, config: &Config) -> anyhow::Result<()> {
    let transport = Arc::new(RpcAbdTransport::new(
        Arc::new(RpcClient::new()),
        config.servers.clone(),
    ));
    let client = AbdClient::new(id, transport);

    for op in &config.workloads {
        match op.kind {
            WorkloadKind::Read => {
                let value = client.read().await?;
                info!(client = id, value, "read");
            }
            WorkloadKind::Write => {
                client.write(op.value).await?;
                info!(client = id, value = op.value, "write");
            }
        }
        if op.delay > 0 {
            tokio::time::sleep(Duration::from_millis(op.delay)).await;
        }
    }
    Ok(())
}
