//! Cluster configuration: server addresses, the sequencer, and the
//! client's workload script.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use sessreg_rpc::Connection;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// One entry per replica; a replica's id indexes into this list.
    pub servers: Vec<Connection>,
    /// The Paxos sequencer (unused by the other protocols).
    #[serde(default)]
    pub sequencer: Vec<Connection>,
    /// The operations a client role executes, in order.
    #[serde(default)]
    pub workloads: Vec<WorkloadOp>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WorkloadOp {
    #[serde(rename = "type", alias = "Type")]
    pub kind: WorkloadKind,
    /// Value for writes; ignored by reads.
    #[serde(default, alias = "Value")]
    pub value: u64,
    /// Delay after the operation, in milliseconds.
    #[serde(default, alias = "Delay")]
    pub delay: u64,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        anyhow::ensure!(!config.servers.is_empty(), "config lists no servers");
        Ok(config)
    }
}
