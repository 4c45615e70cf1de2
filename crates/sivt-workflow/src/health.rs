//! Live cluster status next to what the state document records

use std::fmt;

use tracing::{info, warn};

use sivt_common::{ClusterRef, Health, Result};

use crate::context::{Actuators, RunContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHealth {
    pub cluster: ClusterRef,
    pub name: String,
    pub deployed: bool,
    pub version: String,
    pub live: Health,
}

impl fmt::Display for ClusterHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = match self.live {
            Health::Up => "UP",
            Health::Down => "DOWN",
        };
        let version = if self.version.is_empty() { "-" } else { &self.version };
        write!(
            f,
            "{} [{}]: deployed={} version={} health={}",
            self.cluster, self.name, self.deployed, version, live
        )
    }
}

/// One line per declared cluster, management first
pub async fn check_health(ctx: &RunContext, act: &Actuators) -> Result<Vec<ClusterHealth>> {
    let state = ctx.store.load()?;
    let live = act.clusters.list_all().await?;

    let report: Vec<ClusterHealth> = ctx
        .spec
        .clusters()
        .into_iter()
        .map(|decl| {
            let status = state.status(&decl.cluster);
            let running = live
                .iter()
                .any(|c| c.name == decl.name && c.is_running());
            ClusterHealth {
                cluster: decl.cluster,
                name: decl.name.to_string(),
                deployed: status.deployed,
                version: status.version,
                live: if running { Health::Up } else { Health::Down },
            }
        })
        .collect();

    for entry in &report {
        if entry.deployed && entry.live == Health::Down {
            warn!(cluster = %entry.name, "Cluster is recorded as deployed but is not running");
        } else {
            info!(cluster = %entry.name, "{entry}");
        }
    }
    Ok(report)
}
