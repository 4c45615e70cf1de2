//! `sivt check-health`

use std::path::Path;

use sivt_common::{Error as CommonError, Health};
use sivt_workflow::health::{self, ClusterHealth};

use super::Session;
use crate::Result;

/// Deployed clusters that are not running
fn unhealthy(report: &[ClusterHealth]) -> Vec<&str> {
    report
        .iter()
        .filter(|c| c.deployed && c.live == Health::Down)
        .map(|c| c.name.as_str())
        .collect()
}

pub async fn run(root_dir: &Path) -> Result<()> {
    let session = Session::open(root_dir)?;
    let report = health::check_health(&session.ctx, &session.act).await?;
    for entry in &report {
        println!("{entry}");
    }
    let down = unhealthy(&report);
    if down.is_empty() {
        Ok(())
    } else {
        Err(CommonError::actuation(down.join(","), "deployed cluster health is DOWN").into())
    }
}
