//! `sivt avi`: NSX ALB controller bring-up and validation

use std::path::Path;

use clap::Subcommand;

use sivt_common::ClusterRef;
use sivt_workflow::{alb, tier, Task};

use super::{finish, Session};
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum AviCommand {
    /// Deploy and configure the NSX ALB controller
    Deploy,
    /// Check the running controller against the deployment config
    Validate,
}

pub async fn run(root_dir: &Path, command: AviCommand) -> Result<()> {
    let session = Session::open(root_dir)?;
    match command {
        AviCommand::Deploy => {
            let report = tier::run_task(
                &session.ctx,
                &session.act,
                &ClusterRef::Management,
                Task::DeployLoadBalancer,
            )
            .await;
            finish(&[report])
        }
        AviCommand::Validate => {
            alb::validate_load_balancer(&session.ctx, &session.act).await?;
            println!("NSX ALB controller {} is valid", session.ctx.spec.avi.controller);
            Ok(())
        }
    }
}
