//! `sivt validate`: input documents and bootstrap host tooling

use std::path::Path;

use clap::Subcommand;
use tracing::info;

use sivt_common::RootLayout;
use sivt_workflow::{tools, RunContext};

use super::Session;
use crate::Result;

#[derive(Subcommand, Debug)]
pub enum ValidateCommand {
    /// Parse every input document and create the state file if absent
    Spec,
    /// Check installed tool versions against the support matrix
    Env,
}

pub async fn run(root_dir: &Path, command: ValidateCommand) -> Result<()> {
    match command {
        ValidateCommand::Spec => validate_spec(root_dir),
        ValidateCommand::Env => {
            let session = Session::open(root_dir)?;
            let reports = tools::validate_env(&session.ctx, &session.act).await?;
            for report in &reports {
                println!("{report}");
            }
            tools::require_all(&reports)?;
            Ok(())
        }
    }
}

fn validate_spec(root_dir: &Path) -> Result<()> {
    let ctx = RunContext::load(&RootLayout::new(root_dir))?;
    ctx.store.init_fresh()?;
    let state = ctx.store.load()?;
    info!(
        target = %ctx.target_version(),
        workload_clusters = state.workload_clusters.len(),
        "Inputs are valid"
    );
    println!(
        "Deployment config is valid for Tanzu version {}",
        ctx.target_version()
    );
    Ok(())
}
