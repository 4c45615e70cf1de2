//! sivt CLI library

pub mod adapters;
pub mod commands;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::avi::AviCommand;
use commands::dev::DevCommand;
use commands::mgmt::MgmtCommand;
use commands::shared_services::SharedServicesCommand;
use commands::validate::ValidateCommand;
use commands::workload_clusters::WorkloadCommand;

/// Service Installer for VMware Tanzu
#[derive(Parser, Debug)]
#[command(name = "sivt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Environment root holding config, desired state, state and kubeconfig
    #[arg(long, global = true, env = "SIVT_ROOT_DIR", default_value = ".tmp")]
    pub root_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// NSX ALB controller
    #[command(subcommand)]
    Avi(AviCommand),
    /// Management cluster
    #[command(subcommand)]
    Mgmt(MgmtCommand),
    /// Shared services cluster and extensions
    #[command(subcommand)]
    SharedServices(SharedServicesCommand),
    /// Workload clusters and extensions
    #[command(subcommand)]
    WorkloadClusters(WorkloadCommand),
    /// Validate inputs or the bootstrap host
    #[command(subcommand)]
    Validate(ValidateCommand),
    /// Report live cluster status next to recorded state
    CheckHealth,
    #[command(subcommand, hide = true)]
    Dev(DevCommand),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let root = self.root_dir.as_path();
        match self.command {
            Commands::Avi(cmd) => commands::avi::run(root, cmd).await,
            Commands::Mgmt(cmd) => commands::mgmt::run(root, cmd).await,
            Commands::SharedServices(cmd) => commands::shared_services::run(root, cmd).await,
            Commands::WorkloadClusters(cmd) => commands::workload_clusters::run(root, cmd).await,
            Commands::Validate(cmd) => commands::validate::run(root, cmd).await,
            Commands::CheckHealth => commands::health::run(root).await,
            Commands::Dev(cmd) => commands::dev::run(root, cmd).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "sivt",
            "--root-dir",
            "/env",
            "shared-services",
            "deploy-external-dns",
        ])
        .unwrap();
        assert_eq!(cli.root_dir, PathBuf::from("/env"));
        assert!(matches!(
            cli.command,
            Commands::SharedServices(SharedServicesCommand::DeployExternalDns)
        ));

        let cli = Cli::try_parse_from(["sivt", "workload-clusters", "attach-cluster-to-tmc"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::WorkloadClusters(WorkloadCommand::AttachClusterToTmc)
        ));
        assert!(Cli::try_parse_from(["sivt", "check-health"]).is_ok());
        assert!(Cli::try_parse_from(["sivt", "dev", "cleanup"]).is_ok());
    }
}
