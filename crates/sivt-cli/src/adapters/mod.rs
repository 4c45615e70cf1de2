//! Concrete actuators backed by local CLIs, the Kubernetes API and the
//! controller REST API

pub mod avi;
pub mod kubectl;
pub mod nodes;
pub mod process;
pub mod tanzu;
pub mod tmc;

use std::path::PathBuf;
use std::sync::Arc;

use sivt_common::{DeploymentSpec, Result, RootLayout};
use sivt_workflow::Actuators;

use avi::AviClient;
use kubectl::KubectlExtensions;
use nodes::KubeNodes;
use process::ProcessRunner;
use tanzu::Tanzu;
use tmc::TmcCli;

/// Kubeconfig every adapter runs against: `$KUBECONFIG` when set, else the
/// environment's own copy under the root directory
fn kubeconfig_path(layout: &RootLayout, from_env: Option<String>) -> PathBuf {
    from_env
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| layout.kubeconfig())
}

/// Wire the production actuators for `spec`
pub fn actuators(layout: &RootLayout, spec: &DeploymentSpec) -> Result<Actuators> {
    let kubeconfig = kubeconfig_path(layout, std::env::var("KUBECONFIG").ok());
    let tanzu = Tanzu::new(kubeconfig, spec.tkg.management.cluster.name.clone());
    let avi = Arc::new(AviClient::new(&spec.avi)?);

    Ok(Actuators {
        clusters: Arc::new(tanzu.clone()),
        packages: Arc::new(tanzu.clone()),
        extensions: Arc::new(KubectlExtensions::new(tanzu.clone())),
        nodes: Arc::new(KubeNodes::new(tanzu.clone())),
        tmc: Arc::new(TmcCli::new(tanzu)),
        alb_inventory: avi.clone(),
        alb_controller: avi,
        commands: Arc::new(ProcessRunner),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubeconfig_prefers_environment() {
        let layout = RootLayout::new("/env");
        assert_eq!(
            kubeconfig_path(&layout, Some("/home/ops/.kube/config".to_string())),
            PathBuf::from("/home/ops/.kube/config")
        );
        assert_eq!(
            kubeconfig_path(&layout, Some(String::new())),
            PathBuf::from("/env/kubeconfig-repo/.kube/config")
        );
        assert_eq!(kubeconfig_path(&layout, None), layout.kubeconfig());
    }
}
