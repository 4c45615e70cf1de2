//! Tanzu Mission Control attachment through the `tmc` CLI

use async_trait::async_trait;
use tracing::info;

use sivt_common::{Error, Result};
use sivt_workflow::actuator::TmcActuator;

use super::process;
use super::tanzu::Tanzu;

/// Login context name created on the bootstrap host
const TMC_CONTEXT: &str = "sivt";

#[derive(Debug, Clone)]
pub struct TmcCli {
    tanzu: Tanzu,
}

impl TmcCli {
    pub fn new(tanzu: Tanzu) -> Self {
        Self { tanzu }
    }
}

#[async_trait]
impl TmcActuator for TmcCli {
    async fn attach(&self, cluster: &str, cluster_group: &str, api_token: Option<String>) -> Result<()> {
        let token = api_token.ok_or_else(|| {
            Error::configuration("integrations.tmc.apiToken is required to attach clusters")
        })?;
        process::run_with_env(
            cluster,
            "tmc",
            &["login", "--no-configure", "--name", TMC_CONTEXT],
            &[("TMC_API_TOKEN", token.as_str())],
        )
        .await?;

        self.tanzu.use_cluster(cluster).await?;
        let kubeconfig = self.tanzu.kubeconfig().to_string_lossy().into_owned();
        info!(cluster, cluster_group, "Attaching cluster to TMC");
        self.tanzu
            .exec(
                cluster,
                "tmc",
                &[
                    "cluster",
                    "attach",
                    "--name",
                    cluster,
                    "--cluster-group",
                    cluster_group,
                    "-k",
                    &kubeconfig,
                    "--force",
                ],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_configuration_error() {
        let tmc = TmcCli::new(Tanzu::new("/nonexistent/config", "mgmt"));
        let err = tmc.attach("shared", "default", None).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
