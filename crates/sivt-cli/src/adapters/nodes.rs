//! Worker node operations through the Kubernetes API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use kube::api::{DeleteParams, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::info;

use sivt_common::{Error, Result};
use sivt_workflow::actuator::{NodeActuator, NodeInfo};

use super::tanzu::Tanzu;
use crate::error::ActuationErrorExt;

const CONTROL_PLANE_LABELS: [&str; 2] = [
    "node-role.kubernetes.io/control-plane",
    "node-role.kubernetes.io/master",
];

fn is_control_plane(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .is_some_and(|labels| CONTROL_PLANE_LABELS.iter().any(|l| labels.contains_key(*l)))
}

fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Creation time of `node`, read through its RFC 3339 wire form
fn created_at(node: &Node) -> Option<DateTime<Utc>> {
    let timestamp = node.metadata.creation_timestamp.as_ref()?;
    let value = serde_json::to_value(timestamp).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn worker_info(node: &Node) -> Option<NodeInfo> {
    if is_control_plane(node) {
        return None;
    }
    Some(NodeInfo {
        name: node.metadata.name.clone()?,
        created: created_at(node)?,
    })
}

/// [`NodeActuator`] against each cluster's admin context
#[derive(Debug, Clone)]
pub struct KubeNodes {
    tanzu: Tanzu,
}

impl KubeNodes {
    pub fn new(tanzu: Tanzu) -> Self {
        Self { tanzu }
    }

    async fn client(&self, cluster: &str) -> Result<Client> {
        self.tanzu.fetch_credentials(cluster).await?;
        let kubeconfig = Kubeconfig::read_from(self.tanzu.kubeconfig()).actuation_err(cluster)?;
        let options = KubeConfigOptions {
            context: Some(Tanzu::context(cluster)),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .actuation_err(cluster)?;
        Client::try_from(config).actuation_err(cluster)
    }

    async fn nodes(&self, cluster: &str) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client(cluster).await?);
        let list = api
            .list(&ListParams::default())
            .await
            .actuation_err(cluster)?;
        Ok(list.items)
    }
}

fn ready_workers(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .filter(|n| !is_control_plane(n) && is_ready(n))
        .count()
}

#[async_trait]
impl NodeActuator for KubeNodes {
    async fn list_nodes(&self, cluster: &str) -> Result<Vec<NodeInfo>> {
        Ok(self.nodes(cluster).await?.iter().filter_map(worker_info).collect())
    }

    async fn drain(&self, cluster: &str, node: &str) -> Result<()> {
        self.tanzu.use_cluster(cluster).await?;
        info!(cluster, node, "Draining node");
        self.tanzu
            .exec(
                cluster,
                "kubectl",
                &["drain", node, "--delete-emptydir-data", "--ignore-daemonsets"],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, cluster: &str, node: &str) -> Result<()> {
        let api: Api<Node> = Api::all(self.client(cluster).await?);
        api.delete(node, &DeleteParams::default())
            .await
            .map_err(|e| Error::actuation(cluster, format!("failed to delete node {node}: {e}")))?;
        info!(cluster, node, "Deleted node");
        Ok(())
    }

    async fn total(&self, cluster: &str) -> Result<usize> {
        Ok(self.nodes(cluster).await?.len())
    }

    async fn ready_workers(&self, cluster: &str) -> Result<usize> {
        Ok(ready_workers(&self.nodes(cluster).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(json: serde_json::Value) -> Node {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn workers_carry_creation_time() {
        let worker = node(serde_json::json!({
            "metadata": {
                "name": "wl-1-md-0-abc",
                "creationTimestamp": "2021-09-01T10:00:00Z"
            },
            "status": {"conditions": [{"type": "Ready", "status": "True"}]}
        }));
        let info = worker_info(&worker).unwrap();
        assert_eq!(info.name, "wl-1-md-0-abc");
        assert_eq!(info.created.to_rfc3339(), "2021-09-01T10:00:00+00:00");
        assert!(is_ready(&worker));
    }

    #[test]
    fn control_plane_nodes_are_excluded() {
        let cp = node(serde_json::json!({
            "metadata": {
                "name": "wl-1-control-plane-xyz",
                "creationTimestamp": "2021-09-01T09:00:00Z",
                "labels": {"node-role.kubernetes.io/control-plane": ""}
            }
        }));
        assert!(worker_info(&cp).is_none());
    }

    #[test]
    fn control_plane_is_not_a_ready_worker() {
        let nodes = vec![
            node(serde_json::json!({
                "metadata": {
                    "name": "wl-1-control-plane-xyz",
                    "labels": {"node-role.kubernetes.io/control-plane": ""}
                },
                "status": {"conditions": [{"type": "Ready", "status": "True"}]}
            })),
            node(serde_json::json!({
                "metadata": {"name": "wl-1-md-0-abc"},
                "status": {"conditions": [{"type": "Ready", "status": "True"}]}
            })),
        ];
        assert_eq!(nodes.len(), 2);
        assert_eq!(ready_workers(&nodes), 1);
    }

    #[test]
    fn not_ready_without_condition() {
        let pending = node(serde_json::json!({"metadata": {"name": "n"}}));
        assert!(!is_ready(&pending));
        assert!(worker_info(&pending).is_none());
    }
}
