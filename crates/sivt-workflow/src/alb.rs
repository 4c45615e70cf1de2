//! NSX ALB (load balancer) controller bring-up and cloud configuration.
//!
//! Cloud configuration is find-by-name-or-create for each inventory object,
//! so a re-run after a partial failure reuses whatever already exists.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use sivt_common::spec::{AviCloudSpec, AviSpec, NetworkSegment};
use sivt_common::state::EntityInfo;
use sivt_common::{poll_attempts, DeploymentState, Error, Health, Result};

use crate::context::{Actuators, RunContext};
use crate::ensure::{ensure, Deployable};
use crate::task::{Task, TaskReport};

/// Items per inventory page
pub const PAGE_SIZE: usize = 20;
pub const READINESS_ATTEMPTS: u32 = 60;
pub const READINESS_INTERVAL: Duration = Duration::from_secs(10);

const DEPLOYED_MESSAGE: &str = "Successful NSX ALB deployment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlbKind {
    Cloud,
    Network,
    ServiceEngineGroup,
    IpamProfile,
}

impl AlbKind {
    /// REST collection name
    pub fn resource(&self) -> &'static str {
        match self {
            AlbKind::Cloud => "cloud",
            AlbKind::Network => "network",
            AlbKind::ServiceEngineGroup => "serviceenginegroup",
            AlbKind::IpamProfile => "ipamdnsproviderprofile",
        }
    }
}

impl fmt::Display for AlbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlbKind::Cloud => "cloud",
            AlbKind::Network => "network",
            AlbKind::ServiceEngineGroup => "SE group",
            AlbKind::IpamProfile => "IPAM profile",
        };
        f.write_str(s)
    }
}

/// An inventory object. Fields other than the identity are kept verbatim
/// so an update can send the object back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbObject {
    pub name: String,
    pub uuid: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlbObject {
    fn reference(&self, field: &str) -> Option<&str> {
        self.extra.get(field).and_then(Value::as_str)
    }

    /// Whether `field` already references `url`. Refs may carry a `#name` suffix.
    pub fn references(&self, field: &str, url: &str) -> bool {
        self.reference(field).is_some_and(|r| r.contains(url))
    }

    pub fn to_body(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// One page of a collection listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbPage {
    pub count: usize,
    #[serde(default)]
    pub results: Vec<AlbObject>,
}

/// Controller inventory REST API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlbInventory: Send + Sync {
    /// One page (1-based) of `kind`, optionally scoped to a cloud
    async fn list_page(&self, kind: AlbKind, cloud_uuid: Option<String>, page: u32) -> Result<AlbPage>;

    async fn create(&self, kind: AlbKind, body: &Value) -> Result<AlbObject>;

    async fn update(&self, kind: AlbKind, uuid: &str, body: &Value) -> Result<AlbObject>;
}

/// Controller appliance lifecycle
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlbController: Send + Sync {
    /// Whether a VM named `vm_name` is already in the inventory
    async fn vm_exists(&self, vm_name: &str) -> Result<bool>;

    /// Import and power on the controller VM
    async fn deploy(&self, vm_name: &str) -> Result<()>;

    /// Whether the controller answers on its portal
    async fn is_up(&self) -> Result<bool>;

    async fn version(&self) -> Result<String>;
}

/// Page through `kind` until `name` is found or the listing is exhausted
pub async fn find_by_name(
    inventory: &dyn AlbInventory,
    kind: AlbKind,
    cloud_uuid: Option<&str>,
    name: &str,
) -> Result<Option<AlbObject>> {
    let mut page = 1;
    let mut seen = 0;
    loop {
        let listing = inventory
            .list_page(kind, cloud_uuid.map(str::to_string), page)
            .await?;
        if let Some(found) = listing.results.iter().find(|o| o.name == name) {
            return Ok(Some(found.clone()));
        }
        seen += listing.results.len();
        if listing.results.is_empty() || seen >= listing.count {
            return Ok(None);
        }
        page += 1;
    }
}

/// Creates (or reuses) the cloud, SE groups, data network and IPAM profile
pub struct CloudConfigurator<'a> {
    inventory: &'a dyn AlbInventory,
    cloud: &'a AviCloudSpec,
    network: &'a NetworkSegment,
}

impl<'a> CloudConfigurator<'a> {
    pub fn new(inventory: &'a dyn AlbInventory, avi: &'a AviSpec) -> Self {
        Self {
            inventory,
            cloud: &avi.cloud,
            network: &avi.data_network,
        }
    }

    async fn find_or_create(
        &self,
        kind: AlbKind,
        cloud_uuid: Option<&str>,
        name: &str,
        body: Value,
    ) -> Result<AlbObject> {
        if let Some(existing) = find_by_name(self.inventory, kind, cloud_uuid, name).await? {
            info!(kind = %kind, name, "Found existing object, skipping creation");
            return Ok(existing);
        }
        info!(kind = %kind, name, "Creating");
        self.inventory.create(kind, &body).await
    }

    /// Run the whole configuration and return the final cloud object
    pub async fn configure(&self) -> Result<AlbObject> {
        let cloud = self
            .find_or_create(AlbKind::Cloud, None, &self.cloud.name, cloud_payload(&self.cloud.name))
            .await?;
        let scope = Some(cloud.uuid.as_str());

        let mgmt_se_group = self
            .find_or_create(
                AlbKind::ServiceEngineGroup,
                scope,
                &self.cloud.mgmt_se_group,
                se_group_payload(&self.cloud.mgmt_se_group, &cloud.url),
            )
            .await?;
        self.find_or_create(
            AlbKind::ServiceEngineGroup,
            scope,
            &self.cloud.workload_se_group,
            se_group_payload(&self.cloud.workload_se_group, &cloud.url),
        )
        .await?;

        let network = self
            .find_or_create(
                AlbKind::Network,
                scope,
                &self.network.name,
                network_payload(self.network, &cloud.url)?,
            )
            .await?;
        let ipam = self
            .find_or_create(
                AlbKind::IpamProfile,
                None,
                &self.cloud.ipam_profile_name,
                ipam_payload(&self.cloud.ipam_profile_name, &network.url),
            )
            .await?;

        self.attach_to_cloud(cloud, &mgmt_se_group.url, &ipam.url).await
    }

    async fn attach_to_cloud(&self, cloud: AlbObject, se_group_url: &str, ipam_url: &str) -> Result<AlbObject> {
        if cloud.references("se_group_template_ref", se_group_url)
            && cloud.references("ipam_provider_ref", ipam_url)
        {
            info!(cloud = %cloud.name, "SE group and IPAM profile already set on cloud, skipping update");
            return Ok(cloud);
        }
        info!(cloud = %cloud.name, "Updating SE group and IPAM profile of cloud");
        let mut updated = cloud;
        updated
            .extra
            .insert("se_group_template_ref".into(), Value::from(se_group_url));
        updated
            .extra
            .insert("ipam_provider_ref".into(), Value::from(ipam_url));
        let body = updated.to_body()?;
        self.inventory
            .update(AlbKind::Cloud, &updated.uuid, &body)
            .await
    }
}

fn cloud_payload(name: &str) -> Value {
    json!({
        "name": name,
        "vtype": "CLOUD_NONE",
        "dhcp_enabled": true,
    })
}

fn se_group_payload(name: &str, cloud_url: &str) -> Value {
    json!({
        "name": name,
        "cloud_ref": cloud_url,
    })
}

fn network_payload(network: &NetworkSegment, cloud_url: &str) -> Result<Value> {
    let (ip, mask) = network.subnet()?;
    let addr = |a: &str| json!({ "addr": a, "type": "V4" });
    Ok(json!({
        "name": network.name,
        "cloud_ref": cloud_url,
        "configured_subnets": [{
            "prefix": { "ip_addr": addr(ip), "mask": mask },
            "static_ip_ranges": [{
                "range": {
                    "begin": addr(&network.static_ip_start),
                    "end": addr(&network.static_ip_end),
                },
                "type": "STATIC_IPS_FOR_VIP_AND_SE",
            }],
        }],
    }))
}

fn ipam_payload(name: &str, network_url: &str) -> Value {
    json!({
        "name": name,
        "type": "IPAMDNS_TYPE_INTERNAL",
        "internal_profile": {
            "usable_networks": [{ "nw_ref": network_url }],
        },
    })
}

/// Controller deploy, readiness wait and cloud configuration as one ensure pass
struct AlbDeploy<'a> {
    ctx: &'a RunContext,
    act: &'a Actuators,
    version: Mutex<Option<String>>,
}

#[async_trait]
impl Deployable for AlbDeploy<'_> {
    fn entity(&self) -> String {
        self.ctx.spec.avi.vm_name.clone()
    }

    fn is_satisfied(&self, state: &DeploymentState) -> Result<bool> {
        Ok(state.load_balancer.deployed)
    }

    async fn actuate(&self) -> Result<()> {
        let avi = &self.ctx.spec.avi;
        let controller = self.act.alb_controller.as_ref();
        if controller.vm_exists(&avi.vm_name).await? {
            warn!(vm = %avi.vm_name, "Controller VM already exists, skipping import");
        } else {
            controller.deploy(&avi.vm_name).await?;
        }

        poll_attempts(READINESS_ATTEMPTS, READINESS_INTERVAL, "NSX ALB controller", || async move {
            // the portal refuses connections while booting
            Ok(controller.is_up().await.unwrap_or(false).then_some(()))
        })
        .await?;
        info!(controller = %avi.controller, "NSX ALB controller is up");

        let version = controller.version().await?;
        info!(version = %version, "NSX ALB controller version");

        CloudConfigurator::new(self.act.alb_inventory.as_ref(), avi)
            .configure()
            .await?;

        if let Ok(mut slot) = self.version.lock() {
            *slot = Some(version);
        }
        Ok(())
    }

    fn record(&self, state: &mut DeploymentState) -> Result<()> {
        let version = self
            .version
            .lock()
            .ok()
            .and_then(|v| v.clone())
            .unwrap_or_else(|| self.ctx.spec.avi.version.clone());
        state.load_balancer = EntityInfo {
            name: self.ctx.spec.avi.vm_name.clone(),
            deployed: true,
            version,
            health: Health::Up,
        };
        Ok(())
    }

    fn commit_message(&self) -> String {
        DEPLOYED_MESSAGE.to_string()
    }
}

pub async fn deploy_load_balancer(ctx: &RunContext, act: &Actuators) -> TaskReport {
    let item = AlbDeploy {
        ctx,
        act,
        version: Mutex::new(None),
    };
    TaskReport::new(
        Task::DeployLoadBalancer,
        item.entity(),
        ensure(&ctx.store, &item).await,
    )
}

/// Check the running controller against the deployment config: required version, UP,
/// and a cloud that references its SE group and IPAM profile.
pub async fn validate_load_balancer(ctx: &RunContext, act: &Actuators) -> Result<()> {
    let avi = &ctx.spec.avi;
    let controller = act.alb_controller.as_ref();

    if !controller.is_up().await? {
        return Err(Error::configuration(format!(
            "NSX ALB controller {} health is DOWN",
            avi.controller
        )));
    }
    let version = controller.version().await?;
    if version != avi.version {
        return Err(Error::configuration(format!(
            "NSX ALB controller version({version}) does not match required version({})",
            avi.version
        )));
    }

    let inventory = act.alb_inventory.as_ref();
    let missing = |kind: AlbKind, name: &str| {
        Error::configuration(format!("NSX ALB {kind} {name} not found"))
    };
    let cloud = find_by_name(inventory, AlbKind::Cloud, None, &avi.cloud.name)
        .await?
        .ok_or_else(|| missing(AlbKind::Cloud, &avi.cloud.name))?;
    let se_group = find_by_name(
        inventory,
        AlbKind::ServiceEngineGroup,
        Some(&cloud.uuid),
        &avi.cloud.mgmt_se_group,
    )
    .await?
    .ok_or_else(|| missing(AlbKind::ServiceEngineGroup, &avi.cloud.mgmt_se_group))?;
    let ipam = find_by_name(inventory, AlbKind::IpamProfile, None, &avi.cloud.ipam_profile_name)
        .await?
        .ok_or_else(|| missing(AlbKind::IpamProfile, &avi.cloud.ipam_profile_name))?;

    if !cloud.references("se_group_template_ref", &se_group.url) {
        warn!(cloud = %cloud.name, "SE group template is not set on cloud");
        return Err(Error::configuration(format!(
            "cloud {} does not reference SE group {}",
            cloud.name, se_group.name
        )));
    }
    if !cloud.references("ipam_provider_ref", &ipam.url) {
        warn!(cloud = %cloud.name, "IPAM profile is not set on cloud");
        return Err(Error::configuration(format!(
            "cloud {} does not reference IPAM profile {}",
            cloud.name, ipam.name
        )));
    }

    info!(controller = %avi.controller, version = %version, "NSX ALB controller validation passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::ensure::Outcome;
    use crate::testutil::{context, Mocks};

    fn object(name: &str, kind: &str) -> AlbObject {
        AlbObject {
            name: name.to_string(),
            uuid: format!("{kind}-{name}"),
            url: format!("https://avi/api/{kind}/{kind}-{name}"),
            extra: Map::new(),
        }
    }

    fn page(count: usize, names: &[&str]) -> AlbPage {
        AlbPage {
            count,
            results: names.iter().map(|n| object(n, "network")).collect(),
        }
    }

    fn spec_avi() -> AviSpec {
        let dir = TempDir::new().unwrap();
        context(&dir, "1.4.0").spec.avi
    }

    #[tokio::test]
    async fn lookup_walks_pages_until_found() {
        let mut inventory = MockAlbInventory::new();
        inventory
            .expect_list_page()
            .returning(|_, _, page| {
                Ok(match page {
                    1 => page_of(0..20),
                    2 => page_of(20..40),
                    _ => page_of(40..45),
                })
            });

        let found = find_by_name(&inventory, AlbKind::Network, Some("cloud-1"), "nw-42")
            .await
            .unwrap();
        assert_eq!(found.unwrap().name, "nw-42");
    }

    fn page_of(range: std::ops::Range<usize>) -> AlbPage {
        let names: Vec<String> = range.map(|i| format!("nw-{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        page(45, &refs)
    }

    #[tokio::test]
    async fn lookup_stops_at_reported_count() {
        let mut inventory = MockAlbInventory::new();
        inventory
            .expect_list_page()
            .times(3)
            .returning(|_, _, page| {
                Ok(match page {
                    1 => page_of(0..20),
                    2 => page_of(20..40),
                    _ => page_of(40..45),
                })
            });

        let found = find_by_name(&inventory, AlbKind::Network, None, "absent")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn lookup_stops_on_empty_page() {
        let mut inventory = MockAlbInventory::new();
        inventory
            .expect_list_page()
            .times(1)
            .returning(|_, _, _| Ok(AlbPage { count: 5, results: vec![] }));

        assert!(find_by_name(&inventory, AlbKind::Cloud, None, "tkg-cloud")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn existing_inventory_is_reused_without_creates() {
        let avi = spec_avi();
        let mut inventory = MockAlbInventory::new();
        inventory.expect_list_page().returning(|kind, _, _| {
            let mut found = match kind {
                AlbKind::Cloud => object("tkg-cloud", "cloud"),
                AlbKind::ServiceEngineGroup => {
                    return Ok(AlbPage {
                        count: 2,
                        results: vec![
                            object("tkg-management-se-group", "seg"),
                            object("tkg-workload-se-group", "seg"),
                        ],
                    })
                }
                AlbKind::Network => object("tkg-data", "network"),
                AlbKind::IpamProfile => object("tkg-ipam-profile", "ipam"),
            };
            if kind == AlbKind::Cloud {
                found.extra.insert(
                    "se_group_template_ref".into(),
                    json!("https://avi/api/seg/seg-tkg-management-se-group#mgmt"),
                );
                found.extra.insert(
                    "ipam_provider_ref".into(),
                    json!("https://avi/api/ipam/ipam-tkg-ipam-profile"),
                );
            }
            Ok(AlbPage {
                count: 1,
                results: vec![found],
            })
        });
        inventory.expect_create().times(0);
        inventory.expect_update().times(0);

        let cloud = CloudConfigurator::new(&inventory, &avi).configure().await.unwrap();
        assert_eq!(cloud.name, "tkg-cloud");
    }

    #[tokio::test]
    async fn fresh_controller_gets_everything_created_in_order() {
        let avi = spec_avi();
        let created = Arc::new(Mutex::new(Vec::new()));
        let mut inventory = MockAlbInventory::new();
        inventory
            .expect_list_page()
            .returning(|_, _, _| Ok(AlbPage::default()));
        let log = created.clone();
        inventory.expect_create().returning(move |kind, body| {
            let name = body["name"].as_str().unwrap_or_default().to_string();
            log.lock().unwrap().push((kind, name.clone()));
            Ok(object(&name, kind.resource()))
        });
        inventory
            .expect_update()
            .withf(|kind, uuid, body| {
                *kind == AlbKind::Cloud
                    && uuid == "cloud-tkg-cloud"
                    && body["ipam_provider_ref"]
                        .as_str()
                        .is_some_and(|r| r.ends_with("ipam-tkg-ipam-profile"))
                    && body["se_group_template_ref"]
                        .as_str()
                        .is_some_and(|r| r.ends_with("tkg-management-se-group"))
            })
            .times(1)
            .returning(|_, _, _| Ok(object("tkg-cloud", "cloud")));

        CloudConfigurator::new(&inventory, &avi).configure().await.unwrap();

        let created = created.lock().unwrap();
        let kinds: Vec<AlbKind> = created.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                AlbKind::Cloud,
                AlbKind::ServiceEngineGroup,
                AlbKind::ServiceEngineGroup,
                AlbKind::Network,
                AlbKind::IpamProfile,
            ]
        );
        assert_eq!(created[3].1, "tkg-data");
    }

    #[test]
    fn network_payload_carries_subnet_and_range() {
        let avi = spec_avi();
        let body = network_payload(&avi.data_network, "https://avi/api/cloud/c").unwrap();
        let subnet = &body["configured_subnets"][0];
        assert_eq!(subnet["prefix"]["ip_addr"]["addr"], "192.168.20.1");
        assert_eq!(subnet["prefix"]["mask"], 24);
        assert_eq!(subnet["static_ip_ranges"][0]["range"]["begin"]["addr"], "192.168.20.50");
    }

    fn configured_inventory(mocks: &mut Mocks) {
        mocks
            .alb_inventory
            .expect_list_page()
            .returning(|_, _, _| Ok(AlbPage::default()));
        mocks
            .alb_inventory
            .expect_create()
            .returning(|kind, body| {
                Ok(object(body["name"].as_str().unwrap_or_default(), kind.resource()))
            });
        mocks
            .alb_inventory
            .expect_update()
            .returning(|_, _, _| Ok(object("tkg-cloud", "cloud")));
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_records_controller_once() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let polls = Arc::new(AtomicUsize::new(0));

        let mut mocks = Mocks::default();
        mocks.alb_controller.expect_vm_exists().returning(|_| Ok(false));
        mocks
            .alb_controller
            .expect_deploy()
            .withf(|vm| vm == "avi-controller")
            .times(1)
            .returning(|_| Ok(()));
        let p = polls.clone();
        mocks.alb_controller.expect_is_up().returning(move || {
            if p.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(Error::actuation("avi", "connection refused"))
            } else {
                Ok(true)
            }
        });
        mocks
            .alb_controller
            .expect_version()
            .returning(|| Ok("20.1.6".to_string()));
        configured_inventory(&mut mocks);
        let act = mocks.build();

        let report = deploy_load_balancer(&ctx, &act).await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");
        assert_eq!(polls.load(Ordering::SeqCst), 4);

        let state = ctx.store.load().unwrap();
        assert!(state.load_balancer.deployed);
        assert_eq!(state.load_balancer.version, "20.1.6");
        assert_eq!(state.load_balancer.name, "avi-controller");
        assert_eq!(state.load_balancer.health, Health::Up);

        let again = deploy_load_balancer(&ctx, &act).await;
        assert!(matches!(again.outcome, Outcome::Skipped));
    }

    #[tokio::test(start_paused = true)]
    async fn existing_controller_vm_is_not_reimported() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks
            .alb_controller
            .expect_vm_exists()
            .withf(|vm| vm == "avi-controller")
            .times(1)
            .returning(|_| Ok(true));
        mocks.alb_controller.expect_deploy().times(0);
        mocks.alb_controller.expect_is_up().returning(|| Ok(true));
        mocks
            .alb_controller
            .expect_version()
            .returning(|| Ok("20.1.6".to_string()));
        configured_inventory(&mut mocks);
        let act = mocks.build();

        let report = deploy_load_balancer(&ctx, &act).await;
        assert!(matches!(report.outcome, Outcome::Succeeded), "{report}");
        let state = ctx.store.load().unwrap();
        assert!(state.load_balancer.deployed);
        assert_eq!(state.load_balancer.version, "20.1.6");
    }

    #[tokio::test(start_paused = true)]
    async fn controller_that_never_boots_leaves_state_alone() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let before = std::fs::read(ctx.store.path()).unwrap();

        let mut mocks = Mocks::default();
        mocks.alb_controller.expect_vm_exists().returning(|_| Ok(false));
        mocks.alb_controller.expect_deploy().returning(|_| Ok(()));
        mocks
            .alb_controller
            .expect_is_up()
            .times(READINESS_ATTEMPTS as usize)
            .returning(|| Ok(false));
        mocks.alb_controller.expect_version().times(0);
        mocks.alb_inventory.expect_create().times(0);
        let act = mocks.build();

        let report = deploy_load_balancer(&ctx, &act).await;
        assert!(report.failed());
        assert_eq!(std::fs::read(ctx.store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn validate_rejects_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.alb_controller.expect_is_up().returning(|| Ok(true));
        mocks
            .alb_controller
            .expect_version()
            .returning(|| Ok("20.1.3".to_string()));
        mocks.alb_inventory.expect_list_page().times(0);
        let act = mocks.build();

        let err = validate_load_balancer(&ctx, &act).await.unwrap_err();
        assert!(err.to_string().contains("does not match required version(20.1.6)"));
    }

    #[tokio::test]
    async fn validate_rejects_cloud_without_ipam() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "1.4.0");
        let mut mocks = Mocks::default();
        mocks.alb_controller.expect_is_up().returning(|| Ok(true));
        mocks
            .alb_controller
            .expect_version()
            .returning(|| Ok("20.1.6".to_string()));
        mocks.alb_inventory.expect_list_page().returning(|kind, _, _| {
            let mut found = match kind {
                AlbKind::Cloud => object("tkg-cloud", "cloud"),
                AlbKind::ServiceEngineGroup => object("tkg-management-se-group", "seg"),
                AlbKind::IpamProfile => object("tkg-ipam-profile", "ipam"),
                AlbKind::Network => object("tkg-data", "network"),
            };
            if kind == AlbKind::Cloud {
                found.extra.insert(
                    "se_group_template_ref".into(),
                    json!("https://avi/api/seg/seg-tkg-management-se-group"),
                );
            }
            Ok(AlbPage {
                count: 1,
                results: vec![found],
            })
        });
        let act = mocks.build();

        let err = validate_load_balancer(&ctx, &act).await.unwrap_err();
        assert!(err.to_string().contains("does not reference IPAM profile"));
    }
}
