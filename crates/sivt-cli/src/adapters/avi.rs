//! NSX ALB controller: REST inventory and govc-driven appliance bring-up

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use sivt_common::spec::AviSpec;
use sivt_common::{Error, Result};
use sivt_workflow::alb::{AlbController, AlbInventory, AlbKind, AlbObject, AlbPage, PAGE_SIZE};

use super::process;
use crate::error::ActuationErrorExt;

const ENTITY: &str = "avi";

/// Authenticated client for one controller
#[derive(Debug, Clone)]
pub struct AviClient {
    http: Client,
    spec: AviSpec,
}

impl AviClient {
    /// Controllers ship a self-signed certificate until one is installed
    pub fn new(spec: &AviSpec) -> Result<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .actuation_err(ENTITY)?;
        Ok(Self {
            http,
            spec: spec.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}/{}", self.spec.controller, path.trim_start_matches('/'))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.spec.username, Some(&self.spec.password))
            .header("X-Avi-Version", &self.spec.version)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self.authed(request).send().await.actuation_err(ENTITY)?;
        let response = check(response, what).await?;
        response.json().await.actuation_err(ENTITY)
    }
}

async fn check(response: Response, what: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::actuation(ENTITY, format!("{what} failed: {status} - {body}")))
}

/// Query string for one listing page
fn page_query(cloud_uuid: Option<&str>, page: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![("page", page.to_string()), ("page_size", PAGE_SIZE.to_string())];
    if let Some(uuid) = cloud_uuid {
        query.push(("cloud_ref.uuid", uuid.to_string()));
    }
    query
}

#[async_trait]
impl AlbInventory for AviClient {
    async fn list_page(&self, kind: AlbKind, cloud_uuid: Option<String>, page: u32) -> Result<AlbPage> {
        let url = self.url(&format!("api/{}", kind.resource()));
        debug!(kind = %kind, page, "Listing controller objects");
        let request = self
            .http
            .get(url)
            .query(&page_query(cloud_uuid.as_deref(), page));
        self.send(request, &format!("list {kind}")).await
    }

    async fn create(&self, kind: AlbKind, body: &Value) -> Result<AlbObject> {
        let url = self.url(&format!("api/{}", kind.resource()));
        self.send(self.http.post(url).json(body), &format!("create {kind}"))
            .await
    }

    async fn update(&self, kind: AlbKind, uuid: &str, body: &Value) -> Result<AlbObject> {
        let url = self.url(&format!("api/{}/{uuid}", kind.resource()));
        self.send(self.http.put(url).json(body), &format!("update {kind}"))
            .await
    }
}

#[async_trait]
impl AlbController for AviClient {
    async fn vm_exists(&self, vm_name: &str) -> Result<bool> {
        let out = process::run(ENTITY, "govc", &["find", ".", "-type", "m", "-name", vm_name]).await?;
        Ok(found_vm(&out))
    }

    async fn deploy(&self, vm_name: &str) -> Result<()> {
        let deployment = self.spec.deployment.as_ref().ok_or_else(|| {
            Error::configuration("avi.deployment is required to deploy the controller")
        })?;
        let options = format!("-options={}", deployment.options_file.to_string_lossy());
        let name = format!("-name={vm_name}");
        let ova = deployment.ova_path.to_string_lossy();
        info!(vm = vm_name, "Importing controller OVA");
        process::run(ENTITY, "govc", &["import.ova", &options, &name, &ova]).await?;
        process::run(ENTITY, "govc", &["vm.power", "-on", vm_name]).await?;
        Ok(())
    }

    async fn is_up(&self) -> Result<bool> {
        match self.http.get(self.url("")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!(error = %e, "Controller portal not reachable yet");
                Ok(false)
            }
        }
    }

    async fn version(&self) -> Result<String> {
        let data: Value = self
            .send(self.http.get(self.url("api/initial-data")), "read initial data")
            .await?;
        initial_data_version(&data)
    }
}

fn initial_data_version(data: &Value) -> Result<String> {
    data.pointer("/version/Version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::actuation(ENTITY, "initial-data carries no version"))
}

/// `govc find` prints one inventory path per match
fn found_vm(output: &str) -> bool {
    output.lines().any(|line| !line.trim().is_empty())
}
