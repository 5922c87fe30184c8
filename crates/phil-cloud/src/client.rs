//! ComputeClient — REST calls against the instance group manager API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use phil_core::{BoxError, GroupManager, InstanceGroupRef, WorkerIdentity, WorkerStatus};

use crate::error::{CloudError, CloudResult};

/// One entry of a `listManagedInstances` response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedInstance {
    /// Full URL of the VM, ending in its name.
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Absent while the VM is still being created.
    #[serde(default)]
    pub instance_status: Option<String>,
    #[serde(default)]
    pub current_action: Option<String>,
}

impl ManagedInstance {
    /// VM name: the explicit `name`, else the last path segment of `instance`.
    pub fn worker_name(&self) -> Option<&str> {
        if let Some(name) = self.name.as_deref() {
            return Some(name);
        }
        self.instance
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .filter(|s| !s.is_empty())
    }

    pub fn status(&self) -> WorkerStatus {
        self.instance_status
            .as_deref()
            .map(WorkerStatus::from_api)
            .unwrap_or(WorkerStatus::Other)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListManagedInstancesResponse {
    #[serde(default)]
    managed_instances: Vec<ManagedInstance>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Client for one project's instance group managers.
#[derive(Clone)]
pub struct ComputeClient {
    http: reqwest::Client,
    endpoint: String,
    project: String,
    access_token: Option<String>,
}

impl ComputeClient {
    pub fn new(
        endpoint: &str,
        project: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> CloudResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("phil/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CloudError::Request {
                url: endpoint.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            access_token,
        })
    }

    fn manager_url(&self, group: &InstanceGroupRef, action: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/zones/{}/instanceGroupManagers/{}/{}",
            self.endpoint, self.project, group.zone, group.name, action
        )
    }

    async fn post(&self, url: &str, query: &[(&str, String)]) -> CloudResult<serde_json::Value> {
        let mut req = self.http.post(url).query(query);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|source| CloudError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|source| CloudError::Request {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(CloudError::Api {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| CloudError::Decode(e.to_string()))
    }

    /// Every managed instance of the group, across all result pages.
    pub async fn list_managed_instances(
        &self,
        group: &InstanceGroupRef,
    ) -> CloudResult<Vec<ManagedInstance>> {
        let url = self.manager_url(group, "listManagedInstances");
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, String)> = page_token
                .take()
                .map(|t| vec![("pageToken", t)])
                .unwrap_or_default();
            let value = self.post(&url, &query).await?;
            if value.is_null() {
                break;
            }
            let page: ListManagedInstancesResponse =
                serde_json::from_value(value).map_err(|e| CloudError::Decode(e.to_string()))?;
            instances.extend(page.managed_instances);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(%group, count = instances.len(), "listed managed instances");
        Ok(instances)
    }

    /// Ask the provider to move the group to `size` instances.
    pub async fn resize(&self, group: &InstanceGroupRef, size: u32) -> CloudResult<()> {
        let url = self.manager_url(group, "resize");
        self.post(&url, &[("size", size.to_string())]).await?;
        info!(%group, size, "successfully requested adjustment of the instance group size");
        Ok(())
    }
}

#[async_trait]
impl GroupManager for ComputeClient {
    async fn list_running_workers(
        &self,
        group: &InstanceGroupRef,
    ) -> Result<Vec<WorkerIdentity>, BoxError> {
        let instances = self.list_managed_instances(group).await?;
        Ok(instances
            .iter()
            .filter(|vm| vm.status() == WorkerStatus::Running)
            .filter_map(|vm| vm.worker_name().map(str::to_string))
            .collect())
    }

    async fn resize_group(&self, group: &InstanceGroupRef, new_size: u32) -> Result<(), BoxError> {
        Ok(self.resize(group, new_size).await?)
    }
}
