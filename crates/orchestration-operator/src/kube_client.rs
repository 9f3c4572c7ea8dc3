//! Kubernetes access for the reconciler
//!
//! [`ClusterKubeClient`] is the narrow seam between the reconciliation
//! logic and the API server, so the engine and the health evaluator can be
//! tested against a mock.

use crate::crd::{OrchestrationCluster, OrchestrationClusterStatus};
use crate::error::{OperatorError, Result};
use crate::labels::MANAGER;
use crate::resources::ManagedResource;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::core::Selector;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Kubernetes operations needed to reconcile an OrchestrationCluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterKubeClient: Send + Sync {
    /// Fetch a cluster; `None` when it does not exist
    async fn get_cluster(&self, name: &str, namespace: &str)
        -> Result<Option<OrchestrationCluster>>;

    /// Create the resource, or take ownership of its fields when it exists
    async fn apply_resource(&self, resource: &ManagedResource) -> Result<()>;

    /// List services matching a label selector
    async fn list_services(&self, namespace: &str, selector: &Selector) -> Result<Vec<Service>>;

    /// Write `status`, guarded by the resourceVersion of `cluster`
    async fn patch_cluster_status(
        &self,
        cluster: &OrchestrationCluster,
        status: &OrchestrationClusterStatus,
    ) -> Result<()>;
}

/// [`ClusterKubeClient`] backed by a live API server
#[derive(Clone)]
pub struct ClusterKubeClientImpl {
    client: Client,
}

impl ClusterKubeClientImpl {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn is_status(err: &kube::Error, code: u16, reason: Option<&str>) -> bool {
    match err {
        kube::Error::Api(ae) => ae.code == code && reason.map_or(true, |r| ae.reason == r),
        _ => false,
    }
}

/// Create-or-take-ownership apply of one namespaced object.
///
/// 1. create with our field manager;
/// 2. on AlreadyExists re-read the live object, carry its resourceVersion
///    and force a server-side apply of the desired state;
/// 3. on Conflict repeat step 2 once, then give up with `Conflict`.
async fn apply_object<K>(client: &Client, obj: &K) -> Result<()>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned,
{
    let kind = K::kind(&()).to_string();
    let name = obj.meta().name.clone().ok_or_else(|| {
        OperatorError::InvalidConfig(format!("{} missing metadata.name", kind))
    })?;
    let namespace = obj
        .meta()
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let api: Api<K> = Api::namespaced(client.clone(), &namespace);

    let failed = |e: kube::Error| OperatorError::ApplyFailed {
        kind: kind.clone(),
        name: name.clone(),
        reason: e.to_string(),
    };

    let create_params = PostParams {
        field_manager: Some(MANAGER.to_string()),
        ..Default::default()
    };
    match api.create(&create_params, obj).await {
        Ok(_) => {
            debug!(kind = %kind, name = %name, "Created resource");
            return Ok(());
        }
        Err(e) if is_status(&e, 409, Some("AlreadyExists")) => {}
        Err(e) => return Err(failed(e)),
    }

    let apply_params = PatchParams::apply(MANAGER).force();
    for attempt in 0..2 {
        let live = api.get(&name).await.map_err(failed)?;

        let mut desired = obj.clone();
        desired.meta_mut().resource_version = live.meta().resource_version.clone();

        match api.patch(&name, &apply_params, &Patch::Apply(&desired)).await {
            Ok(_) => {
                debug!(kind = %kind, name = %name, "Applied resource");
                return Ok(());
            }
            Err(e) if is_status(&e, 409, None) => {
                warn!(kind = %kind, name = %name, attempt, "Write conflict while applying");
            }
            Err(e) => return Err(failed(e)),
        }
    }

    Err(OperatorError::Conflict(format!("{}/{}", kind, name)))
}

#[async_trait]
impl ClusterKubeClient for ClusterKubeClientImpl {
    async fn get_cluster(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<OrchestrationCluster>> {
        let api: Api<OrchestrationCluster> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_resource(&self, resource: &ManagedResource) -> Result<()> {
        match resource {
            ManagedResource::ServiceAccount(sa) => apply_object(&self.client, sa).await,
            ManagedResource::Service(svc) => apply_object(&self.client, svc).await,
            ManagedResource::StatefulSet(sts) => apply_object(&self.client, sts).await,
        }
    }

    async fn list_services(&self, namespace: &str, selector: &Selector) -> Result<Vec<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels_from(selector)).await?;
        Ok(list.items)
    }

    async fn patch_cluster_status(
        &self,
        cluster: &OrchestrationCluster,
        status: &OrchestrationClusterStatus,
    ) -> Result<()> {
        let name = cluster.meta().name.clone().ok_or_else(|| {
            OperatorError::InvalidConfig("cluster name is required".to_string())
        })?;
        let namespace = cluster
            .meta()
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let api: Api<OrchestrationCluster> = Api::namespaced(self.client.clone(), &namespace);

        // resourceVersion turns the merge patch into a compare-and-swap
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": cluster.meta().resource_version },
            "status": status,
        });

        debug!(name = %name, "Updating cluster status");
        match api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409, None) => Err(OperatorError::Conflict(format!(
                "{}/{}",
                OrchestrationCluster::kind(&()),
                name
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
