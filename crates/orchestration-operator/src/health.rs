//! Cluster health evaluation
//!
//! Compares the topology reported by the brokers with the desired cluster
//! size and records the verdict as the `Ready` condition.

use crate::crd::{ClusterCondition, OrchestrationCluster, CONDITION_READY};
use crate::error::{OperatorError, Result};
use crate::kube_client::ClusterKubeClient;
use crate::labels;
use crate::management_client::{Topology, TopologyClient};
use crate::resources::MANAGEMENT_PORT;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

/// Reason reported while every desired broker is part of the topology
pub const REASON_READY: &str = "CamundaReplicasReady";

/// Reason reported while the topology is incomplete
pub const REASON_NOT_READY: &str = "CamundaReplicasNotReady";

/// First service (by name) exposing the management port
pub fn find_management_service(services: &[Service]) -> Option<&Service> {
    let mut candidates: Vec<&Service> = services
        .iter()
        .filter(|svc| {
            svc.spec
                .as_ref()
                .and_then(|spec| spec.ports.as_ref())
                .is_some_and(|ports| ports.iter().any(|p| p.port == MANAGEMENT_PORT))
        })
        .collect();
    candidates.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    candidates.into_iter().next()
}

/// In-cluster URL of the management API behind `service`
pub fn management_url(service: &str, namespace: &str) -> String {
    format!(
        "http://{}.{}.svc.cluster.local:{}",
        service, namespace, MANAGEMENT_PORT
    )
}

/// Every desired broker joined and the topology has been initialized
pub fn is_ready(topology: &Topology, cluster_size: i32) -> bool {
    i32::try_from(topology.brokers.len()).is_ok_and(|n| n == cluster_size)
        && topology.version > 0
}

/// `Ready` condition for the given verdict, without a transition time.
///
/// Reason and message are fixed per verdict: `CamundaReplicasReady` /
/// "replicas are ready" when ready, `CamundaReplicasNotReady` /
/// "replicas are not ready" otherwise.
pub fn ready_condition(ready: bool, observed_generation: Option<i64>) -> ClusterCondition {
    let (status, reason, message) = if ready {
        ("True", REASON_READY, "replicas are ready")
    } else {
        ("False", REASON_NOT_READY, "replicas are not ready")
    };

    ClusterCondition {
        condition_type: CONDITION_READY.to_string(),
        status: status.to_string(),
        observed_generation,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: None,
    }
}

/// Insert or update `condition` in place. Returns whether anything changed.
///
/// `last_transition_time` is set to `now` only when the status flips or
/// the condition is new.
pub fn set_status_condition(
    conditions: &mut Vec<ClusterCondition>,
    mut condition: ClusterCondition,
    now: &str,
) -> bool {
    let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == condition.condition_type)
    else {
        condition.last_transition_time = Some(now.to_string());
        conditions.push(condition);
        return true;
    };

    if existing.status != condition.status {
        condition.last_transition_time = Some(now.to_string());
        *existing = condition;
        return true;
    }

    let changed = existing.reason != condition.reason
        || existing.message != condition.message
        || existing.observed_generation != condition.observed_generation;
    if changed {
        existing.reason = condition.reason;
        existing.message = condition.message;
        existing.observed_generation = condition.observed_generation;
    }
    changed
}

/// Evaluate readiness of `cluster` and persist the `Ready` condition.
///
/// Returns whether the status was written. Fails with `ServiceNotFound`
/// or `TopologyQueryError`; both are health-path errors.
#[instrument(skip_all, fields(name = %cluster.name_any()))]
pub async fn evaluate_health(
    kube: &dyn ClusterKubeClient,
    topology_client: &dyn TopologyClient,
    cluster: &OrchestrationCluster,
) -> Result<bool> {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());

    let selector = labels::selector(&labels::identity(&name));
    let services = kube
        .list_services(&namespace, &selector)
        .await
        .map_err(|e| OperatorError::ServiceNotFound(format!("{}: {}", name, e)))?;
    let service = find_management_service(&services)
        .ok_or_else(|| OperatorError::ServiceNotFound(name.clone()))?;

    let url = management_url(&service.name_any(), &namespace);
    let topology = topology_client.topology(&url).await.map_err(|e| {
        if e.is_health_error() {
            e
        } else {
            OperatorError::TopologyQueryError(e.to_string())
        }
    })?;

    let desired = cluster.spec.cluster_size;
    if topology.has_pending_change() {
        info!(
            pending = ?topology.pending_change,
            "Cluster topology has a pending membership change"
        );
    }
    if topology.brokers.len() != usize::try_from(desired).unwrap_or(0) {
        info!(
            observed = topology.brokers.len(),
            desired, "Broker count differs from desired cluster size"
        );
    }

    let ready = is_ready(&topology, desired);
    let mut status = cluster.status.clone().unwrap_or_default();
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let changed = set_status_condition(
        &mut status.conditions,
        ready_condition(ready, cluster.metadata.generation),
        &now,
    );

    if !changed {
        debug!(ready, "Ready condition unchanged");
        return Ok(false);
    }

    info!(ready, "Updating Ready condition");
    kube.patch_cluster_status(cluster, &status).await?;
    Ok(true)
}
