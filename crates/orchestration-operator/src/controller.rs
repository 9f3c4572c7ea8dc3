//! OrchestrationCluster Controller
//!
//! This module implements the Kubernetes controller pattern for managing
//! OrchestrationCluster custom resources. Every cycle re-reads the cluster,
//! renders the resources for its version line, applies them and then
//! refreshes the `Ready` condition from the live topology.

use crate::crd::OrchestrationCluster;
use crate::error::{OperatorError, Result};
use crate::health::evaluate_health;
use crate::kube_client::{ClusterKubeClient, ClusterKubeClientImpl};
use crate::labels;
use crate::management_client::TopologyClient;
use crate::resources::ResourceSet;
use crate::strategy::{Bundle, StrategyRegistry};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Service, ServiceAccount};
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

/// Default requeue interval for successful reconciliations
const DEFAULT_REQUEUE_SECONDS: u64 = 300; // 5 minutes

/// Requeue interval for error cases (base for exponential backoff)
const ERROR_REQUEUE_SECONDS: u64 = 30;

/// Maximum requeue delay for error backoff
const MAX_ERROR_REQUEUE_SECONDS: u64 = 600;

/// Context passed to the controller
pub struct ControllerContext {
    /// Kubernetes access
    pub kube: Arc<dyn ClusterKubeClient>,
    /// Broker management API access
    pub topology: Arc<dyn TopologyClient>,
    /// Version ranges and their strategies
    pub registry: Arc<StrategyRegistry>,
    /// Metrics recorder (optional)
    pub metrics: Option<ControllerMetrics>,
    /// Per-cluster error retry counts for exponential backoff
    pub error_counts: dashmap::DashMap<String, u32>,
}

impl ControllerContext {
    pub fn new(
        kube: Arc<dyn ClusterKubeClient>,
        topology: Arc<dyn TopologyClient>,
        registry: Arc<StrategyRegistry>,
    ) -> Self {
        Self {
            kube,
            topology,
            registry,
            metrics: None,
            error_counts: dashmap::DashMap::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: ControllerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Metrics for the controller
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Counter for reconciliation attempts
    pub reconciliations: metrics::Counter,
    /// Counter for reconciliation errors
    pub errors: metrics::Counter,
    /// Counter for failed health evaluations
    pub health_failures: metrics::Counter,
    /// Histogram for reconciliation duration
    pub duration: metrics::Histogram,
}

impl ControllerMetrics {
    /// Create new controller metrics
    pub fn new() -> Self {
        Self {
            reconciliations: metrics::counter!("orchestration_operator_reconciliations_total"),
            errors: metrics::counter!("orchestration_operator_reconciliation_errors_total"),
            health_failures: metrics::counter!("orchestration_operator_health_check_failures_total"),
            duration: metrics::histogram!(
                "orchestration_operator_reconciliation_duration_seconds"
            ),
        }
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the controller's watch loop is running.
///
/// Shared with the health endpoint; it is only set while the controller
/// stream is being driven.
#[derive(Debug, Default)]
pub struct ControllerLiveness {
    running: AtomicBool,
}

impl ControllerLiveness {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }
}

/// Start the OrchestrationCluster controller
pub async fn run_controller(
    client: Client,
    namespace: Option<String>,
    registry: Arc<StrategyRegistry>,
    topology: Arc<dyn TopologyClient>,
    liveness: Arc<ControllerLiveness>,
) -> Result<()> {
    let clusters: Api<OrchestrationCluster> = match &namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    let ctx = Arc::new(
        ControllerContext::new(
            Arc::new(ClusterKubeClientImpl::new(client.clone())),
            topology,
            registry,
        )
        .with_metrics(ControllerMetrics::new()),
    );

    info!(
        namespace = namespace.as_deref().unwrap_or("all"),
        "Starting OrchestrationCluster controller"
    );

    // Watch generated resources so drift triggers a cycle
    let statefulsets = match &namespace {
        Some(ns) => Api::<StatefulSet>::namespaced(client.clone(), ns),
        None => Api::<StatefulSet>::all(client.clone()),
    };

    let services = match &namespace {
        Some(ns) => Api::<Service>::namespaced(client.clone(), ns),
        None => Api::<Service>::all(client.clone()),
    };

    let service_accounts = match &namespace {
        Some(ns) => Api::<ServiceAccount>::namespaced(client.clone(), ns),
        None => Api::<ServiceAccount>::all(client.clone()),
    };

    liveness.set_running(true);
    Controller::new(clusters, Config::default())
        .owns(statefulsets, Config::default())
        .owns(services, Config::default())
        .owns(service_accounts, Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(
                        name = obj.name,
                        namespace = obj.namespace,
                        ?action,
                        "Reconciliation completed"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation failed");
                }
            }
        })
        .await;
    liveness.set_running(false);

    warn!("OrchestrationCluster controller stream ended");
    Ok(())
}

/// Main reconciliation function
#[instrument(skip(cluster, ctx), fields(name = %cluster.name_any(), namespace = cluster.namespace()))]
async fn reconcile(
    cluster: Arc<OrchestrationCluster>,
    ctx: Arc<ControllerContext>,
) -> Result<Action> {
    let start = std::time::Instant::now();

    if let Some(ref metrics) = ctx.metrics {
        metrics.reconciliations.increment(1);
    }

    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());

    let result = reconcile_cluster(&ctx, &name, &namespace).await;

    if let Some(ref metrics) = ctx.metrics {
        metrics.duration.record(start.elapsed().as_secs_f64());
    }

    match result {
        Ok(()) => {
            // Reset error backoff counter on success
            ctx.error_counts.remove(&backoff_key(&name, &namespace));
            Ok(Action::requeue(Duration::from_secs(DEFAULT_REQUEUE_SECONDS)))
        }
        Err(e) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.errors.increment(1);
            }
            Err(e)
        }
    }
}

/// One reconciliation cycle for the cluster `namespace/name`.
///
/// Desired-state errors abort the cycle; health evaluation errors are
/// logged and swallowed.
pub async fn reconcile_cluster(ctx: &ControllerContext, name: &str, namespace: &str) -> Result<()> {
    // Always work on a fresh copy, never the watcher's cached object
    let cluster = match ctx.kube.get_cluster(name, namespace).await? {
        Some(cluster) => cluster,
        None => {
            // Deleted clusters keep no backoff state
            ctx.error_counts.remove(&backoff_key(name, namespace));
            return Err(OperatorError::ClusterNotFound(backoff_key(name, namespace)));
        }
    };

    info!(name = %name, namespace = %namespace, version = %cluster.spec.effective_version(), "Reconciling OrchestrationCluster");

    validate_cluster(&cluster)?;

    let bundle = Bundle::new(cluster, &ctx.registry).map_err(|e| {
        warn!(name = %name, error = %e, "Unable to select a version strategy");
        e
    })?;
    let resources = desired_resources(&bundle)?;

    for resource in &resources {
        debug!(kind = resource.kind(), resource = resource.name(), "Applying resource");
        ctx.kube.apply_resource(resource).await?;
    }

    match evaluate_health(ctx.kube.as_ref(), ctx.topology.as_ref(), &bundle.cluster).await {
        Ok(written) => debug!(name = %name, status_written = written, "Health evaluated"),
        Err(e) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.health_failures.increment(1);
            }
            warn!(name = %name, error = %e, "Health evaluation failed");
        }
    }

    info!(name = %name, strategy = ?bundle.strategy, resources = resources.len(), "Reconciliation complete");
    Ok(())
}

/// Reject specs that fail structural validation
fn validate_cluster(cluster: &OrchestrationCluster) -> Result<()> {
    if let Err(errors) = cluster.spec.validate() {
        let error_messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter()
                    .map(move |e| format!("{}: {:?}", field, e.message))
            })
            .collect();
        let error_msg = error_messages.join("; ");
        warn!(name = %cluster.name_any(), errors = %error_msg, "Cluster spec validation failed");
        return Err(OperatorError::InvalidConfig(error_msg));
    }
    Ok(())
}

/// Build the resources of `bundle`, stamped with display labels and an
/// owner reference back to the cluster
pub fn desired_resources(bundle: &Bundle) -> Result<ResourceSet> {
    let cluster = &bundle.cluster;
    let owner = cluster.controller_owner_ref(&()).ok_or_else(|| {
        OperatorError::InvalidConfig("cluster has no uid; cannot own resources".to_string())
    })?;
    let display = labels::display(&cluster.name_any(), cluster.spec.effective_version());

    let mut resources = bundle.resources()?;
    for resource in &mut resources {
        resource.merge_labels(&display);
        resource.set_controller_owner(owner.clone());
    }
    Ok(resources)
}

fn backoff_key(name: &str, namespace: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Error policy for the controller: exponential backoff
fn error_policy(
    cluster: Arc<OrchestrationCluster>,
    error: &OperatorError,
    ctx: Arc<ControllerContext>,
) -> Action {
    let key = backoff_key(
        &cluster.name_any(),
        &cluster.namespace().unwrap_or_else(|| "default".to_string()),
    );
    let retries = {
        let mut entry = ctx.error_counts.entry(key.clone()).or_insert(0);
        *entry += 1;
        *entry
    };

    // Use the error's suggested delay OR exponential backoff:
    // 30s → 60s → 120s → 240s → 480s → 600s (capped)
    let delay = error.requeue_delay().unwrap_or_else(|| {
        let base = Duration::from_secs(ERROR_REQUEUE_SECONDS);
        let backoff = base * 2u32.saturating_pow((retries - 1).min(5));
        backoff.min(Duration::from_secs(MAX_ERROR_REQUEUE_SECONDS))
    });

    warn!(
        error = %error,
        retry = retries,
        delay_secs = delay.as_secs(),
        "Reconciliation error for '{}', will retry",
        key
    );

    Action::requeue(delay)
}
