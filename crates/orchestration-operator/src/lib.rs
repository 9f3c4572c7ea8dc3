//! # OrchestrationCluster Kubernetes Operator
//!
//! Kubernetes operator that keeps Camunda orchestration clusters (brokers,
//! gateway and the bundled web applications) in sync with declarative
//! `OrchestrationCluster` resources and reports their readiness.
//!
//! ## Features
//!
//! - **Custom Resource Definition**: `OrchestrationCluster` (`core.camunda.io/v1alpha1`)
//! - **Version strategies**: each supported release line renders its own resource layout
//! - **Deterministic rendering**: identical specs always produce identical manifests
//! - **Idempotent apply**: create-or-take-ownership with server-side apply
//! - **Health reporting**: a `Ready` condition derived from the live broker topology
//! - **Observability**: Prometheus-compatible operator metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orchestration_operator::prelude::*;
//! use kube::Client;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::try_default().await?;
//!     let registry = Arc::new(StrategyRegistry::standard()?);
//!     let topology = Arc::new(ManagementClient::new()?);
//!     let liveness = Arc::new(ControllerLiveness::default());
//!
//!     run_controller(client, None, registry, topology, liveness).await
//! }
//! ```
//!
//! ## Architecture
//!
//! Every reconciliation cycle:
//!
//! 1. **Fetch**: re-read the OrchestrationCluster
//! 2. **Select**: pick the [`strategy::VersionStrategy`] registered for its version
//! 3. **Build**: render the service account, services and StatefulSet
//! 4. **Apply**: stamp labels and owner references, then apply each resource
//! 5. **Evaluate**: query the topology and update the `Ready` condition if it changed
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types with validation
//! - [`controller`] - reconciliation engine and controller setup
//! - [`strategy`] - version ranges and the strategies registered for them
//! - [`resources`] - Kubernetes resource builders (ServiceAccount, Service, StatefulSet)
//! - [`env`] - broker container environment composition
//! - [`labels`] - identity and display label sets
//! - [`health`] - readiness evaluation and status conditions
//! - [`kube_client`] - Kubernetes access used by the reconciler
//! - [`management_client`] - broker management API client
//! - [`error`] - Error types for operator operations
//!
//! ## Custom Resource Definition
//!
//! ```yaml
//! apiVersion: core.camunda.io/v1alpha1
//! kind: OrchestrationCluster
//! metadata:
//!   name: camunda
//! spec:
//!   version: "8.7.7"
//!   clusterSize: 3
//!   partitionCount: 3
//!   replicationFactor: 3
//!   database:
//!     type: elasticsearch
//!     hostName: http://elasticsearch:9200
//!     userName: elastic
//!     password:
//!       name: elasticsearch-credentials
//!       key: password
//! ```

pub mod controller;
pub mod crd;
pub mod env;
pub mod error;
pub mod health;
pub mod kube_client;
pub mod labels;
pub mod management_client;
pub mod resources;
pub mod strategy;

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::controller::{run_controller, ControllerLiveness};
    pub use crate::crd::{OrchestrationCluster, OrchestrationClusterSpec, OrchestrationClusterStatus};
    pub use crate::error::{OperatorError, Result};
    pub use crate::management_client::{ManagementClient, ManagementClientConfig};
    pub use crate::strategy::{Bundle, StrategyRegistry, VersionStrategy};
}
