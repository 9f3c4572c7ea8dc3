//! Cluster Management Client
//!
//! This module provides a client for the management (actuator) API exposed
//! by every broker. The operator only needs the cluster topology: which
//! brokers have joined and whether a membership change is still in flight.

use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Default timeout for a whole topology request
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default TCP connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Actuator path serving the cluster topology
const TOPOLOGY_PATH: &str = "/actuator/cluster";

/// Cluster topology as reported by the management API
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Brokers that are currently members of the cluster
    #[serde(default)]
    pub brokers: Vec<BrokerInfo>,

    /// Membership change still being applied, if any
    #[serde(default)]
    pub pending_change: Option<PendingChange>,

    /// Topology version; 0 until the cluster has been initialized
    #[serde(default)]
    pub version: i64,
}

/// One broker in the topology
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerInfo {
    pub node_id: i32,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub partitions: Vec<serde_json::Value>,
}

/// Membership change in progress
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub status: String,
    /// Remaining operations of the change
    #[serde(default)]
    pub pending: Vec<serde_json::Value>,
}

impl Topology {
    /// Whether a membership change has operations left to apply
    pub fn has_pending_change(&self) -> bool {
        self.pending_change
            .as_ref()
            .is_some_and(|change| !change.pending.is_empty())
    }
}

/// Source of cluster topology
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TopologyClient: Send + Sync {
    /// Query the topology of the cluster reachable at `base_url`
    async fn topology(&self, base_url: &str) -> Result<Topology>;
}

/// Configuration for the management client
#[derive(Debug, Clone)]
pub struct ManagementClientConfig {
    /// Upper bound for one request, connect included
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for ManagementClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// HTTP client for the broker management API
#[derive(Debug, Clone)]
pub struct ManagementClient {
    config: ManagementClientConfig,
    http: reqwest::Client,
}

impl ManagementClient {
    /// Create a new management client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ManagementClientConfig::default())
    }

    /// Create a new management client with custom configuration
    pub fn with_config(config: ManagementClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| {
                OperatorError::InvalidConfig(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl TopologyClient for ManagementClient {
    async fn topology(&self, base_url: &str) -> Result<Topology> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), TOPOLOGY_PATH);
        debug!(url = %url, "Querying cluster topology");

        let request = async {
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| OperatorError::TopologyQueryError(format!("{url}: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                warn!(url = %url, status = %status, "Topology endpoint returned an error");
                return Err(OperatorError::TopologyQueryError(format!(
                    "{url}: unexpected status {status}"
                )));
            }

            response
                .json::<Topology>()
                .await
                .map_err(|e| OperatorError::TopologyQueryError(format!("{url}: {e}")))
        };

        timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| OperatorError::Timeout(format!("topology query to {url} timed out")))?
    }
}
