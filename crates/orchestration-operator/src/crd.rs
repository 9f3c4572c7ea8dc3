//! Custom Resource Definition for the OrchestrationCluster operator
//!
//! This module defines the `OrchestrationCluster` CRD that describes a
//! Camunda orchestration cluster (brokers, gateway and the bundled web
//! applications) running inside Kubernetes.

use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar, ResourceRequirements, SecretKeySelector};
use kube::CustomResource;
use regex::Regex;
use schemars::gen::SchemaGenerator;
use schemars::schema::{ArrayValidation, InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

/// Version deployed when the specification leaves `version` empty
pub const DEFAULT_VERSION: &str = "8.7.7";

/// Condition type reported for overall cluster readiness
pub const CONDITION_READY: &str = "Ready";

/// Regex for validating environment variable names (Kubernetes C_IDENTIFIER rules, relaxed)
static ENV_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-._a-zA-Z][-._a-zA-Z0-9]*$").unwrap());

/// Validate the user supplied environment overrides
fn validate_env_vars(vars: &[EnvVar]) -> Result<(), ValidationError> {
    const MAX_ENV_VARS: usize = 100;
    if vars.len() > MAX_ENV_VARS {
        return Err(ValidationError::new("too_many_env_vars").with_message(
            format!("maximum {} environment variables allowed", MAX_ENV_VARS).into(),
        ));
    }

    let mut seen = BTreeSet::new();
    for var in vars {
        if var.name.is_empty() || var.name.len() > 256 {
            return Err(ValidationError::new("invalid_env_name")
                .with_message("environment variable name must be 1-256 characters".into()));
        }
        if !ENV_NAME_REGEX.is_match(&var.name) {
            return Err(ValidationError::new("invalid_env_name").with_message(
                format!("'{}' is not a valid environment variable name", var.name).into(),
            ));
        }
        if !seen.insert(var.name.as_str()) {
            return Err(ValidationError::new("duplicate_env_name").with_message(
                format!("environment variable '{}' is declared twice", var.name).into(),
            ));
        }
    }
    Ok(())
}

/// Schema for embedded core/v1 objects that must survive API server pruning
fn preserve_unknown_object(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(schema)
}

/// Schema for lists of embedded core/v1 objects
fn preserve_unknown_array(gen: &mut SchemaGenerator) -> Schema {
    Schema::Object(SchemaObject {
        instance_type: Some(InstanceType::Array.into()),
        array: Some(Box::new(ArrayValidation {
            items: Some(preserve_unknown_object(gen).into()),
            ..Default::default()
        })),
        ..Default::default()
    })
}

/// OrchestrationCluster custom resource definition
///
/// Declares the desired shape of one Camunda orchestration cluster. The
/// operator turns it into a service account, network services and a
/// StatefulSet, and reports readiness back through `status.conditions`.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, Validate)]
#[kube(
    group = "core.camunda.io",
    version = "v1alpha1",
    kind = "OrchestrationCluster",
    plural = "orchestrationclusters",
    shortname = "oc",
    namespaced,
    status = "OrchestrationClusterStatus",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Size", "type":"integer", "jsonPath":".spec.clusterSize"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationClusterSpec {
    /// Camunda version to deploy (semantic version)
    #[serde(default = "default_version")]
    #[validate(length(min = 1, max = 63, message = "version must be 1-63 characters"))]
    pub version: String,

    /// Number of partitions
    #[serde(default = "default_partition_count")]
    #[validate(range(min = 0, message = "partitionCount must not be negative"))]
    pub partition_count: i32,

    /// Replication factor of every partition
    #[serde(default = "default_replication_factor")]
    #[validate(range(min = 0, message = "replicationFactor must not be negative"))]
    pub replication_factor: i32,

    /// Number of brokers (0-100)
    #[serde(default = "default_cluster_size")]
    #[validate(range(min = 0, max = 100, message = "clusterSize must be between 0 and 100"))]
    pub cluster_size: i32,

    /// Resource requirements of every generated pod
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub resources: Option<ResourceRequirements>,

    /// Environment overrides passed to the broker container
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_array")]
    #[validate(custom(function = "validate_env_vars"))]
    pub env: Vec<EnvVar>,

    /// Additional environment sources for the broker container
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_array")]
    pub env_from: Vec<EnvFromSource>,

    /// Secondary storage used by the exporters and web applications
    pub database: DatabaseSpec,
}

/// Secondary database backing the cluster
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Database flavour
    #[serde(rename = "type")]
    pub database_type: DatabaseType,

    /// User name used to authenticate
    #[serde(default)]
    pub user_name: String,

    /// Reference to the secret key holding the password
    #[serde(default)]
    #[schemars(schema_with = "preserve_unknown_object")]
    pub password: SecretKeySelector,

    /// Host (and port) of the database endpoint
    #[serde(default)]
    pub host_name: String,
}

/// Supported secondary databases
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Elasticsearch,
    Postgresql,
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::Elasticsearch => "elasticsearch",
            DatabaseType::Postgresql => "postgresql",
        }
    }
}

/// Observed state of an OrchestrationCluster
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationClusterStatus {
    /// Conditions keyed by type; at most one entry per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ClusterCondition>,
}

/// Condition describing an aspect of cluster state
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Type of condition
    #[serde(rename = "type")]
    pub condition_type: String,

    /// Status of the condition (True, False, Unknown)
    pub status: String,

    /// Generation of the spec the condition was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Machine readable reason
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the status flipped (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// Default value functions
fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_partition_count() -> i32 {
    3
}

fn default_replication_factor() -> i32 {
    3
}

fn default_cluster_size() -> i32 {
    3
}

impl OrchestrationClusterSpec {
    /// Version to deploy, falling back to [`DEFAULT_VERSION`] when unset
    pub fn effective_version(&self) -> &str {
        if self.version.trim().is_empty() {
            DEFAULT_VERSION
        } else {
            self.version.trim()
        }
    }

    /// Container image for the declared version
    pub fn image(&self) -> String {
        format!("camunda/camunda:{}", self.effective_version())
    }
}
