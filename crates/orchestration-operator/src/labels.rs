//! Label sets stamped on every managed resource
//!
//! Two sets are derived from a cluster identity:
//!
//! - [`identity`] is stable for the lifetime of the cluster and is the only
//!   set allowed in immutable selectors (StatefulSet `spec.selector`).
//! - [`display`] adds the deployed version and may change on every upgrade.

use kube::core::Selector;
use std::collections::BTreeMap;

/// Standard label for the application name
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the instance (cluster) name
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the component within the platform
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the higher-level application this is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Standard label for the managing controller
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the deployed version
pub const K8S_VERSION: &str = "app.kubernetes.io/version";

/// Legacy `app` label kept for dashboards that select on it
pub const APP: &str = "app";

/// Platform name used for `app`, `name` and `part-of`
pub const PLATFORM: &str = "camunda-platform";

/// Component served by the generated workload
pub const COMPONENT_CORE: &str = "core";

/// Value of `app.kubernetes.io/managed-by`, also the server-side apply field manager
pub const MANAGER: &str = "orchestrationcluster-controller";

/// Maximum length of a label value
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// Labels identifying a cluster's resources; never includes the version
pub fn identity(cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP.to_string(), PLATFORM.to_string()),
        (K8S_NAME.to_string(), PLATFORM.to_string()),
        (K8S_INSTANCE.to_string(), cluster_name.to_string()),
        (K8S_COMPONENT.to_string(), COMPONENT_CORE.to_string()),
        (K8S_PART_OF.to_string(), PLATFORM.to_string()),
        (K8S_MANAGED_BY.to_string(), MANAGER.to_string()),
    ])
}

/// Identity labels plus the deployed version
pub fn display(cluster_name: &str, version: &str) -> BTreeMap<String, String> {
    let mut labels = identity(cluster_name);
    labels.insert(K8S_VERSION.to_string(), version_label(version));
    labels
}

/// Label value for a semantic version.
///
/// Build metadata (`+...`) is dropped since `+` is not allowed in label
/// values; the rest is cut to [`MAX_LABEL_VALUE_LEN`] and must begin and end
/// with an alphanumeric character.
pub fn version_label(version: &str) -> String {
    let release = version.split('+').next().unwrap_or_default();
    let value: String = release
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(MAX_LABEL_VALUE_LEN)
        .collect();
    value
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// Equality selector matching every label of `labels`
pub fn selector(labels: &BTreeMap<String, String>) -> Selector {
    labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
