//! Environment composition for the broker container
//!
//! The generated variables are derived purely from the cluster spec. User
//! overrides from `spec.env` are merged on top with [`merge_env_vars`]:
//! an override replaces the generated entry of the same name, and the
//! result is sorted by name so repeated builds render identically.

use crate::crd::{DatabaseSpec, DatabaseType, OrchestrationClusterSpec};
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector, SecretKeySelector};
use std::collections::BTreeMap;

/// Port peers use for cluster-internal gossip
pub const INTERNAL_PORT: i32 = 26502;

/// Pod label carrying the StatefulSet ordinal
const POD_INDEX_FIELD: &str = "metadata.labels['apps.kubernetes.io/pod-index']";

/// Index prefix of the records exported to elasticsearch
const RECORD_PREFIX: &str = "zeebe-record";

/// Cluster name reported to the web applications
const ES_CLUSTER_NAME: &str = "elasticsearch";

/// Version-specific knobs of the generated environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvProfile {
    /// Value of `SPRING_PROFILES_ACTIVE`
    pub active_profiles: &'static str,
    /// Emit the authorization/authentication posture flags
    pub security_flags: bool,
    /// Applications that get their own database block (`CAMUNDA_<APP>_*`)
    pub applications: &'static [&'static str],
}

/// Inputs needed to derive the environment of one cluster
#[derive(Debug, Clone, Copy)]
pub struct EnvContext<'a> {
    pub cluster_name: &'a str,
    pub namespace: &'a str,
    /// Name of the headless service that gives every pod a stable DNS name
    pub headless_service: &'a str,
    pub spec: &'a OrchestrationClusterSpec,
}

fn literal(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn secret(name: impl Into<String>, selector: &SecretKeySelector) -> EnvVar {
    EnvVar {
        name: name.into(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(selector.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Comma separated `host:port` list of every broker's internal endpoint
pub fn peer_addresses(ctx: &EnvContext<'_>) -> String {
    (0..ctx.spec.cluster_size.max(0))
        .map(|index| {
            format!(
                "{}-{}.{}.{}.svc.cluster.local:{}",
                ctx.cluster_name, index, ctx.headless_service, ctx.namespace, INTERNAL_PORT
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Cluster topology variables shared by every version
fn topology_env(ctx: &EnvContext<'_>, profile: &EnvProfile) -> Vec<EnvVar> {
    let spec = ctx.spec;
    let mut env = vec![
        EnvVar {
            name: "ZEEBE_BROKER_CLUSTER_NODEID".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    api_version: Some("v1".to_string()),
                    field_path: POD_INDEX_FIELD.to_string(),
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        literal("ZEEBE_BROKER_CLUSTER_INITIALCONTACTPOINTS", peer_addresses(ctx)),
        literal(
            "ZEEBE_BROKER_CLUSTER_PARTITIONS_COUNT",
            spec.partition_count.to_string(),
        ),
        literal(
            "ZEEBE_BROKER_CLUSTER_REPLICATION_FACTOR",
            spec.replication_factor.to_string(),
        ),
        literal(
            "ZEEBE_BROKER_CLUSTER_CLUSTER_SIZE",
            spec.cluster_size.to_string(),
        ),
        literal("SPRING_PROFILES_ACTIVE", profile.active_profiles),
    ];

    if profile.security_flags {
        env.push(literal("CAMUNDA_SECURITY_AUTHORIZATIONS_ENABLED", "true"));
        env.push(literal(
            "CAMUNDA_SECURITY_AUTHENTICATION_UNPROTECTEDAPI",
            "false",
        ));
    }

    env
}

/// Exporter block: class name plus connection settings under `ARGS_<param>_*`
fn exporter_env(name: &str, class_name: &str, param: &str, db: &DatabaseSpec) -> Vec<EnvVar> {
    vec![
        literal(
            format!("ZEEBE_BROKER_EXPORTERS_{}_CLASS_NAME", name),
            class_name,
        ),
        literal(
            format!("ZEEBE_BROKER_EXPORTERS_{}_ARGS_{}_URL", name, param),
            db.host_name.as_str(),
        ),
        literal(
            format!("ZEEBE_BROKER_EXPORTERS_{}_ARGS_{}_USERNAME", name, param),
            db.user_name.as_str(),
        ),
        secret(
            format!("ZEEBE_BROKER_EXPORTERS_{}_ARGS_{}_PASSWORD", name, param),
            &db.password,
        ),
    ]
}

fn camunda_exporter_env(db: &DatabaseSpec) -> Vec<EnvVar> {
    exporter_env(
        "CAMUNDAEXPORTER",
        "io.camunda.exporter.CamundaExporter",
        "CONNECT",
        db,
    )
}

fn elasticsearch_exporter_env(db: &DatabaseSpec) -> Vec<EnvVar> {
    let mut env = exporter_env(
        "ELASTICSEARCH",
        "io.camunda.zeebe.exporter.ElasticsearchExporter",
        "AUTHENTICATION",
        db,
    );
    // The elasticsearch exporter reads its URL outside the authentication block
    env[1].name = "ZEEBE_BROKER_EXPORTERS_ELASTICSEARCH_ARGS_URL".to_string();
    env
}

fn database_connect_env(db: &DatabaseSpec) -> Vec<EnvVar> {
    vec![
        literal("CAMUNDA_DATABASE_CONNECT_TYPE", db.database_type.as_str()),
        literal("CAMUNDA_DATABASE_CONNECT_URL", db.host_name.as_str()),
        literal("CAMUNDA_DATABASE_CONNECT_CLUSTERNAME", ES_CLUSTER_NAME),
        literal("CAMUNDA_DATABASE_CONNECT_USERNAME", db.user_name.as_str()),
        secret("CAMUNDA_DATABASE_CONNECT_PASSWORD", &db.password),
    ]
}

fn application_env(app: &str, db: &DatabaseSpec) -> Vec<EnvVar> {
    vec![
        literal(
            format!("CAMUNDA_{}_DATABASE", app),
            db.database_type.as_str(),
        ),
        literal(
            format!("CAMUNDA_{}_ELASTICSEARCH_URL", app),
            db.host_name.as_str(),
        ),
        literal(format!("CAMUNDA_{}_ELASTICSEARCH_PREFIX", app), RECORD_PREFIX),
        literal(
            format!("CAMUNDA_{}_ELASTICSEARCH_CLUSTERNAME", app),
            ES_CLUSTER_NAME,
        ),
        literal(
            format!("CAMUNDA_{}_ELASTICSEARCH_USERNAME", app),
            db.user_name.as_str(),
        ),
        secret(
            format!("CAMUNDA_{}_ELASTICSEARCH_PASSWORD", app),
            &db.password,
        ),
        literal(
            format!("CAMUNDA_{}_ZEEBEELASTICSEARCH_URL", app),
            db.host_name.as_str(),
        ),
        literal(
            format!("CAMUNDA_{}_ZEEBEELASTICSEARCH_USERNAME", app),
            db.user_name.as_str(),
        ),
        secret(
            format!("CAMUNDA_{}_ZEEBEELASTICSEARCH_PASSWORD", app),
            &db.password,
        ),
    ]
}

fn zeebe_elasticsearch_env(db: &DatabaseSpec) -> Vec<EnvVar> {
    vec![
        literal("CAMUNDA_ZEEBE_ELASTICSEARCH_URL", db.host_name.as_str()),
        literal(
            "CAMUNDA_ZEEBE_ELASTICSEARCH_USERNAME",
            db.user_name.as_str(),
        ),
        secret("CAMUNDA_ZEEBE_ELASTICSEARCH_PASSWORD", &db.password),
    ]
}

/// Variables generated from the spec, before user overrides
pub fn generated_env(ctx: &EnvContext<'_>, profile: &EnvProfile) -> Vec<EnvVar> {
    let mut env = topology_env(ctx, profile);

    let db = &ctx.spec.database;
    if db.database_type == DatabaseType::Elasticsearch {
        env.extend(camunda_exporter_env(db));
        env.extend(elasticsearch_exporter_env(db));
        env.extend(database_connect_env(db));
        for app in profile.applications {
            env.extend(application_env(app, db));
        }
        env.extend(zeebe_elasticsearch_env(db));
    }

    env
}

/// Final container environment: generated variables with `spec.env` applied on top
pub fn compose_env(ctx: &EnvContext<'_>, profile: &EnvProfile) -> Vec<EnvVar> {
    merge_env_vars(generated_env(ctx, profile), ctx.spec.env.clone())
}

/// Merge two variable lists into one sorted, name-unique list.
///
/// Entries in `overrides` replace entries in `base` with the same name.
pub fn merge_env_vars(base: Vec<EnvVar>, overrides: Vec<EnvVar>) -> Vec<EnvVar> {
    let mut merged: BTreeMap<String, EnvVar> = BTreeMap::new();
    for var in base.into_iter().chain(overrides) {
        merged.insert(var.name.clone(), var);
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DatabaseSpec, OrchestrationClusterSpec};
    use std::collections::HashSet;

    const CONSOLIDATED: EnvProfile = EnvProfile {
        active_profiles: "identity,operate,tasklist,broker,consolidated-auth",
        security_flags: true,
        applications: &["OPERATE", "TASKLIST"],
    };

    fn var(name: &str, value: &str) -> EnvVar {
        literal(name, value)
    }

    fn test_spec(database_type: DatabaseType) -> OrchestrationClusterSpec {
        OrchestrationClusterSpec {
            version: "8.8.0-alpha1".to_string(),
            partition_count: 3,
            replication_factor: 3,
            cluster_size: 3,
            resources: None,
            env: vec![],
            env_from: vec![],
            database: DatabaseSpec {
                database_type,
                user_name: "my-username".to_string(),
                password: SecretKeySelector {
                    name: "my-password-secret".to_string(),
                    key: "password".to_string(),
                    optional: None,
                },
                host_name: "localhost:9205".to_string(),
            },
        }
    }

    fn ctx(spec: &OrchestrationClusterSpec) -> EnvContext<'_> {
        EnvContext {
            cluster_name: "camunda",
            namespace: "ns",
            headless_service: "camunda-core-headless",
            spec,
        }
    }

    #[test]
    fn test_merge_override_wins() {
        let first = vec![var("VAR1", "a"), var("VAR2", "b")];
        let second = vec![var("VAR1", "c"), var("VAR3", "d")];

        let result = merge_env_vars(first, second);

        assert_eq!(result.len(), 3);
        let names: Vec<_> = result.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["VAR1", "VAR2", "VAR3"]);
        assert_eq!(result[0].value.as_deref(), Some("c"));
    }

    #[test]
    fn test_merge_precedence_follows_argument_order() {
        let first = vec![var("VAR1", "a"), var("VAR2", "b")];
        let second = vec![var("VAR1", "c"), var("VAR3", "d")];

        let result = merge_env_vars(second, first);

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].name, "VAR1");
        assert_eq!(result[0].value.as_deref(), Some("a"));
    }

    #[test]
    fn test_merge_empty_inputs() {
        assert!(merge_env_vars(vec![], vec![]).is_empty());

        let only_base = merge_env_vars(vec![var("B", "1"), var("A", "2")], vec![]);
        assert_eq!(only_base[0].name, "A");
        assert_eq!(only_base[1].name, "B");

        let only_overrides = merge_env_vars(vec![], vec![var("B", "1"), var("A", "2")]);
        assert_eq!(only_overrides[0].name, "A");
    }

    #[test]
    fn test_merge_sorts_names() {
        let result = merge_env_vars(
            vec![var("Z", "z"), var("X", "x")],
            vec![var("B", "b"), var("A", "a")],
        );
        let names: Vec<_> = result.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "X", "Z"]);
    }

    #[test]
    fn test_merge_preserves_value_from() {
        let field_ref = EnvVar {
            name: "VAR1".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.name".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = merge_env_vars(vec![field_ref.clone()], vec![var("VAR2", "v")]);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0], field_ref);
    }

    #[test]
    fn test_peer_addresses() {
        let spec = test_spec(DatabaseType::Elasticsearch);
        let addresses = peer_addresses(&ctx(&spec));

        assert_eq!(
            addresses,
            "camunda-0.camunda-core-headless.ns.svc.cluster.local:26502,\
             camunda-1.camunda-core-headless.ns.svc.cluster.local:26502,\
             camunda-2.camunda-core-headless.ns.svc.cluster.local:26502"
        );
        assert!(!addresses.ends_with(','));
    }

    #[test]
    fn test_peer_addresses_empty_cluster() {
        let mut spec = test_spec(DatabaseType::Elasticsearch);
        spec.cluster_size = 0;
        assert_eq!(peer_addresses(&ctx(&spec)), "");
    }

    #[test]
    fn test_composed_env_is_sorted_and_unique() {
        let spec = test_spec(DatabaseType::Elasticsearch);
        let env = compose_env(&ctx(&spec), &CONSOLIDATED);

        let names: Vec<_> = env.iter().map(|v| v.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_node_id_is_field_reference() {
        let spec = test_spec(DatabaseType::Postgresql);
        let env = compose_env(&ctx(&spec), &CONSOLIDATED);

        let node_id = env
            .iter()
            .find(|v| v.name == "ZEEBE_BROKER_CLUSTER_NODEID")
            .unwrap();
        assert!(node_id.value.is_none());
        let field_ref = node_id
            .value_from
            .as_ref()
            .and_then(|s| s.field_ref.as_ref())
            .unwrap();
        assert_eq!(field_ref.field_path, POD_INDEX_FIELD);
    }

    #[test]
    fn test_postgresql_has_no_database_blocks() {
        let spec = test_spec(DatabaseType::Postgresql);
        let env = compose_env(&ctx(&spec), &CONSOLIDATED);

        assert_eq!(env.len(), 8);
        assert!(env.iter().all(|v| !v.name.contains("EXPORTERS")));
        assert!(env.iter().all(|v| !v.name.starts_with("CAMUNDA_DATABASE")));
    }

    #[test]
    fn test_elasticsearch_blocks() {
        let spec = test_spec(DatabaseType::Elasticsearch);
        let env = compose_env(&ctx(&spec), &CONSOLIDATED);
        let get = |name: &str| env.iter().find(|v| v.name == name);

        // 8 topology + 4 + 4 exporters + 5 connect + 2 * 9 applications + 3 zeebe
        assert_eq!(env.len(), 42);
        assert_eq!(
            get("ZEEBE_BROKER_EXPORTERS_ELASTICSEARCH_ARGS_URL")
                .and_then(|v| v.value.as_deref()),
            Some("localhost:9205")
        );
        assert!(get("ZEEBE_BROKER_EXPORTERS_ELASTICSEARCH_ARGS_AUTHENTICATION_URL").is_none());
        assert_eq!(
            get("CAMUNDA_TASKLIST_ELASTICSEARCH_PREFIX").and_then(|v| v.value.as_deref()),
            Some("zeebe-record")
        );
        assert!(get("CAMUNDA_OPERATE_ZEEBEELASTICSEARCH_URL").is_some());
        assert!(get("CAMUNDA_ZEEBE_ELASTICSEARCH_USERNAME").is_some());
    }

    #[test]
    fn test_passwords_are_secret_references() {
        let spec = test_spec(DatabaseType::Elasticsearch);
        let env = compose_env(&ctx(&spec), &CONSOLIDATED);

        let passwords: Vec<_> = env
            .iter()
            .filter(|v| v.name.ends_with("PASSWORD"))
            .collect();
        assert_eq!(passwords.len(), 8);
        for password in passwords {
            assert!(password.value.is_none(), "{} set by value", password.name);
            let secret = password
                .value_from
                .as_ref()
                .and_then(|s| s.secret_key_ref.as_ref())
                .unwrap();
            assert_eq!(secret.name, "my-password-secret");
        }
    }

    #[test]
    fn test_user_override_replaces_generated() {
        let mut spec = test_spec(DatabaseType::Postgresql);
        spec.env = vec![
            var("SPRING_PROFILES_ACTIVE", "broker"),
            var("JAVA_TOOL_OPTIONS", "-Xmx1g"),
        ];
        let env = compose_env(&ctx(&spec), &CONSOLIDATED);

        assert_eq!(env.len(), 9);
        let profile = env
            .iter()
            .find(|v| v.name == "SPRING_PROFILES_ACTIVE")
            .unwrap();
        assert_eq!(profile.value.as_deref(), Some("broker"));
    }

    #[test]
    fn test_security_flags_follow_profile() {
        let spec = test_spec(DatabaseType::Postgresql);
        let legacy = EnvProfile {
            active_profiles: "broker,operate",
            security_flags: false,
            applications: &["OPERATE"],
        };
        let env = compose_env(&ctx(&spec), &legacy);

        assert_eq!(env.len(), 6);
        assert!(env
            .iter()
            .all(|v| !v.name.starts_with("CAMUNDA_SECURITY")));
    }
}
