//! Kubernetes Resource Builders
//!
//! This module generates the Kubernetes manifests (ServiceAccount, Services,
//! StatefulSet) for an OrchestrationCluster. Building is a pure function of
//! the cluster object: the same input always renders the same resource set.

use crate::crd::OrchestrationCluster;
use crate::env::{self, EnvContext, EnvProfile};
use crate::error::{OperatorError, Result};
use crate::labels;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, EmptyDirVolumeSource, HTTPGetAction,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSecurityContext, PodSpec,
    PodTemplateSpec, Probe, SeccompProfile, SecurityContext, Service, ServiceAccount,
    ServicePort, ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::Resource as _;
use serde::Serialize;
use std::collections::BTreeMap;

/// REST port serving the web applications
pub const HTTP_PORT: i32 = 8080;
/// Spring actuator port (health, topology)
pub const MANAGEMENT_PORT: i32 = 9600;
/// Client gateway (gRPC) port
pub const GATEWAY_PORT: i32 = 26500;
/// Broker command API port
pub const COMMAND_PORT: i32 = 26501;
/// Cluster-internal gossip port
pub const INTERNAL_PORT: i32 = env::INTERNAL_PORT;

/// UID/GID the camunda image runs as
const CAMUNDA_USER: i64 = 1001;

/// Minimum capacity of each broker's data volume
const DATA_VOLUME_SIZE: &str = "10Gi";

const DATA_MOUNT_PATH: &str = "/usr/local/zeebe/data";

/// Shape of the resource set produced for one version line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Environment knobs of the version line
    pub env: EnvProfile,
    /// Split client traffic onto a dedicated `-gateway` service.
    ///
    /// Without it a single headless `-core` service carries every port.
    pub gateway_service: bool,
}

/// One generated Kubernetes object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ManagedResource {
    ServiceAccount(ServiceAccount),
    Service(Service),
    StatefulSet(StatefulSet),
}

/// Ordered output of a resource builder
pub type ResourceSet = Vec<ManagedResource>;

impl ManagedResource {
    /// Kubernetes kind of the wrapped object
    pub fn kind(&self) -> &'static str {
        match self {
            ManagedResource::ServiceAccount(_) => ServiceAccount::KIND,
            ManagedResource::Service(_) => Service::KIND,
            ManagedResource::StatefulSet(_) => StatefulSet::KIND,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ManagedResource::ServiceAccount(sa) => &sa.metadata,
            ManagedResource::Service(svc) => &svc.metadata,
            ManagedResource::StatefulSet(sts) => &sts.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ManagedResource::ServiceAccount(sa) => &mut sa.metadata,
            ManagedResource::Service(svc) => &mut svc.metadata,
            ManagedResource::StatefulSet(sts) => &mut sts.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Merge `extra` into the object's labels; `extra` wins on key collisions
    pub fn merge_labels(&mut self, extra: &BTreeMap<String, String>) {
        let labels = self.metadata_mut().labels.get_or_insert_with(BTreeMap::new);
        labels.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Make `owner` the single controller reference of the object
    pub fn set_controller_owner(&mut self, owner: OwnerReference) {
        let refs = self.metadata_mut().owner_references.get_or_insert_with(Vec::new);
        refs.retain(|r| r.uid != owner.uid && r.controller != Some(true));
        refs.push(owner);
    }
}

/// Builder for generating Kubernetes resources from an OrchestrationCluster
pub struct ResourceBuilder<'a> {
    cluster: &'a OrchestrationCluster,
    name: String,
    namespace: String,
}

impl<'a> ResourceBuilder<'a> {
    /// Create a new resource builder
    pub fn new(cluster: &'a OrchestrationCluster) -> Result<Self> {
        let name =
            cluster.metadata.name.clone().ok_or_else(|| {
                OperatorError::InvalidConfig("cluster name is required".to_string())
            })?;

        let namespace = cluster
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());

        Ok(Self {
            cluster,
            name,
            namespace,
        })
    }

    /// Render the full resource set for `layout`
    pub fn build(&self, layout: &Layout) -> ResourceSet {
        let mut resources = vec![
            ManagedResource::ServiceAccount(self.build_service_account()),
            ManagedResource::Service(self.build_headless_service(layout)),
        ];
        if layout.gateway_service {
            resources.push(ManagedResource::Service(self.build_gateway_service()));
        }
        resources.push(ManagedResource::StatefulSet(self.build_statefulset(layout)));
        resources
    }

    /// `<cluster>-core`, shared by the service account and the services
    fn core_name(&self) -> String {
        format!("{}-core", self.name)
    }

    /// Name of the headless service backing pod DNS
    pub fn headless_service_name(&self, layout: &Layout) -> String {
        if layout.gateway_service {
            format!("{}-headless", self.core_name())
        } else {
            self.core_name()
        }
    }

    fn object_meta(&self, name: String) -> ObjectMeta {
        ObjectMeta {
            name: Some(name),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.display_labels()),
            ..Default::default()
        }
    }

    fn display_labels(&self) -> BTreeMap<String, String> {
        labels::display(&self.name, self.cluster.spec.effective_version())
    }

    /// Build the service account the broker pods run as
    pub fn build_service_account(&self) -> ServiceAccount {
        ServiceAccount {
            metadata: self.object_meta(self.core_name()),
            ..Default::default()
        }
    }

    /// Build the headless service for peer discovery
    pub fn build_headless_service(&self, layout: &Layout) -> Service {
        let ports = if layout.gateway_service {
            vec![
                service_port("management", MANAGEMENT_PORT),
                service_port("command", COMMAND_PORT),
                service_port("internal", INTERNAL_PORT),
            ]
        } else {
            vec![
                service_port("http", HTTP_PORT),
                service_port("management", MANAGEMENT_PORT),
                service_port("gateway", GATEWAY_PORT),
                service_port("command", COMMAND_PORT),
                service_port("internal", INTERNAL_PORT),
            ]
        };

        Service {
            metadata: self.object_meta(self.headless_service_name(layout)),
            spec: Some(ServiceSpec {
                cluster_ip: Some("None".to_string()),
                selector: Some(labels::identity(&self.name)),
                ports: Some(ports),
                // Brokers must resolve each other before they report ready
                publish_not_ready_addresses: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the client-facing service
    pub fn build_gateway_service(&self) -> Service {
        Service {
            metadata: self.object_meta(format!("{}-gateway", self.core_name())),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(labels::identity(&self.name)),
                ports: Some(vec![
                    service_port("http", HTTP_PORT),
                    service_port("management", MANAGEMENT_PORT),
                    service_port("gateway", GATEWAY_PORT),
                ]),
                publish_not_ready_addresses: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the StatefulSet running the brokers
    pub fn build_statefulset(&self, layout: &Layout) -> StatefulSet {
        let spec = &self.cluster.spec;

        StatefulSet {
            metadata: self.object_meta(self.name.clone()),
            spec: Some(StatefulSetSpec {
                service_name: self.headless_service_name(layout),
                replicas: Some(spec.cluster_size),
                pod_management_policy: Some("Parallel".to_string()),
                selector: LabelSelector {
                    match_labels: Some(labels::identity(&self.name)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.display_labels()),
                        ..Default::default()
                    }),
                    spec: Some(self.build_pod_spec(layout)),
                },
                volume_claim_templates: Some(vec![self.build_pvc_template()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn build_pod_spec(&self, layout: &Layout) -> PodSpec {
        PodSpec {
            security_context: Some(PodSecurityContext {
                fs_group: Some(CAMUNDA_USER),
                run_as_non_root: Some(true),
                seccomp_profile: Some(runtime_default_seccomp()),
                ..Default::default()
            }),
            service_account_name: Some(self.core_name()),
            // Brokers never talk to the Kubernetes API
            automount_service_account_token: Some(false),
            containers: vec![self.build_container(layout)],
            volumes: Some(vec![
                empty_dir_volume("tmp"),
                empty_dir_volume("exporters"),
            ]),
            ..Default::default()
        }
    }

    /// Build the camunda container
    fn build_container(&self, layout: &Layout) -> Container {
        let spec = &self.cluster.spec;
        let headless_service = self.headless_service_name(layout);
        let env_ctx = EnvContext {
            cluster_name: &self.name,
            namespace: &self.namespace,
            headless_service: &headless_service,
            spec,
        };

        Container {
            name: "camunda".to_string(),
            image: Some(spec.image()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            resources: spec.resources.clone(),
            ports: Some(vec![
                container_port("http", HTTP_PORT),
                container_port("management", MANAGEMENT_PORT),
                container_port("gateway", GATEWAY_PORT),
                container_port("command", COMMAND_PORT),
                container_port("internal", INTERNAL_PORT),
            ]),
            liveness_probe: Some(health_probe("liveness")),
            readiness_probe: Some(health_probe("readiness")),
            startup_probe: Some(Probe {
                initial_delay_seconds: Some(20),
                // Partition recovery after a restart can take several minutes
                failure_threshold: Some(30),
                ..health_probe("startup")
            }),
            security_context: Some(SecurityContext {
                allow_privilege_escalation: Some(false),
                privileged: Some(false),
                read_only_root_filesystem: Some(true),
                run_as_non_root: Some(true),
                run_as_user: Some(CAMUNDA_USER),
                capabilities: Some(Capabilities {
                    drop: Some(vec!["ALL".to_string()]),
                    ..Default::default()
                }),
                seccomp_profile: Some(runtime_default_seccomp()),
                ..Default::default()
            }),
            env: Some(env::compose_env(&env_ctx, &layout.env)),
            env_from: if spec.env_from.is_empty() {
                None
            } else {
                Some(spec.env_from.clone())
            },
            volume_mounts: Some(vec![
                volume_mount("data", DATA_MOUNT_PATH),
                volume_mount("exporters", "/exporters"),
                volume_mount("tmp", "/tmp"),
            ]),
            ..Default::default()
        }
    }

    /// Build PVC template for StatefulSet
    fn build_pvc_template(&self) -> PersistentVolumeClaim {
        let mut requests = BTreeMap::new();
        requests.insert(
            "storage".to_string(),
            Quantity(DATA_VOLUME_SIZE.to_string()),
        );

        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some("data".to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(port)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

/// HTTP probe against `/actuator/health/<group>` on the management port
fn health_probe(group: &str) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(format!("/actuator/health/{}", group)),
            port: IntOrString::String("management".to_string()),
            scheme: Some("HTTP".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn runtime_default_seccomp() -> SeccompProfile {
    SeccompProfile {
        type_: "RuntimeDefault".to_string(),
        ..Default::default()
    }
}

fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

fn volume_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crd::{DatabaseSpec, DatabaseType, OrchestrationClusterSpec};
    use k8s_openapi::api::core::v1::{
        ConfigMapEnvSource, EnvFromSource, ResourceRequirements,
        SecretKeySelector,
    };

    pub(crate) const TEST_LAYOUT: Layout = Layout {
        env: EnvProfile {
            active_profiles: "identity,operate,tasklist,broker,consolidated-auth",
            security_flags: true,
            applications: &["OPERATE", "TASKLIST"],
        },
        gateway_service: true,
    };

    pub(crate) fn create_test_cluster(name: &str) -> OrchestrationCluster {
        let mut requests = BTreeMap::new();
        requests.insert("cpu".to_string(), Quantity("100m".to_string()));
        requests.insert("memory".to_string(), Quantity("100Mi".to_string()));

        let mut cluster = OrchestrationCluster::new(
            name,
            OrchestrationClusterSpec {
                version: "8.8.0-alpha1".to_string(),
                partition_count: 3,
                replication_factor: 3,
                cluster_size: 3,
                resources: Some(ResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                env: vec![],
                env_from: vec![EnvFromSource {
                    config_map_ref: Some(ConfigMapEnvSource {
                        name: "camunda-orchestration-configmap".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                database: DatabaseSpec {
                    database_type: DatabaseType::Elasticsearch,
                    user_name: "my-username".to_string(),
                    password: SecretKeySelector {
                        name: "my-password-secret".to_string(),
                        key: "password".to_string(),
                        optional: None,
                    },
                    host_name: "localhost:9205".to_string(),
                },
            },
        );
        cluster.metadata.namespace = Some("camunda-ns".to_string());
        cluster.metadata.uid = Some("test-uid-123".to_string());
        cluster.metadata.generation = Some(1);
        cluster
    }

    fn sts_container(sts: &StatefulSet) -> &Container {
        &sts.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
    }

    #[test]
    fn test_build_order_and_names() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let resources = builder.build(&TEST_LAYOUT);

        let summary: Vec<_> = resources.iter().map(|r| (r.kind(), r.name())).collect();
        assert_eq!(
            summary,
            vec![
                ("ServiceAccount", "camunda-core"),
                ("Service", "camunda-core-headless"),
                ("Service", "camunda-core-gateway"),
                ("StatefulSet", "camunda"),
            ]
        );
        for resource in &resources {
            assert_eq!(resource.metadata().namespace.as_deref(), Some("camunda-ns"));
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = create_test_cluster("camunda");
        let second = create_test_cluster("camunda");

        let a = ResourceBuilder::new(&first).unwrap().build(&TEST_LAYOUT);
        let b = ResourceBuilder::new(&second).unwrap().build(&TEST_LAYOUT);

        assert_eq!(
            serde_yaml::to_string(&a).unwrap(),
            serde_yaml::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let mut cluster = create_test_cluster("camunda");
        cluster.metadata.name = None;
        assert!(matches!(
            ResourceBuilder::new(&cluster),
            Err(OperatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_headless_service() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let svc = builder.build_headless_service(&TEST_LAYOUT);
        let spec = svc.spec.unwrap();

        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
        assert_eq!(spec.selector, Some(labels::identity("camunda")));
        let ports: Vec<_> = spec.ports.unwrap().iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![9600, 26501, 26502]);
    }

    #[test]
    fn test_gateway_service() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let spec = builder.build_gateway_service().spec.unwrap();

        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert!(spec.cluster_ip.is_none());
        let ports: Vec<_> = spec
            .ports
            .unwrap()
            .iter()
            .map(|p| (p.name.clone().unwrap(), p.port))
            .collect();
        assert_eq!(
            ports,
            vec![
                ("http".to_string(), 8080),
                ("management".to_string(), 9600),
                ("gateway".to_string(), 26500),
            ]
        );
    }

    #[test]
    fn test_single_service_layout() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let layout = Layout {
            gateway_service: false,
            ..TEST_LAYOUT
        };
        let resources = builder.build(&layout);

        let services: Vec<_> = resources
            .iter()
            .filter(|r| r.kind() == "Service")
            .collect();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name(), "camunda-core");

        let ManagedResource::StatefulSet(sts) = &resources[2] else {
            panic!("expected StatefulSet last");
        };
        assert_eq!(sts.spec.as_ref().unwrap().service_name, "camunda-core");
        let contact_points = sts_container(sts)
            .env
            .as_ref()
            .unwrap()
            .iter()
            .find(|e| e.name == "ZEEBE_BROKER_CLUSTER_INITIALCONTACTPOINTS")
            .and_then(|e| e.value.clone())
            .unwrap();
        assert!(contact_points.starts_with("camunda-0.camunda-core.camunda-ns.svc"));
    }

    #[test]
    fn test_statefulset_spec() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let sts = builder.build_statefulset(&TEST_LAYOUT);
        let spec = sts.spec.as_ref().unwrap();

        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.pod_management_policy.as_deref(), Some("Parallel"));
        assert_eq!(spec.service_name, "camunda-core-headless");
        assert_eq!(spec.selector.match_labels, Some(labels::identity("camunda")));

        let template_labels = spec.template.metadata.as_ref().unwrap().labels.as_ref();
        assert_eq!(
            template_labels.and_then(|l| l.get(labels::K8S_VERSION)),
            Some(&"8.8.0-alpha1".to_string())
        );

        let pvc = &spec.volume_claim_templates.as_ref().unwrap()[0];
        assert_eq!(pvc.metadata.name.as_deref(), Some("data"));
        let requests = pvc
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .unwrap();
        assert_eq!(requests.get("storage"), Some(&Quantity("10Gi".to_string())));
    }

    #[test]
    fn test_selector_ignores_version_changes() {
        let mut cluster = create_test_cluster("camunda");
        let before = ResourceBuilder::new(&cluster)
            .unwrap()
            .build_statefulset(&TEST_LAYOUT);
        cluster.spec.version = "8.9.0".to_string();
        cluster.spec.cluster_size = 5;
        let after = ResourceBuilder::new(&cluster)
            .unwrap()
            .build_statefulset(&TEST_LAYOUT);

        assert_eq!(
            before.spec.unwrap().selector,
            after.spec.unwrap().selector
        );
        assert_ne!(before.metadata.labels, after.metadata.labels);
    }

    #[test]
    fn test_pod_template() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let sts = builder.build_statefulset(&TEST_LAYOUT);
        let pod = sts.spec.as_ref().unwrap().template.spec.as_ref().unwrap();

        assert_eq!(pod.service_account_name.as_deref(), Some("camunda-core"));
        let pod_security = pod.security_context.as_ref().unwrap();
        assert_eq!(pod_security.run_as_non_root, Some(true));
        assert_eq!(pod_security.fs_group, Some(1001));

        let volumes: Vec<_> = pod
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| (v.name.as_str(), v.empty_dir.is_some()))
            .collect();
        assert_eq!(volumes, vec![("tmp", true), ("exporters", true)]);

        let container = sts_container(&sts);
        assert_eq!(container.image.as_deref(), Some("camunda/camunda:8.8.0-alpha1"));
        assert_eq!(container.resources, cluster.spec.resources);
        assert_eq!(container.env_from, Some(cluster.spec.env_from.clone()));
        assert_eq!(container.ports.as_ref().unwrap().len(), 5);

        let security = container.security_context.as_ref().unwrap();
        assert_eq!(security.read_only_root_filesystem, Some(true));
        assert_eq!(security.allow_privilege_escalation, Some(false));
        assert_eq!(
            security.seccomp_profile.as_ref().map(|s| s.type_.as_str()),
            Some("RuntimeDefault")
        );
    }

    #[test]
    fn test_probes() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let sts = builder.build_statefulset(&TEST_LAYOUT);
        let container = sts_container(&sts);

        let path = |probe: &Option<Probe>| {
            probe
                .as_ref()
                .and_then(|p| p.http_get.as_ref())
                .and_then(|h| h.path.clone())
        };
        assert_eq!(
            path(&container.liveness_probe).as_deref(),
            Some("/actuator/health/liveness")
        );
        assert_eq!(
            path(&container.readiness_probe).as_deref(),
            Some("/actuator/health/readiness")
        );

        let startup = container.startup_probe.as_ref().unwrap();
        assert_eq!(
            startup.http_get.as_ref().unwrap().port,
            IntOrString::String("management".to_string())
        );
        assert_eq!(startup.initial_delay_seconds, Some(20));
        assert_eq!(startup.failure_threshold, Some(30));
    }

    #[test]
    fn test_merge_labels_and_owner() {
        let cluster = create_test_cluster("camunda");
        let builder = ResourceBuilder::new(&cluster).unwrap();
        let mut resource = ManagedResource::ServiceAccount(builder.build_service_account());

        let mut extra = BTreeMap::new();
        extra.insert(labels::K8S_VERSION.to_string(), "9.0.0".to_string());
        resource.merge_labels(&extra);
        assert_eq!(
            resource.metadata().labels.as_ref().unwrap().get(labels::K8S_VERSION),
            Some(&"9.0.0".to_string())
        );

        let owner = OwnerReference {
            api_version: "core.camunda.io/v1alpha1".to_string(),
            kind: "OrchestrationCluster".to_string(),
            name: "camunda".to_string(),
            uid: "test-uid-123".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        };
        resource.set_controller_owner(owner.clone());
        resource.set_controller_owner(owner.clone());
        assert_eq!(resource.metadata().owner_references, Some(vec![owner]));
    }
}
