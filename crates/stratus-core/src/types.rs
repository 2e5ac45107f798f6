//! Shared types used across Stratus crates.
//!
//! Descriptions mirror what the compute-orchestration API returns. None of
//! them are cached: every operation re-describes the resources it touches.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantKey;

// ── Tags and filters ──────────────────────────────────────────────

/// A provider key/value tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Filter for network describe calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkFilter {
    /// Resource carries a tag with this key, any value.
    TagKey(String),
    /// Resource carries exactly this tag.
    Tag(Tag),
    /// Resource lives in this VPC.
    VpcId(String),
}

impl NetworkFilter {
    pub fn matches(&self, tags: &[Tag], vpc_id: Option<&str>) -> bool {
        match self {
            Self::TagKey(key) => tags.iter().any(|t| &t.key == key),
            Self::Tag(tag) => tags.contains(tag),
            Self::VpcId(id) => vpc_id == Some(id.as_str()),
        }
    }
}

// ── Network ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpcDescription {
    pub vpc_id: String,
    pub cidr_block: String,
    pub state: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTableDescription {
    pub route_table_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

// ── Clusters and container instances ──────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDescription {
    pub cluster_arn: String,
    pub cluster_name: String,
    pub status: String,
    pub registered_container_instances_count: u32,
    pub running_tasks_count: u32,
    pub pending_tasks_count: u32,
    pub active_services_count: u32,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A cluster identity plus the tenant decoded from its name, when it has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRef {
    pub name: String,
    pub arn: String,
    pub tenant: Option<TenantKey>,
}

impl From<&ClusterDescription> for ClusterRef {
    fn from(desc: &ClusterDescription) -> Self {
        Self {
            name: desc.cluster_name.clone(),
            arn: desc.cluster_arn.clone(),
            tenant: TenantKey::decode_name(&desc.cluster_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInstanceDescription {
    pub container_instance_arn: String,
    pub ec2_instance_id: String,
    pub status: String,
    pub running_tasks_count: u32,
    pub pending_tasks_count: u32,
}

// ── Task definitions ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    #[serde(default)]
    pub host_port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// One container inside a task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub memory: Option<u32>,
    #[serde(default)]
    pub cpu: Option<u32>,
    #[serde(default = "default_essential")]
    pub essential: bool,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_essential() -> bool {
    true
}

/// Registration payload for one task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub family: String,
    pub container_definitions: Vec<ContainerSpec>,
}

/// An application: each task maps to one task definition and one service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppDefinition {
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskDefinitionStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinitionDescription {
    pub task_definition_arn: String,
    pub family: String,
    pub revision: u32,
    pub status: TaskDefinitionStatus,
    pub container_definitions: Vec<ContainerSpec>,
}

impl TaskDefinitionDescription {
    pub fn to_ref(&self) -> TaskDefinitionRef {
        TaskDefinitionRef {
            family: self.family.clone(),
            revision: self.revision,
            arn: self.task_definition_arn.clone(),
        }
    }
}

/// Immutable handle on one registered revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskDefinitionRef {
    pub family: String,
    pub revision: u32,
    pub arn: String,
}

impl TaskDefinitionRef {
    /// The `family:revision` identity.
    pub fn family_revision(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

// ── Services ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Active,
    Draining,
    Inactive,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "ACTIVE",
            Self::Draining => "DRAINING",
            Self::Inactive => "INACTIVE",
        })
    }
}

/// A provider-emitted service event. Newest events come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub id: String,
    pub created_at: u64,
    pub message: String,
}

/// Raw service description as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub service_arn: String,
    pub service_name: String,
    pub cluster_arn: String,
    pub task_definition: String,
    pub desired_count: u32,
    pub running_count: u32,
    pub pending_count: u32,
    pub status: ServiceStatus,
    #[serde(default)]
    pub events: Vec<ServiceEvent>,
    #[serde(default)]
    pub deployments: u32,
}

/// Projection of a service description handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub service_arn: String,
    pub service_name: String,
    pub cluster: String,
    pub task_definition: String,
    pub desired_count: u32,
    pub running_count: u32,
    pub pending_count: u32,
    pub status: ServiceStatus,
    pub deployments: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<String>,
}

impl From<&ServiceDescription> for ServiceRef {
    fn from(desc: &ServiceDescription) -> Self {
        Self {
            service_arn: desc.service_arn.clone(),
            service_name: desc.service_name.clone(),
            cluster: desc.cluster_arn.clone(),
            task_definition: desc.task_definition.clone(),
            desired_count: desc.desired_count,
            running_count: desc.running_count,
            pending_count: desc.pending_count,
            status: desc.status,
            deployments: desc.deployments,
            last_event: desc.events.first().map(|e| e.message.clone()),
        }
    }
}

/// Request body for service creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub cluster: String,
    pub service_name: String,
    pub task_definition: String,
    pub desired_count: u32,
}

/// Fields changed by a service update. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub desired_count: Option<u32>,
    pub task_definition: Option<String>,
}

impl ServiceUpdate {
    pub fn is_empty(&self) -> bool {
        self.desired_count.is_none() && self.task_definition.is_none()
    }
}

/// Result of a find-and-destroy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyOutcome {
    /// The deletion call was issued.
    Deleted,
    /// Nothing to delete; the deletion API was not called.
    AlreadyDeleted,
}

impl fmt::Display for DestroyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deleted => "deleted",
            Self::AlreadyDeleted => "already deleted",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_app_definition_json() {
        let json = r#"{
            "tasks": [{
                "family": "web",
                "containerDefinitions": [{
                    "name": "web",
                    "image": "nginx:1.25",
                    "memory": 256,
                    "portMappings": [{"containerPort": 80, "hostPort": 80}],
                    "environment": {"MODE": "prod"}
                }]
            }]
        }"#;
        let app: AppDefinition = serde_json::from_str(json).unwrap();
        let container = &app.tasks[0].container_definitions[0];
        assert_eq!(app.tasks[0].family, "web");
        assert!(container.essential);
        assert_eq!(container.port_mappings[0].protocol, "tcp");
        assert_eq!(container.environment["MODE"], "prod");
    }

    #[test]
    fn service_ref_keeps_newest_event() {
        let desc = ServiceDescription {
            service_arn: "arn:svc".into(),
            service_name: "svc".into(),
            cluster_arn: "arn:cluster".into(),
            task_definition: "arn:td:1".into(),
            desired_count: 1,
            running_count: 1,
            pending_count: 0,
            status: ServiceStatus::Active,
            events: vec![
                ServiceEvent { id: "2".into(), created_at: 2, message: "newest".into() },
                ServiceEvent { id: "1".into(), created_at: 1, message: "oldest".into() },
            ],
            deployments: 1,
        };
        let r = ServiceRef::from(&desc);
        assert_eq!(r.last_event.as_deref(), Some("newest"));
        assert_eq!(r.cluster, "arn:cluster");
    }

    #[test]
    fn cluster_ref_decodes_tenant() {
        let desc = ClusterDescription {
            cluster_arn: "arn:aws:ecs:r:1:cluster/stratus-pid-p--pr-3".into(),
            cluster_name: "stratus-pid-p--pr-3".into(),
            status: "ACTIVE".into(),
            registered_container_instances_count: 0,
            running_tasks_count: 0,
            pending_tasks_count: 0,
            active_services_count: 0,
            tags: vec![],
        };
        let r = ClusterRef::from(&desc);
        assert_eq!(r.tenant, Some(TenantKey::pull_request("p", "3")));
    }

    #[test]
    fn network_filter_matching() {
        let tags = vec![Tag::new("stratus-created", "true")];
        assert!(NetworkFilter::TagKey("stratus-created".into()).matches(&tags, None));
        assert!(!NetworkFilter::Tag(Tag::new("stratus-created", "false")).matches(&tags, None));
        assert!(NetworkFilter::VpcId("vpc-1".into()).matches(&[], Some("vpc-1")));
        assert!(!NetworkFilter::VpcId("vpc-1".into()).matches(&[], None));
    }
}
