//! The outbound compute-orchestration API.
//!
//! One method per provider call the lifecycle layer issues. Implementations
//! translate provider faults into [`StratusError`]: throttling and
//! read-after-write misses become `Transient`, everything else `Rejected`
//! or `NotFound`.
//!
//! Describe calls return only the resources that still exist; a missing id
//! is absent from the result rather than an error.

use std::sync::Arc;

use async_trait::async_trait;

use stratus_core::*;

/// Shared handle used by every lifecycle module.
pub type SharedCloud = Arc<dyn CloudApi>;

#[async_trait]
pub trait CloudApi: Send + Sync {
    // ── Virtual networks ──────────────────────────────────────────

    /// Describe VPCs. An empty `vpc_ids` slice means "all that match `filters`".
    async fn describe_vpcs(
        &self,
        vpc_ids: &[String],
        filters: &[NetworkFilter],
    ) -> StratusResult<Vec<VpcDescription>>;

    async fn create_vpc(&self, cidr_block: &str) -> StratusResult<VpcDescription>;

    async fn delete_vpc(&self, vpc_id: &str) -> StratusResult<()>;

    /// Describe route tables. An empty id slice means "all that match `filters`".
    async fn describe_route_tables(
        &self,
        route_table_ids: &[String],
        filters: &[NetworkFilter],
    ) -> StratusResult<Vec<RouteTableDescription>>;

    async fn create_route_table(&self, vpc_id: &str) -> StratusResult<RouteTableDescription>;

    async fn delete_route_table(&self, route_table_id: &str) -> StratusResult<()>;

    /// Attach tags to network resources. May fail transiently right after
    /// the resource was created.
    async fn create_tags(&self, resource_ids: &[String], tags: &[Tag]) -> StratusResult<()>;

    // ── Clusters ──────────────────────────────────────────────────

    async fn create_cluster(&self, name: &str, tags: &[Tag]) -> StratusResult<ClusterDescription>;

    async fn describe_clusters(&self, clusters: &[String]) -> StratusResult<Vec<ClusterDescription>>;

    async fn delete_cluster(&self, cluster: &str) -> StratusResult<()>;

    /// Cluster ARNs visible to the account.
    async fn list_clusters(&self) -> StratusResult<Vec<String>>;

    // ── Container instances ───────────────────────────────────────

    async fn register_container_instance(
        &self,
        cluster: &str,
        instance_id: &str,
    ) -> StratusResult<ContainerInstanceDescription>;

    async fn describe_container_instances(
        &self,
        cluster: &str,
        instances: &[String],
    ) -> StratusResult<Vec<ContainerInstanceDescription>>;

    async fn deregister_container_instance(&self, cluster: &str, instance: &str) -> StratusResult<()>;

    async fn list_container_instances(&self, cluster: &str) -> StratusResult<Vec<String>>;

    // ── Task definitions ──────────────────────────────────────────

    /// Register a new revision of `spec.family`.
    async fn register_task_definition(&self, spec: &TaskSpec) -> StratusResult<TaskDefinitionDescription>;

    /// Describe by ARN, `family:revision`, or `family` (latest ACTIVE revision).
    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> StratusResult<Option<TaskDefinitionDescription>>;

    async fn deregister_task_definition(&self, task_definition: &str) -> StratusResult<()>;

    /// ARNs of every ACTIVE task definition revision.
    async fn list_task_definitions(&self) -> StratusResult<Vec<String>>;

    async fn list_task_definition_families(&self) -> StratusResult<Vec<String>>;

    // ── Services ──────────────────────────────────────────────────

    async fn create_service(&self, request: &CreateServiceRequest) -> StratusResult<ServiceDescription>;

    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> StratusResult<Vec<ServiceDescription>>;

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        update: &ServiceUpdate,
    ) -> StratusResult<ServiceDescription>;

    /// Delete a service whose desired count is already zero.
    async fn delete_service(&self, cluster: &str, service: &str) -> StratusResult<ServiceDescription>;

    /// ARNs of every non-INACTIVE service in the cluster.
    async fn list_services(&self, cluster: &str) -> StratusResult<Vec<String>>;
}
