//! MemoryCloud: an in-process stand-in for the compute-orchestration API.
//!
//! Behaves like the real provider where the lifecycle layer cares:
//! describes silently drop unknown ids, deleted services linger as
//! DRAINING before turning INACTIVE, deregistered task definitions stay
//! describable as INACTIVE, and clusters refuse deletion while they still
//! hold services or instances.
//!
//! It also records a per-operation call count and can inject transient
//! failures, artificial latency, and scripted service status sequences,
//! which is what the test suites drive.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use stratus_core::tenant::bare_name;
use stratus_core::*;

use crate::api::CloudApi;

/// Tunables for a [`MemoryCloud`].
#[derive(Debug, Clone)]
pub struct MemoryCloudConfig {
    pub region: String,
    pub account_id: String,
    /// Delay applied before every call.
    pub latency: Duration,
    /// Describes that still report DRAINING after a service is deleted.
    pub drain_polls: u32,
    /// Describes of a freshly created or updated service before it logs
    /// "has reached a steady state".
    pub steady_polls: u32,
}

impl Default for MemoryCloudConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            latency: Duration::ZERO,
            drain_polls: 0,
            steady_polls: 0,
        }
    }
}

struct ServiceRecord {
    desc: ServiceDescription,
    drain_remaining: u32,
    /// Describes left before the next steady-state event; `None` once settled.
    steady_remaining: Option<u32>,
    scripted: VecDeque<ServiceStatus>,
}

impl ServiceRecord {
    /// Count one describe towards the next steady-state event.
    fn settle(&mut self, event_id: u64) {
        match self.steady_remaining {
            Some(0) => {
                self.steady_remaining = None;
                self.desc.events.insert(
                    0,
                    ServiceEvent {
                        id: event_id.to_string(),
                        created_at: event_id,
                        message: format!("(service {}) has reached a steady state.", self.desc.service_name),
                    },
                );
            }
            Some(n) => self.steady_remaining = Some(n - 1),
            None => {}
        }
    }
}

#[derive(Default)]
struct MemoryState {
    vpcs: BTreeMap<String, VpcDescription>,
    route_tables: BTreeMap<String, RouteTableDescription>,
    clusters: BTreeMap<String, ClusterDescription>,
    /// cluster name → instance ARN → description
    instances: BTreeMap<String, BTreeMap<String, ContainerInstanceDescription>>,
    /// family → revisions, index 0 is revision 1
    task_definitions: BTreeMap<String, Vec<TaskDefinitionDescription>>,
    /// (cluster name, service name) → record
    services: BTreeMap<(String, String), ServiceRecord>,
    calls: HashMap<String, u32>,
    failures: HashMap<String, u32>,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn cluster(&self, cluster: &str) -> StratusResult<&ClusterDescription> {
        self.clusters
            .get(bare_name(cluster))
            .ok_or_else(|| StratusError::not_found(format!("cluster {cluster}")))
    }

    fn latest_active(&self, family: &str) -> Option<&TaskDefinitionDescription> {
        self.task_definitions
            .get(family)?
            .iter()
            .rev()
            .find(|td| td.status == TaskDefinitionStatus::Active)
    }

    fn task_definition(&self, id: &str) -> Option<&TaskDefinitionDescription> {
        let name = id.rsplit('/').next().unwrap_or(id);
        match name.rsplit_once(':') {
            Some((family, rev)) => {
                let rev: usize = rev.parse().ok()?;
                self.task_definitions.get(family)?.get(rev.checked_sub(1)?)
            }
            None => self.latest_active(name),
        }
    }

    fn task_definition_mut(&mut self, id: &str) -> Option<&mut TaskDefinitionDescription> {
        let arn = self.task_definition(id)?.task_definition_arn.clone();
        self.task_definitions
            .values_mut()
            .flat_map(|revs| revs.iter_mut())
            .find(|td| td.task_definition_arn == arn)
    }

    fn service_key(cluster: &str, service: &str) -> (String, String) {
        (bare_name(cluster).to_string(), bare_name(service).to_string())
    }

    /// Refresh the counters a real cluster description derives from its members.
    fn cluster_counts(&mut self, name: &str) {
        let active_services = self
            .services
            .iter()
            .filter(|((c, _), r)| c == name && r.desc.status != ServiceStatus::Inactive)
            .count() as u32;
        let running: u32 = self
            .services
            .iter()
            .filter(|((c, _), _)| c == name)
            .map(|(_, r)| r.desc.running_count)
            .sum();
        let instances = self.instances.get(name).map_or(0, |m| m.len()) as u32;
        if let Some(cluster) = self.clusters.get_mut(name) {
            cluster.active_services_count = active_services;
            cluster.running_tasks_count = running;
            cluster.registered_container_instances_count = instances;
        }
    }
}

/// In-memory implementation of [`CloudApi`].
pub struct MemoryCloud {
    config: MemoryCloudConfig,
    state: Mutex<MemoryState>,
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::with_config(MemoryCloudConfig::default())
    }

    pub fn with_config(config: MemoryCloudConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of times `operation` was invoked, including injected failures.
    pub fn calls(&self, operation: &str) -> u32 {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    /// Make the next `times` calls of `operation` fail with a transient error.
    pub fn fail_next(&self, operation: &str, times: u32) {
        self.lock().failures.insert(operation.to_string(), times);
    }

    /// Force the statuses reported by the next describes of one service.
    pub fn script_service_statuses(&self, cluster: &str, service: &str, statuses: &[ServiceStatus]) {
        let mut state = self.lock();
        let key = MemoryState::service_key(cluster, service);
        if let Some(record) = state.services.get_mut(&key) {
            record.scripted.extend(statuses.iter().copied());
        }
    }

    /// Prepend a provider event to a service's event log.
    pub fn push_service_event(&self, cluster: &str, service: &str, message: &str) {
        let mut state = self.lock();
        let id = state.next_id();
        let key = MemoryState::service_key(cluster, service);
        if let Some(record) = state.services.get_mut(&key) {
            record.desc.events.insert(
                0,
                ServiceEvent {
                    id: id.to_string(),
                    created_at: id,
                    message: message.to_string(),
                },
            );
        }
    }

    /// Seed a service that was created out-of-band (console, other tooling).
    pub fn insert_service(&self, desc: ServiceDescription) {
        let mut state = self.lock();
        let key = MemoryState::service_key(&desc.cluster_arn, &desc.service_name);
        let cluster = key.0.clone();
        state.services.insert(
            key,
            ServiceRecord {
                desc,
                drain_remaining: 0,
                steady_remaining: None,
                scripted: VecDeque::new(),
            },
        );
        state.cluster_counts(&cluster);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply latency, count the call, and consume one injected failure.
    async fn enter(&self, operation: &str) -> StratusResult<MutexGuard<'_, MemoryState>> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        let mut state = self.lock();
        *state.calls.entry(operation.to_string()).or_default() += 1;
        if let Some(remaining) = state.failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!(operation, remaining = *remaining, "injected transient failure");
                return Err(StratusError::transient(operation, "injected failure"));
            }
        }
        Ok(state)
    }

    fn arn(&self, kind: &str, path: &str) -> String {
        format!(
            "arn:aws:ecs:{}:{}:{kind}/{path}",
            self.config.region, self.config.account_id
        )
    }
}

#[async_trait]
impl CloudApi for MemoryCloud {
    async fn describe_vpcs(
        &self,
        vpc_ids: &[String],
        filters: &[NetworkFilter],
    ) -> StratusResult<Vec<VpcDescription>> {
        let state = self.enter("describe_vpcs").await?;
        Ok(state
            .vpcs
            .values()
            .filter(|v| vpc_ids.is_empty() || vpc_ids.contains(&v.vpc_id))
            .filter(|v| filters.iter().all(|f| f.matches(&v.tags, Some(v.vpc_id.as_str()))))
            .cloned()
            .collect())
    }

    async fn create_vpc(&self, cidr_block: &str) -> StratusResult<VpcDescription> {
        let mut state = self.enter("create_vpc").await?;
        let id = format!("vpc-{:08x}", state.next_id());
        let vpc = VpcDescription {
            vpc_id: id.clone(),
            cidr_block: cidr_block.to_string(),
            state: "available".to_string(),
            tags: Vec::new(),
        };
        state.vpcs.insert(id, vpc.clone());
        Ok(vpc)
    }

    async fn delete_vpc(&self, vpc_id: &str) -> StratusResult<()> {
        let mut state = self.enter("delete_vpc").await?;
        if state.route_tables.values().any(|rt| rt.vpc_id == vpc_id) {
            return Err(StratusError::rejected(
                "delete_vpc",
                format!("{vpc_id} has dependencies and cannot be deleted"),
            ));
        }
        state
            .vpcs
            .remove(vpc_id)
            .map(|_| ())
            .ok_or_else(|| StratusError::not_found(format!("vpc {vpc_id}")))
    }

    async fn describe_route_tables(
        &self,
        route_table_ids: &[String],
        filters: &[NetworkFilter],
    ) -> StratusResult<Vec<RouteTableDescription>> {
        let state = self.enter("describe_route_tables").await?;
        Ok(state
            .route_tables
            .values()
            .filter(|rt| route_table_ids.is_empty() || route_table_ids.contains(&rt.route_table_id))
            .filter(|rt| filters.iter().all(|f| f.matches(&rt.tags, Some(rt.vpc_id.as_str()))))
            .cloned()
            .collect())
    }

    async fn create_route_table(&self, vpc_id: &str) -> StratusResult<RouteTableDescription> {
        let mut state = self.enter("create_route_table").await?;
        if !state.vpcs.contains_key(vpc_id) {
            return Err(StratusError::not_found(format!("vpc {vpc_id}")));
        }
        let id = format!("rtb-{:08x}", state.next_id());
        let rt = RouteTableDescription {
            route_table_id: id.clone(),
            vpc_id: vpc_id.to_string(),
            tags: Vec::new(),
        };
        state.route_tables.insert(id, rt.clone());
        Ok(rt)
    }

    async fn delete_route_table(&self, route_table_id: &str) -> StratusResult<()> {
        let mut state = self.enter("delete_route_table").await?;
        state
            .route_tables
            .remove(route_table_id)
            .map(|_| ())
            .ok_or_else(|| StratusError::not_found(format!("route table {route_table_id}")))
    }

    async fn create_tags(&self, resource_ids: &[String], tags: &[Tag]) -> StratusResult<()> {
        let mut guard = self.enter("create_tags").await?;
        let state = &mut *guard;
        for id in resource_ids {
            let existing = if let Some(vpc) = state.vpcs.get_mut(id) {
                &mut vpc.tags
            } else if let Some(rt) = state.route_tables.get_mut(id) {
                &mut rt.tags
            } else {
                return Err(StratusError::not_found(format!("resource {id}")));
            };
            for tag in tags {
                existing.retain(|t| t.key != tag.key);
                existing.push(tag.clone());
            }
        }
        Ok(())
    }

    async fn create_cluster(&self, name: &str, tags: &[Tag]) -> StratusResult<ClusterDescription> {
        let mut state = self.enter("create_cluster").await?;
        if let Some(existing) = state.clusters.get(name) {
            return Ok(existing.clone());
        }
        let cluster = ClusterDescription {
            cluster_arn: self.arn("cluster", name),
            cluster_name: name.to_string(),
            status: "ACTIVE".to_string(),
            registered_container_instances_count: 0,
            running_tasks_count: 0,
            pending_tasks_count: 0,
            active_services_count: 0,
            tags: tags.to_vec(),
        };
        state.clusters.insert(name.to_string(), cluster.clone());
        Ok(cluster)
    }

    async fn describe_clusters(&self, clusters: &[String]) -> StratusResult<Vec<ClusterDescription>> {
        let state = self.enter("describe_clusters").await?;
        Ok(clusters
            .iter()
            .filter_map(|c| state.clusters.get(bare_name(c)).cloned())
            .collect())
    }

    async fn delete_cluster(&self, cluster: &str) -> StratusResult<()> {
        let mut state = self.enter("delete_cluster").await?;
        let name = state.cluster(cluster)?.cluster_name.clone();
        state.cluster_counts(&name);
        let desc = state.cluster(&name)?;
        if desc.active_services_count > 0 || desc.registered_container_instances_count > 0 {
            return Err(StratusError::rejected(
                "delete_cluster",
                format!("cluster {name} still contains services or container instances"),
            ));
        }
        state.clusters.remove(&name);
        state.instances.remove(&name);
        state.services.retain(|(c, _), _| c != &name);
        Ok(())
    }

    async fn list_clusters(&self) -> StratusResult<Vec<String>> {
        let state = self.enter("list_clusters").await?;
        Ok(state.clusters.values().map(|c| c.cluster_arn.clone()).collect())
    }

    async fn register_container_instance(
        &self,
        cluster: &str,
        instance_id: &str,
    ) -> StratusResult<ContainerInstanceDescription> {
        let mut state = self.enter("register_container_instance").await?;
        let name = state.cluster(cluster)?.cluster_name.clone();
        if let Some(existing) = state
            .instances
            .get(&name)
            .and_then(|m| m.values().find(|i| i.ec2_instance_id == instance_id))
        {
            return Ok(existing.clone());
        }
        let id = state.next_id();
        let desc = ContainerInstanceDescription {
            container_instance_arn: self.arn("container-instance", &format!("{name}/{id:016x}")),
            ec2_instance_id: instance_id.to_string(),
            status: "ACTIVE".to_string(),
            running_tasks_count: 0,
            pending_tasks_count: 0,
        };
        state
            .instances
            .entry(name.clone())
            .or_default()
            .insert(desc.container_instance_arn.clone(), desc.clone());
        state.cluster_counts(&name);
        Ok(desc)
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        instances: &[String],
    ) -> StratusResult<Vec<ContainerInstanceDescription>> {
        let state = self.enter("describe_container_instances").await?;
        let Some(registered) = state.instances.get(bare_name(cluster)) else {
            return Ok(Vec::new());
        };
        Ok(registered
            .values()
            .filter(|i| {
                instances
                    .iter()
                    .any(|id| id == &i.container_instance_arn || id == &i.ec2_instance_id)
            })
            .cloned()
            .collect())
    }

    async fn deregister_container_instance(&self, cluster: &str, instance: &str) -> StratusResult<()> {
        let mut state = self.enter("deregister_container_instance").await?;
        let name = bare_name(cluster).to_string();
        let removed = state.instances.get_mut(&name).and_then(|m| {
            let arn = m
                .values()
                .find(|i| i.container_instance_arn == instance || i.ec2_instance_id == instance)?
                .container_instance_arn
                .clone();
            m.remove(&arn)
        });
        state.cluster_counts(&name);
        removed
            .map(|_| ())
            .ok_or_else(|| StratusError::not_found(format!("container instance {instance}")))
    }

    async fn list_container_instances(&self, cluster: &str) -> StratusResult<Vec<String>> {
        let state = self.enter("list_container_instances").await?;
        state.cluster(cluster)?;
        Ok(state
            .instances
            .get(bare_name(cluster))
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn register_task_definition(&self, spec: &TaskSpec) -> StratusResult<TaskDefinitionDescription> {
        let mut state = self.enter("register_task_definition").await?;
        let revision = state.task_definitions.get(&spec.family).map_or(0, Vec::len) as u32 + 1;
        let desc = TaskDefinitionDescription {
            task_definition_arn: self.arn("task-definition", &format!("{}:{revision}", spec.family)),
            family: spec.family.clone(),
            revision,
            status: TaskDefinitionStatus::Active,
            container_definitions: spec.container_definitions.clone(),
        };
        state
            .task_definitions
            .entry(spec.family.clone())
            .or_default()
            .push(desc.clone());
        Ok(desc)
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> StratusResult<Option<TaskDefinitionDescription>> {
        let state = self.enter("describe_task_definition").await?;
        Ok(state.task_definition(task_definition).cloned())
    }

    async fn deregister_task_definition(&self, task_definition: &str) -> StratusResult<()> {
        let mut state = self.enter("deregister_task_definition").await?;
        let td = state
            .task_definition_mut(task_definition)
            .ok_or_else(|| StratusError::not_found(format!("task definition {task_definition}")))?;
        td.status = TaskDefinitionStatus::Inactive;
        Ok(())
    }

    async fn list_task_definitions(&self) -> StratusResult<Vec<String>> {
        let state = self.enter("list_task_definitions").await?;
        Ok(state
            .task_definitions
            .values()
            .flatten()
            .filter(|td| td.status == TaskDefinitionStatus::Active)
            .map(|td| td.task_definition_arn.clone())
            .collect())
    }

    async fn list_task_definition_families(&self) -> StratusResult<Vec<String>> {
        let state = self.enter("list_task_definition_families").await?;
        Ok(state
            .task_definitions
            .iter()
            .filter(|(_, revs)| revs.iter().any(|td| td.status == TaskDefinitionStatus::Active))
            .map(|(family, _)| family.clone())
            .collect())
    }

    async fn create_service(&self, request: &CreateServiceRequest) -> StratusResult<ServiceDescription> {
        let mut state = self.enter("create_service").await?;
        let cluster = state.cluster(&request.cluster)?.clone();
        let task_definition = match state.task_definition(&request.task_definition) {
            Some(td) if td.status == TaskDefinitionStatus::Active => td.task_definition_arn.clone(),
            _ => {
                return Err(StratusError::rejected(
                    "create_service",
                    format!("task definition {} is not active", request.task_definition),
                ));
            }
        };
        let key = MemoryState::service_key(&cluster.cluster_name, &request.service_name);
        if state
            .services
            .get(&key)
            .is_some_and(|r| r.desc.status != ServiceStatus::Inactive)
        {
            return Err(StratusError::rejected(
                "create_service",
                format!("service {} already exists", request.service_name),
            ));
        }

        let id = state.next_id();
        let desc = ServiceDescription {
            service_arn: self.arn(
                "service",
                &format!("{}/{}", cluster.cluster_name, request.service_name),
            ),
            service_name: request.service_name.clone(),
            cluster_arn: cluster.cluster_arn.clone(),
            task_definition,
            desired_count: request.desired_count,
            running_count: request.desired_count,
            pending_count: 0,
            status: ServiceStatus::Active,
            events: vec![ServiceEvent {
                id: id.to_string(),
                created_at: id,
                message: format!(
                    "(service {}) has started {} tasks.",
                    request.service_name, request.desired_count
                ),
            }],
            deployments: 1,
        };
        state.services.insert(
            key,
            ServiceRecord {
                desc: desc.clone(),
                drain_remaining: 0,
                steady_remaining: Some(self.config.steady_polls),
                scripted: VecDeque::new(),
            },
        );
        state.cluster_counts(&cluster.cluster_name);
        Ok(desc)
    }

    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
    ) -> StratusResult<Vec<ServiceDescription>> {
        let mut state = self.enter("describe_services").await?;
        let mut found = Vec::new();
        for service in services {
            let event_id = state.next_id();
            let key = MemoryState::service_key(cluster, service);
            let Some(record) = state.services.get_mut(&key) else {
                continue;
            };
            if let Some(status) = record.scripted.pop_front() {
                record.desc.status = status;
            } else if record.desc.status == ServiceStatus::Draining {
                if record.drain_remaining == 0 {
                    record.desc.status = ServiceStatus::Inactive;
                } else {
                    record.drain_remaining -= 1;
                }
            }
            if record.desc.status == ServiceStatus::Active {
                record.settle(event_id);
            }
            found.push(record.desc.clone());
        }
        Ok(found)
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        update: &ServiceUpdate,
    ) -> StratusResult<ServiceDescription> {
        let mut state = self.enter("update_service").await?;
        let task_definition = match &update.task_definition {
            Some(id) => match state.task_definition(id) {
                Some(td) if td.status == TaskDefinitionStatus::Active => {
                    Some(td.task_definition_arn.clone())
                }
                _ => {
                    return Err(StratusError::rejected(
                        "update_service",
                        format!("task definition {id} is not active"),
                    ));
                }
            },
            None => None,
        };
        let event_id = state.next_id();
        let key = MemoryState::service_key(cluster, service);
        let record = state
            .services
            .get_mut(&key)
            .filter(|r| r.desc.status == ServiceStatus::Active)
            .ok_or_else(|| StratusError::not_found(format!("service {service} in {cluster}")))?;

        if let Some(count) = update.desired_count {
            record.desc.desired_count = count;
            record.desc.running_count = count;
        }
        record.steady_remaining = Some(self.config.steady_polls);
        if let Some(arn) = task_definition {
            record.desc.task_definition = arn;
        }
        record.desc.events.insert(
            0,
            ServiceEvent {
                id: event_id.to_string(),
                created_at: event_id,
                message: format!(
                    "(service {}) updated to desired count {}.",
                    record.desc.service_name, record.desc.desired_count
                ),
            },
        );
        let desc = record.desc.clone();
        state.cluster_counts(&key.0);
        Ok(desc)
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> StratusResult<ServiceDescription> {
        let mut state = self.enter("delete_service").await?;
        let drain_polls = self.config.drain_polls;
        let key = MemoryState::service_key(cluster, service);
        let record = state
            .services
            .get_mut(&key)
            .filter(|r| r.desc.status == ServiceStatus::Active)
            .ok_or_else(|| StratusError::not_found(format!("service {service} in {cluster}")))?;

        if record.desc.desired_count > 0 {
            return Err(StratusError::rejected(
                "delete_service",
                format!("service {service} must be scaled to 0 before deletion"),
            ));
        }
        record.desc.running_count = 0;
        record.desc.status = ServiceStatus::Draining;
        record.drain_remaining = drain_polls;
        let desc = record.desc.clone();
        state.cluster_counts(&key.0);
        Ok(desc)
    }

    async fn list_services(&self, cluster: &str) -> StratusResult<Vec<String>> {
        let state = self.enter("list_services").await?;
        let name = state.cluster(cluster)?.cluster_name.clone();
        Ok(state
            .services
            .iter()
            .filter(|((c, _), r)| c == &name && r.desc.status != ServiceStatus::Inactive)
            .map(|(_, r)| r.desc.service_arn.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(family: &str) -> TaskSpec {
        TaskSpec {
            family: family.to_string(),
            container_definitions: vec![ContainerSpec {
                name: family.to_string(),
                image: "nginx:latest".to_string(),
                memory: Some(128),
                cpu: None,
                essential: true,
                port_mappings: vec![],
                environment: Default::default(),
                command: vec![],
            }],
        }
    }

    #[tokio::test]
    async fn describe_drops_unknown_ids() {
        let cloud = MemoryCloud::new();
        cloud.create_cluster("a", &[]).await.unwrap();
        let found = cloud
            .describe_clusters(&["a".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cluster_name, "a");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let cloud = MemoryCloud::new();
        cloud.fail_next("list_clusters", 2);
        assert!(cloud.list_clusters().await.unwrap_err().is_retryable());
        assert!(cloud.list_clusters().await.is_err());
        assert!(cloud.list_clusters().await.is_ok());
        assert_eq!(cloud.calls("list_clusters"), 3);
    }

    #[tokio::test]
    async fn task_definition_revisions_increment() {
        let cloud = MemoryCloud::new();
        let r1 = cloud.register_task_definition(&spec("web")).await.unwrap();
        let r2 = cloud.register_task_definition(&spec("web")).await.unwrap();
        assert_eq!((r1.revision, r2.revision), (1, 2));
        assert!(r2.task_definition_arn.ends_with("task-definition/web:2"));

        cloud.deregister_task_definition("web:2").await.unwrap();
        let latest = cloud.describe_task_definition("web").await.unwrap().unwrap();
        assert_eq!(latest.revision, 1);
        let old = cloud.describe_task_definition(&r2.task_definition_arn).await.unwrap().unwrap();
        assert_eq!(old.status, TaskDefinitionStatus::Inactive);
    }

    #[tokio::test]
    async fn deleted_service_drains_then_goes_inactive() {
        let cloud = MemoryCloud::with_config(MemoryCloudConfig {
            drain_polls: 1,
            ..Default::default()
        });
        cloud.create_cluster("c1", &[]).await.unwrap();
        let td = cloud.register_task_definition(&spec("web")).await.unwrap();
        cloud
            .create_service(&CreateServiceRequest {
                cluster: "c1".into(),
                service_name: "svc".into(),
                task_definition: td.task_definition_arn,
                desired_count: 1,
            })
            .await
            .unwrap();

        let err = cloud.delete_service("c1", "svc").await.unwrap_err();
        assert!(matches!(err, StratusError::Rejected { .. }));

        let update = ServiceUpdate {
            desired_count: Some(0),
            ..Default::default()
        };
        cloud.update_service("c1", "svc", &update).await.unwrap();
        cloud.delete_service("c1", "svc").await.unwrap();

        let ids = vec!["svc".to_string()];
        let first = cloud.describe_services("c1", &ids).await.unwrap();
        assert_eq!(first[0].status, ServiceStatus::Draining);
        let second = cloud.describe_services("c1", &ids).await.unwrap();
        assert_eq!(second[0].status, ServiceStatus::Inactive);
        assert!(cloud.list_services("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn service_logs_steady_state_after_settling() {
        let cloud = MemoryCloud::with_config(MemoryCloudConfig {
            steady_polls: 1,
            ..Default::default()
        });
        cloud.create_cluster("c1", &[]).await.unwrap();
        let td = cloud.register_task_definition(&spec("web")).await.unwrap();
        cloud
            .create_service(&CreateServiceRequest {
                cluster: "c1".into(),
                service_name: "svc".into(),
                task_definition: td.task_definition_arn,
                desired_count: 1,
            })
            .await
            .unwrap();

        let ids = vec!["svc".to_string()];
        let first = cloud.describe_services("c1", &ids).await.unwrap();
        assert!(!first[0].events[0].message.contains("steady state"));
        let second = cloud.describe_services("c1", &ids).await.unwrap();
        assert_eq!(second[0].events[0].message, "(service svc) has reached a steady state.");
        let third = cloud.describe_services("c1", &ids).await.unwrap();
        assert_eq!(third[0].events.len(), 2);
    }

    #[tokio::test]
    async fn cluster_with_services_cannot_be_deleted() {
        let cloud = MemoryCloud::new();
        cloud.create_cluster("c1", &[]).await.unwrap();
        let td = cloud.register_task_definition(&spec("web")).await.unwrap();
        cloud
            .create_service(&CreateServiceRequest {
                cluster: "c1".into(),
                service_name: "svc".into(),
                task_definition: td.task_definition_arn,
                desired_count: 1,
            })
            .await
            .unwrap();
        let err = cloud.delete_cluster("c1").await.unwrap_err();
        assert!(matches!(err, StratusError::Rejected { .. }));
    }

    #[tokio::test]
    async fn tags_replace_by_key() {
        let cloud = MemoryCloud::new();
        let vpc = cloud.create_vpc("10.0.0.0/24").await.unwrap();
        let ids = vec![vpc.vpc_id.clone()];
        cloud.create_tags(&ids, &[Tag::new("k", "1")]).await.unwrap();
        cloud.create_tags(&ids, &[Tag::new("k", "2")]).await.unwrap();
        let found = cloud
            .describe_vpcs(&[], &[NetworkFilter::TagKey("k".into())])
            .await
            .unwrap();
        assert_eq!(found[0].tags, vec![Tag::new("k", "2")]);
    }
}
