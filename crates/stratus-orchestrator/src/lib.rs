//! stratus-orchestrator: deploy and tear down whole applications.
//!
//! `deploy` fans out one task definition and one companion service per task
//! and waits for every service to become ready. `teardown` stops and
//! deletes every service in a cluster and waits for all of them to drain.
//! `decommission` follows that with the container instances and the cluster.
//!
//! Fan-outs are fail-fast and never roll back siblings: after a partial
//! failure, re-run the idempotent operation or call `teardown`.

use std::collections::HashSet;

use futures_util::future::try_join_all;
use tracing::{info, warn};

use stratus_core::{AppDefinition, DestroyOutcome, ServiceRef, StratusError, StratusResult, TaskSpec};
use stratus_lifecycle::{task_definition, Lifecycle, Settings};
use stratus_provider::SharedCloud;

pub struct Orchestrator {
    lifecycle: Lifecycle,
}

impl Orchestrator {
    pub fn new(cloud: SharedCloud, settings: Settings) -> Self {
        Self {
            lifecycle: Lifecycle::new(cloud, settings),
        }
    }

    /// The per-resource operations this orchestrator is built on.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Service name given to `task` inside a deploy.
    pub fn service_name(prefix: &str, task: &TaskSpec) -> String {
        format!("{prefix}-{}", task.family)
    }

    /// Register, create or roll, and await readiness for every task in `app`.
    ///
    /// Resolves once every service is ready, or with the first failure,
    /// labelled with the service it came from.
    pub async fn deploy(
        &self,
        cluster: &str,
        prefix: &str,
        app: &AppDefinition,
    ) -> StratusResult<Vec<ServiceRef>> {
        validate_app(prefix, app)?;
        let cluster = self.lifecycle.clusters().describe_one(cluster).await?.cluster_name;

        info!(%cluster, %prefix, tasks = app.tasks.len(), "deploy started");
        let services = try_join_all(app.tasks.iter().map(|task| self.deploy_task(&cluster, prefix, task))).await?;
        info!(%cluster, services = services.len(), "deploy complete");
        Ok(services)
    }

    async fn deploy_task(&self, cluster: &str, prefix: &str, task: &TaskSpec) -> StratusResult<ServiceRef> {
        let name = Self::service_name(prefix, task);
        let result = async {
            let td = self.lifecycle.task_definitions().create(task).await?;
            self.lifecycle
                .services()
                .find_or_create(cluster, &name, &td.to_ref())
                .await?;
            self.lifecycle.services().wait_for_ready(cluster, &name).await
        }
        .await;

        match result {
            Ok(desc) => Ok(ServiceRef::from(&desc)),
            Err(err) => {
                warn!(%cluster, service = %name, error = %err, "deploy of service failed");
                Err(err.within(format!("deploy {name}")))
            }
        }
    }

    /// Stop and delete every service in `cluster`, then wait until all of
    /// them have drained. Returns the names of the services torn down.
    ///
    /// A cluster that no longer exists has nothing to tear down.
    pub async fn teardown(&self, cluster: &str) -> StratusResult<Vec<String>> {
        let clusters = self.lifecycle.clusters();
        let Some(cluster) = clusters
            .describe_many(&[cluster.to_string()])
            .await?
            .into_iter()
            .next()
            .map(|c| c.cluster_name)
        else {
            warn!(%cluster, "cluster already deleted, nothing to tear down");
            return Ok(Vec::new());
        };

        let services = self.lifecycle.services();
        let arns = services.list(&cluster).await?;
        if arns.is_empty() {
            info!(%cluster, "no services to tear down");
            return Ok(Vec::new());
        }
        let names: Vec<String> = arns
            .iter()
            .map(|arn| stratus_core::tenant::bare_name(arn).to_string())
            .collect();
        info!(%cluster, services = names.len(), "teardown started");

        try_join_all(names.iter().map(|name| {
            let services = &services;
            let cluster = &cluster;
            async move {
                services
                    .stop_and_destroy(cluster, name)
                    .await
                    .map_err(|e| e.within(format!("stop {name}")))
            }
        }))
        .await?;

        try_join_all(names.iter().map(|name| {
            let services = &services;
            let cluster = &cluster;
            async move {
                services
                    .wait_for_drained(cluster, name)
                    .await
                    .map_err(|e| e.within(format!("drain {name}")))
            }
        }))
        .await?;

        info!(%cluster, services = names.len(), "teardown complete");
        Ok(names)
    }

    /// Tear down, deregister every container instance, then delete the
    /// cluster itself.
    pub async fn decommission(&self, cluster: &str) -> StratusResult<DestroyOutcome> {
        self.teardown(cluster).await?;

        let clusters = self.lifecycle.clusters();
        if clusters.describe_many(&[cluster.to_string()]).await?.is_empty() {
            warn!(%cluster, "cluster already deleted");
            return Ok(DestroyOutcome::AlreadyDeleted);
        }

        let instances = self.lifecycle.container_instances();
        let registered = instances.describe(cluster).await?;
        try_join_all(registered.iter().map(|inst| {
            let instances = &instances;
            async move {
                instances
                    .destroy(cluster, &inst.container_instance_arn)
                    .await
                    .map_err(|e| e.within(format!("deregister {}", inst.ec2_instance_id)))
            }
        }))
        .await?;

        let outcome = clusters.destroy(cluster).await?;
        info!(%cluster, instances = registered.len(), %outcome, "cluster decommissioned");
        Ok(outcome)
    }

    /// Services currently in `cluster`.
    pub async fn describe(&self, cluster: &str) -> StratusResult<Vec<ServiceRef>> {
        self.lifecycle.services().describe(cluster).await
    }
}

/// Everything `deploy` can reject before touching the provider.
fn validate_app(prefix: &str, app: &AppDefinition) -> StratusResult<()> {
    if prefix.trim().is_empty() {
        return Err(StratusError::invalid("service name prefix is required"));
    }
    if app.tasks.is_empty() {
        return Err(StratusError::invalid("app definition has no tasks"));
    }
    let mut seen = HashSet::new();
    for task in &app.tasks {
        task_definition::validate(task)?;
        if !seen.insert(task.family.as_str()) {
            return Err(StratusError::invalid(format!(
                "task family {} appears more than once",
                task.family
            )));
        }
    }
    Ok(())
}
