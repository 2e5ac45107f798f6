//! Services: a desired count of one task definition, kept running by the
//! provider.
//!
//! A service is created bound to a cluster and a task definition, scaled to
//! zero to start draining, and deleted once scaled down. The provider then
//! reports it as DRAINING until every task has stopped and it turns
//! INACTIVE. Readiness and drain are observed with the poller, never assumed.

use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use stratus_converge::classify;
use stratus_core::{
    CreateServiceRequest, DestroyOutcome, ServiceDescription, ServiceRef, ServiceStatus,
    ServiceUpdate, StratusError, StratusResult, TaskDefinitionRef,
};

use crate::{require, require_ids, Lifecycle};

/// Largest id batch a single describe call accepts.
const DESCRIBE_BATCH: usize = 10;

pub struct Services<'a> {
    ctx: &'a Lifecycle,
}

impl<'a> Services<'a> {
    pub(crate) fn new(ctx: &'a Lifecycle) -> Self {
        Self { ctx }
    }

    pub async fn describe_many(
        &self,
        cluster: &str,
        services: &[String],
    ) -> StratusResult<Vec<ServiceDescription>> {
        require("cluster", cluster)?;
        require_ids("services", services)?;
        let batches = services
            .chunks(DESCRIBE_BATCH)
            .map(|batch| self.ctx.cloud().describe_services(cluster, batch));
        Ok(try_join_all(batches).await?.into_iter().flatten().collect())
    }

    /// ARNs of the cluster's services that are not INACTIVE.
    pub async fn list(&self, cluster: &str) -> StratusResult<Vec<String>> {
        require("cluster", cluster)?;
        self.ctx.cloud().list_services(cluster).await
    }

    /// Every service in the cluster, projected for callers.
    pub async fn describe(&self, cluster: &str) -> StratusResult<Vec<ServiceRef>> {
        let arns = self.list(cluster).await?;
        if arns.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .describe_many(cluster, &arns)
            .await?
            .iter()
            .map(ServiceRef::from)
            .collect())
    }

    pub async fn create(&self, request: &CreateServiceRequest) -> StratusResult<ServiceDescription> {
        require("cluster", &request.cluster)?;
        require("service name", &request.service_name)?;
        require("task definition", &request.task_definition)?;

        let desc = self.ctx.cloud().create_service(request).await?;
        info!(
            cluster = %request.cluster,
            service = %desc.service_name,
            task_definition = %desc.task_definition,
            desired = desc.desired_count,
            "service created"
        );
        Ok(desc)
    }

    /// Return the ACTIVE service named `service_name`, creating it with a
    /// desired count of one when there is none.
    ///
    /// An existing service bound to another revision is moved onto
    /// `task_definition` in place. Not atomic: two callers racing on the same
    /// name can both attempt the create, and the loser gets the provider's
    /// rejection.
    pub async fn find_or_create(
        &self,
        cluster: &str,
        service_name: &str,
        task_definition: &TaskDefinitionRef,
    ) -> StratusResult<ServiceDescription> {
        require("service name", service_name)?;
        let existing = self
            .describe_many(cluster, &[service_name.to_string()])
            .await?
            .into_iter()
            .find(|svc| svc.status == ServiceStatus::Active);

        match existing {
            Some(svc) if svc.task_definition == task_definition.arn => {
                debug!(%cluster, service = %service_name, "service already on requested revision");
                Ok(svc)
            }
            Some(svc) => {
                info!(
                    %cluster,
                    service = %service_name,
                    from = %svc.task_definition,
                    to = %task_definition.family_revision(),
                    "rolling service onto new revision"
                );
                self.update(
                    cluster,
                    service_name,
                    &ServiceUpdate {
                        desired_count: None,
                        task_definition: Some(task_definition.arn.clone()),
                    },
                )
                .await
            }
            None => {
                self.create(&CreateServiceRequest {
                    cluster: cluster.to_string(),
                    service_name: service_name.to_string(),
                    task_definition: task_definition.arn.clone(),
                    desired_count: 1,
                })
                .await
            }
        }
    }

    pub async fn update(
        &self,
        cluster: &str,
        service: &str,
        update: &ServiceUpdate,
    ) -> StratusResult<ServiceDescription> {
        require("cluster", cluster)?;
        require("service", service)?;
        if update.is_empty() {
            return Err(StratusError::invalid(format!("update of {service} changes nothing")));
        }
        let desc = self.ctx.cloud().update_service(cluster, service, update).await?;
        debug!(%cluster, %service, desired = desc.desired_count, "service updated");
        Ok(desc)
    }

    /// Scale to zero, which starts the drain.
    pub async fn stop(&self, cluster: &str, service: &str) -> StratusResult<ServiceDescription> {
        let desc = self
            .update(
                cluster,
                service,
                &ServiceUpdate {
                    desired_count: Some(0),
                    task_definition: None,
                },
            )
            .await?;
        info!(%cluster, %service, "service stopped");
        Ok(desc)
    }

    /// Delete a service that is scaled to zero with no tasks left running.
    ///
    /// Missing, DRAINING, and INACTIVE services are reported as already
    /// deleted without calling the provider. A service that still wants or
    /// runs tasks is refused; use [`Services::stop_and_destroy`] for that.
    pub async fn destroy(&self, cluster: &str, service: &str) -> StratusResult<DestroyOutcome> {
        let Some(svc) = self.active(cluster, service).await? else {
            warn!(%cluster, %service, "service already deleted");
            return Ok(DestroyOutcome::AlreadyDeleted);
        };
        if svc.desired_count > 0 {
            return Err(StratusError::invalid(format!(
                "service {service} still has desired count {}; stop it first",
                svc.desired_count
            )));
        }
        if svc.running_count > 0 {
            return Err(StratusError::invalid(format!(
                "service {service} still has {} running tasks; wait for them to stop",
                svc.running_count
            )));
        }
        self.ctx.cloud().delete_service(cluster, service).await?;
        info!(%cluster, %service, "service deleted");
        Ok(DestroyOutcome::Deleted)
    }

    /// Scale to zero if needed, then delete.
    pub async fn stop_and_destroy(&self, cluster: &str, service: &str) -> StratusResult<DestroyOutcome> {
        let Some(svc) = self.active(cluster, service).await? else {
            warn!(%cluster, %service, "service already deleted");
            return Ok(DestroyOutcome::AlreadyDeleted);
        };
        if svc.desired_count > 0 {
            self.stop(cluster, service).await?;
        }
        self.ctx.cloud().delete_service(cluster, service).await?;
        info!(%cluster, %service, "service deleted");
        Ok(DestroyOutcome::Deleted)
    }

    /// Poll until the service logs a steady-state event. Fails if the
    /// service disappears.
    pub async fn wait_for_ready(&self, cluster: &str, service: &str) -> StratusResult<ServiceDescription> {
        let ids = [service.to_string()];
        let desc = self
            .ctx
            .poller(format!("{service} ready"))
            .until(|| self.describe_many(cluster, &ids), classify::readiness)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StratusError::Convergence(format!("{service} vanished once ready")))?;
        info!(%cluster, %service, running = desc.running_count, "service ready");
        Ok(desc)
    }

    /// Poll until the service reports INACTIVE (or is gone).
    pub async fn wait_for_drained(&self, cluster: &str, service: &str) -> StratusResult<()> {
        let ids = [service.to_string()];
        self.ctx
            .poller(format!("{service} drain"))
            .until(|| self.describe_many(cluster, &ids), classify::drained)
            .await?;
        info!(%cluster, %service, "service drained");
        Ok(())
    }

    async fn active(&self, cluster: &str, service: &str) -> StratusResult<Option<ServiceDescription>> {
        require("service", service)?;
        Ok(self
            .describe_many(cluster, &[service.to_string()])
            .await?
            .into_iter()
            .find(|svc| svc.status == ServiceStatus::Active))
    }
}
