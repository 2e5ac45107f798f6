//! Container instances registered into a cluster.

use tracing::{info, warn};

use stratus_core::{ContainerInstanceDescription, DestroyOutcome, StratusResult};

use crate::{require, require_ids, Lifecycle};

pub struct ContainerInstances<'a> {
    ctx: &'a Lifecycle,
}

impl<'a> ContainerInstances<'a> {
    pub(crate) fn new(ctx: &'a Lifecycle) -> Self {
        Self { ctx }
    }

    /// Describe by container instance ARN or by the backing host id.
    pub async fn describe_many(
        &self,
        cluster: &str,
        instances: &[String],
    ) -> StratusResult<Vec<ContainerInstanceDescription>> {
        require("cluster", cluster)?;
        require_ids("container instances", instances)?;
        self.ctx
            .cloud()
            .describe_container_instances(cluster, instances)
            .await
    }

    pub async fn list(&self, cluster: &str) -> StratusResult<Vec<String>> {
        require("cluster", cluster)?;
        self.ctx.cloud().list_container_instances(cluster).await
    }

    /// Every instance in the cluster. An empty cluster yields an empty list.
    pub async fn describe(&self, cluster: &str) -> StratusResult<Vec<ContainerInstanceDescription>> {
        let arns = self.list(cluster).await?;
        if arns.is_empty() {
            return Ok(Vec::new());
        }
        self.describe_many(cluster, &arns).await
    }

    /// Register the host `instance_id` into `cluster`.
    pub async fn create(&self, cluster: &str, instance_id: &str) -> StratusResult<ContainerInstanceDescription> {
        require("cluster", cluster)?;
        require("instance id", instance_id)?;
        let desc = self
            .ctx
            .cloud()
            .register_container_instance(cluster, instance_id)
            .await?;
        info!(%cluster, instance = %desc.container_instance_arn, host = %instance_id, "container instance registered");
        Ok(desc)
    }

    pub async fn find_or_create(
        &self,
        cluster: &str,
        instance_id: &str,
    ) -> StratusResult<ContainerInstanceDescription> {
        require("instance id", instance_id)?;
        if let Some(existing) = self
            .describe_many(cluster, &[instance_id.to_string()])
            .await?
            .into_iter()
            .next()
        {
            return Ok(existing);
        }
        self.create(cluster, instance_id).await
    }

    /// Deregister an instance from the cluster.
    pub async fn destroy(&self, cluster: &str, instance: &str) -> StratusResult<DestroyOutcome> {
        require("container instance", instance)?;
        if self
            .describe_many(cluster, &[instance.to_string()])
            .await?
            .is_empty()
        {
            warn!(%cluster, %instance, "container instance already deregistered");
            return Ok(DestroyOutcome::AlreadyDeleted);
        }
        self.ctx
            .cloud()
            .deregister_container_instance(cluster, instance)
            .await?;
        info!(%cluster, %instance, "container instance deregistered");
        Ok(DestroyOutcome::Deleted)
    }
}
