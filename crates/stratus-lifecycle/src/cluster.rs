//! Clusters, named after the tenant they serve.
//!
//! The cluster name is the encoded tenant key, so project, deployment, and
//! PR views are plain name filters over the account's cluster list.

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use stratus_core::tenant::{bare_name, is_system_resource};
use stratus_core::{
    ClusterDescription, ClusterRef, DestroyOutcome, ServiceRef, StratusError, StratusResult,
    TenantFilter, TenantKey,
};

use crate::{require, require_ids, Lifecycle};

/// A cluster together with the services currently running in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterServices {
    pub cluster: ClusterRef,
    pub services: Vec<ServiceRef>,
}

pub struct Clusters<'a> {
    ctx: &'a Lifecycle,
}

impl<'a> Clusters<'a> {
    pub(crate) fn new(ctx: &'a Lifecycle) -> Self {
        Self { ctx }
    }

    pub async fn describe_many(&self, clusters: &[String]) -> StratusResult<Vec<ClusterDescription>> {
        require_ids("clusters", clusters)?;
        self.ctx.cloud().describe_clusters(clusters).await
    }

    /// Describe one ACTIVE cluster; `NotFound` when it is absent or inactive.
    pub async fn describe_one(&self, cluster: &str) -> StratusResult<ClusterDescription> {
        self.describe_many(&[cluster.to_string()])
            .await?
            .into_iter()
            .find(|c| c.status == "ACTIVE")
            .ok_or_else(|| StratusError::not_found(format!("cluster {cluster}")))
    }

    /// Every Stratus cluster in the account.
    pub async fn list(&self) -> StratusResult<Vec<ClusterRef>> {
        let arns = self.ctx.cloud().list_clusters().await?;
        Ok(arns
            .iter()
            .filter(|arn| is_system_resource(arn))
            .map(|arn| ClusterRef {
                name: bare_name(arn).to_string(),
                arn: arn.clone(),
                tenant: TenantKey::decode_name(arn),
            })
            .collect())
    }

    pub async fn list_matching(&self, filter: &TenantFilter) -> StratusResult<Vec<ClusterRef>> {
        filter.validate()?;
        let clusters: Vec<ClusterRef> = self
            .list()
            .await?
            .into_iter()
            .filter(|c| filter.matches_name(&c.name))
            .collect();
        debug!(?filter, count = clusters.len(), "clusters listed");
        Ok(clusters)
    }

    pub async fn list_project(&self, project_id: &str) -> StratusResult<Vec<ClusterRef>> {
        self.list_matching(&TenantFilter::project(project_id)).await
    }

    pub async fn list_deployment(&self, project_id: &str, deployment: &str) -> StratusResult<Vec<ClusterRef>> {
        self.list_matching(&TenantFilter::deployment(project_id, deployment)).await
    }

    pub async fn list_pr(&self, project_id: &str, pr: &str) -> StratusResult<Vec<ClusterRef>> {
        self.list_matching(&TenantFilter::pull_request(project_id, pr)).await
    }

    /// Matching clusters with their services, described concurrently.
    pub async fn describe_matching(&self, filter: &TenantFilter) -> StratusResult<Vec<ClusterServices>> {
        let clusters = self.list_matching(filter).await?;
        let services = self.ctx.services();
        try_join_all(clusters.into_iter().map(|cluster| {
            let services = &services;
            async move {
                let refs = services.describe(&cluster.name).await?;
                Ok::<_, StratusError>(ClusterServices {
                    cluster,
                    services: refs,
                })
            }
        }))
        .await
    }

    pub async fn describe_project(&self, project_id: &str) -> StratusResult<Vec<ClusterServices>> {
        self.describe_matching(&TenantFilter::project(project_id)).await
    }

    pub async fn describe_deployment(
        &self,
        project_id: &str,
        deployment: &str,
    ) -> StratusResult<Vec<ClusterServices>> {
        self.describe_matching(&TenantFilter::deployment(project_id, deployment))
            .await
    }

    pub async fn describe_pr(&self, project_id: &str, pr: &str) -> StratusResult<Vec<ClusterServices>> {
        self.describe_matching(&TenantFilter::pull_request(project_id, pr)).await
    }

    /// Create the cluster for `key`, named and tagged from its encoding.
    pub async fn create(&self, key: &TenantKey) -> StratusResult<ClusterDescription> {
        let encoded = key.encode()?;
        let cluster = self
            .ctx
            .cloud()
            .create_cluster(&encoded.name, &encoded.tags)
            .await?;
        info!(cluster = %cluster.cluster_name, tenant = %key, "cluster created");
        Ok(cluster)
    }

    /// Not atomic: concurrent callers can both reach the create call.
    pub async fn find_or_create(&self, key: &TenantKey) -> StratusResult<ClusterDescription> {
        let name = key.resource_name()?;
        match self.describe_one(&name).await {
            Ok(existing) => Ok(existing),
            Err(StratusError::NotFound(_)) => self.create(key).await,
            Err(err) => Err(err),
        }
    }

    /// Delete a cluster. It must already be empty of services and instances.
    pub async fn destroy(&self, cluster: &str) -> StratusResult<DestroyOutcome> {
        require("cluster", cluster)?;
        let active = self
            .describe_many(&[cluster.to_string()])
            .await?
            .into_iter()
            .any(|c| c.status == "ACTIVE");
        if !active {
            warn!(%cluster, "cluster already deleted");
            return Ok(DestroyOutcome::AlreadyDeleted);
        }
        self.ctx.cloud().delete_cluster(cluster).await?;
        info!(%cluster, "cluster deleted");
        Ok(DestroyOutcome::Deleted)
    }
}
