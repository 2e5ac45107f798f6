//! Task definitions: immutable, revisioned container specs.
//!
//! Registering never mutates a revision: it appends `family:N+1`. Services
//! roll forward by pointing at the new revision.

use std::collections::BTreeSet;

use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use stratus_core::tenant::is_system_resource;
use stratus_core::{
    DestroyOutcome, StratusError, StratusResult, TaskDefinitionDescription, TaskDefinitionStatus,
    TaskSpec, TenantFilter,
};

use crate::{require, require_ids, Lifecycle};

pub struct TaskDefinitions<'a> {
    ctx: &'a Lifecycle,
}

impl<'a> TaskDefinitions<'a> {
    pub(crate) fn new(ctx: &'a Lifecycle) -> Self {
        Self { ctx }
    }

    /// Describe by ARN, `family:revision`, or family. Deregistered
    /// revisions are included with status INACTIVE.
    pub async fn describe_many(&self, ids: &[String]) -> StratusResult<Vec<TaskDefinitionDescription>> {
        require_ids("task definitions", ids)?;
        let found = try_join_all(
            ids.iter()
                .map(|id| self.ctx.cloud().describe_task_definition(id)),
        )
        .await?;
        Ok(found.into_iter().flatten().collect())
    }

    /// The ACTIVE revision behind `id`, if any.
    pub async fn describe_one(&self, id: &str) -> StratusResult<Option<TaskDefinitionDescription>> {
        Ok(self
            .describe_many(&[id.to_string()])
            .await?
            .into_iter()
            .find(|td| td.status == TaskDefinitionStatus::Active))
    }

    /// ARNs of ACTIVE Stratus revisions.
    pub async fn list(&self) -> StratusResult<Vec<String>> {
        let arns = self.ctx.cloud().list_task_definitions().await?;
        Ok(arns.into_iter().filter(|arn| is_system_resource(arn)).collect())
    }

    pub async fn list_matching(&self, filter: &TenantFilter) -> StratusResult<Vec<String>> {
        filter.validate()?;
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|arn| filter.matches_name(arn))
            .collect())
    }

    pub async fn list_project(&self, project_id: &str) -> StratusResult<Vec<String>> {
        self.list_matching(&TenantFilter::project(project_id)).await
    }

    pub async fn list_deployment(&self, project_id: &str, deployment: &str) -> StratusResult<Vec<String>> {
        self.list_matching(&TenantFilter::deployment(project_id, deployment)).await
    }

    pub async fn list_pr(&self, project_id: &str, pr: &str) -> StratusResult<Vec<String>> {
        self.list_matching(&TenantFilter::pull_request(project_id, pr)).await
    }

    /// Families with at least one ACTIVE revision.
    pub async fn list_families(&self) -> StratusResult<Vec<String>> {
        let families: BTreeSet<String> = self
            .ctx
            .cloud()
            .list_task_definition_families()
            .await?
            .into_iter()
            .collect();
        Ok(families.into_iter().collect())
    }

    /// Register a new revision of `spec.family`.
    pub async fn create(&self, spec: &TaskSpec) -> StratusResult<TaskDefinitionDescription> {
        validate(spec)?;
        let td = self.ctx.cloud().register_task_definition(spec).await?;
        info!(
            family = %td.family,
            revision = td.revision,
            containers = td.container_definitions.len(),
            "task definition registered"
        );
        Ok(td)
    }

    /// Reuse the family's latest ACTIVE revision when its containers equal
    /// `spec`'s, otherwise register a new revision.
    pub async fn find_or_create(&self, spec: &TaskSpec) -> StratusResult<TaskDefinitionDescription> {
        validate(spec)?;
        if let Some(latest) = self.describe_one(&spec.family).await? {
            if latest.container_definitions == spec.container_definitions {
                debug!(family = %latest.family, revision = latest.revision, "task definition unchanged");
                return Ok(latest);
            }
        }
        self.create(spec).await
    }

    /// Deregister one revision.
    pub async fn destroy(&self, id: &str) -> StratusResult<DestroyOutcome> {
        require("task definition", id)?;
        let Some(td) = self.describe_one(id).await? else {
            warn!(task_definition = %id, "task definition already deregistered");
            return Ok(DestroyOutcome::AlreadyDeleted);
        };
        self.ctx
            .cloud()
            .deregister_task_definition(&td.task_definition_arn)
            .await?;
        info!(family = %td.family, revision = td.revision, "task definition deregistered");
        Ok(DestroyOutcome::Deleted)
    }
}

/// Required fields of a registration, checked before any provider call.
pub fn validate(spec: &TaskSpec) -> StratusResult<()> {
    require("task family", &spec.family)?;
    if spec.family.contains(':') || spec.family.contains('/') {
        return Err(StratusError::invalid(format!(
            "task family {:?} may not contain ':' or '/'",
            spec.family
        )));
    }
    if spec.container_definitions.is_empty() {
        return Err(StratusError::invalid(format!(
            "task {} has no container definitions",
            spec.family
        )));
    }
    for container in &spec.container_definitions {
        require("container name", &container.name)?;
        if container.image.trim().is_empty() {
            return Err(StratusError::invalid(format!(
                "container {} in task {} has no image",
                container.name, spec.family
            )));
        }
    }
    Ok(())
}
