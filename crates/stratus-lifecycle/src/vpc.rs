//! Virtual networks.
//!
//! One master VPC per account, shared by every project. It is found by the
//! system tag on every call rather than remembered, since other tooling may
//! create or delete it between calls.

use tracing::{info, warn};

use stratus_core::tenant::{PROJECT_TAG, SYSTEM_TAG};
use stratus_core::{DestroyOutcome, NetworkFilter, StratusError, StratusResult, Tag, VpcDescription};

use crate::{require, require_ids, Lifecycle};

pub struct Vpcs<'a> {
    ctx: &'a Lifecycle,
}

impl<'a> Vpcs<'a> {
    pub(crate) fn new(ctx: &'a Lifecycle) -> Self {
        Self { ctx }
    }

    pub async fn describe_many(&self, vpc_ids: &[String]) -> StratusResult<Vec<VpcDescription>> {
        require_ids("vpcs", vpc_ids)?;
        self.ctx.cloud().describe_vpcs(vpc_ids, &[]).await
    }

    /// Every VPC carrying the system tag.
    pub async fn list(&self) -> StratusResult<Vec<VpcDescription>> {
        self.ctx
            .cloud()
            .describe_vpcs(&[], &[NetworkFilter::TagKey(SYSTEM_TAG.to_string())])
            .await
    }

    /// The shared VPC: system-tagged and not owned by any project.
    pub async fn find_master(&self) -> StratusResult<Option<VpcDescription>> {
        let mut master = self
            .list()
            .await?
            .into_iter()
            .filter(|vpc| !vpc.tags.iter().any(|t| t.key == PROJECT_TAG));
        let found = master.next();
        if let Some(extra) = master.next() {
            warn!(vpc = %extra.vpc_id, "more than one master vpc, using the first");
        }
        Ok(found)
    }

    /// VPCs tagged with `project_id`.
    pub async fn find_for_project(&self, project_id: &str) -> StratusResult<Vec<VpcDescription>> {
        require("project id", project_id)?;
        self.ctx
            .cloud()
            .describe_vpcs(&[], &[NetworkFilter::Tag(Tag::new(PROJECT_TAG, project_id))])
            .await
    }

    /// Create a VPC and attach the system tag. If tagging fails the VPC
    /// stays behind untagged and the error is returned.
    pub async fn create(&self, cidr_block: &str) -> StratusResult<VpcDescription> {
        require("cidr block", cidr_block)?;
        if !cidr_block.contains('/') {
            return Err(StratusError::invalid(format!(
                "cidr block {cidr_block:?} has no prefix length"
            )));
        }

        let mut vpc = self.ctx.cloud().create_vpc(cidr_block).await?;
        let tags = [Tag::new(SYSTEM_TAG, "true")];
        self.ctx.tag_after_create(&vpc.vpc_id, &tags).await?;
        vpc.tags.extend(tags);

        info!(vpc = %vpc.vpc_id, cidr = %vpc.cidr_block, "vpc created");
        Ok(vpc)
    }

    /// Return the master VPC, creating it with `cidr_block` (or the
    /// configured default) when none exists.
    ///
    /// Not atomic: two callers racing here can both create one.
    pub async fn find_or_create(&self, cidr_block: Option<&str>) -> StratusResult<VpcDescription> {
        if let Some(vpc) = self.find_master().await? {
            return Ok(vpc);
        }
        let cidr = cidr_block.unwrap_or(self.ctx.settings().default_cidr.as_str());
        self.create(cidr).await
    }

    pub async fn destroy(&self, vpc_id: &str) -> StratusResult<DestroyOutcome> {
        require("vpc id", vpc_id)?;
        if self.describe_many(&[vpc_id.to_string()]).await?.is_empty() {
            warn!(vpc = %vpc_id, "vpc already deleted");
            return Ok(DestroyOutcome::AlreadyDeleted);
        }
        self.ctx.cloud().delete_vpc(vpc_id).await?;
        info!(vpc = %vpc_id, "vpc deleted");
        Ok(DestroyOutcome::Deleted)
    }
}
