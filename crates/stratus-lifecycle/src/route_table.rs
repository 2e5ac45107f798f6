//! Route tables, always scoped to one VPC and the system tag.

use tracing::{info, warn};

use stratus_core::tenant::SYSTEM_TAG;
use stratus_core::{DestroyOutcome, NetworkFilter, RouteTableDescription, StratusResult, Tag};

use crate::{require, require_ids, Lifecycle};

pub struct RouteTables<'a> {
    ctx: &'a Lifecycle,
}

impl<'a> RouteTables<'a> {
    pub(crate) fn new(ctx: &'a Lifecycle) -> Self {
        Self { ctx }
    }

    pub async fn describe_many(
        &self,
        route_table_ids: &[String],
    ) -> StratusResult<Vec<RouteTableDescription>> {
        require_ids("route tables", route_table_ids)?;
        self.ctx.cloud().describe_route_tables(route_table_ids, &[]).await
    }

    /// System-tagged route tables in `vpc_id`.
    pub async fn list(&self, vpc_id: &str) -> StratusResult<Vec<RouteTableDescription>> {
        require("vpc id", vpc_id)?;
        let filters = [
            NetworkFilter::VpcId(vpc_id.to_string()),
            NetworkFilter::TagKey(SYSTEM_TAG.to_string()),
        ];
        self.ctx.cloud().describe_route_tables(&[], &filters).await
    }

    pub async fn create(&self, vpc_id: &str) -> StratusResult<RouteTableDescription> {
        require("vpc id", vpc_id)?;
        let mut table = self.ctx.cloud().create_route_table(vpc_id).await?;
        let tags = [Tag::new(SYSTEM_TAG, "true")];
        self.ctx.tag_after_create(&table.route_table_id, &tags).await?;
        table.tags.extend(tags);

        info!(route_table = %table.route_table_id, vpc = %vpc_id, "route table created");
        Ok(table)
    }

    /// First system route table in the VPC, or a new one.
    pub async fn find_or_create(&self, vpc_id: &str) -> StratusResult<RouteTableDescription> {
        if let Some(existing) = self.list(vpc_id).await?.into_iter().next() {
            return Ok(existing);
        }
        self.create(vpc_id).await
    }

    pub async fn destroy(&self, route_table_id: &str) -> StratusResult<DestroyOutcome> {
        require("route table id", route_table_id)?;
        if self
            .describe_many(&[route_table_id.to_string()])
            .await?
            .is_empty()
        {
            warn!(route_table = %route_table_id, "route table already deleted");
            return Ok(DestroyOutcome::AlreadyDeleted);
        }
        self.ctx.cloud().delete_route_table(route_table_id).await?;
        info!(route_table = %route_table_id, "route table deleted");
        Ok(DestroyOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::StratusError;
    use stratus_provider::CloudApi;

    use crate::testing::lifecycle;

    #[tokio::test]
    async fn list_is_scoped_to_vpc_and_system_tag() {
        let (cloud, lc) = lifecycle();
        let vpc = lc.vpcs().create("10.0.0.0/24").await.unwrap();
        let other = lc.vpcs().create("10.1.0.0/24").await.unwrap();

        let ours = lc.route_tables().create(&vpc.vpc_id).await.unwrap();
        lc.route_tables().create(&other.vpc_id).await.unwrap();
        // Untagged table in the same VPC, made by someone else.
        cloud.create_route_table(&vpc.vpc_id).await.unwrap();

        let listed = lc.route_tables().list(&vpc.vpc_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].route_table_id, ours.route_table_id);
    }

    #[tokio::test]
    async fn find_or_create_creates_once() {
        let (cloud, lc) = lifecycle();
        let vpc = lc.vpcs().create("10.0.0.0/24").await.unwrap();

        let a = lc.route_tables().find_or_create(&vpc.vpc_id).await.unwrap();
        let b = lc.route_tables().find_or_create(&vpc.vpc_id).await.unwrap();
        assert_eq!(a.route_table_id, b.route_table_id);
        assert_eq!(cloud.calls("create_route_table"), 1);
    }

    #[tokio::test]
    async fn tag_is_retried_without_recreating() {
        let (cloud, lc) = lifecycle();
        let vpc = lc.vpcs().create("10.0.0.0/24").await.unwrap();
        let tags_before = cloud.calls("create_tags");
        cloud.fail_next("create_tags", 2);

        let table = lc.route_tables().create(&vpc.vpc_id).await.unwrap();
        assert!(table.tags.contains(&Tag::new(SYSTEM_TAG, "true")));
        assert_eq!(cloud.calls("create_route_table"), 1);
        assert_eq!(cloud.calls("create_tags") - tags_before, 3);
    }

    #[tokio::test]
    async fn create_against_missing_vpc_fails() {
        let (_, lc) = lifecycle();
        let err = lc.route_tables().create("vpc-missing").await.unwrap_err();
        assert!(matches!(err, StratusError::NotFound(_)));
        assert!(matches!(
            lc.route_tables().create(" ").await,
            Err(StratusError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn destroy_then_vpc() {
        let (cloud, lc) = lifecycle();
        let vpc = lc.vpcs().create("10.0.0.0/24").await.unwrap();
        let table = lc.route_tables().create(&vpc.vpc_id).await.unwrap();

        // The VPC cannot go while the table is still attached.
        assert!(matches!(
            lc.vpcs().destroy(&vpc.vpc_id).await,
            Err(StratusError::Rejected { .. })
        ));

        assert_eq!(
            lc.route_tables().destroy(&table.route_table_id).await.unwrap(),
            DestroyOutcome::Deleted
        );
        assert_eq!(
            lc.route_tables().destroy(&table.route_table_id).await.unwrap(),
            DestroyOutcome::AlreadyDeleted
        );
        assert_eq!(cloud.calls("delete_route_table"), 1);
        assert_eq!(lc.vpcs().destroy(&vpc.vpc_id).await.unwrap(), DestroyOutcome::Deleted);
    }
}
