//! stratus-lifecycle: idempotent primitives over the provider API.
//!
//! Every resource kind gets the same shape: `describe_many`, `list`,
//! `create`, `find_or_create`, and `destroy`. Nothing is cached; each call
//! re-describes what it touches.
//!
//! # Modules
//!
//! - **`vpc`**: the shared master network, discovered by tag
//! - **`route_table`**: route tables scoped to one VPC
//! - **`cluster`**: tenant-named clusters and project/deployment/PR views
//! - **`container_instance`**: instances registered into a cluster
//! - **`task_definition`**: immutable, revisioned container specs
//! - **`service`**: desired-count wrappers plus readiness and drain waits

pub mod cluster;
pub mod container_instance;
pub mod route_table;
pub mod service;
pub mod task_definition;
pub mod vpc;

use std::time::Duration;

use tracing::debug;

use stratus_converge::{Cancellation, Poller, Retry, RetryPolicy};
use stratus_core::{StratusConfig, StratusError, StratusResult, Tag};
use stratus_provider::SharedCloud;

pub use cluster::{ClusterServices, Clusters};
pub use container_instance::ContainerInstances;
pub use route_table::RouteTables;
pub use service::Services;
pub use task_definition::TaskDefinitions;
pub use vpc::Vpcs;

/// Knobs shared by every lifecycle module.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Budget for tag-after-create retries.
    pub retry: RetryPolicy,
    /// Delay between readiness/drain re-checks.
    pub poll_interval: Duration,
    /// Cap on re-checks; `None` waits until a terminal state.
    pub max_checks: Option<u32>,
    /// CIDR used when a VPC is created without one.
    pub default_cidr: String,
    /// Checked between retries and re-checks.
    pub cancel: Option<Cancellation>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&StratusConfig::default())
    }
}

impl Settings {
    pub fn from_config(config: &StratusConfig) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            poll_interval: config.poll.interval(),
            max_checks: config.poll.max_checks(),
            default_cidr: config.network.default_cidr.clone(),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Entry point: a provider handle plus settings, handing out one accessor
/// per resource kind.
#[derive(Clone)]
pub struct Lifecycle {
    cloud: SharedCloud,
    settings: Settings,
}

impl Lifecycle {
    pub fn new(cloud: SharedCloud, settings: Settings) -> Self {
        Self { cloud, settings }
    }

    pub fn cloud(&self) -> &SharedCloud {
        &self.cloud
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn vpcs(&self) -> Vpcs<'_> {
        Vpcs::new(self)
    }

    pub fn route_tables(&self) -> RouteTables<'_> {
        RouteTables::new(self)
    }

    pub fn clusters(&self) -> Clusters<'_> {
        Clusters::new(self)
    }

    pub fn container_instances(&self) -> ContainerInstances<'_> {
        ContainerInstances::new(self)
    }

    pub fn task_definitions(&self) -> TaskDefinitions<'_> {
        TaskDefinitions::new(self)
    }

    pub fn services(&self) -> Services<'_> {
        Services::new(self)
    }

    /// Tag freshly created network resources, retrying while the provider
    /// has not caught up with the creation yet. Failures are returned as is;
    /// the resource is left in place untagged.
    pub(crate) async fn tag_after_create(&self, resource_id: &str, tags: &[Tag]) -> StratusResult<()> {
        let ids = [resource_id.to_string()];
        Retry::new(format!("tag {resource_id}"), self.settings.retry)
            .when(StratusError::is_retryable)
            .cancel_on(self.settings.cancel.clone())
            .run(|| self.cloud.create_tags(&ids, tags))
            .await?;
        debug!(resource = %resource_id, tags = tags.len(), "tagged");
        Ok(())
    }

    pub(crate) fn poller(&self, label: impl Into<String>) -> Poller {
        Poller::new(label, self.settings.poll_interval)
            .max_checks(self.settings.max_checks)
            .cancel_on(self.settings.cancel.clone())
    }
}

/// Reject an empty id set before any provider call.
pub(crate) fn require_ids(what: &str, ids: &[String]) -> StratusResult<()> {
    if ids.is_empty() {
        return Err(StratusError::invalid(format!("describe {what}: no ids given")));
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(StratusError::invalid(format!("describe {what}: blank id")));
    }
    Ok(())
}

/// Reject a blank required field before any provider call.
pub(crate) fn require(field: &str, value: &str) -> StratusResult<()> {
    if value.trim().is_empty() {
        return Err(StratusError::invalid(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use stratus_converge::RetryPolicy;
    use stratus_provider::MemoryCloud;

    use super::{Lifecycle, Settings};

    pub fn fast_settings() -> Settings {
        Settings {
            retry: RetryPolicy::new(3, Duration::from_millis(2), 2.0),
            poll_interval: Duration::from_millis(5),
            max_checks: Some(50),
            ..Settings::default()
        }
    }

    pub fn lifecycle() -> (Arc<MemoryCloud>, Lifecycle) {
        lifecycle_with(MemoryCloud::new())
    }

    pub fn lifecycle_with(cloud: MemoryCloud) -> (Arc<MemoryCloud>, Lifecycle) {
        let cloud = Arc::new(cloud);
        let lifecycle = Lifecycle::new(cloud.clone(), fast_settings());
        (cloud, lifecycle)
    }
}
