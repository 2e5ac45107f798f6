//! End-to-end deploy/teardown flows against the in-memory provider.

use std::sync::Arc;
use std::time::{Duration, Instant};

use stratus_converge::{cancellation, RetryPolicy};
use stratus_core::{
    AppDefinition, ContainerSpec, DestroyOutcome, ServiceStatus, StratusError, TaskSpec, TenantKey,
};
use stratus_lifecycle::Settings;
use stratus_orchestrator::Orchestrator;
use stratus_provider::{MemoryCloud, MemoryCloudConfig};

const INTERVAL: Duration = Duration::from_millis(5);

fn settings() -> Settings {
    Settings {
        retry: RetryPolicy::new(3, Duration::from_millis(2), 2.0),
        poll_interval: INTERVAL,
        max_checks: Some(200),
        ..Settings::default()
    }
}

fn task(family: &str, image: &str) -> TaskSpec {
    TaskSpec {
        family: family.to_string(),
        container_definitions: vec![ContainerSpec {
            name: family.to_string(),
            image: image.to_string(),
            memory: Some(256),
            cpu: None,
            essential: true,
            port_mappings: vec![],
            environment: Default::default(),
            command: vec![],
        }],
    }
}

fn app() -> AppDefinition {
    AppDefinition {
        tasks: vec![task("web", "nginx:1"), task("worker", "busybox:1")],
    }
}

async fn setup(cloud: MemoryCloud, settings: Settings) -> (Arc<MemoryCloud>, Orchestrator, String) {
    let cloud = Arc::new(cloud);
    let orch = Orchestrator::new(cloud.clone(), settings);
    let cluster = orch
        .lifecycle()
        .clusters()
        .create(&TenantKey::deployment("shop", "master"))
        .await
        .unwrap()
        .cluster_name;
    (cloud, orch, cluster)
}

// ── Deploy ────────────────────────────────────────────────────────

#[tokio::test]
async fn deploy_registers_and_starts_every_task() {
    let (cloud, orch, cluster) = setup(MemoryCloud::new(), settings()).await;

    let services = orch.deploy(&cluster, "shop", &app()).await.unwrap();

    assert_eq!(services.len(), 2);
    assert_eq!(services[0].service_name, "shop-web");
    assert_eq!(services[1].service_name, "shop-worker");
    assert_ne!(services[0].task_definition, services[1].task_definition);
    assert!(services.iter().all(|s| s.status == ServiceStatus::Active));
    assert_eq!(cloud.calls("register_task_definition"), 2);
    assert_eq!(cloud.calls("create_service"), 2);
    assert_eq!(orch.describe(&cluster).await.unwrap().len(), 2);
}

#[tokio::test]
async fn redeploy_rolls_services_in_place() {
    let (cloud, orch, cluster) = setup(MemoryCloud::new(), settings()).await;
    let first = orch.deploy(&cluster, "shop", &app()).await.unwrap();

    let second = orch.deploy(&cluster, "shop", &app()).await.unwrap();
    assert_eq!(cloud.calls("create_service"), 2);
    assert_eq!(cloud.calls("update_service"), 2);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.service_arn, b.service_arn);
        assert!(b.task_definition.ends_with(":2"));
    }
}

#[tokio::test]
async fn deploy_into_missing_cluster_is_not_found() {
    let (cloud, orch, _) = setup(MemoryCloud::new(), settings()).await;
    let err = orch
        .deploy("stratus-pid-shop--pr-404", "shop", &app())
        .await
        .unwrap_err();
    assert!(matches!(err, StratusError::NotFound(_)));
    assert_eq!(cloud.calls("register_task_definition"), 0);
}

#[tokio::test]
async fn deploy_rejects_invalid_app_before_any_call() {
    let (cloud, orch, cluster) = setup(MemoryCloud::new(), settings()).await;
    let bad = AppDefinition {
        tasks: vec![task("web", "nginx"), task("api", "")],
    };
    let err = orch.deploy(&cluster, "shop", &bad).await.unwrap_err();
    assert!(matches!(err, StratusError::InvalidArgument(_)));
    assert_eq!(cloud.calls("describe_clusters"), 0);
    assert_eq!(cloud.calls("register_task_definition"), 0);
}

#[tokio::test]
async fn deploy_fails_fast_with_labelled_error() {
    let (cloud, orch, cluster) = setup(MemoryCloud::new(), settings()).await;
    cloud.fail_next("register_task_definition", 1);

    let err = orch.deploy(&cluster, "shop", &app()).await.unwrap_err();
    match &err {
        StratusError::PartialFailure { label, .. } => assert!(label.starts_with("deploy shop-")),
        other => panic!("expected PartialFailure, got {other:?}"),
    }
    assert!(err.root().is_retryable());
}

#[tokio::test]
async fn deploy_waits_for_steady_state_event() {
    let cloud = MemoryCloud::with_config(MemoryCloudConfig {
        steady_polls: 3,
        ..Default::default()
    });
    let (cloud, orch, cluster) = setup(cloud, settings()).await;

    let start = Instant::now();
    let services = orch.deploy(&cluster, "shop", &app()).await.unwrap();
    assert_eq!(services.len(), 2);
    // Each service needs four describes inside readiness: three without the
    // event, one with it. The find before create adds one more.
    assert_eq!(cloud.calls("describe_services"), 2 * 5);
    assert!(start.elapsed() >= INTERVAL * 3);
    assert!(
        services
            .iter()
            .all(|s| s.last_event.as_deref().is_some_and(|e| e.contains("steady state")))
    );
}

#[tokio::test]
async fn deploy_never_resolves_without_steady_state_event() {
    let cloud = MemoryCloud::with_config(MemoryCloudConfig {
        steady_polls: u32::MAX,
        ..Default::default()
    });
    let (_, orch, cluster) = setup(cloud, settings()).await;

    let deploy = tokio::time::timeout(
        Duration::from_millis(50),
        orch.deploy(&cluster, "shop", &AppDefinition { tasks: vec![task("web", "nginx:1")] }),
    )
    .await;
    assert!(deploy.is_err());
}

#[tokio::test]
async fn redeploy_accepts_steady_state_event_from_earlier_rollout() {
    let cloud = MemoryCloud::with_config(MemoryCloudConfig {
        steady_polls: 2,
        ..Default::default()
    });
    let (cloud, orch, cluster) = setup(cloud, settings()).await;
    let web = AppDefinition { tasks: vec![task("web", "nginx:1")] };
    orch.deploy(&cluster, "shop", &web).await.unwrap();

    let before = cloud.calls("describe_services");
    let rolled = AppDefinition { tasks: vec![task("web", "nginx:2")] };
    let services = orch.deploy(&cluster, "shop", &rolled).await.unwrap();
    // One describe to find the service, one readiness check that already
    // sees the first rollout's steady-state event.
    assert_eq!(cloud.calls("describe_services") - before, 2);
    assert!(services[0].task_definition.ends_with(":2"));
}

// ── Teardown ──────────────────────────────────────────────────────

#[tokio::test]
async fn teardown_resolves_on_third_describe() {
    let (cloud, orch, cluster) = setup(MemoryCloud::new(), settings()).await;
    orch.deploy(&cluster, "shop", &AppDefinition { tasks: vec![task("web", "nginx:1")] })
        .await
        .unwrap();
    cloud.script_service_statuses(
        &cluster,
        "shop-web",
        &[ServiceStatus::Active, ServiceStatus::Active, ServiceStatus::Inactive],
    );

    let before = cloud.calls("describe_services");
    let start = Instant::now();
    let torn = orch.teardown(&cluster).await.unwrap();

    assert_eq!(torn, vec!["shop-web".to_string()]);
    assert_eq!(cloud.calls("describe_services") - before, 3);
    assert!(start.elapsed() >= INTERVAL);
    assert_eq!(cloud.calls("delete_service"), 1);
}

#[tokio::test]
async fn teardown_drains_every_service() {
    let cloud = MemoryCloud::with_config(MemoryCloudConfig {
        drain_polls: 2,
        ..Default::default()
    });
    let (cloud, orch, cluster) = setup(cloud, settings()).await;
    orch.deploy(&cluster, "shop", &app()).await.unwrap();

    let mut torn = orch.teardown(&cluster).await.unwrap();
    torn.sort();
    assert_eq!(torn, vec!["shop-web".to_string(), "shop-worker".to_string()]);
    assert_eq!(cloud.calls("update_service"), 2);
    assert!(orch.describe(&cluster).await.unwrap().is_empty());

    // Nothing left: a second teardown issues no writes.
    assert!(orch.teardown(&cluster).await.unwrap().is_empty());
    assert_eq!(cloud.calls("delete_service"), 2);
}

#[tokio::test]
async fn teardown_of_missing_cluster_is_a_noop() {
    let (cloud, orch, _) = setup(MemoryCloud::new(), settings()).await;
    assert!(orch.teardown("stratus-pid-shop--pr-1").await.unwrap().is_empty());
    assert_eq!(cloud.calls("list_services"), 0);
}

#[tokio::test]
async fn teardown_can_be_cancelled() {
    let (handle, token) = cancellation();
    let (cloud, orch, cluster) = setup(MemoryCloud::new(), settings().with_cancellation(token)).await;
    orch.deploy(&cluster, "shop", &AppDefinition { tasks: vec![task("web", "nginx:1")] })
        .await
        .unwrap();
    cloud.script_service_statuses(&cluster, "shop-web", &[ServiceStatus::Active; 500]);

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
    };
    let (result, ()) = tokio::join!(orch.teardown(&cluster), cancel);
    let err = result.unwrap_err();
    assert!(matches!(err.root(), StratusError::Cancelled { .. }));
}

// ── Decommission ──────────────────────────────────────────────────

#[tokio::test]
async fn decommission_removes_services_instances_and_cluster() {
    let (cloud, orch, cluster) = setup(MemoryCloud::new(), settings()).await;
    orch.deploy(&cluster, "shop", &app()).await.unwrap();
    let instances = orch.lifecycle().container_instances();
    instances.create(&cluster, "i-0001").await.unwrap();
    instances.create(&cluster, "i-0002").await.unwrap();

    assert_eq!(orch.decommission(&cluster).await.unwrap(), DestroyOutcome::Deleted);
    assert_eq!(cloud.calls("deregister_container_instance"), 2);
    assert!(orch.lifecycle().clusters().list_project("shop").await.unwrap().is_empty());

    assert_eq!(
        orch.decommission(&cluster).await.unwrap(),
        DestroyOutcome::AlreadyDeleted
    );
    assert_eq!(cloud.calls("delete_cluster"), 1);
}
