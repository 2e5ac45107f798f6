use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use stratus_core::{AppDefinition, DestroyOutcome, ServiceRef, StratusConfig, TenantKey};
use stratus_lifecycle::Settings;
use stratus_orchestrator::Orchestrator;
use stratus_provider::{MemoryCloud, MemoryCloudConfig};

pub struct SimulateArgs {
    pub app: PathBuf,
    pub config: Option<PathBuf>,
    pub project: String,
    pub deployment: String,
    pub prefix: Option<String>,
    pub poll_ms: u64,
    pub keep: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    cluster: String,
    vpc: String,
    route_table: String,
    services: Vec<ServiceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decommissioned: Option<String>,
}

pub async fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => StratusConfig::from_file(path)?,
        None => StratusConfig::default(),
    };
    let app = load_app(&args.app)?;

    let cloud = Arc::new(MemoryCloud::with_config(MemoryCloudConfig {
        region: config.cloud.region.clone(),
        account_id: config.cloud.account_id.clone(),
        latency: Duration::from_millis(5),
        drain_polls: 2,
        steady_polls: 2,
    }));
    let mut settings = Settings::from_config(&config);
    settings.poll_interval = Duration::from_millis(args.poll_ms.max(1));

    let orch = Orchestrator::new(cloud, settings);
    let lc = orch.lifecycle();
    let key = TenantKey::deployment(&args.project, &args.deployment);
    let prefix = args.prefix.as_deref().unwrap_or(args.project.as_str());

    let vpc = lc.vpcs().find_or_create(None).await?;
    let route_table = lc.route_tables().find_or_create(&vpc.vpc_id).await?;
    let cluster = lc.clusters().find_or_create(&key).await?.cluster_name;
    lc.container_instances()
        .find_or_create(&cluster, "i-simulated-0001")
        .await?;

    orch.deploy(&cluster, prefix, &app)
        .await
        .with_context(|| format!("deploying {} into {cluster}", args.app.display()))?;
    let services = orch.describe(&cluster).await?;
    info!(%cluster, services = services.len(), "simulated deploy complete");

    let decommissioned = if args.keep {
        None
    } else {
        let outcome = orch.decommission(&cluster).await?;
        lc.route_tables().destroy(&route_table.route_table_id).await?;
        lc.vpcs().destroy(&vpc.vpc_id).await?;
        Some(outcome)
    };

    let report = Report {
        cluster,
        vpc: vpc.vpc_id,
        route_table: route_table.route_table_id,
        services,
        decommissioned: decommissioned.map(|o: DestroyOutcome| o.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn load_app(path: &Path) -> anyhow::Result<AppDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let app: AppDefinition = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if app.tasks.is_empty() {
        anyhow::bail!("{} defines no tasks", path.display());
    }
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_app_reads_container_definitions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tasks": [{{"family": "web", "containerDefinitions": [
                {{"name": "web", "image": "nginx:1", "memory": 128,
                  "portMappings": [{{"containerPort": 80}}]}}
            ]}}]}}"#
        )
        .unwrap();

        let app = load_app(file.path()).unwrap();
        assert_eq!(app.tasks.len(), 1);
        let container = &app.tasks[0].container_definitions[0];
        assert!(container.essential);
        assert_eq!(container.port_mappings[0].container_port, 80);
        assert_eq!(container.port_mappings[0].protocol, "tcp");
    }

    #[test]
    fn load_app_rejects_empty_task_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tasks": []}}"#).unwrap();
        assert!(load_app(file.path()).is_err());
    }

    #[tokio::test]
    async fn simulate_runs_full_cycle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tasks": [{{"family": "web", "containerDefinitions": [{{"name": "web", "image": "nginx"}}]}}]}}"#
        )
        .unwrap();

        run(SimulateArgs {
            app: file.path().to_path_buf(),
            config: None,
            project: "demo".into(),
            deployment: "master".into(),
            prefix: None,
            poll_ms: 1,
            keep: false,
        })
        .await
        .unwrap();
    }
}
