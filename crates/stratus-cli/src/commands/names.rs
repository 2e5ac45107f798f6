use anyhow::bail;

use stratus_core::TenantKey;

pub fn print(project: &str, deployment: Option<&str>, pr: Option<&str>, sha: Option<&str>) -> anyhow::Result<()> {
    let key = tenant_key(project, deployment, pr, sha)?;
    let encoded = key.encode()?;
    println!("{}", serde_json::to_string_pretty(&encoded)?);
    Ok(())
}

pub fn tenant_key(
    project: &str,
    deployment: Option<&str>,
    pr: Option<&str>,
    sha: Option<&str>,
) -> anyhow::Result<TenantKey> {
    let key = match (deployment, pr) {
        (Some(d), None) => TenantKey::deployment(project, d),
        (None, Some(pr)) => TenantKey::pull_request(project, pr),
        _ => bail!("exactly one of --deployment or --pr is required"),
    };
    Ok(match sha {
        Some(sha) => key.with_sha(sha),
        None => key,
    })
}
