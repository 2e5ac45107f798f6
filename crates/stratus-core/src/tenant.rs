//! Tenant naming and tag codec.
//!
//! Every resource Stratus creates carries its owner in two places: a name
//! fragment usable in list filters, and a small tag set attached at creation.
//!
//! ```text
//! stratus-pid-<project>--deployment-<name>[--sha-<commit>]
//! stratus-pid-<project>--pr-<number>[--sha-<commit>]
//! ```
//!
//! Segments are separated by `--`, which identifiers may not contain, so a
//! segment comparison can never confuse project `web` with project `web-api`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StratusError, StratusResult};
use crate::types::Tag;

/// Prefix carried by every Stratus-owned resource name and tag key.
pub const SYSTEM_PREFIX: &str = "stratus";
/// Separator between name segments.
pub const DELIM: &str = "--";

/// Marks a resource as created by this system.
pub const SYSTEM_TAG: &str = "stratus-created";
pub const PROJECT_TAG: &str = "stratus-project";
pub const DEPLOYMENT_TAG: &str = "stratus-deployment";
pub const PR_TAG: &str = "stratus-pr";
pub const SHA_TAG: &str = "stratus-sha";
/// Reserved for expiring preview environments.
pub const EXPIRES_TAG: &str = "stratus-expires";

const PROJECT_SEGMENT: &str = "pid-";
const DEPLOYMENT_SEGMENT: &str = "deployment-";
const PR_SEGMENT: &str = "pr-";
const SHA_SEGMENT: &str = "sha-";

/// Which environment of a project a resource belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Environment {
    /// A long-lived named deployment (e.g. `master`, `staging`).
    Deployment(String),
    /// A pull-request preview.
    PullRequest(String),
}

impl Environment {
    fn value(&self) -> &str {
        match self {
            Self::Deployment(name) | Self::PullRequest(name) => name,
        }
    }
}

/// The (project, environment, commit) identity of one logical deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantKey {
    pub project_id: String,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
}

/// Output of [`TenantKey::encode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Encoded {
    pub name: String,
    pub tags: Vec<Tag>,
}

/// What a caller knows about a resource when asking whether it matches.
#[derive(Debug, Clone, Copy)]
pub enum ResourceIdentity<'a> {
    Name(&'a str),
    Tags(&'a [Tag]),
}

impl TenantKey {
    pub fn deployment(project_id: &str, deployment: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            environment: Environment::Deployment(deployment.to_string()),
            commit_sha: None,
        }
    }

    pub fn pull_request(project_id: &str, pr: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            environment: Environment::PullRequest(pr.to_string()),
            commit_sha: None,
        }
    }

    pub fn with_sha(mut self, sha: &str) -> Self {
        self.commit_sha = Some(sha.to_string());
        self
    }

    /// Check every component; fails with `InvalidKey` on the first bad one.
    pub fn validate(&self) -> StratusResult<()> {
        validate_ident("project id", &self.project_id)?;
        match &self.environment {
            Environment::Deployment(name) => validate_ident("deployment", name)?,
            Environment::PullRequest(pr) => validate_ident("pull request", pr)?,
        }
        if let Some(sha) = &self.commit_sha {
            validate_ident("commit sha", sha)?;
        }
        Ok(())
    }

    /// Encode into a resource name fragment and the tags attached at creation.
    pub fn encode(&self) -> StratusResult<Encoded> {
        self.validate()?;

        let mut name = format!("{SYSTEM_PREFIX}-{PROJECT_SEGMENT}{}", self.project_id);
        let mut tags = vec![
            Tag::new(SYSTEM_TAG, "true"),
            Tag::new(PROJECT_TAG, &self.project_id),
        ];

        match &self.environment {
            Environment::Deployment(d) => {
                name.push_str(&format!("{DELIM}{DEPLOYMENT_SEGMENT}{d}"));
                tags.push(Tag::new(DEPLOYMENT_TAG, d));
            }
            Environment::PullRequest(pr) => {
                name.push_str(&format!("{DELIM}{PR_SEGMENT}{pr}"));
                tags.push(Tag::new(PR_TAG, pr));
            }
        }

        if let Some(sha) = &self.commit_sha {
            name.push_str(&format!("{DELIM}{SHA_SEGMENT}{sha}"));
            tags.push(Tag::new(SHA_TAG, sha));
        }

        Ok(Encoded { name, tags })
    }

    /// Encoded name fragment only.
    pub fn resource_name(&self) -> StratusResult<String> {
        Ok(self.encode()?.name)
    }

    /// The narrowest filter that still selects this key's resources.
    pub fn filter(&self) -> TenantFilter {
        match &self.environment {
            Environment::Deployment(d) => TenantFilter::Deployment {
                project_id: self.project_id.clone(),
                deployment: d.clone(),
            },
            Environment::PullRequest(pr) => TenantFilter::PullRequest {
                project_id: self.project_id.clone(),
                pr: pr.clone(),
            },
        }
    }

    /// Whether a resource, known by name or by tags, belongs to this key.
    ///
    /// When the key carries a commit sha the resource must carry the same one.
    pub fn matches(&self, resource: ResourceIdentity<'_>) -> bool {
        let parts = match resource {
            ResourceIdentity::Name(name) => match NameParts::parse(name) {
                Some(parts) => parts,
                None => return false,
            },
            ResourceIdentity::Tags(tags) => match NameParts::from_tags(tags) {
                Some(parts) => parts,
                None => return false,
            },
        };

        if !self.filter().matches_parts(&parts) {
            return false;
        }
        match &self.commit_sha {
            Some(sha) => parts.sha.as_deref() == Some(sha.as_str()),
            None => true,
        }
    }

    /// Recover a key from a resource name or ARN.
    ///
    /// Returns `None` when the name is not a Stratus name or lacks an
    /// environment segment. Information only carried in tags is not recovered.
    pub fn decode_name(name: &str) -> Option<Self> {
        let parts = NameParts::parse(name)?;
        let environment = match (parts.deployment, parts.pr) {
            (Some(d), None) => Environment::Deployment(d.to_string()),
            (None, Some(pr)) => Environment::PullRequest(pr.to_string()),
            _ => return None,
        };
        Some(Self {
            project_id: parts.project.to_string(),
            environment,
            commit_sha: parts.sha.map(str::to_string),
        })
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.environment {
            Environment::Deployment(d) => write!(f, "{}/{}", self.project_id, d)?,
            Environment::PullRequest(pr) => write!(f, "{}/pr-{}", self.project_id, pr)?,
        }
        if let Some(sha) = &self.commit_sha {
            write!(f, "@{sha}")?;
        }
        Ok(())
    }
}

/// The three list granularities: a whole project, one deployment, one PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantFilter {
    Project { project_id: String },
    Deployment { project_id: String, deployment: String },
    PullRequest { project_id: String, pr: String },
}

impl TenantFilter {
    pub fn project(project_id: &str) -> Self {
        Self::Project {
            project_id: project_id.to_string(),
        }
    }

    pub fn deployment(project_id: &str, deployment: &str) -> Self {
        Self::Deployment {
            project_id: project_id.to_string(),
            deployment: deployment.to_string(),
        }
    }

    pub fn pull_request(project_id: &str, pr: &str) -> Self {
        Self::PullRequest {
            project_id: project_id.to_string(),
            pr: pr.to_string(),
        }
    }

    pub fn project_id(&self) -> &str {
        match self {
            Self::Project { project_id }
            | Self::Deployment { project_id, .. }
            | Self::PullRequest { project_id, .. } => project_id,
        }
    }

    /// Rejects empty or malformed components before any list call runs.
    pub fn validate(&self) -> StratusResult<()> {
        validate_ident("project id", self.project_id())?;
        match self {
            Self::Project { .. } => Ok(()),
            Self::Deployment { deployment, .. } => validate_ident("deployment", deployment),
            Self::PullRequest { pr, .. } => validate_ident("pull request", pr),
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        NameParts::parse(name).is_some_and(|parts| self.matches_parts(&parts))
    }

    pub fn matches_tags(&self, tags: &[Tag]) -> bool {
        NameParts::from_tags(tags).is_some_and(|parts| self.matches_parts(&parts))
    }

    fn matches_parts(&self, parts: &NameParts<'_>) -> bool {
        if parts.project != self.project_id() {
            return false;
        }
        match self {
            Self::Project { .. } => true,
            Self::Deployment { deployment, .. } => parts.deployment == Some(deployment.as_str()),
            Self::PullRequest { pr, .. } => parts.pr == Some(pr.as_str()),
        }
    }
}

/// Whether a name or ARN belongs to a Stratus-created resource at all.
pub fn is_system_resource(name_or_arn: &str) -> bool {
    NameParts::parse(name_or_arn).is_some()
}

/// Strip the ARN path and any `:<revision>` suffix, leaving the bare name.
pub fn bare_name(name_or_arn: &str) -> &str {
    let name = name_or_arn.rsplit('/').next().unwrap_or(name_or_arn);
    match name.rsplit_once(':') {
        Some((head, rev)) if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => name,
    }
}

/// Decoded segments of a Stratus name, borrowed from the input.
#[derive(Debug, Default)]
struct NameParts<'a> {
    project: &'a str,
    deployment: Option<&'a str>,
    pr: Option<&'a str>,
    sha: Option<&'a str>,
}

impl<'a> NameParts<'a> {
    fn parse(name_or_arn: &'a str) -> Option<Self> {
        let name = bare_name(name_or_arn);
        let rest = name.strip_prefix(SYSTEM_PREFIX)?.strip_prefix('-')?;
        let mut segments = rest.split(DELIM);

        let project = segments.next()?.strip_prefix(PROJECT_SEGMENT)?;
        if project.is_empty() {
            return None;
        }

        let mut parts = NameParts {
            project,
            ..Default::default()
        };
        for segment in segments {
            if let Some(d) = segment.strip_prefix(DEPLOYMENT_SEGMENT) {
                parts.deployment.get_or_insert(d);
            } else if let Some(pr) = segment.strip_prefix(PR_SEGMENT) {
                parts.pr.get_or_insert(pr);
            } else if let Some(sha) = segment.strip_prefix(SHA_SEGMENT) {
                parts.sha.get_or_insert(sha);
            }
        }
        Some(parts)
    }

    fn from_tags(tags: &'a [Tag]) -> Option<Self> {
        let find = |key: &str| {
            tags.iter()
                .find(|t| t.key == key)
                .map(|t| t.value.as_str())
        };
        Some(NameParts {
            project: find(PROJECT_TAG)?,
            deployment: find(DEPLOYMENT_TAG),
            pr: find(PR_TAG),
            sha: find(SHA_TAG),
        })
    }
}

fn validate_ident(what: &str, value: &str) -> StratusResult<()> {
    if value.is_empty() {
        return Err(StratusError::InvalidKey(format!("{what} is empty")));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StratusError::InvalidKey(format!(
            "{what} {value:?} may only contain ASCII letters, digits, '-' and '_'"
        )));
    }
    if value.contains(DELIM) || value.starts_with('-') || value.ends_with('-') {
        return Err(StratusError::InvalidKey(format!(
            "{what} {value:?} may not contain '{DELIM}' or start/end with '-'"
        )));
    }
    Ok(())
}
