use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::version::is_newer;

pub const DEFAULT_REGISTRY_BASE: &str = "https://api.github.com/repos";

const PLACEHOLDER_REPOSITORY: &str = "username/repository";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub size: Option<u64>,
    /// Registry-provided digest such as `sha256:<hex>`.
    pub digest: Option<String>,
}

/// The latest published release as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag: String,
    pub body: String,
    pub html_url: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    digest: Option<String>,
}

#[derive(Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

impl From<GitHubRelease> for ReleaseInfo {
    fn from(release: GitHubRelease) -> Self {
        Self {
            tag: release.tag_name,
            body: release.body.unwrap_or_default(),
            html_url: release.html_url,
            assets: release
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                    size: asset.size,
                    digest: asset.digest,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckFailure {
    #[error("update repository is not configured (got '{repo_id}')")]
    RepositoryNotConfigured { repo_id: String },
    #[error("failed to check for app update: {0}")]
    Request(#[source] reqwest::Error),
    #[error("app update check failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse app update response: {0}")]
    Parse(#[source] reqwest::Error),
}

/// Something that can answer "what is the latest release of `repo_id`".
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn fetch_latest_release(&self, repo_id: &str) -> Result<ReleaseInfo, CheckFailure>;
}

/// Client for a GitHub-compatible release registry.
#[derive(Debug, Clone)]
pub struct ReleaseRegistry {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReleaseRegistry {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_REGISTRY_BASE.to_string(),
            timeout: LOOKUP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn latest_release_url(&self, repo_id: &str) -> String {
        format!(
            "{}/{repo_id}/releases/latest",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ReleaseSource for ReleaseRegistry {
    async fn fetch_latest_release(&self, repo_id: &str) -> Result<ReleaseInfo, CheckFailure> {
        let repo_id = repo_id.trim();
        if !is_configured_repository(repo_id) {
            return Err(CheckFailure::RepositoryNotConfigured {
                repo_id: repo_id.to_string(),
            });
        }

        let url = self.latest_release_url(repo_id);
        debug!("Fetching latest release from {url}");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(CheckFailure::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(CheckFailure::HttpStatus {
                status,
                body_snippet,
            });
        }

        let release: GitHubRelease = response.json().await.map_err(CheckFailure::Parse)?;
        Ok(release.into())
    }
}

/// A release newer than the running build.
#[derive(Debug, Clone)]
pub struct AvailableUpdate {
    pub current_version: String,
    pub latest_version: String,
    pub release: ReleaseInfo,
}

impl AvailableUpdate {
    #[must_use]
    pub fn release_url(&self) -> Option<&str> {
        self.release.html_url.as_deref()
    }

    #[must_use]
    pub fn release_notes(&self) -> &str {
        &self.release.body
    }
}

#[derive(Debug)]
pub enum UpdateCheck {
    Available(AvailableUpdate),
    UpToDate { latest_version: String },
    Failed(CheckFailure),
}

impl UpdateCheck {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Ask `source` for the latest release of `repo_id` and compare it against
/// `current_version`.
///
/// Lookup failures are reported as [`UpdateCheck::Failed`] rather than an
/// error so callers can decide whether to surface them.
pub async fn check_for_update(
    source: &dyn ReleaseSource,
    current_version: &str,
    repo_id: &str,
) -> UpdateCheck {
    let release = match source.fetch_latest_release(repo_id).await {
        Ok(release) => release,
        Err(error) => {
            warn!("Update check failed: {error}");
            return UpdateCheck::Failed(error);
        }
    };

    let latest = strip_tag_prefix(&release.tag).to_string();
    let current = strip_tag_prefix(current_version).to_string();

    if is_newer(&current, &latest) {
        info!("Update available: {current} -> {latest}");
        UpdateCheck::Available(AvailableUpdate {
            current_version: current,
            latest_version: latest,
            release,
        })
    } else {
        debug!("No update available (current {current}, latest {latest})");
        UpdateCheck::UpToDate {
            latest_version: latest,
        }
    }
}

/// `owner/name` with both halves present and not the template placeholder.
#[must_use]
pub fn is_configured_repository(repo_id: &str) -> bool {
    let repo_id = repo_id.trim();
    if repo_id.is_empty() || repo_id == PLACEHOLDER_REPOSITORY {
        return false;
    }
    matches!(
        repo_id.split_once('/'),
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/')
    )
}

fn strip_tag_prefix(tag: &str) -> &str {
    let stripped = tag.trim_start_matches(|c: char| !c.is_ascii_digit());
    if stripped.is_empty() { tag } else { stripped }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
