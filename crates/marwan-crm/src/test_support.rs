use std::sync::Arc;

use async_trait::async_trait;
use marwan_update::{CheckFailure, ReleaseAsset, ReleaseInfo, ReleaseSource};

/// Serves one canned release, or a lookup failure when there is none.
pub(crate) struct FixedSource {
    release: Option<ReleaseInfo>,
}

impl FixedSource {
    pub(crate) fn new(release: Option<ReleaseInfo>) -> Arc<Self> {
        Arc::new(Self { release })
    }
}

#[async_trait]
impl ReleaseSource for FixedSource {
    async fn fetch_latest_release(&self, repo_id: &str) -> Result<ReleaseInfo, CheckFailure> {
        self.release
            .clone()
            .ok_or_else(|| CheckFailure::RepositoryNotConfigured {
                repo_id: repo_id.to_string(),
            })
    }
}

pub(crate) fn release(tag: &str, assets: &[(&str, String)]) -> ReleaseInfo {
    ReleaseInfo {
        tag: tag.to_string(),
        body: "notes".to_string(),
        html_url: Some("https://example.com/releases/latest".to_string()),
        assets: assets
            .iter()
            .map(|(name, url)| ReleaseAsset {
                name: (*name).to_string(),
                download_url: url.clone(),
                size: None,
                digest: None,
            })
            .collect(),
    }
}
