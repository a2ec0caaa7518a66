//! GitHub releases API client.

use super::models::GitHubRelease;
use super::{ReleaseInfo, ReleaseSource};
use crate::config::{EnvConfig, NetworkConfig};
use crate::error::{BinfetchError, Result};
use crate::network::ResilientClient;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{debug, info};

/// Latest-release lookups for one `owner/repo`.
pub struct GitHubClient {
    http: Arc<ResilientClient>,
    repo: String,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(repo: impl Into<String>, http: Arc<ResilientClient>) -> Result<Self> {
        let repo = repo.into();
        validate_repo(&repo)?;
        Ok(Self {
            http,
            repo,
            api_base: NetworkConfig::GITHUB_API_BASE.to_string(),
            token: None,
        })
    }

    /// Client with the token from `GITHUB_TOKEN`, if set.
    pub fn from_env(repo: impl Into<String>, http: Arc<ResilientClient>) -> Result<Self> {
        let client = Self::new(repo, http)?;
        Ok(match EnvConfig::var(EnvConfig::GITHUB_TOKEN) {
            Some(token) => client.with_token(token),
            None => client,
        })
    }

    /// Point at a GitHub Enterprise or test server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Fetch `/repos/{repo}/releases/latest`.
    pub async fn get_latest_release(&self) -> Result<GitHubRelease> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, self.repo);
        debug!("Fetching latest GitHub release from {}", url);

        let response = self.http.get_with_headers(&url, &self.headers()).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(BinfetchError::ReleaseApi {
                provider: "GitHub".into(),
                message: format!("no published release found for {}", self.repo),
                status_code: Some(status.as_u16()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BinfetchError::ReleaseApi {
                provider: "GitHub".into(),
                message: format!("GitHub API returned {}: {}", status, body.trim()),
                status_code: Some(status.as_u16()),
            });
        }

        let release: GitHubRelease = response.json().await.map_err(|e| BinfetchError::Json {
            message: format!("Failed to parse GitHub release: {}", e),
            source: None,
        })?;

        info!(
            "Latest release of {} is {} with {} assets",
            self.repo,
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_string(), "application/vnd.github+json".to_string()),
            (
                "X-GitHub-Api-Version".to_string(),
                NetworkConfig::GITHUB_API_VERSION.to_string(),
            ),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        headers
    }
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    fn describe(&self) -> String {
        format!("github:{}", self.repo)
    }

    async fn latest_release(&self) -> Result<ReleaseInfo> {
        Ok(self.get_latest_release().await?.into())
    }
}

fn validate_repo(repo: &str) -> Result<()> {
    let mut parts = repo.split('/');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.trim().is_empty() && !name.trim().is_empty()
    );
    if valid {
        Ok(())
    } else {
        Err(BinfetchError::InvalidRepository {
            repo: repo.to_string(),
        })
    }
}
