//! GitLab releases API client.

use super::models::GitLabRelease;
use super::{ReleaseInfo, ReleaseSource};
use crate::config::{EnvConfig, NetworkConfig};
use crate::error::{BinfetchError, Result};
use crate::network::ResilientClient;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{debug, info};

/// Latest-release lookups for one numeric GitLab project.
pub struct GitLabClient {
    http: Arc<ResilientClient>,
    project_id: i64,
    api_base: String,
    token: Option<String>,
    headers: Vec<(String, String)>,
}

impl GitLabClient {
    pub fn new(project_id: i64, http: Arc<ResilientClient>) -> Result<Self> {
        if project_id <= 0 {
            return Err(BinfetchError::InvalidProjectId { project_id });
        }
        Ok(Self {
            http,
            project_id,
            api_base: NetworkConfig::GITLAB_API_BASE.to_string(),
            token: None,
            headers: Vec::new(),
        })
    }

    /// Client configured from `GITLAB_TOKEN` and `GITLAB_API_URL`.
    pub fn from_env(project_id: i64, http: Arc<ResilientClient>) -> Result<Self> {
        let mut client = Self::new(project_id, http)?;
        if let Some(api_base) = EnvConfig::var(EnvConfig::GITLAB_API_URL) {
            client = client.with_api_base(api_base);
        }
        if let Some(token) = EnvConfig::var(EnvConfig::GITLAB_TOKEN) {
            client = client.with_token(token);
        }
        Ok(client)
    }

    /// Self-hosted instance base, e.g. `https://gitlab.example.com/api/v4`.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Extra header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    /// All releases, newest first by `released_at`.
    pub async fn get_releases(&self) -> Result<Vec<GitLabRelease>> {
        let url = format!("{}/projects/{}/releases", self.api_base, self.project_id);
        debug!("Fetching GitLab releases from {}", url);

        let response = self.http.get_with_headers(&url, &self.request_headers()).await?;
        let status = response.status();
        if !status.is_success() {
            let message = match status {
                StatusCode::NOT_FOUND => format!(
                    "project {} not found or has no public releases",
                    self.project_id
                ),
                StatusCode::FORBIDDEN => format!(
                    "access to project {} is forbidden; check the token's read_api scope",
                    self.project_id
                ),
                StatusCode::UNAUTHORIZED => {
                    "authentication failed; check GITLAB_TOKEN".to_string()
                }
                other => {
                    let body = response.text().await.unwrap_or_default();
                    format!("GitLab API returned {}: {}", other, body.trim())
                }
            };
            return Err(BinfetchError::ReleaseApi {
                provider: "GitLab".into(),
                message,
                status_code: Some(status.as_u16()),
            });
        }

        let mut releases: Vec<GitLabRelease> =
            response.json().await.map_err(|e| BinfetchError::Json {
                message: format!("Failed to parse GitLab releases: {}", e),
                source: None,
            })?;
        // Stable sort keeps API order among equal or missing dates.
        releases.sort_by(|a, b| b.released_at.cmp(&a.released_at));
        Ok(releases)
    }

    pub async fn get_latest_release(&self) -> Result<GitLabRelease> {
        let release = self
            .get_releases()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BinfetchError::NoReleases {
                project: format!("GitLab project {}", self.project_id),
            })?;
        info!(
            "Latest release of GitLab project {} is {} with {} links",
            self.project_id,
            release.tag_name,
            release.assets.links.len()
        );
        Ok(release)
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        headers
    }
}

#[async_trait]
impl ReleaseSource for GitLabClient {
    fn describe(&self) -> String {
        format!("gitlab:{}", self.project_id)
    }

    async fn latest_release(&self) -> Result<ReleaseInfo> {
        Ok(self.get_latest_release().await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::TransportConfig;
    use std::time::Duration;

    fn http() -> Arc<ResilientClient> {
        let config = TransportConfig::new()
            .with_max_retries(0)
            .with_initial_delay(Duration::from_millis(1));
        Arc::new(ResilientClient::new(config).unwrap())
    }

    #[test]
    fn test_project_id_must_be_positive() {
        assert!(matches!(
            GitLabClient::new(0, http()),
            Err(BinfetchError::InvalidProjectId { project_id: 0 })
        ));
        assert!(GitLabClient::new(-4, http()).is_err());
        assert!(GitLabClient::new(42, http()).is_ok());
    }

    #[tokio::test]
    async fn test_latest_release_is_newest() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/projects/42/releases")
            .match_header("authorization", "Bearer glpat")
            .match_header("x-custom", "yes")
            .with_status(200)
            .with_body(
                r#"[
                    {"tag_name": "v1.0.0", "released_at": "2024-01-01T00:00:00Z", "assets": {"links": []}},
                    {"tag_name": "v1.1.0", "released_at": "2024-03-01T00:00:00Z",
                     "assets": {"links": [{"name": "tool-linux-amd64", "url": "https://x/tool-linux-amd64"}]}}
                ]"#,
            )
            .create_async()
            .await;

        let client = GitLabClient::new(42, http())
            .unwrap()
            .with_api_base(format!("{}/", server.url()))
            .with_token("glpat")
            .with_header("X-Custom", "yes");
        let release = client.latest_release().await.unwrap();

        mock.assert_async().await;
        assert_eq!(release.version, "v1.1.0");
        assert_eq!(release.asset_names(), vec!["tool-linux-amd64"]);
    }

    #[tokio::test]
    async fn test_empty_release_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/projects/7/releases")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = GitLabClient::new(7, http()).unwrap().with_api_base(server.url());
        assert!(matches!(
            client.latest_release().await,
            Err(BinfetchError::NoReleases { .. })
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/projects/9/releases")
            .with_status(401)
            .create_async()
            .await;

        let client = GitLabClient::new(9, http()).unwrap().with_api_base(server.url());
        let err = client.latest_release().await.unwrap_err();
        assert!(err.to_string().contains("GITLAB_TOKEN"));
    }
}
