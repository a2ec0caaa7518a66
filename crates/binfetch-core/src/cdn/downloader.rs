//! Downloads straight from a CDN, bypassing release asset lists.

use super::CdnUrlBuilder;
use crate::config::NetworkConfig;
use crate::error::{BinfetchError, Result};
use crate::matcher::MatchingConfig;
use crate::network::{extract_domain, DownloadManager, ResilientClient};
use crate::platform::Platform;
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves and downloads CDN artifacts for one platform.
#[derive(Clone)]
pub struct CdnDownloader {
    builder: CdnUrlBuilder,
    os: String,
    arch: String,
    version_url: Option<String>,
    client: Arc<ResilientClient>,
    downloads: DownloadManager,
}

impl CdnDownloader {
    /// Downloader for the running platform.
    pub fn new(config: &MatchingConfig, client: Arc<ResilientClient>) -> Result<Self> {
        Self::for_platform(config, &Platform::current(), client)
    }

    pub fn for_platform(
        config: &MatchingConfig,
        platform: &Platform,
        client: Arc<ResilientClient>,
    ) -> Result<Self> {
        config.validate()?;
        let builder = CdnUrlBuilder::from_config(config)?;
        let (os, arch) = CdnUrlBuilder::platform_names(config, platform);
        Ok(Self {
            builder,
            os,
            arch,
            version_url: config.cdn_version_url.clone(),
            downloads: DownloadManager::new(client.clone()),
            client,
        })
    }

    /// Override the endpoint used by [`try_discover_latest_version`](Self::try_discover_latest_version).
    pub fn with_version_url(mut self, url: impl Into<String>) -> Self {
        self.version_url = Some(url.into());
        self
    }

    pub fn builder(&self) -> &CdnUrlBuilder {
        &self.builder
    }

    /// URL of `version` for this downloader's platform.
    pub fn url_for(&self, version: &str) -> String {
        self.builder.construct_url(version, &self.os, &self.arch)
    }

    /// Download `version` to `destination`, returning the bytes written.
    pub async fn download_to(&self, version: &str, destination: &Path) -> Result<u64> {
        let url = self.url_for(version);
        info!("Downloading {} from CDN", url);

        let response = self
            .client
            .get_with_timeout(&url, &[], self.downloads.timeout())
            .await?;
        if response.status() != StatusCode::OK {
            return Err(BinfetchError::CdnDownloadFailed {
                url,
                status_code: response.status().as_u16(),
            });
        }

        self.downloads.save_response(response, destination).await
    }

    /// Ask the provider for its latest version.
    ///
    /// Uses the configured version endpoint, or the Kubernetes `stable.txt`
    /// when the base URL is on `dl.k8s.io`. Other CDNs are unsupported.
    pub async fn try_discover_latest_version(&self) -> Result<String> {
        let endpoint = self.version_endpoint().ok_or_else(|| {
            BinfetchError::VersionDiscoveryUnsupported {
                base_url: self.builder.base_url().to_string(),
            }
        })?;

        debug!("Discovering latest version from {}", endpoint);
        let response = self.client.get(&endpoint).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BinfetchError::VersionDiscoveryFailed {
                message: format!("{} returned {}", endpoint, status),
            });
        }

        let body = response.text().await?;
        let version = body.trim();
        if version.is_empty() || version.contains(char::is_whitespace) {
            return Err(BinfetchError::VersionDiscoveryFailed {
                message: format!("{} returned an unexpected body: {:?}", endpoint, body),
            });
        }

        info!("Latest version from CDN: {}", version);
        Ok(version.to_string())
    }

    fn version_endpoint(&self) -> Option<String> {
        if let Some(url) = &self.version_url {
            return Some(url.clone());
        }
        (extract_domain(self.builder.base_url()) == NetworkConfig::KUBERNETES_CDN_HOST)
            .then(|| NetworkConfig::KUBERNETES_STABLE_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{preset, MatchingStrategy};
    use crate::network::TransportConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    fn client() -> Arc<ResilientClient> {
        let config = TransportConfig::new()
            .with_max_retries(1)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5));
        Arc::new(ResilientClient::new(config).unwrap())
    }

    fn cdn_config(base_url: &str) -> MatchingConfig {
        MatchingConfig::default()
            .with_strategy(MatchingStrategy::Cdn)
            .with_cdn(base_url, "{version}/tool-{os}-{arch}.tar.gz")
    }

    #[test]
    fn test_helm_url_keeps_amd64() {
        let config = preset("helm").unwrap();
        let downloader =
            CdnDownloader::for_platform(&config, &Platform::new("linux", "x86_64"), client())
                .unwrap();
        assert_eq!(
            downloader.url_for("3.18.3"),
            "https://get.helm.sh/helm-v3.18.3-linux-amd64.tar.gz"
        );
    }

    #[test]
    fn test_kubectl_url() {
        let config = preset("kubectl").unwrap();
        let downloader =
            CdnDownloader::for_platform(&config, &Platform::new("linux", "arm64"), client())
                .unwrap();
        let url = downloader.url_for("v1.30.1");
        assert!(url.starts_with("https://dl.k8s.io/release/v1.30.1/bin/linux/arm64/kubectl"));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = MatchingConfig::default().with_strategy(MatchingStrategy::Cdn);
        assert!(matches!(
            CdnDownloader::new(&config, client()),
            Err(BinfetchError::InvalidCdnConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_download_to_writes_artifact() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/1.0.0/tool-linux-x86_64.tar.gz")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;

        let config = cdn_config(&format!("{}/", server.url()));
        let downloader =
            CdnDownloader::for_platform(&config, &Platform::new("linux", "amd64"), client())
                .unwrap();
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tool.tar.gz");

        let bytes = downloader.download_to("1.0.0", &dest).await.unwrap();
        mock.assert_async().await;
        assert_eq!(bytes, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_download_to_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/2.0.0/tool-linux-x86_64.tar.gz")
            .with_status(403)
            .create_async()
            .await;

        let config = cdn_config(&format!("{}/", server.url()));
        let downloader =
            CdnDownloader::for_platform(&config, &Platform::new("linux", "amd64"), client())
                .unwrap();
        let temp = TempDir::new().unwrap();
        let err = downloader
            .download_to("2.0.0", &temp.path().join("tool.tar.gz"))
            .await
            .unwrap_err();

        match err {
            BinfetchError::CdnDownloadFailed { status_code, .. } => assert_eq!(status_code, 403),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_discover_latest_version() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/stable.txt")
            .with_status(200)
            .with_body("v1.31.0\n")
            .create_async()
            .await;

        let config = cdn_config(&format!("{}/", server.url()));
        let downloader = CdnDownloader::new(&config, client())
            .unwrap()
            .with_version_url(format!("{}/stable.txt", server.url()));

        assert_eq!(downloader.try_discover_latest_version().await.unwrap(), "v1.31.0");
    }

    #[tokio::test]
    async fn test_discover_unsupported_without_endpoint() {
        let downloader = CdnDownloader::new(&cdn_config("https://cdn.example.com/"), client())
            .unwrap();
        assert!(matches!(
            downloader.try_discover_latest_version().await,
            Err(BinfetchError::VersionDiscoveryUnsupported { .. })
        ));
    }

    #[test]
    fn test_kubernetes_endpoint_is_implicit() {
        let mut config = preset("kubectl").unwrap();
        config.cdn_version_url = None;
        let downloader = CdnDownloader::new(&config, client()).unwrap();
        assert_eq!(
            downloader.version_endpoint().as_deref(),
            Some(NetworkConfig::KUBERNETES_STABLE_URL)
        );
    }
}
