//! Latest-release workflow: look up, resolve, download.

use super::ReleaseSource;
use crate::cdn::CdnDownloader;
use crate::error::{BinfetchError, Result};
use crate::matcher::{AssetMatcher, MatchingConfig, MatchingStrategy, Resolution};
use crate::network::{DownloadManager, ResilientClient};
use crate::platform::Platform;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// What to download for the latest release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTarget {
    pub version: String,
    pub url: String,
    /// File name the artifact is saved under.
    pub asset_name: String,
    /// The URL was built from the CDN template rather than taken from the release.
    pub via_cdn: bool,
}

/// A downloaded artifact on disk.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedArtifact {
    pub target: DownloadTarget,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Keeps one binary up to date from a release source.
pub struct BinaryUpdater<S: ReleaseSource> {
    source: S,
    config: MatchingConfig,
    platform: Platform,
    client: Arc<ResilientClient>,
    download_headers: Vec<(String, String)>,
}

impl<S: ReleaseSource> BinaryUpdater<S> {
    pub fn new(source: S, config: MatchingConfig, client: Arc<ResilientClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            platform: Platform::current(),
            client,
            download_headers: Vec::new(),
        })
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Header sent when downloading release assets (not CDN artifacts).
    pub fn with_download_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.download_headers.push((name.into(), value.into()));
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Work out the URL of the newest artifact for this platform.
    pub async fn resolve_latest(&self) -> Result<DownloadTarget> {
        if self.config.strategy == MatchingStrategy::Cdn {
            return self.resolve_from_cdn().await;
        }

        let release = self.source.latest_release().await?;
        let names = release.asset_names();
        let matcher = AssetMatcher::for_platform(self.config.clone(), self.platform.clone())
            .with_version(&release.version);

        let target = match matcher.resolve(&names)? {
            Resolution::Asset(name) => {
                let url = release.url_for(&name).ok_or_else(|| BinfetchError::ReleaseApi {
                    provider: self.source.describe(),
                    message: format!("asset {} has no download URL", name),
                    status_code: None,
                })?;
                DownloadTarget {
                    version: release.version.clone(),
                    url: url.to_string(),
                    asset_name: name,
                    via_cdn: false,
                }
            }
            Resolution::CdnUrl(url) => DownloadTarget {
                version: release.version.clone(),
                asset_name: file_name_of(&url),
                url,
                via_cdn: true,
            },
        };

        info!(
            "Resolved {} {} for {}: {}",
            self.source.describe(),
            target.version,
            self.platform,
            target.url
        );
        Ok(target)
    }

    /// Resolve and download the newest artifact into `directory`.
    pub async fn download_latest(&self, directory: &Path) -> Result<DownloadedArtifact> {
        let target = self.resolve_latest().await?;
        let file_name = safe_file_name(&target.asset_name).ok_or_else(|| {
            BinfetchError::ReleaseApi {
                provider: self.source.describe(),
                message: format!("asset name {:?} is not a usable file name", target.asset_name),
                status_code: None,
            }
        })?;
        let path = directory.join(file_name);

        let bytes = if target.via_cdn {
            self.cdn_downloader()?
                .download_to(&target.version, &path)
                .await?
        } else {
            DownloadManager::new(self.client.clone())
                .download(&target.url, &path, &self.download_headers)
                .await?
        };

        Ok(DownloadedArtifact {
            target,
            path,
            bytes,
        })
    }

    async fn resolve_from_cdn(&self) -> Result<DownloadTarget> {
        let downloader = self.cdn_downloader()?;
        let version = match downloader.try_discover_latest_version().await {
            Ok(version) => version,
            Err(e) => {
                warn!(
                    "CDN version discovery failed ({}), asking {} instead",
                    e,
                    self.source.describe()
                );
                self.source.latest_release().await?.version
            }
        };

        let url = downloader.url_for(&version);
        info!("Resolved {} {} from CDN: {}", self.source.describe(), version, url);
        Ok(DownloadTarget {
            asset_name: file_name_of(&url),
            version,
            url,
            via_cdn: true,
        })
    }

    fn cdn_downloader(&self) -> Result<CdnDownloader> {
        CdnDownloader::for_platform(&self.config, &self.platform, self.client.clone())
    }
}

/// Last normal component of an asset name, so it cannot leave the download directory.
fn safe_file_name(name: &str) -> Option<&OsStr> {
    match Path::new(name).components().next_back()? {
        Component::Normal(part) => Some(part),
        _ => None,
    }
}

fn file_name_of(url: &str) -> String {
    url.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(url)
        .to_string()
}
