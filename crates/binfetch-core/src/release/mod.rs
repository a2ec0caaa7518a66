//! Release-hosting API clients and the update workflow built on them.
//!
//! A [`ReleaseSource`] yields the latest version and its assets; the
//! [`BinaryUpdater`] feeds those to the matcher and downloads the winner.

mod github;
mod gitlab;
mod models;
mod updater;

pub use github::GitHubClient;
pub use gitlab::GitLabClient;
pub use models::{GitHubAsset, GitHubRelease, GitLabAssets, GitLabLink, GitLabRelease};
pub use updater::{BinaryUpdater, DownloadTarget, DownloadedArtifact};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
}

/// Provider-neutral view of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub version: String,
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    /// Asset names in API order.
    pub fn asset_names(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.download_url.as_str())
    }
}

/// Somewhere the latest release of a project can be looked up.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Human-readable name of the project, for logs and errors.
    fn describe(&self) -> String;

    async fn latest_release(&self) -> Result<ReleaseInfo>;
}

#[async_trait]
impl<T: ReleaseSource + ?Sized> ReleaseSource for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn latest_release(&self) -> Result<ReleaseInfo> {
        (**self).latest_release().await
    }
}
