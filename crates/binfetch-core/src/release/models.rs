//! Wire models for the GitHub and GitLab release APIs.

use super::{ReleaseAsset, ReleaseInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GitHub release asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// GitHub release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl From<GitHubRelease> for ReleaseInfo {
    fn from(release: GitHubRelease) -> Self {
        Self {
            version: release.tag_name,
            assets: release
                .assets
                .into_iter()
                .map(|a| ReleaseAsset {
                    name: a.name,
                    download_url: a.download_url,
                })
                .collect(),
        }
    }
}

/// GitLab release asset link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabLink {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub direct_asset_url: Option<String>,
    #[serde(default)]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitLabAssets {
    #[serde(default)]
    pub links: Vec<GitLabLink>,
}

/// GitLab release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: GitLabAssets,
}

impl From<GitLabRelease> for ReleaseInfo {
    fn from(release: GitLabRelease) -> Self {
        Self {
            version: release.tag_name,
            assets: release
                .assets
                .links
                .into_iter()
                .map(|link| ReleaseAsset {
                    download_url: link.direct_asset_url.unwrap_or(link.url),
                    name: link.name,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_release_decodes() {
        let json = r#"{
            "tag_name": "v0.9.1",
            "name": "v0.9.1",
            "published_at": "2024-05-01T12:00:00Z",
            "prerelease": false,
            "html_url": "https://github.com/o/r/releases/tag/v0.9.1",
            "assets": [
                {"name": "tool_Linux_x86_64.tar.gz", "size": 10,
                 "browser_download_url": "https://github.com/o/r/releases/download/v0.9.1/tool_Linux_x86_64.tar.gz"}
            ]
        }"#;
        let release: GitHubRelease = serde_json::from_str(json).unwrap();
        let info = ReleaseInfo::from(release);
        assert_eq!(info.version, "v0.9.1");
        assert_eq!(info.asset_names(), vec!["tool_Linux_x86_64.tar.gz"]);
    }

    #[test]
    fn test_gitlab_release_prefers_direct_asset_url() {
        let json = r#"{
            "tag_name": "v2.0.0",
            "released_at": "2024-02-01T00:00:00.000Z",
            "assets": {"links": [
                {"name": "tool-linux-amd64", "url": "https://gitlab.com/x/-/raw",
                 "direct_asset_url": "https://gitlab.com/x/-/releases/v2.0.0/downloads/tool-linux-amd64"},
                {"name": "tool-darwin-arm64", "url": "https://gitlab.com/y"}
            ]}
        }"#;
        let release: GitLabRelease = serde_json::from_str(json).unwrap();
        let info = ReleaseInfo::from(release);
        assert_eq!(
            info.url_for("tool-linux-amd64"),
            Some("https://gitlab.com/x/-/releases/v2.0.0/downloads/tool-linux-amd64")
        );
        assert_eq!(info.url_for("tool-darwin-arm64"), Some("https://gitlab.com/y"));
    }
}
