//! Centralized configuration constants for binfetch.
//!
//! Tunables for the transport, the CDN downloader, the release APIs and the
//! install layout, plus the environment variables that override them.

use std::path::PathBuf;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_AGENT: &'static str = concat!("binfetch/", env!("CARGO_PKG_VERSION"));
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
    pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
    pub const BACKOFF_FACTOR: f64 = 2.0;
    pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(1);
    pub const RATE_LIMIT_THROTTLE: Duration = Duration::from_millis(500);
    pub const CIRCUIT_BREAKER_THRESHOLD: u32 = 5;
    pub const CIRCUIT_BREAKER_TIMEOUT: Duration = Duration::from_secs(60);
    pub const CDN_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const GITHUB_API_VERSION: &'static str = "2022-11-28";
    pub const GITLAB_API_BASE: &'static str = "https://gitlab.com/api/v4";
    pub const KUBERNETES_CDN_HOST: &'static str = "dl.k8s.io";
    pub const KUBERNETES_STABLE_URL: &'static str = "https://dl.k8s.io/release/stable.txt";
}

/// Environment variables read at the edges.
pub struct EnvConfig;

impl EnvConfig {
    pub const GITHUB_TOKEN: &'static str = "GITHUB_TOKEN";
    pub const GITLAB_TOKEN: &'static str = "GITLAB_TOKEN";
    pub const GITLAB_API_URL: &'static str = "GITLAB_API_URL";

    /// Read a variable, treating empty values as unset.
    pub fn var(name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Install layout defaults.
pub struct InstallConfig;

impl InstallConfig {
    pub const VERSIONS_DIR_NAME: &'static str = "versions";
    pub const EXTRACT_DIR_PREFIX: &'static str = ".binfetch-extract-";

    /// `~/.local/bin`, or the current directory when no home is known.
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".local").join("bin"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
