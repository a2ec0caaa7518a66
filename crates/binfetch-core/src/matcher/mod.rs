//! Asset resolution: picking the right release asset for a platform.
//!
//! This module provides:
//! - [`MatchingStrategy`] and [`MatchingConfig`], the declarative inputs
//! - [`AssetMatcher`], which resolves a candidate list to an asset or a CDN URL
//! - Flexible scoring against the full cross-platform alias universe
//! - Preset configurations for well-known tools

mod engine;
mod presets;
mod scoring;

pub use engine::{AssetMatcher, Resolution};
pub use presets::{preset, preset_names};

use crate::cdn::VersionFormat;
use crate::error::{BinfetchError, Result};
use crate::platform::{default_arch_aliases, default_os_aliases, AliasTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How assets are matched against the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchingStrategy {
    /// Fixed `Title(os)_arch` substring search.
    Standard,
    /// Scored fuzzy matching.
    #[default]
    Flexible,
    /// User-supplied regex patterns.
    Custom,
    /// Construct a CDN URL and ignore the asset list.
    Cdn,
    /// Flexible first, CDN on failure.
    Hybrid,
}

impl MatchingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingStrategy::Standard => "standard",
            MatchingStrategy::Flexible => "flexible",
            MatchingStrategy::Custom => "custom",
            MatchingStrategy::Cdn => "cdn",
            MatchingStrategy::Hybrid => "hybrid",
        }
    }

    /// Whether the strategy may build a CDN URL.
    pub fn uses_cdn(&self) -> bool {
        matches!(self, MatchingStrategy::Cdn | MatchingStrategy::Hybrid)
    }
}

impl fmt::Display for MatchingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchingStrategy {
    type Err = BinfetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(MatchingStrategy::Standard),
            "flexible" => Ok(MatchingStrategy::Flexible),
            "custom" => Ok(MatchingStrategy::Custom),
            "cdn" => Ok(MatchingStrategy::Cdn),
            "hybrid" => Ok(MatchingStrategy::Hybrid),
            other => Err(BinfetchError::Config {
                message: format!(
                    "unknown matching strategy '{}' (expected standard, flexible, custom, cdn or hybrid)",
                    other
                ),
            }),
        }
    }
}

/// Hints for the archive extractor. The matcher never reads these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionHint {
    /// Leading path components to drop from every archive entry.
    pub strip_components: usize,
    /// Path of the binary inside the archive; `{os}` and `{arch}` are expanded.
    pub binary_path: Option<String>,
}

/// Declarative description of how to find a platform's asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub strategy: MatchingStrategy,
    /// Regex patterns with `{OS}`, `{ARCH}` and `{PROJECT}` placeholders.
    pub custom_patterns: Vec<String>,
    /// The asset is the executable itself rather than an archive.
    pub is_direct_binary: bool,
    pub project_name: String,
    pub architecture_aliases: AliasTable,
    pub os_aliases: AliasTable,
    pub file_extensions: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub priority_patterns: Vec<String>,
    pub cdn_base_url: String,
    pub cdn_pattern: String,
    /// `as-is`, `with-v` or `without-v`. Empty means as-is.
    pub cdn_version_format: String,
    pub cdn_arch_mapping: BTreeMap<String, String>,
    /// Plain-text endpoint that returns the latest version.
    pub cdn_version_url: Option<String>,
    pub extraction: Option<ExtractionHint>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategy: MatchingStrategy::Flexible,
            custom_patterns: Vec::new(),
            is_direct_binary: false,
            project_name: String::new(),
            architecture_aliases: default_arch_aliases(),
            os_aliases: default_os_aliases(),
            file_extensions: vec![
                ".tar.gz".into(),
                ".zip".into(),
                ".tgz".into(),
                ".tar.bz2".into(),
            ],
            exclude_patterns: vec![
                "airgap".into(),
                r"\.asc$".into(),
                r"\.sig$".into(),
                r"\.sha256$".into(),
                r"\.sha512$".into(),
                r"\.md5$".into(),
            ],
            priority_patterns: Vec::new(),
            cdn_base_url: String::new(),
            cdn_pattern: String::new(),
            cdn_version_format: String::new(),
            cdn_arch_mapping: BTreeMap::new(),
            cdn_version_url: None,
            extraction: None,
        }
    }
}

impl MatchingConfig {
    pub fn with_strategy(mut self, strategy: MatchingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_cdn(mut self, base_url: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.cdn_base_url = base_url.into();
        self.cdn_pattern = pattern.into();
        self
    }

    /// Load a config from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MatchingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the CDN invariants for `cdn` and `hybrid` configs.
    pub fn validate(&self) -> Result<()> {
        if !self.strategy.uses_cdn() {
            return Ok(());
        }

        let invalid = |message: &str| BinfetchError::InvalidCdnConfig {
            message: message.to_string(),
        };

        if self.cdn_base_url.trim().is_empty() {
            return Err(invalid("CDN strategy requires a base URL"));
        }
        if self.cdn_pattern.trim().is_empty() {
            return Err(invalid("CDN strategy requires a path pattern"));
        }
        if !self.cdn_pattern.contains("{version}") {
            return Err(invalid("CDN pattern must contain {version} placeholder"));
        }
        if !self.is_direct_binary {
            if !self.cdn_pattern.contains("{os}") {
                return Err(invalid(
                    "CDN pattern for archived binaries must contain {os} placeholder",
                ));
            }
            if !self.cdn_pattern.contains("{arch}") {
                return Err(invalid(
                    "CDN pattern for archived binaries must contain {arch} placeholder",
                ));
            }
        }
        if !self.cdn_version_format.is_empty()
            && VersionFormat::parse_strict(&self.cdn_version_format).is_none()
        {
            return Err(BinfetchError::InvalidCdnConfig {
                message: format!(
                    "CDN version format must be one of as-is, with-v, without-v, got: {}",
                    self.cdn_version_format
                ),
            });
        }

        Ok(())
    }
}
