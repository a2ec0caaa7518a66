//! CDN URL construction and downloads.
//!
//! A CDN target is described by a base URL and a path template with
//! `{version}`, `{os}` and `{arch}` placeholders. Providers disagree on
//! version prefixes and architecture names, so both are configurable.

mod downloader;

pub use downloader::CdnDownloader;

use crate::error::{BinfetchError, Result};
use crate::matcher::MatchingConfig;
use crate::platform::{aliases_for_arch, aliases_for_os, canonical_arch, Platform};
use std::collections::BTreeMap;
use std::fmt;

/// How a version string is written into a CDN path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionFormat {
    #[default]
    AsIs,
    WithV,
    WithoutV,
}

impl VersionFormat {
    /// Parse one of `as-is`, `with-v` or `without-v`.
    pub fn parse_strict(mode: &str) -> Option<Self> {
        match mode {
            "as-is" => Some(VersionFormat::AsIs),
            "with-v" => Some(VersionFormat::WithV),
            "without-v" => Some(VersionFormat::WithoutV),
            _ => None,
        }
    }

    /// Like [`parse_strict`](Self::parse_strict), but anything unrecognized is `AsIs`.
    pub fn parse_lenient(mode: &str) -> Self {
        Self::parse_strict(mode).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionFormat::AsIs => "as-is",
            VersionFormat::WithV => "with-v",
            VersionFormat::WithoutV => "without-v",
        }
    }

    pub fn apply(&self, version: &str) -> String {
        match self {
            VersionFormat::AsIs => version.to_string(),
            VersionFormat::WithV if version.starts_with('v') => version.to_string(),
            VersionFormat::WithV => format!("v{}", version),
            VersionFormat::WithoutV => version.strip_prefix('v').unwrap_or(version).to_string(),
        }
    }
}

impl fmt::Display for VersionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a version for a CDN path. Unknown modes leave it unchanged.
pub fn format_version(version: &str, mode: &str) -> String {
    VersionFormat::parse_lenient(mode).apply(version)
}

/// Render a CDN URL in one call.
pub fn construct_url(
    base_url: &str,
    template: &str,
    version: &str,
    os: &str,
    arch: &str,
    version_format: &str,
    arch_overrides: &BTreeMap<String, String>,
) -> String {
    CdnUrlBuilder::new(base_url, template)
        .with_version_format(VersionFormat::parse_lenient(version_format))
        .with_arch_mapping(arch_overrides.clone())
        .construct_url(version, os, arch)
}

/// Renders download URLs from a base URL and a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnUrlBuilder {
    base_url: String,
    pattern: String,
    version_format: VersionFormat,
    arch_mapping: BTreeMap<String, String>,
}

impl CdnUrlBuilder {
    pub fn new(base_url: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            pattern: pattern.into(),
            version_format: VersionFormat::AsIs,
            arch_mapping: BTreeMap::new(),
        }
    }

    /// Builder for a matching config's CDN fields.
    ///
    /// Only checks that a base URL and pattern are present; use
    /// [`MatchingConfig::validate`] for the full placeholder rules.
    pub fn from_config(config: &MatchingConfig) -> Result<Self> {
        if config.cdn_base_url.trim().is_empty() || config.cdn_pattern.trim().is_empty() {
            return Err(BinfetchError::InvalidCdnConfig {
                message: "CDN base URL and pattern are required".into(),
            });
        }
        Ok(Self::new(&config.cdn_base_url, &config.cdn_pattern)
            .with_version_format(VersionFormat::parse_lenient(&config.cdn_version_format))
            .with_arch_mapping(config.cdn_arch_mapping.clone()))
    }

    /// The OS and architecture names a CDN URL starts from: the first alias
    /// of each in the config's tables.
    pub fn platform_names(config: &MatchingConfig, platform: &Platform) -> (String, String) {
        let os = aliases_for_os(&config.os_aliases, &platform.os)
            .into_iter()
            .next()
            .unwrap_or_else(|| platform.os.clone());
        let arch = aliases_for_arch(&config.architecture_aliases, &platform.arch)
            .into_iter()
            .next()
            .unwrap_or_else(|| platform.arch.clone());
        (os, arch)
    }

    pub fn with_version_format(mut self, format: VersionFormat) -> Self {
        self.version_format = format;
        self
    }

    pub fn with_arch_mapping(mut self, mapping: BTreeMap<String, String>) -> Self {
        self.arch_mapping = mapping;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Architecture name as this CDN spells it.
    ///
    /// Overrides are looked up by the normalized raw name, then by the
    /// canonical name; without an override the canonical name is used.
    pub fn map_arch(&self, arch: &str) -> String {
        let normalized = arch.trim().to_lowercase();
        let canonical = canonical_arch(arch.trim());
        self.arch_mapping
            .get(&normalized)
            .or_else(|| self.arch_mapping.get(&canonical.to_lowercase()))
            .cloned()
            .unwrap_or(canonical)
    }

    pub fn construct_url(&self, version: &str, os: &str, arch: &str) -> String {
        self.render(Some(version), os, arch)
    }

    /// Render the URL; without a version the `{version}` placeholder is kept.
    pub fn render(&self, version: Option<&str>, os: &str, arch: &str) -> String {
        let mut path = self
            .pattern
            .replace("{os}", os)
            .replace("{arch}", &self.map_arch(arch));
        if let Some(version) = version {
            path = path.replace("{version}", &self.version_format.apply(version));
        }
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_version_modes() {
        assert_eq!(format_version("3.1.0", "with-v"), "v3.1.0");
        assert_eq!(format_version("v3.1.0", "with-v"), "v3.1.0");
        assert_eq!(format_version("v3.1.0", "without-v"), "3.1.0");
        assert_eq!(format_version("3.1.0", "without-v"), "3.1.0");
        assert_eq!(format_version("v3.1.0", "as-is"), "v3.1.0");
        assert_eq!(format_version("v3.1.0", "bogus"), "v3.1.0");
    }

    #[test]
    fn test_with_v_round_trip() {
        let url = construct_url(
            "https://cdn.example.com/",
            "{version}",
            "3.1.0",
            "linux",
            "amd64",
            "with-v",
            &BTreeMap::new(),
        );
        let version = url.trim_start_matches("https://cdn.example.com/");
        assert_eq!(version.strip_prefix('v'), Some("3.1.0"));
    }

    #[test]
    fn test_canonical_arch_fallback() {
        let builder = CdnUrlBuilder::new("https://cdn.example.com/", "tool-{os}-{arch}");
        assert_eq!(
            builder.construct_url("1.0.0", "linux", "amd64"),
            "https://cdn.example.com/tool-linux-x86_64"
        );
    }

    #[test]
    fn test_override_takes_precedence() {
        let overrides = BTreeMap::from([("amd64".to_string(), "amd64".to_string())]);
        let url = construct_url(
            "https://get.helm.sh/",
            "helm-{version}-{os}-{arch}.tar.gz",
            "3.18.3",
            "linux",
            "amd64",
            "with-v",
            &overrides,
        );
        assert_eq!(url, "https://get.helm.sh/helm-v3.18.3-linux-amd64.tar.gz");
        assert!(!url.contains("x86_64"));
    }

    #[test]
    fn test_override_by_canonical_name() {
        let overrides = BTreeMap::from([("x86_64".to_string(), "x64".to_string())]);
        let builder = CdnUrlBuilder::new("https://cdn.example.com/", "{arch}")
            .with_arch_mapping(overrides);
        assert_eq!(builder.map_arch("AMD64"), "x64");
    }

    #[test]
    fn test_missing_placeholders_are_ignored() {
        let builder = CdnUrlBuilder::new("https://cdn.example.com/", "static/tool");
        assert_eq!(
            builder.construct_url("1.0", "linux", "amd64"),
            "https://cdn.example.com/static/tool"
        );
    }

    #[test]
    fn test_render_without_version() {
        let builder = CdnUrlBuilder::new("https://cdn.example.com/", "{version}/{os}")
            .with_version_format(VersionFormat::WithV);
        assert_eq!(
            builder.render(None, "darwin", "arm64"),
            "https://cdn.example.com/{version}/darwin"
        );
    }

    #[test]
    fn test_from_config_requires_fields() {
        let config = MatchingConfig::default();
        assert!(matches!(
            CdnUrlBuilder::from_config(&config),
            Err(BinfetchError::InvalidCdnConfig { .. })
        ));
    }

    #[test]
    fn test_platform_names_use_first_alias() {
        let config = MatchingConfig::default();
        let (os, arch) =
            CdnUrlBuilder::platform_names(&config, &Platform::new("macos", "aarch64"));
        assert_eq!(os, "darwin");
        assert_eq!(arch, "arm64");
    }
}
