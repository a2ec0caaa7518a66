//! Strategy dispatch for asset resolution.

use super::scoring::{compile_patterns, compile_patterns_exact, expand_placeholders, Scorer};
use super::{MatchingConfig, MatchingStrategy};
use crate::cdn::CdnUrlBuilder;
use crate::error::{BinfetchError, Result};
use crate::platform::{aliases_for_arch, aliases_for_os, Platform};
use std::fmt;
use tracing::{debug, info, warn};

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Name of the chosen asset; look it up in the release's name→URL map.
    Asset(String),
    /// Fully constructed CDN URL. Contains `{version}` when no version was known.
    CdnUrl(String),
}

impl Resolution {
    pub fn as_str(&self) -> &str {
        match self {
            Resolution::Asset(name) => name,
            Resolution::CdnUrl(url) => url,
        }
    }

    pub fn is_cdn(&self) -> bool {
        matches!(self, Resolution::CdnUrl(_))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a release's asset list to the asset (or CDN URL) for one platform.
///
/// Resolution is pure: the same config, platform, version and candidates
/// always produce the same answer.
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    config: MatchingConfig,
    platform: Platform,
    version: Option<String>,
}

impl AssetMatcher {
    /// Matcher for the running platform.
    pub fn new(config: MatchingConfig) -> Self {
        Self::for_platform(config, Platform::current())
    }

    pub fn for_platform(config: MatchingConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            version: None,
        }
    }

    /// Fill `{version}` in CDN URLs with a known version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Pick the best candidate for the platform.
    pub fn resolve<S: AsRef<str>>(&self, candidates: &[S]) -> Result<Resolution> {
        if candidates.is_empty() {
            return Err(BinfetchError::NoAssetsProvided);
        }

        if self.config.strategy.uses_cdn() {
            self.config.validate()?;
        }

        let assets = self.filter_excluded(candidates)?;
        debug!(
            "Resolving {} of {} assets for {} with {} strategy",
            assets.len(),
            candidates.len(),
            self.platform,
            self.config.strategy
        );

        match self.config.strategy {
            MatchingStrategy::Standard => self.match_standard(&assets).map(Resolution::Asset),
            MatchingStrategy::Flexible => self.match_flexible(&assets).map(Resolution::Asset),
            MatchingStrategy::Custom => self.match_custom(&assets).map(Resolution::Asset),
            MatchingStrategy::Cdn => self.cdn_url().map(Resolution::CdnUrl),
            MatchingStrategy::Hybrid => match self.match_flexible(&assets) {
                Ok(name) => Ok(Resolution::Asset(name)),
                Err(e) => {
                    info!("Flexible matching failed ({}), falling back to CDN", e);
                    self.cdn_url().map(Resolution::CdnUrl)
                }
            },
        }
    }

    fn filter_excluded<'a, S: AsRef<str>>(&self, candidates: &'a [S]) -> Result<Vec<&'a str>> {
        let exclusions = compile_patterns(&self.config.exclude_patterns, "exclude");
        let kept: Vec<&str> = candidates
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| {
                let excluded = exclusions.iter().any(|re| re.is_match(name));
                if excluded {
                    debug!("Excluding asset {}", name);
                }
                !excluded
            })
            .collect();

        if kept.is_empty() {
            return Err(BinfetchError::AllAssetsExcluded {
                assets: candidates.iter().map(|c| c.as_ref().to_string()).collect(),
                patterns: self.config.exclude_patterns.clone(),
            });
        }
        Ok(kept)
    }

    fn match_standard(&self, assets: &[&str]) -> Result<String> {
        let pattern = format!("{}_{}", self.platform.title_os(), self.platform.canonical_arch());
        assets
            .iter()
            .find(|name| name.contains(&pattern))
            .map(|name| name.to_string())
            .ok_or_else(|| BinfetchError::NoStandardMatch {
                os: self.platform.os.clone(),
                arch: self.platform.arch.clone(),
                pattern,
            })
    }

    fn match_flexible(&self, assets: &[&str]) -> Result<String> {
        let scorer = Scorer::new(&self.config, &self.platform);
        let mut best: Option<(&str, i32)> = None;

        for name in assets {
            let score = scorer.score(name);
            debug!("Asset {} scored {}", name, score);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((name, score));
            }
        }

        match best {
            Some((name, score)) if score > 0 => {
                debug!("Selected {} with score {}", name, score);
                Ok(name.to_string())
            }
            _ => Err(BinfetchError::NoFlexibleMatch {
                os: self.platform.os.clone(),
                arch: self.platform.arch.clone(),
            }),
        }
    }

    fn match_custom(&self, assets: &[&str]) -> Result<String> {
        let os_aliases = aliases_for_os(&self.config.os_aliases, &self.platform.os);
        let arch_aliases = aliases_for_arch(&self.config.architecture_aliases, &self.platform.arch);
        let expanded: Vec<String> = self
            .config
            .custom_patterns
            .iter()
            .map(|p| expand_placeholders(p, &os_aliases, &arch_aliases, &self.config.project_name))
            .collect();

        for regex in compile_patterns_exact(&expanded, "custom") {
            if let Some(name) = assets.iter().find(|name| regex.is_match(name)) {
                debug!("Custom pattern {} matched {}", regex, name);
                return Ok(name.to_string());
            }
        }

        if expanded.is_empty() {
            warn!("Custom strategy configured without any patterns");
        }
        Err(BinfetchError::NoCustomMatch {
            os: self.platform.os.clone(),
            arch: self.platform.arch.clone(),
        })
    }

    fn cdn_url(&self) -> Result<String> {
        let builder = CdnUrlBuilder::from_config(&self.config)?;
        let (os, arch) = CdnUrlBuilder::platform_names(&self.config, &self.platform);
        let url = builder.render(self.version.as_deref(), &os, &arch);
        debug!("Constructed CDN URL {}", url);
        Ok(url)
    }
}
