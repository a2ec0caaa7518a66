//! Subcommand implementations.

use crate::{MatchingArgs, SourceArgs};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use binfetch_core::release::ReleaseInfo;
use binfetch_core::{
    preset, preset_names, AssetMatcher, BinaryUpdater, BinfetchError, CdnUrlBuilder,
    GitHubClient, GitLabClient, InstallLayout, MatchingConfig, Platform, ReleaseSource,
    ResilientClient,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Used when no release source was given. CDN strategies that can discover
/// their own version never call it.
struct NoSource;

#[async_trait]
impl ReleaseSource for NoSource {
    fn describe(&self) -> String {
        "no release source".into()
    }

    async fn latest_release(&self) -> binfetch_core::Result<ReleaseInfo> {
        Err(BinfetchError::Config {
            message: "a release source is required; pass --github or --gitlab".into(),
        })
    }
}

pub async fn resolve(args: &SourceArgs, assets: &[String]) -> Result<()> {
    let config = build_config(&args.matching)?;
    let platform = target_platform(&args.matching);

    if !assets.is_empty() {
        let resolution = AssetMatcher::for_platform(config, platform).resolve(assets)?;
        return print(args.json, &resolution.as_str(), resolution.as_str());
    }

    let updater = build_updater(args, config, platform)?;
    let target = updater.resolve_latest().await?;
    print(args.json, &target, &target.url)
}

pub async fn download(args: &SourceArgs, output: &Path) -> Result<()> {
    let config = build_config(&args.matching)?;
    let updater = build_updater(args, config, target_platform(&args.matching))?;
    let artifact = updater.download_latest(output).await?;
    print(args.json, &artifact, &artifact.path.display())
}

pub async fn install(args: &SourceArgs, dir: Option<PathBuf>, name: Option<&str>) -> Result<()> {
    let config = build_config(&args.matching)?;
    let platform = target_platform(&args.matching);
    let binary_name = binary_name(name, &config, &platform)?;

    let layout = match dir {
        Some(dir) => InstallLayout::new(dir, &binary_name),
        None => InstallLayout::with_default_base(&binary_name),
    }
    .with_platform_from_config(&config, &platform);
    std::fs::create_dir_all(&layout.base_dir)
        .with_context(|| format!("creating {}", layout.base_dir.display()))?;

    let staging = tempfile::tempdir().context("creating download directory")?;
    let updater = build_updater(args, config.clone(), platform)?;
    let artifact = updater.download_latest(staging.path()).await?;

    let installed = layout.install(
        &artifact.path,
        &artifact.target.version,
        config.is_direct_binary,
        config.extraction.as_ref(),
    )?;
    info!("{} {} is ready", binary_name, installed.version);
    print(args.json, &installed, &installed.link.display())
}

pub fn url(args: &MatchingArgs, version: &str) -> Result<()> {
    let config = build_config(args)?;
    let platform = target_platform(args);
    let builder = CdnUrlBuilder::from_config(&config)?;
    let (os, arch) = CdnUrlBuilder::platform_names(&config, &platform);
    println!("{}", builder.construct_url(version, &os, &arch));
    Ok(())
}

pub fn presets() -> Result<()> {
    for name in preset_names() {
        let config = preset(name)?;
        println!("{:<10} {}", name, config.strategy);
    }
    Ok(())
}

/// Config from `--config`, `--preset` or defaults, with flag overrides applied.
fn build_config(args: &MatchingArgs) -> Result<MatchingConfig> {
    let mut config = if let Some(path) = &args.config {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        MatchingConfig::from_json(&json)
            .with_context(|| format!("parsing {}", path.display()))?
    } else if let Some(name) = &args.preset {
        preset(name)?
    } else {
        MatchingConfig::default()
    };

    if let Some(strategy) = &args.strategy {
        config.strategy = strategy.parse()?;
    }
    if let Some(project) = &args.project {
        config.project_name = project.clone();
    }
    config.validate()?;
    Ok(config)
}

fn target_platform(args: &MatchingArgs) -> Platform {
    let current = Platform::current();
    Platform::new(
        args.os.clone().unwrap_or(current.os),
        args.arch.clone().unwrap_or(current.arch),
    )
}

fn build_updater(
    args: &SourceArgs,
    config: MatchingConfig,
    platform: Platform,
) -> Result<BinaryUpdater<Box<dyn ReleaseSource>>> {
    let client = Arc::new(ResilientClient::with_defaults()?);
    let source: Box<dyn ReleaseSource> = match (&args.github, args.gitlab) {
        (Some(repo), _) => Box::new(GitHubClient::from_env(repo.as_str(), client.clone())?),
        (None, Some(project_id)) => Box::new(GitLabClient::from_env(project_id, client.clone())?),
        (None, None) => Box::new(NoSource),
    };
    Ok(BinaryUpdater::new(source, config, client)?.with_platform(platform))
}

fn binary_name(explicit: Option<&str>, config: &MatchingConfig, platform: &Platform) -> Result<String> {
    let name = match explicit {
        Some(name) => name.to_string(),
        None if !config.project_name.is_empty() => config.project_name.clone(),
        None => bail!("cannot tell the binary name; pass --name or --project"),
    };
    if platform.is_windows() && !name.to_lowercase().ends_with(".exe") {
        return Ok(format!("{}.exe", name));
    }
    Ok(name)
}

fn print<T: Serialize + ?Sized>(json: bool, value: &T, plain: impl std::fmt::Display) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", plain);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use binfetch_core::MatchingStrategy;
    use tempfile::TempDir;

    #[test]
    fn test_build_config_from_preset_with_overrides() {
        let args = MatchingArgs {
            preset: Some("k0s".into()),
            strategy: Some("standard".into()),
            project: Some("k0s-custom".into()),
            ..MatchingArgs::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.strategy, MatchingStrategy::Standard);
        assert_eq!(config.project_name, "k0s-custom");
    }

    #[test]
    fn test_build_config_from_json_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tool.json");
        std::fs::write(
            &path,
            r#"{"strategy": "cdn", "cdn_base_url": "https://cdn.example.com/",
                "cdn_pattern": "{version}/tool-{os}-{arch}.tar.gz"}"#,
        )
        .unwrap();

        let args = MatchingArgs {
            config: Some(path),
            ..MatchingArgs::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.strategy, MatchingStrategy::Cdn);
    }

    #[test]
    fn test_build_config_rejects_bad_strategy() {
        let args = MatchingArgs {
            strategy: Some("fuzzy".into()),
            ..MatchingArgs::default()
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_cdn_override_requires_cdn_fields() {
        let args = MatchingArgs {
            strategy: Some("cdn".into()),
            ..MatchingArgs::default()
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_target_platform_overrides() {
        let args = MatchingArgs {
            os: Some("windows".into()),
            arch: Some("arm64".into()),
            ..MatchingArgs::default()
        };
        assert_eq!(target_platform(&args), Platform::new("windows", "arm64"));
    }

    #[test]
    fn test_binary_name() {
        let config = MatchingConfig::default().with_project_name("tool");
        let linux = Platform::new("linux", "amd64");
        let windows = Platform::new("windows", "amd64");

        assert_eq!(binary_name(None, &config, &linux).unwrap(), "tool");
        assert_eq!(binary_name(Some("t"), &config, &linux).unwrap(), "t");
        assert_eq!(binary_name(None, &config, &windows).unwrap(), "tool.exe");
        assert!(binary_name(None, &MatchingConfig::default(), &linux).is_err());
    }

    #[tokio::test]
    async fn test_missing_source_is_config_error() {
        let err = NoSource.latest_release().await.unwrap_err();
        assert!(matches!(err, BinfetchError::Config { .. }));
    }
}
