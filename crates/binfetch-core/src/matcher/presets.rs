//! Ready-made matching configurations for well-known tools.

use super::{ExtractionHint, MatchingConfig, MatchingStrategy};
use crate::config::NetworkConfig;
use crate::error::{BinfetchError, Result};
use std::collections::BTreeMap;

const PRESETS: &[&str] = &["helm", "kubectl", "k0s", "terraform", "docker"];

/// Names accepted by [`preset`].
pub fn preset_names() -> &'static [&'static str] {
    PRESETS
}

/// Preset configuration for a binary, looked up case-insensitively.
pub fn preset(name: &str) -> Result<MatchingConfig> {
    match name.trim().to_lowercase().as_str() {
        "helm" => Ok(helm()),
        "kubectl" => Ok(kubectl()),
        "k0s" => Ok(k0s()),
        "terraform" => Ok(terraform()),
        "docker" => Ok(docker()),
        _ => Err(BinfetchError::UnknownPreset {
            name: name.to_string(),
        }),
    }
}

fn arch_mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// get.helm.sh keeps Go architecture names.
fn helm() -> MatchingConfig {
    MatchingConfig {
        strategy: MatchingStrategy::Cdn,
        project_name: "helm".into(),
        cdn_base_url: "https://get.helm.sh/".into(),
        cdn_pattern: "helm-{version}-{os}-{arch}.tar.gz".into(),
        cdn_version_format: "with-v".into(),
        cdn_arch_mapping: arch_mapping(&[
            ("amd64", "amd64"),
            ("x86_64", "amd64"),
            ("x64", "amd64"),
            ("arm64", "arm64"),
            ("aarch64", "arm64"),
            ("arm", "arm"),
            ("armv6", "arm"),
            ("armv7", "arm"),
            ("armhf", "arm"),
            ("386", "386"),
            ("i386", "386"),
            ("i686", "386"),
            ("x86", "386"),
        ]),
        extraction: Some(ExtractionHint {
            strip_components: 0,
            binary_path: Some("{os}-{arch}/helm".into()),
        }),
        ..MatchingConfig::default()
    }
}

fn kubectl() -> MatchingConfig {
    let mut pattern = String::from("{version}/bin/{os}/{arch}/kubectl");
    if cfg!(windows) {
        pattern.push_str(".exe");
    }
    MatchingConfig {
        strategy: MatchingStrategy::Cdn,
        is_direct_binary: true,
        project_name: "kubectl".into(),
        cdn_base_url: "https://dl.k8s.io/release/".into(),
        cdn_pattern: pattern,
        cdn_version_format: "as-is".into(),
        cdn_arch_mapping: arch_mapping(&[
            ("amd64", "amd64"),
            ("x86_64", "amd64"),
            ("x64", "amd64"),
            ("arm64", "arm64"),
            ("aarch64", "arm64"),
            ("arm", "arm"),
            ("386", "386"),
        ]),
        cdn_version_url: Some(NetworkConfig::KUBERNETES_STABLE_URL.into()),
        ..MatchingConfig::default()
    }
}

/// k0s publishes airgap bundles next to the plain binaries.
fn k0s() -> MatchingConfig {
    MatchingConfig {
        strategy: MatchingStrategy::Flexible,
        is_direct_binary: true,
        project_name: "k0s".into(),
        exclude_patterns: strings(&["airgap", "bundle", r"\.asc$", r"\.sha256$"]),
        priority_patterns: strings(&[
            r"^k0s-v.*-amd64$",
            r"^k0s-v.*-arm64$",
            r"^k0s-v.*-amd64\.exe$",
        ]),
        ..MatchingConfig::default()
    }
}

fn terraform() -> MatchingConfig {
    MatchingConfig {
        strategy: MatchingStrategy::Hybrid,
        project_name: "terraform".into(),
        file_extensions: strings(&[".zip"]),
        cdn_base_url: "https://releases.hashicorp.com/terraform/".into(),
        cdn_pattern: "{version}/terraform_{version}_{os}_{arch}.zip".into(),
        cdn_version_format: "without-v".into(),
        cdn_arch_mapping: arch_mapping(&[
            ("amd64", "amd64"),
            ("x86_64", "amd64"),
            ("arm64", "arm64"),
            ("aarch64", "arm64"),
            ("arm", "arm"),
            ("386", "386"),
        ]),
        ..MatchingConfig::default()
    }
}

fn docker() -> MatchingConfig {
    MatchingConfig {
        strategy: MatchingStrategy::Flexible,
        project_name: "docker".into(),
        file_extensions: strings(&[".tgz", ".tar.gz"]),
        exclude_patterns: strings(&["desktop", "rootless", "static", r"\.asc$", r"\.sha256$"]),
        priority_patterns: strings(&[
            r"docker-.*-{os}-{arch}\.tgz$",
            r"docker-.*-{os}-{arch}\.tar\.gz$",
        ]),
        ..MatchingConfig::default()
    }
}
