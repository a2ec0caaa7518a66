//! Flexible scoring of asset names.
//!
//! Alias detection runs against the whole alias universe of both tables,
//! longest alias first. A matched span is masked so that shorter aliases
//! nested in it (`x86` in `x86_64`, `arm` in `arm64`, `win` in `darwin`)
//! are not counted a second time.

use super::MatchingConfig;
use crate::platform::{aliases_for_arch, aliases_for_os, AliasTable, Platform};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::warn;

const OS_MATCH: i32 = 10;
const ARCH_MATCH: i32 = 10;
const BOTH_MATCH: i32 = 5;
const ARCH_ONLY: i32 = 8;
const COMMON_PATTERN: i32 = 3;
const PRIORITY_PATTERN: i32 = 15;
const WRONG_PLATFORM: i32 = -20;
const EXTENSION: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasKind {
    Os,
    Arch,
    ForeignOs,
    ForeignArch,
}

/// Alias hits found in one asset name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Signals {
    pub os: bool,
    pub arch: bool,
    pub foreign_os: bool,
    pub foreign_arch: bool,
}

impl Signals {
    pub fn wrong_platform(&self) -> bool {
        self.foreign_os || self.foreign_arch
    }
}

/// Compile patterns case-insensitively, skipping any that fail.
pub(crate) fn compile_patterns(patterns: &[String], kind: &str) -> Vec<Regex> {
    build_patterns(patterns, kind, true)
}

/// Compile patterns exactly as written, skipping any that fail.
pub(crate) fn compile_patterns_exact(patterns: &[String], kind: &str) -> Vec<Regex> {
    build_patterns(patterns, kind, false)
}

fn build_patterns(patterns: &[String], kind: &str, case_insensitive: bool) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            match RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
            {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Skipping invalid {} pattern '{}': {}", kind, pattern, e);
                    None
                }
            }
        })
        .collect()
}

/// `(a|b|c)` over escaped aliases.
pub(crate) fn alternation(aliases: &[String]) -> String {
    let escaped: Vec<String> = aliases.iter().map(|a| regex::escape(a)).collect();
    format!("({})", escaped.join("|"))
}

/// Expand `{OS}`, `{ARCH}` and `{PROJECT}` (either case) in a pattern.
pub(crate) fn expand_placeholders(
    pattern: &str,
    os_aliases: &[String],
    arch_aliases: &[String],
    project: &str,
) -> String {
    let os = alternation(os_aliases);
    let arch = alternation(arch_aliases);
    let project = regex::escape(project);
    pattern
        .replace("{OS}", &os)
        .replace("{os}", &os)
        .replace("{ARCH}", &arch)
        .replace("{arch}", &arch)
        .replace("{PROJECT}", &project)
        .replace("{project}", &project)
}

fn lowercase_unique(aliases: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    aliases
        .into_iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty() && seen.insert(a.clone()))
        .collect()
}

fn foreign_aliases(table: &AliasTable, own: &[String]) -> Vec<String> {
    let own: HashSet<&str> = own.iter().map(String::as_str).collect();
    lowercase_unique(table.values().flatten().cloned())
        .into_iter()
        .filter(|a| !own.contains(a.as_str()))
        .collect()
}

/// Scores asset names for one platform and config.
pub(crate) struct Scorer {
    aliases: Vec<(String, AliasKind)>,
    common: Vec<Regex>,
    priority: Vec<Regex>,
    extensions: Vec<String>,
    is_direct_binary: bool,
}

impl Scorer {
    pub fn new(config: &MatchingConfig, platform: &Platform) -> Self {
        let os_aliases = aliases_for_os(&config.os_aliases, &platform.os);
        let arch_aliases = aliases_for_arch(&config.architecture_aliases, &platform.arch);

        let own_os = lowercase_unique(os_aliases.clone());
        let own_arch = lowercase_unique(arch_aliases.clone());
        let foreign_os = foreign_aliases(&config.os_aliases, &own_os);
        let foreign_arch = foreign_aliases(&config.architecture_aliases, &own_arch);

        // Own aliases are pushed first so a stable sort keeps them ahead of
        // foreign aliases of the same length.
        let mut aliases: Vec<(String, AliasKind)> = Vec::new();
        aliases.extend(own_os.iter().cloned().map(|a| (a, AliasKind::Os)));
        aliases.extend(own_arch.iter().cloned().map(|a| (a, AliasKind::Arch)));
        aliases.extend(foreign_os.into_iter().map(|a| (a, AliasKind::ForeignOs)));
        aliases.extend(foreign_arch.into_iter().map(|a| (a, AliasKind::ForeignArch)));
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let os = alternation(&os_aliases);
        let arch = alternation(&arch_aliases);
        let mut common = vec![format!("{}.*{}", os, arch), format!("{}.*{}", arch, os)];
        if !config.project_name.is_empty() {
            common.push(format!("{}-.*-{}", regex::escape(&config.project_name), arch));
        }

        let priority: Vec<String> = config
            .priority_patterns
            .iter()
            .map(|p| expand_placeholders(p, &os_aliases, &arch_aliases, &config.project_name))
            .collect();

        Self {
            aliases,
            common: compile_patterns(&common, "common"),
            priority: compile_patterns(&priority, "priority"),
            extensions: config
                .file_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            is_direct_binary: config.is_direct_binary,
        }
    }

    /// Which aliases appear in `name`.
    pub fn signals(&self, name: &str) -> Signals {
        let lower = name.to_lowercase();
        let mut masked = vec![false; lower.len()];
        let mut signals = Signals::default();

        for (alias, kind) in &self.aliases {
            for (start, hit) in lower.match_indices(alias.as_str()) {
                let span = start..start + hit.len();
                if masked[span.clone()].iter().any(|m| *m) {
                    continue;
                }
                masked[span].fill(true);
                match kind {
                    AliasKind::Os => signals.os = true,
                    AliasKind::Arch => signals.arch = true,
                    AliasKind::ForeignOs => signals.foreign_os = true,
                    AliasKind::ForeignArch => signals.foreign_arch = true,
                }
            }
        }

        signals
    }

    pub fn score(&self, name: &str) -> i32 {
        let signals = self.signals(name);
        let mut score = 0;

        if signals.os {
            score += OS_MATCH;
        }
        if signals.arch {
            score += ARCH_MATCH;
        }
        if signals.os && signals.arch {
            score += BOTH_MATCH;
        }

        // The penalty is decided first and suppresses the arch-only bonus.
        if signals.wrong_platform() {
            score += WRONG_PLATFORM;
        } else if signals.arch && !signals.os {
            score += ARCH_ONLY;
        }

        if self.common.iter().any(|re| re.is_match(name)) {
            score += COMMON_PATTERN;
        }
        if self.priority.iter().any(|re| re.is_match(name)) {
            score += PRIORITY_PATTERN;
        }

        if !self.is_direct_binary {
            let lower = name.to_lowercase();
            if self.extensions.iter().any(|ext| lower.ends_with(ext.as_str())) {
                score += EXTENSION;
            }
        }

        score
    }
}
