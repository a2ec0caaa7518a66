//! Platform identity: the running OS/architecture and their naming aliases.
//!
//! Release assets spell the same platform many ways (`amd64`, `x86_64`, `x64`;
//! `darwin`, `macOS`, `osx`). This module folds those spellings into canonical
//! names and hands out the ordered alias lists the matcher searches for.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here.

pub mod permissions;

pub use permissions::set_executable;

use std::collections::BTreeMap;
use std::fmt;

/// Alias table: canonical key → ordered aliases.
pub type AliasTable = BTreeMap<String, Vec<String>>;

/// Canonical architecture name for a raw identifier.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
/// Unrecognized input is returned unchanged.
pub fn canonical_arch(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "amd64" | "x86_64" | "x86-64" | "x64" => "x86_64".to_string(),
        "arm64" | "aarch64" => "arm64".to_string(),
        "arm" | "armv6" | "armv6l" | "armv7" | "armv7l" | "armhf" => "arm".to_string(),
        "386" | "i386" | "i686" | "x86" => "386".to_string(),
        _ => raw.to_string(),
    }
}

/// Canonical OS name for a raw identifier. Unrecognized input is returned unchanged.
pub fn canonical_os(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "linux" => "linux".to_string(),
        "darwin" | "macos" | "osx" => "darwin".to_string(),
        "windows" | "win" | "win32" | "win64" => "windows".to_string(),
        "freebsd" => "freebsd".to_string(),
        "openbsd" => "openbsd".to_string(),
        "netbsd" => "netbsd".to_string(),
        _ => raw.to_string(),
    }
}

/// Ordered aliases for an OS, looked up by canonical name.
pub fn aliases_for_os(table: &AliasTable, os: &str) -> Vec<String> {
    let wanted = canonical_os(os).to_lowercase();
    table
        .iter()
        .find(|(key, _)| canonical_os(key).to_lowercase() == wanted)
        .map(|(_, aliases)| aliases.clone())
        .filter(|aliases| !aliases.is_empty())
        .unwrap_or_else(|| vec![os.to_string()])
}

/// Ordered aliases for an architecture, looked up by canonical name.
///
/// Without a table entry the raw name and its canonical form are returned.
pub fn aliases_for_arch(table: &AliasTable, arch: &str) -> Vec<String> {
    let wanted = canonical_arch(arch).to_lowercase();
    if let Some(aliases) = table
        .iter()
        .find(|(key, _)| canonical_arch(key).to_lowercase() == wanted)
        .map(|(_, aliases)| aliases)
        .filter(|aliases| !aliases.is_empty())
    {
        return aliases.clone();
    }

    let mut aliases = vec![arch.to_string()];
    let canonical = canonical_arch(arch);
    if canonical != arch {
        aliases.push(canonical);
    }
    aliases
}

fn table(entries: &[(&str, &[&str])]) -> AliasTable {
    entries
        .iter()
        .map(|(key, aliases)| {
            (
                key.to_string(),
                aliases.iter().map(|a| a.to_string()).collect(),
            )
        })
        .collect()
}

/// Default architecture alias table.
pub fn default_arch_aliases() -> AliasTable {
    table(&[
        ("amd64", &["amd64", "x86_64", "x64"]),
        ("arm64", &["arm64", "aarch64"]),
        ("arm", &["arm", "armv6", "armv7", "armhf"]),
        ("386", &["386", "i386", "i686", "x86"]),
        ("mips", &["mips"]),
        ("mips64", &["mips64"]),
        ("ppc64", &["ppc64"]),
        ("ppc64le", &["ppc64le"]),
        ("s390x", &["s390x"]),
        ("riscv64", &["riscv64"]),
    ])
}

/// Default OS alias table.
pub fn default_os_aliases() -> AliasTable {
    table(&[
        ("linux", &["linux", "Linux"]),
        ("darwin", &["darwin", "Darwin", "macos", "macOS", "osx", "OSX"]),
        ("windows", &["windows", "Windows", "win", "Win"]),
        ("freebsd", &["freebsd", "FreeBSD"]),
        ("openbsd", &["openbsd", "OpenBSD"]),
        ("netbsd", &["netbsd", "NetBSD"]),
    ])
}

/// An OS/architecture pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process is running on.
    pub fn current() -> Self {
        Self::new(current_os(), current_arch())
    }

    /// OS name with a leading capital, as used by `Linux_x86_64` style assets.
    pub fn title_os(&self) -> String {
        let os = canonical_os(&self.os);
        let mut chars = os.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn canonical_arch(&self) -> String {
        canonical_arch(&self.arch)
    }

    pub fn canonical_os(&self) -> String {
        canonical_os(&self.os)
    }

    pub fn is_windows(&self) -> bool {
        self.canonical_os() == "windows"
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn current_os() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "darwin"
    }
    #[cfg(not(target_os = "macos"))]
    {
        std::env::consts::OS
    }
}

fn current_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
