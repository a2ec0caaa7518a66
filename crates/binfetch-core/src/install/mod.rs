//! Installs downloaded artifacts into a versioned layout.
//!
//! ```text
//! <base_dir>/
//!   <binary_name>            -> versions/<version>/<binary_name>
//!   versions/
//!     <version>/<binary_name>
//! ```
//!
//! The top-level entry is a symlink where the platform allows it, falling
//! back to a hard link and finally a plain copy.

mod archive;

pub use archive::{extract_archive, ArchiveFormat};

use crate::cdn::CdnUrlBuilder;
use crate::config::InstallConfig;
use crate::error::{BinfetchError, Result};
use crate::matcher::{ExtractionHint, MatchingConfig};
use crate::platform::{set_executable, Platform};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// How the top-level entry points at the installed binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Symlink,
    Hardlink,
    Copy,
}

/// Result of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstalledBinary {
    pub version: String,
    /// The binary inside the versions directory.
    pub path: PathBuf,
    /// The top-level entry users run.
    pub link: PathBuf,
    pub link_kind: LinkKind,
}

/// Where and under what name a binary is installed.
#[derive(Debug, Clone)]
pub struct InstallLayout {
    pub base_dir: PathBuf,
    pub versions_dir_name: String,
    /// Installed file name.
    pub binary_name: String,
    /// File name to look for inside archives.
    pub source_binary_name: String,
    /// OS and architecture names substituted into extraction hints.
    pub platform_names: (String, String),
}

impl InstallLayout {
    pub fn new(base_dir: impl Into<PathBuf>, binary_name: impl Into<String>) -> Self {
        let binary_name = binary_name.into();
        let platform = Platform::current();
        Self {
            base_dir: base_dir.into(),
            versions_dir_name: InstallConfig::VERSIONS_DIR_NAME.to_string(),
            source_binary_name: binary_name.clone(),
            binary_name,
            platform_names: (platform.os, platform.arch),
        }
    }

    /// Layout under the default base directory (`~/.local/bin`).
    pub fn with_default_base(binary_name: impl Into<String>) -> Self {
        Self::new(InstallConfig::default_base_dir(), binary_name)
    }

    pub fn with_versions_dir_name(mut self, name: impl Into<String>) -> Self {
        self.versions_dir_name = name.into();
        self
    }

    pub fn with_source_binary_name(mut self, name: impl Into<String>) -> Self {
        self.source_binary_name = name.into();
        self
    }

    /// Use the names a matching config's CDN spells this platform with,
    /// so `{os}`/`{arch}` in extraction hints match the archive layout.
    pub fn with_platform_from_config(mut self, config: &MatchingConfig, platform: &Platform) -> Self {
        let (os, arch) = CdnUrlBuilder::platform_names(config, platform);
        let arch = CdnUrlBuilder::new("", "")
            .with_arch_mapping(config.cdn_arch_mapping.clone())
            .map_arch(&arch);
        self.platform_names = (os, arch);
        self
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.base_dir.join(&self.versions_dir_name)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    pub fn link_path(&self) -> PathBuf {
        self.base_dir.join(&self.binary_name)
    }

    /// Install `artifact` as `version` and point the top-level entry at it.
    pub fn install(
        &self,
        artifact: &Path,
        version: &str,
        is_direct_binary: bool,
        hint: Option<&ExtractionHint>,
    ) -> Result<InstalledBinary> {
        let version_dir = self.version_dir(version);
        std::fs::create_dir_all(&version_dir)
            .map_err(|e| BinfetchError::io_with_path(e, &version_dir))?;
        let installed = version_dir.join(&self.binary_name);

        if is_direct_binary {
            copy_file(artifact, &installed)?;
        } else {
            let staging = tempfile::Builder::new()
                .prefix(InstallConfig::EXTRACT_DIR_PREFIX)
                .tempdir_in(&self.base_dir)
                .map_err(|e| BinfetchError::io_with_path(e, &self.base_dir))?;
            let strip = hint.map_or(0, |h| h.strip_components);
            extract_archive(artifact, staging.path(), strip)?;

            let found = self.locate_binary(staging.path(), hint)?;
            copy_file(&found, &installed)?;
        }

        set_executable(&installed)?;

        let link = self.link_path();
        let link_kind = replace_link(&installed, &link)?;
        info!(
            "Installed {} {} at {} ({:?})",
            self.binary_name,
            version,
            link.display(),
            link_kind
        );

        Ok(InstalledBinary {
            version: version.to_string(),
            path: installed,
            link,
            link_kind,
        })
    }

    /// Installed versions, sorted by name.
    pub fn installed_versions(&self) -> Result<Vec<String>> {
        let dir = self.versions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| BinfetchError::io_with_path(e, &dir))? {
            let entry = entry.map_err(|e| BinfetchError::io_with_path(e, &dir))?;
            if entry.path().join(&self.binary_name).is_file() {
                versions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Version the top-level symlink points at. `None` when nothing is
    /// installed or the entry is a hard link or copy.
    pub fn current_version(&self) -> Option<String> {
        let target = std::fs::read_link(self.link_path()).ok()?;
        let version_dir = target.parent()?;
        if version_dir.parent()? != self.versions_dir() {
            return None;
        }
        version_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn locate_binary(&self, root: &Path, hint: Option<&ExtractionHint>) -> Result<PathBuf> {
        if let Some(relative) = hint.and_then(|h| h.binary_path.as_deref()) {
            let (os, arch) = &self.platform_names;
            let relative = relative.replace("{os}", os).replace("{arch}", arch);
            let candidate = root.join(&relative);
            if candidate.is_file() {
                return Ok(candidate);
            }
            warn!(
                "Extraction hint {} not found in archive, searching for {}",
                relative, self.source_binary_name
            );
        }
        find_binary(root, &self.source_binary_name)
    }
}

/// Shallowest file named `name` under `root`.
pub fn find_binary(root: &Path, name: &str) -> Result<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
        .ok_or_else(|| BinfetchError::BinaryNotFound {
            name: name.to_string(),
            dir: root.to_path_buf(),
        })
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        std::fs::remove_file(to).map_err(|e| BinfetchError::io_with_path(e, to))?;
    }
    std::fs::copy(from, to).map_err(|e| BinfetchError::io_with_path(e, to))?;
    debug!("Copied {} to {}", from.display(), to.display());
    Ok(())
}

fn replace_link(target: &Path, link: &Path) -> Result<LinkKind> {
    if std::fs::symlink_metadata(link).is_ok() {
        std::fs::remove_file(link).map_err(|e| BinfetchError::io_with_path(e, link))?;
    }
    create_link_or_copy(target, link)
}

/// Create a symlink, falling back to hardlink or copy.
fn create_link_or_copy(source: &Path, target: &Path) -> Result<LinkKind> {
    #[cfg(unix)]
    {
        if std::os::unix::fs::symlink(source, target).is_ok() {
            return Ok(LinkKind::Symlink);
        }
    }

    #[cfg(windows)]
    {
        if std::os::windows::fs::symlink_file(source, target).is_ok() {
            return Ok(LinkKind::Symlink);
        }
    }

    // Same filesystem only
    if std::fs::hard_link(source, target).is_ok() {
        return Ok(LinkKind::Hardlink);
    }

    std::fs::copy(source, target).map_err(|e| BinfetchError::io_with_path(e, target))?;
    Ok(LinkKind::Copy)
}

#[cfg(test)]
mod tests {
    use super::archive::tests::{write_tar_gz, write_zip};
    use super::*;
    use crate::matcher::preset;
    use tempfile::TempDir;

    #[test]
    fn test_install_direct_binary() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("kubectl-download");
        std::fs::write(&artifact, b"kubectl").unwrap();

        let layout = InstallLayout::new(temp.path().join("bin"), "kubectl");
        std::fs::create_dir_all(&layout.base_dir).unwrap();
        let installed = layout.install(&artifact, "v1.30.1", true, None).unwrap();

        assert_eq!(
            installed.path,
            layout.base_dir.join("versions").join("v1.30.1").join("kubectl")
        );
        assert_eq!(std::fs::read(&installed.link).unwrap(), b"kubectl");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&installed.path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
            assert_eq!(installed.link_kind, LinkKind::Symlink);
            assert_eq!(layout.current_version().as_deref(), Some("v1.30.1"));
        }
    }

    #[test]
    fn test_install_archive_with_hint() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("bin");
        std::fs::create_dir_all(&base).unwrap();
        let artifact = temp.path().join("helm-v3.18.3-linux-amd64.tar.gz");
        write_tar_gz(
            &artifact,
            &[
                ("linux-amd64/helm", &b"helm-binary"[..]),
                ("linux-amd64/LICENSE", &b"apache"[..]),
            ],
        );

        let config = preset("helm").unwrap();
        let layout = InstallLayout::new(&base, "helm")
            .with_platform_from_config(&config, &Platform::new("linux", "x86_64"));
        assert_eq!(layout.platform_names, ("linux".to_string(), "amd64".to_string()));

        let installed = layout
            .install(&artifact, "v3.18.3", false, config.extraction.as_ref())
            .unwrap();
        assert_eq!(std::fs::read(&installed.path).unwrap(), b"helm-binary");

        // Staging directory is cleaned up.
        let leftovers: Vec<_> = std::fs::read_dir(&base)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with(InstallConfig::EXTRACT_DIR_PREFIX)
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_install_archive_searches_by_name() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("bin");
        std::fs::create_dir_all(&base).unwrap();
        let artifact = temp.path().join("tool.zip");
        write_zip(&artifact, &[("tool_1.0/docs/tool", &b"doc"[..]), ("tool_1.0/tool", &b"bin"[..])]);

        let layout = InstallLayout::new(&base, "tool");
        let installed = layout.install(&artifact, "1.0", false, None).unwrap();
        assert_eq!(std::fs::read(&installed.path).unwrap(), b"bin");
    }

    #[test]
    fn test_missing_binary_in_archive() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("bin");
        std::fs::create_dir_all(&base).unwrap();
        let artifact = temp.path().join("tool.tar.gz");
        write_tar_gz(&artifact, &[("README.md", &b"hi"[..])]);

        let layout = InstallLayout::new(&base, "tool");
        assert!(matches!(
            layout.install(&artifact, "1.0", false, None),
            Err(BinfetchError::BinaryNotFound { .. })
        ));
    }

    #[test]
    fn test_reinstall_replaces_link_and_lists_versions() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("bin");
        std::fs::create_dir_all(&base).unwrap();
        let artifact = temp.path().join("artifact");
        let layout = InstallLayout::new(&base, "tool");

        std::fs::write(&artifact, b"one").unwrap();
        layout.install(&artifact, "1.0.0", true, None).unwrap();
        std::fs::write(&artifact, b"two").unwrap();
        let second = layout.install(&artifact, "1.1.0", true, None).unwrap();

        assert_eq!(std::fs::read(&second.link).unwrap(), b"two");
        assert_eq!(layout.installed_versions().unwrap(), vec!["1.0.0", "1.1.0"]);
    }

    #[test]
    fn test_no_versions_installed() {
        let temp = TempDir::new().unwrap();
        let layout = InstallLayout::new(temp.path(), "tool");
        assert!(layout.installed_versions().unwrap().is_empty());
        assert_eq!(layout.current_version(), None);
    }
}
