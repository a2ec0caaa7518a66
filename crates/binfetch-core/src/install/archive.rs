//! Archive extraction for downloaded release artifacts.
//!
//! Supported formats:
//! - `.tar.gz` / `.tgz` (gzip compressed tar)
//! - `.tar.zst` (Zstandard compressed tar)
//! - `.zip`

use crate::error::{BinfetchError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarZst,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name.
    pub fn detect(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive` into `dest`, dropping `strip_components` leading path
/// components from every entry. Entries that would land outside `dest` are skipped.
pub fn extract_archive(archive: &Path, dest: &Path, strip_components: usize) -> Result<()> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = ArchiveFormat::detect(&name)
        .ok_or_else(|| BinfetchError::UnsupportedArchive { name: name.clone() })?;

    info!("Extracting {} to {}", name, dest.display());
    std::fs::create_dir_all(dest).map_err(|e| BinfetchError::io_with_path(e, dest))?;

    let file = File::open(archive).map_err(|e| BinfetchError::io_with_path(e, archive))?;
    match format {
        ArchiveFormat::TarGz => {
            let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
            unpack_tar(tar::Archive::new(decoder), archive, dest, strip_components)
        }
        ArchiveFormat::TarZst => {
            let decoder = zstd::Decoder::new(BufReader::new(file)).map_err(|e| {
                BinfetchError::ExtractionFailed {
                    path: archive.to_path_buf(),
                    message: format!("Failed to create zstd decoder: {}", e),
                }
            })?;
            unpack_tar(tar::Archive::new(decoder), archive, dest, strip_components)
        }
        ArchiveFormat::Zip => unpack_zip(file, archive, dest, strip_components),
    }
}

/// Relative output path for an archive entry, or `None` if the entry is
/// stripped away entirely or tries to escape the destination.
fn entry_target(path: &Path, strip_components: usize) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in path.components().skip(strip_components) {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn unpack_tar<R: Read>(
    mut tar: tar::Archive<R>,
    archive: &Path,
    dest: &Path,
    strip_components: usize,
) -> Result<()> {
    let failed = |message: String| BinfetchError::ExtractionFailed {
        path: archive.to_path_buf(),
        message,
    };

    let entries = tar
        .entries()
        .map_err(|e| failed(format!("Failed to read tar entries: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| failed(format!("Failed to read tar entry: {}", e)))?;
        let entry_path = entry
            .path()
            .map_err(|e| failed(format!("Invalid tar entry path: {}", e)))?
            .into_owned();

        let Some(relative) = entry_target(&entry_path, strip_components) else {
            if entry_path.components().any(|c| c == Component::ParentDir) {
                warn!("Skipping unsafe archive entry {}", entry_path.display());
            }
            continue;
        };
        if entry.header().entry_type().is_hard_link() {
            debug!("Skipping hard link entry {}", entry_path.display());
            continue;
        }

        let outpath = dest.join(relative);
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BinfetchError::io_with_path(e, parent))?;
        }
        entry
            .unpack(&outpath)
            .map_err(|e| failed(format!("Failed to extract {}: {}", entry_path.display(), e)))?;
    }

    Ok(())
}

fn unpack_zip(file: File, archive: &Path, dest: &Path, strip_components: usize) -> Result<()> {
    let failed = |message: String| BinfetchError::ExtractionFailed {
        path: archive.to_path_buf(),
        message,
    };

    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| failed(format!("Invalid zip archive: {}", e)))?;

    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| failed(format!("Failed to read zip entry {}: {}", i, e)))?;

        let Some(enclosed) = file.enclosed_name() else {
            warn!("Skipping unsafe archive entry {}", file.name());
            continue;
        };
        let Some(relative) = entry_target(&enclosed, strip_components) else {
            continue;
        };
        let outpath = dest.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| BinfetchError::io_with_path(e, &outpath))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BinfetchError::io_with_path(e, parent))?;
        }
        let mut outfile =
            File::create(&outpath).map_err(|e| BinfetchError::io_with_path(e, &outpath))?;
        std::io::copy(&mut file, &mut outfile)
            .map_err(|e| BinfetchError::io_with_path(e, &outpath))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a gzip tarball containing `files` (path, contents).
    pub(crate) fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
        let encoder = flate2::write::GzEncoder::new(
            File::create(path).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    pub(crate) fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(ArchiveFormat::detect("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("a.TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("a.tar.zst"), Some(ArchiveFormat::TarZst));
        assert_eq!(ArchiveFormat::detect("a.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("a.tar.bz2"), None);
        assert_eq!(ArchiveFormat::detect("kubectl"), None);
    }

    #[test]
    fn test_entry_target() {
        assert_eq!(
            entry_target(Path::new("tool-1.0/bin/tool"), 1),
            Some(PathBuf::from("bin/tool"))
        );
        assert_eq!(entry_target(Path::new("tool-1.0/"), 1), None);
        assert_eq!(entry_target(Path::new("../etc/passwd"), 0), None);
        assert_eq!(entry_target(Path::new("./tool"), 0), Some(PathBuf::from("tool")));
    }

    #[test]
    fn test_extract_tar_gz_with_strip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("tool-1.0/tool", &b"binary"[..]),
                ("tool-1.0/README.md", &b"docs"[..]),
            ],
        );

        let dest = temp.path().join("out");
        extract_archive(&archive, &dest, 1).unwrap();
        assert_eq!(std::fs::read(dest.join("tool")).unwrap(), b"binary");
        assert!(dest.join("README.md").exists());
    }

    #[test]
    fn test_extract_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.zip");
        write_zip(&archive, &[("windows-amd64/tool.exe", &b"MZ"[..])]);

        let dest = temp.path().join("out");
        extract_archive(&archive, &dest, 0).unwrap();
        assert_eq!(
            std::fs::read(dest.join("windows-amd64").join("tool.exe")).unwrap(),
            b"MZ"
        );
    }

    #[test]
    fn test_extract_tar_zst() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.tar.zst");
        let encoder = zstd::Encoder::new(File::create(&archive).unwrap(), 0).unwrap();
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, "bin/tool", &b"elf"[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let dest = temp.path().join("out");
        extract_archive(&archive, &dest, 0).unwrap();
        assert_eq!(std::fs::read(dest.join("bin").join("tool")).unwrap(), b"elf");
    }

    #[test]
    fn test_unknown_format() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("tool.tar.bz2");
        std::fs::write(&archive, b"x").unwrap();
        assert!(matches!(
            extract_archive(&archive, temp.path(), 0),
            Err(BinfetchError::UnsupportedArchive { .. })
        ));
    }
}
