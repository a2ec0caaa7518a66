//! Error types for binfetch.
//!
//! Every failure the resolver, the CDN builder, the transport, the release
//! clients and the installer can produce is a variant of [`BinfetchError`].
//! Match failures carry the platform pair that was attempted so callers can
//! report exactly what was searched for.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for binfetch.
#[derive(Debug, Error)]
pub enum BinfetchError {
    // Resolution errors
    #[error("No assets provided")]
    NoAssetsProvided,

    #[error("All {} assets were excluded by patterns {patterns:?}: {assets:?}", assets.len())]
    AllAssetsExcluded {
        assets: Vec<String>,
        patterns: Vec<String>,
    },

    #[error("No asset matched the standard pattern '{pattern}' for {os}/{arch}")]
    NoStandardMatch {
        os: String,
        arch: String,
        pattern: String,
    },

    #[error("No suitable asset found for {os}/{arch} using flexible matching")]
    NoFlexibleMatch { os: String, arch: String },

    #[error("No asset matched any custom pattern for {os}/{arch}")]
    NoCustomMatch { os: String, arch: String },

    // CDN errors
    #[error("Invalid CDN configuration: {message}")]
    InvalidCdnConfig { message: String },

    #[error("CDN download from {url} failed with status {status_code}")]
    CdnDownloadFailed { url: String, status_code: u16 },

    #[error("Latest version discovery is not supported for {base_url}")]
    VersionDiscoveryUnsupported { base_url: String },

    #[error("Latest version discovery failed: {message}")]
    VersionDiscoveryFailed { message: String },

    #[error("No preset configuration available for binary: {name}")]
    UnknownPreset { name: String },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("Circuit breaker open for {domain}")]
    CircuitOpen { domain: String },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // Release API errors
    #[error("{provider} API error: {message}")]
    ReleaseApi {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    #[error("Invalid repository '{repo}': expected owner/repo")]
    InvalidRepository { repo: String },

    #[error("Invalid project ID: {project_id}")]
    InvalidProjectId { project_id: i64 },

    #[error("No releases found for {project}")]
    NoReleases { project: String },

    // Installation errors
    #[error("Unsupported archive format: {name}")]
    UnsupportedArchive { name: String },

    #[error("Failed to extract {}: {message}", path.display())]
    ExtractionFailed { path: PathBuf, message: String },

    #[error("Binary '{name}' not found under {}", dir.display())]
    BinaryNotFound { name: String, dir: PathBuf },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for binfetch operations.
pub type Result<T> = std::result::Result<T, BinfetchError>;

impl From<std::io::Error> for BinfetchError {
    fn from(err: std::io::Error) -> Self {
        BinfetchError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BinfetchError {
    fn from(err: serde_json::Error) -> Self {
        BinfetchError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for BinfetchError {
    fn from(err: reqwest::Error) -> Self {
        BinfetchError::Transport {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BinfetchError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        BinfetchError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for network-level failures that another attempt could fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BinfetchError::Transport { .. })
    }

    /// True when the resolver ran but nothing fit the platform.
    pub fn is_no_match(&self) -> bool {
        matches!(
            self,
            BinfetchError::NoStandardMatch { .. }
                | BinfetchError::NoFlexibleMatch { .. }
                | BinfetchError::NoCustomMatch { .. }
                | BinfetchError::AllAssetsExcluded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BinfetchError::NoFlexibleMatch {
            os: "linux".into(),
            arch: "amd64".into(),
        };
        assert_eq!(
            err.to_string(),
            "No suitable asset found for linux/amd64 using flexible matching"
        );
    }

    #[test]
    fn test_excluded_error_reports_assets_and_patterns() {
        let err = BinfetchError::AllAssetsExcluded {
            assets: vec!["a.asc".into(), "b.sha256".into()],
            patterns: vec![r"\.asc$".into(), r"\.sha256$".into()],
        };
        let message = err.to_string();
        assert!(message.contains("All 2 assets"));
        assert!(message.contains("a.asc"));
        assert!(message.contains(r"\\.sha256$"));
    }

    #[test]
    fn test_max_retries_display() {
        let err = BinfetchError::MaxRetriesExceeded {
            attempts: 4,
            last_error: "HTTP 503".into(),
        };
        assert_eq!(err.to_string(), "Request failed after 4 attempts: HTTP 503");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(BinfetchError::Transport {
            message: "connection reset".into(),
            source: None,
        }
        .is_retryable());
        assert!(!BinfetchError::CircuitOpen {
            domain: "example.com".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_no_match_classification() {
        assert!(BinfetchError::NoCustomMatch {
            os: "linux".into(),
            arch: "arm64".into()
        }
        .is_no_match());
        assert!(!BinfetchError::NoAssetsProvided.is_no_match());
    }
}
