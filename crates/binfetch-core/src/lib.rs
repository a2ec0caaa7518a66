//! binfetch core - platform-aware release asset resolution and download.
//!
//! Given the asset names of a release and a declarative [`MatchingConfig`],
//! the [`AssetMatcher`] picks the artifact built for a target OS and
//! architecture, or builds a CDN URL for it. The resilient transport,
//! release API clients and installer turn that answer into an installed
//! binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use binfetch_core::{AssetMatcher, MatchingConfig, Platform};
//!
//! let matcher = AssetMatcher::for_platform(MatchingConfig::default(), Platform::new("linux", "amd64"));
//! let chosen = matcher.resolve(&[
//!     "tool_1.0.0_darwin_arm64.tar.gz",
//!     "tool_1.0.0_linux_amd64.tar.gz",
//! ])?;
//! assert_eq!(chosen.as_str(), "tool_1.0.0_linux_amd64.tar.gz");
//! ```

pub mod cdn;
pub mod config;
pub mod error;
pub mod install;
pub mod matcher;
pub mod network;
pub mod platform;
pub mod release;

// Re-export commonly used types
pub use cdn::{CdnDownloader, CdnUrlBuilder, VersionFormat};
pub use error::{BinfetchError, Result};
pub use install::{InstallLayout, InstalledBinary, LinkKind};
pub use matcher::{
    preset, preset_names, AssetMatcher, ExtractionHint, MatchingConfig, MatchingStrategy,
    Resolution,
};
pub use network::{CircuitBreaker, DownloadManager, ResilientClient, TransportConfig};
pub use platform::Platform;
pub use release::{
    BinaryUpdater, DownloadTarget, DownloadedArtifact, GitHubClient, GitLabClient, ReleaseInfo,
    ReleaseSource,
};
