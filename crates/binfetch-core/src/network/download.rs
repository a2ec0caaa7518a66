//! Streaming downloads over the resilient transport.
//!
//! Bodies are streamed to `<destination>.part` and renamed into place only
//! once the stream completes, so a failed download never leaves a truncated
//! file at the destination.

use super::client::ResilientClient;
use crate::config::NetworkConfig;
use crate::error::{BinfetchError, Result};
use futures::StreamExt;
use reqwest::Response;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Download manager for release artifacts.
#[derive(Clone)]
pub struct DownloadManager {
    client: Arc<ResilientClient>,
    timeout: Duration,
    temp_suffix: String,
}

impl DownloadManager {
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self {
            client,
            timeout: NetworkConfig::CDN_DOWNLOAD_TIMEOUT,
            temp_suffix: NetworkConfig::DOWNLOAD_TEMP_SUFFIX.to_string(),
        }
    }

    /// Per-attempt timeout for the download request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Download `url` to `destination`, returning the bytes written.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        headers: &[(String, String)],
    ) -> Result<u64> {
        let response = self
            .client
            .get_with_timeout(url, headers, self.timeout)
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BinfetchError::DownloadFailed {
                url: url.to_string(),
                message: format!("server returned {}", status),
            });
        }

        self.save_response(response, destination).await
    }

    /// Stream a response body to `destination` via a temp file.
    pub async fn save_response(&self, response: Response, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BinfetchError::io_with_path(e, parent))?;
            }
        }

        let temp_path = PathBuf::from(format!("{}{}", destination.display(), self.temp_suffix));

        match write_body(response, &temp_path).await {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::rename(&temp_path, destination).await {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(BinfetchError::io_with_path(e, destination));
                }
                info!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }
}

async fn write_body(response: Response, temp_path: &Path) -> Result<u64> {
    let total_bytes = response.content_length();
    let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| BinfetchError::io_with_path(e, temp_path))?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BinfetchError::Transport {
            message: format!("Error reading download stream: {}", e),
            source: Some(e),
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| BinfetchError::io_with_path(e, temp_path))?;
        bytes_downloaded += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| BinfetchError::io_with_path(e, temp_path))?;

    if let Some(total) = total_bytes {
        if total != bytes_downloaded {
            return Err(BinfetchError::Transport {
                message: format!(
                    "download truncated: expected {} bytes, received {}",
                    total, bytes_downloaded
                ),
                source: None,
            });
        }
    }

    debug!("Wrote {} bytes to {}", bytes_downloaded, temp_path.display());
    Ok(bytes_downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::TransportConfig;
    use tempfile::TempDir;

    fn manager() -> DownloadManager {
        let config = TransportConfig::new()
            .with_max_retries(0)
            .with_initial_delay(Duration::from_millis(1));
        DownloadManager::new(Arc::new(ResilientClient::new(config).unwrap()))
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tool.tar.gz")
            .with_status(200)
            .with_body("archive-bytes")
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested").join("tool.tar.gz");
        let bytes = manager()
            .download(&format!("{}/tool.tar.gz", server.url()), &dest, &[])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "archive-bytes");
        assert!(!temp.path().join("nested").join("tool.tar.gz.part").exists());
    }

    #[tokio::test]
    async fn test_download_not_found_leaves_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("missing");
        let err = manager()
            .download(&format!("{}/missing", server.url()), &dest, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, BinfetchError::DownloadFailed { .. }));
        assert!(!dest.exists());
    }
}
