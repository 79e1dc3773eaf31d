//! Image attachment downloads
//!
//! Each transfer is isolated: whatever goes wrong is logged and reported as an
//! [`AttachmentOutcome`], never as an error, so one bad attachment cannot stop a board.

use crate::config::{ExportConfig, RetryConfig, TimeoutConfig};
use crate::error::AttachmentError;
use crate::jira::JiraClient;
use crate::retry::{parse_retry_after, with_retry};
use crate::utils::body_preview;
use futures::StreamExt;
use rand::Rng;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// What happened to one attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// Transferred in this run
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
    /// A non-empty file was already at the destination; nothing was requested
    AlreadyPresent,
    /// Gave up (permanent error or attempts exhausted); details are in the log
    Failed,
}

impl AttachmentOutcome {
    /// Whether the image is on disk after this outcome
    pub fn is_saved(&self) -> bool {
        !matches!(self, AttachmentOutcome::Failed)
    }
}

/// Downloads attachment content with pacing, resumability and retries
#[derive(Clone, Debug)]
pub struct AttachmentDownloader {
    client: JiraClient,
    retry: RetryConfig,
    timeout: Duration,
    pace_min: Duration,
    pace_max: Duration,
}

impl AttachmentDownloader {
    /// Create a downloader using the export's retry and pacing settings
    pub fn new(client: JiraClient, export: &ExportConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            client,
            retry: export.attachment_retry.clone(),
            timeout: timeouts.download,
            pace_min: export.pace_min,
            pace_max: export.pace_max,
        }
    }

    /// Save the content at `url` to `dest`
    ///
    /// Skips the transfer entirely when `dest` already holds data. The content is streamed
    /// into a `.part` sibling and renamed on completion, so an interrupted transfer never
    /// looks like a finished one.
    pub async fn download(&self, url: &str, dest: &Path) -> AttachmentOutcome {
        if is_present(dest).await {
            tracing::debug!(dest = %dest.display(), "attachment already on disk, skipping");
            return AttachmentOutcome::AlreadyPresent;
        }

        if let Some(parent) = dest.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(dest = %dest.display(), error = %e, "cannot create attachment folder");
            return AttachmentOutcome::Failed;
        }

        self.pace().await;

        let result = with_retry(&self.retry, "attachment download", move || {
            self.attempt(url, dest)
        })
        .await;

        match result {
            Ok(bytes) => {
                tracing::debug!(url, dest = %dest.display(), bytes, "attachment saved");
                AttachmentOutcome::Downloaded { bytes }
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "giving up on attachment");
                AttachmentOutcome::Failed
            }
        }
    }

    async fn attempt(&self, url: &str, dest: &Path) -> Result<u64, AttachmentError> {
        let response = self
            .client
            .get_binary(url, self.timeout)
            .send()
            .await
            .map_err(|source| AttachmentError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(AttachmentError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: body_preview(&body),
                retry_after,
            });
        }

        let partial = partial_path(dest);
        let result = write_body(response, url, &partial, dest).await;
        if result.is_err() {
            discard_partial(&partial).await;
        }
        result
    }

    /// Random pause in `[pace_min, pace_max)` to stay under the rate limit
    async fn pace(&self) {
        let delay = if self.pace_max > self.pace_min {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.pace_min..self.pace_max)
        } else {
            self.pace_min
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Stream the response into `partial`, then move it to `dest`
async fn write_body(
    response: reqwest::Response,
    url: &str,
    partial: &Path,
    dest: &Path,
) -> Result<u64, AttachmentError> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(write_error(partial))?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| AttachmentError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk).await.map_err(write_error(partial))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(write_error(partial))?;
    drop(file);

    tokio::fs::rename(partial, dest).await.map_err(write_error(dest))?;
    Ok(written)
}

/// Best-effort removal of a half-written `.part` file
async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                path = %partial.display(),
                error = %e,
                "cannot remove partial download"
            );
        }
    }
}

async fn is_present(dest: &Path) -> bool {
    tokio::fs::metadata(dest)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> AttachmentError {
    let path = path.to_path_buf();
    move |source| AttachmentError::Write { path, source }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JiraConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(40),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn downloader(server: &MockServer, retry: RetryConfig) -> AttachmentDownloader {
        let jira = JiraConfig {
            base_url: Some(server.uri()),
            email: Some("bot@example.com".into()),
            api_token: Some("token".into()),
            auth_header: None,
        };
        let client = JiraClient::new(&jira, &TimeoutConfig::default()).unwrap();
        let export = ExportConfig {
            attachment_retry: retry,
            pace_min: Duration::ZERO,
            pace_max: Duration::ZERO,
            ..ExportConfig::default()
        };
        AttachmentDownloader::new(client, &export, &TimeoutConfig::default())
    }

    #[tokio::test]
    async fn downloads_and_writes_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/attachment/content/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("images").join("shot.png");
        let outcome = downloader(&server, fast_retry(8))
            .download(&format!("{}/attachment/content/1", server.uri()), &dest)
            .await;

        assert_eq!(outcome, AttachmentOutcome::Downloaded { bytes: 4096 });
        assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 4096]);
        assert!(!partial_path(&dest).exists(), "temporary file is renamed away");
    }

    #[tokio::test]
    async fn existing_file_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("shot.png");
        std::fs::write(&dest, b"old").unwrap();

        let outcome = downloader(&server, fast_retry(8))
            .download(&format!("{}/attachment/content/1", server.uri()), &dest)
            .await;

        assert_eq!(outcome, AttachmentOutcome::AlreadyPresent);
        assert_eq!(std::fs::read(&dest).unwrap(), b"old");
    }

    #[tokio::test]
    async fn empty_existing_file_is_downloaded_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("shot.png");
        std::fs::write(&dest, b"").unwrap();

        let outcome = downloader(&server, fast_retry(8))
            .download(&format!("{}/a", server.uri()), &dest)
            .await;

        assert_eq!(outcome, AttachmentOutcome::Downloaded { bytes: 4 });
    }

    #[tokio::test]
    async fn permanent_statuses_are_not_retried() {
        for status in [401u16, 403, 404] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status))
                .expect(1)
                .mount(&server)
                .await;

            let temp = TempDir::new().unwrap();
            let dest = temp.path().join("shot.png");
            let outcome = downloader(&server, fast_retry(8))
                .download(&format!("{}/a", server.uri()), &dest)
                .await;

            assert_eq!(outcome, AttachmentOutcome::Failed, "status {status}");
            assert!(!dest.exists());
        }
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(8)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("shot.png");
        let outcome = downloader(&server, fast_retry(8))
            .download(&format!("{}/a", server.uri()), &dest)
            .await;

        assert_eq!(outcome, AttachmentOutcome::Failed);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("shot.png");
        let outcome = downloader(&server, fast_retry(8))
            .download(&format!("{}/a", server.uri()), &dest)
            .await;

        assert_eq!(outcome, AttachmentOutcome::Downloaded { bytes: 3 });
    }

    #[tokio::test]
    async fn retry_after_header_is_honored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".to_vec()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("shot.png");
        let start = std::time::Instant::now();
        let outcome = downloader(&server, fast_retry(8))
            .download(&format!("{}/a", server.uri()), &dest)
            .await;

        assert_eq!(outcome, AttachmentOutcome::Downloaded { bytes: 3 });
        assert!(
            start.elapsed() >= Duration::from_secs(1),
            "second attempt must wait for Retry-After, waited {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn failed_write_removes_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        // A non-empty directory at the destination makes the final rename fail
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("shot.png");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep"), b"x").unwrap();

        let outcome = downloader(&server, fast_retry(8))
            .download(&format!("{}/a", server.uri()), &dest)
            .await;

        assert_eq!(outcome, AttachmentOutcome::Failed);
        assert!(!partial_path(&dest).exists(), "partial file is cleaned up");
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/x/images/a.png")),
            PathBuf::from("/x/images/a.png.part")
        );
    }

    #[test]
    fn only_failures_are_unsaved() {
        assert!(AttachmentOutcome::Downloaded { bytes: 1 }.is_saved());
        assert!(AttachmentOutcome::AlreadyPresent.is_saved());
        assert!(!AttachmentOutcome::Failed.is_saved());
    }
}
