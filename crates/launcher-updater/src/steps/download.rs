//! Download files to disk with streaming progress.

use std::path::{Path, PathBuf};

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, UpdateError};

/// Download progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub downloaded: u64,
    /// Total bytes, when the server announced a length.
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Returns the progress as a percentage (0 to 100).
    ///
    /// Unknown totals report 0 until the download completes.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        match self.total {
            Some(0) => 100,
            Some(total) => (self.downloaded.saturating_mul(100) / total).min(100) as u8,
            None => 0,
        }
    }
}

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Where the payload was written.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Item yielded by [`download_to_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStreamItem {
    /// Percent complete; never decreases within one download.
    Progress(u8),
    /// The file is fully written and synced.
    Complete(DownloadResult),
}

/// Streams `url` into `destination`, yielding percent-complete events.
///
/// An existing file at `destination` is truncated. If the transfer fails
/// part-way, the partial file is left on disk and the stream yields a
/// [`UpdateError::Download`].
pub fn download_to_file(
    client: reqwest::Client,
    url: String,
    destination: PathBuf,
) -> impl Stream<Item = Result<DownloadStreamItem>> + Send + 'static {
    stream! {
        tracing::info!("Downloading {} to {}", url, destination.display());
        let fail = |reason: String| UpdateError::Download {
            file: url.clone(),
            reason,
        };

        let response = match client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                yield Err(fail(e.to_string()));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            yield Err(fail(format!("server returned {status}")));
            return;
        }

        if let Some(parent) = destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                yield Err(fail(format!("cannot create {}: {e}", parent.display())));
                return;
            }
        }

        let mut file = match tokio::fs::File::create(&destination).await {
            Ok(f) => f,
            Err(e) => {
                yield Err(fail(format!("cannot create {}: {e}", destination.display())));
                return;
            }
        };

        let mut progress = DownloadProgress {
            downloaded: 0,
            total: response.content_length(),
        };
        let mut last_percent = 0u8;
        yield Ok(DownloadStreamItem::Progress(0));

        let mut body = response.bytes_stream();
        while let Some(chunk_result) = body.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    let _ = file.flush().await;
                    tracing::warn!(
                        "Download of {} interrupted after {}; partial file kept at {}",
                        url,
                        format_bytes(progress.downloaded),
                        destination.display()
                    );
                    yield Err(fail(e.to_string()));
                    return;
                }
            };

            if let Err(e) = file.write_all(&chunk).await {
                yield Err(fail(format!("cannot write {}: {e}", destination.display())));
                return;
            }
            progress.downloaded += chunk.len() as u64;

            let percent = progress.percentage();
            if percent > last_percent {
                last_percent = percent;
                yield Ok(DownloadStreamItem::Progress(percent));
            }
        }

        if let Some(total) = progress.total {
            if progress.downloaded < total {
                let _ = file.flush().await;
                yield Err(fail(format!(
                    "connection closed after {} of {} bytes",
                    progress.downloaded, total
                )));
                return;
            }
        }

        if let Err(e) = async {
            file.flush().await?;
            file.sync_all().await
        }
        .await
        {
            yield Err(fail(format!("cannot sync {}: {e}", destination.display())));
            return;
        }

        if last_percent < 100 {
            yield Ok(DownloadStreamItem::Progress(100));
        }

        tracing::info!("Download complete: {}", format_bytes(progress.downloaded));
        yield Ok(DownloadStreamItem::Complete(DownloadResult {
            path: destination.clone(),
            bytes: progress.downloaded,
        }));
    }
}

/// Downloads `url` into `destination`, reporting percentages to `on_progress`.
pub async fn download_file<F>(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    mut on_progress: F,
) -> Result<DownloadResult>
where
    F: FnMut(u8),
{
    let mut stream = std::pin::pin!(download_to_file(
        client.clone(),
        url.to_string(),
        destination.to_path_buf()
    ));
    while let Some(item) = stream.next().await {
        match item? {
            DownloadStreamItem::Progress(percent) => on_progress(percent),
            DownloadStreamItem::Complete(result) => return Ok(result),
        }
    }
    Err(UpdateError::Download {
        file: url.to_string(),
        reason: "download ended without completing".to_string(),
    })
}

/// Format bytes as a human-readable string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Serves one response announcing `declared` bytes, sends `sent` and hangs up.
    fn serve_truncated(declared: usize, sent: usize) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {declared}\r\n\r\n"
            );
            socket.write_all(head.as_bytes()).unwrap();
            socket.write_all(&vec![b'z'; sent]).unwrap();
            socket.flush().unwrap();
            std::thread::sleep(Duration::from_millis(100));
        });
        format!("http://{addr}/updates/update_1.0.0.1.zip")
    }

    #[tokio::test]
    async fn test_progress_rises_to_complete_and_replaces_stale_file() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
        Mock::given(method("GET"))
            .and(path("/updates/update_1.0.0.1.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("updates").join("update_1.0.0.1.zip");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, vec![0xff; 512 * 1024]).unwrap();

        let items: Vec<_> = download_to_file(
            reqwest::Client::new(),
            format!("{}/updates/update_1.0.0.1.zip", server.uri()),
            destination.clone(),
        )
        .collect()
        .await;

        let mut percents = Vec::new();
        let mut complete = None;
        for (position, item) in items.iter().enumerate() {
            match item.as_ref().unwrap() {
                DownloadStreamItem::Progress(percent) => percents.push(*percent),
                DownloadStreamItem::Complete(result) => {
                    assert_eq!(position, items.len() - 1, "Complete must come last");
                    complete = Some(result.clone());
                }
            }
        }

        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));

        let result = complete.unwrap();
        assert_eq!(result.path, destination);
        assert_eq!(result.bytes, body.len() as u64);
        assert_eq!(fs::read(&destination).unwrap(), body);
    }

    #[tokio::test]
    async fn test_short_body_keeps_partial_file() {
        let url = serve_truncated(1000, 100);
        let dir = tempdir().unwrap();
        let destination = dir.path().join("update_1.0.0.1.zip");

        let mut percents = Vec::new();
        let err = download_file(&reqwest::Client::new(), &url, &destination, |p| {
            percents.push(p);
        })
        .await
        .unwrap_err();

        assert!(matches!(err, UpdateError::Download { .. }));
        assert_eq!(fs::metadata(&destination).unwrap().len(), 100);
        assert!(!percents.contains(&100));
    }

    #[tokio::test]
    async fn test_error_status_is_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let err = download_file(
            &reqwest::Client::new(),
            &format!("{}/updates/missing.zip", server.uri()),
            &dir.path().join("missing.zip"),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UpdateError::Download { .. }));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(52_428_800), "50.0 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_download_progress_percentage() {
        let progress = DownloadProgress {
            downloaded: 250,
            total: Some(1000),
        };
        assert_eq!(progress.percentage(), 25);

        let unknown = DownloadProgress {
            downloaded: 250,
            total: None,
        };
        assert_eq!(unknown.percentage(), 0);

        let empty = DownloadProgress {
            downloaded: 0,
            total: Some(0),
        };
        assert_eq!(empty.percentage(), 100);

        let overshoot = DownloadProgress {
            downloaded: 2000,
            total: Some(1000),
        };
        assert_eq!(overshoot.percentage(), 100);
    }
}
