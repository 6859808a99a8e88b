use crate::download::download_task::{DownloadError, DownloadTask};
use crate::weibo::container::BROWSER_USER_AGENT;
use crate::weibo::header_map;
use chrono::Local;
use maplit::hashmap;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

mod download_task;

pub const DEFAULT_PIC_DIR: &str = "pic";

const FILENAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub struct ImageDownloader {
    client: Client,
}

impl ImageDownloader {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let headers = header_map(hashmap! {
            USER_AGENT => BROWSER_USER_AGENT,
            ACCEPT => "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ACCEPT_LANGUAGE => "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7",
            REFERER => "https://weibo.com/",
        });
        Ok(Self {
            client: Client::builder()
                .default_headers(headers)
                .timeout(timeout)
                .build()?,
        })
    }

    /// Saves each image under `target_dir` as `{timestamp}.jpg`, one at a time.
    ///
    /// Failures are logged and skipped. Images finishing within the same second
    /// share a filename and the later one wins.
    pub async fn download(&self, image_urls: &[Url], target_dir: &Path) -> Vec<PathBuf> {
        let mut saved = Vec::new();
        for url in image_urls {
            let destination = target_dir.join(timestamped_filename());
            let task = DownloadTask {
                client: &self.client,
                url: url.clone(),
                destination,
            };
            match task.download().await {
                Ok(completed) => {
                    log::info!(
                        "Saved image {} ({} bytes)",
                        completed.saved_at.display(),
                        completed.written
                    );
                    saved.push(completed.saved_at);
                }
                Err(DownloadError::BadResponse(code, url)) => {
                    log::error!("Failed to fetch image, status code {}: {}", code, url);
                }
                Err(e) => {
                    log::error!("Failed to download image {}: {}", url, e);
                }
            }
        }
        saved
    }
}

fn timestamped_filename() -> String {
    format!("{}.jpg", Local::now().format(FILENAME_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::TestServer;

    #[test]
    fn filename_has_second_resolution() {
        let name = timestamped_filename();
        assert!(name.ends_with(".jpg"));
        // 2026-10-19_10-00-00.jpg
        assert_eq!(name.len(), 23);
    }

    #[tokio::test]
    async fn failed_image_is_skipped() {
        let server = TestServer::start(|target| {
            if target.ends_with("missing.jpg") {
                (404, b"not found".to_vec())
            } else {
                (200, vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])
            }
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let downloader = ImageDownloader::new(Duration::from_secs(5)).unwrap();

        let saved = downloader
            .download(
                &[server.url("large/missing.jpg"), server.url("large/present.jpg")],
                dir.path(),
            )
            .await;

        assert_eq!(saved.len(), 1);
        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files, saved);
        assert_eq!(
            std::fs::read(&saved[0]).unwrap(),
            vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3]
        );
    }

    #[tokio::test]
    async fn missing_directory_is_logged_not_fatal() {
        let server = TestServer::start(|_| (200, vec![1, 2, 3])).await;
        let dir = tempfile::tempdir().unwrap();
        let downloader = ImageDownloader::new(Duration::from_secs(5)).unwrap();
        let saved = downloader
            .download(&[server.url("a.jpg")], &dir.path().join("absent"))
            .await;
        assert!(saved.is_empty());
    }
}
