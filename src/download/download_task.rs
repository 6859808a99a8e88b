use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

#[derive(Debug)]
pub struct CompletedDownload {
    /// The destination the file was saved at
    pub saved_at: PathBuf,
    /// Number of bytes written
    pub written: usize,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Error whilst writing to file: {0}")]
    FileError(#[source] std::io::Error),
    #[error("Destination is not a valid file path: {0}")]
    InvalidDestination(PathBuf),
    #[error("Error performing HTTP request: {0}")]
    RequestError(
        #[source]
        #[from]
        reqwest::Error,
    ),
    #[error("Received unsuccessful response code {0} for {1}")]
    BadResponse(u16, Url),
}

pub struct DownloadTask<'a> {
    /// HTTP connection pool
    pub client: &'a Client,
    /// Url to download
    pub url: Url,
    /// Path to save the file at, replaced if it already exists
    pub destination: PathBuf,
}

impl DownloadTask<'_> {
    pub async fn download(self) -> Result<CompletedDownload, DownloadError> {
        let parent = self
            .destination
            .parent()
            .ok_or_else(|| DownloadError::InvalidDestination(self.destination.clone()))?;
        let mut response = self.client.get(self.url.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(DownloadError::BadResponse(
                response.status().as_u16(),
                self.url,
            ));
        }
        let temp = NamedTempFile::new_in(parent).map_err(DownloadError::FileError)?;
        let mut file = File::from_std(temp.reopen().map_err(DownloadError::FileError)?);
        let mut written = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len();
            file.write_all(chunk.as_ref())
                .await
                .map_err(DownloadError::FileError)?;
        }
        file.flush().await.map_err(DownloadError::FileError)?;
        temp.persist(&self.destination)
            .map_err(|e| DownloadError::FileError(e.error))?;
        Ok(CompletedDownload {
            saved_at: self.destination,
            written,
        })
    }
}
