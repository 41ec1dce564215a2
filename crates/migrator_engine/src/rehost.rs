use std::sync::Arc;

use thiserror::Error;

use crate::cdn::{CdnError, CdnStore};
use crate::fetch::ImageFetcher;
use crate::filename::cdn_public_id;
use crate::retry::RetryPolicy;
use crate::sanitize::remote_image_url;
use crate::types::{FailureKind, FetchError};

pub const DEFAULT_CDN_FOLDER: &str = "newsletter_migrator";

#[derive(Debug, Error)]
pub enum RehostError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    Download(FetchError),
    #[error("upload failed: {0}")]
    Upload(#[from] CdnError),
}

/// Copies one remote image onto the CDN under a deterministic key.
pub struct ImageRehoster {
    fetcher: Arc<dyn ImageFetcher>,
    store: Arc<dyn CdnStore>,
    folder: String,
    retry: RetryPolicy,
}

impl ImageRehoster {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, store: Arc<dyn CdnStore>) -> Self {
        Self {
            fetcher,
            store,
            folder: DEFAULT_CDN_FOLDER.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Download `src` and upload it; returns the hosted URL.
    pub async fn rehost(&self, src: &str, title: &str) -> Result<String, RehostError> {
        let url = remote_image_url(src).ok_or_else(|| {
            RehostError::Download(FetchError::new(FailureKind::InvalidUrl, src.to_string()))
        })?;
        let url = url.as_str();

        let image = self
            .retry
            .run(&format!("download {url}"), || self.fetcher.fetch_image(url))
            .await
            .map_err(|err| {
                if err.kind.is_not_found() {
                    RehostError::NotFound(url.to_string())
                } else {
                    RehostError::Download(err)
                }
            })?;

        let public_id = cdn_public_id(title, url);
        let hosted = self
            .retry
            .run(&format!("upload {public_id}"), || {
                self.store
                    .upload(image.bytes.clone(), &public_id, &self.folder)
            })
            .await?;
        Ok(hosted)
    }
}
