use std::sync::Arc;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::fetch::FetchSettings;
use crate::types::{map_reqwest_error, FailureKind, FetchError, Retryable};

pub const DEFAULT_CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Error)]
pub enum CdnError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("upload rejected: {0}")]
    Rejected(String),
}

impl Retryable for CdnError {
    fn is_transient(&self) -> bool {
        match self {
            CdnError::Transport(err) => err.is_transient(),
            CdnError::Rejected(_) => false,
        }
    }
}

/// Where rehosted images end up. Uploading the same `public_id` twice
/// replaces the first object.
#[async_trait::async_trait]
pub trait CdnStore: Send + Sync {
    /// Upload `bytes` and return the public HTTPS URL.
    async fn upload(&self, bytes: Bytes, public_id: &str, folder: &str) -> Result<String, CdnError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Cloudinary request signature: the parameters sorted by name, joined as
/// `k=v&k=v`, with the secret appended, SHA-1 hex encoded.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadFailure>,
}

#[derive(Debug, Deserialize)]
struct UploadFailure {
    message: String,
}

type UnixClock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct CloudinaryStore {
    client: reqwest::Client,
    credentials: CloudinaryCredentials,
    base_url: String,
    clock: UnixClock,
}

impl CloudinaryStore {
    pub fn new(credentials: CloudinaryCredentials, settings: &FetchSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: settings.build_client()?,
            credentials,
            base_url: DEFAULT_CLOUDINARY_BASE_URL.to_string(),
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.base_url, self.credentials.cloud_name)
    }
}

#[async_trait::async_trait]
impl CdnStore for CloudinaryStore {
    async fn upload(&self, bytes: Bytes, public_id: &str, folder: &str) -> Result<String, CdnError> {
        let signed = vec![
            ("folder", folder.to_string()),
            ("overwrite", "true".to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", (self.clock)().to_string()),
        ];
        let signature = sign_params(&signed, &self.credentials.api_secret);

        let mut form = Form::new().part(
            "file",
            Part::bytes(bytes.to_vec()).file_name(public_id.to_string()),
        );
        for (name, value) in signed {
            form = form.text(name, value);
        }
        form = form
            .text("api_key", self.credentials.api_key.clone())
            .text("signature", signature);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body: Option<UploadResponse> = response.json().await.ok();

        if status.is_server_error() || status.as_u16() == 429 {
            return Err(FetchError::from_status(status).into());
        }
        match body {
            Some(UploadResponse {
                secure_url: Some(url),
                ..
            }) if status.is_success() => Ok(url),
            Some(UploadResponse {
                error: Some(failure),
                ..
            }) => Err(CdnError::Rejected(failure.message)),
            Some(_) if status.is_success() => Err(CdnError::Rejected(
                "response has no secure_url".to_string(),
            )),
            _ if status.is_success() => Err(FetchError::new(
                FailureKind::Decode,
                "upload response is not JSON",
            )
            .into()),
            _ => Err(CdnError::Rejected(format!("http status {status}"))),
        }
    }
}
