use std::fs;
use std::path::{Path, PathBuf};

use reqwest::header::COOKIE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::FetchSettings;
use crate::types::{ensure_success, map_reqwest_error, FetchError, Retryable};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot read cookies {path}: {source}")]
    CookiesUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cookies {path} are not a JSON array of name/value pairs: {source}")]
    CookiesInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cookies {0} contain no cookies")]
    CookiesEmpty(PathBuf),
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("draft rejected: {0}")]
    Rejected(String),
}

impl Retryable for PublishError {
    fn is_transient(&self) -> bool {
        match self {
            PublishError::Transport(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Creates an unpublished draft on the destination platform.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, title: &str, markdown: &str) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Deserialize)]
struct BrowserCookie {
    name: String,
    value: String,
}

/// Session cookies exported from a logged-in browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookies {
    pairs: Vec<(String, String)>,
}

impl SessionCookies {
    pub fn load(path: &Path) -> Result<Self, PublishError> {
        let text = fs::read_to_string(path).map_err(|source| PublishError::CookiesUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|err| match err {
            PublishError::CookiesInvalid { source, .. } => PublishError::CookiesInvalid {
                path: path.to_path_buf(),
                source,
            },
            PublishError::CookiesEmpty(_) => PublishError::CookiesEmpty(path.to_path_buf()),
            other => other,
        })
    }

    pub fn parse(json: &str) -> Result<Self, PublishError> {
        let cookies: Vec<BrowserCookie> =
            serde_json::from_str(json).map_err(|source| PublishError::CookiesInvalid {
                path: PathBuf::new(),
                source,
            })?;
        let pairs: Vec<(String, String)> = cookies
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .map(|c| (c.name, c.value))
            .collect();
        if pairs.is_empty() {
            return Err(PublishError::CookiesEmpty(PathBuf::new()));
        }
        Ok(Self { pairs })
    }

    /// `name=value; name=value`
    pub fn header_value(&self) -> String {
        self.pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Serialize)]
struct DraftRequest<'a> {
    title: &'a str,
    body_markdown: &'a str,
    draft: bool,
}

/// Posts drafts to an HTTP endpoint using a replayed browser session.
#[derive(Debug, Clone)]
pub struct HttpDraftPublisher {
    client: reqwest::Client,
    endpoint: String,
    cookies: SessionCookies,
}

impl HttpDraftPublisher {
    pub fn new(
        endpoint: impl Into<String>,
        cookies: SessionCookies,
        settings: &FetchSettings,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            client: settings.build_client()?,
            endpoint: endpoint.into(),
            cookies,
        })
    }
}

#[async_trait::async_trait]
impl Publisher for HttpDraftPublisher {
    async fn publish(&self, title: &str, markdown: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(COOKIE, self.cookies.header_value())
            .json(&DraftRequest {
                title,
                body_markdown: markdown,
                draft: true,
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_client_error() && status.as_u16() != 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected(format!("{status}: {}", body.trim())));
        }
        ensure_success(response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PublishError, SessionCookies};

    #[test]
    fn browser_export_becomes_cookie_header() {
        let cookies = SessionCookies::parse(
            r#"[{"name":"sid","value":"abc","domain":".example.com"},{"name":"csrf","value":"x1"}]"#,
        )
        .unwrap();
        assert_eq!(cookies.header_value(), "sid=abc; csrf=x1");
    }

    #[test]
    fn empty_or_malformed_exports_are_rejected() {
        assert!(matches!(
            SessionCookies::parse("[]"),
            Err(PublishError::CookiesEmpty(_))
        ));
        assert!(matches!(
            SessionCookies::parse(r#"{"sid":"abc"}"#),
            Err(PublishError::CookiesInvalid { .. })
        ));
    }
}
