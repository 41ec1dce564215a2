use migrator_core::{Campaign, CampaignId};
use migrator_logging::migrator_debug;
use serde::Deserialize;
use thiserror::Error;

use crate::fetch::FetchSettings;
use crate::types::{ensure_success, map_reqwest_error, FailureKind, FetchError, Retryable};

pub const DEFAULT_BREVO_BASE_URL: &str = "https://api.brevo.com/v3";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("campaign {0} has no HTML content")]
    MissingContent(CampaignId),
}

impl Retryable for SourceError {
    fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport(err) => err.is_transient(),
            SourceError::MissingContent(_) => false,
        }
    }
}

impl SourceError {
    /// The source refused the credentials or the base URL is unusable; no
    /// later run will succeed without a configuration change.
    pub fn is_setup_failure(&self) -> bool {
        match self {
            SourceError::Transport(err) => matches!(
                err.kind,
                FailureKind::HttpStatus(401 | 403) | FailureKind::InvalidUrl
            ),
            SourceError::MissingContent(_) => false,
        }
    }
}

/// Where sent campaigns come from.
#[async_trait::async_trait]
pub trait CampaignSource: Send + Sync {
    /// Every sent campaign, oldest first.
    async fn list_sent_campaigns(&self) -> Result<Vec<Campaign>, SourceError>;

    /// HTML body of one campaign. May be empty; the caller decides what that means.
    async fn fetch_html(&self, id: &CampaignId) -> Result<String, SourceError>;
}

#[derive(Debug, Deserialize)]
struct CampaignPage {
    #[serde(default)]
    campaigns: Vec<CampaignSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CampaignSummary {
    id: CampaignId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    sent_date: Option<String>,
}

impl CampaignSummary {
    fn into_campaign(self) -> Campaign {
        let subject = if self.subject.trim().is_empty() {
            self.name
        } else {
            self.subject
        };
        let campaign = Campaign::new(self.id, subject);
        match self.sent_date {
            Some(sent) => campaign.with_sent_at(sent),
            None => campaign,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CampaignDetail {
    #[serde(default)]
    html_content: Option<String>,
}

/// Brevo v3 email campaigns API.
#[derive(Debug, Clone)]
pub struct BrevoSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl BrevoSource {
    pub fn new(api_key: impl Into<String>, settings: &FetchSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: settings.build_client()?,
            api_key: api_key.into(),
            base_url: DEFAULT_BREVO_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let mut url = reqwest::Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let response = self
            .client
            .get(url)
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response)?;
        response
            .json::<T>()
            .await
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

/// Oldest first; campaigns without a send date go last.
pub fn sort_by_sent_date(campaigns: &mut [Campaign]) {
    campaigns.sort_by(|a, b| match (&a.sent_at, &b.sent_at) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[async_trait::async_trait]
impl CampaignSource for BrevoSource {
    async fn list_sent_campaigns(&self) -> Result<Vec<Campaign>, SourceError> {
        let mut campaigns = Vec::new();
        let mut offset = 0;
        loop {
            let page: CampaignPage = self
                .get_json(
                    "emailCampaigns",
                    &[
                        ("type", "classic".to_string()),
                        ("status", "sent".to_string()),
                        ("limit", PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;
            let received = page.campaigns.len();
            migrator_debug!("Campaign page at offset {}: {} items", offset, received);
            campaigns.extend(page.campaigns.into_iter().map(CampaignSummary::into_campaign));
            if received < PAGE_SIZE {
                break;
            }
            offset += received;
        }
        sort_by_sent_date(&mut campaigns);
        Ok(campaigns)
    }

    async fn fetch_html(&self, id: &CampaignId) -> Result<String, SourceError> {
        let detail: CampaignDetail = self
            .get_json(&format!("emailCampaigns/{}", id.as_str()), &[])
            .await?;
        detail
            .html_content
            .ok_or_else(|| SourceError::MissingContent(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use migrator_core::Campaign;

    use super::sort_by_sent_date;

    #[test]
    fn undated_campaigns_sort_last() {
        let mut campaigns = vec![
            Campaign::new("3", "c"),
            Campaign::new("2", "b").with_sent_at("2024-02-01T08:00:00Z"),
            Campaign::new("1", "a").with_sent_at("2023-11-05T08:00:00Z"),
        ];
        sort_by_sent_date(&mut campaigns);
        let ids: Vec<&str> = campaigns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
