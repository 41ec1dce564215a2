use std::sync::Arc;

use migrator_core::{
    Campaign, CampaignOutcome, CampaignStage, ExportLedger, InvalidTransition, OutcomeKind,
    RunSummary, StageTracker, TitleNormalizer,
};
use migrator_logging::{migrator_debug, migrator_error, migrator_info, migrator_warn};
use thiserror::Error;

use crate::artifact::ArtifactStore;
use crate::ledger_store::{LedgerError, LedgerStore};
use crate::pacing::PacingPolicy;
use crate::persist::PersistError;
use crate::publish::{PublishError, Publisher};
use crate::retry::RetryPolicy;
use crate::source::{CampaignSource, SourceError};
use crate::transform::ContentTransformer;

pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Pending campaigns handled per run; already exported ones do not count.
    pub batch_size: usize,
    pub pacing: PacingPolicy,
    pub retry: RetryPolicy,
    /// Publish an artifact left by an earlier run instead of fetching again.
    pub resume_from_artifacts: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            pacing: PacingPolicy::default(),
            retry: RetryPolicy::default(),
            resume_from_artifacts: false,
        }
    }
}

/// Errors that stop a run before any campaign is touched.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to list campaigns: {0}")]
    Listing(#[from] SourceError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PipelineError {
    /// Bad credentials or an unreadable ledger. A listing outage that
    /// outlasted the retries is not: the next run may succeed as is.
    pub fn is_setup_failure(&self) -> bool {
        match self {
            PipelineError::Listing(err) => err.is_setup_failure(),
            PipelineError::Ledger(_) => true,
        }
    }
}

/// Why one campaign failed. Never escapes the batch loop.
#[derive(Debug, Error)]
enum CampaignError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] SourceError),
    #[error("campaign has no content")]
    EmptyContent,
    #[error("could not save artifact: {0}")]
    Save(#[from] PersistError),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("could not record: {0}")]
    Record(#[from] LedgerError),
    #[error(transparent)]
    Stage(#[from] InvalidTransition),
}

/// A sent campaign and whether the ledger already has it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignStatus {
    pub campaign: Campaign,
    pub title: String,
    pub exported: bool,
}

type DateClock = Arc<dyn Fn() -> String + Send + Sync>;

fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Moves sent campaigns into the artifact directory, the publisher and the
/// ledger, one campaign at a time.
pub struct MigrationPipeline {
    source: Arc<dyn CampaignSource>,
    transformer: ContentTransformer,
    artifacts: ArtifactStore,
    ledger_store: LedgerStore,
    publisher: Option<Arc<dyn Publisher>>,
    titles: TitleNormalizer,
    settings: PipelineSettings,
    clock: DateClock,
}

impl MigrationPipeline {
    pub fn new(
        source: Arc<dyn CampaignSource>,
        transformer: ContentTransformer,
        artifacts: ArtifactStore,
        ledger_store: LedgerStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            transformer,
            artifacts,
            ledger_store,
            publisher: None,
            titles: TitleNormalizer::default(),
            settings,
            clock: Arc::new(local_timestamp),
        }
    }

    /// Without a publisher the pipeline runs export-only: saved campaigns
    /// are recorded straight away.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, SourceError> {
        self.settings
            .retry
            .run("list campaigns", || self.source.list_sent_campaigns())
            .await
    }

    /// Every sent campaign with its exported flag, for reporting.
    pub async fn campaign_statuses(&self) -> Result<Vec<CampaignStatus>, PipelineError> {
        let ledger = self
            .ledger_store
            .read()?
            .map(|parsed| parsed.ledger)
            .unwrap_or_default();
        let campaigns = self.list_campaigns().await?;
        Ok(campaigns
            .into_iter()
            .map(|campaign| CampaignStatus {
                title: self.titles.normalize(&campaign.subject),
                exported: ledger.is_exported(&campaign.id),
                campaign,
            })
            .collect())
    }

    /// One batch. Fails only if the ledger cannot be read or the campaign
    /// listing is unavailable; per-campaign failures end up in the summary.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut ledger = self.ledger_store.load()?;
        let campaigns = self.list_campaigns().await?;
        migrator_info!(
            "{} sent campaigns, {} already exported",
            campaigns.len(),
            ledger.len()
        );

        let mut summary = RunSummary::new();
        let mut handled = 0;
        for campaign in &campaigns {
            let title = self.titles.normalize(&campaign.subject);
            if ledger.is_exported(&campaign.id) {
                migrator_debug!("Skipping {} '{}': already exported", campaign.id, title);
                summary.push(CampaignOutcome {
                    campaign_id: campaign.id.clone(),
                    title,
                    kind: OutcomeKind::Skipped,
                });
                continue;
            }
            if handled >= self.settings.batch_size {
                continue;
            }
            if handled > 0 {
                self.pause().await;
            }
            handled += 1;

            let outcome = self.process(&mut ledger, campaign, title).await;
            migrator_info!("{}", outcome);
            summary.push(outcome);
        }

        migrator_info!("Run finished: {}", summary);
        Ok(summary)
    }

    async fn pause(&self) {
        let delay = self.settings.pacing.next_delay();
        if !delay.is_zero() {
            migrator_info!("Pausing {}s before the next campaign", delay.as_secs());
            tokio::time::sleep(delay).await;
        }
    }

    async fn process(
        &self,
        ledger: &mut ExportLedger,
        campaign: &Campaign,
        title: String,
    ) -> CampaignOutcome {
        let mut tracker = StageTracker::new();
        let kind = match self.migrate(&mut tracker, ledger, campaign, &title).await {
            Ok(()) => OutcomeKind::Recorded,
            Err(err) => {
                let stage = tracker.fail();
                migrator_error!(
                    "Campaign {} '{}' failed after {}: {}",
                    campaign.id,
                    title,
                    stage,
                    err
                );
                OutcomeKind::Failed {
                    stage,
                    reason: err.to_string(),
                }
            }
        };
        CampaignOutcome {
            campaign_id: campaign.id.clone(),
            title,
            kind,
        }
    }

    async fn migrate(
        &self,
        tracker: &mut StageTracker,
        ledger: &mut ExportLedger,
        campaign: &Campaign,
        title: &str,
    ) -> Result<(), CampaignError> {
        let body = match self.resumable_artifact(campaign)? {
            Some(body) => {
                migrator_info!("Campaign {}: reusing saved artifact", campaign.id);
                tracker.advance(CampaignStage::Saved)?;
                body
            }
            None => {
                let body = self.convert(tracker, campaign, title).await?;
                let path = self.artifacts.save(&campaign.id, title, &body)?;
                tracker.advance(CampaignStage::Saved)?;
                migrator_debug!("Campaign {}: saved {:?}", campaign.id, path);
                body
            }
        };

        if let Some(publisher) = &self.publisher {
            self.settings
                .retry
                .run(&format!("publish {}", campaign.id), || {
                    publisher.publish(title, &body)
                })
                .await?;
            tracker.advance(CampaignStage::Published)?;
            migrator_debug!("Campaign {}: draft created", campaign.id);
        }

        let date = (self.clock)();
        if !self
            .ledger_store
            .record(ledger, campaign.id.clone(), title, &date)?
        {
            migrator_warn!("Campaign {} was already in the ledger", campaign.id);
        }
        tracker.advance(CampaignStage::Recorded)?;
        Ok(())
    }

    async fn convert(
        &self,
        tracker: &mut StageTracker,
        campaign: &Campaign,
        title: &str,
    ) -> Result<String, CampaignError> {
        let html = self
            .settings
            .retry
            .run(&format!("fetch campaign {}", campaign.id), || {
                self.source.fetch_html(&campaign.id)
            })
            .await?;
        tracker.advance(CampaignStage::Fetched)?;
        if html.trim().is_empty() {
            return Err(CampaignError::EmptyContent);
        }

        let output = self.transformer.transform(&html, title).await;
        if output.fell_back {
            migrator_warn!(
                "Campaign {}: conversion fell back to the original HTML",
                campaign.id
            );
        }
        if output.failed_images > 0 {
            migrator_warn!(
                "Campaign {}: {} images kept their original URL",
                campaign.id,
                output.failed_images
            );
        }
        tracker.advance(CampaignStage::Transformed)?;
        if output.content.trim().is_empty() {
            return Err(CampaignError::EmptyContent);
        }
        Ok(output.content)
    }

    fn resumable_artifact(&self, campaign: &Campaign) -> Result<Option<String>, PersistError> {
        if !self.settings.resume_from_artifacts {
            return Ok(None);
        }
        Ok(self
            .artifacts
            .load(&campaign.id)?
            .map(|saved| saved.body)
            .filter(|body| !body.trim().is_empty()))
    }
}
