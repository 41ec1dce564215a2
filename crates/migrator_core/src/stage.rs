use std::fmt;

use crate::CampaignId;

/// Where a single campaign is in its migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignStage {
    Pending,
    Fetched,
    Transformed,
    Saved,
    Published,
    Recorded,
    Skipped,
    Failed,
}

impl CampaignStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CampaignStage::Recorded | CampaignStage::Skipped | CampaignStage::Failed
        )
    }

    /// `Pending -> Saved` is the resume path for an artifact left by an
    /// earlier run; `Saved -> Recorded` is export-only mode with no publisher.
    pub fn can_advance_to(self, next: CampaignStage) -> bool {
        use CampaignStage::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Fetched)
                | (Pending, Skipped)
                | (Pending, Saved)
                | (Fetched, Transformed)
                | (Transformed, Saved)
                | (Saved, Published)
                | (Saved, Recorded)
                | (Published, Recorded)
        )
    }
}

impl fmt::Display for CampaignStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CampaignStage::Pending => "pending",
            CampaignStage::Fetched => "fetched",
            CampaignStage::Transformed => "transformed",
            CampaignStage::Saved => "saved",
            CampaignStage::Published => "published",
            CampaignStage::Recorded => "recorded",
            CampaignStage::Skipped => "skipped",
            CampaignStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid stage transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: CampaignStage,
    pub to: CampaignStage,
}

/// Enforces the per-campaign state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTracker {
    stage: CampaignStage,
    history: Vec<CampaignStage>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            stage: CampaignStage::Pending,
            history: vec![CampaignStage::Pending],
        }
    }

    pub fn stage(&self) -> CampaignStage {
        self.stage
    }

    pub fn history(&self) -> &[CampaignStage] {
        &self.history
    }

    pub fn advance(&mut self, next: CampaignStage) -> Result<(), InvalidTransition> {
        if !self.stage.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed`, remembering the stage the campaign failed from.
    pub fn fail(&mut self) -> CampaignStage {
        let failed_at = self.stage;
        if !failed_at.is_terminal() {
            self.stage = CampaignStage::Failed;
            self.history.push(CampaignStage::Failed);
        }
        failed_at
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    Recorded,
    Skipped,
    /// `stage` is the last stage reached before the failure.
    Failed {
        stage: CampaignStage,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignOutcome {
    pub campaign_id: CampaignId,
    pub title: String,
    pub kind: OutcomeKind,
}

impl fmt::Display for CampaignOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OutcomeKind::Recorded => write!(f, "recorded  {} '{}'", self.campaign_id, self.title),
            OutcomeKind::Skipped => write!(f, "skipped   {} '{}'", self.campaign_id, self.title),
            OutcomeKind::Failed { stage, reason } => write!(
                f,
                "failed    {} '{}' after {stage}: {reason}",
                self.campaign_id, self.title
            ),
        }
    }
}

/// Per-campaign outcomes of one batch run, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    outcomes: Vec<CampaignOutcome>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: CampaignOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[CampaignOutcome] {
        &self.outcomes
    }

    pub fn recorded(&self) -> usize {
        self.count(|kind| matches!(kind, OutcomeKind::Recorded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|kind| matches!(kind, OutcomeKind::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|kind| matches!(kind, OutcomeKind::Failed { .. }))
    }

    /// Campaigns that entered the pipeline, i.e. everything not skipped.
    pub fn processed(&self) -> usize {
        self.outcomes.len() - self.skipped()
    }

    fn count(&self, predicate: impl Fn(&OutcomeKind) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.kind)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {}, recorded {}, failed {}, skipped {}",
            self.processed(),
            self.recorded(),
            self.failed(),
            self.skipped()
        )
    }
}
