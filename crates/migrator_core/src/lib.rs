//! Migrator core: pure campaign, ledger and title logic with no IO.
mod campaign;
mod ledger;
mod stage;
mod title;

pub use campaign::{Campaign, CampaignId};
pub use ledger::{ExportLedger, LedgerEntry, ParsedLedger};
pub use stage::{
    CampaignOutcome, CampaignStage, InvalidTransition, OutcomeKind, RunSummary, StageTracker,
};
pub use title::{normalize_title, TitleNormalizer, DEFAULT_SERIES_LABEL};
