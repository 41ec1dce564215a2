use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use migrator_core::{CampaignId, ExportLedger, ParsedLedger};
use migrator_logging::{migrator_info, migrator_warn};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("ledger {path} is not valid: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write ledger: {0}")]
    Persist(#[from] PersistError),
}

/// The JSON ledger file. One process owns it for the duration of a run.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read without side effects. `Ok(None)` when the file does not exist yet.
    pub fn read(&self) -> Result<Option<ParsedLedger>, LedgerError> {
        let content = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        ExportLedger::parse_slice(&content)
            .map(Some)
            .map_err(|source| LedgerError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Load for a batch run. A missing file is an empty ledger. A corrupt file
    /// is moved aside to `{name}.corrupt-{unix_secs}` and the run continues
    /// with an empty ledger.
    pub fn load(&self) -> Result<ExportLedger, LedgerError> {
        match self.read() {
            Ok(Some(parsed)) => {
                if parsed.legacy_ids > 0 {
                    migrator_info!(
                        "Ledger {:?}: upgrading {} legacy id-only records",
                        self.path,
                        parsed.legacy_ids
                    );
                }
                if parsed.duplicates_dropped > 0 {
                    migrator_warn!(
                        "Ledger {:?}: dropped {} duplicate campaign ids",
                        self.path,
                        parsed.duplicates_dropped
                    );
                }
                migrator_info!(
                    "Loaded {} exported campaigns from {:?}",
                    parsed.ledger.len(),
                    self.path
                );
                Ok(parsed.ledger)
            }
            Ok(None) => {
                migrator_info!("No ledger at {:?}; starting empty", self.path);
                Ok(ExportLedger::new())
            }
            Err(LedgerError::Corrupt { source, .. }) => {
                migrator_warn!(
                    "Ledger {:?} is corrupt ({}); continuing with an empty ledger",
                    self.path,
                    source
                );
                self.quarantine();
                Ok(ExportLedger::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Rewrite the whole document atomically.
    pub fn save(&self, ledger: &ExportLedger) -> Result<(), LedgerError> {
        let json = ledger.to_json()?;
        let filename = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "exported_posts.json".to_string());
        AtomicFileWriter::for_file(&self.path).write(&filename, &json)?;
        Ok(())
    }

    /// Add one entry and persist. Returns `false` without writing when the
    /// campaign was already recorded. `ledger` only changes once the file
    /// has been written.
    pub fn record(
        &self,
        ledger: &mut ExportLedger,
        id: CampaignId,
        title: &str,
        exported_date: &str,
    ) -> Result<bool, LedgerError> {
        let mut next = ledger.clone();
        if !next.mark_exported(id, title, exported_date) {
            return Ok(false);
        }
        self.save(&next)?;
        *ledger = next;
        Ok(true)
    }

    fn quarantine(&self) {
        let mut name: OsString = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".corrupt-{}", chrono::Utc::now().timestamp()));
        let target = self.path.with_file_name(name);
        match fs::rename(&self.path, &target) {
            Ok(()) => migrator_warn!("Moved corrupt ledger to {:?}", target),
            Err(err) => migrator_warn!("Could not move corrupt ledger aside: {}", err),
        }
    }
}
