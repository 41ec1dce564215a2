use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::CampaignId;

/// One migrated campaign. `exported_date` is kept as the text found on disk so
/// timestamps written by older tools (naive local ISO strings) survive a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: CampaignId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub exported_date: String,
}

/// On-disk records: the canonical object form, or a bare id from the legacy flat list.
#[derive(Deserialize)]
#[serde(untagged)]
enum LedgerRecord {
    Entry(LedgerEntry),
    Bare(CampaignId),
}

/// Result of reading a ledger document, with counts of what the shim had to repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLedger {
    pub ledger: ExportLedger,
    pub legacy_ids: usize,
    pub duplicates_dropped: usize,
}

/// Set of exported campaigns keyed by id, remembering insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportLedger {
    entries: Vec<LedgerEntry>,
    ids: HashSet<CampaignId>,
}

impl ExportLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ledger document.
    ///
    /// Accepts the canonical array of `{id, title, exported_date}` objects, the
    /// legacy flat array of ids, or a mix of both. A blank document is an empty
    /// ledger. Repeated ids keep their first occurrence.
    pub fn parse(json: &str) -> Result<ParsedLedger, serde_json::Error> {
        Self::parse_slice(json.as_bytes())
    }

    /// Same as [`ExportLedger::parse`] on raw file bytes; invalid UTF-8 is a
    /// parse error.
    pub fn parse_slice(json: &[u8]) -> Result<ParsedLedger, serde_json::Error> {
        if json.iter().all(u8::is_ascii_whitespace) {
            return Ok(ParsedLedger {
                ledger: Self::new(),
                legacy_ids: 0,
                duplicates_dropped: 0,
            });
        }

        let records: Vec<LedgerRecord> = serde_json::from_slice(json)?;
        let mut ledger = Self::new();
        let mut legacy_ids = 0;
        let mut duplicates_dropped = 0;
        for record in records {
            let entry = match record {
                LedgerRecord::Entry(entry) => entry,
                LedgerRecord::Bare(id) => {
                    legacy_ids += 1;
                    LedgerEntry {
                        id,
                        title: String::new(),
                        exported_date: String::new(),
                    }
                }
            };
            if !ledger.insert(entry) {
                duplicates_dropped += 1;
            }
        }

        Ok(ParsedLedger {
            ledger,
            legacy_ids,
            duplicates_dropped,
        })
    }

    /// Serialize in the canonical object-array form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    pub fn is_exported(&self, id: &CampaignId) -> bool {
        self.ids.contains(id)
    }

    /// Record a campaign. Returns `false` and leaves the ledger untouched when
    /// the id is already present.
    pub fn mark_exported(
        &mut self,
        id: CampaignId,
        title: impl Into<String>,
        exported_date: impl Into<String>,
    ) -> bool {
        self.insert(LedgerEntry {
            id,
            title: title.into(),
            exported_date: exported_date.into(),
        })
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn exported_ids(&self) -> &HashSet<CampaignId> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, entry: LedgerEntry) -> bool {
        if !self.ids.insert(entry.id.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }
}
