use std::collections::HashSet;

use migrator_core::{CampaignId, ExportLedger, LedgerEntry};
use pretty_assertions::assert_eq;

fn init_logging() {
    migrator_logging::initialize_for_tests();
}

#[test]
fn canonical_entries_are_loaded_in_order() {
    init_logging();
    let json = r#"[
        {"id": 7, "title": "Seven", "exported_date": "2024-03-01T10:00:00"},
        {"id": "3", "title": "Three", "exported_date": "2024-03-02T10:00:00+00:00"}
    ]"#;

    let parsed = ExportLedger::parse(json).unwrap();

    assert_eq!(parsed.legacy_ids, 0);
    assert_eq!(parsed.duplicates_dropped, 0);
    let ids: Vec<_> = parsed
        .ledger
        .entries()
        .iter()
        .map(|e| e.id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["7", "3"]);
    assert!(parsed.ledger.is_exported(&CampaignId::from(7)));
    assert_eq!(parsed.ledger.entries()[0].exported_date, "2024-03-01T10:00:00");
}

#[test]
fn legacy_flat_id_list_is_migrated_to_entries() {
    let parsed = ExportLedger::parse("[101, 102, \"103\"]").unwrap();

    assert_eq!(parsed.legacy_ids, 3);
    assert_eq!(parsed.ledger.len(), 3);
    assert_eq!(
        parsed.ledger.entries()[0],
        LedgerEntry {
            id: CampaignId::from(101),
            title: String::new(),
            exported_date: String::new(),
        }
    );

    let rewritten = parsed.ledger.to_json().unwrap();
    let reparsed = ExportLedger::parse(&rewritten).unwrap();
    assert_eq!(reparsed.legacy_ids, 0);
    assert_eq!(reparsed.ledger, parsed.ledger);
    assert!(rewritten.contains("\"exported_date\""));
}

#[test]
fn mixed_shapes_are_accepted() {
    let parsed = ExportLedger::parse(r#"[5, {"id": 6, "title": "Six"}]"#).unwrap();

    assert_eq!(parsed.legacy_ids, 1);
    assert_eq!(parsed.ledger.len(), 2);
    assert_eq!(parsed.ledger.entries()[1].title, "Six");
    assert_eq!(parsed.ledger.entries()[1].exported_date, "");
}

#[test]
fn duplicate_ids_in_a_hand_edited_file_keep_the_first() {
    let json = r#"[{"id": 1, "title": "First"}, {"id": "1", "title": "Again"}, 1]"#;

    let parsed = ExportLedger::parse(json).unwrap();

    assert_eq!(parsed.duplicates_dropped, 2);
    assert_eq!(parsed.ledger.len(), 1);
    assert_eq!(parsed.ledger.entries()[0].title, "First");
}

#[test]
fn blank_document_is_an_empty_ledger() {
    let parsed = ExportLedger::parse("  \n").unwrap();
    assert!(parsed.ledger.is_empty());
}

#[test]
fn malformed_documents_are_errors() {
    assert!(ExportLedger::parse("{not json").is_err());
    assert!(ExportLedger::parse(r#"{"id": 1}"#).is_err());
    assert!(ExportLedger::parse(r#"[{"title": "no id"}]"#).is_err());
}

#[test]
fn mark_exported_never_duplicates_an_id() {
    let mut ledger = ExportLedger::new();

    assert!(ledger.mark_exported(CampaignId::from(1), "One", "2024-01-01T00:00:00Z"));
    assert!(ledger.mark_exported(CampaignId::from(2), "Two", "2024-01-02T00:00:00Z"));
    assert!(!ledger.mark_exported(CampaignId::from("1"), "One again", "2024-01-03T00:00:00Z"));

    let unique: HashSet<_> = ledger.entries().iter().map(|e| e.id.clone()).collect();
    assert_eq!(unique.len(), ledger.len());
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.entries()[0].title, "One");
    assert_eq!(ledger.exported_ids(), &unique);
}
