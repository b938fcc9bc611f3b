// 🚚 Structured Ingestion Engine
// Consumes the manifest and turns every entry into normalized rows, all
// inside one transaction: either the whole run commits or none of it does.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::applicant::derive_applicant_key;
use crate::db::{self, RawDocument};
use crate::manifest::{self, EntryType, ManifestEntry};
use crate::parsers::{classify_document, get_parser, Artifact};
use crate::table::Table;

/// What one ingestion run did; `skipped_unrecognized` keeps forward
/// compatibility with unknown document types observable.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: String,
    pub documents: usize,
    pub transactions: usize,
    pub credit_reports: usize,
    pub asset_liability_entries: usize,
    pub resumes: usize,
    pub skipped_unrecognized: usize,
}

impl IngestReport {
    fn new() -> Self {
        IngestReport {
            run_id: Uuid::new_v4().to_string(),
            documents: 0,
            transactions: 0,
            credit_reports: 0,
            asset_liability_entries: 0,
            resumes: 0,
            skipped_unrecognized: 0,
        }
    }
}

/// Ingest every manifest entry into the normalized record sets.
///
/// Per-row and per-field parse failures degrade to nulls inside the
/// strategies; structural failures (unreadable artifact, missing required
/// column) abort the run and roll the transaction back, leaving the store
/// exactly as it was.
pub fn run_ingestion(conn: &mut Connection, manifest_path: &Path) -> Result<IngestReport> {
    let entries = manifest::load_manifest(manifest_path)?;

    let tx = conn.transaction()?;
    let mut report = IngestReport::new();

    for entry in &entries {
        ingest_entry(&tx, entry, &mut report)
            .with_context(|| format!("failed to ingest {}", entry.source))?;
    }

    tx.commit().context("failed to commit ingestion run")?;

    info!(
        "ingestion {} complete: {} documents, {} transactions, {} credit reports, \
         {} asset/liability entries, {} resumes, {} unrecognized",
        report.run_id,
        report.documents,
        report.transactions,
        report.credit_reports,
        report.asset_liability_entries,
        report.resumes,
        report.skipped_unrecognized,
    );

    Ok(report)
}

fn ingest_entry(conn: &Connection, entry: &ManifestEntry, report: &mut IngestReport) -> Result<()> {
    let applicant_key = derive_applicant_key(&entry.source);

    let bytes = fs::read(&entry.output)
        .with_context(|| format!("failed to read artifact {}", entry.output.display()))?;

    // metadata is always recorded, whatever the entry turns out to be
    let doc_id = db::upsert_raw_document(
        conn,
        &RawDocument {
            filename: entry.source.clone(),
            file_type: entry.entry_type,
            sheet_name: entry.sheet.clone(),
            applicant_key: applicant_key.clone(),
            content_hash: Some(hash_bytes(&bytes)),
        },
    )?;
    report.documents += 1;

    let kind = classify_document(&entry.source);
    let Some(parser) = get_parser(kind) else {
        debug!(
            "no known document kind for {} (applicant {applicant_key}), metadata only",
            entry.source
        );
        report.skipped_unrecognized += 1;
        return Ok(());
    };

    let artifact = load_artifact(entry, &bytes)?;
    if artifact_is_empty(&artifact) {
        debug!("artifact for {} is empty, metadata only", entry.source);
        return Ok(());
    }

    let batch = parser.parse(&artifact)?;
    debug!(
        "ingesting {} as {} (applicant {applicant_key}, doc {doc_id})",
        entry.source,
        kind.name()
    );

    report.transactions += db::insert_bank_transactions(conn, doc_id, &batch.transactions)?;
    if let Some(credit_report) = &batch.credit_report {
        db::insert_credit_report(conn, doc_id, credit_report)?;
        report.credit_reports += 1;
    }
    report.asset_liability_entries +=
        db::insert_asset_liability_entries(conn, doc_id, &batch.asset_liability_entries)?;
    if let Some(resume) = &batch.resume {
        db::insert_resume(conn, doc_id, resume)?;
        report.resumes += 1;
    }

    Ok(())
}

fn load_artifact(entry: &ManifestEntry, bytes: &[u8]) -> Result<Artifact> {
    match entry.entry_type {
        EntryType::Table => Ok(Artifact::Table(Table::from_csv_bytes(bytes).with_context(
            || format!("failed to parse table artifact {}", entry.output.display()),
        )?)),
        EntryType::Text => Ok(Artifact::Text(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
    }
}

fn artifact_is_empty(artifact: &Artifact) -> bool {
    match artifact {
        Artifact::Table(table) => table.is_empty(),
        Artifact::Text(text) => text.trim().is_empty(),
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_applicant_summary, setup_database, store_counts};
    use std::path::PathBuf;

    /// Lay down artifacts + manifest for one applicant and return the
    /// manifest path.
    fn fixture_manifest(dir: &Path) -> PathBuf {
        fs::write(
            dir.join("bank_statement_omar_Sheet1.csv"),
            "Date,Description,Debit,Credit,Balance\n\
             01/03/2024,Salary,,150.00,12150.00\n\
             02/03/2024,Rent,\"1,200.50\",,10949.50\n",
        )
        .unwrap();
        fs::write(
            dir.join("credit_report_omar.txt"),
            "Credit Score: 712\nUtilization: 35 %\n",
        )
        .unwrap();
        fs::write(
            dir.join("assets_liabilities_omar_Liabilities.csv"),
            "Category,Value\nLoan,8000\n",
        )
        .unwrap();
        fs::write(
            dir.join("sample_resume_omar.txt"),
            "Date of Birth: 7 March 1992\nNationality: Jordanian\n6 years of experience\n",
        )
        .unwrap();
        fs::write(dir.join("EmiratesID_omar.txt"), "ID 784-1992-1234567-1\n").unwrap();

        let entries = vec![
            ManifestEntry {
                source: "bank_statement_omar.xlsx".to_string(),
                entry_type: EntryType::Table,
                sheet: Some("Sheet1".to_string()),
                output: dir.join("bank_statement_omar_Sheet1.csv"),
            },
            ManifestEntry {
                source: "credit_report_omar.pdf".to_string(),
                entry_type: EntryType::Text,
                sheet: None,
                output: dir.join("credit_report_omar.txt"),
            },
            ManifestEntry {
                source: "assets_liabilities_omar.xlsx".to_string(),
                entry_type: EntryType::Table,
                sheet: Some("Liabilities".to_string()),
                output: dir.join("assets_liabilities_omar_Liabilities.csv"),
            },
            ManifestEntry {
                source: "sample_resume_omar.txt".to_string(),
                entry_type: EntryType::Text,
                sheet: None,
                output: dir.join("sample_resume_omar.txt"),
            },
            ManifestEntry {
                source: "EmiratesID_omar.txt".to_string(),
                entry_type: EntryType::Text,
                sheet: None,
                output: dir.join("EmiratesID_omar.txt"),
            },
        ];

        manifest::write_manifest(&entries, dir).unwrap()
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_full_run_normalizes_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = fixture_manifest(dir.path());
        let mut conn = test_conn();

        let report = run_ingestion(&mut conn, &manifest_path).unwrap();

        assert_eq!(report.documents, 5);
        assert_eq!(report.transactions, 2);
        assert_eq!(report.credit_reports, 1);
        assert_eq!(report.asset_liability_entries, 1);
        assert_eq!(report.resumes, 1);
        assert_eq!(report.skipped_unrecognized, 1);

        let summary = get_applicant_summary(&conn, "omar").unwrap().unwrap();
        assert_eq!(summary.document_count, 5);
        assert_eq!(summary.income, Some(150.0));
        assert_eq!(summary.net_worth, Some(-8000.0));
        assert_eq!(summary.credit_score, Some(712));
        assert_eq!(summary.date_of_birth.as_deref(), Some("1992-03-07"));
        assert_eq!(summary.experience_years, Some(6));
    }

    #[test]
    fn test_tabular_amount_signs() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = fixture_manifest(dir.path());
        let mut conn = test_conn();

        run_ingestion(&mut conn, &manifest_path).unwrap();

        let amounts: Vec<Option<f64>> = {
            let mut stmt = conn
                .prepare("SELECT amount FROM bank_transactions ORDER BY id")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap()
        };

        // credit=150.00 → +150.00; debit="1,200.50" → -1200.50
        assert_eq!(amounts, vec![Some(150.0), Some(-1200.5)]);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = fixture_manifest(dir.path());
        let mut conn = test_conn();

        run_ingestion(&mut conn, &manifest_path).unwrap();
        let first = store_counts(&conn).unwrap();
        let first_income = get_applicant_summary(&conn, "omar")
            .unwrap()
            .unwrap()
            .income;

        run_ingestion(&mut conn, &manifest_path).unwrap();
        let second = store_counts(&conn).unwrap();
        let second_income = get_applicant_summary(&conn, "omar")
            .unwrap()
            .unwrap()
            .income;

        assert_eq!(first, second);
        assert_eq!(first_income, second_income);
    }

    #[test]
    fn test_unrecognized_entry_still_records_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("EmiratesID_sara.txt"), "ID text\n").unwrap();
        let manifest_path = manifest::write_manifest(
            &[ManifestEntry {
                source: "EmiratesID_sara.png".to_string(),
                entry_type: EntryType::Text,
                sheet: None,
                output: dir.path().join("EmiratesID_sara.txt"),
            }],
            dir.path(),
        )
        .unwrap();

        let mut conn = test_conn();
        let report = run_ingestion(&mut conn, &manifest_path).unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.skipped_unrecognized, 1);

        let counts = store_counts(&conn).unwrap();
        assert_eq!(counts.documents, 1);
        assert_eq!(counts.transactions, 0);

        // the applicant is reachable even with metadata only
        let summary = get_applicant_summary(&conn, "sara").unwrap().unwrap();
        assert_eq!(summary.document_count, 1);
        assert_eq!(summary.income, None);
    }

    #[test]
    fn test_empty_artifact_ingests_as_metadata_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bank_statement_ali.csv"), "").unwrap();
        let manifest_path = manifest::write_manifest(
            &[ManifestEntry {
                source: "bank_statement_ali.csv".to_string(),
                entry_type: EntryType::Table,
                sheet: None,
                output: dir.path().join("bank_statement_ali.csv"),
            }],
            dir.path(),
        )
        .unwrap();

        let mut conn = test_conn();
        let report = run_ingestion(&mut conn, &manifest_path).unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.transactions, 0);
        assert_eq!(store_counts(&conn).unwrap().documents, 1);
    }

    #[test]
    fn test_missing_manifest_is_distinguishable_failure() {
        let mut conn = test_conn();
        let err = run_ingestion(&mut conn, Path::new("/nonexistent/manifest.json")).unwrap_err();
        assert!(err.to_string().contains("manifest not found"));
    }

    #[test]
    fn test_structural_failure_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        // first entry is fine, second table lacks its required columns
        fs::write(
            dir.path().join("bank_statement_omar.csv"),
            "Date,Description,Debit,Credit\n01/03/2024,Salary,,150.00\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("assets_liabilities_omar.csv"),
            "Item,Worth\nSavings,1000\n",
        )
        .unwrap();

        let manifest_path = manifest::write_manifest(
            &[
                ManifestEntry {
                    source: "bank_statement_omar.csv".to_string(),
                    entry_type: EntryType::Table,
                    sheet: None,
                    output: dir.path().join("bank_statement_omar.csv"),
                },
                ManifestEntry {
                    source: "assets_liabilities_omar.csv".to_string(),
                    entry_type: EntryType::Table,
                    sheet: None,
                    output: dir.path().join("assets_liabilities_omar.csv"),
                },
            ],
            dir.path(),
        )
        .unwrap();

        let mut conn = test_conn();
        let err = run_ingestion(&mut conn, &manifest_path).unwrap_err();
        assert!(format!("{err:#}").contains("missing expected column"));

        // nothing from the first entry leaked through
        let counts = store_counts(&conn).unwrap();
        assert_eq!(counts.documents, 0);
        assert_eq!(counts.transactions, 0);
    }

    #[test]
    fn test_free_text_statement_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bank_statement_lina.txt"),
            "ACME BANK\n\
             01/03/2024 Salary Payment 5000.00 12000.00\n\
             05/03/2024 Groceries -220.00 220.00 11780.00\n\
             Page 1 of 1\n",
        )
        .unwrap();
        let manifest_path = manifest::write_manifest(
            &[ManifestEntry {
                source: "bank_statement_lina.pdf".to_string(),
                entry_type: EntryType::Text,
                sheet: None,
                output: dir.path().join("bank_statement_lina.txt"),
            }],
            dir.path(),
        )
        .unwrap();

        let mut conn = test_conn();
        let report = run_ingestion(&mut conn, &manifest_path).unwrap();
        assert_eq!(report.transactions, 2);

        let summary = get_applicant_summary(&conn, "lina").unwrap().unwrap();
        // 5000 (smaller of the two positives) + 220 (single positive)
        assert_eq!(summary.income, Some(5220.0));
    }
}
