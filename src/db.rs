use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::manifest::EntryType;

// ============================================================================
// NORMALIZED RECORD TYPES
// ============================================================================

/// Metadata for one ingested raw document.
///
/// Immutable after insertion; every normalized row references it by the
/// generated id, and the applicant key is reachable only through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub filename: String,
    pub file_type: EntryType,
    pub sheet_name: Option<String>,
    pub applicant_key: String,
    /// SHA-256 of the artifact bytes, for traceability across re-runs.
    pub content_hash: Option<String>,
}

/// One ledger row. Sign encodes direction: positive = credit/inflow,
/// negative = debit/outflow. Unparseable amounts stay None.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub txn_date: Option<String>,
    pub description: String,
    pub amount: Option<f64>,
    pub balance_after: Option<f64>,
}

/// Credit attributes; at most one row per document, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditReport {
    pub credit_score: Option<i64>,
    pub utilization_pct: Option<f64>,
    pub inquiries_last_12m: Option<i64>,
}

/// One asset or liability line. Whether it counts as asset or liability is
/// decided downstream from the owning document's sheet label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetLiabilityEntry {
    pub category: String,
    pub value: Option<f64>,
}

/// Demographic attributes lifted from a resume. `current_position` is
/// reserved and always written as NULL at this stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeAttributes {
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub total_experience_years: Option<i64>,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Cascading deletes carry document replacement to the child tables
    conn.pragma_update(None, "foreign_keys", 1)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS raw_documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            file_type TEXT NOT NULL,
            sheet_name TEXT,
            applicant_key TEXT NOT NULL,
            content_hash TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id INTEGER NOT NULL REFERENCES raw_documents(id) ON DELETE CASCADE,
            txn_date TEXT,
            description TEXT NOT NULL,
            amount REAL,
            balance_after REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS credit_reports (
            doc_id INTEGER PRIMARY KEY REFERENCES raw_documents(id) ON DELETE CASCADE,
            credit_score INTEGER,
            utilization_pct REAL,
            inquiries_last_12m INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assets_liabilities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id INTEGER NOT NULL REFERENCES raw_documents(id) ON DELETE CASCADE,
            category TEXT NOT NULL,
            value REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS resumes (
            doc_id INTEGER PRIMARY KEY REFERENCES raw_documents(id) ON DELETE CASCADE,
            dob TEXT,
            nationality TEXT,
            total_experience_years INTEGER,
            current_position TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_raw_documents_applicant
         ON raw_documents(applicant_key)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_raw_documents_natural
         ON raw_documents(filename, sheet_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bank_transactions_doc
         ON bank_transactions(doc_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assets_liabilities_doc
         ON assets_liabilities(doc_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert a raw document row and return its generated id.
///
/// Upsert by natural key: any earlier row for the same (filename, sheet)
/// is deleted first, and the cascade removes its normalized child rows.
/// Re-running ingestion over an unchanged manifest therefore replaces
/// records instead of duplicating them.
pub fn upsert_raw_document(conn: &Connection, doc: &RawDocument) -> Result<i64> {
    conn.execute(
        "DELETE FROM raw_documents WHERE filename = ?1 AND sheet_name IS ?2",
        params![doc.filename, doc.sheet_name],
    )?;

    conn.execute(
        "INSERT INTO raw_documents (filename, file_type, sheet_name, applicant_key, content_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            doc.filename,
            doc.file_type.as_str(),
            doc.sheet_name,
            doc.applicant_key,
            doc.content_hash,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn insert_bank_transactions(
    conn: &Connection,
    doc_id: i64,
    transactions: &[BankTransaction],
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO bank_transactions (doc_id, txn_date, description, amount, balance_after)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for tx in transactions {
        stmt.execute(params![
            doc_id,
            tx.txn_date,
            tx.description,
            tx.amount,
            tx.balance_after,
        ])?;
    }

    Ok(transactions.len())
}

pub fn insert_credit_report(conn: &Connection, doc_id: i64, report: &CreditReport) -> Result<()> {
    conn.execute(
        "INSERT INTO credit_reports (doc_id, credit_score, utilization_pct, inquiries_last_12m)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            doc_id,
            report.credit_score,
            report.utilization_pct,
            report.inquiries_last_12m,
        ],
    )?;

    Ok(())
}

pub fn insert_asset_liability_entries(
    conn: &Connection,
    doc_id: i64,
    entries: &[AssetLiabilityEntry],
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO assets_liabilities (doc_id, category, value) VALUES (?1, ?2, ?3)",
    )?;

    for entry in entries {
        stmt.execute(params![doc_id, entry.category, entry.value])?;
    }

    Ok(entries.len())
}

pub fn insert_resume(conn: &Connection, doc_id: i64, resume: &ResumeAttributes) -> Result<()> {
    conn.execute(
        "INSERT INTO resumes (doc_id, dob, nationality, total_experience_years, current_position)
         VALUES (?1, ?2, ?3, ?4, NULL)",
        params![
            doc_id,
            resume.date_of_birth.map(|d| d.to_string()),
            resume.nationality,
            resume.total_experience_years,
        ],
    )?;

    Ok(())
}

// ============================================================================
// READS - the downstream consumer contract
// ============================================================================

/// Per-applicant aggregates the feature stage reads. Any field may be
/// None; missing data means "insufficient data", never a failure.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicantSummary {
    pub applicant_key: String,
    pub document_count: i64,
    /// Sum of positive transaction amounts (income proxy).
    pub income: Option<f64>,
    /// Asset values minus liability values, classified by sheet label.
    pub net_worth: Option<f64>,
    /// First available credit score.
    pub credit_score: Option<i64>,
    pub date_of_birth: Option<String>,
    pub experience_years: Option<i64>,
}

pub fn list_applicants(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT applicant_key FROM raw_documents ORDER BY applicant_key")?;

    let keys = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(keys)
}

/// Aggregate the normalized record sets for one applicant.
///
/// Returns None only when the applicant has no raw documents at all.
pub fn get_applicant_summary(
    conn: &Connection,
    applicant_key: &str,
) -> Result<Option<ApplicantSummary>> {
    let document_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM raw_documents WHERE applicant_key = ?1",
        params![applicant_key],
        |row| row.get(0),
    )?;

    if document_count == 0 {
        return Ok(None);
    }

    let income: Option<f64> = conn.query_row(
        "SELECT SUM(bt.amount)
         FROM bank_transactions bt
         JOIN raw_documents rd ON rd.id = bt.doc_id
         WHERE rd.applicant_key = ?1 AND bt.amount > 0",
        params![applicant_key],
        |row| row.get(0),
    )?;

    let net_worth: Option<f64> = conn.query_row(
        "SELECT SUM(CASE
                WHEN LOWER(rd.sheet_name) = 'assets' THEN al.value
                WHEN LOWER(rd.sheet_name) = 'liabilities' THEN -al.value
            END)
         FROM assets_liabilities al
         JOIN raw_documents rd ON rd.id = al.doc_id
         WHERE rd.applicant_key = ?1 AND al.value IS NOT NULL",
        params![applicant_key],
        |row| row.get(0),
    )?;

    let credit_score: Option<i64> = conn
        .query_row(
            "SELECT cr.credit_score
             FROM credit_reports cr
             JOIN raw_documents rd ON rd.id = cr.doc_id
             WHERE rd.applicant_key = ?1 AND cr.credit_score IS NOT NULL
             ORDER BY cr.doc_id
             LIMIT 1",
            params![applicant_key],
            |row| row.get(0),
        )
        .optional()?;

    let resume: Option<(Option<String>, Option<i64>)> = conn
        .query_row(
            "SELECT r.dob, r.total_experience_years
             FROM resumes r
             JOIN raw_documents rd ON rd.id = r.doc_id
             WHERE rd.applicant_key = ?1
             ORDER BY r.doc_id
             LIMIT 1",
            params![applicant_key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (date_of_birth, experience_years) = resume.unwrap_or((None, None));

    Ok(Some(ApplicantSummary {
        applicant_key: applicant_key.to_string(),
        document_count,
        income,
        net_worth,
        credit_score,
        date_of_birth,
        experience_years,
    }))
}

/// Row counts across the five tables; used for post-run verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub documents: i64,
    pub transactions: i64,
    pub credit_reports: i64,
    pub asset_liability_entries: i64,
    pub resumes: i64,
}

pub fn store_counts(conn: &Connection) -> Result<StoreCounts> {
    let count = |sql: &str| -> Result<i64> {
        conn.query_row(sql, [], |row| row.get(0))
            .context("count query failed")
    };

    Ok(StoreCounts {
        documents: count("SELECT COUNT(*) FROM raw_documents")?,
        transactions: count("SELECT COUNT(*) FROM bank_transactions")?,
        credit_reports: count("SELECT COUNT(*) FROM credit_reports")?,
        asset_liability_entries: count("SELECT COUNT(*) FROM assets_liabilities")?,
        resumes: count("SELECT COUNT(*) FROM resumes")?,
    })
}
