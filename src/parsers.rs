// 🧾 Parsing Strategies
// Polymorphic parser system: one strategy per recognized document kind,
// each handling the tabular and/or free-text shape of that document.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::{AssetLiabilityEntry, BankTransaction, CreditReport, ResumeAttributes};
use crate::fields::{
    parse_amount, parse_date_of_birth, parse_statement_date, pick_transaction_amount,
};
use crate::table::{cell, Table};

// ============================================================================
// CORE TYPES
// ============================================================================

/// DocumentKind - which normalized schema a raw document maps to.
///
/// Classification happens exactly once per manifest entry; everything
/// downstream dispatches on this tag instead of re-inspecting filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    BankStatement,
    CreditReport,
    AssetsLiabilities,
    Resume,
    Unrecognized,
}

impl DocumentKind {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            DocumentKind::BankStatement => "Bank Statement",
            DocumentKind::CreditReport => "Credit Report",
            DocumentKind::AssetsLiabilities => "Assets & Liabilities",
            DocumentKind::Resume => "Resume",
            DocumentKind::Unrecognized => "Unrecognized",
        }
    }
}

/// Classify a raw document by case-insensitive keyword in its filename.
///
/// Unknown keywords map to `Unrecognized`, which downstream records as
/// metadata-only: new document types must never break the batch.
pub fn classify_document(filename: &str) -> DocumentKind {
    let filename_lower = filename.to_lowercase();

    if filename_lower.contains("bank_statement") {
        return DocumentKind::BankStatement;
    }
    if filename_lower.contains("credit_report") {
        return DocumentKind::CreditReport;
    }
    if filename_lower.contains("assets_liabilities") {
        return DocumentKind::AssetsLiabilities;
    }
    if filename_lower.contains("resume") {
        return DocumentKind::Resume;
    }

    DocumentKind::Unrecognized
}

/// Artifact content handed to a parsing strategy.
#[derive(Debug, Clone)]
pub enum Artifact {
    Table(Table),
    Text(String),
}

/// Normalized rows produced by one strategy for one document.
///
/// Each strategy fills in its own record set and leaves the others empty;
/// the ingestion engine inserts whatever is present.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    pub transactions: Vec<BankTransaction>,
    pub credit_report: Option<CreditReport>,
    pub asset_liability_entries: Vec<AssetLiabilityEntry>,
    pub resume: Option<ResumeAttributes>,
}

impl RecordBatch {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.credit_report.is_none()
            && self.asset_liability_entries.is_empty()
            && self.resume.is_none()
    }
}

/// RecordParser - one strategy per document kind.
///
/// A strategy receives the artifact and returns normalized rows; it never
/// touches the database. Shapes a strategy does not support (e.g. a
/// tabular resume) yield an empty batch, not an error.
pub trait RecordParser {
    /// The document kind this strategy handles
    fn kind(&self) -> DocumentKind;

    /// Parse an artifact into normalized rows
    fn parse(&self, artifact: &Artifact) -> Result<RecordBatch>;
}

/// Get the strategy for a document kind, or None for `Unrecognized`.
pub fn get_parser(kind: DocumentKind) -> Option<Box<dyn RecordParser>> {
    match kind {
        DocumentKind::BankStatement => Some(Box::new(BankStatementParser::new())),
        DocumentKind::CreditReport => Some(Box::new(CreditReportParser::new())),
        DocumentKind::AssetsLiabilities => Some(Box::new(AssetsLiabilitiesParser::new())),
        DocumentKind::Resume => Some(Box::new(ResumeParser::new())),
        DocumentKind::Unrecognized => None,
    }
}

// ============================================================================
// BANK STATEMENT PARSER
// ============================================================================

/// Parses transaction ledgers from tabular statements and from free-text
/// statement dumps.
pub struct BankStatementParser {
    line_pattern: Regex,
}

impl BankStatementParser {
    pub fn new() -> Self {
        // date, non-greedy description, two required decimal values with
        // optional comma separators, then an optional running balance
        let line_pattern = Regex::new(
            r"^(\d{2}/\d{2}/\d{4})\s+(.*?)\s+(-?[\d,]+\.\d{2})\s+(-?[\d,]+\.\d{2})(?:\s+(-?[\d,]+\.\d{2}))?$",
        )
        .expect("statement line pattern is valid");

        BankStatementParser { line_pattern }
    }

    fn parse_table(&self, table: &Table) -> Result<RecordBatch> {
        let date_col = table.require_named("transaction date", "date")?;
        let desc_col = table.require_containing("description", "desc")?;
        let debit_col = table.require_containing("debit amount", "debit")?;
        let credit_col = table.require_containing("credit amount", "credit")?;
        let balance_col = table.column_containing("balance");

        let mut transactions = Vec::new();
        for row in table.rows() {
            let raw_date = cell(row, date_col).trim();
            let txn_date = if raw_date.is_empty() {
                None
            } else {
                Some(raw_date.to_string())
            };

            let credit_val = parse_amount(cell(row, credit_col));
            let debit_val = parse_amount(cell(row, debit_col));

            // credit wins when positive, else the negated debit; anything
            // else stays unparsed and the row is kept with a null amount
            let amount = match (credit_val, debit_val) {
                (Some(c), _) if c > 0.0 => Some(c),
                (_, Some(d)) if d > 0.0 => Some(-d),
                _ => None,
            };

            let balance_after = balance_col.and_then(|idx| parse_amount(cell(row, idx)));

            transactions.push(BankTransaction {
                txn_date,
                description: cell(row, desc_col).trim().to_string(),
                amount,
                balance_after,
            });
        }

        Ok(RecordBatch {
            transactions,
            ..RecordBatch::default()
        })
    }

    fn parse_text(&self, text: &str) -> RecordBatch {
        let mut transactions = Vec::new();

        for line in text.lines() {
            // headers, footers and noise lines simply do not match
            let Some(caps) = self.line_pattern.captures(line) else {
                continue;
            };

            let txn_date = parse_statement_date(&caps[1]).map(|d| d.to_string());
            let first = parse_amount(&caps[3]).unwrap_or(0.0);
            let second = parse_amount(&caps[4]).unwrap_or(0.0);
            let amount = pick_transaction_amount(first, second);
            let balance_after = caps.get(5).and_then(|m| parse_amount(m.as_str()));

            transactions.push(BankTransaction {
                txn_date,
                description: caps[2].trim().to_string(),
                amount: Some(amount),
                balance_after,
            });
        }

        RecordBatch {
            transactions,
            ..RecordBatch::default()
        }
    }
}

impl RecordParser for BankStatementParser {
    fn kind(&self) -> DocumentKind {
        DocumentKind::BankStatement
    }

    fn parse(&self, artifact: &Artifact) -> Result<RecordBatch> {
        match artifact {
            Artifact::Table(table) => self.parse_table(table),
            Artifact::Text(text) => Ok(self.parse_text(text)),
        }
    }
}

// ============================================================================
// CREDIT REPORT PARSER
// ============================================================================

/// Reads credit attributes from a one-row table or from a free-text
/// report. Every extraction is independent; a missing field is null.
pub struct CreditReportParser {
    score_pattern: Regex,
    utilization_pattern: Regex,
    inquiries_pattern: Regex,
}

impl CreditReportParser {
    pub fn new() -> Self {
        let score_pattern =
            Regex::new(r"Credit\s*Score:?\s*(\d{3})").expect("score pattern is valid");
        let utilization_pattern =
            Regex::new(r"Utilization\s*:?\s*(\d{1,3})\s*%").expect("utilization pattern is valid");
        let inquiries_pattern =
            Regex::new(r"(?i)Inquiries\s*(?:last\s*12\s*months)?\s*:?\s*(\d+)")
                .expect("inquiries pattern is valid");

        CreditReportParser {
            score_pattern,
            utilization_pattern,
            inquiries_pattern,
        }
    }

    fn parse_table(&self, table: &Table) -> RecordBatch {
        let score_col = table.column_named("credit_score");
        let utilization_col = table.column_named("utilization_pct");
        let inquiries_col = table.column_named("inquiries_last_12m");

        // one attribute row per document: only the first data row counts
        let report = table.rows().first().map(|row| CreditReport {
            credit_score: score_col
                .and_then(|idx| parse_amount(cell(row, idx)))
                .map(|v| v as i64),
            utilization_pct: utilization_col.and_then(|idx| parse_amount(cell(row, idx))),
            inquiries_last_12m: inquiries_col
                .and_then(|idx| parse_amount(cell(row, idx)))
                .map(|v| v as i64),
        });

        RecordBatch {
            credit_report: report,
            ..RecordBatch::default()
        }
    }

    fn parse_text(&self, text: &str) -> RecordBatch {
        let credit_score = self
            .score_pattern
            .captures(text)
            .and_then(|caps| caps[1].parse::<i64>().ok());
        let utilization_pct = self
            .utilization_pattern
            .captures(text)
            .and_then(|caps| caps[1].parse::<f64>().ok());
        let inquiries_last_12m = self
            .inquiries_pattern
            .captures(text)
            .and_then(|caps| caps[1].parse::<i64>().ok());

        RecordBatch {
            credit_report: Some(CreditReport {
                credit_score,
                utilization_pct,
                inquiries_last_12m,
            }),
            ..RecordBatch::default()
        }
    }
}

impl RecordParser for CreditReportParser {
    fn kind(&self) -> DocumentKind {
        DocumentKind::CreditReport
    }

    fn parse(&self, artifact: &Artifact) -> Result<RecordBatch> {
        match artifact {
            Artifact::Table(table) => Ok(self.parse_table(table)),
            Artifact::Text(text) => Ok(self.parse_text(text)),
        }
    }
}

// ============================================================================
// ASSETS & LIABILITIES PARSER
// ============================================================================

/// One entry per sheet row. Asset-vs-liability classification is not this
/// parser's job; the owning document's sheet label carries it downstream.
pub struct AssetsLiabilitiesParser;

impl AssetsLiabilitiesParser {
    pub fn new() -> Self {
        AssetsLiabilitiesParser
    }

    fn parse_table(&self, table: &Table) -> Result<RecordBatch> {
        let category_col = table.require_containing("category", "category")?;
        let value_col = table.require_containing("value", "value")?;

        let mut entries = Vec::new();
        for row in table.rows() {
            entries.push(AssetLiabilityEntry {
                category: cell(row, category_col).trim().to_string(),
                value: parse_amount(cell(row, value_col)),
            });
        }

        Ok(RecordBatch {
            asset_liability_entries: entries,
            ..RecordBatch::default()
        })
    }
}

impl RecordParser for AssetsLiabilitiesParser {
    fn kind(&self) -> DocumentKind {
        DocumentKind::AssetsLiabilities
    }

    fn parse(&self, artifact: &Artifact) -> Result<RecordBatch> {
        match artifact {
            Artifact::Table(table) => self.parse_table(table),
            // no free-text shape for asset sheets
            Artifact::Text(_) => Ok(RecordBatch::default()),
        }
    }
}

// ============================================================================
// RESUME PARSER
// ============================================================================

/// Extracts demographic attributes from free-text resumes. All fields are
/// independently optional; `current_position` stays unset at this stage.
pub struct ResumeParser {
    dob_pattern: Regex,
    nationality_pattern: Regex,
    experience_pattern: Regex,
}

impl ResumeParser {
    pub fn new() -> Self {
        let dob_pattern = Regex::new(r"Date of Birth:?\s*(\d{1,2} [A-Za-z]+ \d{4})")
            .expect("date of birth pattern is valid");
        let nationality_pattern =
            Regex::new(r"Nationality:?\s*([A-Za-z ]+)").expect("nationality pattern is valid");
        let experience_pattern =
            Regex::new(r"(?i)(\d+)\s+years").expect("experience pattern is valid");

        ResumeParser {
            dob_pattern,
            nationality_pattern,
            experience_pattern,
        }
    }

    fn parse_text(&self, text: &str) -> RecordBatch {
        let date_of_birth = self
            .dob_pattern
            .captures(text)
            .and_then(|caps| parse_date_of_birth(&caps[1]));
        let nationality = self
            .nationality_pattern
            .captures(text)
            .map(|caps| caps[1].trim().to_string())
            .filter(|n| !n.is_empty());
        let total_experience_years = self
            .experience_pattern
            .captures(text)
            .and_then(|caps| caps[1].parse::<i64>().ok());

        RecordBatch {
            resume: Some(ResumeAttributes {
                date_of_birth,
                nationality,
                total_experience_years,
            }),
            ..RecordBatch::default()
        }
    }
}

impl RecordParser for ResumeParser {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Resume
    }

    fn parse(&self, artifact: &Artifact) -> Result<RecordBatch> {
        match artifact {
            // resumes only arrive as text; a tabular shape has no mapping
            Artifact::Table(_) => Ok(RecordBatch::default()),
            Artifact::Text(text) => Ok(self.parse_text(text)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
