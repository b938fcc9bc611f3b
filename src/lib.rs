// Applicant Intake Pipeline - Core Library
// Raw uploaded documents -> extracted artifacts -> normalized record sets

pub mod applicant;
pub mod db;
pub mod extract;
pub mod fields;
pub mod ingest;
pub mod manifest;
pub mod parsers;
pub mod table;

// Re-export commonly used types
pub use applicant::derive_applicant_key;
pub use db::{
    get_applicant_summary, insert_asset_liability_entries, insert_bank_transactions,
    insert_credit_report, insert_resume, list_applicants, setup_database, store_counts,
    upsert_raw_document, ApplicantSummary, AssetLiabilityEntry, BankTransaction, CreditReport,
    RawDocument, ResumeAttributes, StoreCounts,
};
pub use extract::{run_extraction, ExtractionSummary};
pub use ingest::{run_ingestion, IngestReport};
pub use manifest::{load_manifest, write_manifest, EntryType, ManifestEntry, MANIFEST_FILE};
pub use parsers::{classify_document, get_parser, Artifact, DocumentKind, RecordBatch, RecordParser};
pub use table::Table;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
