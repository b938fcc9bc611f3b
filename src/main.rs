use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use applicant_intake::{
    get_applicant_summary, list_applicants, run_extraction, run_ingestion, setup_database,
    store_counts, MANIFEST_FILE,
};

const DEFAULT_RAW_DIR: &str = "data/raw";
const DEFAULT_PROCESSED_DIR: &str = "data/processed";
const DEFAULT_DB_PATH: &str = "applicants.db";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("extract") => {
            let raw_dir = arg_path(&args, 2, DEFAULT_RAW_DIR);
            let processed_dir = arg_path(&args, 3, DEFAULT_PROCESSED_DIR);
            cmd_extract(&raw_dir, &processed_dir)?;
        }
        Some("ingest") => {
            let processed_dir = arg_path(&args, 2, DEFAULT_PROCESSED_DIR);
            let db_path = arg_path(&args, 3, DEFAULT_DB_PATH);
            cmd_ingest(&processed_dir, &db_path)?;
        }
        Some("run") => {
            let raw_dir = arg_path(&args, 2, DEFAULT_RAW_DIR);
            let processed_dir = arg_path(&args, 3, DEFAULT_PROCESSED_DIR);
            let db_path = arg_path(&args, 4, DEFAULT_DB_PATH);
            cmd_extract(&raw_dir, &processed_dir)?;
            cmd_ingest(&processed_dir, &db_path)?;
        }
        _ => {
            print_usage();
        }
    }

    Ok(())
}

fn arg_path(args: &[String], idx: usize, default: &str) -> PathBuf {
    args.get(idx)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn print_usage() {
    println!("Applicant Intake Pipeline");
    println!();
    println!("Usage:");
    println!("  applicant-intake extract [raw_dir] [processed_dir]");
    println!("  applicant-intake ingest  [processed_dir] [db_path]");
    println!("  applicant-intake run     [raw_dir] [processed_dir] [db_path]");
    println!();
    println!("Defaults: raw_dir={DEFAULT_RAW_DIR} processed_dir={DEFAULT_PROCESSED_DIR} db_path={DEFAULT_DB_PATH}");
}

fn cmd_extract(raw_dir: &Path, processed_dir: &Path) -> Result<()> {
    println!("📂 Extracting raw documents");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summary = run_extraction(raw_dir, processed_dir)?;

    for entry in &summary.entries {
        match &entry.sheet {
            Some(sheet) => println!("✔ {} [{}] → {}", entry.source, sheet, entry.output.display()),
            None => println!("✔ {} → {}", entry.source, entry.output.display()),
        }
    }
    for failed in &summary.failed_files {
        println!("✘ {failed} (skipped)");
    }

    println!(
        "✓ Wrote {} manifest entries to {}",
        summary.entries.len(),
        summary.manifest_path.display()
    );

    Ok(())
}

fn cmd_ingest(processed_dir: &Path, db_path: &Path) -> Result<()> {
    println!("\n🗄️  Ingesting into {}", db_path.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut conn = Connection::open(db_path)?;
    setup_database(&conn)?;

    let manifest_path = processed_dir.join(MANIFEST_FILE);
    let report = run_ingestion(&mut conn, &manifest_path)?;

    println!("✓ Documents:              {}", report.documents);
    println!("✓ Bank transactions:      {}", report.transactions);
    println!("✓ Credit reports:         {}", report.credit_reports);
    println!("✓ Asset/liability rows:   {}", report.asset_liability_entries);
    println!("✓ Resumes:                {}", report.resumes);
    if report.skipped_unrecognized > 0 {
        println!("✓ Unrecognized (metadata only): {}", report.skipped_unrecognized);
    }

    let counts = store_counts(&conn)?;
    println!("\n🔍 Store now holds {} documents", counts.documents);

    for applicant in list_applicants(&conn)? {
        if let Some(summary) = get_applicant_summary(&conn, &applicant)? {
            println!(
                "  {} — docs: {}, income: {}, net worth: {}, credit score: {}",
                summary.applicant_key,
                summary.document_count,
                fmt_opt_f64(summary.income),
                fmt_opt_f64(summary.net_worth),
                summary
                    .credit_score
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "n/a".to_string()),
            );
        }
    }

    Ok(())
}

fn fmt_opt_f64(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "n/a".to_string())
}
