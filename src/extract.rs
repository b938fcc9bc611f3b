// 📂 Format Detector & Extractor
// Turns every readable file in the raw intake directory into persisted
// table/text artifacts plus the manifest handed to ingestion. A failure on
// one file never aborts the batch.

use anyhow::{anyhow, bail, Context, Result};
use calamine::Reader;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::manifest::{self, EntryType, ManifestEntry};
use crate::table::Table;

// ============================================================================
// FORMAT DETECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Spreadsheet,
    Delimited,
    Pdf,
    Text,
    Image,
    Unsupported,
}

fn detect_file_kind(path: &Path) -> FileKind {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "xlsx" | "xls" => FileKind::Spreadsheet,
        "csv" => FileKind::Delimited,
        "pdf" => FileKind::Pdf,
        "txt" | "text" => FileKind::Text,
        "png" | "jpg" | "jpeg" | "bmp" | "tiff" => FileKind::Image,
        _ => FileKind::Unsupported,
    }
}

/// Everything extraction can produce for a single raw file.
enum ExtractedContent {
    /// Multi-sheet spreadsheet: one table per sheet, in workbook order.
    Sheets(Vec<(String, Table)>),
    /// Single-table document (delimited file, or a PDF carrying one table).
    Table(Table),
    /// Free-text document.
    Text(String),
}

fn extract_file(path: &Path) -> Result<ExtractedContent> {
    match detect_file_kind(path) {
        FileKind::Spreadsheet => extract_spreadsheet(path),
        FileKind::Delimited => {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(ExtractedContent::Table(Table::from_csv_bytes(&bytes)?))
        }
        FileKind::Pdf => extract_pdf(path),
        FileKind::Text => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(ExtractedContent::Text(text))
        }
        FileKind::Image => bail!("image file has no extractable text layer"),
        FileKind::Unsupported => bail!("unsupported file type"),
    }
}

fn extract_spreadsheet(path: &Path) -> Result<ExtractedContent> {
    let mut workbook = calamine::open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("failed to read sheet {sheet_name}"))?;

        let mut rows = range.rows().map(|row| {
            row.iter()
                .map(cell_to_string)
                .collect::<Vec<String>>()
        });

        let mut table = Table::new(rows.next().unwrap_or_default());
        for row in rows {
            table.push_row(row);
        }
        sheets.push((sheet_name, table));
    }

    if sheets.is_empty() {
        bail!("workbook has no sheets");
    }

    Ok(ExtractedContent::Sheets(sheets))
}

fn cell_to_string(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        calamine::Data::DateTime(dt) => dt.to_string(),
        _ => String::new(),
    }
}

fn extract_pdf(path: &Path) -> Result<ExtractedContent> {
    let raw = pdf_extract::extract_text(path)
        .map_err(|e| anyhow!("failed to extract text from {}: {e}", path.display()))?;

    // strip the whitespace scaffolding pdf text layers come with
    let text = raw
        .replace('\0', "")
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        bail!("no text content could be extracted from PDF");
    }

    // a text layer that is really one aligned table becomes a table artifact
    match sniff_aligned_table(&text) {
        Some(table) => Ok(ExtractedContent::Table(table)),
        None => Ok(ExtractedContent::Text(text)),
    }
}

/// Recover a single table from a text layer whose lines are aligned into
/// columns by runs of two or more spaces (or tabs).
///
/// Deliberately conservative: every non-empty line must split into the
/// same number of columns (at least two, over at least three lines), else
/// the document stays free text.
fn sniff_aligned_table(text: &str) -> Option<Table> {
    let gap = Regex::new(r"\s{2,}|\t").expect("column gap pattern is valid");

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < 3 {
        return None;
    }

    let split: Vec<Vec<String>> = lines
        .iter()
        .map(|line| gap.split(line).map(|c| c.trim().to_string()).collect())
        .collect();

    let width = split[0].len();
    if width < 2 || !split.iter().all(|row| row.len() == width) {
        return None;
    }

    let mut table = Table::new(split[0].clone());
    for row in &split[1..] {
        table.push_row(row.clone());
    }

    Some(table)
}

// ============================================================================
// EXTRACTION RUN
// ============================================================================

/// Outcome of one extraction pass over the raw intake directory.
#[derive(Debug, Serialize)]
pub struct ExtractionSummary {
    pub run_id: String,
    pub entries: Vec<ManifestEntry>,
    /// Files excluded from the manifest because extraction failed.
    pub failed_files: Vec<String>,
    pub manifest_path: PathBuf,
}

/// Extract every file under `raw_dir`, persist artifacts and the manifest
/// under `processed_dir`.
///
/// Files are processed in name order so re-runs produce the same manifest
/// for the same inputs. A file that fails to extract is logged and
/// skipped; it must never disturb the entries of its neighbors.
pub fn run_extraction(raw_dir: &Path, processed_dir: &Path) -> Result<ExtractionSummary> {
    fs::create_dir_all(processed_dir)
        .with_context(|| format!("failed to create {}", processed_dir.display()))?;

    let mut filenames = Vec::new();
    let dir = fs::read_dir(raw_dir)
        .with_context(|| format!("failed to read raw directory {}", raw_dir.display()))?;
    for entry in dir {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Ok(name) = entry.file_name().into_string() {
                filenames.push(name);
            }
        }
    }
    filenames.sort();

    let mut entries = Vec::new();
    let mut failed_files = Vec::new();
    for filename in filenames {
        let path = raw_dir.join(&filename);
        match extract_and_persist(&path, &filename, processed_dir) {
            Ok(mut file_entries) => entries.append(&mut file_entries),
            Err(e) => {
                warn!("extraction failed for {filename}: {e:#}");
                failed_files.push(filename);
            }
        }
    }

    let manifest_path = manifest::write_manifest(&entries, processed_dir)?;
    info!(
        "extraction complete: {} artifacts from {} files, {} failed",
        entries.len(),
        entries.iter().map(|e| &e.source).collect::<std::collections::HashSet<_>>().len(),
        failed_files.len()
    );

    Ok(ExtractionSummary {
        run_id: Uuid::new_v4().to_string(),
        entries,
        failed_files,
        manifest_path,
    })
}

fn extract_and_persist(
    path: &Path,
    filename: &str,
    processed_dir: &Path,
) -> Result<Vec<ManifestEntry>> {
    let stem = filename
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(filename);

    let mut entries = Vec::new();
    match extract_file(path)? {
        ExtractedContent::Sheets(sheets) => {
            for (sheet_name, table) in sheets {
                let output = processed_dir.join(format!("{stem}_{sheet_name}.csv"));
                table.write_csv(&output)?;
                debug!("processed {filename} [{sheet_name}] -> table artifact");
                entries.push(ManifestEntry {
                    source: filename.to_string(),
                    entry_type: EntryType::Table,
                    sheet: Some(sheet_name),
                    output,
                });
            }
        }
        ExtractedContent::Table(table) => {
            let output = processed_dir.join(format!("{stem}.csv"));
            table.write_csv(&output)?;
            debug!("processed {filename} -> table artifact");
            entries.push(ManifestEntry {
                source: filename.to_string(),
                entry_type: EntryType::Table,
                sheet: None,
                output,
            });
        }
        ExtractedContent::Text(text) => {
            let output = processed_dir.join(format!("{stem}.txt"));
            fs::write(&output, &text)
                .with_context(|| format!("failed to write {}", output.display()))?;
            debug!("processed {filename} -> text artifact");
            entries.push(ManifestEntry {
                source: filename.to_string(),
                entry_type: EntryType::Text,
                sheet: None,
                output,
            });
        }
    }

    Ok(entries)
}
