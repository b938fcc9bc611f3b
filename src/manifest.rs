// 📜 Manifest
// The single handoff contract between extraction and ingestion: an ordered
// list of every successfully extracted artifact.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Filename of the manifest artifact inside the processed directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What kind of artifact an entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Table,
    Text,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Table => "table",
            EntryType::Text => "text",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extraction output. `sheet` is set only for multi-sheet spreadsheets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub output: PathBuf,
}

/// Write the manifest into the processed directory, returning its path.
pub fn write_manifest(entries: &[ManifestEntry], processed_dir: &Path) -> Result<PathBuf> {
    let path = processed_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(entries).context("failed to serialize manifest")?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write manifest: {}", path.display()))?;

    Ok(path)
}

/// Load the manifest for ingestion.
///
/// An absent or empty manifest is fatal here: the caller must be able to
/// tell "extraction never ran" apart from "ingestion ran but found
/// nothing to normalize".
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    if !path.exists() {
        bail!(
            "manifest not found at {} (run extraction first)",
            path.display()
        );
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let entries: Vec<ManifestEntry> =
        serde_json::from_str(&content).context("failed to parse manifest JSON")?;

    if entries.is_empty() {
        bail!("manifest at {} is empty: no extracted files", path.display());
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source: &str, entry_type: EntryType, sheet: Option<&str>) -> ManifestEntry {
        ManifestEntry {
            source: source.to_string(),
            entry_type,
            sheet: sheet.map(|s| s.to_string()),
            output: PathBuf::from(format!("data/processed/{source}.out")),
        }
    }

    #[test]
    fn test_manifest_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            entry("bank_statement_zeeshan.xlsx", EntryType::Table, Some("Sheet1")),
            entry("credit_report_zeeshan.pdf", EntryType::Text, None),
            entry("sample_resume_zeeshan.txt", EntryType::Text, None),
        ];

        let path = write_manifest(&entries, dir.path()).unwrap();
        let loaded = load_manifest(&path).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].source, "bank_statement_zeeshan.xlsx");
        assert_eq!(loaded[0].sheet.as_deref(), Some("Sheet1"));
        assert_eq!(loaded[1].entry_type, EntryType::Text);
        assert_eq!(loaded[2].source, "sample_resume_zeeshan.txt");
    }

    #[test]
    fn test_sheet_is_omitted_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(&[entry("a_b.csv", EntryType::Table, None)], dir.path()).unwrap();

        let raw = fs::read_to_string(path).unwrap();
        assert!(!raw.contains("\"sheet\""));
        assert!(raw.contains("\"type\": \"table\""));
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let err = load_manifest(Path::new("/nonexistent/manifest.json")).unwrap_err();
        assert!(err.to_string().contains("manifest not found"));
    }

    #[test]
    fn test_empty_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(&[], dir.path()).unwrap();

        let err = load_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
