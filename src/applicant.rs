// 🔑 Applicant Key Derivation
// One shared implementation, used by both extraction and ingestion.

/// Derive the applicant key from a raw document filename.
///
/// Contract: strip the extension, split on underscores, take the last
/// segment, lowercase it. The prefix may itself contain underscores
/// ("assets_liabilities_Northfield.xlsx" still yields "northfield").
pub fn derive_applicant_key(filename: &str) -> String {
    let base = match filename.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => filename,
    };

    base.rsplit('_').next().unwrap_or(base).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_simple_filename() {
        assert_eq!(derive_applicant_key("bank_statement_zeeshan.xlsx"), "zeeshan");
    }

    #[test]
    fn test_key_is_lowercased() {
        assert_eq!(derive_applicant_key("credit_report_Sara.pdf"), "sara");
    }

    #[test]
    fn test_prefix_with_many_underscores() {
        assert_eq!(
            derive_applicant_key("assets_liabilities_Northfield.xlsx"),
            "northfield"
        );
    }

    #[test]
    fn test_filename_without_underscore() {
        assert_eq!(derive_applicant_key("resume.txt"), "resume");
    }

    #[test]
    fn test_filename_without_extension() {
        assert_eq!(derive_applicant_key("sample_resume_AHMED"), "ahmed");
    }

    #[test]
    fn test_only_last_extension_is_stripped() {
        // mirrors splitext semantics: "statement_amy.tar.gz" keeps "tar"
        assert_eq!(derive_applicant_key("statement_amy.v2.txt"), "amy.v2");
    }

    #[test]
    fn test_key_independent_of_prefix() {
        for prefix in ["bank_statement", "EmiratesID", "sample_resume", "credit_report"] {
            let filename = format!("{prefix}_Fatima.pdf");
            assert_eq!(derive_applicant_key(&filename), "fatima");
        }
    }
}
