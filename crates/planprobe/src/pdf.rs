//! Plan document text extraction and classification.
//!
//! Parsing is delegated to `lopdf`; everything here works on the extracted
//! text, lowercased once, so all matching is case-insensitive.

use crate::result::{ProbeError, ProbeResult};
use lopdf::{Document, Object};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Phrases that mark a gas plan
pub const GAS_KEYWORDS: [&str; 7] = [
    "gas plan",
    "natural gas",
    "gas supply",
    "gas energy",
    "gas only",
    "reticulated gas",
    "gas service",
];

/// Basic document facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfInfo {
    /// Number of pages
    pub pages: usize,
    /// PDF header version (e.g. "1.7")
    pub version: String,
    /// `/Title` from the info dictionary
    pub title: Option<String>,
    /// `/Producer` from the info dictionary
    pub producer: Option<String>,
    /// Characters of extracted text
    pub text_length: usize,
}

/// Keyword evidence gathered from a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanClassification {
    /// Gas phrases found
    pub gas_keywords: Vec<&'static str>,
    /// Document reads as electricity-only
    pub electricity_only: bool,
}

impl PlanClassification {
    /// Gas phrase present and not an electricity-only document
    #[must_use]
    pub fn is_gas_plan(&self) -> bool {
        !self.gas_keywords.is_empty() && !self.electricity_only
    }
}

/// Classify extracted text
#[must_use]
pub fn classify_text(text: &str) -> PlanClassification {
    let lower = text.to_lowercase();
    let gas_keywords = GAS_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| lower.contains(keyword))
        .collect();
    let electricity_only = lower.contains("electricity only")
        || (lower.contains("electricity") && !lower.contains("gas"));
    PlanClassification {
        gas_keywords,
        electricity_only,
    }
}

/// A parsed plan document
#[derive(Debug, Clone)]
pub struct PdfDocument {
    text: String,
    lower: String,
    info: PdfInfo,
}

impl PdfDocument {
    /// Parse document bytes
    pub fn from_bytes(bytes: &[u8]) -> ProbeResult<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| ProbeError::Pdf {
            message: format!("failed to parse document: {e}"),
        })?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let text = if page_numbers.is_empty() {
            String::new()
        } else {
            doc.extract_text(&page_numbers).map_err(|e| ProbeError::Pdf {
                message: format!("failed to extract text: {e}"),
            })?
        };
        debug!(pages = page_numbers.len(), chars = text.len(), "extracted document text");

        let info = PdfInfo {
            pages: page_numbers.len(),
            version: doc.version.clone(),
            title: info_string(&doc, b"Title"),
            producer: info_string(&doc, b"Producer"),
            text_length: text.chars().count(),
        };
        Ok(Self {
            lower: text.to_lowercase(),
            text,
            info,
        })
    }

    /// Read and parse a document from disk
    pub fn open(path: &Path) -> ProbeResult<Self> {
        if !path.exists() {
            return Err(ProbeError::Pdf {
                message: format!("PDF file not found: {}", path.display()),
            });
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Extracted text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Document facts
    #[must_use]
    pub const fn info(&self) -> &PdfInfo {
        &self.info
    }

    /// Case-insensitive substring check
    #[must_use]
    pub fn contains_text(&self, needle: &str) -> bool {
        self.lower.contains(&needle.to_lowercase())
    }

    /// Expected substrings that are absent, in input order
    #[must_use]
    pub fn missing<'a, S: AsRef<str>>(&self, needles: &'a [S]) -> Vec<&'a str> {
        needles
            .iter()
            .map(AsRef::as_ref)
            .filter(|needle| !self.contains_text(needle))
            .collect()
    }

    /// Fail with the first expected substring that is absent
    pub fn assert_contains_all<S: AsRef<str>>(&self, needles: &[S]) -> ProbeResult<()> {
        match self.missing(needles).first() {
            Some(needle) => Err(ProbeError::MissingContent {
                needle: (*needle).to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Keyword classification
    #[must_use]
    pub fn classify(&self) -> PlanClassification {
        classify_text(&self.lower)
    }

    /// Gas-plan heuristic
    #[must_use]
    pub fn is_gas_plan(&self) -> bool {
        self.classify().is_gas_plan()
    }
}

fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info_id = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = doc.get_dictionary(info_id).ok()?;
    match info.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a BOM or single-byte
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| char::from(b)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::text_pdf;

    mod classification {
        use super::*;

        #[test]
        fn test_gas_keyword_detected() {
            let c = classify_text("Basic Plan - Natural Gas\nFuel type: Gas");
            assert_eq!(c.gas_keywords, vec!["natural gas"]);
            assert!(c.is_gas_plan());
        }

        #[test]
        fn test_electricity_without_gas_is_electricity_only() {
            let c = classify_text("Electricity plan, single rate tariff");
            assert!(c.electricity_only);
            assert!(!c.is_gas_plan());
        }

        #[test]
        fn test_explicit_electricity_only_wins() {
            let c = classify_text("Gas supply not included. Electricity only offer.");
            assert_eq!(c.gas_keywords, vec!["gas supply"]);
            assert!(c.electricity_only);
            assert!(!c.is_gas_plan());
        }

        #[test]
        fn test_dual_fuel_counts_as_gas() {
            let c = classify_text("Electricity and GAS PLAN bundle");
            assert!(!c.electricity_only);
            assert!(c.is_gas_plan());
        }

        #[test]
        fn test_no_keywords() {
            assert!(!classify_text("Terms and conditions").is_gas_plan());
        }
    }

    mod document {
        use super::*;

        #[test]
        fn test_extracts_text_and_info() {
            let bytes = text_pdf(
                Some("Origin Basic"),
                &["Origin Basic", "Gas plan", "Fuel type: Natural gas", "Supply 95 c/MJ/day"],
            )
            .unwrap();
            let doc = PdfDocument::from_bytes(&bytes).unwrap();
            assert_eq!(doc.info().pages, 1);
            assert_eq!(doc.info().title.as_deref(), Some("Origin Basic"));
            assert!(doc.info().text_length > 0);
            assert!(doc.contains_text("fuel TYPE"));
            assert!(doc.is_gas_plan());
        }

        #[test]
        fn test_missing_substring_is_named() {
            let bytes = text_pdf(None, &["Gas", "Supply charge MJ/day"]).unwrap();
            let doc = PdfDocument::from_bytes(&bytes).unwrap();
            let err = doc
                .assert_contains_all(&["Gas", "Fuel type", "MJ/day"])
                .unwrap_err();
            match err {
                ProbeError::MissingContent { needle } => assert_eq!(needle, "Fuel type"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_all_present_passes() {
            let bytes = text_pdf(None, &["GAS", "fuel type", "mj/DAY"]).unwrap();
            let doc = PdfDocument::from_bytes(&bytes).unwrap();
            assert!(doc.assert_contains_all(&["Gas", "Fuel type", "MJ/day"]).is_ok());
            assert!(doc.missing(&["Gas"]).is_empty());
        }

        #[test]
        fn test_garbage_is_pdf_error() {
            let err = PdfDocument::from_bytes(b"not a pdf at all").unwrap_err();
            assert!(matches!(err, ProbeError::Pdf { .. }));
        }

        #[test]
        fn test_open_missing_file() {
            let dir = tempfile::tempdir().unwrap();
            let err = PdfDocument::open(&dir.path().join("absent.pdf")).unwrap_err();
            assert!(err.to_string().contains("PDF file not found"));
        }

        #[test]
        fn test_utf16_title_decoding() {
            assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x47, 0x00, 0x61]), "Ga");
            assert_eq!(decode_pdf_string(b"Plan"), "Plan");
        }
    }
}
