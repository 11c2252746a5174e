//! Result and error types for planprobe.

use thiserror::Error;

/// Result type for planprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving the pricing scenario
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser executable not found
    #[error("Browser not found. Install Chromium or set PLANPROBE_CHROMIUM_PATH")]
    BrowserNotFound,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page-level protocol error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// A click produced no detectable navigation
    #[error("Failed to navigate after clicking plan: {plan}")]
    NavigationFailed {
        /// Plan display name
        plan: String,
    },

    /// Bounded wait exhausted
    #[error("{what} timed out after {ms}ms")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Element never matched
    #[error("Element not found: {selector}")]
    ElementNotFound {
        /// Rendered selector
        selector: String,
    },

    /// Autocomplete never rendered any suggestion
    #[error("Failed to load address options for {address:?} after {waited_ms}ms - autocomplete may not be working in this environment")]
    SuggestionsUnavailable {
        /// Address that was typed
        address: String,
        /// Time spent waiting
        waited_ms: u64,
    },

    /// Suggestions appeared but none matched exactly (exact-only policy)
    #[error("No suggestion exactly matches {address:?}; offered: {offered:?}")]
    NoExactSuggestion {
        /// Address that was typed
        address: String,
        /// Suggestions that were shown
        offered: Vec<String>,
    },

    /// The plan row holds no links
    #[error("No clickable link found for plan: {plan}")]
    NoPlanLink {
        /// Plan display name
        plan: String,
    },

    /// Neither the page nor a captured reference yields a document URL
    #[error("No valid document URL found. Current URL: {current_url}")]
    NoDocumentUrl {
        /// URL of the page that was inspected
        current_url: String,
    },

    /// Artifact fetch returned a non-success status
    #[error("Failed to download document from {url}: HTTP {status}")]
    DownloadFailed {
        /// URL that was fetched
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Extracted text lacks an expected substring
    #[error("Document text does not contain {needle:?}")]
    MissingContent {
        /// The missing substring
        needle: String,
    },

    /// PDF could not be parsed
    #[error("PDF error: {message}")]
    Pdf {
        /// Error message
        message: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error came from an exhausted bounded wait
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::SuggestionsUnavailable { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_failed_names_status() {
        let err = ProbeError::DownloadFailed {
            url: "https://site/plan.pdf".into(),
            status: 404,
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("plan.pdf"));
    }

    #[test]
    fn test_missing_content_names_needle() {
        let err = ProbeError::MissingContent {
            needle: "Fuel type".into(),
        };
        assert!(err.to_string().contains("Fuel type"));
    }

    #[test]
    fn test_suggestion_errors_are_distinct() {
        let unavailable = ProbeError::SuggestionsUnavailable {
            address: "1 Main St".into(),
            waited_ms: 20_000,
        };
        let no_exact = ProbeError::NoExactSuggestion {
            address: "1 Main St".into(),
            offered: vec!["1 Main Rd".into()],
        };
        assert!(unavailable.is_timeout());
        assert!(!no_exact.is_timeout());
        assert!(unavailable.to_string().contains("autocomplete"));
        assert!(no_exact.to_string().contains("1 Main Rd"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ProbeError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
