//! Environment configuration for the pricing suite.
//!
//! Values resolve in three layers: built-in defaults, an optional YAML file,
//! then `PLANPROBE_*` environment variables. `CI` switches the run to
//! headless with two scenario retries.

use crate::result::{ProbeError, ProbeResult};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default site under test
pub const DEFAULT_BASE_URL: &str = "https://www.originenergy.com.au";

/// Default pricing page path
pub const DEFAULT_PRICING_PATH: &str = "/pricing.html";

/// Default directory for downloaded documents and reports
pub const DEFAULT_DOWNLOAD_DIR: &str = "test-results";

/// Desktop Chrome user agent the site is exercised with
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Attempts made while a freshly opened tab reports a placeholder URL
pub const TAB_URL_ATTEMPTS: usize = 10;

/// What to do when no suggestion exactly matches the typed address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionPolicy {
    /// Take the first suggestion and report the approximate match
    #[default]
    ExactOrFirst,
    /// Fail when there is no exact match
    ExactOnly,
}

impl std::str::FromStr for SuggestionPolicy {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact-or-first" | "exact_or_first" | "first" => Ok(Self::ExactOrFirst),
            "exact-only" | "exact_only" | "exact" => Ok(Self::ExactOnly),
            other => Err(ProbeError::config(format!(
                "unknown suggestion policy {other:?} (expected exact-or-first or exact-only)"
            ))),
        }
    }
}

/// Bounded wait durations, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Element visibility
    pub element_ms: u64,
    /// Navigation, load states and autocomplete
    pub navigation_ms: u64,
    /// Row lookup and page events after a click
    pub action_ms: u64,
    /// Pause between polls
    pub retry_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_ms: 15_000,
            navigation_ms: 20_000,
            action_ms: 10_000,
            retry_ms: 1_000,
        }
    }
}

impl Timeouts {
    /// Element visibility bound
    #[must_use]
    pub const fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    /// Navigation bound
    #[must_use]
    pub const fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    /// Action bound
    #[must_use]
    pub const fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    /// Poll interval
    #[must_use]
    pub const fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// Policy used while a new tab reports a placeholder URL
    #[must_use]
    pub const fn tab_url_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry(), TAB_URL_ATTEMPTS)
    }
}

/// Effective configuration of a suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Site origin, without trailing slash
    pub base_url: String,
    /// Path of the pricing page
    pub pricing_path: String,
    /// Bounded waits
    pub timeouts: Timeouts,
    /// Run the browser without a window
    pub headless: bool,
    /// Scenario-level retries
    pub retries: u32,
    /// Directory for downloaded documents and reports
    pub download_dir: PathBuf,
    /// User agent for the browser and the authenticated fetch
    pub user_agent: String,
    /// Explicit chromium executable
    pub chromium_path: Option<PathBuf>,
    /// Address suggestion fallback
    pub suggestion_policy: SuggestionPolicy,
    /// Substrings a document URL must contain
    pub document_markers: Vec<String>,
    /// Browser window size
    pub window_size: (u32, u32),
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            pricing_path: DEFAULT_PRICING_PATH.to_string(),
            timeouts: Timeouts::default(),
            headless: false,
            retries: 0,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chromium_path: None,
            suggestion_policy: SuggestionPolicy::default(),
            document_markers: vec![".pdf".to_string()],
            window_size: (1920, 1080),
        }
    }
}

impl ProbeConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Defaults, then the optional file, then the process environment
    pub fn load(path: Option<&Path>) -> ProbeResult<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`
    pub fn with_env<F>(mut self, lookup: F) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("CI").is_some_and(|v| !v.is_empty() && v != "0" && v != "false") {
            self.headless = true;
            self.retries = 2;
        }
        if let Some(url) = lookup("PLANPROBE_BASE_URL") {
            self.base_url = url;
        }
        if let Some(path) = lookup("PLANPROBE_PRICING_PATH") {
            self.pricing_path = path;
        }
        if let Some(value) = lookup("PLANPROBE_HEADLESS") {
            self.headless = parse_flag("PLANPROBE_HEADLESS", &value)?;
        }
        if let Some(value) = lookup("PLANPROBE_RETRIES") {
            self.retries = parse_number("PLANPROBE_RETRIES", &value)?;
        }
        if let Some(dir) = lookup("PLANPROBE_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(ua) = lookup("PLANPROBE_USER_AGENT") {
            self.user_agent = ua;
        }
        if let Some(path) = lookup("PLANPROBE_CHROMIUM_PATH") {
            self.chromium_path = Some(PathBuf::from(path));
        }
        if let Some(policy) = lookup("PLANPROBE_SUGGESTION_POLICY") {
            self.suggestion_policy = policy.parse()?;
        }
        for (key, slot) in [
            ("PLANPROBE_ELEMENT_TIMEOUT_MS", &mut self.timeouts.element_ms),
            ("PLANPROBE_NAVIGATION_TIMEOUT_MS", &mut self.timeouts.navigation_ms),
            ("PLANPROBE_ACTION_TIMEOUT_MS", &mut self.timeouts.action_ms),
            ("PLANPROBE_RETRY_INTERVAL_MS", &mut self.timeouts.retry_ms),
        ] {
            if let Some(value) = lookup(key) {
                *slot = parse_number(key, &value)?;
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject configurations no run could use
    pub fn validate(&self) -> ProbeResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ProbeError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.timeouts.retry_ms == 0 {
            return Err(ProbeError::config("retry interval must be positive"));
        }
        if self.document_markers.iter().any(String::is_empty) {
            return Err(ProbeError::config("document markers must not be empty"));
        }
        Ok(())
    }

    /// Absolute URL of the pricing page
    #[must_use]
    pub fn pricing_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.pricing_path.starts_with('/') {
            format!("{base}{}", self.pricing_path)
        } else {
            format!("{base}/{}", self.pricing_path)
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set scenario retries
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the download directory
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Set the chromium executable
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set the suggestion policy
    #[must_use]
    pub const fn with_suggestion_policy(mut self, policy: SuggestionPolicy) -> Self {
        self.suggestion_policy = policy;
        self
    }

    /// Set the document URL markers
    #[must_use]
    pub fn with_document_markers(mut self, markers: Vec<String>) -> Self {
        self.document_markers = markers;
        self
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

fn parse_flag(key: &str, value: &str) -> ProbeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ProbeError::config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ProbeResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProbeError::config(format!("{key}: expected a number, got {value:?}")))
}
