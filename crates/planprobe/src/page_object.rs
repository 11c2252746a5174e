//! Page Object Model support.
//!
//! Each page of the site gets a [`LocatorCatalog`] (semantic element name to
//! selector) and a step object implementing [`PageObject`].

use crate::locator::{Locator, Selector};
use crate::result::{ProbeError, ProbeResult};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::time::Duration;

/// A page or component of the site under test
pub trait PageObject {
    /// Pattern the page URL must match once loaded
    fn url_pattern(&self) -> &str;

    /// Element catalog of the page
    fn catalog(&self) -> &LocatorCatalog;

    /// Page name for logging
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Load timeout in milliseconds
    fn load_timeout_ms(&self) -> u64 {
        30_000
    }
}

/// Named locators of one page
#[derive(Debug, Clone, Default)]
pub struct LocatorCatalog {
    locators: BTreeMap<String, Locator>,
}

impl LocatorCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a locator with a name
    #[must_use]
    pub fn with_locator(mut self, name: impl Into<String>, selector: Selector) -> Self {
        let _ = self
            .locators
            .insert(name.into(), Locator::from_selector(selector));
        self
    }

    /// Add a locator with its own timeout
    #[must_use]
    pub fn with_timed_locator(
        mut self,
        name: impl Into<String>,
        selector: Selector,
        timeout: Duration,
    ) -> Self {
        let _ = self.locators.insert(
            name.into(),
            Locator::from_selector(selector).with_timeout(timeout),
        );
        self
    }

    /// Get a locator by name
    #[must_use]
    pub fn locator(&self, name: &str) -> Option<&Locator> {
        self.locators.get(name)
    }

    /// Get a locator by name or fail
    pub fn require(&self, name: &str) -> ProbeResult<&Locator> {
        self.locator(name)
            .ok_or_else(|| ProbeError::config(format!("no locator named {name:?} in catalog")))
    }

    /// Get all locator names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.locators.keys().map(String::as_str).collect()
    }

    /// Number of locators
    #[must_use]
    pub fn len(&self) -> usize {
        self.locators.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

/// Case-insensitive URL pattern
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    regex: Regex,
}

impl UrlMatcher {
    /// Compile a pattern
    pub fn new(pattern: &str) -> ProbeResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ProbeError::config(format!("invalid URL pattern {pattern:?}: {e}")))?;
        Ok(Self { regex })
    }

    /// Check if a URL matches the pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Fail unless the URL matches
    pub fn expect(&self, url: &str) -> ProbeResult<()> {
        if self.matches(url) {
            Ok(())
        } else {
            Err(ProbeError::assertion(format!(
                "URL {url:?} does not match /{}/",
                self.regex.as_str()
            )))
        }
    }
}
