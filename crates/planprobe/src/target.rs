//! Result of clicking a plan link.

use crate::driver::PageId;
use serde::Serialize;

/// Where the plan document lives after a plan link was clicked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationTarget {
    /// A page (new tab or the original page) that is the destination
    Page(PageId),
    /// The tab failed to render; only the link's URL is usable
    UrlOnly {
        /// Page control returned to
        origin: PageId,
        /// Absolute document URL captured from the link
        url: String,
    },
}

impl NavigationTarget {
    /// Page that subsequent steps act on
    #[must_use]
    pub const fn page(&self) -> &PageId {
        match self {
            Self::Page(page) => page,
            Self::UrlOnly { origin, .. } => origin,
        }
    }

    /// Captured fallback URL, if this is a URL-only target
    #[must_use]
    pub fn fallback_url(&self) -> Option<&str> {
        match self {
            Self::Page(_) => None,
            Self::UrlOnly { url, .. } => Some(url),
        }
    }

    /// Whether the target is a URL rather than a live page
    #[must_use]
    pub const fn is_url_only(&self) -> bool {
        matches!(self, Self::UrlOnly { .. })
    }
}

impl std::fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page(page) => write!(f, "page {page}"),
            Self::UrlOnly { origin, url } => write!(f, "{url} (from page {origin})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_only_keeps_origin_page() {
        let target = NavigationTarget::UrlOnly {
            origin: PageId::new("main"),
            url: "https://site.test/docs/basic.pdf".into(),
        };
        assert_eq!(target.page(), &PageId::new("main"));
        assert_eq!(target.fallback_url(), Some("https://site.test/docs/basic.pdf"));
        assert!(target.is_url_only());
    }

    #[test]
    fn test_page_has_no_fallback() {
        let target = NavigationTarget::Page(PageId::new("tab-2"));
        assert!(target.fallback_url().is_none());
        assert_eq!(target.to_string(), "page tab-2");
    }
}
