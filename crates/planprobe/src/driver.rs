//! Abstract browser automation seam.
//!
//! Step objects talk to the browser only through [`BrowserDriver`]. The
//! `cdp` module implements it over chromiumoxide (feature `browser`); the
//! `mock` module implements it over scripted in-memory pages for tests.

use crate::locator::{Nth, Selector};
use crate::result::ProbeResult;
use crate::wait::LoadState;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Opaque identifier of a page (tab) in the browsing context
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Wrap a driver-specific identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response of an authenticated fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Create a 404 response
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: b"Not Found".to_vec(),
        }
    }

    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Subscription to pages opened in the browsing context.
///
/// Obtain it from [`BrowserDriver::watch_new_pages`] *before* performing the
/// action that may open a tab, so a tab opened immediately is not missed.
#[derive(Debug)]
pub struct PageWatcher {
    rx: mpsc::UnboundedReceiver<PageId>,
}

impl PageWatcher {
    /// Create a watcher and the sender a driver feeds it through
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<PageId>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Wait up to `timeout` for the next opened page
    pub async fn next_page(&mut self, timeout: Duration) -> Option<PageId> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(page) => page,
            Err(_) => None,
        }
    }
}

/// Abstract driver for browser automation
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate a page to a URL
    async fn goto(&self, page: &PageId, url: &str) -> ProbeResult<()>;

    /// Current URL of a page (may be empty or `about:blank` for fresh tabs)
    async fn current_url(&self, page: &PageId) -> ProbeResult<String>;

    /// Document title
    async fn title(&self, page: &PageId) -> ProbeResult<String>;

    /// Whether the page has reached a load state right now
    async fn load_state_reached(&self, page: &PageId, state: LoadState) -> ProbeResult<bool>;

    /// Number of elements matching a selector
    async fn count(&self, page: &PageId, selector: &Selector) -> ProbeResult<usize>;

    /// Whether the selected element exists and is rendered
    async fn is_visible(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<bool>;

    /// Clear an input
    async fn clear(&self, page: &PageId, selector: &Selector) -> ProbeResult<()>;

    /// Type text into an input, firing input events
    async fn fill(&self, page: &PageId, selector: &Selector, text: &str) -> ProbeResult<()>;

    /// Click an element with a real pointer gesture
    async fn click(&self, page: &PageId, selector: &Selector, nth: Nth) -> ProbeResult<()>;

    /// Scroll an element into view if needed
    async fn scroll_into_view(&self, page: &PageId, selector: &Selector, nth: Nth)
        -> ProbeResult<()>;

    /// Attribute value of an element (`None` when absent)
    async fn attribute(
        &self,
        page: &PageId,
        selector: &Selector,
        nth: Nth,
        name: &str,
    ) -> ProbeResult<Option<String>>;

    /// Text content of an element
    async fn text_content(
        &self,
        page: &PageId,
        selector: &Selector,
        nth: Nth,
    ) -> ProbeResult<Option<String>>;

    /// Accessible names of all matches, in document order
    async fn accessible_names(&self, page: &PageId, selector: &Selector)
        -> ProbeResult<Vec<String>>;

    /// Checked state of a checkbox
    async fn is_checked(&self, page: &PageId, selector: &Selector) -> ProbeResult<bool>;

    /// Set the checked state of a checkbox
    async fn set_checked(&self, page: &PageId, selector: &Selector, checked: bool)
        -> ProbeResult<()>;

    /// Subscribe to newly opened pages
    async fn watch_new_pages(&self) -> ProbeResult<PageWatcher>;

    /// All open pages, oldest first
    async fn pages(&self) -> ProbeResult<Vec<PageId>>;

    /// Close a page
    async fn close_page(&self, page: &PageId) -> ProbeResult<()>;

    /// GET a URL reusing the browsing context's cookies and user agent
    async fn fetch(&self, page: &PageId, url: &str) -> ProbeResult<HttpResponse>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_http_response_success_range() {
        assert!(HttpResponse::new(200, vec![]).is_success());
        assert!(HttpResponse::new(204, vec![]).is_success());
        assert!(!HttpResponse::new(302, vec![]).is_success());
        assert!(!HttpResponse::not_found().is_success());
    }

    #[test]
    fn test_page_id_display() {
        let id = PageId::new("target-1");
        assert_eq!(id.to_string(), "target-1");
        assert_eq!(id.as_str(), "target-1");
    }

    #[tokio::test]
    async fn test_watcher_receives_page() {
        let (tx, mut watcher) = PageWatcher::channel();
        tx.send(PageId::new("p2")).unwrap();
        let page = watcher.next_page(Duration::from_millis(50)).await;
        assert_eq!(page, Some(PageId::new("p2")));
    }

    #[tokio::test]
    async fn test_watcher_times_out() {
        let (_tx, mut watcher) = PageWatcher::channel();
        let page = watcher.next_page(Duration::from_millis(5)).await;
        assert!(page.is_none());
    }
}
