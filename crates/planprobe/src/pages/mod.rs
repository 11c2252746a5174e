//! Step objects for the pages of the pricing site.

pub mod plan_details;
pub mod pricing;

use crate::driver::{BrowserDriver, PageId};
use crate::locator::{Nth, Selector};
use crate::result::{ProbeError, ProbeResult};
use crate::retry::poll_until;
use crate::wait::{LoadState, WaitOptions};
use std::time::Duration;

pub use plan_details::PlanDetailsPage;
pub use pricing::{AddressSelection, FilterToggle, PricingPage};

/// Wait until the selected element is rendered
pub(crate) async fn wait_visible(
    driver: &dyn BrowserDriver,
    page: &PageId,
    selector: &Selector,
    nth: Nth,
    timeout: Duration,
) -> ProbeResult<()> {
    let options = WaitOptions::with_timeout(timeout);
    poll_until(
        &options.policy(),
        || driver.is_visible(page, selector, nth),
        |visible| *visible,
    )
    .await
    .map(|_| ())
    .map_err(|_| ProbeError::Timeout {
        what: format!("waiting for {selector} to be visible"),
        ms: options.timeout_ms,
    })
}

/// Wait until a page reaches a load state
pub(crate) async fn wait_for_load(
    driver: &dyn BrowserDriver,
    page: &PageId,
    state: LoadState,
    timeout: Duration,
) -> ProbeResult<()> {
    let options = WaitOptions::with_timeout(timeout);
    poll_until(
        &options.policy(),
        || driver.load_state_reached(page, state),
        |reached| *reached,
    )
    .await
    .map(|_| ())
    .map_err(|exhausted| ProbeError::Timeout {
        what: format!("waiting for {state} on page {page} ({exhausted})"),
        ms: options.timeout_ms,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockBrowser, MockElement, MockPage};

    fn browser_with(element: MockElement) -> (MockBrowser, PageId) {
        let browser = MockBrowser::new();
        let page = browser
            .open_page(MockPage::new("https://site.test/pricing.html").with_element(
                Selector::css("#address"),
                element,
            ))
            .unwrap();
        (browser, page)
    }

    #[tokio::test]
    async fn test_visible_element_found() {
        let (browser, page) = browser_with(MockElement::new());
        wait_visible(&browser, &page, &Selector::css("#address"), Nth::First, Duration::from_millis(20))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hidden_element_times_out() {
        let (browser, page) = browser_with(MockElement::new().hidden());
        let err = wait_visible(
            &browser,
            &page,
            &Selector::css("#address"),
            Nth::First,
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { ms: 20, .. }));
        assert!(err.to_string().contains("#address"));
    }
}
