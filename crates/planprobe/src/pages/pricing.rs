//! Pricing page: address search, plan list, filter toggle and plan links.

use super::{wait_for_load, wait_visible};
use crate::config::{ProbeConfig, SuggestionPolicy};
use crate::driver::{BrowserDriver, PageId};
use crate::locator::{role, Nth, Selector};
use crate::page_object::{LocatorCatalog, PageObject, UrlMatcher};
use crate::result::{ProbeError, ProbeResult};
use crate::retry::poll_until;
use crate::target::NavigationTarget;
use crate::wait::LoadState;
use reqwest::Url;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Element catalog of the pricing page
pub mod catalog {
    use crate::locator::Selector;
    use crate::page_object::LocatorCatalog;

    /// Address lookup input
    pub const ADDRESS_SEARCH_BOX: &str = "address_search_box";
    /// Search results container
    pub const PLAN_LIST_CONTAINER: &str = "plan_list_container";
    /// Distributor column header
    pub const DISTRIBUTOR_COL: &str = "distributor_col";
    /// BPID/EFS column header
    pub const BPID_EFS_COL: &str = "bpid_efs_col";
    /// Energy type column header
    pub const ENERGY_TYPE_COL: &str = "energy_type_col";
    /// Tariff type column header
    pub const TARIFF_TYPE_COL: &str = "tariff_type_col";
    /// Electricity filter checkbox
    pub const ELECTRICITY_CHECKBOX: &str = "electricity_checkbox";

    /// Elements that must be visible once plans are listed
    pub const PLAN_LIST_ELEMENTS: [&str; 5] = [
        PLAN_LIST_CONTAINER,
        DISTRIBUTOR_COL,
        BPID_EFS_COL,
        ENERGY_TYPE_COL,
        TARIFF_TYPE_COL,
    ];

    /// Build the catalog
    #[must_use]
    pub fn build() -> LocatorCatalog {
        LocatorCatalog::new()
            .with_locator(
                ADDRESS_SEARCH_BOX,
                Selector::xpath(r#"//input[@id="address-lookup" and @type="text"]"#),
            )
            .with_locator(
                PLAN_LIST_CONTAINER,
                Selector::xpath(r#"//div[@id="searchResultsContainer"]"#),
            )
            .with_locator(DISTRIBUTOR_COL, Selector::xpath("//th[text()='Distributor']"))
            .with_locator(BPID_EFS_COL, Selector::xpath("//th[text()='BPID/EFS']"))
            .with_locator(ENERGY_TYPE_COL, Selector::xpath("//th[text()='Energy type']"))
            .with_locator(TARIFF_TYPE_COL, Selector::xpath("//th[text()='Tariff type']"))
            .with_locator(
                ELECTRICITY_CHECKBOX,
                Selector::xpath(r#"//input[@type="checkbox" and @name="electricity"]"#),
            )
    }
}

/// Href substrings that mark a plan document link
pub const DOCUMENT_LINK_MARKERS: [&str; 3] = [".pdf", "fact", "details"];

/// Which suggestion the address search picked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "match", content = "suggestion", rename_all = "snake_case")]
pub enum AddressSelection {
    /// The suggestion equal to the typed address
    Exact(String),
    /// No exact match; the first suggestion was taken
    FirstSuggestion(String),
}

impl AddressSelection {
    /// Selected suggestion text
    #[must_use]
    pub fn suggestion(&self) -> &str {
        match self {
            Self::Exact(s) | Self::FirstSuggestion(s) => s,
        }
    }

    /// Whether the selection is an exact match
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

/// Outcome of unchecking a plan list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterToggle {
    /// The box was checked and is now unchecked
    Unchecked,
    /// The box was already unchecked
    AlreadyUnchecked,
}

/// Pick the plan document link among a row's hrefs.
///
/// The first href containing a document marker wins; otherwise the last
/// link. `None` only for a row without links.
#[must_use]
pub fn choose_plan_link<S: AsRef<str>>(hrefs: &[Option<S>]) -> Option<usize> {
    hrefs
        .iter()
        .position(|href| {
            href.as_ref().is_some_and(|href| {
                let href = href.as_ref();
                DOCUMENT_LINK_MARKERS.iter().any(|m| href.contains(m))
            })
        })
        .or_else(|| hrefs.len().checked_sub(1))
}

/// Absolute form of a link href
#[must_use]
pub fn resolve_href(href: &str, page_url: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    [page_url, base_url]
        .iter()
        .filter_map(|base| Url::parse(base).ok())
        .find_map(|base| base.join(href).ok())
        .map_or_else(
            || format!("{}{href}", base_url.trim_end_matches('/')),
            String::from,
        )
}

/// URL a fresh tab reports before it has navigated
fn is_placeholder_url(url: &str) -> bool {
    url.is_empty() || url == "about:blank" || url == ":"
}

/// URL that cannot be a rendered document
fn is_unusable_url(url: &str) -> bool {
    is_placeholder_url(url) || url.chars().count() < 10
}

/// Step object for the pricing page
pub struct PricingPage<'a> {
    driver: &'a dyn BrowserDriver,
    page: PageId,
    config: &'a ProbeConfig,
    catalog: LocatorCatalog,
}

impl std::fmt::Debug for PricingPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricingPage")
            .field("page", &self.page)
            .field("locators", &self.catalog.names())
            .finish_non_exhaustive()
    }
}

impl PageObject for PricingPage<'_> {
    fn url_pattern(&self) -> &str {
        "pricing"
    }

    fn catalog(&self) -> &LocatorCatalog {
        &self.catalog
    }

    fn page_name(&self) -> &str {
        "pricing"
    }

    fn load_timeout_ms(&self) -> u64 {
        self.config.timeouts.navigation_ms
    }
}

impl<'a> PricingPage<'a> {
    /// Wrap the page the scenario drives
    #[must_use]
    pub fn new(driver: &'a dyn BrowserDriver, page: PageId, config: &'a ProbeConfig) -> Self {
        Self {
            driver,
            page,
            config,
            catalog: catalog::build(),
        }
    }

    /// Page this step object acts on
    #[must_use]
    pub const fn page(&self) -> &PageId {
        &self.page
    }

    fn selector(&self, name: &str) -> ProbeResult<Selector> {
        Ok(self.catalog.require(name)?.selector().clone())
    }

    /// Open the pricing page and wait for the network to settle
    pub async fn navigate(&self) -> ProbeResult<()> {
        let url = self.config.pricing_url();
        info!(%url, page = self.page_name(), "navigating");
        self.driver.goto(&self.page, &url).await?;

        let current = self.driver.current_url(&self.page).await?;
        UrlMatcher::new(self.url_pattern())?.expect(&current)?;
        wait_for_load(
            self.driver,
            &self.page,
            LoadState::NetworkIdle,
            Duration::from_millis(self.load_timeout_ms()),
        )
        .await?;

        let address_fields = self
            .driver
            .count(&self.page, &self.selector(catalog::ADDRESS_SEARCH_BOX)?)
            .await?;
        let title = self.driver.title(&self.page).await?;
        let current = self.driver.current_url(&self.page).await?;
        info!(address_fields, %title, url = %current, "pricing page loaded");
        Ok(())
    }

    /// Type an address and pick a suggestion
    pub async fn search_address(&self, address: &str) -> ProbeResult<AddressSelection> {
        let input = self.selector(catalog::ADDRESS_SEARCH_BOX)?;
        wait_visible(
            self.driver,
            &self.page,
            &input,
            Nth::First,
            self.config.timeouts.element(),
        )
        .await?;
        self.driver.clear(&self.page, &input).await?;
        self.driver.fill(&self.page, &input, address).await?;
        info!(%address, "address entered");

        let options = Selector::role(role::OPTION);
        let waited = self.config.timeouts.navigation();
        match wait_visible(self.driver, &self.page, &options, Nth::First, waited).await {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                warn!(%address, "no address suggestions rendered");
                return Err(ProbeError::SuggestionsUnavailable {
                    address: address.to_string(),
                    waited_ms: self.config.timeouts.navigation_ms,
                });
            }
            Err(e) => return Err(e),
        }

        let offered = self.driver.accessible_names(&self.page, &options).await?;
        debug!(count = offered.len(), ?offered, "address suggestions");

        let exact = Selector::role_named(role::OPTION, address, true);
        if self.driver.count(&self.page, &exact).await? > 0 {
            self.driver.click(&self.page, &exact, Nth::First).await?;
            info!(%address, "exact address suggestion selected");
            return Ok(AddressSelection::Exact(address.to_string()));
        }

        match self.config.suggestion_policy {
            SuggestionPolicy::ExactOrFirst => {
                let first = offered.first().cloned().unwrap_or_default();
                warn!(%address, suggestion = %first, "no exact match, selecting first suggestion");
                self.driver.click(&self.page, &options, Nth::First).await?;
                Ok(AddressSelection::FirstSuggestion(first))
            }
            SuggestionPolicy::ExactOnly => Err(ProbeError::NoExactSuggestion {
                address: address.to_string(),
                offered,
            }),
        }
    }

    /// Check the plan list and its column headers are shown
    pub async fn verify_plans_displayed(&self) -> ProbeResult<()> {
        for name in catalog::PLAN_LIST_ELEMENTS {
            let selector = self.selector(name)?;
            wait_visible(
                self.driver,
                &self.page,
                &selector,
                Nth::First,
                self.config.timeouts.element(),
            )
            .await
            .map_err(|e| match e {
                ProbeError::Timeout { ms, .. } => ProbeError::Timeout {
                    what: format!("waiting for {name} ({selector}) to be visible"),
                    ms,
                },
                other => other,
            })?;
        }
        info!("plan list displayed");
        Ok(())
    }

    /// Uncheck the plan-type filter with the given label
    pub async fn uncheck_filter(&self, label: &str) -> ProbeResult<FilterToggle> {
        let mut checkbox = Selector::role_named(role::CHECKBOX, label, false);
        if label.eq_ignore_ascii_case("electricity")
            && self.driver.count(&self.page, &checkbox).await? == 0
        {
            checkbox = self.selector(catalog::ELECTRICITY_CHECKBOX)?;
        }
        if self.driver.is_checked(&self.page, &checkbox).await? {
            self.driver.set_checked(&self.page, &checkbox, false).await?;
            info!(%label, "filter unchecked");
            Ok(FilterToggle::Unchecked)
        } else {
            debug!(%label, "filter already unchecked");
            Ok(FilterToggle::AlreadyUnchecked)
        }
    }

    /// Click the document link in a plan's row and resolve where it led
    pub async fn click_plan_link(&self, plan: &str) -> ProbeResult<NavigationTarget> {
        let timeouts = self.config.timeouts;
        info!(%plan, "searching for plan document link");

        let label = Selector::text(plan);
        wait_visible(self.driver, &self.page, &label, Nth::First, timeouts.element()).await?;
        let row = label.enclosing_row();
        wait_visible(self.driver, &self.page, &row, Nth::First, timeouts.action()).await?;

        let links = row.within(Selector::css("a"));
        let count = self.driver.count(&self.page, &links).await?;
        let mut hrefs = Vec::with_capacity(count);
        for i in 0..count {
            let href = self
                .driver
                .attribute(&self.page, &links, Nth::Index(i), "href")
                .await?;
            let text = self
                .driver
                .text_content(&self.page, &links, Nth::Index(i))
                .await?;
            debug!(index = i, text = ?text.as_deref().map(str::trim), ?href, "plan row link");
            hrefs.push(href);
        }

        let index = choose_plan_link(&hrefs).ok_or_else(|| ProbeError::NoPlanLink {
            plan: plan.to_string(),
        })?;
        if hrefs[index]
            .as_deref()
            .is_some_and(|h| DOCUMENT_LINK_MARKERS.iter().any(|m| h.contains(m)))
        {
            info!(index, "document link found");
        } else {
            warn!(index, "no document link in row, using last link");
        }

        let nth = Nth::Index(index);
        self.driver.scroll_into_view(&self.page, &links, nth).await?;
        let page_url = self.driver.current_url(&self.page).await?;
        let fallback = hrefs[index]
            .as_deref()
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| resolve_href(href, &page_url, &self.config.base_url));
        match fallback {
            Some(ref url) => info!(%url, "captured document URL"),
            None => warn!(index, "chosen link has no href, no fallback URL"),
        }

        let registered = Instant::now();
        let mut watcher = self.driver.watch_new_pages().await?;
        self.driver.click(&self.page, &links, nth).await?;
        tokio::time::sleep(timeouts.retry()).await;

        let remaining = timeouts.element().saturating_sub(registered.elapsed());
        let Some(tab) = watcher.next_page(remaining).await else {
            return self.resolve_without_page_event().await;
        };
        info!(page = %tab, "new page opened");

        let url = match poll_until(
            &timeouts.tab_url_policy(),
            || self.driver.current_url(&tab),
            |url| !is_placeholder_url(url),
        )
        .await
        {
            Ok(outcome) => outcome.value,
            Err(exhausted) => exhausted.last_value.unwrap_or_default(),
        };

        if is_unusable_url(&url) {
            self.driver.close_page(&tab).await?;
            let Some(fallback) = fallback else {
                warn!(%url, "new tab did not render and no URL was captured");
                return Err(ProbeError::NoDocumentUrl { current_url: url });
            };
            warn!(%url, "new tab did not render the document, using captured URL");
            return Ok(NavigationTarget::UrlOnly {
                origin: self.page.clone(),
                url: fallback,
            });
        }

        if let Err(e) =
            wait_for_load(self.driver, &tab, LoadState::DomContentLoaded, timeouts.navigation())
                .await
        {
            warn!(error = %e, "load timeout on new tab, continuing");
        }
        if url.contains(".pdf") {
            info!(%url, "document tab confirmed");
        }
        Ok(NavigationTarget::Page(tab))
    }

    async fn resolve_without_page_event(&self) -> ProbeResult<NavigationTarget> {
        warn!("no new page event, checking open pages");
        let pages = self.driver.pages().await?;
        debug!(total = pages.len(), "open pages");
        match pages.last() {
            Some(latest) if pages.len() > 1 => {
                let _ = wait_for_load(
                    self.driver,
                    latest,
                    LoadState::DomContentLoaded,
                    self.config.timeouts.navigation(),
                )
                .await;
                info!(page = %latest, "using most recent page");
                Ok(NavigationTarget::Page(latest.clone()))
            }
            _ => {
                info!("staying on the pricing page");
                Ok(NavigationTarget::Page(self.page.clone()))
            }
        }
    }

    /// Click the link named exactly after the plan
    pub async fn click_plan_bpid_link(&self, plan: &str) -> ProbeResult<NavigationTarget> {
        let timeouts = self.config.timeouts;
        let before = self.driver.current_url(&self.page).await?;
        let link = Selector::role_named(role::LINK, plan, true);

        let mut watcher = self.driver.watch_new_pages().await?;
        self.driver.click(&self.page, &link, Nth::First).await?;

        if let Some(tab) = watcher.next_page(timeouts.action()).await {
            wait_for_load(self.driver, &tab, LoadState::DomContentLoaded, timeouts.navigation())
                .await?;
            info!(%plan, page = %tab, "plan opened in new page");
            return Ok(NavigationTarget::Page(tab));
        }

        wait_for_load(
            self.driver,
            &self.page,
            LoadState::DomContentLoaded,
            timeouts.navigation(),
        )
        .await?;
        let after = self.driver.current_url(&self.page).await?;
        if after == before {
            return Err(ProbeError::NavigationFailed {
                plan: plan.to_string(),
            });
        }
        info!(%plan, url = %after, "plan opened in same page");
        Ok(NavigationTarget::Page(self.page.clone()))
    }

    /// Check a target is a new plan details tab
    pub async fn validate_new_tab_opened(&self, tab: &PageId) -> ProbeResult<()> {
        if tab == &self.page {
            return Err(ProbeError::assertion(
                "expected a new tab but the pricing page was returned",
            ));
        }
        let url = self.driver.current_url(tab).await?;
        UrlMatcher::new("(plan|energy|fact|details)")?.expect(&url)?;
        wait_for_load(
            self.driver,
            tab,
            LoadState::DomContentLoaded,
            self.config.timeouts.navigation(),
        )
        .await?;
        info!(%url, "new tab validated");
        Ok(())
    }
}
