//! Plan details: document URL resolution, download and content checks.

use super::wait_for_load;
use crate::artifact::{ArtifactStore, DownloadedArtifact};
use crate::config::ProbeConfig;
use crate::driver::BrowserDriver;
use crate::locator::{Nth, Selector};
use crate::page_object::{LocatorCatalog, PageObject};
use crate::pdf::PdfDocument;
use crate::result::{ProbeError, ProbeResult};
use crate::target::NavigationTarget;
use crate::wait::LoadState;
use tracing::{debug, info, warn};

/// Element catalog of a plan details page
pub mod catalog {
    use crate::locator::Selector;
    use crate::page_object::LocatorCatalog;

    /// Embedded PDF viewer
    pub const PDF_VIEWER: &str = "pdf_viewer";
    /// Plan heading
    pub const PLAN_TITLE: &str = "plan_title";

    /// Build the catalog
    #[must_use]
    pub fn build() -> LocatorCatalog {
        LocatorCatalog::new()
            .with_locator(
                PDF_VIEWER,
                Selector::css(
                    r#"embed[type="application/pdf"], object[type="application/pdf"]"#,
                ),
            )
            .with_locator(PLAN_TITLE, Selector::css("h1, h2, .title"))
    }
}

/// Step object for the page (or captured URL) a plan link led to
pub struct PlanDetailsPage<'a> {
    driver: &'a dyn BrowserDriver,
    target: NavigationTarget,
    config: &'a ProbeConfig,
    store: ArtifactStore,
    catalog: LocatorCatalog,
}

impl std::fmt::Debug for PlanDetailsPage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanDetailsPage")
            .field("target", &self.target)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl PageObject for PlanDetailsPage<'_> {
    fn url_pattern(&self) -> &str {
        "(plan|energy|fact|details)"
    }

    fn catalog(&self) -> &LocatorCatalog {
        &self.catalog
    }

    fn page_name(&self) -> &str {
        "plan details"
    }
}

impl<'a> PlanDetailsPage<'a> {
    /// Wrap a resolved navigation target
    #[must_use]
    pub fn new(driver: &'a dyn BrowserDriver, target: NavigationTarget, config: &'a ProbeConfig) -> Self {
        Self {
            driver,
            target,
            config,
            store: ArtifactStore::new(&config.download_dir),
            catalog: catalog::build(),
        }
    }

    /// The target being inspected
    #[must_use]
    pub const fn target(&self) -> &NavigationTarget {
        &self.target
    }

    /// Artifact store documents are saved to
    #[must_use]
    pub const fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Absolute URL of the plan document
    pub async fn document_url(&self) -> ProbeResult<String> {
        match &self.target {
            NavigationTarget::UrlOnly { url, .. } => {
                debug!(%url, "using captured document URL");
                Ok(url.clone())
            }
            NavigationTarget::Page(page) => {
                if let Err(e) = wait_for_load(
                    self.driver,
                    page,
                    LoadState::DomContentLoaded,
                    self.config.timeouts.navigation(),
                )
                .await
                {
                    debug!(error = %e, "document page still loading");
                }
                let url = self.driver.current_url(page).await?;
                if url.contains(".pdf") {
                    Ok(url)
                } else {
                    Err(ProbeError::NoDocumentUrl { current_url: url })
                }
            }
        }
    }

    /// Check the document URL carries every configured marker
    pub async fn verify_document_opened(&self) -> ProbeResult<String> {
        let url = self.document_url().await?;
        if let Some(marker) = self
            .config
            .document_markers
            .iter()
            .find(|marker| !url.contains(marker.as_str()))
        {
            return Err(ProbeError::assertion(format!(
                "document URL {url} does not contain {marker:?}"
            )));
        }
        if let NavigationTarget::Page(page) = &self.target {
            let viewer = self.catalog.require(catalog::PDF_VIEWER)?.selector();
            let embedded = self
                .driver
                .is_visible(page, viewer, Nth::First)
                .await
                .unwrap_or(false);
            debug!(embedded, "document viewer");
        }
        info!(%url, page = self.page_name(), "document URL validated");
        Ok(url)
    }

    /// Heading of the details page, when it renders one
    pub async fn plan_title(&self) -> ProbeResult<Option<String>> {
        let NavigationTarget::Page(page) = &self.target else {
            return Ok(None);
        };
        let heading: &Selector = self.catalog.require(catalog::PLAN_TITLE)?.selector();
        if self.driver.count(page, heading).await? == 0 {
            return Ok(None);
        }
        Ok(self
            .driver
            .text_content(page, heading, Nth::First)
            .await?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    /// Fetch the document through the browsing context and save it
    pub async fn download_document(&self) -> ProbeResult<DownloadedArtifact> {
        let url = self.document_url().await?;
        info!(%url, "downloading document");
        let response = self.driver.fetch(self.target.page(), &url).await?;
        if !response.is_success() {
            warn!(%url, status = response.status, "document download failed");
            return Err(ProbeError::DownloadFailed {
                url,
                status: response.status,
            });
        }
        self.store.save(&url, &response.body)
    }

    /// Parse a saved document and check it contains every expected substring
    pub fn assert_document_contains<S: AsRef<str>>(
        &self,
        artifact: &DownloadedArtifact,
        expected: &[S],
    ) -> ProbeResult<PdfDocument> {
        info!(path = %artifact.path.display(), "validating document content");
        let document = PdfDocument::from_bytes(&self.store.read(artifact)?)?;
        document.assert_contains_all(expected)?;
        for needle in expected {
            debug!(needle = needle.as_ref(), "document contains");
        }
        let classification = document.classify();
        info!(
            gas_plan = classification.is_gas_plan(),
            keywords = ?classification.gas_keywords,
            "all content checks passed"
        );
        Ok(document)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::driver::{HttpResponse, PageId};
    use crate::mock::{text_pdf, MockBrowser, MockElement, MockPage};

    const DOC_URL: &str = "https://www.origin.test/docs/basic_gas.pdf";

    fn config(dir: &std::path::Path) -> ProbeConfig {
        ProbeConfig::default()
            .with_base_url("https://www.origin.test")
            .with_download_dir(dir)
            .with_timeouts(Timeouts {
                element_ms: 50,
                navigation_ms: 50,
                action_ms: 50,
                retry_ms: 5,
            })
    }

    fn gas_pdf() -> Vec<u8> {
        text_pdf(
            Some("Origin Basic"),
            &["Basic Plan Fact Sheet", "Fuel type: Natural gas", "Supply charge 95.7 c/MJ/day"],
        )
        .unwrap()
    }

    mod resolution {
        use super::*;

        #[tokio::test]
        async fn test_url_only_uses_captured_url() {
            let tmp = tempfile::tempdir().unwrap();
            let config = config(tmp.path());
            let browser = MockBrowser::new();
            let origin = browser.open_page(MockPage::new("https://www.origin.test/pricing.html")).unwrap();
            let details = PlanDetailsPage::new(
                &browser,
                NavigationTarget::UrlOnly {
                    origin,
                    url: DOC_URL.into(),
                },
                &config,
            );
            assert_eq!(details.document_url().await.unwrap(), DOC_URL);
            assert!(details.plan_title().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_page_without_document_fails() {
            let tmp = tempfile::tempdir().unwrap();
            let config = config(tmp.path());
            let browser = MockBrowser::new();
            let page = browser.open_page(MockPage::new("https://www.origin.test/pricing.html")).unwrap();
            let details = PlanDetailsPage::new(&browser, NavigationTarget::Page(page), &config);
            let err = details.document_url().await.unwrap_err();
            assert!(matches!(err, ProbeError::NoDocumentUrl { ref current_url } if current_url.ends_with("pricing.html")));
        }

        #[tokio::test]
        async fn test_markers_checked() {
            let tmp = tempfile::tempdir().unwrap();
            let config = config(tmp.path())
                .with_document_markers(vec![".pdf".into(), "origin".into()]);
            let browser = MockBrowser::new();
            let page = browser.open_page(MockPage::new("https://cdn.test/a.pdf")).unwrap();
            let details = PlanDetailsPage::new(&browser, NavigationTarget::Page(page), &config);
            let err = details.verify_document_opened().await.unwrap_err();
            assert!(err.to_string().contains("\"origin\""));
        }

        #[tokio::test]
        async fn test_title_read_from_heading() {
            let tmp = tempfile::tempdir().unwrap();
            let config = config(tmp.path());
            let browser = MockBrowser::new();
            let page = browser
                .open_page(MockPage::new(DOC_URL).with_element(
                    Selector::css("h1, h2, .title"),
                    MockElement::new().with_text("  Origin Basic  "),
                ))
                .unwrap();
            let details = PlanDetailsPage::new(&browser, NavigationTarget::Page(page), &config);
            assert_eq!(details.plan_title().await.unwrap().as_deref(), Some("Origin Basic"));
            assert_eq!(details.verify_document_opened().await.unwrap(), DOC_URL);
        }
    }

    mod download {
        use super::*;

        fn details_for(browser: &MockBrowser) -> PageId {
            browser.open_page(MockPage::new(DOC_URL)).unwrap()
        }

        #[tokio::test]
        async fn test_download_round_trips_bytes() {
            let tmp = tempfile::tempdir().unwrap();
            let config = config(&tmp.path().join("test-results"));
            let bytes = gas_pdf();
            let browser =
                MockBrowser::new().with_response(DOC_URL, HttpResponse::new(200, bytes.clone()));
            let page = details_for(&browser);
            let details = PlanDetailsPage::new(&browser, NavigationTarget::Page(page), &config);
            let artifact = details.download_document().await.unwrap();
            assert_eq!(artifact.path, tmp.path().join("test-results/basic_gas.pdf"));
            assert_eq!(std::fs::read(&artifact.path).unwrap(), bytes);

            let document = details
                .assert_document_contains(&artifact, &["Gas", "Fuel type", "MJ/day"])
                .unwrap();
            assert!(document.is_gas_plan());
        }

        #[tokio::test]
        async fn test_not_found_fails_before_write() {
            let tmp = tempfile::tempdir().unwrap();
            let dir = tmp.path().join("test-results");
            let config = config(&dir);
            let browser = MockBrowser::new();
            let page = details_for(&browser);
            let details = PlanDetailsPage::new(&browser, NavigationTarget::Page(page), &config);
            let err = details.download_document().await.unwrap_err();
            assert!(matches!(err, ProbeError::DownloadFailed { status: 404, .. }));
            assert!(err.to_string().contains("404"));
            assert!(!dir.exists());
        }

        #[tokio::test]
        async fn test_missing_fuel_type_named() {
            let tmp = tempfile::tempdir().unwrap();
            let config = config(tmp.path());
            let bytes = text_pdf(None, &["Gas plan", "Supply charge c/MJ/day"]).unwrap();
            let browser = MockBrowser::new().with_response(DOC_URL, HttpResponse::new(200, bytes));
            let page = details_for(&browser);
            let details = PlanDetailsPage::new(&browser, NavigationTarget::Page(page), &config);
            let artifact = details.download_document().await.unwrap();
            let err = details
                .assert_document_contains(&artifact, &["Gas", "Fuel type", "MJ/day"])
                .unwrap_err();
            assert!(matches!(err, ProbeError::MissingContent { ref needle } if needle == "Fuel type"));
        }

        #[tokio::test]
        async fn test_url_only_fetch_uses_origin_page() {
            let tmp = tempfile::tempdir().unwrap();
            let config = config(tmp.path());
            let browser =
                MockBrowser::new().with_response(DOC_URL, HttpResponse::new(200, gas_pdf()));
            let origin = browser
                .open_page(MockPage::new("https://www.origin.test/pricing.html"))
                .unwrap();
            let details = PlanDetailsPage::new(
                &browser,
                NavigationTarget::UrlOnly {
                    origin,
                    url: DOC_URL.into(),
                },
                &config,
            );
            let artifact = details.download_document().await.unwrap();
            assert_eq!(artifact.url, DOC_URL);
            assert!(browser.was_called(&format!("fetch:{DOC_URL}")));
        }
    }
}
