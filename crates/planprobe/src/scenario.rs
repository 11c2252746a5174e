//! The pricing scenario: search an address, filter the plan list, open a
//! plan's document and check its content.

use crate::artifact::DownloadedArtifact;
use crate::config::ProbeConfig;
use crate::driver::{BrowserDriver, PageId};
use crate::pages::{PlanDetailsPage, PricingPage};
use crate::pdf::{PdfInfo, PlanClassification};
use crate::report::{ScenarioReport, StepEntry};
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Instant;
use tracing::{error, info};

/// Step names, in execution order
pub mod steps {
    /// Open the pricing page
    pub const NAVIGATE: &str = "navigate to pricing";
    /// Enter the address and pick a suggestion
    pub const SEARCH_ADDRESS: &str = "search address";
    /// Check the plan list renders
    pub const VERIFY_PLANS: &str = "verify plans displayed";
    /// Uncheck the plan type filter
    pub const UNCHECK_FILTER: &str = "uncheck filter";
    /// Click the plan's document link
    pub const CLICK_PLAN: &str = "click plan link";
    /// Check the resolved document URL
    pub const VERIFY_DOCUMENT: &str = "verify document opened";
    /// Fetch and save the document
    pub const DOWNLOAD: &str = "download document";
    /// Check the document text
    pub const ASSERT_CONTENT: &str = "assert document content";

    /// All steps
    pub const ALL: [&str; 8] = [
        NAVIGATE,
        SEARCH_ADDRESS,
        VERIFY_PLANS,
        UNCHECK_FILTER,
        CLICK_PLAN,
        VERIFY_DOCUMENT,
        DOWNLOAD,
        ASSERT_CONTENT,
    ];
}

/// Inputs of the scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Report name
    pub name: String,
    /// Address typed into the lookup
    pub address: String,
    /// Plan type filter to uncheck
    pub filter_label: String,
    /// Plan whose document is checked
    pub plan: String,
    /// Substrings the document must contain
    pub expected: Vec<String>,
}

impl Scenario {
    /// Gas plan scenario for an address
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: "search address, filter plans and validate gas plan document".to_string(),
            address: address.into(),
            filter_label: "Electricity".to_string(),
            plan: "Origin Basic".to_string(),
            expected: vec!["Gas".into(), "Fuel type".into(), "MJ/day".into()],
        }
    }

    /// Set the plan
    #[must_use]
    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = plan.into();
        self
    }

    /// Set the filter label
    #[must_use]
    pub fn with_filter(mut self, label: impl Into<String>) -> Self {
        self.filter_label = label.into();
        self
    }

    /// Set the expected substrings
    #[must_use]
    pub fn with_expected(mut self, expected: Vec<String>) -> Self {
        self.expected = expected;
        self
    }

    /// Run every step against `page`, stopping at the first failure
    pub async fn run(
        &self,
        driver: &dyn BrowserDriver,
        page: PageId,
        config: &ProbeConfig,
        attempt: u32,
    ) -> ScenarioOutcome {
        let mut report = ScenarioReport::new(&self.name, attempt);
        let started = Instant::now();
        let result = self.execute(driver, page, config, &mut report).await;
        report.skip_remaining(&steps::ALL);

        match result {
            Ok((artifact, info, classification)) => {
                info!(summary = %report.summary(), "scenario passed");
                ScenarioOutcome {
                    report,
                    artifact: Some(artifact),
                    document: Some(info),
                    classification: Some(classification),
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, elapsed_ms = started.elapsed().as_millis() as u64, "scenario failed");
                ScenarioOutcome {
                    report,
                    artifact: None,
                    document: None,
                    classification: None,
                    error: Some(e),
                }
            }
        }
    }

    async fn execute(
        &self,
        driver: &dyn BrowserDriver,
        page: PageId,
        config: &ProbeConfig,
        report: &mut ScenarioReport,
    ) -> ProbeResult<(DownloadedArtifact, PdfInfo, PlanClassification)> {
        let pricing = PricingPage::new(driver, page, config);

        step(report, steps::NAVIGATE, pricing.navigate()).await?;

        let selection = step(report, steps::SEARCH_ADDRESS, pricing.search_address(&self.address)).await?;
        report.annotate(format!("{selection:?}"));

        step(report, steps::VERIFY_PLANS, pricing.verify_plans_displayed()).await?;

        let toggle = step(report, steps::UNCHECK_FILTER, pricing.uncheck_filter(&self.filter_label)).await?;
        report.annotate(format!("{}: {toggle:?}", self.filter_label));

        let target = step(report, steps::CLICK_PLAN, pricing.click_plan_link(&self.plan)).await?;
        report.annotate(target.to_string());

        let details = PlanDetailsPage::new(driver, target, config);
        let url = step(report, steps::VERIFY_DOCUMENT, details.verify_document_opened()).await?;
        report.annotate(url);

        let artifact = step(report, steps::DOWNLOAD, details.download_document()).await?;
        report.annotate(format!("{} ({} bytes)", artifact.path.display(), artifact.bytes));

        let document = step(report, steps::ASSERT_CONTENT, async {
            details.assert_document_contains(&artifact, &self.expected)
        })
        .await?;
        let classification = document.classify();
        report.annotate(format!(
            "{} pages, gas plan: {}",
            document.info().pages,
            classification.is_gas_plan()
        ));

        Ok((artifact, document.info().clone(), classification))
    }
}

/// Time one step and record its outcome
async fn step<T, F>(report: &mut ScenarioReport, name: &str, fut: F) -> ProbeResult<T>
where
    F: Future<Output = ProbeResult<T>>,
{
    info!(step = name, "step started");
    let started = Instant::now();
    let result = fut.await;
    let elapsed = started.elapsed();
    match &result {
        Ok(_) => report.record(StepEntry::passed(name, elapsed)),
        Err(e) => report.record(StepEntry::failed(name, elapsed, e.to_string())),
    }
    result
}

/// Everything a scenario attempt produced
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// Step report
    pub report: ScenarioReport,
    /// Saved document
    pub artifact: Option<DownloadedArtifact>,
    /// Document facts
    pub document: Option<PdfInfo>,
    /// Gas keyword evidence
    pub classification: Option<PlanClassification>,
    /// Failure that stopped the run
    pub error: Option<ProbeError>,
}

impl ScenarioOutcome {
    /// Whether every step passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.report.all_passed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::mock::{MockBrowser, MockPage};
    use crate::report::StepStatus;

    fn config(dir: &std::path::Path) -> ProbeConfig {
        ProbeConfig::default()
            .with_base_url("https://site.test")
            .with_download_dir(dir)
            .with_timeouts(Timeouts {
                element_ms: 50,
                navigation_ms: 50,
                action_ms: 50,
                retry_ms: 5,
            })
    }

    #[test]
    fn test_defaults() {
        let scenario = Scenario::new("1 Main St").with_plan("Origin Go");
        assert_eq!(scenario.filter_label, "Electricity");
        assert_eq!(scenario.plan, "Origin Go");
        assert_eq!(scenario.expected, vec!["Gas", "Fuel type", "MJ/day"]);
    }

    #[test]
    fn test_step_names_unique() {
        let mut names = steps::ALL.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), steps::ALL.len());
    }

    #[tokio::test]
    async fn test_failure_stops_chain_and_skips_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        // Pricing route has no address box
        let browser = MockBrowser::new()
            .with_route("https://site.test/pricing.html", MockPage::new("https://site.test/pricing.html"));
        let page = browser.open_page(MockPage::new("about:blank")).unwrap();

        let outcome = Scenario::new("1 Main St").run(&browser, page, &config, 1).await;

        assert!(!outcome.passed());
        assert!(matches!(outcome.error, Some(ProbeError::Timeout { .. })));
        let statuses: Vec<_> = outcome.report.steps.iter().map(|s| s.status).collect();
        assert_eq!(statuses[0], StepStatus::Passed);
        assert_eq!(statuses[1], StepStatus::Failed);
        assert!(statuses[2..].iter().all(|s| *s == StepStatus::Skipped));
        assert_eq!(outcome.report.steps.len(), steps::ALL.len());
        assert!(!browser.was_called("fill:"));
        assert!(outcome.artifact.is_none());
    }

    #[tokio::test]
    async fn test_navigation_failure_is_first_step() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let browser = MockBrowser::new();
        let page = browser.open_page(MockPage::new("about:blank")).unwrap();
        browser.close_page(&page).await.unwrap();

        let outcome = Scenario::new("1 Main St").run(&browser, page, &config, 2).await;
        let failure = outcome.report.failure().unwrap();
        assert_eq!(failure.name, steps::NAVIGATE);
        assert_eq!(outcome.report.attempt, 2);
        assert_eq!(outcome.report.passed_count(), 0);
    }
}
