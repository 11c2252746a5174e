//! Scenario attempts with retries

use crate::error::CliResult;
use crate::output::ProgressReporter;
use planprobe::ScenarioOutcome;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Run attempts until one passes or `retries` extra attempts are spent.
///
/// Errors from `attempt` itself (a browser that will not launch) end the run
/// immediately; failed scenarios are retried.
pub async fn run_with_retries<F, Fut>(
    retries: u32,
    reporter: &ProgressReporter,
    mut attempt: F,
) -> CliResult<ScenarioOutcome>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = CliResult<ScenarioOutcome>>,
{
    let total = retries.saturating_add(1);
    let mut number = 1;
    loop {
        let outcome = attempt(number).await?;
        reporter.scenario(&outcome.report);
        if outcome.passed() || number >= total {
            info!(attempt = number, passed = outcome.passed(), "scenario finished");
            return Ok(outcome);
        }
        warn!(attempt = number, total, "scenario attempt failed, retrying");
        reporter.warning(&format!("attempt {number} of {total} failed, retrying"));
        number += 1;
    }
}

/// Write the final attempt's JSON report next to the downloads
pub fn write_report(outcome: &ScenarioOutcome, dir: &Path) -> CliResult<PathBuf> {
    Ok(outcome.report.write_json(dir)?)
}

/// One scenario attempt in a freshly launched browser
#[cfg(feature = "browser")]
pub async fn browser_attempt(
    config: &planprobe::ProbeConfig,
    scenario: &planprobe::Scenario,
    attempt: u32,
) -> CliResult<ScenarioOutcome> {
    let driver = planprobe::ChromiumDriver::launch(config).await?;
    let page = driver.new_page().await?;
    let outcome = scenario.run(&driver, page, config, attempt).await;
    if let Err(e) = driver.close().await {
        warn!(error = %e, "browser did not close cleanly");
    }
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use planprobe::report::REPORT_FILE;
    use planprobe::{MockBrowser, MockPage, ProbeConfig, Scenario, StepStatus, Timeouts};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(dir: &Path) -> ProbeConfig {
        ProbeConfig::default()
            .with_base_url("https://site.test")
            .with_download_dir(dir)
            .with_timeouts(Timeouts {
                element_ms: 20,
                navigation_ms: 20,
                action_ms: 20,
                retry_ms: 5,
            })
    }

    /// Attempt against a pricing page without an address box
    async fn failing_attempt(config: &ProbeConfig, attempt: u32) -> CliResult<ScenarioOutcome> {
        let browser = MockBrowser::new().with_route(
            "https://site.test/pricing.html",
            MockPage::new("https://site.test/pricing.html"),
        );
        let page = browser.open_page(MockPage::new("about:blank"))?;
        Ok(Scenario::new("1 Main St")
            .run(&browser, page, config, attempt)
            .await)
    }

    #[tokio::test]
    async fn test_retries_until_budget_spent() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let calls = AtomicU32::new(0);
        let reporter = ProgressReporter::new(false, true);

        let outcome = run_with_retries(2, &reporter, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            let config = &config;
            async move { failing_attempt(config, attempt).await }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.report.attempt, 3);
        assert!(!outcome.passed());
        assert_eq!(outcome.report.steps[1].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_attempt_error_is_not_retried() {
        let reporter = ProgressReporter::new(false, true);
        let calls = AtomicU32::new(0);
        let result = run_with_retries(5, &reporter, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<ScenarioOutcome, _>(CliError::from(planprobe::ProbeError::BrowserNotFound)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_report_written_to_results_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let results = tmp.path().join("test-results");
        let config = config(&results);
        let outcome = failing_attempt(&config, 1).await.unwrap();
        let path = write_report(&outcome, &results).unwrap();
        assert_eq!(path, results.join(REPORT_FILE));
        assert!(std::fs::read_to_string(path).unwrap().contains("\"failed\""));
    }
}
