//! Command handlers

use crate::commands::{ConfigArgs, InspectFormat, InspectPdfArgs, RunArgs, VerifySetupArgs};
use crate::config::apply_run_args;
use crate::error::{CliError, CliResult};
use crate::output::{render_pdf, ProgressReporter};
use planprobe::{ArtifactStore, PdfDocument, PdfInfo, PlanClassification, ProbeConfig};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// JSON shape of `inspect-pdf --format json`
#[derive(Debug, Serialize)]
pub struct PdfInspection {
    /// Document facts
    pub info: PdfInfo,
    /// Gas keyword evidence
    pub classification: PlanClassification,
    /// Whether the evidence reads as a gas plan
    pub gas_plan: bool,
    /// Expected substrings the text lacks
    pub missing: Vec<String>,
}

impl PdfInspection {
    /// Inspect a PDF on disk
    pub fn from_path<S: AsRef<str>>(path: &Path, expected: &[S]) -> CliResult<Self> {
        let document = PdfDocument::open(path)?;
        let classification = document.classify();
        Ok(Self {
            info: document.info().clone(),
            gas_plan: classification.is_gas_plan(),
            classification,
            missing: document
                .missing(expected)
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }
}

/// `inspect-pdf`: print document facts, fail when expected text is missing
pub fn inspect_pdf(args: &InspectPdfArgs, reporter: &ProgressReporter) -> CliResult<()> {
    let inspection = PdfInspection::from_path(&args.path, &args.expected)?;
    match args.format {
        InspectFormat::Json => println!("{}", serde_json::to_string_pretty(&inspection)?),
        InspectFormat::Text => {
            reporter.header(&args.path.display().to_string());
            for line in render_pdf(&inspection.info, &inspection.classification) {
                println!("{line}");
            }
        }
    }
    if let Some(needle) = inspection.missing.first() {
        return Err(planprobe::ProbeError::MissingContent {
            needle: needle.clone(),
        }
        .into());
    }
    if !args.expected.is_empty() {
        reporter.success(&format!("all {} expected strings found", args.expected.len()));
    }
    Ok(())
}

/// `config`: validate and render the effective configuration as YAML
pub fn show_config(config: &ProbeConfig, args: &ConfigArgs) -> CliResult<Option<String>> {
    config.validate()?;
    if args.check {
        return Ok(None);
    }
    Ok(Some(config.to_yaml()?))
}

/// Check the results directory can be created and written
pub fn check_results_dir(dir: &Path) -> CliResult<()> {
    let store = ArtifactStore::new(dir);
    store.ensure_dir()?;
    let probe = store.dir().join(".planprobe-write-check");
    std::fs::write(&probe, b"ok")
        .and_then(|()| std::fs::remove_file(&probe))
        .map_err(|e| CliError::setup(format!("{} is not writable: {e}", dir.display())))
}

/// `verify-setup`: results directory, then a browser launch
pub async fn verify_setup(
    config: &ProbeConfig,
    args: &VerifySetupArgs,
    reporter: &mut ProgressReporter,
) -> CliResult<()> {
    reporter.header("planprobe setup");
    config.validate()?;
    reporter.success(&format!("configuration valid ({})", config.pricing_url()));

    check_results_dir(&config.download_dir)?;
    reporter.success(&format!(
        "results directory writable ({})",
        config.download_dir.display()
    ));

    if args.skip_browser {
        reporter.info("browser check skipped");
        return Ok(());
    }
    check_browser(config, reporter).await
}

#[cfg(feature = "browser")]
async fn check_browser(config: &ProbeConfig, reporter: &mut ProgressReporter) -> CliResult<()> {
    use planprobe::BrowserDriver;

    reporter.start_spinner("launching browser");
    let result = async {
        let driver = planprobe::ChromiumDriver::launch(config).await?;
        let page = driver.new_page().await?;
        let url = driver.current_url(&page).await?;
        driver.close().await?;
        Ok::<_, CliError>(url)
    }
    .await;
    reporter.finish();
    let url = result?;
    info!(%url, "browser check passed");
    reporter.success(&format!("browser launched (headless: {})", config.headless));
    Ok(())
}

#[cfg(not(feature = "browser"))]
async fn check_browser(_config: &ProbeConfig, _reporter: &mut ProgressReporter) -> CliResult<()> {
    Err(CliError::setup(
        "built without the browser feature; rebuild with --features browser",
    ))
}

/// `run`: the pricing scenario with retries, then the JSON report
pub async fn run(
    config: ProbeConfig,
    args: &RunArgs,
    reporter: &mut ProgressReporter,
) -> CliResult<()> {
    let config = apply_run_args(config, args);
    config.validate()?;
    let scenario = planprobe::Scenario::new(args.address.clone())
        .with_plan(args.plan.clone())
        .with_filter(args.filter.clone())
        .with_expected(args.expected.clone());

    reporter.header(&scenario.name);
    reporter.info(&format!(
        "{} | plan {:?} | retries {}",
        config.pricing_url(),
        scenario.plan,
        config.retries
    ));

    reporter.start_spinner("running scenario");
    let outcome = run_scenario(&config, &scenario, reporter).await;
    reporter.finish();
    let outcome = outcome?;

    let report = crate::runner::write_report(&outcome, &config.download_dir)?;
    reporter.info(&format!("report written to {}", report.display()));

    if let Some(ref artifact) = outcome.artifact {
        reporter.success(&format!(
            "document saved to {} ({:.2} KB)",
            artifact.path.display(),
            artifact.size_kb()
        ));
    }
    match outcome.error {
        None => Ok(()),
        Some(e) => Err(CliError::ScenarioFailed {
            attempts: outcome.report.attempt,
            message: e.to_string(),
        }),
    }
}

#[cfg(feature = "browser")]
async fn run_scenario(
    config: &ProbeConfig,
    scenario: &planprobe::Scenario,
    reporter: &ProgressReporter,
) -> CliResult<planprobe::ScenarioOutcome> {
    crate::runner::run_with_retries(config.retries, reporter, |attempt| {
        crate::runner::browser_attempt(config, scenario, attempt)
    })
    .await
}

#[cfg(not(feature = "browser"))]
async fn run_scenario(
    _config: &ProbeConfig,
    _scenario: &planprobe::Scenario,
    _reporter: &ProgressReporter,
) -> CliResult<planprobe::ScenarioOutcome> {
    Err(CliError::setup(
        "built without the browser feature; rebuild with --features browser",
    ))
}
