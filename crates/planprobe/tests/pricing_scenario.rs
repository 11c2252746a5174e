//! Pricing scenario end to end against the scripted browser.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use planprobe::locator::role;
use planprobe::mock::text_pdf;
use planprobe::pages::pricing::catalog;
use planprobe::scenario::steps;
use planprobe::{
    ClickEffect, HttpResponse, MockBrowser, MockElement, MockPage, NavigationTarget,
    ProbeConfig, ProbeError, Scenario, Selector, StepStatus, Timeouts,
};
use std::path::Path;
use tempfile::TempDir;

const ADDRESS: &str = "12 Sample St, Suburb STATE 0000";
const PLAN: &str = "Origin Basic";
const PRICING_URL: &str = "https://site.test/pricing.html";
const DOC_URL: &str = "https://site.test/docs/origin-basic.pdf";

fn config(dir: &Path) -> ProbeConfig {
    ProbeConfig::default()
        .with_base_url("https://site.test")
        .with_download_dir(dir)
        .with_timeouts(Timeouts {
            element_ms: 200,
            navigation_ms: 200,
            action_ms: 100,
            retry_ms: 5,
        })
}

fn pricing_page(effect: ClickEffect) -> MockPage {
    let catalog = catalog::build();
    let sel = |name: &str| catalog.require(name).unwrap().selector().clone();
    let row = Selector::text(PLAN).enclosing_row();
    let mut page = MockPage::new(PRICING_URL)
        .with_title("Pricing | Origin")
        .with_element(sel(catalog::ADDRESS_SEARCH_BOX), MockElement::new())
        .with_elements_after_fill(
            Selector::role(role::OPTION),
            [
                MockElement::new().with_text("12 Sample St, Other STATE 1111"),
                MockElement::new().with_text(ADDRESS),
            ],
        )
        .with_element(
            Selector::role(role::CHECKBOX),
            MockElement::new().with_name("Electricity").checked(true),
        )
        .with_element(
            Selector::role(role::CHECKBOX),
            MockElement::new().with_name("Gas").checked(true),
        )
        .with_element(Selector::text(PLAN), MockElement::new().with_text(PLAN))
        .with_element(row.clone(), MockElement::new())
        .with_element(
            row.clone().within(Selector::css("a")),
            MockElement::link("Compare", "/compare"),
        )
        .with_element(
            row.within(Selector::css("a")),
            MockElement::link("Fact sheet", "/docs/origin-basic.pdf").on_click(effect),
        );
    for name in catalog::PLAN_LIST_ELEMENTS {
        page = page.with_element(sel(name), MockElement::new());
    }
    page
}

fn gas_fact_sheet() -> Vec<u8> {
    text_pdf(
        Some("Origin Basic - Gas"),
        &[
            "Basic Plan Information Document",
            "Fuel type: Natural Gas",
            "Daily supply charge 85.00 c/day",
            "Usage 3.30 c/MJ, step 1 up to 60 MJ/day",
        ],
    )
    .unwrap()
}

fn browser(effect: ClickEffect, response: HttpResponse) -> MockBrowser {
    MockBrowser::new()
        .with_route(PRICING_URL, pricing_page(effect))
        .with_response(DOC_URL, response)
}

#[tokio::test]
async fn test_gas_plan_document_validated() {
    let tmp = TempDir::new().unwrap();
    let results = tmp.path().join("test-results");
    let config = config(&results);
    let browser = browser(
        ClickEffect::OpenTab(vec!["about:blank".into(), DOC_URL.into()]),
        HttpResponse::new(200, gas_fact_sheet()),
    );
    let page = browser.open_page(MockPage::new("about:blank")).unwrap();

    let outcome = Scenario::new(ADDRESS).run(&browser, page, &config, 1).await;

    assert!(outcome.passed(), "{:?}", outcome.error);
    assert_eq!(outcome.report.passed_count(), steps::ALL.len());
    let artifact = outcome.artifact.as_ref().unwrap();
    assert_eq!(artifact.path, results.join("origin-basic.pdf"));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), gas_fact_sheet());
    assert!(outcome.classification.as_ref().unwrap().is_gas_plan());
    assert_eq!(outcome.document.as_ref().unwrap().pages, 1);

    let search = &outcome.report.steps[1];
    assert!(search.detail.as_deref().unwrap().contains("Exact"));
    assert!(browser.was_called("set_checked:"));

    let report_path = outcome.report.write_json(&results).unwrap();
    assert!(std::fs::read_to_string(report_path)
        .unwrap()
        .contains("\"passed\""));
}

#[tokio::test]
async fn test_unrendered_tab_falls_back_to_captured_url() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let browser = browser(
        ClickEffect::OpenTab(vec!["about:blank".into()]),
        HttpResponse::new(200, gas_fact_sheet()),
    );
    let page = browser.open_page(MockPage::new("about:blank")).unwrap();

    let outcome = Scenario::new(ADDRESS).run(&browser, page.clone(), &config, 1).await;

    assert!(outcome.passed(), "{:?}", outcome.error);
    let click = outcome
        .report
        .steps
        .iter()
        .find(|s| s.name == steps::CLICK_PLAN)
        .unwrap();
    let expected = NavigationTarget::UrlOnly {
        origin: page,
        url: DOC_URL.to_string(),
    };
    assert_eq!(click.detail.as_deref(), Some(expected.to_string().as_str()));
    assert!(browser.was_called("close_page:"));
    assert_eq!(outcome.artifact.unwrap().url, DOC_URL);
}

#[tokio::test]
async fn test_not_found_document_stops_before_content_check() {
    let tmp = TempDir::new().unwrap();
    let results = tmp.path().join("test-results");
    let config = config(&results);
    let browser = browser(
        ClickEffect::OpenTab(vec![DOC_URL.into()]),
        HttpResponse::not_found(),
    );
    let page = browser.open_page(MockPage::new("about:blank")).unwrap();

    let outcome = Scenario::new(ADDRESS).run(&browser, page, &config, 1).await;

    assert!(!outcome.passed());
    assert!(matches!(
        outcome.error,
        Some(ProbeError::DownloadFailed { status: 404, .. })
    ));
    let failure = outcome.report.failure().unwrap();
    assert_eq!(failure.name, steps::DOWNLOAD);
    assert!(failure.error.as_deref().unwrap().contains("404"));
    assert_eq!(outcome.report.steps.last().unwrap().status, StepStatus::Skipped);
    assert!(!results.exists());
}

#[tokio::test]
async fn test_document_without_gas_terms_names_missing_text() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());
    let electricity_only = text_pdf(None, &["Electricity plan", "Peak 30.1 c/kWh"]).unwrap();
    let browser = browser(
        ClickEffect::OpenTab(vec![DOC_URL.into()]),
        HttpResponse::new(200, electricity_only),
    );
    let page = browser.open_page(MockPage::new("about:blank")).unwrap();

    let outcome = Scenario::new(ADDRESS).run(&browser, page, &config, 1).await;

    match outcome.error {
        Some(ProbeError::MissingContent { ref needle }) => assert_eq!(needle, "Gas"),
        ref other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(outcome.report.failure().unwrap().name, steps::ASSERT_CONTENT);
    assert!(outcome.artifact.is_none());
}
