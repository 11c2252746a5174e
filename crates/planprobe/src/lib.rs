//! Planprobe: end-to-end checks for an energy plan pricing site
//!
//! Drives a browser through the pricing page: search an address, uncheck a
//! plan type filter, follow a plan's document link (new tab, silent tab or
//! captured URL), download the PDF with the browser's cookies and check its
//! text.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │ Scenario     │───►│ Step objects │───►│ BrowserDriver    │
//! │ (report)     │    │ (pages/)     │    │ cdp | mock       │
//! └──────────────┘    └──────┬───────┘    └──────────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐    ┌──────────────────┐
//!                     │ Navigation   │───►│ ArtifactStore +  │
//!                     │ Target       │    │ PdfDocument      │
//!                     └──────────────┘    └──────────────────┘
//! ```
//!
//! The `browser` feature enables the chromiumoxide driver. Without it the
//! step objects run against [`MockBrowser`].

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod artifact;
#[cfg(feature = "browser")]
pub mod cdp;
pub mod config;
pub mod driver;
pub mod locator;
pub mod mock;
pub mod page_object;
pub mod pages;
pub mod pdf;
pub mod report;
mod result;
pub mod retry;
pub mod scenario;
pub mod target;
pub mod wait;

pub use artifact::{ArtifactStore, DownloadedArtifact};
#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
pub use config::{ProbeConfig, SuggestionPolicy, Timeouts};
pub use driver::{BrowserDriver, HttpResponse, PageId, PageWatcher};
pub use locator::{Locator, Nth, Selector};
pub use mock::{ClickEffect, MockBrowser, MockElement, MockPage};
pub use page_object::{LocatorCatalog, PageObject, UrlMatcher};
pub use pages::{AddressSelection, FilterToggle, PlanDetailsPage, PricingPage};
pub use pdf::{classify_text, PdfDocument, PdfInfo, PlanClassification, GAS_KEYWORDS};
pub use report::{ScenarioReport, StepEntry, StepStatus};
pub use result::{ProbeError, ProbeResult};
pub use retry::{poll_until, RetryPolicy};
pub use scenario::{Scenario, ScenarioOutcome};
pub use target::NavigationTarget;
pub use wait::{LoadState, WaitOptions};

use tracing_subscriber::EnvFilter;

/// Install a stderr fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a global subscriber was already set.
pub fn init_tracing() -> bool {
    init_tracing_with("info")
}

/// Install a fmt subscriber, falling back to `default_filter` when
/// `RUST_LOG` is unset or invalid
pub fn init_tracing_with(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
