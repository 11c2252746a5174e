//! Step report for a scenario run.
//!
//! Steps stop at the first failure; steps after it are recorded as skipped
//! so the report always lists the whole chain.

use crate::result::ProbeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the JSON report inside the results directory
pub const REPORT_FILE: &str = "planprobe-report.json";

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step passed
    Passed,
    /// Step failed
    Failed,
    /// Step was not reached
    Skipped,
}

impl StepStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// One step of the scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEntry {
    /// Step name
    pub name: String,
    /// Step status
    pub status: StepStatus,
    /// Time spent in the step
    pub duration_ms: u64,
    /// What the step produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepEntry {
    /// Create a passing step
    #[must_use]
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Passed,
            duration_ms: duration.as_millis() as u64,
            detail: None,
            error: None,
        }
    }

    /// Create a failing step
    #[must_use]
    pub fn failed(name: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Failed,
            duration_ms: duration.as_millis() as u64,
            detail: None,
            error: Some(error.into()),
        }
    }

    /// Create a skipped step
    #[must_use]
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            detail: None,
            error: None,
        }
    }
}

/// Report of one scenario attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: String,
    /// Attempt number, starting at 1
    pub attempt: u32,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Steps in order
    pub steps: Vec<StepEntry>,
}

impl ScenarioReport {
    /// Start a report
    #[must_use]
    pub fn new(scenario: impl Into<String>, attempt: u32) -> Self {
        Self {
            scenario: scenario.into(),
            attempt,
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn record(&mut self, entry: StepEntry) {
        self.steps.push(entry);
    }

    /// Attach a detail to the most recent step
    pub fn annotate(&mut self, detail: impl Into<String>) {
        if let Some(last) = self.steps.last_mut() {
            last.detail = Some(detail.into());
        }
    }

    /// Record every planned step that has no entry yet as skipped
    pub fn skip_remaining(&mut self, planned: &[&str]) {
        for name in planned {
            if !self.steps.iter().any(|s| s.name == *name) {
                self.steps.push(StepEntry::skipped(*name));
            }
        }
    }

    /// Get number of passed steps
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_passed()).count()
    }

    /// Get number of failed steps
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_failed()).count()
    }

    /// Whether every step passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status.is_passed())
    }

    /// First failing step
    #[must_use]
    pub fn failure(&self) -> Option<&StepEntry> {
        self.steps.iter().find(|s| s.status.is_failed())
    }

    /// Get total duration
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.steps.iter().map(|s| s.duration_ms).sum())
    }

    /// Generate summary string
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} (attempt {}): {}/{} steps passed in {:.1}s",
            self.scenario,
            self.attempt,
            self.passed_count(),
            self.steps.len(),
            self.total_duration().as_secs_f64()
        )
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report into `dir`
    pub fn write_json(&self, dir: &Path) -> ProbeResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        std::fs::write(&path, self.to_json()?)?;
        Ok(path)
    }
}
