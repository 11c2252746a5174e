//! Terminal output: status lines, spinners and step reports

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use planprobe::{PdfInfo, PlanClassification, ScenarioReport, StepStatus};
use std::time::Duration;

/// Progress reporter writing to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Show a spinner until [`Self::finish`]
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(spinner);
    }

    /// Clear the spinner
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn line(&self, prefix: &str, message: &str) {
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        self.line(&prefix, message);
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        self.line(&prefix, message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        self.line(&prefix, message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        self.line(&prefix, message);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&styled);
    }

    /// Print every step of a scenario attempt and its summary
    pub fn scenario(&self, report: &ScenarioReport) {
        let failed = report.failed_count() > 0;
        if self.quiet && !failed {
            return;
        }
        for line in render_steps(report, self.use_color) {
            let _ = self.term.write_line(&line);
        }
        let summary = report.summary();
        if failed {
            self.failure(&summary);
        } else {
            self.success(&summary);
        }
    }
}

/// One line per step: status marker, name, duration, detail or error
#[must_use]
pub fn render_steps(report: &ScenarioReport, use_color: bool) -> Vec<String> {
    let passed = Style::new().green();
    let failed = Style::new().red().bold();
    let skipped = Style::new().yellow();

    report
        .steps
        .iter()
        .map(|step| {
            let (marker, style) = match step.status {
                StepStatus::Passed => ("PASS", &passed),
                StepStatus::Failed => ("FAIL", &failed),
                StepStatus::Skipped => ("SKIP", &skipped),
            };
            let marker = if use_color {
                style.apply_to(marker).to_string()
            } else {
                marker.to_string()
            };
            let mut line = format!("  {marker} {} ({}ms)", step.name, step.duration_ms);
            if let Some(ref error) = step.error {
                line.push_str(&format!(": {error}"));
            } else if let Some(ref detail) = step.detail {
                line.push_str(&format!(" - {detail}"));
            }
            line
        })
        .collect()
}

/// Human-readable PDF facts
#[must_use]
pub fn render_pdf(info: &PdfInfo, classification: &PlanClassification) -> Vec<String> {
    let mut lines = vec![
        format!("pages:       {}", info.pages),
        format!("version:     {}", info.version),
        format!("text length: {}", info.text_length),
    ];
    if let Some(ref title) = info.title {
        lines.push(format!("title:       {title}"));
    }
    if let Some(ref producer) = info.producer {
        lines.push(format!("producer:    {producer}"));
    }
    lines.push(format!(
        "plan type:   {}",
        if classification.is_gas_plan() {
            "gas"
        } else if classification.electricity_only {
            "electricity only"
        } else {
            "unknown"
        }
    ));
    if !classification.gas_keywords.is_empty() {
        lines.push(format!("gas terms:   {}", classification.gas_keywords.join(", ")));
    }
    lines
}
