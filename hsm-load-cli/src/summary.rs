//! End-of-test summary: text for the terminal, JSON for files

use anyhow::{Context, Result};
use colored::Colorize;
use hsm_load_core::{names, MetricValue, TestResult, TrendStats};
use std::fmt;
use std::fs;
use std::path::Path;

const INDENT: &str = "  ";
const LABEL_WIDTH: usize = 28;

/// Human-readable summary of a finished run
pub struct TextSummary<'a> {
    result: &'a TestResult,
    colors: bool,
}

impl<'a> TextSummary<'a> {
    pub fn new(result: &'a TestResult, colors: bool) -> Self {
        Self { result, colors }
    }

    fn mark(&self, passed: bool) -> String {
        match (passed, self.colors) {
            (true, true) => "✓".green().to_string(),
            (false, true) => "✗".red().to_string(),
            (true, false) => "✓".to_string(),
            (false, false) => "✗".to_string(),
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.colors {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn metric_line(&self, f: &mut fmt::Formatter<'_>, name: &str, value: String) -> fmt::Result {
        let label = format!("{} ", name);
        writeln!(f, "{INDENT}{INDENT}{:.<width$}: {}", label, value, width = LABEL_WIDTH)
    }

    fn trend_value(&self, name: &str) -> String {
        match self.result.metrics.trend(name) {
            Some(stats) if stats.count > 0 => format_trend(stats),
            _ => "no samples".to_string(),
        }
    }

    fn rate_value(&self, name: &str) -> String {
        match self.result.metrics.get(name) {
            Some(MetricValue::Rate { passes, total, rate }) => format!(
                "{}  {} {}  {} {}",
                percent(*rate),
                self.mark(true),
                passes,
                self.mark(false),
                total - passes
            ),
            _ => "no samples".to_string(),
        }
    }

    fn counter_value(&self, name: &str) -> String {
        self.result.metrics.counter(name).unwrap_or(0).to_string()
    }
}

impl fmt::Display for TextSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;

        writeln!(f)?;
        writeln!(f, "{INDENT}{}", self.heading("hsm-load summary"))?;
        writeln!(
            f,
            "{INDENT}run {}  duration {:.1}s  peak {} VUs{}",
            result.run_id,
            result.duration.as_secs_f64(),
            result.vus_max,
            if result.aborted { "  (aborted)" } else { "" }
        )?;

        writeln!(f)?;
        writeln!(f, "{INDENT}{}", self.heading("HTTP"))?;
        self.metric_line(
            f,
            names::HTTP_REQS,
            format!(
                "{}  {:.2}/s",
                self.counter_value(names::HTTP_REQS),
                result.request_rate()
            ),
        )?;
        self.metric_line(f, names::HTTP_REQ_FAILED, self.rate_value(names::HTTP_REQ_FAILED))?;
        self.metric_line(f, names::HTTP_REQ_DURATION, self.trend_value(names::HTTP_REQ_DURATION))?;

        writeln!(f)?;
        writeln!(f, "{INDENT}{}", self.heading("HSM"))?;
        self.metric_line(f, names::ENCRYPT_DURATION, self.trend_value(names::ENCRYPT_DURATION))?;
        self.metric_line(f, names::DECRYPT_DURATION, self.trend_value(names::DECRYPT_DURATION))?;
        self.metric_line(f, names::TOTAL_OPERATIONS, self.counter_value(names::TOTAL_OPERATIONS))?;
        self.metric_line(f, names::ENCRYPT_FAILURES, self.counter_value(names::ENCRYPT_FAILURES))?;
        self.metric_line(f, names::ROUNDTRIP_FAILURES, self.counter_value(names::ROUNDTRIP_FAILURES))?;
        self.metric_line(f, names::ERRORS, self.rate_value(names::ERRORS))?;
        self.metric_line(f, names::ITERATIONS, self.counter_value(names::ITERATIONS))?;
        self.metric_line(f, names::ITERATION_DURATION, self.trend_value(names::ITERATION_DURATION))?;

        if !result.metrics.checks.is_empty() {
            writeln!(f)?;
            writeln!(f, "{INDENT}{}", self.heading("CHECKS"))?;
            for (name, stats) in &result.metrics.checks {
                let total = stats.passes + stats.fails;
                let share = if total == 0 { 0.0 } else { stats.passes as f64 / total as f64 };
                writeln!(
                    f,
                    "{INDENT}{INDENT}{} {}  {}/{} ({})",
                    self.mark(stats.fails == 0),
                    name,
                    stats.passes,
                    total,
                    percent(share)
                )?;
            }
        }

        if !result.verdict.outcomes.is_empty() {
            writeln!(f)?;
            writeln!(f, "{INDENT}{}", self.heading("THRESHOLDS"))?;
            for outcome in &result.verdict.outcomes {
                write!(
                    f,
                    "{INDENT}{INDENT}{} {} {}",
                    self.mark(outcome.passed),
                    outcome.metric,
                    outcome.expression
                )?;
                match (&outcome.reason, outcome.observed) {
                    (Some(reason), _) => writeln!(f, "  ({})", reason)?,
                    (None, Some(observed)) => writeln!(f, "  (observed {:.2})", observed)?,
                    (None, None) => writeln!(f)?,
                }
            }
        }

        writeln!(f)?;
        let verdict = match (result.passed(), self.colors) {
            (true, true) => "PASSED".green().bold().to_string(),
            (false, true) => "FAILED".red().bold().to_string(),
            (true, false) => "PASSED".to_string(),
            (false, false) => "FAILED".to_string(),
        };
        writeln!(f, "{INDENT}result: {}", verdict)
    }
}

fn format_trend(stats: &TrendStats) -> String {
    format!(
        "avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={}",
        millis(stats.avg),
        millis(stats.min),
        millis(stats.med),
        millis(stats.max),
        millis(stats.p90),
        millis(stats.p95),
        millis(stats.p99)
    )
}

fn millis(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:.2}s", value / 1000.0)
    } else {
        format!("{:.2}ms", value)
    }
}

fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// Write the full result as pretty JSON, creating parent directories
pub fn write_json(result: &TestResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(result).context("Failed to serialize test result")?;
    fs::write(path, json).with_context(|| format!("Failed to write summary to {:?}", path))?;
    Ok(())
}
