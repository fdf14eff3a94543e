//! Console rendering of a run report

use colored::Colorize;
use loadgate_engine::{MetricSummary, RunReport};
use std::fmt::Write;

const NAME_WIDTH: usize = 28;

fn dotted(name: &str) -> String {
    let dots = NAME_WIDTH.saturating_sub(name.len() + 1);
    format!("{} {}", name, ".".repeat(dots))
}

fn describe(summary: &MetricSummary) -> String {
    match summary {
        MetricSummary::Counter { total, per_second } => format!("{} {:.2}/s", total, per_second),
        MetricSummary::Rate { passes, total, rate } => {
            format!("{:.2}% {} out of {}", rate * 100.0, passes, total)
        }
        MetricSummary::Trend(t) if t.count == 0 => "no samples".to_string(),
        MetricSummary::Trend(t) => format!(
            "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
            t.avg, t.min, t.med, t.max, t.p90, t.p95
        ),
    }
}

/// Human readable summary, thresholds first
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\n{} {}", "Run".bold(), report.run_id);
    let _ = writeln!(
        out,
        "  elapsed {:.1}s, max {} VUs, {} iterations completed, {} dropped{}",
        report.elapsed.as_secs_f64(),
        report.vus_max,
        report.iterations_completed,
        report.iterations_dropped,
        if report.aborted {
            format!(" {}", "(aborted)".yellow())
        } else {
            String::new()
        }
    );

    if !report.thresholds.is_empty() {
        let _ = writeln!(out, "\n{}", "Thresholds".bold());
        for result in &report.thresholds {
            let mark = if result.passed {
                "✓".bright_green().bold()
            } else {
                "✗".bright_red().bold()
            };
            let detail = match (&result.observed, &result.error) {
                (_, Some(e)) => e.to_string(),
                (Some(observed), None) => format!("observed {:.4}", observed),
                (None, None) => String::new(),
            };
            let _ = writeln!(
                out,
                "  {} {} {}  {}",
                mark,
                dotted(&result.selector),
                result.expression,
                detail.dimmed()
            );
        }
    }

    let _ = writeln!(out, "\n{}", "Metrics".bold());
    for metric in &report.metrics {
        let value = match &metric.summary {
            Some(summary) => describe(summary),
            None => "not recorded".to_string(),
        };
        let _ = writeln!(out, "  {}: {}", dotted(&metric.name), value);
    }

    let verdict = if report.passed {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    let _ = writeln!(out, "\n{} {}", "Verdict:".bold(), verdict);
    out
}
