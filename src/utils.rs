//! # Utility Functions
//!
//! Formatting helpers for human-readable console output: durations, token
//! rates, and the phase table printed when a sweep finishes.

use crate::sweep::{StopReason, SweepReport};
use std::time::Duration;

/// Format duration in a human-readable way
///
/// Sub-second values use two decimals, durations over a minute use a compound
/// form.
///
/// ```rust
/// # use llm_server_benchmark::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a token rate with K/M scaling.
///
/// ```rust
/// # use llm_server_benchmark::utils::format_token_rate;
/// assert_eq!(format_token_rate(12.346, "s"), "12.35 tok/s");
/// assert_eq!(format_token_rate(45_600.0, "min"), "45.60K tok/min");
/// ```
pub fn format_token_rate(tokens: f64, unit: &str) -> String {
    if tokens < 1_000.0 {
        format!("{:.2} tok/{}", tokens, unit)
    } else if tokens < 1_000_000.0 {
        format!("{:.2}K tok/{}", tokens / 1_000.0, unit)
    } else {
        format!("{:.2}M tok/{}", tokens / 1_000_000.0, unit)
    }
}

/// Render one table row, padding each column to its width.
pub fn table_row(columns: &[&str], widths: &[usize]) -> String {
    let mut row = String::from("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        row.push_str(&format!(" {:width$} |", column, width = width));
    }
    row
}

/// Render a `+----+` separator matching `widths`.
pub fn table_separator(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for &width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}

/// Tabulate every phase of a sweep plus the stop reason.
///
/// ```text
/// +-------------+------------------+------------------+----------+------------+
/// | Parallelism | Avg TPS          | Total TPS        | Requests | Wall Time  |
/// +-------------+------------------+------------------+----------+------------+
/// | 1           | 52.10 tok/s      | 52.10 tok/s      | 14       | 30.01s     |
/// +-------------+------------------+------------------+----------+------------+
/// ```
pub fn render_sweep_table(report: &SweepReport) -> String {
    let widths = [11, 16, 16, 8, 10];
    let mut lines = vec![
        table_separator(&widths),
        table_row(
            &["Parallelism", "Avg TPS", "Total TPS", "Requests", "Wall Time"],
            &widths,
        ),
        table_separator(&widths),
    ];

    for summary in report.summaries() {
        let parallelism = summary.parallelism.to_string();
        let avg = format_token_rate(summary.avg_tps, "s");
        let total = format_token_rate(summary.total_tps, "s");
        let requests = summary.total_requests.to_string();
        let wall = format_duration(Duration::from_secs_f64(summary.benchmark_time.max(0.0)));
        lines.push(table_row(
            &[
                parallelism.as_str(),
                avg.as_str(),
                total.as_str(),
                requests.as_str(),
                wall.as_str(),
            ],
            &widths,
        ));
    }
    lines.push(table_separator(&widths));

    match &report.stop_reason {
        StopReason::Completed => lines.push("Sweep completed all levels".to_string()),
        StopReason::ThroughputBelowFloor {
            parallelism,
            avg_tps,
            min_tps,
        } => lines.push(format!(
            "Stopped at parallelism {}: avg TPS {:.2} below floor {:.2}",
            parallelism, avg_tps, min_tps
        )),
    }
    if let Some(peak) = report.peak() {
        lines.push(format!(
            "Peak throughput: {} at parallelism {}",
            format_token_rate(peak.summary.total_tps, "s"),
            peak.summary.parallelism
        ));
    }

    lines.join("\n")
}
