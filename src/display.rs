use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::aggregate::{RoundRecord, RunReport, Summary};
use crate::config::BenchConfig;
use crate::timer::Measurement;
use crate::types::Backend;

const COLUMN_WIDTH: usize = 12;
const LABEL_WIDTH: usize = 5;

fn style_label() -> Style {
    Style::new().cyan().bold()
}

/// Convert bytes to mebibytes for display.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

/// `using sqlite backend, 10 rounds (+1 warm up), 10000 items`
pub fn format_header(backend: Backend, config: &BenchConfig) -> String {
    let line = format!(
        "using {} backend, {} rounds (+{} warm up), {} items",
        backend, config.rounds, config.warmup, config.count
    );
    line.if_supports_color(Stream::Stderr, |s| s.dimmed())
        .to_string()
}

/// Progress line rewritten in place with a leading carriage return.
///
/// Padded so that a shorter line fully overwrites a longer one.
pub fn format_progress(index: usize, total: usize, warmup: bool) -> String {
    let marker = if warmup { "(warm up)" } else { "" };
    format!(
        "\rround {:>width$}/{} {:<9}",
        index + 1,
        total,
        marker,
        width = total.to_string().len()
    )
}

/// Clears whatever the progress line left behind.
pub fn clear_progress(total: usize) -> String {
    let width = "round /  (warm up)".len() + 2 * total.to_string().len();
    format!("\r{}\r", " ".repeat(width))
}

/// `5000.0 ops/s find 0.200 ms, 41.3 MB memory`
pub fn format_measurement(m: &Measurement) -> String {
    let memory = match m.rss_bytes {
        Some(bytes) => format!("{:.1} MB memory", bytes_to_mb(bytes)),
        None => "memory n/a".to_string(),
    };
    let op = format!("{:<6}", m.op.name());
    format!(
        "round {:>3}  {:>12.1} ops/s  {}  {:>10.3} ms,  {}",
        m.round,
        m.ops_per_sec(),
        op.if_supports_color(Stream::Stderr, |s| s.green()),
        m.per_invocation_ms(),
        memory
    )
}

fn format_row(label: &str, record: &RoundRecord) -> String {
    let label = format!("{:<width$}", label, width = LABEL_WIDTH);
    let mut row = label
        .if_supports_color(Stream::Stdout, |s| s.style(style_label()))
        .to_string();
    for (_, ms) in record.columns() {
        row.push_str(&format!("{:>width$.3}", ms, width = COLUMN_WIDTH));
    }
    row.push('\n');
    row
}

/// Tabular min/avg/max report, one column per bucket, values in ms.
pub fn format_table(summary: &Summary) -> String {
    let mut out = String::new();

    let mut header = " ".repeat(LABEL_WIDTH);
    for (name, _) in summary.min.columns() {
        header.push_str(&format!("{:>width$}", name, width = COLUMN_WIDTH));
    }
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.bold())
            .to_string(),
    );
    out.push('\n');

    out.push_str(&format_row("min", &summary.min));
    out.push_str(&format_row("avg", &summary.avg));
    out.push_str(&format_row("max", &summary.max));

    let footer = format!(
        "ms per round, {} measured rounds",
        summary.rounds
    );
    out.push_str(
        &footer
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push('\n');

    out
}

/// JSON output format.
#[derive(Serialize)]
struct JsonReport<'a> {
    backend: Backend,
    finished_at: String,
    count: usize,
    rounds: usize,
    warmup: usize,
    find_repeat: usize,
    summary: &'a Summary,
    warmup_rounds: &'a [RoundRecord],
    measured_rounds: &'a [RoundRecord],
}

pub fn format_json(
    report: &RunReport,
    backend: Backend,
    config: &BenchConfig,
    now: DateTime<Utc>,
) -> String {
    let json = JsonReport {
        backend,
        finished_at: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        count: config.count,
        rounds: report.plan.retained(),
        warmup: report.plan.warmup(),
        find_repeat: config.find_repeat,
        summary: &report.summary,
        warmup_rounds: &report.warmup,
        measured_rounds: &report.rounds,
    };

    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}
