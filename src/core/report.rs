use crate::core::metrics::{MetricsSnapshot, MetricsSummary};
use crate::core::thresholds::ThresholdResult;
use crate::core::Storage;
use crate::utils::duration::format_millis;
use crate::utils::error::{LoadTestError, Result};
use serde::Serialize;
use std::fmt::Write as _;

pub const SAMPLES_FILE: &str = "samples.csv";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub scenario: &'a str,
    pub summary: &'a MetricsSummary,
    pub thresholds: &'a [ThresholdResult],
    pub passed: bool,
}

/// 把每筆請求寫成 CSV
pub fn samples_csv(snapshot: &MetricsSnapshot) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for sample in &snapshot.samples {
        writer.serialize(sample)?;
    }
    writer
        .into_inner()
        .map_err(|e| LoadTestError::IoError(e.into_error()))
}

/// 寫出 samples.csv 與 summary.json，回傳輸出目錄
pub async fn write_report<S: Storage>(
    storage: &S,
    scenario: &str,
    snapshot: &MetricsSnapshot,
    thresholds: &[ThresholdResult],
) -> Result<()> {
    let csv_data = samples_csv(snapshot)?;
    tracing::debug!("Writing {} samples ({} bytes)", snapshot.samples.len(), csv_data.len());
    storage.write_file(SAMPLES_FILE, &csv_data).await?;

    let report = RunReport {
        scenario,
        summary: &snapshot.summary,
        thresholds,
        passed: thresholds.iter().all(|t| t.passed),
    };
    let json = serde_json::to_vec_pretty(&report)?;
    storage.write_file(SUMMARY_FILE, &json).await?;

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1000.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} kB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// 終端機摘要，版面參考 k6 的 end-of-test summary
pub fn render_summary(summary: &MetricsSummary, thresholds: &[ThresholdResult]) -> String {
    let mut out = String::new();
    let trend = &summary.http_req_duration;

    let _ = writeln!(out, "📈 Load test summary");
    for check in &summary.check_details {
        let mark = if check.fails == 0 { "✓" } else { "✗" };
        let total = check.passes + check.fails;
        let _ = writeln!(
            out,
            "  {} {} ({}/{} passed)",
            mark, check.name, check.passes, total
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  checks.....................: {:.2}% ✓ {} ✗ {}",
        summary.checks.rate * 100.0,
        summary.checks.passes,
        summary.checks.fails
    );
    let _ = writeln!(
        out,
        "  data_received..............: {}",
        format_bytes(summary.data_received)
    );
    let _ = writeln!(
        out,
        "  data_sent..................: {}",
        format_bytes(summary.data_sent)
    );
    let _ = writeln!(
        out,
        "  dropped_iterations.........: {}",
        summary.dropped_iterations
    );
    let _ = writeln!(
        out,
        "  http_req_duration..........: avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={}",
        format_millis(trend.avg),
        format_millis(trend.min),
        format_millis(trend.med),
        format_millis(trend.max),
        format_millis(trend.p90),
        format_millis(trend.p95),
        format_millis(trend.p99)
    );
    let _ = writeln!(
        out,
        "  http_req_failed............: {:.2}% ✓ {} ✗ {}",
        summary.http_req_failed.rate * 100.0,
        summary.http_req_failed.passes,
        summary.http_req_failed.fails
    );
    let _ = writeln!(
        out,
        "  http_reqs..................: {} {:.2}/s",
        summary.http_reqs, summary.http_reqs_per_second
    );
    let _ = writeln!(out, "  iterations.................: {}", summary.iterations);
    if summary.interrupted_iterations > 0 {
        let _ = writeln!(
            out,
            "  interrupted_iterations.....: {}",
            summary.interrupted_iterations
        );
    }
    let _ = writeln!(out, "  vus_max....................: {}", summary.vus_max);

    if !thresholds.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "🎯 Thresholds");
        for result in thresholds {
            let _ = writeln!(out, "  {}", result);
        }
    }

    out
}
