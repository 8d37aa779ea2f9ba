use crate::domain::model::{IterationOutcome, RequestSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 壓測期間的指標收集器，由所有 VU 共用
pub struct MetricsCollector {
    start_time: Instant,
    samples: Mutex<Vec<RequestSample>>,
    checks: Mutex<BTreeMap<String, (u64, u64)>>,
    iterations: AtomicU64,
    dropped_iterations: AtomicU64,
    interrupted_iterations: AtomicU64,
    active_vus: AtomicUsize,
    peak_vus: AtomicUsize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendStats {
    pub min: f64,
    pub avg: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateStats {
    pub rate: f64,
    pub passes: u64,
    pub fails: u64,
}

impl RateStats {
    fn from_counts(passes: u64, fails: u64) -> Self {
        let total = passes + fails;
        Self {
            rate: if total == 0 {
                0.0
            } else {
                passes as f64 / total as f64
            },
            passes,
            fails,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub test_run_duration_ms: f64,
    pub http_reqs: u64,
    pub http_reqs_per_second: f64,
    pub http_req_duration: TrendStats,
    /// rate 為失敗比例
    pub http_req_failed: RateStats,
    pub checks: RateStats,
    pub check_details: Vec<CheckSummary>,
    pub iterations: u64,
    pub dropped_iterations: u64,
    pub interrupted_iterations: u64,
    pub vus_max: usize,
    pub data_sent: u64,
    pub data_received: u64,
}

/// 某一時間點的指標快照；保留排序後的延遲以計算任意百分位
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub summary: MetricsSummary,
    pub durations_ms: Vec<f64>,
    pub samples: Vec<RequestSample>,
}

impl MetricsSnapshot {
    pub fn percentile(&self, p: f64) -> f64 {
        percentile(&self.durations_ms, p)
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            samples: Mutex::new(Vec::new()),
            checks: Mutex::new(BTreeMap::new()),
            iterations: AtomicU64::new(0),
            dropped_iterations: AtomicU64::new(0),
            interrupted_iterations: AtomicU64::new(0),
            active_vus: AtomicUsize::new(0),
            peak_vus: AtomicUsize::new(0),
        }
    }

    pub fn record_iteration(&self, outcome: IterationOutcome) {
        self.iterations.fetch_add(1, Ordering::Relaxed);

        if let Some(sample) = outcome.sample {
            if let Ok(mut samples) = self.samples.lock() {
                samples.push(sample);
            }
        }

        if !outcome.checks.is_empty() {
            if let Ok(mut checks) = self.checks.lock() {
                for check in outcome.checks {
                    let entry = checks.entry(check.name).or_insert((0, 0));
                    if check.passed {
                        entry.0 += 1;
                    } else {
                        entry.1 += 1;
                    }
                }
            }
        }
    }

    pub fn record_dropped_iteration(&self) -> u64 {
        self.dropped_iterations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_interrupted_iterations(&self, count: u64) {
        self.interrupted_iterations.fetch_add(count, Ordering::Relaxed);
    }

    /// VU 開始執行 iteration 時呼叫，回傳目前活躍數
    pub fn vu_started(&self) -> usize {
        let active = self.active_vus.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_vus.fetch_max(active, Ordering::SeqCst);
        active
    }

    pub fn vu_finished(&self) {
        self.active_vus.fetch_sub(1, Ordering::SeqCst);
    }

    /// 預先配置的 VU 也算在 vus_max 內
    pub fn reserve_vus(&self, count: usize) {
        self.peak_vus.fetch_max(count, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.samples.lock().map(|s| s.clone()).unwrap_or_default();
        let checks = self.checks.lock().map(|c| c.clone()).unwrap_or_default();
        let elapsed = self.elapsed();

        let mut durations_ms: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
        durations_ms.sort_by(|a, b| a.total_cmp(b));

        let failed = samples.iter().filter(|s| s.failed).count() as u64;
        let http_reqs = samples.len() as u64;

        let (check_passes, check_fails) = checks
            .values()
            .fold((0u64, 0u64), |(p, f), &(cp, cf)| (p + cp, f + cf));
        let check_details = checks
            .into_iter()
            .map(|(name, (passes, fails))| CheckSummary {
                name,
                passes,
                fails,
            })
            .collect();

        let secs = elapsed.as_secs_f64();
        let summary = MetricsSummary {
            test_run_duration_ms: secs * 1000.0,
            http_reqs,
            http_reqs_per_second: if secs > 0.0 {
                http_reqs as f64 / secs
            } else {
                0.0
            },
            http_req_duration: trend(&durations_ms),
            http_req_failed: RateStats::from_counts(failed, http_reqs - failed),
            checks: RateStats::from_counts(check_passes, check_fails),
            check_details,
            iterations: self.iterations.load(Ordering::Relaxed),
            dropped_iterations: self.dropped_iterations.load(Ordering::Relaxed),
            interrupted_iterations: self.interrupted_iterations.load(Ordering::Relaxed),
            vus_max: self.peak_vus.load(Ordering::SeqCst),
            data_sent: samples.iter().map(|s| s.bytes_sent).sum(),
            data_received: samples.iter().map(|s| s.bytes_received).sum(),
        };

        MetricsSnapshot {
            summary,
            durations_ms,
            samples,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn trend(sorted: &[f64]) -> TrendStats {
    if sorted.is_empty() {
        return TrendStats::default();
    }
    TrendStats {
        min: sorted[0],
        avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
        med: percentile(sorted, 50.0),
        max: sorted[sorted.len() - 1],
        p90: percentile(sorted, 90.0),
        p95: percentile(sorted, 95.0),
        p99: percentile(sorted, 99.0),
    }
}

/// 線性內插百分位，輸入必須已排序
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
