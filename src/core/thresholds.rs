//! 門檻判定，語法沿用 k6：`p(95)<2000`、`rate<0.01`、`avg<=500`。

use crate::core::metrics::MetricsSnapshot;
use crate::utils::error::{LoadTestError, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Ge),
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            _ => None,
        }
    }

    fn holds(self, observed: f64, limit: f64) -> bool {
        match self {
            Operator::Lt => observed < limit,
            Operator::Le => observed <= limit,
            Operator::Gt => observed > limit,
            Operator::Ge => observed >= limit,
            Operator::Eq => (observed - limit).abs() < f64::EPSILON,
            Operator::Ne => (observed - limit).abs() >= f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Trend,
    Rate,
    Counter,
}

fn metric_kind(metric: &str) -> Option<MetricKind> {
    match metric {
        "http_req_duration" => Some(MetricKind::Trend),
        "http_req_failed" | "checks" => Some(MetricKind::Rate),
        "http_reqs" | "iterations" | "dropped_iterations" => Some(MetricKind::Counter),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    aggregation: Aggregation,
    operator: Operator,
    limit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

impl fmt::Display for ThresholdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✓" } else { "✗" };
        write!(
            f,
            "{} {} '{}' (observed {:.4})",
            mark, self.metric, self.expression, self.observed
        )
    }
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self> {
        let invalid = |reason: String| LoadTestError::InvalidConfigValueError {
            field: format!("thresholds.{}", metric),
            value: expression.to_string(),
            reason,
        };

        let kind = metric_kind(metric)
            .ok_or_else(|| invalid(format!("Unknown metric: {}", metric)))?;

        let re = Regex::new(
            r"^\s*(avg|min|max|med|count|rate|p\((\d+(?:\.\d+)?)\))\s*(<=|>=|==|!=|<|>)\s*(-?\d+(?:\.\d+)?)\s*$",
        )
        .map_err(|e| LoadTestError::config(format!("Invalid threshold pattern: {}", e)))?;

        let caps = re
            .captures(expression)
            .ok_or_else(|| invalid("Expected '<aggregation> <operator> <value>'".to_string()))?;

        let aggregation = match &caps[1] {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "count" => Aggregation::Count,
            "rate" => Aggregation::Rate,
            _ => {
                let p: f64 = caps[2]
                    .parse()
                    .map_err(|_| invalid("Invalid percentile".to_string()))?;
                if p > 100.0 {
                    return Err(invalid("Percentile must be between 0 and 100".to_string()));
                }
                Aggregation::Percentile(p)
            }
        };

        let supported = match kind {
            MetricKind::Trend => !matches!(aggregation, Aggregation::Rate | Aggregation::Count),
            MetricKind::Rate => aggregation == Aggregation::Rate,
            MetricKind::Counter => matches!(aggregation, Aggregation::Count | Aggregation::Rate),
        };
        if !supported {
            return Err(invalid(format!(
                "Aggregation {:?} is not available for {}",
                aggregation, metric
            )));
        }

        let operator = Operator::parse(&caps[3])
            .ok_or_else(|| invalid(format!("Unknown operator: {}", &caps[3])))?;
        let limit: f64 = caps[4]
            .parse()
            .map_err(|_| invalid(format!("Invalid threshold value: {}", &caps[4])))?;

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.trim().to_string(),
            aggregation,
            operator,
            limit,
        })
    }

    fn observe(&self, snapshot: &MetricsSnapshot) -> f64 {
        let summary = &snapshot.summary;
        match self.metric.as_str() {
            "http_req_duration" => {
                let trend = &summary.http_req_duration;
                match self.aggregation {
                    Aggregation::Avg => trend.avg,
                    Aggregation::Min => trend.min,
                    Aggregation::Max => trend.max,
                    Aggregation::Med => trend.med,
                    Aggregation::Percentile(p) => snapshot.percentile(p),
                    Aggregation::Rate | Aggregation::Count => 0.0,
                }
            }
            "http_req_failed" => summary.http_req_failed.rate,
            "checks" => summary.checks.rate,
            counter => {
                let count = (match counter {
                    "http_reqs" => summary.http_reqs,
                    "iterations" => summary.iterations,
                    _ => summary.dropped_iterations,
                }) as f64;
                if self.aggregation == Aggregation::Rate {
                    let secs = summary.test_run_duration_ms / 1000.0;
                    if secs > 0.0 {
                        count / secs
                    } else {
                        0.0
                    }
                } else {
                    count
                }
            }
        }
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdResult {
        let observed = self.observe(snapshot);
        ThresholdResult {
            metric: self.metric.clone(),
            expression: self.expression.clone(),
            observed,
            passed: self.operator.holds(observed, self.limit),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 預設門檻：p(95) 延遲與失敗率 1%
    pub fn defaults(response_threshold_ms: u64) -> Result<Self> {
        Self::new()
            .with("http_req_duration", &format!("p(95)<{}", response_threshold_ms))?
            .with("http_req_failed", "rate<0.01")
    }

    pub fn with(mut self, metric: &str, expression: &str) -> Result<Self> {
        self.thresholds.push(Threshold::parse(metric, expression)?);
        Ok(self)
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<ThresholdResult> {
        self.thresholds.iter().map(|t| t.evaluate(snapshot)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::MetricsCollector;
    use crate::domain::model::{IterationOutcome, RequestSample};
    use chrono::Utc;

    fn snapshot_with(durations: &[f64], failed: usize) -> MetricsSnapshot {
        let metrics = MetricsCollector::new();
        for (i, d) in durations.iter().enumerate() {
            let status = if i < failed { 500 } else { 200 };
            metrics.record_iteration(IterationOutcome {
                sample: Some(RequestSample {
                    timestamp: Utc::now(),
                    status,
                    duration_ms: *d,
                    bytes_sent: 0,
                    bytes_received: 0,
                    failed: RequestSample::is_failure(status),
                    error: None,
                }),
                checks: Vec::new(),
            });
        }
        metrics.snapshot()
    }

    #[test]
    fn test_parse_expressions() {
        assert!(Threshold::parse("http_req_duration", "p(95)<2000").is_ok());
        assert!(Threshold::parse("http_req_duration", "p(99.9) <= 3000").is_ok());
        assert!(Threshold::parse("http_req_duration", "avg<500").is_ok());
        assert!(Threshold::parse("http_req_failed", "rate<0.01").is_ok());
        assert!(Threshold::parse("dropped_iterations", "count==0").is_ok());
    }

    #[test]
    fn test_reject_invalid_expressions() {
        assert!(Threshold::parse("http_req_duration", "p95<2000").is_err());
        assert!(Threshold::parse("http_req_duration", "rate<0.1").is_err());
        assert!(Threshold::parse("http_req_failed", "avg<1").is_err());
        assert!(Threshold::parse("unknown_metric", "avg<1").is_err());
        assert!(Threshold::parse("http_req_duration", "p(101)<1").is_err());
    }

    #[test]
    fn test_default_thresholds_pass_on_fast_healthy_run() {
        let thresholds = ThresholdSet::defaults(2000).unwrap();
        let snapshot = snapshot_with(&[100.0, 150.0, 200.0], 0);

        let results = thresholds.evaluate(&snapshot);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn test_latency_threshold_crossed() {
        let thresholds = ThresholdSet::defaults(2000).unwrap();
        let durations: Vec<f64> = (0..100).map(|i| if i < 90 { 100.0 } else { 5000.0 }).collect();
        let snapshot = snapshot_with(&durations, 0);

        let results = thresholds.evaluate(&snapshot);
        assert!(!results[0].passed);
        assert!(results[1].passed);
    }

    #[test]
    fn test_failure_rate_threshold_crossed() {
        let thresholds = ThresholdSet::defaults(2000).unwrap();
        let snapshot = snapshot_with(&[10.0; 50], 1);

        let results = thresholds.evaluate(&snapshot);
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!((results[1].observed - 0.02).abs() < 1e-9);
    }
}
