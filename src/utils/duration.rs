use crate::utils::error::{LoadTestError, Result};
use std::time::Duration;

/// 解析 "1s"、"1m"、"500ms"、"1h30m" 這類時間字串
pub fn parse_duration(field_name: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim()).map_err(|e| LoadTestError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: format!("Invalid duration: {}", e),
    })
}

/// clap 的 value_parser 使用
pub fn parse_duration_arg(value: &str) -> std::result::Result<Duration, String> {
    humantime::parse_duration(value.trim()).map_err(|e| e.to_string())
}

pub fn format_duration(value: Duration) -> String {
    humantime::format_duration(value).to_string()
}

/// Trend 報表用的毫秒格式，與 k6 摘要一致（例如 "1.23s"、"512.4ms"）
pub fn format_millis(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else if ms >= 1.0 {
        format!("{:.2}ms", ms)
    } else {
        format!("{:.2}µs", ms * 1000.0)
    }
}
