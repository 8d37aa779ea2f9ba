use crate::core::ConfigProvider;
use crate::domain::model::{CredentialsSource, ScenarioSettings};
use crate::utils::duration::parse_duration;
use crate::utils::error::{LoadTestError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub scenario: ScenarioSection,
    pub target: TargetSection,
    pub payload: Option<PayloadSection>,
    pub thresholds: Option<ThresholdSection>,
    pub output: Option<OutputSection>,
    pub monitoring: Option<MonitoringSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSection {
    pub name: String,
    pub description: Option<String>,
    pub rate: Option<usize>,
    pub time_unit: Option<String>,
    pub duration: Option<String>,
    pub pre_allocated_vus: Option<usize>,
    pub max_vus: Option<usize>,
    pub think_time: Option<String>,
    pub graceful_stop: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    pub endpoint_name: String,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub imds_endpoint: Option<String>,
    pub credentials_source: Option<CredentialsSource>,
    pub sensitivity: Option<i32>,
    pub request_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadSection {
    pub dataset_dir: Option<String>,
    pub target_file: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSection {
    /// p(95) 上限（毫秒）
    pub http_req_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSection {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LoadTestError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LoadTestError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ENDPOINT_NAME})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| LoadTestError::config(format!("Invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

fn duration_or(field: &str, value: Option<&String>, default: &str) -> Result<std::time::Duration> {
    parse_duration(field, value.map(String::as_str).unwrap_or(default))
}

impl ConfigProvider for TomlConfig {
    fn scenario_settings(&self) -> Result<ScenarioSettings> {
        let scenario = &self.scenario;
        let target = &self.target;
        let payload = self.payload.as_ref();

        let region = target
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());
        let endpoint_url = target
            .endpoint_url
            .clone()
            .unwrap_or_else(|| ScenarioSettings::default_endpoint_url(&region));

        Ok(ScenarioSettings {
            endpoint_name: target.endpoint_name.clone(),
            endpoint_url,
            imds_endpoint: target
                .imds_endpoint
                .clone()
                .unwrap_or_else(|| "http://169.254.169.254".to_string()),
            credentials_source: target.credentials_source.unwrap_or(CredentialsSource::Imds),
            region,
            dataset_dir: payload
                .and_then(|p| p.dataset_dir.clone())
                .unwrap_or_else(|| "dataset".to_string()),
            target_file: payload
                .and_then(|p| p.target_file.clone())
                .unwrap_or_else(|| "10sec_test.mp3".to_string()),
            content_type: payload.and_then(|p| p.content_type.clone()),
            sensitivity: target.sensitivity,
            threshold_ms: self
                .thresholds
                .as_ref()
                .and_then(|t| t.http_req_duration_ms)
                .unwrap_or(2000),
            rate: scenario.rate.unwrap_or(5),
            time_unit: duration_or("scenario.time_unit", scenario.time_unit.as_ref(), "1s")?,
            duration: duration_or("scenario.duration", scenario.duration.as_ref(), "1m")?,
            pre_allocated_vus: scenario.pre_allocated_vus.unwrap_or(1),
            max_vus: scenario.max_vus.unwrap_or(20),
            think_time: duration_or("scenario.think_time", scenario.think_time.as_ref(), "500ms")?,
            request_timeout: duration_or(
                "target.request_timeout",
                target.request_timeout.as_ref(),
                "180s",
            )?,
            graceful_stop: duration_or(
                "scenario.graceful_stop",
                scenario.graceful_stop.as_ref(),
                "30s",
            )?,
            output_path: self.output.as_ref().map(|o| o.path.clone()),
        })
    }

    fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.scenario_settings()?.validate()
    }
}
