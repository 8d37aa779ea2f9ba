pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::domain::model::{CredentialsSource, ScenarioSettings};
use crate::utils::duration::parse_duration_arg;
use crate::utils::error::{LoadTestError, Result};
use crate::utils::validation::*;
use clap::Parser;
use std::time::Duration;

/// 所有設定都可以用環境變數提供，命令列參數會覆蓋環境變數
#[derive(Debug, Clone, Parser)]
#[command(name = "sagemaker-loadtest")]
#[command(about = "Constant-arrival-rate load test for SageMaker inference endpoints")]
pub struct CliConfig {
    /// Payload file name inside the dataset directory
    #[arg(long, env = "TARGET_FILE", default_value = "10sec_test.mp3")]
    pub target_file: String,

    #[arg(long, env = "DATASET_DIR", default_value = "dataset")]
    pub dataset_dir: String,

    /// Defaults to audio/mp3 for .mp3 files, raw f32le audio otherwise
    #[arg(long, env = "CONTENT_TYPE")]
    pub content_type: Option<String>,

    /// p(95) latency threshold and per-request check, in milliseconds
    #[arg(long, env = "THRESHOLD_DURATION", default_value = "2000")]
    pub threshold_duration: u64,

    /// Iterations started per time unit
    #[arg(long, env = "RATE", default_value = "5")]
    pub rate: usize,

    #[arg(long, env = "TIME_UNIT", default_value = "1s", value_parser = parse_duration_arg)]
    pub time_unit: Duration,

    #[arg(long, env = "DURATION", default_value = "1m", value_parser = parse_duration_arg)]
    pub duration: Duration,

    #[arg(long, env = "PRE_ALLOCATED_VUS", default_value = "1")]
    pub pre_allocated_vus: usize,

    #[arg(long, env = "MAX_VUS", default_value = "20")]
    pub max_vus: usize,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    #[arg(long, env = "ENDPOINT_NAME")]
    pub endpoint_name: Option<String>,

    /// Optional model sensitivity, -2 to 2
    #[arg(long, env = "SENSITIVITY", allow_hyphen_values = true)]
    pub sensitivity: Option<i32>,

    /// Overrides https://runtime.sagemaker.{region}.amazonaws.com
    #[arg(long, env = "ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    #[arg(long, env = "IMDS_ENDPOINT", default_value = "http://169.254.169.254")]
    pub imds_endpoint: String,

    /// Where to read credentials from: imds or env
    #[arg(long, env = "CREDENTIALS_SOURCE", default_value = "imds")]
    pub credentials_source: CredentialsSource,

    /// Pause at the end of every iteration
    #[arg(long, env = "THINK_TIME", default_value = "500ms", value_parser = parse_duration_arg)]
    pub think_time: Duration,

    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "180s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// How long in-flight iterations may finish after the scenario ends
    #[arg(long, env = "GRACEFUL_STOP", default_value = "30s", value_parser = parse_duration_arg)]
    pub graceful_stop: Duration,

    /// Directory for samples.csv and summary.json
    #[arg(long, env = "OUTPUT_PATH")]
    pub output_path: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log load generator CPU and memory usage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Print the plan and exit without sending requests")]
    pub dry_run: bool,
}

impl ConfigProvider for CliConfig {
    fn scenario_settings(&self) -> Result<ScenarioSettings> {
        let endpoint_name = self
            .endpoint_name
            .clone()
            .filter(|name| !name.trim().is_empty());
        let endpoint_name = validate_required_field("ENDPOINT_NAME", &endpoint_name)?.clone();

        let endpoint_url = self
            .endpoint_url
            .clone()
            .unwrap_or_else(|| ScenarioSettings::default_endpoint_url(&self.region));

        Ok(ScenarioSettings {
            endpoint_name,
            region: self.region.clone(),
            endpoint_url,
            imds_endpoint: self.imds_endpoint.clone(),
            credentials_source: self.credentials_source,
            dataset_dir: self.dataset_dir.clone(),
            target_file: self.target_file.clone(),
            content_type: self.content_type.clone(),
            sensitivity: self.sensitivity,
            threshold_ms: self.threshold_duration,
            rate: self.rate,
            time_unit: self.time_unit,
            duration: self.duration,
            pre_allocated_vus: self.pre_allocated_vus,
            max_vus: self.max_vus,
            think_time: self.think_time,
            request_timeout: self.request_timeout,
            graceful_stop: self.graceful_stop,
            output_path: self.output_path.clone(),
        })
    }

    fn monitoring_enabled(&self) -> bool {
        self.monitor
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        self.scenario_settings()?.validate()
    }
}

impl Validate for ScenarioSettings {
    fn validate(&self) -> Result<()> {
        validate_endpoint_name("endpoint_name", &self.endpoint_name)?;
        validate_aws_region("region", &self.region)?;
        validate_url("endpoint_url", &self.endpoint_url)?;
        validate_url("imds_endpoint", &self.imds_endpoint)?;
        validate_path("dataset_dir", &self.dataset_dir)?;
        validate_non_empty_string("target_file", &self.target_file)?;

        if let Some(sensitivity) = self.sensitivity {
            validate_range("sensitivity", sensitivity, -2, 2)?;
        }
        if let Some(content_type) = &self.content_type {
            validate_non_empty_string("content_type", content_type)?;
        }
        if let Some(output_path) = &self.output_path {
            validate_path("output_path", output_path)?;
        }

        validate_positive_number("threshold_duration", self.threshold_ms as usize, 1)?;
        validate_positive_number("rate", self.rate, 1)?;
        validate_positive_number("max_vus", self.max_vus, 1)?;
        if self.pre_allocated_vus > self.max_vus {
            return Err(LoadTestError::ConfigValidationError {
                field: "pre_allocated_vus".to_string(),
                message: format!(
                    "pre_allocated_vus ({}) cannot exceed max_vus ({})",
                    self.pre_allocated_vus, self.max_vus
                ),
            });
        }

        validate_non_zero_duration("time_unit", self.time_unit)?;
        validate_non_zero_duration("duration", self.duration)?;
        validate_non_zero_duration("request_timeout", self.request_timeout)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["sagemaker-loadtest"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_build_settings() {
        let config = parse(&[
            "--endpoint-name",
            "whisper-endpoint",
            "--region",
            "eu-west-1",
            "--rate",
            "10",
            "--duration",
            "30s",
            "--sensitivity",
            "-2",
        ]);
        let settings = config.scenario_settings().unwrap();

        assert_eq!(settings.endpoint_name, "whisper-endpoint");
        assert_eq!(
            settings.endpoint_url,
            "https://runtime.sagemaker.eu-west-1.amazonaws.com"
        );
        assert_eq!(settings.invocation_path(), "/endpoints/whisper-endpoint/invocations");
        assert_eq!(settings.rate, 10);
        assert_eq!(settings.duration, Duration::from_secs(30));
        assert_eq!(settings.sensitivity, Some(-2));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url_override() {
        let config = parse(&[
            "--endpoint-name",
            "e",
            "--endpoint-url",
            "http://127.0.0.1:9000",
        ]);
        let settings = config.scenario_settings().unwrap();
        assert_eq!(settings.endpoint_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_pre_allocated_above_max_is_rejected() {
        let config = parse(&[
            "--endpoint-name",
            "e",
            "--pre-allocated-vus",
            "30",
            "--max-vus",
            "20",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sensitivity_out_of_range_is_rejected() {
        let config = parse(&["--endpoint-name", "e", "--sensitivity", "5"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_endpoint_name() {
        let mut config = parse(&[]);
        config.endpoint_name = None;
        let err = config.scenario_settings().unwrap_err();
        assert!(matches!(err, LoadTestError::MissingConfigError { .. }));
        assert_eq!(err.to_string(), "ENDPOINT_NAME environment variable is required");

        config.endpoint_name = Some("  ".to_string());
        assert!(matches!(
            config.scenario_settings(),
            Err(LoadTestError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let config = parse(&["--endpoint-name", "e", "--rate", "0"]);
        assert!(config.validate().is_err());
    }
}
