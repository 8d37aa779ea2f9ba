use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadTestError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV report error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("{field} environment variable is required")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Payload error: {message}")]
    PayloadError { message: String },

    #[error("Credential error: {message}")]
    CredentialError { message: String },

    #[error("Signing error: {message}")]
    SigningError { message: String },

    #[error("Scheduler error: {message}")]
    SchedulerError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Authentication,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LoadTestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoadTestError::HttpError(_) => ErrorCategory::Network,
            LoadTestError::ConfigError { .. }
            | LoadTestError::MissingConfigError { .. }
            | LoadTestError::InvalidConfigValueError { .. }
            | LoadTestError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            LoadTestError::CredentialError { .. } | LoadTestError::SigningError { .. } => {
                ErrorCategory::Authentication
            }
            LoadTestError::PayloadError { .. }
            | LoadTestError::CsvError(_)
            | LoadTestError::SerializationError(_) => ErrorCategory::Data,
            LoadTestError::IoError(_) | LoadTestError::SchedulerError { .. } => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Authentication => ErrorSeverity::High,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LoadTestError::HttpError(_) => {
                "Check network connectivity to the endpoint and the metadata service"
            }
            LoadTestError::MissingConfigError { .. } => {
                "Set the missing environment variable or pass the matching CLI flag"
            }
            LoadTestError::ConfigError { .. }
            | LoadTestError::InvalidConfigValueError { .. }
            | LoadTestError::ConfigValidationError { .. } => {
                "Review the load test settings (run with --help for defaults)"
            }
            LoadTestError::CredentialError { .. } => {
                "Run on an EC2 instance with an IAM role attached, or use --credentials-source env"
            }
            LoadTestError::SigningError { .. } => "Verify the region and endpoint URL",
            LoadTestError::PayloadError { .. } => {
                "Make sure the dataset directory contains the target file"
            }
            LoadTestError::CsvError(_)
            | LoadTestError::SerializationError(_)
            | LoadTestError::IoError(_) => "Check that the output path is writable",
            LoadTestError::SchedulerError { .. } => "Lower the rate or raise --max-vus",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            LoadTestError::HttpError(e) if e.is_timeout() => {
                "Request timed out before the endpoint answered".to_string()
            }
            LoadTestError::HttpError(e) if e.is_connect() => {
                "Could not connect to the remote host".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        LoadTestError::ConfigError {
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        LoadTestError::CredentialError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadTestError>;
