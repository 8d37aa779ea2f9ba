use crate::utils::error::{LoadTestError, Result};
use regex::Regex;
use std::time::Duration;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(LoadTestError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| LoadTestError::MissingConfigError {
            field: field_name.to_string(),
        })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_non_zero_duration(field_name: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("{:?}", value),
            reason: "Duration must be greater than zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    validate_non_empty_string(field_name, region)?;

    // AWS region format validation
    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

/// SageMaker endpoint 名稱：英數字與連字號，不可以連字號開頭或結尾，最長 63 字元
pub fn validate_endpoint_name(field_name: &str, name: &str) -> Result<()> {
    let re = Regex::new(r"^[a-zA-Z0-9](-*[a-zA-Z0-9])*$").map_err(|e| {
        LoadTestError::config(format!("Invalid endpoint name pattern: {}", e))
    })?;

    if name.len() > 63 || !re.is_match(name) {
        return Err(LoadTestError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Endpoint names use letters, digits and inner hyphens (max 63 characters)"
                .to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("endpoint_url", "https://example.com").is_ok());
        assert!(validate_url("endpoint_url", "http://169.254.169.254").is_ok());
        assert!(validate_url("endpoint_url", "").is_err());
        assert!(validate_url("endpoint_url", "invalid-url").is_err());
        assert!(validate_url("endpoint_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("rate", 5, 1).is_ok());
        assert!(validate_positive_number("rate", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range_for_sensitivity() {
        assert!(validate_range("sensitivity", -2, -2, 2).is_ok());
        assert!(validate_range("sensitivity", 2, -2, 2).is_ok());
        assert!(validate_range("sensitivity", 3, -2, 2).is_err());
    }

    #[test]
    fn test_validate_endpoint_name() {
        assert!(validate_endpoint_name("endpoint_name", "whisper-large-v3").is_ok());
        assert!(validate_endpoint_name("endpoint_name", "a").is_ok());
        assert!(validate_endpoint_name("endpoint_name", "-leading").is_err());
        assert!(validate_endpoint_name("endpoint_name", "trailing-").is_err());
        assert!(validate_endpoint_name("endpoint_name", "has/slash").is_err());
        assert!(validate_endpoint_name("endpoint_name", &"x".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_aws_region() {
        assert!(validate_aws_region("region", "us-east-1").is_ok());
        assert!(validate_aws_region("region", "US-EAST-1").is_err());
        assert!(validate_aws_region("region", " ").is_err());
    }

    #[test]
    fn test_validate_non_zero_duration() {
        assert!(validate_non_zero_duration("duration", Duration::from_secs(1)).is_ok());
        assert!(validate_non_zero_duration("duration", Duration::ZERO).is_err());
    }
}
