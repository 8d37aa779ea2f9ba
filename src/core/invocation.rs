use crate::core::signer::{HttpRequest, SignOptions, SignatureV4};
use crate::domain::model::{
    CheckResult, Credentials, IterationOutcome, Payload, RequestSample, ScenarioSettings,
};
use crate::domain::ports::{CredentialProvider, Scenario};
use crate::utils::error::{LoadTestError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

pub const SIGNING_SERVICE: &str = "sagemaker";
pub const CUSTOM_ATTRIBUTES_HEADER: &str = "X-Amzn-SageMaker-Custom-Attributes";

/// 對 SageMaker endpoint 發送一次 InvokeEndpoint 的壓測情境
pub struct SageMakerInvocation {
    client: Client,
    settings: Arc<ScenarioSettings>,
    payload: Payload,
    endpoint: Url,
    credentials: Box<dyn CredentialProvider>,
}

impl SageMakerInvocation {
    pub fn new(
        client: Client,
        settings: Arc<ScenarioSettings>,
        payload: Payload,
        credentials: Box<dyn CredentialProvider>,
    ) -> Result<Self> {
        let endpoint = Url::parse(&settings.endpoint_url).map_err(|e| {
            LoadTestError::InvalidConfigValueError {
                field: "endpoint_url".to_string(),
                value: settings.endpoint_url.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            client,
            settings,
            payload,
            endpoint,
            credentials,
        })
    }

    pub fn request_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), self.payload.content_type.clone());
        headers.insert("Accept".to_string(), "application/json".to_string());
        if let Some(sensitivity) = self.settings.sensitivity {
            headers.insert(
                CUSTOM_ATTRIBUTES_HEADER.to_string(),
                sensitivity_attribute(sensitivity),
            );
        }
        headers
    }

    fn sign(&self, credentials: &Credentials) -> Result<(String, HeaderMap)> {
        let signer = SignatureV4::new(
            SIGNING_SERVICE,
            self.settings.region.clone(),
            credentials.clone(),
        );
        let request = HttpRequest {
            method: "POST".to_string(),
            endpoint: self.endpoint.clone(),
            path: self.settings.invocation_path(),
            headers: self.request_headers(),
        };
        let signed = signer.sign(&request, &self.payload.body, &SignOptions::default())?;

        let mut headers = HeaderMap::new();
        for (name, value) in &signed.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                LoadTestError::SigningError {
                    message: format!("Invalid header name {}: {}", name, e),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| LoadTestError::SigningError {
                message: format!("Invalid header value for {}: {}", name, e),
            })?;
            headers.insert(name, value);
        }

        Ok((signed.url, headers))
    }

    /// 憑證是否撐不到壓測結束（duration 加上 graceful stop）
    pub fn expires_during_run(&self, credentials: &Credentials, now: DateTime<Utc>) -> bool {
        let run_length = self.settings.duration + self.settings.graceful_stop;
        match chrono::Duration::from_std(run_length)
            .ok()
            .and_then(|length| now.checked_add_signed(length))
        {
            Some(run_end) => credentials.expires_before(run_end),
            None => credentials.expiration.is_some(),
        }
    }

    /// 發送一次已簽章的請求並量測結果
    pub async fn invoke(&self, credentials: &Credentials) -> IterationOutcome {
        let timestamp = Utc::now();
        let threshold_ms = self.settings.threshold_ms;

        let (url, headers) = match self.sign(credentials) {
            Ok(signed) => signed,
            Err(e) => {
                tracing::error!("Signing failed: {}", e);
                return IterationOutcome::skipped();
            }
        };
        let header_bytes: usize = headers
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len() + 4)
            .sum();
        let bytes_sent = (self.payload.len() + header_bytes) as u64;

        let started = Instant::now();
        let result = self
            .client
            .post(&url)
            .headers(headers)
            .body(self.payload.body.clone())
            .timeout(self.settings.request_timeout)
            .send()
            .await;

        let (status, body, error) = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.bytes().await {
                    Ok(body) => (status, body.to_vec(), None),
                    Err(e) => (status, Vec::new(), Some(e.to_string())),
                }
            }
            Err(e) => (0, Vec::new(), Some(e.to_string())),
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        if status != 200 {
            match &error {
                Some(e) if status == 0 => tracing::error!("Request failed: {}", e),
                _ => tracing::error!(
                    "Request failed: {} - {}",
                    status,
                    String::from_utf8_lossy(&body)
                ),
            }
        } else {
            tracing::debug!("Invocation answered in {:.1}ms", duration_ms);
        }

        let checks = vec![
            CheckResult {
                name: "status is 200".to_string(),
                passed: status == 200,
            },
            CheckResult {
                name: format!("response time < {}ms", threshold_ms),
                passed: duration_ms < threshold_ms as f64,
            },
        ];

        IterationOutcome {
            sample: Some(RequestSample {
                timestamp,
                status,
                duration_ms,
                bytes_sent,
                bytes_received: body.len() as u64,
                failed: RequestSample::is_failure(status) || error.is_some(),
                error,
            }),
            checks,
        }
    }
}

/// Sensitivity 以 custom attribute 傳給模型容器
pub fn sensitivity_attribute(sensitivity: i32) -> String {
    format!("Sensitivity={{\"default_sensitivity\": {}}}", sensitivity)
}

#[async_trait]
impl Scenario for SageMakerInvocation {
    type SetupData = Credentials;

    async fn setup(&self) -> Result<Credentials> {
        let credentials = self.credentials.fetch().await?;
        if self.expires_during_run(&credentials, Utc::now()) {
            if let Some(expiration) = credentials.expiration {
                tracing::warn!(
                    "⚠️ Credentials expire at {}, before the run ends; later requests may fail with 403",
                    expiration
                );
            }
        }
        tracing::info!("Setup completed, credentials fetched successfully");
        Ok(credentials)
    }

    async fn iteration(&self, credentials: &Credentials) -> IterationOutcome {
        if !credentials.is_available() {
            tracing::error!("Credentials not available: {:?}", credentials);
            return IterationOutcome::skipped();
        }

        let outcome = self.invoke(credentials).await;
        tokio::time::sleep(self.settings.think_time).await;
        outcome
    }
}
