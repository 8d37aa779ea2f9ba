use crate::domain::model::{Credentials, CredentialsSource};
use crate::domain::ports::CredentialProvider;
use crate::utils::error::{LoadTestError, Result};
use async_trait::async_trait;
use aws_config::environment::credentials::EnvironmentVariableCredentialsProvider;
use aws_config::imds;
use aws_config::imds::client::error::ImdsError;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use chrono::{DateTime, Utc};
use std::time::Duration;

const ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const TOKEN_TTL: Duration = Duration::from_secs(300);
const IMDS_TIMEOUT: Duration = Duration::from_secs(5);

/// EC2 IMDSv2 上的角色憑證；token、重試與文件解析都由 aws-config 處理
pub struct ImdsCredentialProvider {
    client: imds::Client,
}

impl ImdsCredentialProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = imds::Client::builder()
            .endpoint(base_url)
            .map_err(|e| LoadTestError::InvalidConfigValueError {
                field: "imds_endpoint".to_string(),
                value: base_url.to_string(),
                reason: e.to_string(),
            })?
            .token_ttl(TOKEN_TTL)
            .connect_timeout(IMDS_TIMEOUT)
            .read_timeout(IMDS_TIMEOUT)
            .max_attempts(1)
            .build();

        Ok(Self { client })
    }

    async fn instance_role(&self) -> Result<String> {
        let body = match self.client.get(ROLE_PATH).await {
            Ok(body) => body,
            Err(e @ ImdsError::FailedToLoadToken(_)) => {
                // FailedToLoadToken itself is not an Error; its cause is ImdsError's source
                return Err(LoadTestError::credential(format!(
                    "IMDS token failed: {}",
                    error_chain(std::error::Error::source(&e).unwrap_or(&e))
                )));
            }
            Err(ImdsError::ErrorResponse(e)) => {
                return Err(LoadTestError::credential(format!(
                    "No IAM role attached to EC2: {}",
                    e.response().status().as_u16()
                )));
            }
            Err(e) => {
                return Err(LoadTestError::credential(format!(
                    "IMDS role lookup failed: {}",
                    error_chain(&e)
                )));
            }
        };

        // 可能附帶換行，且只取第一個角色
        let body: &str = body.as_ref();
        let role = body.lines().next().unwrap_or_default().trim().to_string();
        if role.is_empty() {
            return Err(LoadTestError::credential("No IAM role attached to EC2: empty role list"));
        }
        Ok(role)
    }
}

#[async_trait]
impl CredentialProvider for ImdsCredentialProvider {
    async fn fetch(&self) -> Result<Credentials> {
        let role = self.instance_role().await?;
        tracing::debug!("Using instance role {}", role);

        let provider = ImdsCredentialsProvider::builder()
            .imds_client(self.client.clone())
            .profile(role.clone())
            .build();
        let credentials = provider.provide_credentials().await.map_err(|e| {
            LoadTestError::credential(format!(
                "IMDS credentials for role {} failed: {}",
                role,
                error_chain(&e)
            ))
        })?;

        let credentials = from_aws(&credentials);
        if let Some(expiration) = credentials.expiration {
            tracing::info!("🔑 Instance credentials valid until {}", expiration);
        }
        Ok(credentials)
    }
}

/// AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY / AWS_SESSION_TOKEN
pub struct EnvCredentialProvider {
    inner: EnvironmentVariableCredentialsProvider,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self {
            inner: EnvironmentVariableCredentialsProvider::new(),
        }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn fetch(&self) -> Result<Credentials> {
        match self.inner.provide_credentials().await {
            Ok(credentials) => Ok(from_aws(&credentials)),
            Err(e) => Err(LoadTestError::credential(match missing_env_variable() {
                Some(name) => format!("{} is not set", name),
                None => format!("Environment credentials not loaded: {}", error_chain(&e)),
            })),
        }
    }
}

fn missing_env_variable() -> Option<&'static str> {
    ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"]
        .into_iter()
        .find(|name| {
            std::env::var(name)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
}

fn from_aws(credentials: &aws_credential_types::Credentials) -> Credentials {
    Credentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials
            .session_token()
            .filter(|token| !token.is_empty())
            .map(str::to_string),
        expiration: credentials.expiry().map(DateTime::<Utc>::from),
    }
}

/// 把 source 鏈接成一行，aws 的錯誤訊息細節都在 source 裡
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub fn provider_for(
    source: CredentialsSource,
    imds_endpoint: &str,
) -> Result<Box<dyn CredentialProvider>> {
    Ok(match source {
        CredentialsSource::Imds => Box::new(ImdsCredentialProvider::new(imds_endpoint)?),
        CredentialsSource::Env => Box::new(EnvCredentialProvider::new()),
    })
}
