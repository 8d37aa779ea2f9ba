use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 臨時 AWS 憑證（IMDS 或環境變數取得）
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn is_available(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }

    /// 沒有到期時間的憑證（例如環境變數）視為不會過期
    pub fn expires_before(&self, deadline: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|expiration| expiration < deadline)
    }
}

// 密鑰不可出現在日誌中
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsSource {
    Imds,
    Env,
}

impl std::str::FromStr for CredentialsSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "imds" => Ok(CredentialsSource::Imds),
            "env" => Ok(CredentialsSource::Env),
            _ => Err(format!(
                "Invalid credentials source: '{}'. Use 'imds' or 'env'.",
                s
            )),
        }
    }
}

/// 壓測用的音檔內容，整個執行期間只讀一次並在各 iteration 間共享
#[derive(Debug, Clone)]
pub struct Payload {
    pub name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// 已解析完成的情境設定，兩種設定來源（CLI/環境變數、TOML）最後都轉成這個
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub endpoint_name: String,
    pub region: String,
    pub endpoint_url: String,
    pub imds_endpoint: String,
    pub credentials_source: CredentialsSource,
    pub dataset_dir: String,
    pub target_file: String,
    pub content_type: Option<String>,
    pub sensitivity: Option<i32>,
    pub threshold_ms: u64,
    pub rate: usize,
    pub time_unit: Duration,
    pub duration: Duration,
    pub pre_allocated_vus: usize,
    pub max_vus: usize,
    pub think_time: Duration,
    pub request_timeout: Duration,
    pub graceful_stop: Duration,
    pub output_path: Option<String>,
}

impl ScenarioSettings {
    pub fn default_endpoint_url(region: &str) -> String {
        format!("https://runtime.sagemaker.{}.amazonaws.com", region)
    }

    pub fn invocation_path(&self) -> String {
        format!("/endpoints/{}/invocations", self.endpoint_name)
    }
}

/// 單一 HTTP 請求的量測結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSample {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub duration_ms: f64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub failed: bool,
    pub error: Option<String>,
}

impl RequestSample {
    /// 2xx/3xx 以外或傳輸錯誤（status 0）都算失敗
    pub fn is_failure(status: u16) -> bool {
        !(200..400).contains(&status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IterationOutcome {
    pub sample: Option<RequestSample>,
    pub checks: Vec<CheckResult>,
}

impl IterationOutcome {
    pub fn skipped() -> Self {
        Self::default()
    }
}
