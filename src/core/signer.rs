//! AWS Signature Version 4 請求簽章，簽章本身交給 `aws-sigv4`。
//!
//! 只使用 header 形式的簽章（`Authorization` header），這是 SageMaker
//! runtime `InvokeEndpoint` 所需要的全部。

use crate::domain::model::Credentials;
use crate::utils::error::{LoadTestError, Result};
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::SystemTime;
use url::Url;

/// 待簽章的請求；`path` 接在 endpoint 自身的路徑之後
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub endpoint: Url,
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    /// 實際送出的 URL，endpoint 的路徑前綴（例如代理）會保留下來並一起簽章
    pub fn url(&self) -> String {
        let mut url = self.endpoint.clone();
        let prefix = self.endpoint.path().trim_end_matches('/');
        let path = format!("{}/{}", prefix, self.path.trim_start_matches('/'));
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct SignOptions {
    pub signing_date: DateTime<Utc>,
    /// 是否加入並簽署 `x-amz-content-sha256`
    pub apply_checksum: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            signing_date: Utc::now(),
            apply_checksum: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub url: String,
    /// 全部小寫 header 名稱，包含 `authorization`
    pub headers: BTreeMap<String, String>,
    pub signature: String,
}

#[derive(Clone)]
pub struct SignatureV4 {
    service: String,
    region: String,
    credentials: Credentials,
}

impl SignatureV4 {
    pub fn new(service: impl Into<String>, region: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
            credentials,
        }
    }

    pub fn sign(&self, request: &HttpRequest, body: &[u8], options: &SignOptions) -> Result<SignedRequest> {
        let url = request.url();
        let method = request.method.to_uppercase();

        let identity = aws_credential_types::Credentials::new(
            self.credentials.access_key_id.clone(),
            self.credentials.secret_access_key.clone(),
            self.credentials.session_token.clone(),
            self.credentials.expiration.map(SystemTime::from),
            "sagemaker-loadtest",
        )
        .into();

        let mut settings = SigningSettings::default();
        if options.apply_checksum {
            settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        }

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(SystemTime::from(options.signing_date))
            .settings(settings)
            .build()
            .map_err(|e| signing_error("Invalid signing parameters", e))?
            .into();

        let signable = SignableRequest::new(
            &method,
            url.as_str(),
            request.headers.iter().map(|(name, value)| (name.as_str(), value.as_str())),
            SignableBody::Bytes(body),
        )
        .map_err(|e| signing_error("Request cannot be signed", e))?;

        let (instructions, signature) = sign(signable, &params)
            .map_err(|e| signing_error("Signing failed", e))?
            .into_parts();

        let mut headers: BTreeMap<String, String> = request
            .headers
            .iter()
            .map(|(name, value)| (name.to_lowercase(), value.clone()))
            .collect();
        for (name, value) in instructions.headers() {
            headers.insert(name.to_lowercase(), value.to_string());
        }

        Ok(SignedRequest {
            url,
            headers,
            signature,
        })
    }
}

fn signing_error(context: &str, error: impl std::fmt::Display) -> LoadTestError {
    LoadTestError::SigningError {
        message: format!("{}: {}", context, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials(session_token: Option<&str>) -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: session_token.map(str::to_string),
            expiration: None,
        }
    }

    fn vanilla_request(method: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            endpoint: Url::parse("https://example.amazonaws.com").unwrap(),
            path: "/".to_string(),
            headers: BTreeMap::new(),
        }
    }

    fn test_suite_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    fn fixed_options() -> SignOptions {
        SignOptions {
            signing_date: test_suite_date(),
            apply_checksum: false,
        }
    }

    #[test]
    fn test_get_vanilla_signature() {
        let signer = SignatureV4::new("service", "us-east-1", example_credentials(None));

        let signed = signer.sign(&vanilla_request("GET"), b"", &fixed_options()).unwrap();

        assert_eq!(
            signed.headers["authorization"],
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(signed.headers["x-amz-date"], "20150830T123600Z");
        assert_eq!(
            signed.signature,
            "5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(signed.url, "https://example.amazonaws.com/");
    }

    #[test]
    fn test_session_token_and_checksum_are_signed() {
        let signer = SignatureV4::new("sagemaker", "us-east-1", example_credentials(Some("TOKEN")));
        let mut request = vanilla_request("POST");
        request.endpoint = Url::parse("https://runtime.sagemaker.us-east-1.amazonaws.com").unwrap();
        request.path = "/endpoints/asr/invocations".to_string();
        request
            .headers
            .insert("Content-Type".to_string(), "audio/mp3".to_string());

        let signed = signer
            .sign(&request, b"audio-bytes", &SignOptions::default())
            .unwrap();

        assert_eq!(signed.headers["x-amz-security-token"], "TOKEN");
        assert_eq!(
            signed.headers["x-amz-content-sha256"],
            "15241589c52e7c4a511a160e040d12bab503cf5d0f586cba94889e554d8df241"
        );
        assert_eq!(signed.headers["content-type"], "audio/mp3");
        let authorization = &signed.headers["authorization"];
        for name in ["content-type", "host", "x-amz-content-sha256", "x-amz-date", "x-amz-security-token"] {
            assert!(authorization.contains(name), "{} not signed: {}", name, authorization);
        }
        assert_eq!(
            signed.url,
            "https://runtime.sagemaker.us-east-1.amazonaws.com/endpoints/asr/invocations"
        );
    }

    #[test]
    fn test_signature_depends_on_body() {
        let signer = SignatureV4::new("sagemaker", "us-east-1", example_credentials(None));
        let a = signer.sign(&vanilla_request("POST"), b"a", &fixed_options()).unwrap();
        let b = signer.sign(&vanilla_request("POST"), b"b", &fixed_options()).unwrap();
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_endpoint_path_prefix_is_signed() {
        let signer = SignatureV4::new("sagemaker", "us-east-1", example_credentials(None));

        let mut behind_proxy = vanilla_request("POST");
        behind_proxy.endpoint = Url::parse("http://proxy.internal/sagemaker").unwrap();
        behind_proxy.path = "/endpoints/asr/invocations".to_string();

        let mut full_path = vanilla_request("POST");
        full_path.endpoint = Url::parse("http://proxy.internal").unwrap();
        full_path.path = "/sagemaker/endpoints/asr/invocations".to_string();

        let sent = signer.sign(&behind_proxy, b"mp3", &fixed_options()).unwrap();
        let expected = signer.sign(&full_path, b"mp3", &fixed_options()).unwrap();

        assert_eq!(
            sent.url,
            "http://proxy.internal/sagemaker/endpoints/asr/invocations"
        );
        assert_eq!(sent.url, expected.url);
        assert_eq!(sent.signature, expected.signature);
    }

    #[test]
    fn test_request_url_joins_paths() {
        let mut request = vanilla_request("POST");
        request.path = "/endpoints/asr/invocations".to_string();

        request.endpoint = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(request.url(), "http://127.0.0.1:8080/endpoints/asr/invocations");

        request.endpoint = Url::parse("https://vpce.example.com/prefix/").unwrap();
        assert_eq!(
            request.url(),
            "https://vpce.example.com/prefix/endpoints/asr/invocations"
        );
    }
}
