use httpmock::prelude::*;
use sagemaker_loadtest::core::ScenarioSettings;
use sagemaker_loadtest::domain::model::CredentialsSource;
use sagemaker_loadtest::core::scheduler::Interrupts;
use sagemaker_loadtest::LoadTestEngine;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const ENDPOINT_NAME: &str = "asr-endpoint";
const INVOCATION_PATH: &str = "/endpoints/asr-endpoint/invocations";

fn no_interrupts() -> Interrupts {
    mpsc::unbounded_channel::<()>().1
}

fn write_dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("10sec_test.mp3"), b"ID3-fake-audio").unwrap();
    std::fs::write(dir.path().join("35sec_test.mp3"), b"ID3-longer-fake-audio").unwrap();
    dir
}

fn settings(server: &MockServer, dataset: &TempDir) -> ScenarioSettings {
    ScenarioSettings {
        endpoint_name: ENDPOINT_NAME.to_string(),
        region: "us-east-1".to_string(),
        endpoint_url: server.base_url(),
        imds_endpoint: server.base_url(),
        credentials_source: CredentialsSource::Imds,
        dataset_dir: dataset.path().to_string_lossy().to_string(),
        target_file: "10sec_test.mp3".to_string(),
        content_type: None,
        sensitivity: None,
        threshold_ms: 2000,
        rate: 5,
        time_unit: Duration::from_secs(1),
        duration: Duration::from_secs(1),
        pre_allocated_vus: 1,
        max_vus: 5,
        think_time: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        graceful_stop: Duration::from_secs(5),
        output_path: None,
    }
}

async fn mock_imds(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/latest/api/token")
                .header("X-aws-ec2-metadata-token-ttl-seconds", "300");
            then.status(200)
                .header("X-aws-ec2-metadata-token-ttl-seconds", "300")
                .body("imds-token");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/latest/meta-data/iam/security-credentials/")
                .header("X-aws-ec2-metadata-token", "imds-token");
            then.status(200).body("loadtest-role");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/latest/meta-data/iam/security-credentials/loadtest-role")
                .header("X-aws-ec2-metadata-token", "imds-token");
            then.status(200).json_body(serde_json::json!({
                "Code": "Success",
                "LastUpdated": "2024-01-01T00:00:00Z",
                "Type": "AWS-HMAC",
                "AccessKeyId": "ASIAEXAMPLE",
                "SecretAccessKey": "secret",
                "Token": "session-token",
                "Expiration": "2030-01-01T00:00:00Z"
            }));
        })
        .await;
}

#[tokio::test]
async fn test_end_to_end_signed_invocations() {
    let dataset = write_dataset();
    let server = MockServer::start_async().await;
    mock_imds(&server).await;

    let invoke_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(INVOCATION_PATH)
                .header("content-type", "audio/mp3")
                .header("accept", "application/json")
                .header("x-amz-security-token", "session-token")
                .header_exists("authorization")
                .header_exists("x-amz-date")
                .header_exists("x-amz-content-sha256")
                .body("ID3-fake-audio");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"text": "hello"}));
        })
        .await;

    let engine = LoadTestEngine::from_settings("e2e", settings(&server, &dataset))
        .await
        .unwrap();
    let outcome = engine.run_until(no_interrupts()).await.unwrap();

    let summary = &outcome.snapshot.summary;
    let hits = invoke_mock.hits_async().await as u64;

    assert!(summary.http_reqs >= 1 && summary.http_reqs <= 5);
    assert_eq!(hits, summary.http_reqs);
    assert_eq!(outcome.schedule.started, summary.http_reqs);
    assert_eq!(summary.http_req_failed.passes, 0);
    assert_eq!(summary.checks.fails, 0);
    assert!(outcome.thresholds_passed());
}

#[tokio::test]
async fn test_sensitivity_header_is_sent() {
    let dataset = write_dataset();
    let server = MockServer::start_async().await;
    mock_imds(&server).await;

    let invoke_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(INVOCATION_PATH)
                .header(
                    "x-amzn-sagemaker-custom-attributes",
                    r#"Sensitivity={"default_sensitivity": 1}"#,
                );
            then.status(200).body("{}");
        })
        .await;

    let mut settings = settings(&server, &dataset);
    settings.sensitivity = Some(1);
    settings.rate = 1;

    let engine = LoadTestEngine::from_settings("sensitivity", settings)
        .await
        .unwrap();
    let outcome = engine.run_until(no_interrupts()).await.unwrap();

    assert_eq!(outcome.snapshot.summary.http_reqs, 1);
    invoke_mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_invocations_cross_thresholds() {
    let dataset = write_dataset();
    let server = MockServer::start_async().await;
    mock_imds(&server).await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(INVOCATION_PATH);
            then.status(424).body(r#"{"ErrorCode":"CLIENT_ERROR_FROM_MODEL"}"#);
        })
        .await;

    let engine = LoadTestEngine::from_settings("failing", settings(&server, &dataset))
        .await
        .unwrap();
    let outcome = engine.run_until(no_interrupts()).await.unwrap();

    let summary = &outcome.snapshot.summary;
    assert!(summary.http_reqs >= 1);
    assert_eq!(summary.http_req_failed.passes, summary.http_reqs);
    assert!(summary.check_details.iter().any(|c| c.name == "status is 200" && c.passes == 0));
    assert!(!outcome.thresholds_passed());

    let failed: Vec<_> = outcome.thresholds.iter().filter(|t| !t.passed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].metric, "http_req_failed");
}

#[tokio::test]
async fn test_setup_failure_aborts_run() {
    let dataset = write_dataset();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/latest/api/token");
            then.status(401);
        })
        .await;
    let invoke_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(INVOCATION_PATH);
            then.status(200);
        })
        .await;

    let engine = LoadTestEngine::from_settings("no-imds", settings(&server, &dataset))
        .await
        .unwrap();
    let err = match engine.run_until(no_interrupts()).await {
        Ok(_) => panic!("setup should fail without IMDS token"),
        Err(e) => e,
    };

    assert!(err.to_string().contains("IMDS token failed"));
    assert_eq!(invoke_mock.hits_async().await, 0);
}

#[tokio::test]
async fn test_missing_target_file_is_reported() {
    let dataset = write_dataset();
    let server = MockServer::start_async().await;

    let mut settings = settings(&server, &dataset);
    settings.target_file = "60sec_test.mp3".to_string();

    let err = match LoadTestEngine::from_settings("missing", settings).await {
        Ok(_) => panic!("unknown payload file should be rejected"),
        Err(e) => e,
    };

    assert!(err
        .to_string()
        .contains("File 60sec_test.mp3 not found. Available: 10sec_test.mp3, 35sec_test.mp3"));
}

#[tokio::test]
async fn test_report_written_to_output_path() {
    let dataset = write_dataset();
    let output = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    mock_imds(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(INVOCATION_PATH);
            then.status(200).body("{}");
        })
        .await;

    let mut settings = settings(&server, &dataset);
    settings.rate = 2;
    settings.output_path = Some(output.path().to_string_lossy().to_string());

    let engine = LoadTestEngine::from_settings("report", settings)
        .await
        .unwrap();
    let outcome = engine.run_until(no_interrupts()).await.unwrap();

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(output.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["scenario"], "report");
    assert_eq!(summary["passed"], true);
    assert_eq!(summary["summary"]["http_reqs"], outcome.snapshot.summary.http_reqs);

    let samples = std::fs::read_to_string(output.path().join("samples.csv")).unwrap();
    assert_eq!(
        samples.lines().count() as u64,
        outcome.snapshot.summary.http_reqs + 1
    );
}
