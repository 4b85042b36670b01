// Integration tests for the signing scenario against a mocked service
//
// Run with: cargo test -p signload-core --test sign_scenario_test

use std::time::Duration;

use signload_core::{
    LoadRunner, LoadTestError, RunConfig, RunSummary, Scenario, ThresholdSet, DEFAULT_WEBHOOK_URL,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUCCESS_CHECK: &str = "is successful status code";

async fn mock_sign_endpoint(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crypto/sign"))
        .respond_with(ResponseTemplate::new(status).set_body_string("signed"))
        .mount(&server)
        .await;
    server
}

fn iterations(vus: usize, iterations: u64) -> RunConfig {
    RunConfig {
        vus,
        iterations: Some(iterations),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

async fn run(config: RunConfig, scenario: Scenario) -> RunSummary {
    LoadRunner::new(config, scenario)
        .unwrap()
        .run()
        .await
        .unwrap()
}

fn check_counts(summary: &RunSummary) -> (u64, u64) {
    let check = summary
        .checks
        .iter()
        .find(|c| c.name == SUCCESS_CHECK)
        .unwrap();
    (check.passes, check.fails)
}

#[test_log::test(tokio::test)]
async fn test_status_200_passes_check() {
    let server = mock_sign_endpoint(200).await;
    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();

    let summary = run(iterations(1, 3), scenario).await;

    assert_eq!(check_counts(&summary), (3, 0));
    assert!(summary.thresholds_passed());
    assert_eq!(summary.status_codes.get(&200), Some(&3));
}

#[test_log::test(tokio::test)]
async fn test_status_202_passes_check() {
    let server = mock_sign_endpoint(202).await;
    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();

    let summary = run(iterations(2, 4), scenario).await;

    assert_eq!(check_counts(&summary), (4, 0));
    assert!(summary.thresholds_passed());
}

#[test_log::test(tokio::test)]
async fn test_other_statuses_fail_check_and_thresholds() {
    for status in [404, 500] {
        let server = mock_sign_endpoint(status).await;
        let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();

        let summary = run(iterations(2, 6), scenario).await;

        assert_eq!(check_counts(&summary), (0, 6), "status {status}");
        assert!(!summary.thresholds_passed());

        let failed: Vec<_> = summary.failed_thresholds().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].metric, "http_req_failed");
        assert_eq!(failed[0].observed, 1.0);
    }
}

#[test_log::test(tokio::test)]
async fn test_without_thresholds_passes_against_failing_backend() {
    let server = mock_sign_endpoint(500).await;
    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL)
        .unwrap()
        .without_thresholds();

    let summary = run(iterations(1, 3), scenario).await;

    // Checks still run and fail; only the verdict is skipped
    assert_eq!(check_counts(&summary), (0, 3));
    assert!(summary.thresholds.is_empty());
    assert!(summary.thresholds_passed());
}

#[test_log::test(tokio::test)]
async fn test_connection_error_fails_check() {
    // Reserve a port, then release it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let scenario = Scenario::sign(&format!("http://{addr}"), DEFAULT_WEBHOOK_URL).unwrap();
    let summary = run(iterations(1, 2), scenario).await;

    assert_eq!(check_counts(&summary), (0, 2));
    assert_eq!(summary.iterations, 2);
    assert!(summary.status_codes.is_empty());
    assert!(!summary.thresholds_passed());
}

#[test_log::test(tokio::test)]
async fn test_url_passed_through_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crypto/sign"))
        .and(query_param("message", "test"))
        .and(query_param("webhookUrl", "http://127.0.0.1:7070/webhook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();
    let summary = run(iterations(1, 1), scenario).await;
    assert_eq!(check_counts(&summary), (1, 0));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url.query(),
        Some("message=test&webhookUrl=http%3A%2F%2F127.0.0.1%3A7070%2Fwebhook")
    );
}

#[test_log::test(tokio::test)]
async fn test_shared_iterations_are_exact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crypto/sign"))
        .respond_with(ResponseTemplate::new(200))
        .expect(25)
        .mount(&server)
        .await;

    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();
    let summary = run(iterations(8, 25), scenario).await;

    assert_eq!(summary.iterations, 25);
    assert_eq!(summary.vus, 8);
}

#[test_log::test(tokio::test)]
async fn test_duration_run_stops_at_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crypto/sign"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(20)))
        .mount(&server)
        .await;

    let config = RunConfig {
        vus: 2,
        duration: Some(Duration::from_millis(300)),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();
    let summary = run(config, scenario).await;

    assert!(summary.iterations >= 2);
    assert!(summary.elapsed_ms >= 300);
    assert!(summary.elapsed_ms < 5_000);
    assert!(!summary.interrupted);
}

#[test_log::test(tokio::test)]
async fn test_latency_threshold_fails_on_slow_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crypto/sign"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(60)))
        .mount(&server)
        .await;

    let mut scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();
    scenario.thresholds = ThresholdSet::new()
        .with("http_req_duration", "p(95)<10")
        .unwrap();

    let summary = run(iterations(1, 2), scenario).await;

    assert_eq!(check_counts(&summary), (2, 0));
    assert!(!summary.thresholds_passed());
    assert!(summary.thresholds[0].observed >= 60.0);
}

#[test_log::test(tokio::test)]
async fn test_request_timeout_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crypto/sign"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = RunConfig {
        request_timeout: Duration::from_millis(100),
        ..iterations(1, 1)
    };
    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();
    let summary = run(config, scenario).await;

    assert_eq!(check_counts(&summary), (0, 1));
    assert!(!summary.thresholds_passed());
}

#[test_log::test(tokio::test)]
async fn test_shutdown_stops_duration_run() {
    let server = mock_sign_endpoint(200).await;
    let config = RunConfig {
        vus: 2,
        duration: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let scenario = Scenario::sign(&server.uri(), DEFAULT_WEBHOOK_URL).unwrap();
    let runner = LoadRunner::new(config, scenario).unwrap();

    let handle = runner.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown();
    });

    let summary = runner.run().await.unwrap();
    assert!(summary.interrupted);
    assert!(summary.elapsed_ms < 10_000);
}

#[test]
fn test_bundled_scenario_file_matches_builtin() {
    let yaml = include_str!("../../../scenarios/sign.yaml");
    let scenario = Scenario::from_yaml_str(yaml).unwrap();
    assert_eq!(scenario, Scenario::default_sign().unwrap());
}

#[test]
fn test_scenario_file_with_bad_threshold_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bad.yaml");
    std::fs::write(
        &file,
        r#"
name: sign
request:
  url: "http://localhost:7070/crypto/sign?message=test"
thresholds:
  http_req_duration: ["p(95)<<2000"]
"#,
    )
    .unwrap();

    let err = Scenario::from_yaml_file(&file).unwrap_err();
    assert!(err.is_config_error(), "unexpected error: {err}");
}

#[test]
fn test_scenario_file_with_unknown_metric_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("unknown.yaml");
    std::fs::write(
        &file,
        r#"
name: sign
request:
  url: "http://localhost:7070/crypto/sign?message=test"
thresholds:
  vus_max: ["count<10"]
"#,
    )
    .unwrap();

    let err = Scenario::from_yaml_file(&file).unwrap_err();
    assert!(matches!(err, LoadTestError::UnknownMetric(_)));
}
