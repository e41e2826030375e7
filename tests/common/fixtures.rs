//! Mock report service and configuration helpers

use intelligence_report_dl::{
    Config, Credentials, FileCollisionAction, OutputConfig, ReportId, ServiceConfig, StalePolicy,
    WaitConfig, WaitStrategy,
};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token the mock auth endpoint hands out
pub const TOKEN: &str = "tok-1";

/// Report definition used throughout the tests
pub const REPORT_ID: &str = "r-1";

/// Path of the mock token endpoint
pub const TOKEN_PATH: &str = "/oauth/token";

/// Path of the run endpoint for [`REPORT_ID`]
pub const RUN_PATH: &str = "/v2/reports/r-1/run";

/// Path of the search endpoint for [`REPORT_ID`]
pub const SEARCH_PATH: &str = "/v2/reports/r-1/downloads/search";

/// Path of the download endpoint for an instance
pub fn download_path(instance_id: &str) -> String {
    format!("/v2/reports/tracking/{instance_id}/download")
}

/// Listing body in the shape the service returns
pub fn listing(instances: &[(&str, &str)]) -> Value {
    let results: Vec<Value> = instances
        .iter()
        .map(|(id, start_time)| json!({ "id": id, "start_time": start_time, "status": "COMPLETED" }))
        .collect();
    json!({ "data": { "results": results, "total_count": results.len() } })
}

/// Mount a token endpoint that answers with [`TOKEN`]
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount a run endpoint answering with `status`, expected to be hit `calls` times
pub async fn mount_run(server: &MockServer, status: u16, calls: u64) {
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "data": {} })))
        .expect(calls)
        .mount(server)
        .await;
}

/// Mount a search endpoint that always answers with `body`
pub async fn mount_listing(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount a download endpoint for one instance, expected to be hit `calls` times
pub async fn mount_download(server: &MockServer, instance_id: &str, bytes: &[u8], calls: u64) {
    Mock::given(method("GET"))
        .and(path(download_path(instance_id)))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
        .expect(calls)
        .mount(server)
        .await;
}

/// Wait config that lists right after the trigger
pub fn immediate_wait(on_stale: StalePolicy) -> WaitConfig {
    WaitConfig {
        strategy: WaitStrategy::FixedDelay {
            delay: Duration::ZERO,
        },
        clock_skew: Duration::from_secs(5),
        on_stale,
    }
}

/// Wait config that polls quickly and gives up after `timeout`
pub fn fast_poll(timeout: Duration, on_stale: StalePolicy) -> WaitConfig {
    WaitConfig {
        strategy: WaitStrategy::Poll {
            interval: Duration::from_millis(10),
            timeout,
        },
        clock_skew: Duration::from_secs(5),
        on_stale,
    }
}

/// Run configuration pointed at the mock server
pub fn test_config(server: &MockServer, out_file: &Path, wait: WaitConfig) -> Config {
    let mut service = ServiceConfig::new("test");
    service.auth_url = Some(format!("{}{}", server.uri(), TOKEN_PATH));
    service.api_base_url = Some(format!("{}/v2/reports/", server.uri()));
    service.request_timeout = Some(Duration::from_secs(10));

    Config {
        service,
        report_id: ReportId::new(REPORT_ID),
        credentials: Credentials::new("client-a", "secret-b"),
        output: OutputConfig {
            path: out_file.to_path_buf(),
            on_existing: FileCollisionAction::Overwrite,
        },
        wait,
    }
}
