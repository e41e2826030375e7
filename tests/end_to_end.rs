//! Full runs against a mock report service

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::{Duration as TimeDelta, SecondsFormat, Utc};
use common::*;
use intelligence_report_dl::{ReportDownloader, StalePolicy};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_later_instance_is_downloaded_as_two_rows() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let out_file = temp.path().join("report.csv");

    mount_token(&server).await;
    mount_run(&server, 200, 1).await;
    mount_listing(
        &server,
        listing(&[
            ("s2", "2024-01-02T00:00:00Z"),
            ("s1", "2024-01-01T00:00:00Z"),
        ]),
    )
    .await;
    mount_download(&server, "s2", b"a,b,c\n1,2,3\n", 1).await;
    mount_download(&server, "s1", b"stale\n", 0).await;

    let config = test_config(&server, &out_file, immediate_wait(StalePolicy::UseLatest));
    let summary = ReportDownloader::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.instance_id, "s2");
    assert_eq!(summary.rows_written, 2);
    let written = std::fs::read_to_string(&out_file).unwrap();
    let rows: Vec<&str> = written.lines().collect();
    assert_eq!(rows, vec!["a,b,c", "1,2,3"]);
    assert_eq!(written, "a,b,c\r\n1,2,3\r\n");
}

#[tokio::test]
async fn test_downloads_newest_listed_instance() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let out_file = temp.path().join("out.csv");

    mount_token(&server).await;
    mount_run(&server, 200, 1).await;
    mount_listing(
        &server,
        listing(&[
            ("s2", "2024-03-01T10:05:00Z"),
            ("s1", "2024-03-01T09:00:00Z"),
        ]),
    )
    .await;
    mount_download(&server, "s2", b"a,b,c\r\n1,2,3\r\n", 1).await;
    mount_download(&server, "s1", b"old,data\r\n", 0).await;

    let config = test_config(&server, &out_file, immediate_wait(StalePolicy::UseLatest));
    let summary = ReportDownloader::new(config).unwrap().run().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&out_file).unwrap(),
        "a,b,c\r\n1,2,3\r\n"
    );
    assert_eq!(summary.instance_id, "s2");
    assert_eq!(summary.report_id.as_str(), REPORT_ID);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.bytes_downloaded, 14);
    assert_eq!(summary.output_path, out_file);
    // Both instances started before the trigger
    assert!(!summary.fresh);
}

#[tokio::test]
async fn test_newest_is_chosen_regardless_of_listing_order() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let out_file = temp.path().join("out.csv");

    mount_token(&server).await;
    mount_run(&server, 200, 1).await;
    mount_listing(
        &server,
        listing(&[
            ("s1", "2024-03-01T09:00:00Z"),
            ("s3", "2024-03-01T11:00:00Z"),
            ("s2", "2024-03-01T10:00:00Z"),
        ]),
    )
    .await;
    mount_download(&server, "s3", b"x\n", 1).await;

    let config = test_config(&server, &out_file, immediate_wait(StalePolicy::UseLatest));
    let summary = ReportDownloader::new(config).unwrap().run().await.unwrap();

    assert_eq!(summary.instance_id, "s3");
    assert_eq!(std::fs::read_to_string(&out_file).unwrap(), "x\r\n");
}

#[tokio::test]
async fn test_poll_picks_up_fresh_instance() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let out_file = temp.path().join("fresh.csv");
    let started = (Utc::now() + TimeDelta::seconds(60)).to_rfc3339_opts(SecondsFormat::Secs, true);

    mount_token(&server).await;
    mount_run(&server, 200, 1).await;

    // First listing only shows yesterday's instance
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(listing(&[("s1", "2024-02-29T09:00:00Z")])),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_listing(
        &server,
        listing(&[("s1", "2024-02-29T09:00:00Z"), ("s2", started.as_str())]),
    )
    .await;
    mount_download(&server, "s2", b"h1,h2\nv1,v2\n", 1).await;

    let config = test_config(
        &server,
        &out_file,
        fast_poll(Duration::from_secs(5), StalePolicy::Fail),
    );
    let summary = ReportDownloader::new(config).unwrap().run().await.unwrap();

    assert!(summary.fresh);
    assert_eq!(summary.instance_id, "s2");
    assert_eq!(
        std::fs::read_to_string(&out_file).unwrap(),
        "h1,h2\r\nv1,v2\r\n"
    );
}

#[tokio::test]
async fn test_listing_request_body() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let out_file = temp.path().join("out.csv");

    mount_token(&server).await;
    mount_run(&server, 200, 1).await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_json(serde_json::json!({ "offset": "", "page_size": 200 })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(listing(&[("s1", "2024-03-01T09:00:00Z")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_download(&server, "s1", b"a\n", 1).await;

    let config = test_config(&server, &out_file, immediate_wait(StalePolicy::UseLatest));
    ReportDownloader::new(config).unwrap().run().await.unwrap();
}

#[tokio::test]
async fn test_rerun_replaces_previous_output() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let out_file = temp.path().join("out.csv");
    std::fs::write(&out_file, "stale,contents,from,last,week\n").unwrap();

    mount_token(&server).await;
    mount_run(&server, 200, 1).await;
    mount_listing(&server, listing(&[("s1", "2024-03-01T09:00:00Z")])).await;
    mount_download(&server, "s1", b"a,b\n", 1).await;

    let config = test_config(&server, &out_file, immediate_wait(StalePolicy::UseLatest));
    ReportDownloader::new(config).unwrap().run().await.unwrap();

    assert_eq!(std::fs::read_to_string(&out_file).unwrap(), "a,b\r\n");
}
