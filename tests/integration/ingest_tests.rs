//! Integration tests for the ingestion pipeline
//!
//! These tests use wiremock to stand in for the reply endpoint and drive
//! full runs end-to-end against an on-disk database.

use reply_harvest::config::{
    Config, DispatchConfig, OutputConfig, RateLimitConfig, SourceConfig, UnboundedPolicy,
    UserAgentConfig,
};
use reply_harvest::ingest::{Coordinator, PageCount};
use reply_harvest::storage::{RunStatus, SqliteStorage, Storage};
use reply_harvest::{ConfigError, HarvestError};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str, upper_bound: u32, db_path: &Path) -> Config {
    Config {
        source: SourceConfig {
            subject_id: Some(1),
            bvid: None,
            view_endpoint: None,
            endpoint: Some(format!("{}/x/v2/reply?type=1&oid=1&pn=", base_url)),
            upper_bound,
            unbounded: UnboundedPolicy::Follow,
        },
        rate_limit: RateLimitConfig {
            average_delay: 0,
            delay_range: 0,
            seed: Some(42),
        },
        dispatch: DispatchConfig {
            workers: 4,
            fail_fast: false,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().to_string(),
        },
    }
}

fn reply(rpid: u64, root: u64, parent: u64, like: u64, message: &str, replies: Vec<Value>) -> Value {
    json!({
        "rpid": rpid,
        "mid": rpid * 10,
        "root": root,
        "parent": parent,
        "ctime": 1_600_000_000,
        "like": like,
        "content": { "message": message },
        "member": { "uname": format!("user{}", rpid), "level_info": { "current_level": 3 } },
        "replies": if replies.is_empty() { Value::Null } else { Value::Array(replies) },
    })
}

fn page_body(replies: Vec<Value>) -> Value {
    json!({ "code": 0, "message": "0", "data": { "replies": replies } })
}

fn empty_body() -> Value {
    json!({ "code": 0, "message": "0", "data": { "replies": null } })
}

/// Mounts data pages `1..=pages.len()`, each fetched `hits` times, plus an
/// empty fallback for every other index
async fn mount_thread(server: &MockServer, pages: Vec<Vec<Value>>, hits: u64) {
    for (index, replies) in pages.into_iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/x/v2/reply"))
            .and(query_param("pn", (index + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(replies)))
            .expect(hits)
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .with_priority(10)
        .mount(server)
        .await;
}

fn first_pass_pages() -> Vec<Vec<Value>> {
    vec![
        vec![reply(
            100,
            0,
            0,
            5,
            "great video 😀",
            vec![reply(
                101,
                100,
                100,
                1,
                "agreed",
                vec![reply(102, 100, 101, 0, "same", vec![])],
            )],
        )],
        vec![reply(200, 0, 0, 2, "second page", vec![])],
        vec![
            reply(300, 0, 0, 0, "third page", vec![]),
            reply(301, 0, 0, 0, "also third", vec![]),
        ],
    ]
}

#[tokio::test]
async fn test_full_harvest_then_refresh() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    // First run: probes 1, 8, 4, 2, 3 then fetches 1, 2, 3
    let first_server = MockServer::start().await;
    mount_thread(&first_server, first_pass_pages(), 2).await;

    let config = create_test_config(&first_server.uri(), 8, &db_path);
    let coordinator = Coordinator::new(config, "hash-1".to_string())
        .await
        .unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.page_count, PageCount::Boundary(4));
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.requests, 8);
    assert_eq!(report.summary.visited, 6);
    assert_eq!(report.summary.inserted, 6);
    assert_eq!(report.summary.updated, 0);
    assert!(report.summary.failures.is_empty());
    assert_eq!(report.status, RunStatus::Completed);
    drop(coordinator);

    {
        let storage = SqliteStorage::new(&db_path).unwrap();
        let ids: Vec<u64> = storage
            .list_comments()
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![100, 101, 102, 200, 300, 301]);

        let top = storage.get_comment(100).unwrap().unwrap();
        assert_eq!(top.message, "great video [\\u1f600]");
        assert_eq!(top.like_count, 5);
        assert_eq!(top.user_id, 1000);
        assert_eq!(top.user_name, "user100");
        assert_eq!(top.user_level, 3);
        assert!(!top.date.is_empty());

        let nested = storage.get_comment(102).unwrap().unwrap();
        assert_eq!(nested.root, 100);
        assert_eq!(nested.parent, 101);

        let run = storage.get_run(report.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.config_hash, "hash-1");
        assert_eq!(run.totals.pages_fetched, 3);
        assert_eq!(run.totals.inserted, 6);
    }

    // Second run: same ids, new mutable values, contradictory ancestry
    let mut refreshed = first_pass_pages();
    refreshed[0] = vec![reply(
        100,
        0,
        0,
        50,
        "edited",
        vec![reply(
            101,
            999,
            999,
            1,
            "agreed",
            vec![reply(102, 100, 101, 0, "same", vec![])],
        )],
    )];

    let second_server = MockServer::start().await;
    mount_thread(&second_server, refreshed, 2).await;

    let config = create_test_config(&second_server.uri(), 8, &db_path);
    let coordinator = Coordinator::new(config, "hash-2".to_string())
        .await
        .unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.summary.inserted, 0);
    assert_eq!(report.summary.updated, 6);
    drop(coordinator);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_comments().unwrap(), 6);

    let top = storage.get_comment(100).unwrap().unwrap();
    assert_eq!(top.like_count, 50);
    assert_eq!(top.message, "edited");

    let child = storage.get_comment(101).unwrap().unwrap();
    assert_eq!(child.root, 100);
    assert_eq!(child.parent, 100);

    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.config_hash, "hash-2");
    assert_eq!(latest.totals.updated, 6);
}

#[tokio::test]
async fn test_server_error_fails_run() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 8, &db_path);
    let coordinator = Coordinator::new(config, "hash".to_string())
        .await
        .unwrap();
    let result = coordinator.run().await;

    match result {
        Err(HarvestError::Transport { status, url }) => {
            assert_eq!(status, 500);
            assert!(url.ends_with("pn=1"));
        }
        other => panic!("expected Transport error, got {:?}", other),
    }

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(storage.count_comments().unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_payload_is_decode_error() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>try later</html>"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 8, &db_path);
    let coordinator = Coordinator::new(config, "hash".to_string())
        .await
        .unwrap();

    assert!(matches!(
        coordinator.run().await,
        Err(HarvestError::Decode { .. })
    ));
}

#[tokio::test]
async fn test_source_error_code_is_api_error() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": -404, "message": "not found" })),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 8, &db_path);
    let coordinator = Coordinator::new(config, "hash".to_string())
        .await
        .unwrap();

    match coordinator.run().await {
        Err(HarvestError::Api { code, message, .. }) => {
            assert_eq!(code, -404);
            assert_eq!(message, "not found");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_thread_completes_without_writes() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .and(query_param("pn", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 8, &db_path);
    let coordinator = Coordinator::new(config, "hash".to_string())
        .await
        .unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.page_count, PageCount::Empty);
    assert_eq!(report.pages_fetched, 0);
    assert_eq!(report.status, RunStatus::Completed);

    let storage = coordinator.storage();
    assert_eq!(storage.lock().unwrap().count_comments().unwrap(), 0);
}

#[tokio::test]
async fn test_unbounded_thread_with_abort_policy() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    // Every page has data; only pages 1 and 4 get probed
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_body(vec![reply(1, 0, 0, 0, "again", vec![])])),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), 4, &db_path);
    config.source.unbounded = UnboundedPolicy::Abort;

    let coordinator = Coordinator::new(config, "hash".to_string())
        .await
        .unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.page_count, PageCount::Unbounded);
    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.pages_fetched, 0);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_comments().unwrap(), 0);
    assert_eq!(
        storage.get_run(report.run_id).unwrap().status,
        RunStatus::Aborted
    );
}

#[tokio::test]
async fn test_wide_delay_range_rejected_before_any_request() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), 8, &db_path);
    config.rate_limit.average_delay = 100;
    config.rate_limit.delay_range = 500;

    let result = Coordinator::new(config, "hash".to_string()).await;
    assert!(matches!(
        result,
        Err(HarvestError::Config(ConfigError::DelayRange {
            average: 100,
            range: 500
        }))
    ));
}

#[tokio::test]
async fn test_requests_carry_user_agent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header(
            "user-agent",
            "TestHarvester/1.0 (+https://example.com/about)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), 8, &db_path);
    let coordinator = Coordinator::new(config, "hash".to_string())
        .await
        .unwrap();

    assert_eq!(coordinator.probe().await.unwrap(), PageCount::Empty);
}

#[tokio::test]
async fn test_bvid_resolved_before_discovery() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .and(query_param("bvid", "BV1f4411M7QC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "0",
            "data": { "bvid": "BV1f4411M7QC", "aid": 54737593 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_thread(&mock_server, vec![vec![reply(1, 0, 0, 0, "hi", vec![])]], 2).await;

    let mut config = create_test_config(&mock_server.uri(), 8, &db_path);
    config.source.subject_id = None;
    config.source.bvid = Some("BV1f4411M7QC".to_string());
    config.source.view_endpoint = Some(format!("{}/x/web-interface/view?bvid=", mock_server.uri()));

    let coordinator = Coordinator::new(config, "hash".to_string())
        .await
        .unwrap();
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.page_count, PageCount::Boundary(2));
    assert_eq!(report.summary.inserted, 1);
    drop(coordinator);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.subject_id, 54737593);
}

#[tokio::test]
async fn test_unknown_bvid_fails_before_any_run() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("comments.db");

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -404,
            "message": "not found"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/v2/reply"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_body()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), 8, &db_path);
    config.source.subject_id = None;
    config.source.bvid = Some("BV1xx411c7mD".to_string());
    config.source.view_endpoint = Some(format!("{}/x/web-interface/view?bvid=", mock_server.uri()));

    let result = Coordinator::new(config, "hash".to_string()).await;
    assert!(matches!(result, Err(HarvestError::Api { code: -404, .. })));
}
