//! End-to-end tests of discovery and export against a mock listing

use crate::common::{
    create_test_config, detail_html, file_names, listing_html, mount_detail, mount_listing,
};
use runlog::crawler::{Coordinator, DiscoveryError, ResetScope, RunOptions};
use runlog::output::RunStatus;
use runlog::Workout;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn ids(values: &[u64]) -> BTreeSet<u64> {
    values.iter().copied().collect()
}

fn run_with_concurrency(n: usize) -> RunOptions {
    RunOptions {
        reset: None,
        concurrency: Some(n),
    }
}

/// Mounts a two-page listing: page 1 holds 101 and 102, page 2 holds 103
async fn mount_two_page_listing(server: &MockServer) {
    mount_listing(server, 1, listing_html(&[102, 101], &[2])).await;
    mount_listing(server, 2, listing_html(&[103], &[1])).await;

    mount_detail(
        server,
        101,
        detail_html("March 1, 2023 (Morning)", &[("3 miles", "24:00")]),
    )
    .await;
    mount_detail(
        server,
        102,
        detail_html("March 2, 2023 (Afternoon)", &[("5 km", "25:10")]),
    )
    .await;
    mount_detail(
        server,
        103,
        detail_html("March 3, 2023 (Night)", &[("800 meters", "3:05"), ("1 mile", "8:00")]),
    )
    .await;
}

#[tokio::test]
async fn test_discover_then_export_two_page_listing() {
    let mock_server = MockServer::start().await;
    mount_two_page_listing(&mock_server).await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).expect("Failed to create coordinator");

    let report = coordinator.discover().await.expect("Discovery failed");
    assert_eq!(report.identifiers, ids(&[101, 102, 103]));
    assert_eq!(report.max_page, 2);

    let state = coordinator.state().snapshot().unwrap();
    assert_eq!(state.processed_workout_list_pages, [1, 2].into_iter().collect());

    let summary = coordinator
        .run(run_with_concurrency(2))
        .await
        .expect("Run failed");

    assert_eq!(summary.status, RunStatus::Ok);
    assert_eq!(summary.exported, vec![103, 102, 101]);
    assert!(summary.failed.is_empty());

    let state = coordinator.state().snapshot().unwrap();
    assert_eq!(state.done_wids, ids(&[101, 102, 103]));
    assert!(state.is_consistent());

    assert_eq!(
        file_names(&config.output_dir()),
        vec![
            "2023-03-01_wid101.json",
            "2023-03-02_wid102.json",
            "2023-03-03_wid103.json",
        ]
    );

    let raw = std::fs::read_to_string(config.output_dir().join("2023-03-03_wid103.json")).unwrap();
    let record: Workout = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.id, 103);
    assert_eq!(record.segments.len(), 2);
    assert_eq!(record.total_duration_seconds, 185 + 480);
    assert_eq!(record.date.to_rfc3339(), "2023-03-03T20:00:00-05:00");

    // The state document on disk matches what the run reported
    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.state_path()).unwrap()).unwrap();
    assert_eq!(document["done_wids"], serde_json::json!([101, 102, 103]));
    assert_eq!(document["processed_workout_list_pages"], serde_json::json!([1, 2]));
}

#[tokio::test]
async fn test_second_run_is_empty() {
    let mock_server = MockServer::start().await;
    mount_two_page_listing(&mock_server).await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());

    let first = Coordinator::new(&config).unwrap();
    let summary = first.run(RunOptions::default()).await.unwrap();
    assert_eq!(summary.exported.len(), 3);
    drop(first);

    // A fresh coordinator resumes from the state file
    let second = Coordinator::new(&config).unwrap();
    let summary = second.run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.status, RunStatus::Empty);
    assert!(summary.exported.is_empty());
    assert_eq!(summary.discovered, 3);
}

#[tokio::test]
async fn test_scoped_reset_reexports_only_named_records() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[5, 9, 12], &[1])).await;

    for (id, expected_fetches) in [(5u64, 2u64), (9, 2), (12, 1)] {
        Mock::given(method("GET"))
            .and(path(format!("/workouts/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(
                &format!("April {}, 2022 (Morning)", id),
                &[("2 miles", "16:00")],
            )))
            .expect(expected_fetches)
            .mount(&mock_server)
            .await;
    }

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).unwrap();

    let summary = coordinator.run(RunOptions::default()).await.unwrap();
    assert_eq!(summary.exported, vec![12, 9, 5]);

    // Mark the artifacts of the record that must survive
    let keep = config.output_dir().join("2022-04-12_wid12.json");
    std::fs::write(&keep, "untouched").unwrap();

    let summary = coordinator
        .run(RunOptions {
            reset: Some(ResetScope::Completed(ids(&[5, 9]))),
            concurrency: None,
        })
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Ok);
    assert_eq!(summary.reset_cleared, 2);
    assert_eq!(summary.artifacts_removed, 2);
    assert_eq!(summary.exported, vec![9, 5]);

    assert_eq!(std::fs::read_to_string(&keep).unwrap(), "untouched");
    let state = coordinator.state().snapshot().unwrap();
    assert_eq!(state.done_wids, ids(&[5, 9, 12]));
}

#[tokio::test]
async fn test_zero_segment_record_is_exported() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[77], &[1])).await;
    mount_detail(
        &mock_server,
        77,
        detail_html(
            "June 10, 2021 (Afternoon)",
            &[("0 miles", "0:00"), ("0.00 miles", "00:00:00")],
        ),
    )
    .await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).unwrap();

    let summary = coordinator.run(RunOptions::default()).await.unwrap();
    assert_eq!(summary.exported, vec![77]);

    let raw = std::fs::read_to_string(config.output_dir().join("2021-06-10_wid77.json")).unwrap();
    let record: Workout = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.segments.len(), 1);
    assert_eq!(record.segments[0].distance_miles, 0.0);
    assert_eq!(record.segments[0].duration_seconds, 0);
}

#[tokio::test]
async fn test_missing_pagination_is_fatal() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[1, 2], &[])).await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&mock_server.uri(), workspace.path());
    config.export.save_debug_html = true;
    let coordinator = Coordinator::new(&config).unwrap();

    let err = coordinator.discover().await.unwrap_err();
    assert!(matches!(err, DiscoveryError::MissingPagination { .. }));
    assert!(config.debug_dir().join("listing_page_1.html").exists());

    let summary = coordinator.run(RunOptions::default()).await.unwrap();
    assert!(summary.status.is_fatal());
    assert!(summary.exported.is_empty());
    assert!(coordinator.state().snapshot().unwrap().discovered_wids.is_empty());
}

#[tokio::test]
async fn test_page_past_end_skipped() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[30, 31], &[2, 3, 4])).await;
    mount_listing(&mock_server, 2, listing_html(&[20], &[1, 3, 4])).await;
    mount_listing(&mock_server, 4, listing_html(&[10], &[1, 2, 3])).await;

    Mock::given(method("GET"))
        .and(path("/workouts"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).unwrap();

    let report = coordinator.discover().await.expect("Discovery failed");

    assert_eq!(report.identifiers, ids(&[10, 20, 30, 31]));
    assert_eq!(report.pages_past_end, vec![3]);
    assert!(report.pages_failed.is_empty());

    let state = coordinator.state().snapshot().unwrap();
    assert_eq!(state.processed_workout_list_pages, [1, 2, 4].into_iter().collect());
}

#[tokio::test]
async fn test_record_failure_does_not_abort_run() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[201, 202, 203], &[1])).await;
    mount_detail(
        &mock_server,
        201,
        detail_html("May 1, 2020 (Morning)", &[("1 mile", "9:00")]),
    )
    .await;
    mount_detail(&mock_server, 202, "<html><body><h3>x</h3><p>not a date</p></body></html>".to_string())
        .await;
    Mock::given(method("GET"))
        .and(path("/workouts/203"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).unwrap();

    let summary = coordinator.run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.status, RunStatus::Ok);
    assert_eq!(summary.exported, vec![201]);
    assert_eq!(summary.failed_ids(), vec![203, 202]);
    assert!(summary.failed[0].reason.contains("410"));
    assert!(summary.failed[1].reason.contains("not a date"));

    // Failed records stay pending for the next run
    assert_eq!(coordinator.state().pending().unwrap(), vec![203, 202]);
}

#[tokio::test]
async fn test_corrupt_state_file_starts_fresh() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[8], &[1])).await;
    mount_detail(
        &mock_server,
        8,
        detail_html("May 8, 2020 (Night)", &[("4 miles", "32:00")]),
    )
    .await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    std::fs::create_dir_all(config.state_path().parent().unwrap()).unwrap();
    std::fs::write(config.state_path(), "{\"done_wids\": [1, 2").unwrap();

    let coordinator = Coordinator::new(&config).unwrap();
    let summary = coordinator.run(RunOptions::default()).await.unwrap();

    assert_eq!(summary.exported, vec![8]);
    let state = coordinator.state().snapshot().unwrap();
    assert_eq!(state.done_wids, ids(&[8]));
}

#[tokio::test]
async fn test_record_cap_defers_oldest() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[1, 2, 3], &[1])).await;
    for id in 1..=3u64 {
        mount_detail(
            &mock_server,
            id,
            detail_html(&format!("May {}, 2020 (Morning)", id), &[("1 mile", "9:00")]),
        )
        .await;
    }

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&mock_server.uri(), workspace.path());
    config.export.max_records_per_session = Some(2);
    let coordinator = Coordinator::new(&config).unwrap();

    let summary = coordinator.run(RunOptions::default()).await.unwrap();
    assert_eq!(summary.exported, vec![3, 2]);
    assert_eq!(summary.deferred, 1);

    let summary = coordinator.run(RunOptions::default()).await.unwrap();
    assert_eq!(summary.exported, vec![1]);
    assert_eq!(summary.deferred, 0);
}

#[tokio::test]
async fn test_full_reset_forgets_discovery() {
    let mock_server = MockServer::start().await;
    mount_two_page_listing(&mock_server).await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).unwrap();

    coordinator.run(RunOptions::default()).await.unwrap();
    assert_eq!(file_names(&config.output_dir()).len(), 3);

    let summary = coordinator
        .run(RunOptions {
            reset: Some(ResetScope::Everything),
            concurrency: Some(1),
        })
        .await
        .unwrap();

    assert_eq!(summary.reset_cleared, 3);
    assert_eq!(summary.artifacts_removed, 3);
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.exported, vec![103, 102, 101]);
}

#[tokio::test]
async fn test_forbidden_record_does_not_block_older_records() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[1, 2, 3], &[1])).await;

    Mock::given(method("GET"))
        .and(path("/workouts/3"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&mock_server)
        .await;
    for id in [1u64, 2] {
        mount_detail(
            &mock_server,
            id,
            detail_html(&format!("May {}, 2020 (Morning)", id), &[("1 mile", "9:00")]),
        )
        .await;
    }

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).unwrap();

    let summary = coordinator.run(run_with_concurrency(1)).await.unwrap();
    assert_eq!(summary.status, RunStatus::Ok);
    assert_eq!(summary.exported, vec![2, 1]);
    assert_eq!(summary.failed_ids(), vec![3]);
    assert!(summary.failed[0].reason.contains("403"));
    assert_eq!(summary.auth_failures, 1);

    // The refused record is tried again next run, on its own
    let summary = coordinator.run(run_with_concurrency(1)).await.unwrap();
    assert!(summary.exported.is_empty());
    assert_eq!(summary.failed_ids(), vec![3]);
    assert_eq!(coordinator.state().pending().unwrap(), vec![3]);
}

#[tokio::test]
async fn test_session_page_cap_resumes_next_run() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[30], &[2, 3])).await;
    mount_listing(&mock_server, 2, listing_html(&[20], &[1, 3])).await;
    mount_listing(&mock_server, 3, listing_html(&[10], &[1, 2])).await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&mock_server.uri(), workspace.path());
    config.export.max_pages_per_session = 2;
    config.export.concurrency = 1;

    let coordinator = Coordinator::new(&config).unwrap();
    let report = coordinator.discover().await.expect("Discovery failed");

    assert!(report.capped);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.identifiers.len(), 2);
    let processed = coordinator.state().snapshot().unwrap().processed_workout_list_pages;
    assert_eq!(processed.len(), 2);
    assert!(processed.contains(&1));

    // The next invocation picks up the page left over
    let coordinator = Coordinator::new(&config).unwrap();
    let report = coordinator.discover().await.expect("Discovery failed");

    assert!(!report.capped);
    assert_eq!(report.identifiers, ids(&[10, 20, 30]));
    assert_eq!(
        coordinator.state().snapshot().unwrap().processed_workout_list_pages,
        [1, 2, 3].into_iter().collect()
    );
}

#[tokio::test]
async fn test_processed_pages_not_fetched_again() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[102, 101], &[2])).await;

    Mock::given(method("GET"))
        .and(path("/workouts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[103], &[1])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());

    let first = Coordinator::new(&config).unwrap();
    let report = first.discover().await.expect("Discovery failed");
    assert_eq!(report.pages_fetched, 2);
    drop(first);

    let second = Coordinator::new(&config).unwrap();
    let report = second.discover().await.expect("Discovery failed");

    // Only page 1 is read again
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.new_identifiers, 0);
    assert_eq!(report.identifiers, ids(&[101, 102, 103]));
}

/// Serves detail pages after a fixed delay, noting when each request arrived
struct SlowDetail {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowDetail {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        let id = request.url.path().rsplit('/').next().unwrap_or("1");

        ResponseTemplate::new(200)
            .set_body_string(detail_html(
                &format!("May {}, 2020 (Morning)", id),
                &[("1 mile", "9:00")],
            ))
            .set_delay(self.delay)
    }
}

#[tokio::test]
async fn test_export_concurrency_never_exceeds_limit() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, 1, listing_html(&[1, 2, 3, 4, 5, 6], &[1])).await;

    let delay = Duration::from_millis(150);
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .and(path_regex(r"^/workouts/\d+$"))
        .respond_with(SlowDetail {
            delay,
            arrivals: arrivals.clone(),
        })
        .mount(&mock_server)
        .await;

    let workspace = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), workspace.path());
    let coordinator = Coordinator::new(&config).unwrap();

    let summary = coordinator.run(run_with_concurrency(2)).await.unwrap();
    assert_eq!(summary.exported, vec![6, 5, 4, 3, 2, 1]);

    // A request is in flight for `delay` after it arrives; count the
    // requests that arrived within half of that before each arrival
    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 6);
    let window = delay / 2;
    let high_water = arrivals
        .iter()
        .map(|a| {
            arrivals
                .iter()
                .filter(|b| *b <= a && a.duration_since(**b) < window)
                .count()
        })
        .max()
        .unwrap_or(0);

    assert_eq!(high_water, 2, "arrivals: {:?}", arrivals);
}
