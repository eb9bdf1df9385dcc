//! Shared fixtures for the integration tests

use runlog::config::{
    Config, ExportConfig, HttpConfig, RateLimitConfig, RetryConfig, TargetConfig,
};
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ENTITY: &str = "42";

/// Creates a test configuration against `base_url` with fast limits and tiny backoff
pub fn create_test_config(base_url: &str, workspace: &Path) -> Config {
    Config {
        target: TargetConfig {
            base_url: base_url.to_string(),
            entity_id: ENTITY.to_string(),
            listing_path: "/workouts".to_string(),
            detail_path: "/workouts".to_string(),
            entity_param: "athleteid".to_string(),
            login_path: "/athlete/login".to_string(),
        },
        http: HttpConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
            ..HttpConfig::default()
        },
        rate_limit: RateLimitConfig {
            detail_rate: 1000,
            detail_per_secs: 1.0,
            listing_rate: 1000,
            listing_per_secs: 1.0,
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
            jitter_ms: 0,
        },
        export: ExportConfig {
            workspace: workspace.to_path_buf(),
            concurrency: 5,
            save_debug_html: false,
            ..ExportConfig::default()
        },
    }
}

/// A listing page linking to `ids`, with pagination links to `pages`
pub fn listing_html(ids: &[u64], pages: &[u32]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<tr><td><a href="/workouts/{id}?athleteid={ENTITY}">Workout</a></td>
                   <td><a href="/workouts/{id}/edit?athleteid={ENTITY}">edit</a></td></tr>"#
            )
        })
        .collect();

    let pagination = if pages.is_empty() {
        String::new()
    } else {
        let links: String = pages
            .iter()
            .map(|p| format!(r#"<a href="/workouts?athleteid={ENTITY}&amp;page={p}">{p}</a> "#))
            .collect();
        format!(r#"<div class="pagination">{links}</div>"#)
    };

    format!(
        r#"<html><body><h2>Workouts</h2>
        <a href="/workouts/new?athleteid={ENTITY}">New workout</a>
        <table class="content">{rows}</table>
        {pagination}
        </body></html>"#
    )
}

/// A detail page dated `date` with one table row per `(distance, duration)`
pub fn detail_html(date: &str, rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(distance, duration)| {
            format!("<tr><td>{distance}</td><td>{duration}</td><td></td><td></td><td></td></tr>")
        })
        .collect();

    format!(
        r#"<html><head><meta name="description" content="Workout"></head><body>
        <h3>Workout</h3>
        <p>{date}</p>
        <p>Exercise Type: Running</p>
        <p>Comments: Nice day</p>
        <table class="content">
          <tr><th>Distance</th><th>Time</th><th>Pace</th><th>Type</th><th>Shoes</th></tr>
          {rows}
        </table>
        </body></html>"#
    )
}

/// Mounts listing page `page`
pub async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/workouts"))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts the detail page of record `id`
pub async fn mount_detail(server: &MockServer, id: u64, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/workouts/{}", id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Names of the files in `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
