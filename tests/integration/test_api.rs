//! Integration tests for the HTTP API over a real socket.
//!
//! Generation results arrive as server-sent events; these tests read the
//! raw stream and check event order and payloads.

mod common;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use common::{Keyed, Unavailable, CONTEXT_RULES, TECH_SOURCE};
use lesson_generator::{create_router, AppState, CompletionService, Config};
use serde_json::{json, Value};
use tokio::time::timeout;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the test server and returns its base URL.
async fn spawn_test_server(service: Arc<dyn CompletionService>) -> String {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = create_router(AppState::new(Config::default(), service));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://{addr}")
}

/// Splits an SSE body into `(event name, JSON data)` pairs, skipping
/// keep-alive comments.
fn parse_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.trim_start());
                }
            }
            let name = name?;
            let data = serde_json::from_str(&data).expect("event data is JSON");
            Some((name, data))
        })
        .collect()
}

async fn generate(base: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/lessons/generate"))
        .json(body)
        .send()
        .await
        .expect("Request failed")
}

#[tokio::test]
async fn test_generation_stream_ends_with_complete() {
    let base = spawn_test_server(Arc::new(Keyed::new(&CONTEXT_RULES))).await;

    let response = generate(
        &base,
        &json!({"sourceText": TECH_SOURCE, "lessonType": "travel", "level": "A2"}),
    )
    .await;
    assert_eq!(response.status(), 200);

    let body = timeout(Duration::from_secs(10), response.text())
        .await
        .expect("Timeout waiting for stream to end")
        .expect("Failed to read body");
    let events = parse_events(&body);

    let (last_name, last_data) = events.last().expect("at least one event");
    assert_eq!(last_name, "complete");
    assert_eq!(last_data["type"], "complete");
    assert_eq!(last_data["lesson"]["level"], "A2");
    assert_eq!(
        last_data["lesson"]["context"]["keyVocabulary"][0],
        "technology"
    );

    let sections: Vec<&str> = last_data["lesson"]["sections"]
        .as_array()
        .expect("sections array")
        .iter()
        .filter_map(|s| s["sectionName"].as_str())
        .collect();
    assert_eq!(
        sections,
        ["warmup", "vocabulary", "reading", "comprehension", "dialogue", "wrapup"]
    );

    let progress: Vec<u64> = events
        .iter()
        .filter(|(name, _)| name == "progress")
        .map(|(_, data)| data["progress"].as_u64().expect("progress number"))
        .collect();
    assert_eq!(progress.len(), events.len() - 1);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.last(), Some(&100));
}

#[tokio::test]
async fn test_blank_source_is_rejected_before_streaming() {
    let base = spawn_test_server(Arc::new(Unavailable)).await;

    let response = generate(&base, &json!({"sourceText": "   ", "lessonType": "discussion"})).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("JSON error body");
    assert!(body["error"].as_str().unwrap_or_default().contains("empty"));
}

#[tokio::test]
async fn test_event_feed_sees_other_clients_runs() {
    let base = spawn_test_server(Arc::new(Unavailable)).await;

    let mut feed = reqwest::get(format!("{base}/api/events"))
        .await
        .expect("Failed to open event feed");
    assert_eq!(feed.status(), 200);

    let run = generate(
        &base,
        &json!({"sourceText": TECH_SOURCE, "lessonType": "pronunciation"}),
    )
    .await;
    let _ = run.text().await.expect("Failed to read run body");

    let mut received = String::new();
    let saw_complete = timeout(Duration::from_secs(10), async {
        while let Some(chunk) = feed.chunk().await.expect("Feed read failed") {
            received.push_str(&String::from_utf8_lossy(&chunk).replace("event: ", "event:"));
            if received.contains("event:complete") {
                return true;
            }
        }
        false
    })
    .await
    .expect("Timeout waiting for complete event");

    assert!(saw_complete);
    assert!(received.contains("event:progress"));
}

#[tokio::test]
async fn test_validate_endpoint_reports_issues() {
    let base = spawn_test_server(Arc::new(Unavailable)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/sections/validate"))
        .json(&json!({
            "level": "A1",
            "content": {
                "kind": "vocabulary",
                "entries": [
                    {"word": "travel", "meaning": "", "example": "I travel by train."}
                ]
            }
        }))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.expect("JSON body");
    assert_eq!(result["isValid"], false);
    assert!(!result["issues"].as_array().expect("issues array").is_empty());
}

#[tokio::test]
async fn test_plan_endpoint_uses_lesson_type() {
    let base = spawn_test_server(Arc::new(Unavailable)).await;

    let plan: Value = reqwest::get(format!("{base}/api/lesson-types/Grammar/plan"))
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("JSON body");

    assert_eq!(plan["lessonType"], "Grammar");
    let names: Vec<&str> = plan["sections"]
        .as_array()
        .expect("sections array")
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(names.contains(&"grammar"));
}
