//! Router-level tests: intents go in as HTTP requests, state comes back as JSON.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use countdown_keeper::{
    create_router,
    state::{AppState, StateSettings, TimerStatus},
    store::{FileStore, MemoryStore, HISTORY_KEY, TIMERS_KEY},
};

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn setup(export_dir: &std::path::Path) -> (Arc<AppState>, Router, MemoryStore) {
    let store = MemoryStore::new();
    let settings = StateSettings {
        export_dir: export_dir.to_path_buf(),
        ..StateSettings::default()
    };
    let state = Arc::new(AppState::new(Arc::new(store.clone()), settings));
    let app = create_router(Arc::clone(&state));
    (state, app, store)
}

async fn add_timer(app: &Router, name: &str, duration: i64, category: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/timers",
        Some(json!({ "name": name, "duration": duration, "category": category })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn add_timer_then_list_grouped() {
    let dir = tempfile::tempdir().unwrap();
    let (_state, app, _store) = setup(dir.path());

    add_timer(&app, "Pushups", 30, "Workout").await;
    add_timer(&app, "Read", 600, "Study").await;
    add_timer(&app, "Squats", 45, "Workout").await;

    let (status, body) = call(&app, Method::GET, "/timers", None).await;
    assert_eq!(status, StatusCode::OK);

    let groups = body["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["category"], "Workout");
    assert_eq!(groups[0]["timers"].as_array().unwrap().len(), 2);

    let first = &groups[0]["timers"][0];
    assert_eq!(first["name"], "Pushups");
    assert_eq!(first["remainingTime"], 30);
    assert_eq!(first["status"], "Paused");
    assert_eq!(first["display"], "00:30");
    assert_eq!(body["running"], 0);
}

#[tokio::test]
async fn invalid_timer_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (state, app, _store) = setup(dir.path());

    let (status, body) = call(
        &app,
        Method::POST,
        "/timers",
        Some(json!({ "name": "Pushups", "duration": 0, "category": "Workout" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = call(
        &app,
        Method::POST,
        "/timers",
        Some(json!({ "name": "Stretch", "duration": 60, "category": "Other" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for duration in [json!(1.5), json!("thirty"), json!(null)] {
        let (status, body) = call(
            &app,
            Method::POST,
            "/timers",
            Some(json!({ "name": "Pushups", "duration": duration, "category": "Workout" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "duration {}", duration);
        assert_eq!(body["status"], "error");
        let message = body["message"].as_str().unwrap().to_lowercase();
        assert!(message.contains("duration"), "{}", body);
    }

    let (status, body) = call(&app, Method::POST, "/timers", Some(json!({ "name": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    assert!(state.timers().is_empty());

    let (status, body) = call(
        &app,
        Method::POST,
        "/timers",
        Some(json!({ "name": "Pushups", "duration": "30", "category": "Workout" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["duration"], 30);
}

#[tokio::test]
async fn custom_category_via_other() {
    let dir = tempfile::tempdir().unwrap();
    let (_state, app, _store) = setup(dir.path());

    let (status, body) = call(
        &app,
        Method::POST,
        "/timers",
        Some(json!({
            "name": "Stretch",
            "duration": 60,
            "category": "Other",
            "customCategory": "Yoga"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["category"], "Yoga");

    let (_, body) = call(&app, Method::GET, "/categories", None).await;
    assert_eq!(body["predefined"], json!(["Workout", "Study", "Break", "Other"]));
    assert_eq!(body["in_use"], json!(["Yoga"]));
}

#[tokio::test]
async fn single_timer_controls() {
    let dir = tempfile::tempdir().unwrap();
    let (state, app, _store) = setup(dir.path());
    let id = add_timer(&app, "Plank", 90, "Workout").await;

    let (status, body) = call(&app, Method::POST, &format!("/timers/{}/start", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["status"], "Running");

    let (status, body) = call(&app, Method::POST, &format!("/timers/{}/start", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_change");
    assert_eq!(body["data"]["status"], "Running");

    state.tick();

    let (_, body) = call(&app, Method::POST, &format!("/timers/{}/pause", id), None).await;
    assert_eq!(body["data"]["status"], "Paused");
    assert_eq!(body["data"]["remainingTime"], 89);

    let (_, body) = call(&app, Method::POST, &format!("/timers/{}/reset", id), None).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["status"], "Paused");
    assert_eq!(body["data"]["remainingTime"], 90);

    let (_, body) = call(&app, Method::POST, &format!("/timers/{}/pause", id), None).await;
    assert_eq!(body["status"], "no_change");

    let (status, _) = call(&app, Method::POST, "/timers/unknown/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_pause_in_study() {
    let dir = tempfile::tempdir().unwrap();
    let (state, app, _store) = setup(dir.path());
    let running = add_timer(&app, "Read", 120, "Study").await;
    let paused = add_timer(&app, "Notes", 120, "Study").await;

    call(&app, Method::POST, &format!("/timers/{}/start", running), None).await;
    state.tick();

    let (status, body) = call(&app, Method::POST, "/categories/Study/Pause", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], 1);

    let a = state.timer(&running).unwrap();
    let b = state.timer(&paused).unwrap();
    assert_eq!(a.status, TimerStatus::Paused);
    assert_eq!(a.remaining_time, 119);
    assert_eq!(b.status, TimerStatus::Paused);
    assert_eq!(b.remaining_time, 120);

    let (status, _) = call(&app, Method::POST, "/categories/Study/explode", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_filter_clear_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let (state, app, store) = setup(dir.path());

    let (_, body) = call(&app, Method::POST, "/history/export", None).await;
    assert_eq!(body["status"], "no_data");
    assert_eq!(body["data"]["outcome"], "nothing_to_export");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    for (name, category) in [("a", "Study"), ("b", "Workout"), ("c", "Study")] {
        add_timer(&app, name, 1, category).await;
    }
    call(&app, Method::POST, "/categories/Study/start", None).await;
    call(&app, Method::POST, "/categories/Workout/start", None).await;
    let report = state.tick();
    assert_eq!(report.completed.len(), 3);

    let (_, body) = call(&app, Method::GET, "/history", None).await;
    assert_eq!(body["category"], "All");
    assert_eq!(body["records"].as_array().unwrap().len(), 3);

    let (_, body) = call(&app, Method::GET, "/history?category=Study", None).await;
    let study = body["records"].as_array().unwrap();
    assert_eq!(study.len(), 2);
    assert!(study.iter().all(|r| r["category"] == "Study"));

    let (_, body) = call(&app, Method::GET, "/history/categories", None).await;
    assert_eq!(body[0], "All");
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = call(&app, Method::POST, "/history/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 3);
    let exported = std::path::PathBuf::from(body["data"]["path"].as_str().unwrap());
    let file_name = exported.file_name().unwrap().to_str().unwrap().to_string();
    assert!(file_name.starts_with("Timer_History_"));
    assert!(!file_name.contains(':'));

    state.flush().await.unwrap();
    assert!(store.snapshot(HISTORY_KEY).is_some());

    let (status, _) = call(&app, Method::DELETE, "/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, Method::GET, "/history", None).await;
    assert!(body["records"].as_array().unwrap().is_empty());
    assert_eq!(store.snapshot(HISTORY_KEY), None);
}

#[tokio::test]
async fn activate_reloads_from_disk() {
    let data = tempfile::tempdir().unwrap();
    let exports = tempfile::tempdir().unwrap();
    let settings = StateSettings {
        export_dir: exports.path().to_path_buf(),
        ..StateSettings::default()
    };

    let first = Arc::new(AppState::new(
        Arc::new(FileStore::new(data.path())),
        settings.clone(),
    ));
    let app = create_router(Arc::clone(&first));
    let id = add_timer(&app, "Pushups", 30, "Workout").await;
    call(&app, Method::POST, &format!("/timers/{}/start", id), None).await;
    first.tick();
    first.flush().await.unwrap();
    assert!(data.path().join(format!("{}.json", TIMERS_KEY)).exists());

    let second = Arc::new(AppState::new(Arc::new(FileStore::new(data.path())), settings));
    let app = create_router(Arc::clone(&second));
    let (status, body) = call(&app, Method::POST, "/activate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["timers"], 1);

    let (_, body) = call(&app, Method::GET, "/status", None).await;
    assert_eq!(body["timers"], 1);
    assert_eq!(body["running"], 1);
    assert_eq!(body["countdown_armed"], true);
    assert_eq!(second.timer(&id).unwrap().remaining_time, 29);
}

#[tokio::test]
async fn health_reports_version() {
    let dir = tempfile::tempdir().unwrap();
    let (_state, app, _store) = setup(dir.path());
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn timer_stream_sends_snapshot_then_completions() {
    let dir = tempfile::tempdir().unwrap();
    let (state, app, _store) = setup(dir.path());
    let id = add_timer(&app, "Blink", 1, "Break").await;

    let request = Request::builder()
        .uri("/timers/stream")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut frames = response.into_body().into_data_stream();
    let first = frames.next().await.unwrap().unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert!(first.contains("event: snapshot"), "{}", first);
    assert!(first.contains("Blink"));

    state.start_timer(&id).unwrap();
    state.tick();

    let mut seen = String::new();
    let wait = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !seen.contains("event: completed") {
            let frame = frames.next().await.unwrap().unwrap();
            seen.push_str(&String::from_utf8(frame.to_vec()).unwrap());
        }
    });
    wait.await.expect("completion notice");
    assert!(seen.contains("Congratulations! You completed Blink"));
}
