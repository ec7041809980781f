use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tower::ServiceExt; // for oneshot
use tts_qa::args::ServeArgs;
use tts_qa::catalog::{Catalog, Expressivity};
use tts_qa::sample::SampleDescriptor;
use tts_qa::server::state::{AppState, DataPaths};
use tts_qa::server::{prepare_data_dir, routes};

fn pool(n: usize) -> Vec<SampleDescriptor> {
    (0..n)
        .map(|i| {
            SampleDescriptor::generated(
                &format!("expressivity_none/v00{}_sad_match_scale_{}.wav", i % 3, i),
                &format!("v00{}", i % 3),
                if i % 2 == 0 { "emotion_label" } else { "style" },
                Some("sad"),
                Some("match"),
                Some(1.0),
                Expressivity::None,
            )
        })
        .collect()
}

fn app(root: &Path, samples: usize) -> (Router, DataPaths) {
    let args = ServeArgs {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_dir: root.join("data"),
        voices_dir: None,
        static_dir: root.join("static"),
        session_size: 25,
    };
    let paths = DataPaths::from_args(&args);
    prepare_data_dir(&paths).unwrap();
    fs::create_dir_all(&paths.static_dir).unwrap();
    fs::write(paths.static_dir.join("index.html"), "<html>eval</html>").unwrap();
    fs::write(paths.voices_dir.join("v001_ref_style.wav"), b"RIFF").unwrap();
    let state = AppState::new(pool(samples), paths.clone(), args.session_size);
    (routes::create_router(state), paths)
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(app: &Router, uri: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn valid_result(sample: &str) -> Value {
    json!({
        "session_id": "s-1",
        "sample_id": sample,
        "scores": {"quality": 5, "emotion": 4, "similarity": 6.5},
        "comment": "",
    })
}

#[tokio::test]
async fn startup_creates_logs_and_health_reports_pool() {
    let dir = tempfile::tempdir().unwrap();
    let (app, paths) = app(dir.path(), 30);
    assert!(paths.results.exists());
    assert!(paths.session_log.exists());

    let response = get(&app, "/api/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["samples_loaded"], 30);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn session_draws_distinct_samples_and_logs_them() {
    let dir = tempfile::tempdir().unwrap();
    let (app, paths) = app(dir.path(), 30);

    let body = body_json(get(&app, "/api/get-session-samples").await).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(session_id.len(), 36);
    assert_eq!(body["total"], 25);

    let samples = body["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 25);
    let filenames: HashSet<&str> = samples.iter().map(|s| s["filename"].as_str().unwrap()).collect();
    assert_eq!(filenames.len(), 25);
    for (i, s) in samples.iter().enumerate() {
        assert_eq!(s["session_sample_id"], format!("{}_{}", session_id, i));
        assert_eq!(s["audio_url"], format!("/audio/{}", s["filename"].as_str().unwrap()));
        assert!(s.get("reference").is_none());
        let voice = s["voice_id"].as_str().unwrap();
        let expected = match s["type"].as_str().unwrap() {
            "style" => format!("/audio/{}_ref_styles.wav", voice),
            other => format!("/audio/{}_ref_{}.wav", voice, other),
        };
        assert_eq!(s["reference_url"], expected);
    }

    let log = fs::read_to_string(&paths.session_log).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let entry: Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(entry["session_id"], session_id);
    assert_eq!(entry["sample_count"], 25);
    assert_eq!(entry["sample_ids"].as_array().unwrap().len(), 25);
}

#[tokio::test]
async fn generated_pool_links_each_sample_to_its_reference() {
    let dir = tempfile::tempdir().unwrap();
    let (_, paths) = app(dir.path(), 0);
    let catalog = Catalog::default();
    let samples: Vec<SampleDescriptor> = catalog
        .plan(Expressivity::Stabilized, &paths.voices_dir)
        .into_iter()
        .take(3)
        .map(|p| p.descriptor)
        .collect();
    let state = AppState::new(samples, paths.clone(), 25);
    let app = routes::create_router(state);

    let body = body_json(get(&app, "/api/get-session-samples").await).await;
    for s in body["samples"].as_array().unwrap() {
        let filename = s["filename"].as_str().unwrap();
        let expected = filename
            .split("_scale_")
            .next()
            .map(|stem| format!("/audio/{}_reference.wav", stem))
            .unwrap();
        assert_eq!(s["reference_url"], expected);
    }
}

#[tokio::test]
async fn small_pool_returns_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path(), 3);
    let body = body_json(get(&app, "/api/get-session-samples").await).await;
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn save_result_validates_and_appends() {
    let dir = tempfile::tempdir().unwrap();
    let (app, paths) = app(dir.path(), 5);

    let response = post(&app, "/api/save-result", json!({"session_id": "s", "scores": {}})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing required field: sample_id");

    let mut bad = valid_result("a.wav");
    bad["scores"]["similarity"] = json!(0);
    let response = post(&app, "/api/save-result", bad).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid score for similarity: must be 1-7");
    assert_eq!(fs::read_to_string(&paths.results).unwrap(), "");

    let response = post(&app, "/api/save-result", valid_result("a.wav")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Result saved");

    let saved: Value = serde_json::from_str(fs::read_to_string(&paths.results).unwrap().trim()).unwrap();
    assert_eq!(saved["sample_id"], "a.wav");
    assert!(saved["timestamp"].is_string());
}

#[tokio::test]
async fn concurrent_saves_append_whole_lines() {
    let dir = tempfile::tempdir().unwrap();
    let (app, paths) = app(dir.path(), 5);

    let requests: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let mut result = valid_result(&format!("s{}.wav", i));
                result["comment"] = json!("x".repeat(2048));
                post(&app, "/api/save-result", result).await.status()
            })
        })
        .collect();
    for r in requests {
        assert_eq!(r.await.unwrap(), StatusCode::OK);
    }

    let log = fs::read_to_string(&paths.results).unwrap();
    let ids: HashSet<String> = log
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["sample_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 16);
    let body = body_json(get(&app, "/api/stats").await).await;
    assert_eq!(body["total_evaluations"], 16);
}

#[tokio::test]
async fn save_session_writes_file_and_rejects_unsafe_ids() {
    let dir = tempfile::tempdir().unwrap();
    let (app, paths) = app(dir.path(), 5);

    let response = post(&app, "/api/save-session", json!({"session_id": "abc-123", "results": []})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Session saved");

    let file = paths.data_dir.join("session_abc-123.json");
    assert_eq!(body["file"], file.display().to_string());
    let saved: Value = serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert!(saved["completed_at"].is_string());

    let response = post(&app, "/api/save-session", json!({"session_id": "../escape"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = post(&app, "/api/save-session", json!({"results": []})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_reflect_sessions_and_results() {
    let dir = tempfile::tempdir().unwrap();
    let (app, paths) = app(dir.path(), 4);

    get(&app, "/api/get-session-samples").await;
    post(&app, "/api/save-result", valid_result("a.wav")).await;
    post(&app, "/api/save-result", valid_result("a.wav")).await;
    post(&app, "/api/save-result", valid_result("b.wav")).await;
    // stray lines are skipped
    let mut log = fs::read_to_string(&paths.results).unwrap();
    log.push_str("\nnot json\n\n");
    fs::write(&paths.results, log).unwrap();

    let body = body_json(get(&app, "/api/stats").await).await;
    assert_eq!(body["total_samples"], 4);
    assert_eq!(body["sessions_completed"], 1);
    assert_eq!(body["total_evaluations"], 3);
    assert_eq!(body["coverage"]["evaluated_samples"], 2);
    assert_eq!(body["coverage"]["unevaluated_samples"], 2);
    assert_eq!(body["coverage"]["percentage"], 50.0);
    assert_eq!(body["coverage"]["avg_evals_per_sample"], 1.5);
}

#[tokio::test]
async fn serves_index_and_audio() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = app(dir.path(), 1);

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<html>eval</html>");

    assert_eq!(get(&app, "/audio/v001_ref_style.wav").await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/audio/missing.wav").await.status(), StatusCode::NOT_FOUND);
}
