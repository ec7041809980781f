use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::store;
use crate::sample::SampleDescriptor;
use axum::{Json, extract::State};
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

const REQUIRED_FIELDS: [&str; 3] = ["session_id", "sample_id", "scores"];
const REQUIRED_SCORES: [&str; 3] = ["quality", "emotion", "similarity"];

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    samples_loaded: usize,
    timestamp: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        samples_loaded: state.pool.len(),
        timestamp: store::now_iso(),
    })
}

/// `None` for reference samples. Otherwise the clip named in the descriptor,
/// falling back to the per-voice `_ref_{type}` clip for older pools.
pub fn reference_url(sample: &SampleDescriptor) -> Option<String> {
    if let Some(reference) = sample.reference.as_deref().filter(|_| sample.kind != "reference") {
        return Some(format!("/audio/{}", reference));
    }
    match sample.kind.as_str() {
        "reference" => None,
        "style" => Some(format!("/audio/{}_ref_styles.wav", sample.voice_id)),
        other => Some(format!("/audio/{}_ref_{}.wav", sample.voice_id, other)),
    }
}

fn session_sample(sample: &SampleDescriptor, session_id: &str, index: usize) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(sample)?;
    if let Value::Object(map) = &mut value {
        map.insert("session_sample_id".into(), json!(format!("{}_{}", session_id, index)));
        map.insert("audio_url".into(), json!(format!("/audio/{}", sample.filename)));
        map.insert("reference_url".into(), json!(reference_url(sample)));
    }
    Ok(value)
}

#[derive(Serialize)]
struct SessionLogEntry<'a> {
    session_id: &'a str,
    timestamp: String,
    sample_count: usize,
    sample_ids: Vec<&'a str>,
}

pub async fn get_session_samples(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let session_id = Uuid::new_v4().to_string();
    let chosen: Vec<&SampleDescriptor> = {
        let mut rng = rand::thread_rng();
        let amount = state.session_size.min(state.pool.len());
        state.pool.choose_multiple(&mut rng, amount).collect()
    };

    let samples = chosen
        .iter()
        .enumerate()
        .map(|(i, s)| session_sample(s, &session_id, i))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let entry = SessionLogEntry {
        session_id: &session_id,
        timestamp: store::now_iso(),
        sample_count: chosen.len(),
        sample_ids: chosen.iter().map(|s| s.filename.as_str()).collect(),
    };
    {
        let _guard = state.lock.lock().await;
        store::append_jsonl(&state.paths.session_log, &entry).await?;
    }
    info!("Session {} started with {} samples", session_id, samples.len());

    Ok(Json(json!({
        "session_id": session_id,
        "total": samples.len(),
        "samples": samples,
    })))
}

/// Checks required fields in order, then each score for presence and range.
pub fn validate_result(body: &Map<String, Value>) -> Result<(), ApiError> {
    for field in REQUIRED_FIELDS {
        if !body.contains_key(field) {
            return Err(ApiError::BadRequest(format!("Missing required field: {}", field)));
        }
    }
    let scores = &body["scores"];
    for score in REQUIRED_SCORES {
        let Some(value) = scores.get(score) else {
            return Err(ApiError::BadRequest(format!("Missing score: {}", score)));
        };
        let valid = value.as_f64().is_some_and(|v| (1.0..=7.0).contains(&v));
        if !valid {
            return Err(ApiError::BadRequest(format!("Invalid score for {}: must be 1-7", score)));
        }
    }
    Ok(())
}

fn object_body(body: &mut Value) -> Result<&mut Map<String, Value>, ApiError> {
    body.as_object_mut()
        .ok_or_else(|| ApiError::BadRequest("Request body must be a JSON object".to_string()))
}

pub async fn save_result(State(state): State<AppState>, Json(mut body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let fields = object_body(&mut body)?;
    validate_result(fields)?;
    fields.insert("timestamp".into(), json!(store::now_iso()));

    {
        let _guard = state.lock.lock().await;
        store::append_jsonl(&state.paths.results, &body).await?;
    }

    Ok(Json(json!({ "status": "success", "message": "Result saved" })))
}

/// Session ids become file names, so only `[A-Za-z0-9_-]` is accepted.
pub fn is_safe_session_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub async fn save_session(State(state): State<AppState>, Json(mut body): Json<Value>) -> Result<Json<Value>, ApiError> {
    let fields = object_body(&mut body)?;
    let session_id = match fields.get("session_id") {
        None => return Err(ApiError::BadRequest("Missing required field: session_id".to_string())),
        Some(Value::String(id)) if is_safe_session_id(id) => id.clone(),
        Some(_) => return Err(ApiError::BadRequest("Invalid session_id".to_string())),
    };
    fields.insert("completed_at".into(), json!(store::now_iso()));

    let path = state.paths.data_dir.join(format!("session_{}.json", session_id));
    let data = serde_json::to_string_pretty(&body).map_err(anyhow::Error::from)?;
    tokio::fs::write(&path, data).await.map_err(anyhow::Error::from)?;
    info!("Session {} saved", session_id);

    Ok(Json(json!({
        "status": "success",
        "message": "Session saved",
        "file": path.display().to_string(),
    })))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Coverage {
    pub evaluated_samples: usize,
    pub unevaluated_samples: usize,
    pub percentage: f64,
    pub avg_evals_per_sample: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Stats {
    pub total_samples: usize,
    pub sessions_completed: usize,
    pub total_evaluations: usize,
    pub coverage: Coverage,
}

fn round_to(value: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (value * f).round() / f
}

pub fn compute_stats(total_samples: usize, results: &[Value], sessions_completed: usize) -> Stats {
    let mut per_sample: HashMap<&str, usize> = HashMap::new();
    for r in results {
        let id = r.get("sample_id").and_then(Value::as_str).unwrap_or("");
        *per_sample.entry(id).or_default() += 1;
    }
    let evaluated = per_sample.len();
    let total_evaluations = results.len();
    let percentage = if total_samples > 0 {
        round_to(evaluated as f64 / total_samples as f64 * 100.0, 1)
    } else {
        0.0
    };
    let avg = if evaluated > 0 {
        round_to(total_evaluations as f64 / evaluated as f64, 2)
    } else {
        0.0
    };
    Stats {
        total_samples,
        sessions_completed,
        total_evaluations,
        coverage: Coverage {
            evaluated_samples: evaluated,
            unevaluated_samples: total_samples.saturating_sub(evaluated),
            percentage,
            avg_evals_per_sample: avg,
        },
    }
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    let results = store::read_jsonl(&state.paths.results).await?;
    let sessions = store::count_lines(&state.paths.session_log).await?;
    Ok(Json(compute_stats(state.pool.len(), &results, sessions)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: &str) -> SampleDescriptor {
        SampleDescriptor {
            filename: "v001_sad_match_1_1.5.wav".to_string(),
            voice_id: "v001".to_string(),
            kind: kind.to_string(),
            emotion: None,
            text_category: None,
            scale: None,
            expressivity: None,
            reference: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn reference_url_follows_sample_type() {
        assert_eq!(reference_url(&descriptor("reference")), None);
        assert_eq!(reference_url(&descriptor("style")).as_deref(), Some("/audio/v001_ref_styles.wav"));
        assert_eq!(
            reference_url(&descriptor("emotion_label")).as_deref(),
            Some("/audio/v001_ref_emotion_label.wav")
        );
    }

    #[test]
    fn reference_url_prefers_descriptor_reference() {
        let mut sample = descriptor("emotion_label");
        sample.reference = Some("expressivity_0.6/v001_sad_match_reference.wav".to_string());
        assert_eq!(
            reference_url(&sample).as_deref(),
            Some("/audio/expressivity_0.6/v001_sad_match_reference.wav")
        );

        let mut baseline = descriptor("reference");
        baseline.reference = Some("other.wav".to_string());
        assert_eq!(reference_url(&baseline), None);
    }

    #[test]
    fn session_sample_carries_urls() {
        let v = session_sample(&descriptor("emotion_vector"), "abc", 3).unwrap();
        assert_eq!(v["session_sample_id"], "abc_3");
        assert_eq!(v["audio_url"], "/audio/v001_sad_match_1_1.5.wav");
        assert_eq!(v["type"], "emotion_vector");
    }

    fn message(r: Result<(), ApiError>) -> String {
        r.unwrap_err().to_string()
    }

    #[test]
    fn validation_messages() {
        let body = |v: Value| v.as_object().unwrap().clone();
        assert_eq!(
            message(validate_result(&body(json!({"session_id": "s", "scores": {}})))),
            "Missing required field: sample_id"
        );
        assert_eq!(
            message(validate_result(&body(json!({"session_id": "s", "sample_id": "x", "scores": {"quality": 3}})))),
            "Missing score: emotion"
        );
        assert_eq!(
            message(validate_result(&body(
                json!({"session_id": "s", "sample_id": "x", "scores": {"quality": 8, "emotion": 3, "similarity": 3}})
            ))),
            "Invalid score for quality: must be 1-7"
        );
        assert_eq!(
            message(validate_result(&body(
                json!({"session_id": "s", "sample_id": "x", "scores": {"quality": 2, "emotion": "5", "similarity": 3}})
            ))),
            "Invalid score for emotion: must be 1-7"
        );
        assert!(
            validate_result(&body(
                json!({"session_id": "s", "sample_id": "x", "scores": {"quality": 1, "emotion": 7, "similarity": 4.5}})
            ))
            .is_ok()
        );
    }

    #[test]
    fn session_ids_are_restricted() {
        assert!(is_safe_session_id("3f2a-b_9"));
        assert!(!is_safe_session_id(""));
        assert!(!is_safe_session_id("../etc"));
        assert!(!is_safe_session_id("a b"));
    }

    #[test]
    fn stats_round_and_count() {
        let results = vec![
            json!({"sample_id": "a"}),
            json!({"sample_id": "a"}),
            json!({"sample_id": "b"}),
        ];
        let s = compute_stats(3, &results, 2);
        assert_eq!(s.total_evaluations, 3);
        assert_eq!(s.sessions_completed, 2);
        assert_eq!(s.coverage.evaluated_samples, 2);
        assert_eq!(s.coverage.unevaluated_samples, 1);
        assert_eq!(s.coverage.percentage, 66.7);
        assert_eq!(s.coverage.avg_evals_per_sample, 1.5);

        let empty = compute_stats(0, &[], 0);
        assert_eq!(empty.coverage.percentage, 0.0);
        assert_eq!(empty.coverage.avg_evals_per_sample, 0.0);
    }
}
