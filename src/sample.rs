//! Sample naming: descriptors in the metadata pool, and the
//! `{voice}_{emotion}_{textcat}_{num}_{scale}` convention evaluations are keyed by.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::catalog::Expressivity;

pub const EMOTION_LABELS: [&str; 6] = ["angry", "sad", "happy", "whisper", "toneup", "tonedown"];
pub const VECTOR_FIRST3: [&str; 3] = ["excited", "furious", "terrified"];
pub const VECTOR_LAST3: [&str; 3] = ["fear", "surprise", "excitement"];

static EXPRESSIVITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"expressivity_([^_]+)").expect("static regex"));

/// One entry of the sample metadata pool served by the evaluation app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDescriptor {
    /// Path relative to the voices directory.
    pub filename: String,
    #[serde(default)]
    pub voice_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressivity: Option<String>,
    /// Baseline clip for this sample, relative to the voices directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Anything else the pool file carries is passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SampleDescriptor {
    pub fn generated(
        filename: &str,
        voice: &str,
        kind: &str,
        emotion: Option<&str>,
        text_category: Option<&str>,
        scale: Option<f64>,
        expressivity: Expressivity,
    ) -> Self {
        SampleDescriptor {
            filename: filename.to_string(),
            voice_id: voice.to_string(),
            kind: kind.to_string(),
            emotion: emotion.map(str::to_string),
            text_category: text_category.map(str::to_string),
            scale,
            expressivity: Some(expressivity.as_str().to_string()),
            reference: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// The experimental dimensions encoded in an evaluated `sample_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleKey {
    pub voice: String,
    pub emotion: String,
    pub text_category: String,
    pub number: String,
    pub scale: Option<f64>,
}

impl SampleKey {
    pub fn parse(sample_id: &str) -> Option<SampleKey> {
        let id = sample_id.trim();
        let id = id.rsplit('/').next().unwrap_or(id);
        let id = id.strip_suffix(".wav").unwrap_or(id);
        let parts: Vec<&str> = id.split('_').collect();
        if parts.len() < 5 {
            return None;
        }
        Some(SampleKey {
            voice: parts[0].to_string(),
            emotion: parts[1].to_string(),
            text_category: parts[2].to_string(),
            number: parts[3].to_string(),
            scale: parts[4].parse::<f64>().ok().filter(|s| s.is_finite()),
        })
    }
}

/// Expressivity variant encoded in a session id (`..._expressivity_0.6_...`).
pub fn expressivity_of(session_id: &str) -> Option<String> {
    EXPRESSIVITY_RE
        .captures(session_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionType {
    Label,
    Vector,
}

impl EmotionType {
    pub fn of(emotion: &str) -> EmotionType {
        if EMOTION_LABELS.contains(&emotion) {
            EmotionType::Label
        } else {
            EmotionType::Vector
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionType::Label => "emotion_label",
            EmotionType::Vector => "emotion_vector",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmotionGroup {
    Labels,
    VectorFirst3,
    VectorLast3,
    Unknown,
}

impl EmotionGroup {
    pub const KNOWN: [EmotionGroup; 3] = [EmotionGroup::Labels, EmotionGroup::VectorFirst3, EmotionGroup::VectorLast3];

    pub fn of(emotion: &str) -> EmotionGroup {
        if EMOTION_LABELS.contains(&emotion) {
            EmotionGroup::Labels
        } else if VECTOR_FIRST3.contains(&emotion) {
            EmotionGroup::VectorFirst3
        } else if VECTOR_LAST3.contains(&emotion) {
            EmotionGroup::VectorLast3
        } else {
            EmotionGroup::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionGroup::Labels => "emotion_labels",
            EmotionGroup::VectorFirst3 => "vector_first3",
            EmotionGroup::VectorLast3 => "vector_last3",
            EmotionGroup::Unknown => "unknown",
        }
    }
}
