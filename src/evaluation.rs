//! Loading evaluator results exported as CSV (`current_evaluations.csv`).

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::sample::{SampleKey, expressivity_of};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scores {
    pub quality: Option<f64>,
    pub emotion: Option<f64>,
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Quality,
    Emotion,
    Similarity,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Quality, Metric::Emotion, Metric::Similarity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Quality => "quality",
            Metric::Emotion => "emotion",
            Metric::Similarity => "similarity",
        }
    }
}

impl Scores {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Quality => self.quality,
            Metric::Emotion => self.emotion,
            Metric::Similarity => self.similarity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub sample_id: String,
    pub session_id: String,
    pub scores: Scores,
    pub comment: Option<String>,
    pub timestamp: Option<String>,
    /// Time the evaluator spent on the sample, as exported.
    pub duration_ms: Option<String>,
    pub key: Option<SampleKey>,
    pub expressivity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Row {
    sample_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    scores: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    duration_ms: Option<String>,
}

/// `Ok(None)` when the key is absent, `Err(())` when it is present but not a
/// finite number or numeric string.
fn score_value(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<Option<f64>, ()> {
    let Some(v) = map.get(key) else {
        return Ok(None);
    };
    let value = match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|f| f.is_finite()).map(Some).ok_or(())
}

/// Parses the JSON score blob. Anything malformed, including a single bad
/// score, yields all-missing scores.
pub fn parse_scores(raw: &str) -> Scores {
    let cleaned = raw.replace("\"\"", "\"");
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(&cleaned) else {
        return Scores::default();
    };
    scores_from(&map).unwrap_or_default()
}

fn scores_from(map: &serde_json::Map<String, serde_json::Value>) -> Result<Scores, ()> {
    Ok(Scores {
        quality: score_value(map, "quality")?,
        emotion: score_value(map, "emotion")?,
        similarity: score_value(map, "similarity")?,
    })
}

impl Evaluation {
    pub fn new(sample_id: &str, session_id: &str, scores: Scores) -> Self {
        Evaluation {
            sample_id: sample_id.to_string(),
            session_id: session_id.to_string(),
            scores,
            comment: None,
            timestamp: None,
            duration_ms: None,
            key: SampleKey::parse(sample_id),
            expressivity: expressivity_of(session_id),
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn has_comment(&self) -> bool {
        self.comment
            .as_deref()
            .map(|c| !c.trim().is_empty() && c.trim() != "nan")
            .unwrap_or(false)
    }
}

pub fn read_evaluations<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<Evaluation>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut out = Vec::new();
    let mut malformed = 0usize;
    for (i, row) in rdr.deserialize::<Row>().enumerate() {
        let row = row.with_context(|| format!("CSV record {}", i + 1))?;
        let sample_id = row.sample_id.unwrap_or_default();
        let session_id = row.session_id.unwrap_or_default();
        let scores = row.scores.as_deref().map(parse_scores).unwrap_or_default();
        if scores == Scores::default() {
            malformed += 1;
        }
        let mut eval = Evaluation::new(&sample_id, &session_id, scores);
        eval.comment = row.comment.filter(|c| !c.trim().is_empty());
        eval.timestamp = row.timestamp;
        eval.duration_ms = row.duration_ms.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        out.push(eval);
    }
    if malformed > 0 {
        warn!("{} rows had no parseable scores", malformed);
    }
    Ok(out)
}

pub fn load_evaluations(path: &Path) -> anyhow::Result<Vec<Evaluation>> {
    let f = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let evals = read_evaluations(f)?;
    info!("Loaded {} evaluations from {}", evals.len(), path.display());
    let unkeyed = evals.iter().filter(|e| e.key.is_none()).count();
    if unkeyed > 0 {
        warn!("{} rows have a sample_id that does not parse and are left out of grouped views", unkeyed);
    }
    Ok(evals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_doubled_quotes() {
        let s = parse_scores(r#"{"quality": 5, "emotion": 4.5, "similarity": "6"}"#);
        assert_eq!(s.quality, Some(5.0));
        assert_eq!(s.emotion, Some(4.5));
        assert_eq!(s.similarity, Some(6.0));

        let s = parse_scores(r#"{""quality"": 3, ""emotion"": 2, ""similarity"": 1}"#);
        assert_eq!(s.quality, Some(3.0));
    }

    #[test]
    fn malformed_scores_are_missing() {
        assert_eq!(parse_scores("not json"), Scores::default());
        assert_eq!(parse_scores("[1,2,3]"), Scores::default());
        assert_eq!(parse_scores(r#"{"quality": null, "emotion": 4, "similarity": 5}"#), Scores::default());
        assert_eq!(parse_scores(r#"{"quality": "abc", "emotion": 4, "similarity": 5}"#), Scores::default());
        assert_eq!(parse_scores(r#"{"quality": 3, "emotion": [4], "similarity": 5}"#), Scores::default());
    }

    #[test]
    fn absent_score_only_blanks_itself() {
        let s = parse_scores(r#"{"quality": 6, "emotion": "4"}"#);
        assert_eq!(s.quality, Some(6.0));
        assert_eq!(s.emotion, Some(4.0));
        assert_eq!(s.similarity, None);
    }

    #[test]
    fn reads_csv_with_quoted_json() {
        let data = "\
id,session_id,sample_id,scores,comment,timestamp
1,expressivity_0.6_s1,v001_angry_match_scale_1.2,\"{\"\"quality\"\": 6, \"\"emotion\"\": 5, \"\"similarity\"\": 4}\",좋음,2025-09-01T10:00:00
2,expressivity_none_s2,v002_fear_neutral_scale_2.0,broken,,2025-09-01T10:01:00
";
        let evals = read_evaluations(data.as_bytes()).unwrap();
        assert_eq!(evals.len(), 2);
        assert_eq!(evals[0].scores.quality, Some(6.0));
        assert_eq!(evals[0].expressivity.as_deref(), Some("0.6"));
        assert_eq!(evals[0].key.as_ref().unwrap().scale, Some(1.2));
        assert!(evals[0].has_comment());
        assert_eq!(evals[1].scores, Scores::default());
        assert!(!evals[1].has_comment());
        assert_eq!(evals[1].expressivity.as_deref(), Some("none"));
        assert!(evals[0].duration_ms.is_none());
    }

    #[test]
    fn duration_column_is_optional() {
        let data = "\
session_id,sample_id,scores,comment,timestamp,duration_ms
expressivity_none_s1,v001_sad_match_1_1.5,\"{\"\"quality\"\": 4}\",느림,2025-09-01T10:00:00,15000
expressivity_none_s1,v001_sad_match_1_2.0,\"{\"\"quality\"\": 5}\",,2025-09-01T10:01:00,
";
        let evals = read_evaluations(data.as_bytes()).unwrap();
        assert_eq!(evals[0].duration_ms.as_deref(), Some("15000"));
        assert!(evals[1].duration_ms.is_none());
    }
}
