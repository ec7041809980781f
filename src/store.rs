//! Flat-file persistence: the sample metadata pool (JSON) and the
//! append-only result and session logs (JSON per line).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::sample::SampleDescriptor;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SamplePool {
    pub samples: Vec<SampleDescriptor>,
}

/// Local time in ISO-8601 without offset, e.g. `2025-09-15T10:04:31.123456`.
pub fn now_iso() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Accepts `{"samples": [...]}` or a bare array of descriptors.
pub fn load_pool(path: &Path) -> anyhow::Result<Vec<SampleDescriptor>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading sample metadata {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&data)
        .with_context(|| format!("parsing sample metadata {}", path.display()))?;
    let samples = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => serde_json::from_value::<SamplePool>(other)?.samples,
    };
    Ok(samples)
}

/// Writes the pool, merging by filename with whatever is already on disk.
pub fn save_pool(path: &Path, samples: &[SampleDescriptor]) -> anyhow::Result<usize> {
    let mut merged: BTreeMap<String, SampleDescriptor> = BTreeMap::new();
    if path.exists() {
        for s in load_pool(path)? {
            merged.insert(s.filename.clone(), s);
        }
    }
    for s in samples {
        merged.insert(s.filename.clone(), s.clone());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let pool = SamplePool {
        samples: merged.into_values().collect(),
    };
    let data = serde_json::to_string_pretty(&pool)?;
    fs::write(path, data).with_context(|| format!("writing sample metadata {}", path.display()))?;
    Ok(pool.samples.len())
}

pub async fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut f = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    f.write_all(line.as_bytes()).await?;
    f.flush().await?;
    Ok(())
}

async fn read_if_exists(path: &Path) -> anyhow::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Parsed lines of a JSONL file; blank and unparseable lines are skipped.
pub async fn read_jsonl(path: &Path) -> anyhow::Result<Vec<serde_json::Value>> {
    let data = read_if_exists(path).await?;
    Ok(data
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}

pub async fn count_lines(path: &Path) -> anyhow::Result<usize> {
    let data = read_if_exists(path).await?;
    Ok(data.lines().filter(|l| !l.trim().is_empty()).count())
}

/// Creates the file if it is missing, leaving existing content alone.
pub fn touch(path: &Path) -> anyhow::Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn jsonl_roundtrip_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_jsonl(&path, &json!({"a": 1})).await.unwrap();
        let mut data = fs::read_to_string(&path).unwrap();
        data.push_str("\nnot json\n");
        fs::write(&path, data).unwrap();
        append_jsonl(&path, &json!({"a": 2})).await.unwrap();

        let rows = read_jsonl(&path).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["a"], 2);
        assert_eq!(count_lines(&path).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_jsonl(&dir.path().join("none.jsonl")).await.unwrap().is_empty());
        assert_eq!(count_lines(&dir.path().join("none.jsonl")).await.unwrap(), 0);
    }

    #[test]
    fn pool_merges_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta/sample_metadata.json");
        let a: SampleDescriptor = serde_json::from_value(json!({"filename": "a.wav", "voice_id": "v001", "type": "reference"})).unwrap();
        let b: SampleDescriptor = serde_json::from_value(json!({"filename": "b.wav", "voice_id": "v002", "type": "emotion_label"})).unwrap();
        assert_eq!(save_pool(&path, &[a.clone()]).unwrap(), 1);
        assert_eq!(save_pool(&path, &[a, b]).unwrap(), 2);
        let pool = load_pool(&path).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[1].voice_id, "v002");
    }

    #[test]
    fn pool_accepts_bare_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        fs::write(&path, r#"[{"filename":"x.wav","voice_id":"v001","type":"style"}]"#).unwrap();
        let pool = load_pool(&path).unwrap();
        assert_eq!(pool[0].kind, "style");
    }
}
