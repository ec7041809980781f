//! Client for the vendor TTS batch API.
//!
//! Generation is asynchronous on the vendor side and always takes four calls:
//! submit a batch, poll until every job is `done`, resolve the CDN URL of the
//! chosen audio variant, then download the bytes from the CDN.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// The two mutually exclusive ways the vendor accepts an emotion.
#[derive(Debug, Clone, PartialEq)]
pub enum Emotion {
    Label(String),
    Vector(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub actor_id: String,
    pub tempo: u32,
    pub pitch: i32,
    pub style_label: String,
    pub style_label_version: String,
    pub emotion_scale: f64,
    pub lang: String,
    pub mode: String,
    pub retake: bool,
    pub bp_c_l: bool,
    pub adjust_lastword: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_vector_id: Option<String>,
}

impl SpeakRequest {
    pub fn new(text: impl Into<String>, actor_id: &str, emotion: Option<Emotion>, scale: f64) -> Self {
        let (emotion_label, emotion_vector_id) = match emotion {
            Some(Emotion::Label(label)) => (Some(label), None),
            Some(Emotion::Vector(id)) => (None, Some(id)),
            None => (None, None),
        };
        SpeakRequest {
            text: text.into(),
            actor_id: actor_id.to_string(),
            tempo: 1,
            pitch: 0,
            style_label: "normal-1".to_string(),
            style_label_version: "v1".to_string(),
            emotion_scale: scale,
            lang: "auto".to_string(),
            mode: "one-vocoder".to_string(),
            retake: true,
            bp_c_l: true,
            adjust_lastword: 0,
            emotion_label,
            emotion_vector_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    result: SubmitResult,
}

#[derive(Debug, Deserialize)]
struct SubmitResult {
    #[serde(default)]
    speak_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    result: Vec<SpeakResult>,
}

#[derive(Debug, Deserialize)]
struct CdnResponse {
    result: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpeakResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub audio: AudioVariants,
}

impl SpeakResult {
    pub fn is_done(&self) -> bool {
        self.status == "done"
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AudioVariants {
    pub url: Option<String>,
    pub hd1: Option<AudioLink>,
    pub high: Option<AudioLink>,
    pub low: Option<AudioLink>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AudioLink {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioQuality {
    Hd1,
    High,
    Standard,
    Low,
}

impl AudioQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::Hd1 => "hd1",
            AudioQuality::High => "high",
            AudioQuality::Standard => "standard",
            AudioQuality::Low => "low",
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the best available variant: hd1, then high, then the plain url, then low.
pub fn best_audio_url(result: &SpeakResult) -> Option<(String, AudioQuality)> {
    let link = |l: &Option<AudioLink>| l.as_ref().and_then(|l| l.url.clone()).filter(|u| !u.is_empty());
    let audio = &result.audio;
    if let Some(url) = link(&audio.hd1) {
        return Some((url, AudioQuality::Hd1));
    }
    if let Some(url) = link(&audio.high) {
        return Some((url, AudioQuality::High));
    }
    if let Some(url) = audio.url.clone().filter(|u| !u.is_empty()) {
        return Some((url, AudioQuality::Standard));
    }
    link(&audio.low).map(|url| (url, AudioQuality::Low))
}

/// Drops a leading `Bearer` scheme (with or without the token after it) and
/// surrounding whitespace.
fn bare_token(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => raw,
    }
}

#[derive(Debug, Clone)]
pub struct TtsClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    poll_attempts: usize,
    poll_interval: Duration,
}

impl TtsClient {
    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        let token = bare_token(token).to_string();
        if token.is_empty() {
            anyhow::bail!("TTS API token is empty");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(TtsClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            poll_attempts: 30,
            poll_interval: Duration::from_secs(3),
        })
    }

    pub fn with_polling(mut self, attempts: usize, interval: Duration) -> Self {
        self.poll_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    /// Step 1: submit the batch, returning one speak URL per request.
    pub async fn submit_batch(&self, requests: &[SpeakRequest]) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/api/speak/batch/post", self.base_url);
        debug!("Submitting {} requests to {}", requests.len(), url);
        let res: SubmitResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(requests)
            .send()
            .await
            .context("submitting TTS batch")?
            .error_for_status()?
            .json()
            .await
            .context("decoding batch submit response")?;

        if res.result.speak_urls.is_empty() {
            anyhow::bail!("TTS API returned no speak URLs");
        }
        info!("Generation requested, got {} speak URLs", res.result.speak_urls.len());
        Ok(res.result.speak_urls)
    }

    /// Step 2: poll the batch status until every job reports `done`.
    pub async fn poll_batch(&self, speak_urls: &[String]) -> anyhow::Result<Vec<SpeakResult>> {
        let url = format!("{}/api/speak/batch/get", self.base_url);
        for attempt in 1..=self.poll_attempts {
            let res: PollResponse = self
                .http
                .post(&url)
                .bearer_auth(&self.token)
                .json(speak_urls)
                .send()
                .await
                .context("polling TTS batch")?
                .error_for_status()?
                .json()
                .await
                .context("decoding batch status response")?;

            let done = res.result.iter().filter(|r| r.is_done()).count();
            debug!("Poll attempt {}: {}/{} done", attempt, done, res.result.len());
            if !res.result.is_empty() && done == res.result.len() {
                return Ok(res.result);
            }
            if attempt < self.poll_attempts {
                sleep(self.poll_interval).await;
            }
        }
        warn!("Polling gave up after {} attempts", self.poll_attempts);
        anyhow::bail!("TTS generation timed out after {} poll attempts", self.poll_attempts)
    }

    /// Step 3: exchange a vendor audio URL for its CDN download URL.
    pub async fn resolve_download_url(&self, audio_url: &str) -> anyhow::Result<String> {
        let url = format!("{}/cloudfront", audio_url.trim_end_matches('/'));
        let res: CdnResponse = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("resolving CDN URL")?
            .error_for_status()?
            .json()
            .await
            .context("decoding CDN URL response")?;
        res.result
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("CDN response for {} had no URL", audio_url))
    }

    /// Step 4: fetch the audio bytes. The CDN URL is pre-signed, so no auth header.
    pub async fn download(&self, download_url: &str) -> anyhow::Result<Vec<u8>> {
        let bytes = self
            .http
            .get(download_url)
            .send()
            .await
            .context("downloading audio")?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(json: serde_json::Value) -> SpeakResult {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn hd1_wins_over_everything() {
        let r = result(serde_json::json!({
            "status": "done",
            "audio": {"url": "std", "hd1": {"url": "hd"}, "high": {"url": "hi"}, "low": {"url": "lo"}}
        }));
        assert_eq!(best_audio_url(&r), Some(("hd".to_string(), AudioQuality::Hd1)));
    }

    #[test]
    fn falls_back_through_variants() {
        let r = result(serde_json::json!({"status": "done", "audio": {"url": "std", "low": {"url": "lo"}}}));
        assert_eq!(best_audio_url(&r), Some(("std".to_string(), AudioQuality::Standard)));

        let r = result(serde_json::json!({"status": "done", "audio": {"hd1": {}, "low": {"url": "lo"}}}));
        assert_eq!(best_audio_url(&r), Some(("lo".to_string(), AudioQuality::Low)));

        let r = result(serde_json::json!({"status": "done"}));
        assert_eq!(best_audio_url(&r), None);
    }

    #[test]
    fn request_serialises_exactly_one_emotion_field() {
        let req = SpeakRequest::new("hi", "actor", Some(Emotion::Label("sad".into())), 1.2);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["emotion_label"], "sad");
        assert!(v.get("emotion_vector_id").is_none());
        assert_eq!(v["emotion_scale"], 1.2);
        assert_eq!(v["mode"], "one-vocoder");

        let req = SpeakRequest::new("hi", "actor", None, 1.0);
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("emotion_label").is_none());
        assert!(v.get("emotion_vector_id").is_none());
    }

    #[test]
    fn token_prefix_is_stripped() {
        assert!(TtsClient::new("http://x", "Bearer abc").is_ok());
        assert!(TtsClient::new("http://x", "  ").is_err());
        assert!(TtsClient::new("http://x", "Bearer ").is_err());
        assert!(TtsClient::new("http://x", "  Bearer   ").is_err());
    }

    #[test]
    fn bare_token_keeps_only_the_credential() {
        assert_eq!(bare_token("Bearer abc"), "abc");
        assert_eq!(bare_token("  Bearer \tabc  "), "abc");
        assert_eq!(bare_token("Bearer"), "");
        assert_eq!(bare_token("abc"), "abc");
        assert_eq!(bare_token("Bearerabc"), "Bearerabc");
    }
}
