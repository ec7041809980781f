//! The experiment matrix: voices × emotions × text categories × scales, for
//! each expressivity variant.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::sample::SampleDescriptor;
use crate::tts::{Emotion, SpeakRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expressivity {
    None,
    /// The `|0.6` stabiliser token appended to the request text.
    Stabilized,
}

impl Expressivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Expressivity::None => "none",
            Expressivity::Stabilized => "0.6",
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            Expressivity::None => text.to_string(),
            Expressivity::Stabilized => format!("{}|0.6", text),
        }
    }

    pub fn dir_name(&self) -> String {
        format!("expressivity_{}", self.as_str())
    }
}

impl fmt::Display for Expressivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Expressivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Expressivity::None),
            "0.6" => Ok(Expressivity::Stabilized),
            other => Err(format!("unknown expressivity '{}' (expected none or 0.6)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextCategory {
    Match,
    Neutral,
    Opposite,
}

impl TextCategory {
    pub const ALL: [TextCategory; 3] = [TextCategory::Match, TextCategory::Neutral, TextCategory::Opposite];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextCategory::Match => "match",
            TextCategory::Neutral => "neutral",
            TextCategory::Opposite => "opposite",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTexts {
    #[serde(rename = "match")]
    pub matching: String,
    pub neutral: String,
    pub opposite: String,
}

impl CategoryTexts {
    pub fn get(&self, category: TextCategory) -> &str {
        match category {
            TextCategory::Match => &self.matching,
            TextCategory::Neutral => &self.neutral,
            TextCategory::Opposite => &self.opposite,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionSpec {
    pub name: String,
    /// Set for learned emotion embeddings; absent for named labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_id: Option<String>,
    pub texts: CategoryTexts,
}

impl EmotionSpec {
    pub fn emotion(&self) -> Emotion {
        match &self.vector_id {
            Some(id) => Emotion::Vector(id.clone()),
            None => Emotion::Label(self.name.clone()),
        }
    }

    fn kind(&self) -> &'static str {
        if self.vector_id.is_some() {
            "emotion_vector"
        } else {
            "emotion_label"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Short voice name (`v001`) to vendor actor id.
    pub voices: BTreeMap<String, String>,
    pub emotions: Vec<EmotionSpec>,
    pub scales: Vec<f64>,
}

/// One file the generator should produce.
#[derive(Debug, Clone)]
pub struct PlannedSample {
    pub filename: String,
    pub output_path: PathBuf,
    pub request: SpeakRequest,
    pub descriptor: SampleDescriptor,
}

/// Whole scales keep one decimal (`1.0`), matching the generated file names.
pub fn format_scale(scale: f64) -> String {
    if scale.fract() == 0.0 {
        format!("{:.1}", scale)
    } else {
        format!("{}", scale)
    }
}

impl Catalog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&data)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        if catalog.voices.is_empty() || catalog.emotions.is_empty() || catalog.scales.is_empty() {
            anyhow::bail!("catalog {} needs at least one voice, emotion and scale", path.display());
        }
        Ok(catalog)
    }

    pub fn matrix_size(&self) -> usize {
        self.voices.len() * self.emotions.len() * TextCategory::ALL.len() * self.scales.len()
    }

    /// Expands the full matrix for one expressivity variant under `out_dir`.
    pub fn plan(&self, expressivity: Expressivity, out_dir: &Path) -> Vec<PlannedSample> {
        let mut planned = Vec::with_capacity(self.matrix_size());
        for emotion in &self.emotions {
            for (voice, actor_id) in &self.voices {
                for category in TextCategory::ALL {
                    let reference = reference_filename(expressivity, voice, &emotion.name, category);
                    for &scale in &self.scales {
                        let text = expressivity.apply(emotion.texts.get(category));
                        let request = SpeakRequest::new(text, actor_id, Some(emotion.emotion()), scale);
                        let name = format!(
                            "{}_{}_{}_scale_{}.wav",
                            voice,
                            emotion.name,
                            category.as_str(),
                            format_scale(scale)
                        );
                        let filename = format!("{}/{}", expressivity.dir_name(), name);
                        let descriptor = SampleDescriptor::generated(
                            &filename,
                            voice,
                            emotion.kind(),
                            Some(&emotion.name),
                            Some(category.as_str()),
                            Some(scale),
                            expressivity,
                        )
                        .with_reference(reference.clone());
                        planned.push(PlannedSample {
                            output_path: out_dir.join(&filename),
                            descriptor,
                            filename,
                            request,
                        });
                    }
                }
            }
        }
        planned
    }

    /// Neutral baselines: the same text as each emotional sample, spoken
    /// without an emotion at scale 1.0. One per voice, emotion and text category.
    pub fn plan_references(&self, expressivity: Expressivity, out_dir: &Path) -> Vec<PlannedSample> {
        let mut planned = Vec::with_capacity(self.voices.len() * self.emotions.len() * TextCategory::ALL.len());
        for (voice, actor_id) in &self.voices {
            for emotion in &self.emotions {
                for category in TextCategory::ALL {
                    let text = expressivity.apply(emotion.texts.get(category));
                    let filename = reference_filename(expressivity, voice, &emotion.name, category);
                    planned.push(PlannedSample {
                        output_path: out_dir.join(&filename),
                        descriptor: SampleDescriptor::generated(
                            &filename,
                            voice,
                            "reference",
                            Some(&emotion.name),
                            Some(category.as_str()),
                            Some(1.0),
                            expressivity,
                        ),
                        request: SpeakRequest::new(text, actor_id, None, 1.0),
                        filename,
                    });
                }
            }
        }
        planned
    }
}

/// `expressivity_{x}/{voice}_{emotion}_{textcat}_reference.wav`
pub fn reference_filename(expressivity: Expressivity, voice: &str, emotion: &str, category: TextCategory) -> String {
    format!(
        "{}/{}_{}_{}_reference.wav",
        expressivity.dir_name(),
        voice,
        emotion,
        category.as_str()
    )
}

fn texts(matching: &str, neutral: &str, opposite: &str) -> CategoryTexts {
    CategoryTexts {
        matching: matching.to_string(),
        neutral: neutral.to_string(),
        opposite: opposite.to_string(),
    }
}

fn label(name: &str, texts: CategoryTexts) -> EmotionSpec {
    EmotionSpec { name: name.to_string(), vector_id: None, texts }
}

fn vector(name: &str, id: &str, texts: CategoryTexts) -> EmotionSpec {
    EmotionSpec { name: name.to_string(), vector_id: Some(id.to_string()), texts }
}

impl Default for Catalog {
    fn default() -> Self {
        let voices = BTreeMap::from([
            ("v001".to_string(), "68c3cbbc39de69ffd6baad5f".to_string()),
            ("v002".to_string(), "68c3cbc04b464b622eb32355".to_string()),
        ]);

        let emotions = vec![
            label("angry", texts(
                "I can't believe you broke your promise again after everything we discussed!",
                "The meeting is scheduled for three o'clock in the conference room.",
                "Your thoughtfulness and kindness truly made my day so much better.",
            )),
            label("sad", texts(
                "I really miss the old days when everyone was still here together.",
                "The report needs to be submitted by Friday afternoon without fail.",
                "This is absolutely the best news I've heard all year long!",
            )),
            label("happy", texts(
                "I'm so thrilled about the wonderful surprise party you organized for me!",
                "Please remember to turn off the lights when you leave the office.",
                "Everything seems to be going wrong and nothing works out anymore.",
            )),
            label("whisper", texts(
                "Don't make any noise, everyone is sleeping in the next room.",
                "The quarterly financial report shows steady growth in all departments.",
                "Everyone needs to hear this important announcement right now!",
            )),
            label("toneup", texts(
                "Did you really win the grand prize in the competition?",
                "The train arrives at platform seven every hour on weekdays.",
                "Everything is perfectly calm and there's nothing to worry about here.",
            )),
            label("tonedown", texts(
                "Let me explain this matter in a very serious and professional manner.",
                "The document contains information about the new policy changes.",
                "This is so incredibly exciting and I can barely contain myself!",
            )),
            vector("excited", "68a6b0ca2edfc11a25045538", texts(
                "We're going on the adventure of a lifetime starting tomorrow morning!",
                "The temperature today is expected to reach seventy-two degrees.",
                "I'm too exhausted and drained to do anything at all today.",
            )),
            vector("furious", "68a6b0d9b436060efdc6bc82", texts(
                "This is absolutely unacceptable and I demand an explanation immediately!",
                "The library closes at eight o'clock on weekday evenings.",
                "I completely understand your position and I'm not upset at all.",
            )),
            vector("terrified", "68a6b0d2b436060efdc6bc80", texts(
                "Something is moving in the shadows and I don't know what it is!",
                "The coffee machine is located on the third floor break room.",
                "I feel completely safe and protected in this wonderful place.",
            )),
            vector("fear", "68a6b0f7b436060efdc6bc83", texts(
                "I'm really scared about what might happen if this goes wrong.",
                "The new software update will be installed next Tuesday morning.",
                "I have complete confidence that everything will work out perfectly.",
            )),
            vector("surprise", "68a6b10255e3b2836e609969", texts(
                "Oh my goodness, I never expected to see you here today!",
                "The parking lot is located behind the main building entrance.",
                "This is exactly what I predicted would happen all along.",
            )),
            vector("excitement", "68a6b1062edfc11a2504553b", texts(
                "I can hardly wait to share this amazing news with everyone!",
                "Please fill out the form and return it to the front desk.",
                "This is rather boring and I'm not interested in it at all.",
            )),
        ];

        Catalog {
            voices,
            emotions,
            scales: vec![1.0, 1.2, 1.4, 1.6, 1.8, 2.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matrix_has_432_samples_per_expressivity() {
        let catalog = Catalog::default();
        let plan = catalog.plan(Expressivity::Stabilized, Path::new("out"));
        assert_eq!(plan.len(), 432);
        assert_eq!(catalog.matrix_size(), 432);
    }

    #[test]
    fn planned_names_follow_sample_id_convention() {
        let catalog = Catalog::default();
        let plan = catalog.plan(Expressivity::Stabilized, Path::new("out"));
        let first = &plan[0];
        assert_eq!(first.filename, "expressivity_0.6/v001_angry_match_scale_1.0.wav");
        assert_eq!(first.output_path, Path::new("out/expressivity_0.6/v001_angry_match_scale_1.0.wav"));
        assert!(first.request.text.ends_with("|0.6"));
        assert_eq!(first.request.emotion_label.as_deref(), Some("angry"));
        assert!(first.request.emotion_vector_id.is_none());
    }

    #[test]
    fn vector_emotions_use_embedding_id() {
        let catalog = Catalog::default();
        let plan = catalog.plan(Expressivity::None, Path::new("out"));
        let excited = plan
            .iter()
            .find(|p| p.filename.contains("_excited_"))
            .expect("excited planned");
        assert!(excited.request.emotion_label.is_none());
        assert_eq!(excited.request.emotion_vector_id.as_deref(), Some("68a6b0ca2edfc11a25045538"));
        assert!(!excited.request.text.contains('|'));
    }

    #[test]
    fn references_carry_no_emotion() {
        let catalog = Catalog::default();
        let refs = catalog.plan_references(Expressivity::None, Path::new("out"));
        assert_eq!(refs.len(), 72);
        assert!(refs.iter().all(|r| r.request.emotion_label.is_none() && r.request.emotion_vector_id.is_none()));
        assert_eq!(refs[0].filename, "expressivity_none/v001_angry_match_reference.wav");
        assert_eq!(refs[0].descriptor.kind, "reference");
        assert_eq!(refs[0].descriptor.emotion.as_deref(), Some("angry"));
        assert!(refs[0].descriptor.reference.is_none());
    }

    #[test]
    fn every_sample_points_at_a_reference_with_its_own_text() {
        let catalog = Catalog::default();
        for expressivity in [Expressivity::None, Expressivity::Stabilized] {
            let refs = catalog.plan_references(expressivity, Path::new("out"));
            let by_name: BTreeMap<&str, &PlannedSample> = refs.iter().map(|r| (r.filename.as_str(), r)).collect();
            for sample in catalog.plan(expressivity, Path::new("out")) {
                let name = sample.descriptor.reference.as_deref().expect("reference set");
                let reference = by_name.get(name).expect("reference planned");
                assert_eq!(reference.request.text, sample.request.text);
                assert_eq!(reference.request.actor_id, sample.request.actor_id);
                assert_eq!(reference.descriptor.emotion, sample.descriptor.emotion);
            }
        }

        let sad_opposite = catalog
            .plan(Expressivity::Stabilized, Path::new("out"))
            .into_iter()
            .find(|p| p.filename == "expressivity_0.6/v002_sad_opposite_scale_1.4.wav")
            .expect("sample planned");
        assert_eq!(
            sad_opposite.descriptor.reference.as_deref(),
            Some("expressivity_0.6/v002_sad_opposite_reference.wav")
        );
    }

    #[test]
    fn scale_formatting() {
        assert_eq!(format_scale(1.0), "1.0");
        assert_eq!(format_scale(2.0), "2.0");
        assert_eq!(format_scale(1.4), "1.4");
    }

    #[test]
    fn expressivity_parses() {
        assert_eq!("none".parse::<Expressivity>().unwrap(), Expressivity::None);
        assert_eq!("0.6".parse::<Expressivity>().unwrap(), Expressivity::Stabilized);
        assert!("0.7".parse::<Expressivity>().is_err());
    }
}
