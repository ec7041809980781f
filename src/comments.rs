//! Evaluator comment mining: research insights vs. product issues, and the
//! comment-to-audio-file export.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::args::CommentsArgs;
use crate::evaluation::{Evaluation, load_evaluations};

const PRODUCT_INDICATORS: &[&str] = &[
    "재생", "품질", "갈라짐", "깨짐", "튕김", "짤림", "끊김", "로봇", "기계", "볼륨", "소리", "음성", "리버브",
    "스킵", "클리핑", "노이즈", "재생 안됨", "음질", "처음", "마지막", "리서치", "리포트", "공유",
];

const RESEARCH_INDICATORS: &[&str] = &[
    "감정", "해피", "화", "슬픔", "더", "덜", "강함", "약함", "레퍼런스가 더", "타겟이 더", "오히려", "반대",
    "다름", "비슷", "동일", "차이", "효과", "표현", "자연", "부자연",
];

const HIGH_SEVERITY: &[&str] = &["재생 안됨", "심각", "문제 많음", "로봇음성되어버림"];
const MEDIUM_SEVERITY: &[&str] = &["갈라짐", "깨짐", "품질 문제", "부자연스러움"];

fn hits(text: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| text.contains(*w)).count()
}

fn any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResearchCategory {
    ReferenceComparison,
    EmotionExpression,
    IntensityScale,
    TextAlignment,
    GeneralQuality,
}

impl ResearchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchCategory::ReferenceComparison => "reference_comparison",
            ResearchCategory::EmotionExpression => "emotion_expression",
            ResearchCategory::IntensityScale => "intensity_scale",
            ResearchCategory::TextAlignment => "text_alignment",
            ResearchCategory::GeneralQuality => "general_quality",
        }
    }

    pub fn of(comment: &str) -> Self {
        let c = comment.to_lowercase();
        if any(&c, &["레퍼런스가 더", "레퍼런스보다", "오히려"]) {
            ResearchCategory::ReferenceComparison
        } else if any(&c, &["감정", "해피", "화", "슬픔"]) {
            ResearchCategory::EmotionExpression
        } else if any(&c, &["스케일", "강함", "약함", "톤"]) {
            ResearchCategory::IntensityScale
        } else if any(&c, &["텍스트", "스크립트", "상반", "반대"]) {
            ResearchCategory::TextAlignment
        } else {
            ResearchCategory::GeneralQuality
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueType {
    PlaybackFailure,
    AudioClipping,
    AudioArtifacts,
    RoboticVoice,
    VolumeIssues,
    AudioQuality,
    TechnicalOther,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::PlaybackFailure => "playback_failure",
            IssueType::AudioClipping => "audio_clipping",
            IssueType::AudioArtifacts => "audio_artifacts",
            IssueType::RoboticVoice => "robotic_voice",
            IssueType::VolumeIssues => "volume_issues",
            IssueType::AudioQuality => "audio_quality",
            IssueType::TechnicalOther => "technical_other",
        }
    }

    pub fn of(comment: &str) -> Self {
        let c = comment.to_lowercase();
        if any(&c, &["재생 안됨", "재생이 안됨"]) {
            IssueType::PlaybackFailure
        } else if any(&c, &["스킵", "짤림", "끊김"]) {
            IssueType::AudioClipping
        } else if any(&c, &["갈라짐", "깨짐", "튕김"]) {
            IssueType::AudioArtifacts
        } else if any(&c, &["로봇", "기계"]) {
            IssueType::RoboticVoice
        } else if any(&c, &["볼륨", "소리", "작게", "크게"]) {
            IssueType::VolumeIssues
        } else if any(&c, &["리버브", "에코", "음질"]) {
            IssueType::AudioQuality
        } else {
            IssueType::TechnicalOther
        }
    }

    fn is_audio(&self) -> bool {
        self.as_str().contains("audio")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn of(comment: &str) -> Self {
        let c = comment.to_lowercase();
        if any(&c, HIGH_SEVERITY) {
            Severity::High
        } else if any(&c, MEDIUM_SEVERITY) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Research,
    Product,
}

/// Product indicators win outright; otherwise any research hit makes it research.
pub fn classify(comment: &str) -> CommentKind {
    let c = comment.to_lowercase();
    let product = hits(&c, PRODUCT_INDICATORS);
    let research = hits(&c, RESEARCH_INDICATORS);
    if product > research {
        CommentKind::Product
    } else if research > 0 {
        CommentKind::Research
    } else {
        CommentKind::Product
    }
}

#[derive(Debug, Clone)]
pub struct Insight {
    pub sample_id: String,
    pub session_id: String,
    pub comment: String,
    pub category: ResearchCategory,
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub sample_id: String,
    pub session_id: String,
    pub comment: String,
    pub issue_type: IssueType,
    pub severity: Severity,
}

#[derive(Debug, Default)]
pub struct CommentInsights {
    pub research: Vec<Insight>,
    pub product: Vec<Issue>,
}

pub fn extract(evals: &[Evaluation]) -> CommentInsights {
    let mut out = CommentInsights::default();
    for e in evals.iter().filter(|e| e.has_comment()) {
        let comment = e.comment.as_deref().unwrap_or_default().trim().to_string();
        match classify(&comment) {
            CommentKind::Research => out.research.push(Insight {
                sample_id: e.sample_id.clone(),
                session_id: e.session_id.clone(),
                category: ResearchCategory::of(&comment),
                comment,
            }),
            CommentKind::Product => out.product.push(Issue {
                sample_id: e.sample_id.clone(),
                session_id: e.session_id.clone(),
                issue_type: IssueType::of(&comment),
                severity: Severity::of(&comment),
                comment,
            }),
        }
    }
    out
}

fn heading(name: &str) -> String {
    name.to_uppercase().replace('_', " ")
}

pub fn render(insights: &CommentInsights) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== RESEARCH INSIGHTS SUMMARY ===")?;
    writeln!(out, "Total research insights: {}", insights.research.len())?;

    let mut by_category: BTreeMap<ResearchCategory, Vec<&Insight>> = BTreeMap::new();
    for i in &insights.research {
        by_category.entry(i.category).or_default().push(i);
    }
    for (category, items) in &by_category {
        writeln!(out)?;
        writeln!(out, "{} ({} instances):", heading(category.as_str()), items.len())?;
        for i in items.iter().take(3) {
            writeln!(out, "  - {}: {}", i.sample_id, i.comment)?;
        }
        if items.len() > 3 {
            writeln!(out, "  ... and {} more", items.len() - 3)?;
        }
    }

    writeln!(out)?;
    writeln!(out, "=== PRODUCT TEAM ACTION ITEMS ===")?;
    writeln!(out, "Total product issues: {}", insights.product.len())?;

    let mut by_type: BTreeMap<IssueType, BTreeMap<Severity, Vec<&Issue>>> = BTreeMap::new();
    for i in &insights.product {
        by_type
            .entry(i.issue_type)
            .or_default()
            .entry(i.severity)
            .or_default()
            .push(i);
    }
    for (issue_type, severities) in &by_type {
        writeln!(out)?;
        writeln!(out, "{}:", heading(issue_type.as_str()))?;
        for severity in Severity::ALL {
            let Some(items) = severities.get(&severity) else {
                continue;
            };
            writeln!(out, "  {} PRIORITY ({} issues):", heading(severity.as_str()), items.len())?;
            for i in items.iter().take(2) {
                writeln!(out, "    - {}: {}", i.sample_id, i.comment)?;
            }
            if items.len() > 2 {
                writeln!(out, "    ... and {} more", items.len() - 2)?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "=== ACTIONABLE RECOMMENDATIONS ===")?;
    writeln!(out)?;
    writeln!(out, "RESEARCH FINDINGS:")?;
    let count_cat = |c: ResearchCategory| insights.research.iter().filter(|i| i.category == c).count();
    let emotion = count_cat(ResearchCategory::EmotionExpression);
    if emotion > 0 {
        writeln!(out, "  - Emotion Expression: {} evaluations indicate emotion effectiveness issues", emotion)?;
        writeln!(out, "    -> Analyze emotion scale boundaries and implementation methods")?;
    }
    let reference = count_cat(ResearchCategory::ReferenceComparison);
    if reference > 0 {
        writeln!(out, "  - Reference Comparison: {} cases where reference outperformed target", reference)?;
        writeln!(out, "    -> Question expressivity 0.6 parameter effectiveness")?;
    }

    writeln!(out)?;
    writeln!(out, "PRODUCT TEAM PRIORITIES:")?;
    let high: Vec<&Issue> = insights.product.iter().filter(|i| i.severity == Severity::High).collect();
    if !high.is_empty() {
        writeln!(out, "  HIGH PRIORITY: {} critical audio issues", high.len())?;
        let mut critical: BTreeMap<IssueType, usize> = BTreeMap::new();
        for i in &high {
            *critical.entry(i.issue_type).or_default() += 1;
        }
        for (t, n) in critical {
            writeln!(out, "    -> {}: {} instances", t.as_str().replace('_', " "), n)?;
        }
    }
    let playback = insights
        .product
        .iter()
        .filter(|i| i.issue_type == IssueType::PlaybackFailure)
        .count();
    if playback > 0 {
        writeln!(out, "  INFRASTRUCTURE: {} playback failures require investigation", playback)?;
    }
    let audio = insights.product.iter().filter(|i| i.issue_type.is_audio()).count();
    if audio > 0 {
        writeln!(out, "  AUDIO PIPELINE: {} rendering/quality issues need attention", audio)?;
    }
    Ok(out)
}

/// One commented evaluation with the reference and target files it most likely refers to.
#[derive(Debug, Serialize, PartialEq)]
pub struct CommentedFile {
    pub sample_id: String,
    pub session_type: String,
    pub emotion: String,
    pub text_category: String,
    pub scale: String,
    pub reference_audio_file: String,
    pub target_audio_file: String,
    pub user_comment: String,
    pub timestamp: String,
    pub evaluation_duration_ms: String,
}

fn raw_scale(sample_id: &str) -> String {
    let id = sample_id.trim();
    let id = id.strip_suffix(".wav").unwrap_or(id);
    id.split('_').nth(4).unwrap_or_default().to_string()
}

pub fn commented_files(evals: &[Evaluation]) -> Vec<CommentedFile> {
    let mut unparsed = 0;
    let rows: Vec<CommentedFile> = evals
        .iter()
        .filter(|e| e.has_comment())
        .filter_map(|e| {
            let Some(key) = e.key.as_ref() else {
                unparsed += 1;
                return None;
            };
            let scale = raw_scale(&e.sample_id);
            let base = format!("{}_{}_{}_{}", key.voice, key.emotion, key.text_category, key.number);
            Some(CommentedFile {
                sample_id: e.sample_id.clone(),
                session_type: format!("expressivity_{}", e.expressivity.as_deref().unwrap_or("unknown")),
                emotion: key.emotion.clone(),
                text_category: key.text_category.clone(),
                reference_audio_file: format!("{}_ref.wav", base),
                target_audio_file: format!("{}_scale_{}.wav", base, scale),
                scale,
                user_comment: e.comment.as_deref().unwrap_or_default().trim().to_string(),
                timestamp: e.timestamp.clone().unwrap_or_default(),
                evaluation_duration_ms: e.duration_ms.clone().unwrap_or_else(|| "N/A".to_string()),
            })
        })
        .collect();
    if unparsed > 0 {
        warn!("{} commented rows have a sample_id that does not parse, skipped", unparsed);
    }
    rows
}

pub fn write_commented_files(path: &Path, rows: &[CommentedFile]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn run(args: CommentsArgs) -> anyhow::Result<()> {
    let evals = load_evaluations(&args.input)?;
    info!("Processing {} evaluations...", evals.len());
    fs::create_dir_all(&args.out_dir)?;

    let insights = extract(&evals);
    let text = render(&insights)?;
    let report_path = args.out_dir.join("comment_insights_report.txt");
    fs::write(&report_path, &text)?;
    println!("{}", text);
    info!("Report written to {}", report_path.display());

    let rows = commented_files(&evals);
    let csv_path = args.out_dir.join("comments_with_audio_files.csv");
    write_commented_files(&csv_path, &rows)?;
    info!("{} comments with audio file references saved to {}", rows.len(), csv_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Scores;

    fn commented(sample: &str, session: &str, comment: &str) -> Evaluation {
        Evaluation::new(sample, session, Scores::default()).with_comment(comment)
    }

    #[test]
    fn product_wins_when_it_has_more_hits() {
        assert_eq!(classify("재생 안됨"), CommentKind::Product);
        assert_eq!(classify("감정 표현이 더 강함"), CommentKind::Research);
        assert_eq!(classify("ok"), CommentKind::Product);
    }

    #[test]
    fn categories_follow_priority_order() {
        assert_eq!(ResearchCategory::of("오히려 감정이 약함"), ResearchCategory::ReferenceComparison);
        assert_eq!(ResearchCategory::of("슬픔이 잘 느껴짐"), ResearchCategory::EmotionExpression);
        assert_eq!(ResearchCategory::of("강함"), ResearchCategory::IntensityScale);
        assert_eq!(ResearchCategory::of("좋아요"), ResearchCategory::GeneralQuality);
        assert_eq!(IssueType::of("재생이 안됨"), IssueType::PlaybackFailure);
        assert_eq!(IssueType::of("끝이 짤림"), IssueType::AudioClipping);
        assert_eq!(IssueType::of("로봇 같음"), IssueType::RoboticVoice);
        assert_eq!(IssueType::of("???"), IssueType::TechnicalOther);
        assert_eq!(Severity::of("재생 안됨"), Severity::High);
        assert_eq!(Severity::of("소리 갈라짐"), Severity::Medium);
        assert_eq!(Severity::of("볼륨 작음"), Severity::Low);
    }

    #[test]
    fn report_groups_insights_and_issues() {
        let evals = vec![
            commented("v001_sad_match_1_1.5", "expressivity_none_a", "재생 안됨"),
            commented("v001_sad_match_1_2.0", "expressivity_none_a", "감정 표현이 더 강함"),
            Evaluation::new("v002_sad_match_1_2.0", "expressivity_none_a", Scores::default()),
        ];
        let insights = extract(&evals);
        assert_eq!(insights.research.len(), 1);
        assert_eq!(insights.product.len(), 1);
        let text = render(&insights).unwrap();
        assert!(text.contains("PLAYBACK FAILURE:"));
        assert!(text.contains("HIGH PRIORITY (1 issues)"));
        assert!(text.contains("EMOTION EXPRESSION (1 instances)"));
        assert!(text.contains("INFRASTRUCTURE: 1 playback failures"));
    }

    #[test]
    fn commented_rows_map_to_audio_files() {
        let evals = vec![
            commented("v001_sad_match_1_1.5", "expressivity_0.6_abc", "노이즈"),
            commented("broken", "expressivity_0.6_abc", "노이즈"),
            commented("v001_sad_match_1_2.0", "expressivity_0.6_abc", "  "),
        ];
        let rows = commented_files(&evals);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].evaluation_duration_ms, "N/A");
        assert_eq!(rows[0].session_type, "expressivity_0.6");
        assert_eq!(rows[0].reference_audio_file, "v001_sad_match_1_ref.wav");
        assert_eq!(rows[0].target_audio_file, "v001_sad_match_1_scale_1.5.wav");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_commented_files(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("sample_id,session_type,emotion"));
        assert!(text.contains("v001_sad_match_1_scale_1.5.wav"));
        assert!(text.lines().next().unwrap().ends_with(",timestamp,evaluation_duration_ms"));
    }

    #[test]
    fn exported_duration_is_carried_through() {
        let mut eval = commented("v002_fear_opposite_3_1.8", "expressivity_none_x", "끊김");
        eval.duration_ms = Some("15000".to_string());
        let rows = commented_files(&[eval]);
        assert_eq!(rows[0].evaluation_duration_ms, "15000");
    }
}
