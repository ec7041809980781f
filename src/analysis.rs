//! Score aggregation across the experimental dimensions, and the scale
//! trade-off analyses built on top of it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use tracing::info;

use crate::args::{AnalyzeArgs, ReportKind};
use crate::catalog::format_scale;
use crate::evaluation::{Evaluation, Metric, load_evaluations};
use crate::sample::{EmotionGroup, EmotionType};
use crate::stats::{Summary, elbow_point, mean, step_rates};
use crate::{chart, report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Voice,
    Emotion,
    TextCategory,
    Scale,
    Expressivity,
    EmotionType,
    EmotionGroup,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Voice,
        Dimension::Emotion,
        Dimension::TextCategory,
        Dimension::Scale,
        Dimension::Expressivity,
        Dimension::EmotionType,
        Dimension::EmotionGroup,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Voice => "voice",
            Dimension::Emotion => "emotion",
            Dimension::TextCategory => "text_category",
            Dimension::Scale => "scale",
            Dimension::Expressivity => "expressivity",
            Dimension::EmotionType => "emotion_type",
            Dimension::EmotionGroup => "emotion_group",
        }
    }

    pub fn value(&self, e: &Evaluation) -> Option<String> {
        match self {
            Dimension::Expressivity => e.expressivity.clone(),
            Dimension::Voice => e.key.as_ref().map(|k| k.voice.clone()),
            Dimension::Emotion => e.key.as_ref().map(|k| k.emotion.clone()),
            Dimension::TextCategory => e.key.as_ref().map(|k| k.text_category.clone()),
            Dimension::Scale => e.key.as_ref().and_then(|k| k.scale).map(format_scale),
            Dimension::EmotionType => e.key.as_ref().map(|k| EmotionType::of(&k.emotion).as_str().to_string()),
            Dimension::EmotionGroup => e.key.as_ref().map(|k| EmotionGroup::of(&k.emotion).as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSummaries {
    pub quality: Summary,
    pub emotion: Summary,
    pub similarity: Summary,
}

impl MetricSummaries {
    pub fn of<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Evaluation> + Clone,
    {
        MetricSummaries {
            quality: Summary::of(rows.clone().into_iter().map(|e| e.scores.quality)),
            emotion: Summary::of(rows.clone().into_iter().map(|e| e.scores.emotion)),
            similarity: Summary::of(rows.into_iter().map(|e| e.scores.similarity)),
        }
    }

    pub fn get(&self, metric: Metric) -> &Summary {
        match metric {
            Metric::Quality => &self.quality,
            Metric::Emotion => &self.emotion,
            Metric::Similarity => &self.similarity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub key: Vec<String>,
    pub rows: usize,
    pub metrics: MetricSummaries,
}

/// Numeric where both sides parse as numbers, lexical otherwise.
fn compare_component(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn compare_keys(a: &[String], b: &[String]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_component(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Groups evaluations by the given dimensions. Rows missing any dimension are dropped.
pub fn group_summaries(evals: &[Evaluation], dims: &[Dimension]) -> Vec<GroupRow> {
    let mut groups: BTreeMap<Vec<String>, Vec<&Evaluation>> = BTreeMap::new();
    for e in evals {
        let key: Option<Vec<String>> = dims.iter().map(|d| d.value(e)).collect();
        if let Some(key) = key {
            groups.entry(key).or_default().push(e);
        }
    }
    let mut rows: Vec<GroupRow> = groups
        .into_iter()
        .map(|(key, members)| GroupRow {
            key,
            rows: members.len(),
            metrics: MetricSummaries::of(members.iter().copied()),
        })
        .collect();
    rows.sort_by(|a, b| compare_keys(&a.key, &b.key));
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalePoint {
    pub scale: f64,
    pub count: usize,
    pub quality: Option<f64>,
    pub emotion: Option<f64>,
    pub similarity: Option<f64>,
}

impl ScalePoint {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Quality => self.quality,
            Metric::Emotion => self.emotion,
            Metric::Similarity => self.similarity,
        }
    }
}

/// Mean scores per scale, ascending by scale.
pub fn scale_curve<'a>(evals: impl IntoIterator<Item = &'a Evaluation>) -> Vec<ScalePoint> {
    let mut by_scale: Vec<(f64, Vec<&Evaluation>)> = Vec::new();
    for e in evals {
        let Some(scale) = e.key.as_ref().and_then(|k| k.scale) else {
            continue;
        };
        match by_scale.iter_mut().find(|(s, _)| *s == scale) {
            Some((_, members)) => members.push(e),
            None => by_scale.push((scale, vec![e])),
        }
    }
    by_scale.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    by_scale
        .into_iter()
        .map(|(scale, members)| {
            let m = MetricSummaries::of(members.iter().copied());
            ScalePoint {
                scale,
                count: members.len(),
                quality: m.quality.mean,
                emotion: m.emotion.mean,
                similarity: m.similarity.mean,
            }
        })
        .collect()
}

/// Expressivity variants present, `none` and `0.6` first.
pub fn expressivities(evals: &[Evaluation]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for e in evals {
        if let Some(x) = &e.expressivity {
            if !found.contains(x) {
                found.push(x.clone());
            }
        }
    }
    let rank = |x: &str| match x {
        "none" => 0,
        "0.6" => 1,
        _ => 2,
    };
    found.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));
    found
}

fn with_expressivity<'a>(evals: &'a [Evaluation], x: &'a str) -> impl Iterator<Item = &'a Evaluation> + Clone {
    evals.iter().filter(move |e| e.expressivity.as_deref() == Some(x))
}

#[derive(Debug, Clone)]
pub struct TradeOff {
    pub expressivity: String,
    pub points: Vec<ScalePoint>,
    /// Last scale before mean quality first drops under the threshold.
    pub quality_threshold_scale: Option<f64>,
    pub avg_decline_rate: f64,
    pub elbow_scale: Option<f64>,
    pub recommended_max_scale: Option<f64>,
}

pub fn trade_off_for(expressivity: &str, points: Vec<ScalePoint>, threshold: f64) -> TradeOff {
    let (scales, quality): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter_map(|p| p.quality.map(|q| (p.scale, q)))
        .unzip();

    let quality_threshold_scale = quality
        .iter()
        .position(|q| *q < threshold)
        .map(|i| if i > 0 { scales[i - 1] } else { scales[i] });

    let declines: Vec<f64> = step_rates(&scales, &quality).into_iter().map(|r| -r).collect();
    let avg_decline_rate = mean(&declines).unwrap_or(0.0);
    let elbow_scale = elbow_point(&scales, &quality);

    let recommended_max_scale = match (quality_threshold_scale, elbow_scale) {
        (Some(t), Some(e)) => Some(t.min(e)),
        (Some(t), None) => Some(t),
        (None, Some(e)) => Some(e),
        (None, None) => scales.iter().copied().reduce(f64::max),
    };

    TradeOff {
        expressivity: expressivity.to_string(),
        points,
        quality_threshold_scale,
        avg_decline_rate,
        elbow_scale,
        recommended_max_scale,
    }
}

pub fn trade_off(evals: &[Evaluation], threshold: f64) -> Vec<TradeOff> {
    expressivities(evals)
        .iter()
        .map(|x| trade_off_for(x, scale_curve(with_expressivity(evals, x)), threshold))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressivityDiff {
    pub scale: f64,
    pub quality_diff: Option<f64>,
    pub emotion_diff: Option<f64>,
}

pub fn interpret_diff(diff: f64) -> &'static str {
    if diff > 0.1 {
        "0.6 Better"
    } else if diff < -0.1 {
        "0.6 Worse"
    } else {
        "Similar"
    }
}

fn diff(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

fn paired_points(none: &[ScalePoint], six: &[ScalePoint]) -> Vec<(ScalePoint, ScalePoint)> {
    none.iter()
        .filter_map(|n| six.iter().find(|s| s.scale == n.scale).map(|s| (n.clone(), s.clone())))
        .collect()
}

/// `0.6 - none` per scale, for scales evaluated under both variants.
pub fn expressivity_comparison(evals: &[Evaluation]) -> Vec<ExpressivityDiff> {
    let none = scale_curve(with_expressivity(evals, "none"));
    let six = scale_curve(with_expressivity(evals, "0.6"));
    paired_points(&none, &six)
        .into_iter()
        .map(|(n, s)| ExpressivityDiff {
            scale: n.scale,
            quality_diff: diff(s.quality, n.quality),
            emotion_diff: diff(s.emotion, n.emotion),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct GroupRange {
    pub group: EmotionGroup,
    pub expressivity: String,
    pub points: Vec<ScalePoint>,
    pub peak_scale: Option<f64>,
    pub peak_emotion: Option<f64>,
    /// Highest scale whose mean quality stays at or above the threshold.
    pub max_quality_scale: Option<f64>,
    /// `(from, to, emotion gain per scale unit)`.
    pub improvements: Vec<(f64, f64, f64)>,
    pub plateau_scale: Option<f64>,
}

fn group_range(group: EmotionGroup, expressivity: &str, points: Vec<ScalePoint>, threshold: f64) -> GroupRange {
    let mut peak: Option<(f64, f64)> = None;
    for p in &points {
        if let Some(em) = p.emotion {
            if peak.is_none_or(|(_, best)| em > best) {
                peak = Some((p.scale, em));
            }
        }
    }

    let max_quality_scale = points
        .iter()
        .filter(|p| p.quality.is_some_and(|q| q >= threshold))
        .map(|p| p.scale)
        .reduce(f64::max);

    let (scales, emotions): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter_map(|p| p.emotion.map(|em| (p.scale, em)))
        .unzip();
    let improvements: Vec<(f64, f64, f64)> = step_rates(&scales, &emotions)
        .into_iter()
        .enumerate()
        .map(|(i, rate)| (scales[i], scales[i + 1], rate))
        .collect();
    let plateau_scale = improvements.iter().find(|(_, _, r)| *r < 0.1).map(|(_, to, _)| *to);

    GroupRange {
        group,
        expressivity: expressivity.to_string(),
        points,
        peak_scale: peak.map(|p| p.0),
        peak_emotion: peak.map(|p| p.1),
        max_quality_scale,
        improvements,
        plateau_scale,
    }
}

fn in_group<'a>(evals: &'a [Evaluation], group: EmotionGroup) -> impl Iterator<Item = &'a Evaluation> + Clone {
    evals
        .iter()
        .filter(move |e| e.key.as_ref().is_some_and(|k| EmotionGroup::of(&k.emotion) == group))
}

pub fn emotion_group_ranges(evals: &[Evaluation], threshold: f64) -> Vec<GroupRange> {
    let mut out = Vec::new();
    for group in EmotionGroup::KNOWN {
        for x in expressivities(evals) {
            let points = scale_curve(in_group(evals, group).filter(|e| e.expressivity.as_deref() == Some(x.as_str())));
            if points.is_empty() {
                continue;
            }
            out.push(group_range(group, &x, points, threshold));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupWinner {
    pub group: EmotionGroup,
    pub scale: f64,
    pub emotion_diff: f64,
    pub quality_diff: f64,
    pub winner: &'static str,
}

pub fn pick_winner(emotion_diff: f64, quality_diff: f64) -> &'static str {
    if emotion_diff > 0.3 && quality_diff > -0.3 {
        "0.6 strong"
    } else if emotion_diff > 0.1 && quality_diff > -0.5 {
        "0.6"
    } else if emotion_diff < -0.3 || quality_diff < -0.5 {
        "none"
    } else {
        "similar"
    }
}

/// Per emotion group and scale, whether the 0.6 stabiliser beat no expressivity.
pub fn group_expressivity_winners(evals: &[Evaluation]) -> Vec<GroupWinner> {
    let mut out = Vec::new();
    for group in EmotionGroup::KNOWN {
        let none = scale_curve(in_group(evals, group).filter(|e| e.expressivity.as_deref() == Some("none")));
        let six = scale_curve(in_group(evals, group).filter(|e| e.expressivity.as_deref() == Some("0.6")));
        for (n, s) in paired_points(&none, &six) {
            if let (Some(emotion_diff), Some(quality_diff)) = (diff(s.emotion, n.emotion), diff(s.quality, n.quality)) {
                out.push(GroupWinner {
                    group,
                    scale: n.scale,
                    emotion_diff,
                    quality_diff,
                    winner: pick_winner(emotion_diff, quality_diff),
                });
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClippingPoint {
    pub max_scale: f64,
    pub max_advantage: f64,
    /// First scale past the maximum where the advantage falls under 80% of it.
    pub clipping_scale: Option<f64>,
}

/// Where the emotion advantage of the 0.6 stabiliser stops growing.
pub fn clipping_point(diffs: &[ExpressivityDiff]) -> Option<ClippingPoint> {
    let points: Vec<(f64, f64)> = diffs.iter().filter_map(|d| d.emotion_diff.map(|e| (d.scale, e))).collect();
    let (max_scale, max_advantage) = points
        .iter()
        .copied()
        .reduce(|best, p| if p.1 > best.1 { p } else { best })?;
    let plateau = max_advantage * 0.8;
    let clipping_scale = points
        .iter()
        .find(|(scale, d)| *scale > max_scale && *d < plateau)
        .map(|(scale, _)| *scale);
    Some(ClippingPoint {
        max_scale,
        max_advantage,
        clipping_scale,
    })
}

pub const CRITICAL_BELOW: f64 = 4.0;
pub const HIGH_FROM: f64 = 6.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdBand {
    pub count: usize,
    pub by_voice: BTreeMap<String, usize>,
    pub by_emotion_type: BTreeMap<String, usize>,
    pub by_text_category: BTreeMap<String, usize>,
    pub scale_range: Option<(f64, f64)>,
}

impl ThresholdBand {
    fn of<'a>(rows: impl Iterator<Item = &'a Evaluation>) -> Self {
        let mut band = ThresholdBand::default();
        for e in rows {
            band.count += 1;
            let tally = |map: &mut BTreeMap<String, usize>, dim: Dimension| {
                if let Some(v) = dim.value(e) {
                    *map.entry(v).or_default() += 1;
                }
            };
            tally(&mut band.by_voice, Dimension::Voice);
            tally(&mut band.by_emotion_type, Dimension::EmotionType);
            tally(&mut band.by_text_category, Dimension::TextCategory);
            if let Some(scale) = e.key.as_ref().and_then(|k| k.scale) {
                band.scale_range = Some(match band.scale_range {
                    Some((lo, hi)) => (lo.min(scale), hi.max(scale)),
                    None => (scale, scale),
                });
            }
        }
        band
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricThresholds {
    pub metric: Metric,
    pub summary: Summary,
    /// Scores under [`CRITICAL_BELOW`].
    pub critical: ThresholdBand,
    /// Scores at or above [`HIGH_FROM`].
    pub high: ThresholdBand,
}

impl MetricThresholds {
    pub fn low_share(&self) -> f64 {
        if self.summary.count == 0 {
            0.0
        } else {
            self.critical.count as f64 / self.summary.count as f64 * 100.0
        }
    }
}

/// Critical cases and high performers per metric, with the parameters they share.
pub fn threshold_analysis(evals: &[Evaluation]) -> Vec<MetricThresholds> {
    Metric::ALL
        .iter()
        .map(|&metric| {
            let scored = || evals.iter().filter_map(move |e| e.scores.get(metric).map(|v| (e, v)));
            MetricThresholds {
                metric,
                summary: Summary::of(scored().map(|(_, v)| Some(v))),
                critical: ThresholdBand::of(scored().filter(|(_, v)| *v < CRITICAL_BELOW).map(|(e, _)| e)),
                high: ThresholdBand::of(scored().filter(|(_, v)| *v >= HIGH_FROM).map(|(e, _)| e)),
            }
        })
        .collect()
}

/// Mean scores for one scale under one expressivity variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub expressivity: String,
    pub point: ScalePoint,
}

/// Scale × expressivity cells ascending by scale, `none` before `0.6` within a scale.
pub fn scale_expressivity_cells<'a, I>(evals: I, variants: &[String]) -> Vec<Cell>
where
    I: IntoIterator<Item = &'a Evaluation> + Clone,
{
    let mut cells: Vec<(usize, Cell)> = Vec::new();
    for (rank, x) in variants.iter().enumerate() {
        let rows = evals.clone().into_iter().filter(|e| e.expressivity.as_deref() == Some(x.as_str()));
        for point in scale_curve(rows) {
            cells.push((rank, Cell { expressivity: x.clone(), point }));
        }
    }
    cells.sort_by(|(ra, a), (rb, b)| {
        a.point
            .scale
            .partial_cmp(&b.point.scale)
            .unwrap_or(Ordering::Equal)
            .then(ra.cmp(rb))
    });
    cells.into_iter().map(|(_, c)| c).collect()
}

/// The first cell with the highest mean for `metric`.
pub fn peak_cell(cells: &[Cell], metric: Metric) -> Option<(&Cell, f64)> {
    cells
        .iter()
        .filter_map(|c| c.point.get(metric).map(|v| (c, v)))
        .reduce(|best, c| if c.1 > best.1 { c } else { best })
}

#[derive(Debug, Clone)]
pub struct CategoryCells {
    pub text_category: String,
    pub evaluations: usize,
    pub cells: Vec<Cell>,
}

fn text_categories(evals: &[Evaluation]) -> Vec<String> {
    let mut found: Vec<String> = evals
        .iter()
        .filter_map(|e| e.key.as_ref().map(|k| k.text_category.clone()))
        .collect();
    found.sort();
    found.dedup();
    found
}

fn category_cells<'a, I>(rows: I, categories: &[String], variants: &[String]) -> Vec<CategoryCells>
where
    I: Iterator<Item = &'a Evaluation> + Clone,
{
    categories
        .iter()
        .filter_map(|cat| {
            let members = rows
                .clone()
                .filter(move |e| e.key.as_ref().is_some_and(|k| &k.text_category == cat));
            let evaluations = members.clone().count();
            if evaluations == 0 {
                return None;
            }
            Some(CategoryCells {
                text_category: cat.clone(),
                evaluations,
                cells: scale_expressivity_cells(members, variants),
            })
        })
        .collect()
}

/// One curve per text category and expressivity, for charting.
pub fn category_curves(categories: &[CategoryCells]) -> Vec<(String, Vec<ScalePoint>)> {
    let mut curves: Vec<(String, Vec<ScalePoint>)> = Vec::new();
    for c in categories {
        for cell in &c.cells {
            let label = format!("{} / {}", c.text_category, cell.expressivity);
            match curves.iter_mut().find(|(l, _)| *l == label) {
                Some((_, points)) => points.push(cell.point.clone()),
                None => curves.push((label, vec![cell.point.clone()])),
            }
        }
    }
    curves
}

/// Scale × expressivity means for each text category.
pub fn text_category_cells(evals: &[Evaluation]) -> Vec<CategoryCells> {
    category_cells(evals.iter(), &text_categories(evals), &expressivities(evals))
}

#[derive(Debug, Clone)]
pub struct GroupTextCells {
    pub group: EmotionGroup,
    pub evaluations: usize,
    pub categories: Vec<CategoryCells>,
}

impl GroupTextCells {
    /// Each category's emotion peak, strongest first.
    pub fn ranked_peaks(&self) -> Vec<(&CategoryCells, &Cell, f64)> {
        let mut peaks: Vec<_> = self
            .categories
            .iter()
            .filter_map(|c| peak_cell(&c.cells, Metric::Emotion).map(|(cell, v)| (c, cell, v)))
            .collect();
        peaks.sort_by(|a, b| b.2.total_cmp(&a.2));
        peaks
    }
}

/// Emotion group × text category, each split by scale and expressivity.
pub fn emotion_text_cells(evals: &[Evaluation]) -> Vec<GroupTextCells> {
    let categories = text_categories(evals);
    let variants = expressivities(evals);
    EmotionGroup::KNOWN
        .iter()
        .map(|&group| {
            let rows = in_group(evals, group);
            GroupTextCells {
                group,
                evaluations: rows.clone().count(),
                categories: category_cells(rows, &categories, &variants),
            }
        })
        .collect()
}

fn write_report(args: &AnalyzeArgs, name: &str, text: &str) -> anyhow::Result<()> {
    let path = args.out_dir.join(name);
    fs::write(&path, text)?;
    println!("{}", text);
    info!("Report written to {}", path.display());
    Ok(())
}

pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let evals = load_evaluations(&args.input)?;
    if evals.is_empty() {
        anyhow::bail!("no evaluations in {}", args.input.display());
    }
    fs::create_dir_all(&args.out_dir)?;
    let wants = |kind: ReportKind| args.report == kind || args.report == ReportKind::All;

    if wants(ReportKind::Summary) {
        write_report(&args, "summary_report.txt", &report::summary(&evals)?)?;
        if !args.no_charts {
            for dim in [Dimension::Emotion, Dimension::TextCategory, Dimension::Voice] {
                let rows = group_summaries(&evals, &[dim]);
                let path = args.out_dir.join(format!("scores_by_{}.svg", dim.name()));
                chart::dimension_panels(&path, &format!("Scores by {}", dim.name()), &rows)?;
            }
        }
    }

    if wants(ReportKind::TradeOff) {
        let tradeoffs = trade_off(&evals, args.quality_threshold);
        write_report(&args, "trade_off_report.txt", &report::trade_off(&tradeoffs, args.quality_threshold)?)?;
        if !args.no_charts {
            let curves: Vec<(String, Vec<ScalePoint>)> = tradeoffs
                .iter()
                .map(|t| (format!("expressivity {}", t.expressivity), t.points.clone()))
                .collect();
            chart::scale_panels(&args.out_dir.join("trade_off_analysis.svg"), "Quality vs intensity trade-off", &curves)?;
        }
    }

    if wants(ReportKind::Expressivity) {
        let diffs = expressivity_comparison(&evals);
        write_report(&args, "expressivity_report.txt", &report::expressivity(&diffs)?)?;
    }

    if wants(ReportKind::Clipping) {
        let point = clipping_point(&expressivity_comparison(&evals));
        write_report(&args, "clipping_point_report.txt", &report::clipping(point.as_ref())?)?;
    }

    if wants(ReportKind::Thresholds) {
        write_report(&args, "threshold_report.txt", &report::thresholds(&threshold_analysis(&evals))?)?;
    }

    if wants(ReportKind::TextCategories) {
        let categories = text_category_cells(&evals);
        write_report(&args, "text_categories_report.txt", &report::text_categories(&categories, evals.len())?)?;
        if !args.no_charts {
            let curves = category_curves(&categories);
            chart::scale_panels(&args.out_dir.join("text_categories_analysis.svg"), "Text categories by scale", &curves)?;
        }
    }

    if wants(ReportKind::EmotionText) {
        let groups = emotion_text_cells(&evals);
        write_report(&args, "combined_analysis_report.txt", &report::emotion_text(&groups, evals.len())?)?;
    }

    if wants(ReportKind::EmotionGroups) {
        let ranges = emotion_group_ranges(&evals, args.quality_threshold);
        let winners = group_expressivity_winners(&evals);
        write_report(&args, "emotion_groups_report.txt", &report::emotion_groups(&ranges, &winners, args.quality_threshold)?)?;
        if !args.no_charts {
            let curves: Vec<(String, Vec<ScalePoint>)> = ranges
                .iter()
                .map(|r| (format!("{} / {}", r.group.as_str(), r.expressivity), r.points.clone()))
                .collect();
            chart::scale_panels(&args.out_dir.join("emotion_groups_analysis.svg"), "Emotion groups by scale", &curves)?;
        }
    }
    Ok(())
}
