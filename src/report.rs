//! Plain-text rendering of the analyses.

use std::fmt::Write;
use std::collections::BTreeMap;

use crate::analysis::{
    CRITICAL_BELOW, CategoryCells, Cell, ClippingPoint, Dimension, ExpressivityDiff, GroupRange, GroupTextCells,
    GroupWinner, HIGH_FROM, MetricSummaries, MetricThresholds, ThresholdBand, TradeOff, group_summaries,
    interpret_diff, peak_cell,
};
use crate::evaluation::{Evaluation, Metric};
use crate::stats::Summary;

fn opt(v: Option<f64>, width: usize, prec: usize) -> String {
    match v {
        Some(v) => format!("{:>width$.prec$}", v, width = width, prec = prec),
        None => format!("{:>width$}", "n/a", width = width),
    }
}

fn opt_scale(v: Option<f64>) -> String {
    v.map(|s| format!("{:.1}", s)).unwrap_or_else(|| "none".to_string())
}

fn rule(out: &mut String, ch: char, n: usize) -> std::fmt::Result {
    writeln!(out, "{}", ch.to_string().repeat(n))
}

fn summary_cells(s: &Summary) -> String {
    format!("{} ±{}", opt(s.mean, 5, 2), opt(s.std, 4, 2))
}

fn metrics_row(m: &MetricSummaries) -> String {
    Metric::ALL
        .iter()
        .map(|metric| summary_cells(m.get(*metric)))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn summary(evals: &[Evaluation]) -> anyhow::Result<String> {
    let mut out = String::new();
    rule(&mut out, '=', 72)?;
    writeln!(out, "TTS EVALUATION SUMMARY")?;
    rule(&mut out, '=', 72)?;

    let overall = MetricSummaries::of(evals.iter());
    let parsed = evals.iter().filter(|e| e.key.is_some()).count();
    writeln!(out, "Evaluations: {} ({} with a parseable sample id)", evals.len(), parsed)?;
    for metric in Metric::ALL {
        let s = overall.get(metric);
        writeln!(
            out,
            "  {:<10} mean {}  std {}  n={}",
            metric.as_str(),
            opt(s.mean, 5, 2),
            opt(s.std, 5, 2),
            s.count
        )?;
    }

    for dim in Dimension::ALL {
        let rows = group_summaries(evals, &[dim]);
        if rows.is_empty() {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "BY {}", dim.name().to_uppercase())?;
        rule(&mut out, '-', 72)?;
        writeln!(
            out,
            "{:<16} | {:>5} | {:^12} | {:^12} | {:^12}",
            dim.name(),
            "n",
            "quality",
            "emotion",
            "similarity"
        )?;
        for row in &rows {
            writeln!(out, "{:<16} | {:>5} | {}", row.key.join("/"), row.rows, metrics_row(&row.metrics))?;
        }
        let best = rows
            .iter()
            .filter_map(|r| r.metrics.quality.mean.map(|m| (r, m)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((row, m)) = best {
            writeln!(out, "Best quality: {} ({:.2})", row.key.join("/"), m)?;
        }
    }

    let combined = group_summaries(evals, &[Dimension::Emotion, Dimension::TextCategory]);
    if !combined.is_empty() {
        writeln!(out)?;
        writeln!(out, "EMOTION x TEXT CATEGORY")?;
        rule(&mut out, '-', 72)?;
        for row in &combined {
            writeln!(out, "{:<24} | {:>5} | {}", row.key.join(" / "), row.rows, metrics_row(&row.metrics))?;
        }
    }
    Ok(out)
}

pub fn trade_off(tradeoffs: &[TradeOff], threshold: f64) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== QUALITY vs INTENSITY TRADE-OFF ANALYSIS ===")?;
    for t in tradeoffs {
        writeln!(out)?;
        writeln!(out, "EXPRESSIVITY {}:", t.expressivity.to_uppercase())?;
        writeln!(out, "Scale | Quality | Similarity | Emotion | Sample Count")?;
        rule(&mut out, '-', 55)?;
        for p in &t.points {
            writeln!(
                out,
                "{:5.1} | {} | {} | {} | {:>12}",
                p.scale,
                opt(p.quality, 7, 2),
                opt(p.similarity, 10, 2),
                opt(p.emotion, 7, 2),
                p.count
            )?;
        }
        writeln!(out, "Max scale before quality < {:.1}: {}", threshold, opt_scale(t.quality_threshold_scale))?;
        writeln!(out, "Average quality decline per scale unit: {:.3}", t.avg_decline_rate)?;
        writeln!(out, "Elbow point (accelerated decline): {}", opt_scale(t.elbow_scale))?;
        writeln!(out, "RECOMMENDED MAX SCALE: {}", opt_scale(t.recommended_max_scale))?;
    }
    Ok(out)
}

fn diff_table(
    out: &mut String,
    label: &str,
    diffs: &[ExpressivityDiff],
    pick: impl Fn(&ExpressivityDiff) -> Option<f64>,
) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{} Difference (0.6 - none) by Scale:", label)?;
    writeln!(out, "Scale | Diff    | Interpretation")?;
    rule(out, '-', 45)?;
    for d in diffs {
        let v = pick(d);
        let interp = v.map(interpret_diff).unwrap_or("n/a");
        writeln!(out, "{:5.1} | {} | {}", d.scale, opt(v, 7, 3), interp)?;
    }
    Ok(())
}

pub fn expressivity(diffs: &[ExpressivityDiff]) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== EXPRESSIVITY 0.6 vs NONE COMPARISON ===")?;
    if diffs.is_empty() {
        writeln!(out, "No scale was evaluated under both expressivity variants.")?;
        return Ok(out);
    }
    diff_table(&mut out, "Quality", diffs, |d| d.quality_diff)?;
    diff_table(&mut out, "Emotion Expression", diffs, |d| d.emotion_diff)?;
    Ok(out)
}

pub fn emotion_groups(ranges: &[GroupRange], winners: &[GroupWinner], threshold: f64) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== EMOTION GROUPS vs SCALE ANALYSIS ===")?;
    for r in ranges {
        writeln!(out)?;
        writeln!(
            out,
            "{} GROUP, {} EXPRESSIVITY",
            r.group.as_str().to_uppercase().replace('_', " "),
            r.expressivity.to_uppercase()
        )?;
        writeln!(out, "Scale | Emotion | Quality | Similarity | Count")?;
        rule(&mut out, '-', 50)?;
        for p in &r.points {
            writeln!(
                out,
                "{:5.1} | {} | {} | {} | {:>5}",
                p.scale,
                opt(p.emotion, 7, 2),
                opt(p.quality, 7, 2),
                opt(p.similarity, 10, 2),
                p.count
            )?;
        }
        if let (Some(scale), Some(em)) = (r.peak_scale, r.peak_emotion) {
            writeln!(out, "  Peak emotion: {:.2} at scale {:.1}", em, scale)?;
        }
        writeln!(out, "  Quality >= {:.1} up to scale: {}", threshold, opt_scale(r.max_quality_scale))?;
        for (from, to, rate) in &r.improvements {
            writeln!(out, "  Scale {:.1} -> {:.1}: {:+.3} emotion/scale", from, to, rate)?;
        }
        match r.plateau_scale {
            Some(s) => writeln!(out, "  Plateau after scale: {:.1}", s)?,
            None => writeln!(out, "  Plateau after scale: none detected")?,
        }
    }

    if !winners.is_empty() {
        writeln!(out)?;
        writeln!(out, "=== EXPRESSIVITY 0.6 EFFECTIVENESS BY GROUP ===")?;
        writeln!(out, "Group          | Scale | Emotion Diff | Quality Diff | Winner")?;
        rule(&mut out, '-', 66)?;
        for w in winners {
            writeln!(
                out,
                "{:<14} | {:5.1} | {:12.2} | {:12.2} | {}",
                w.group.as_str(),
                w.scale,
                w.emotion_diff,
                w.quality_diff,
                w.winner
            )?;
        }
    }
    Ok(out)
}

pub fn clipping(point: Option<&ClippingPoint>) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== EXPRESSIVITY 0.6 CLIPPING POINT ANALYSIS ===")?;
    let Some(p) = point else {
        writeln!(out, "Insufficient data for clipping analysis")?;
        return Ok(out);
    };
    writeln!(out, "Maximum 0.6 advantage at scale: {:.1}", p.max_scale)?;
    writeln!(out, "Maximum advantage value: {:.3}", p.max_advantage)?;
    match p.clipping_scale {
        Some(s) => writeln!(out, "Effectiveness plateau starts at: {:.1}", s)?,
        None => writeln!(out, "Effectiveness plateau starts at: Not detected")?,
    }
    Ok(out)
}

fn counts(map: &BTreeMap<String, usize>) -> String {
    if map.is_empty() {
        return "-".to_string();
    }
    map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect::<Vec<_>>().join(", ")
}

fn band(out: &mut String, b: &ThresholdBand, with_text: bool) -> std::fmt::Result {
    if b.count == 0 {
        return Ok(());
    }
    writeln!(out, "    Voice distribution: {}", counts(&b.by_voice))?;
    writeln!(out, "    Emotion types: {}", counts(&b.by_emotion_type))?;
    if with_text {
        writeln!(out, "    Text types: {}", counts(&b.by_text_category))?;
        if let Some((lo, hi)) = b.scale_range {
            writeln!(out, "    Scale range: {:.1} - {:.1}", lo, hi)?;
        }
    }
    Ok(())
}

pub fn thresholds(metrics: &[MetricThresholds]) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== SCORE DISTRIBUTIONS ===")?;
    for m in metrics {
        if m.summary.count == 0 {
            writeln!(out, "  {}: no scores", m.metric.as_str())?;
            continue;
        }
        writeln!(
            out,
            "  {}: mean={}, std={}",
            m.metric.as_str(),
            opt(m.summary.mean, 0, 2),
            opt(m.summary.std, 0, 2)
        )?;
        writeln!(out, "    Low scores (<{}): {} ({:.1}%)", CRITICAL_BELOW, m.critical.count, m.low_share())?;
    }

    writeln!(out)?;
    writeln!(out, "=== THRESHOLD ANALYSIS ===")?;
    for m in metrics {
        let name = m.metric.as_str().to_uppercase();
        writeln!(out)?;
        writeln!(out, "{} - Critical Cases (score < {}): {}", name, CRITICAL_BELOW, m.critical.count)?;
        band(&mut out, &m.critical, true)?;
        writeln!(out, "{} - High Performers (score >= {}): {}", name, HIGH_FROM, m.high.count)?;
        band(&mut out, &m.high, false)?;
    }
    Ok(out)
}

fn cell_table(out: &mut String, cells: &[Cell], indent: &str) -> std::fmt::Result {
    writeln!(out, "{}Scale | Expr | Emotion | Quality | Similarity | Count", indent)?;
    writeln!(out, "{}{}", indent, "-".repeat(55))?;
    for c in cells {
        writeln!(
            out,
            "{}{:5.1} | {:<4} | {} | {} | {} | {:>5}",
            indent,
            c.point.scale,
            c.expressivity,
            opt(c.point.emotion, 7, 2),
            opt(c.point.quality, 7, 2),
            opt(c.point.similarity, 10, 2),
            c.point.count
        )?;
    }
    Ok(())
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 * 100.0 }
}

pub fn text_categories(categories: &[CategoryCells], total: usize) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== TEXT CATEGORIES ANALYSIS ===")?;
    writeln!(out, "Total evaluations: {}", total)?;
    for c in categories {
        writeln!(out)?;
        writeln!(out, "{} TEXT CATEGORY", c.text_category.to_uppercase())?;
        writeln!(out, "Evaluations: {} ({:.1}%)", c.evaluations, share(c.evaluations, total))?;
        cell_table(&mut out, &c.cells, "")?;
        for metric in Metric::ALL {
            if let Some((cell, v)) = peak_cell(&c.cells, metric) {
                writeln!(
                    out,
                    "Peak {}: {:.2} at scale {:.1} with {} expressivity",
                    metric.as_str(),
                    v,
                    cell.point.scale,
                    cell.expressivity
                )?;
            }
        }
    }
    Ok(out)
}

pub fn emotion_text(groups: &[GroupTextCells], total: usize) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "=== COMBINED EMOTION GROUP x TEXT CATEGORY ANALYSIS ===")?;
    writeln!(out, "Total evaluations: {}", total)?;
    for g in groups {
        let name = g.group.as_str().to_uppercase().replace('_', " ");
        writeln!(out)?;
        writeln!(out, "{} GROUP", name)?;
        rule(&mut out, '=', 60)?;
        writeln!(out, "Total evaluations in group: {}", g.evaluations)?;
        for c in &g.categories {
            writeln!(out)?;
            writeln!(out, "  {} text category", c.text_category.to_uppercase())?;
            writeln!(out, "  Evaluations: {} ({:.1}% of total)", c.evaluations, share(c.evaluations, total))?;
            cell_table(&mut out, &c.cells, "  ")?;
            if let Some((cell, v)) = peak_cell(&c.cells, Metric::Emotion) {
                writeln!(out, "  Peak: {:.2} emotion at scale {:.1} ({})", v, cell.point.scale, cell.expressivity)?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "=== BEST COMBINATIONS BY EMOTION GROUP ===")?;
    for g in groups {
        let peaks = g.ranked_peaks();
        if peaks.is_empty() {
            continue;
        }
        writeln!(out, "{}:", g.group.as_str().to_uppercase().replace('_', " "))?;
        for (c, cell, v) in &peaks {
            writeln!(
                out,
                "  {} text: {:.2} emotion, {} quality (scale {:.1}, {} expressivity)",
                c.text_category.to_uppercase(),
                v,
                opt(cell.point.quality, 0, 2),
                cell.point.scale,
                cell.expressivity
            )?;
        }
        let (best, _, v) = peaks[0];
        writeln!(out, "  Best text category: {} ({:.2} emotion)", best.text_category.to_uppercase(), v)?;
    }
    Ok(out)
}
