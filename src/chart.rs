//! 2x2 SVG figures for the analysis reports.

use plotters::prelude::*;
use std::path::Path;
use tracing::info;

use crate::analysis::{GroupRow, ScalePoint};
use crate::evaluation::Metric;

const SIZE: (u32, u32) = (1400, 1000);
const SCORE_RANGE: std::ops::Range<f64> = 1.0..7.0;

fn x_bounds(curves: &[(String, Vec<ScalePoint>)]) -> (f64, f64) {
    let scales = curves.iter().flat_map(|(_, pts)| pts.iter().map(|p| p.scale));
    let (lo, hi) = scales.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    if !lo.is_finite() {
        return (0.0, 3.0);
    }
    if hi - lo < 1e-9 {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo - 0.1, hi + 0.1)
    }
}

/// Mean quality, emotion and similarity against scale, one line per curve,
/// plus a panel with sample counts.
pub fn scale_panels(path: &Path, title: &str, curves: &[(String, Vec<ScalePoint>)]) -> anyhow::Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 28))?;
    let panels = root.split_evenly((2, 2));
    let (x_lo, x_hi) = x_bounds(curves);

    for (panel, metric) in panels.iter().zip(Metric::ALL) {
        let mut chart = ChartBuilder::on(panel)
            .caption(format!("{} score by scale", metric.as_str()), ("sans-serif", 20))
            .margin(12)
            .x_label_area_size(35)
            .y_label_area_size(45)
            .build_cartesian_2d(x_lo..x_hi, SCORE_RANGE)?;
        chart.configure_mesh().x_desc("scale").y_desc("mean score").draw()?;

        for (i, (label, points)) in curves.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();
            let data: Vec<(f64, f64)> = points
                .iter()
                .filter_map(|p| p.get(metric).map(|v| (p.scale, v)))
                .collect();
            chart
                .draw_series(LineSeries::new(data.clone(), color.stroke_width(2)))?
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            chart.draw_series(data.into_iter().map(|(x, y)| Circle::new((x, y), 3, color.filled())))?;
        }
        if !curves.is_empty() {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
    }

    let max_count = curves
        .iter()
        .flat_map(|(_, pts)| pts.iter().map(|p| p.count))
        .max()
        .unwrap_or(0);
    let mut chart = ChartBuilder::on(&panels[3])
        .caption("evaluations per scale", ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(x_lo..x_hi, 0.0..(max_count as f64 + 1.0))?;
    chart.configure_mesh().x_desc("scale").y_desc("count").draw()?;
    for (i, (_, points)) in curves.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let data: Vec<(f64, f64)> = points.iter().map(|p| (p.scale, p.count as f64)).collect();
        chart.draw_series(LineSeries::new(data, color.stroke_width(2)))?;
    }

    root.present()?;
    info!("Chart written to {}", path.display());
    Ok(())
}

/// Bar panels of metric means and counts for each group of a single dimension.
pub fn dimension_panels(path: &Path, title: &str, rows: &[GroupRow]) -> anyhow::Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 28))?;
    let panels = root.split_evenly((2, 2));

    let labels: Vec<String> = rows.iter().map(|r| r.key.join("/")).collect();
    let n = labels.len().max(1);
    let x_range = -0.5..(n as f64 - 0.5);
    let label_at = |x: &f64| -> String {
        if (x - x.round()).abs() > 1e-6 || *x < 0.0 {
            return String::new();
        }
        labels.get(x.round() as usize).cloned().unwrap_or_default()
    };

    let max_count = rows.iter().map(|r| r.rows).max().unwrap_or(0) as f64;
    let series: [(&str, std::ops::Range<f64>, Box<dyn Fn(&GroupRow) -> Option<f64>>); 4] = [
        ("quality", SCORE_RANGE, Box::new(|r: &GroupRow| r.metrics.quality.mean)),
        ("emotion", SCORE_RANGE, Box::new(|r: &GroupRow| r.metrics.emotion.mean)),
        ("similarity", SCORE_RANGE, Box::new(|r: &GroupRow| r.metrics.similarity.mean)),
        ("count", 0.0..(max_count + 1.0), Box::new(|r: &GroupRow| Some(r.rows as f64))),
    ];

    for (i, (panel, (name, y_range, value))) in panels.iter().zip(series).enumerate() {
        let y_floor = y_range.start;
        let mut chart = ChartBuilder::on(panel)
            .caption(name, ("sans-serif", 20))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(45)
            .build_cartesian_2d(x_range.clone(), y_range)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n + 1)
            .x_label_formatter(&label_at)
            .draw()?;
        let color = Palette99::pick(i).to_rgba();
        chart.draw_series(rows.iter().enumerate().filter_map(|(j, r)| {
            let v = value(r)?;
            let x = j as f64;
            Some(Rectangle::new([(x - 0.35, y_floor), (x + 0.35, v)], color.filled()))
        }))?;
    }

    root.present()?;
    info!("Chart written to {}", path.display());
    Ok(())
}
