//! Descriptive statistics used by the analyses.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1); absent below two values.
    pub std: Option<f64>,
}

impl Summary {
    pub fn of<I: IntoIterator<Item = Option<f64>>>(values: I) -> Summary {
        let values: Vec<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
        let count = values.len();
        if count == 0 {
            return Summary::default();
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = (count > 1).then(|| {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        });
        Summary {
            count,
            mean: Some(mean),
            std,
        }
    }
}

/// Gradient of `y` over non-uniformly spaced `x`: second-order central
/// differences inside, first-order one-sided at the edges.
pub fn gradient(y: &[f64], x: &[f64]) -> Vec<f64> {
    let n = y.len().min(x.len());
    if n < 2 {
        return vec![0.0; n];
    }
    let mut g = Vec::with_capacity(n);
    g.push((y[1] - y[0]) / (x[1] - x[0]));
    for i in 1..n - 1 {
        let hs = x[i] - x[i - 1];
        let hd = x[i + 1] - x[i];
        let num = hs * hs * y[i + 1] + (hd * hd - hs * hs) * y[i] - hd * hd * y[i - 1];
        g.push(num / (hs * hd * (hd + hs)));
    }
    g.push((y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]));
    g
}

/// The x of maximum absolute curvature, taken from the second gradient.
pub fn elbow_point(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 3 || y.len() < 3 {
        return None;
    }
    let first = gradient(y, x);
    let second = gradient(&first, x);
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in second.iter().enumerate() {
        let v = v.abs();
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| x[i])
}

/// Per-step change `(y[i] - y[i-1]) / (x[i] - x[i-1])`.
pub fn step_rates(x: &[f64], y: &[f64]) -> Vec<f64> {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (ys[1] - ys[0]) / (xs[1] - xs[0]))
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}
