//! Summary statistics behind the dashboard charts.

use crate::dataset::{Column, Dataset, Value};
use std::collections::HashMap;

/// Occurrences of each distinct label, most frequent first.
///
/// Ties keep the order in which the labels first appear in the column.
pub fn value_counts(column: &Column) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for label in column.labels() {
        match position.get(&label) {
            Some(&i) => order[i].1 += 1,
            None => {
                position.insert(label.clone(), order.len());
                order.push((label, 1));
            }
        }
    }

    // sort_by is stable, so equal counts stay in first-seen order
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width histogram over `values`.
///
/// The last bin is closed on both sides. A constant input gets a unit-wide
/// range centred on the value so the bins never collapse to zero width.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let (mut lo, mut hi) = min_max(values);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: lo + width * i as f64,
            end: lo + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for &v in values {
        let mut i = ((v - lo) / width).floor() as usize;
        if i >= bins {
            i = bins - 1;
        }
        out[i].count += 1;
    }

    out
}

/// Five-number summary plus Tukey whiskers and outliers.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = percentile(&sorted, 0.25);
    let median = percentile(&sorted, 0.5);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;
    let low_fence = q1 - 1.5 * iqr;
    let high_fence = q3 + 1.5 * iqr;

    let lower_whisker = sorted
        .iter()
        .copied()
        .find(|&v| v >= low_fence)
        .unwrap_or(q1);
    let upper_whisker = sorted
        .iter()
        .rev()
        .copied()
        .find(|&v| v <= high_fence)
        .unwrap_or(q3);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|&v| v < low_fence || v > high_fence)
        .collect();

    Some(BoxStats {
        q1,
        median,
        q3,
        lower_whisker,
        upper_whisker,
        outliers,
    })
}

/// Linear-interpolated percentile of already sorted data, `p` in [0, 1]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Pearson correlation over rows where both cells are numeric.
///
/// `None` when fewer than two complete pairs exist or either side is constant.
pub fn pearson(xs: &[Value], ys: &[Value]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some((x.as_number()?, y.as_number()?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

#[derive(Clone, Debug)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Pairwise correlations between every numeric column of the dataset
pub fn correlation_matrix(dataset: &Dataset) -> CorrelationMatrix {
    let columns: Vec<&Column> = dataset
        .schema()
        .numeric_columns()
        .filter_map(|d| dataset.column(&d.name))
        .collect();

    let values = columns
        .iter()
        .map(|a| {
            columns
                .iter()
                .map(|b| pearson(&a.values, &b.values))
                .collect()
        })
        .collect();

    CorrelationMatrix {
        names: columns.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}

pub(crate) fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}
