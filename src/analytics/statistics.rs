use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSummary {
    pub count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
}

/// Summary over the finite entries of `values`. Quartiles use linear
/// interpolation between order statistics at index `p * (n - 1)`.
pub fn summarize(values: &[f64]) -> StatisticsSummary {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return StatisticsSummary::default();
    }

    let count = sorted.len();
    StatisticsSummary {
        count,
        average: Some(sorted.iter().sum::<f64>() / count as f64),
        min: sorted.first().copied(),
        max: sorted.last().copied(),
        median: percentile_sorted(&sorted, 0.5),
        q1: percentile_sorted(&sorted, 0.25),
        q3: percentile_sorted(&sorted, 0.75),
    }
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted = values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect::<Vec<f64>>();
    sorted.sort_by(|left, right| left.total_cmp(right));
    sorted
}

fn percentile_sorted(sorted: &[f64], quantile: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let position = quantile.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }

    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}
