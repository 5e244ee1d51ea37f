//! Recipe cost outliers.
//!
//! Statistics are taken over recipes with a determined total only. A recipe
//! is an outlier when its total exceeds `center + k * spread`, or exceeds the
//! absolute ceiling; either alone is enough.

use ordered_float::OrderedFloat;

use crate::config::{AuditConfig, OutlierConfig, OutlierMethod};
use crate::model::{CostStats, OutlierReason, OutlierVerdict, RecipeCostSummary};

/// MAD → standard deviation under a normal distribution.
const MAD_SCALE: f64 = 1.4826;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub center: f64,
    pub spread: f64,
    pub population: usize,
}

/// `None` below two values.
pub fn compute_stats(totals: &[f64], method: OutlierMethod) -> Option<Stats> {
    if totals.len() < 2 {
        return None;
    }
    let (center, spread) = match method {
        OutlierMethod::MeanStddev => mean_stddev(totals),
        OutlierMethod::MedianMad => median_mad(totals),
    };
    Some(Stats {
        center,
        spread,
        population: totals.len(),
    })
}

/// Mean and sample (n - 1) standard deviation.
fn mean_stddev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

fn median_mad(values: &[f64]) -> (f64, f64) {
    let median = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
    (median, median_of(deviations) * MAD_SCALE)
}

fn median(values: &[f64]) -> f64 {
    median_of(values.to_vec())
}

fn median_of(values: Vec<f64>) -> f64 {
    let mut sorted: Vec<OrderedFloat<f64>> = values.into_iter().map(OrderedFloat).collect();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1].0 + sorted[mid].0) / 2.0
    } else {
        sorted[mid].0
    }
}

pub struct OutlierDetector<'a> {
    config: &'a OutlierConfig,
}

impl<'a> OutlierDetector<'a> {
    pub fn new(config: &'a AuditConfig) -> Self {
        Self {
            config: &config.outliers,
        }
    }

    pub fn verdict(&self, total: Option<f64>, stats: Option<&Stats>) -> OutlierVerdict {
        let Some(total) = total else {
            return OutlierVerdict::CostUndetermined;
        };

        let mut reasons = Vec::new();
        if let Some(stats) = stats {
            if total > stats.center + self.config.k * stats.spread {
                reasons.push(OutlierReason::Statistical);
            }
        }
        if let Some(ceiling) = self.config.ceiling {
            if total > ceiling {
                reasons.push(OutlierReason::AbsoluteCeiling);
            }
        }

        if !reasons.is_empty() {
            OutlierVerdict::CostOutlier { reasons }
        } else if stats.is_none() {
            OutlierVerdict::InsufficientData
        } else {
            OutlierVerdict::Normal
        }
    }

    /// Compute statistics over determined totals and set every verdict.
    pub fn apply(&self, summaries: &mut [RecipeCostSummary]) -> CostStats {
        let totals: Vec<f64> = summaries.iter().filter_map(|s| s.total).collect();
        let stats = compute_stats(&totals, self.config.method);

        for summary in summaries.iter_mut() {
            summary.verdict = self.verdict(summary.total, stats.as_ref());
        }

        match stats {
            Some(s) => {
                let threshold = s.center + self.config.k * s.spread;
                log::info!(
                    "outliers: {} {:.2} ± {:.2} over {} recipes (threshold {:.2})",
                    self.config.method,
                    s.center,
                    s.spread,
                    s.population,
                    threshold
                );
                CostStats::Computed {
                    method: self.config.method,
                    center: s.center,
                    spread: s.spread,
                    population: s.population,
                    threshold,
                }
            }
            None => {
                log::warn!(
                    "outliers: only {} costed recipe(s); statistics need at least 2",
                    totals.len()
                );
                CostStats::InsufficientData {
                    population: totals.len(),
                }
            }
        }
    }
}
