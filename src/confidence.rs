//! Confidence statistics over a block graph.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blocks::{BlockGraph, BlockType};

/// Overall confidence distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p25: f64,
    pub p75: f64,
}

/// Per-block-type breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Grade derived from mean confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Quality {
    pub fn from_mean(mean: f64) -> Self {
        if mean >= 95.0 {
            Quality::Excellent
        } else if mean >= 85.0 {
            Quality::Good
        } else if mean >= 70.0 {
            Quality::Fair
        } else {
            Quality::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Poor => "poor",
            Quality::Fair => "fair",
            Quality::Good => "good",
            Quality::Excellent => "excellent",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    /// True when no block carried a confidence; all stats are then zero.
    pub no_data: bool,
    pub overall: ConfidenceStats,
    pub by_block_type: BTreeMap<BlockType, TypeStats>,
    pub quality: Option<Quality>,
}

/// Summarize every confidence in the graph. Never fails.
pub fn summarize(graph: &BlockGraph) -> ConfidenceSummary {
    let mut all = Vec::new();
    let mut by_type: BTreeMap<BlockType, Vec<f64>> = BTreeMap::new();

    for block in graph.blocks() {
        let Some(confidence) = block.confidence.filter(|c| c.is_finite()) else {
            continue;
        };
        all.push(confidence);
        by_type.entry(block.block_type).or_default().push(confidence);
    }

    if all.is_empty() {
        return ConfidenceSummary {
            no_data: true,
            ..ConfidenceSummary::default()
        };
    }

    let overall = distribution(&mut all);
    let by_block_type = by_type
        .into_iter()
        .map(|(block_type, values)| {
            let stats = TypeStats {
                count: values.len(),
                mean: mean(&values),
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            };
            (block_type, stats)
        })
        .collect();

    ConfidenceSummary {
        no_data: false,
        quality: Some(Quality::from_mean(overall.mean)),
        overall,
        by_block_type,
    }
}

/// Stats over a non-empty sample. Sorts `values` in place.
fn distribution(values: &mut [f64]) -> ConfidenceStats {
    values.sort_by(|a, b| a.total_cmp(b));

    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    ConfidenceStats {
        count: values.len(),
        mean,
        min: values[0],
        max: values[values.len() - 1],
        median: percentile(values, 0.5),
        std_dev: variance.sqrt(),
        p25: percentile(values, 0.25),
        p75: percentile(values, 0.75),
    }
}

/// Arithmetic mean, kept inside `[min, max]` despite rounding.
fn mean(values: &[f64]) -> f64 {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (values.iter().sum::<f64>() / values.len() as f64).clamp(min, max)
}

/// Linear interpolation between closest ranks (R-7): `h = (n - 1) * p`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lower = h.floor() as usize;
    let upper = h.ceil() as usize;
    let value = sorted[lower] + (h - lower as f64) * (sorted[upper] - sorted[lower]);
    value.clamp(sorted[lower], sorted[upper])
}
