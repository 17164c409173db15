//! Financial impact of a candidate table against the current baseline.
//!
//! Comparison is median to median. Grades present in only one of the two tables
//! are skipped silently, since grade structures evolve over time.

use serde::{Deserialize, Serialize};

use crate::types::{GradeTable, Headcount, Metrics};

/// Median change for one grade present in both tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeDelta {
    pub grade: String,
    pub baseline_median: f64,
    pub candidate_median: f64,
    pub delta: f64,
    /// `None` when the baseline median is zero and a percentage is undefined.
    pub delta_percent: Option<f64>,
    pub headcount: u32,
}

impl GradeDelta {
    pub fn budget_impact(&self) -> f64 {
        self.delta * self.headcount as f64
    }

    pub fn is_changed(&self) -> bool {
        self.delta != 0.0
    }
}

/// Per-grade median deltas, in the candidate's row order.
pub fn grade_deltas(candidate: &GradeTable, baseline: &GradeTable, headcount: &Headcount) -> Vec<GradeDelta> {
    candidate
        .rows
        .iter()
        .filter_map(|row| {
            let base = baseline.anchors(&row.grade.name)?;
            let delta = row.anchors.m - base.m;
            let delta_percent = if base.m == 0.0 { None } else { Some(delta / base.m * 100.0) };
            Some(GradeDelta {
                grade: row.grade.name.clone(),
                baseline_median: base.m,
                candidate_median: row.anchors.m,
                delta,
                delta_percent,
                headcount: headcount.get(&row.grade.name).copied().unwrap_or(0),
            })
        })
        .collect()
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn diff(candidate: &GradeTable, baseline: &GradeTable, headcount: &Headcount) -> Metrics {
        Self::summarize(&grade_deltas(candidate, baseline, headcount))
    }

    pub fn summarize(deltas: &[GradeDelta]) -> Metrics {
        let total_budget_impact = deltas.iter().map(GradeDelta::budget_impact).sum();

        let mut weighted_sum = 0.0;
        let mut weight = 0.0;
        let mut max_percent: Option<f64> = None;
        for delta in deltas {
            let Some(percent) = delta.delta_percent else {
                continue;
            };
            max_percent = Some(max_percent.map_or(percent, |m| m.max(percent)));
            if delta.headcount > 0 {
                weighted_sum += percent * delta.headcount as f64;
                weight += delta.headcount as f64;
            }
        }

        Metrics {
            total_budget_impact,
            avg_salary_increase_percent: if weight > 0.0 { weighted_sum / weight } else { 0.0 },
            max_salary_increase_percent: max_percent.unwrap_or(0.0),
            positions_affected: deltas.iter().filter(|d| d.is_changed()).count(),
        }
    }
}

/// Shorthand for [`MetricsCalculator::diff`].
pub fn diff(candidate: &GradeTable, baseline: &GradeTable, headcount: &Headcount) -> Metrics {
    MetricsCalculator::diff(candidate, baseline, headcount)
}
