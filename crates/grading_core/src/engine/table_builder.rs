//! Grade table builder
//!
//! Applies the anchor math across an ordered grade list. There is no incremental
//! path: every input change triggers a full rebuild, which is linear in grade count.

use std::collections::HashSet;
use tracing::debug;

use super::anchor_math::{
    horizontal_expand_with_unit, round_to_unit, vertical_step_with_unit, DEFAULT_ROUNDING_UNIT,
};
use crate::config::GradingConfig;
use crate::error::{GradingError, Result};
use crate::types::{Grade, GradeRow, GradeTable, ScenarioInputs};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeTableBuilder {
    rounding_unit: f64,
}

impl Default for GradeTableBuilder {
    fn default() -> Self {
        Self { rounding_unit: DEFAULT_ROUNDING_UNIT }
    }
}

impl GradeTableBuilder {
    pub fn new(rounding_unit: f64) -> Self {
        Self { rounding_unit }
    }

    pub fn from_config(config: &GradingConfig) -> Self {
        Self::new(config.rounding_unit)
    }

    pub fn rounding_unit(&self) -> f64 {
        self.rounding_unit
    }

    /// Build the full table. Any failure aborts the build; partial tables are never returned.
    pub fn build(&self, grades_in_order: &[Grade], inputs: &ScenarioInputs) -> Result<GradeTable> {
        let grades = validate_grades(grades_in_order)?;
        let base_value = validate_base_value(inputs.base_value)?;

        let unknown: Vec<&String> = inputs
            .vertical_percent
            .keys()
            .filter(|name| !grades.iter().any(|g| &g.name == *name))
            .collect();
        if !unknown.is_empty() {
            debug!("Ignoring vertical percents for unknown grades: {:?}", unknown);
        }

        // Walk from the base (last) upward.
        let mut rows = Vec::with_capacity(grades.len());
        let mut ld = round_to_unit(base_value, self.rounding_unit);
        for (idx, grade) in grades.iter().rev().enumerate() {
            if idx > 0 {
                ld = vertical_step_with_unit(ld, inputs.vertical_for(&grade.name), self.rounding_unit)
                    .map_err(|e| e.with_grade(&grade.name))?;
            }
            let anchors =
                horizontal_expand_with_unit(ld, &inputs.horizontal_intervals, self.rounding_unit)
                    .map_err(|e| e.with_grade(&grade.name))?;
            rows.push(GradeRow { grade: grade.clone(), anchors });
        }
        rows.reverse();

        Ok(GradeTable {
            base_value: rows.last().map(|row| row.anchors.ld).unwrap_or_default(),
            vertical_avg: vertical_average(&grades, inputs),
            horizontal_avg: inputs.horizontal_intervals.average(),
            rows,
        })
    }
}

/// Build with whole-unit rounding.
pub fn build(grades_in_order: &[Grade], inputs: &ScenarioInputs) -> Result<GradeTable> {
    GradeTableBuilder::default().build(grades_in_order, inputs)
}

/// Check the grade list and return it sorted by `order` (highest grade first).
pub fn validate_grades(grades: &[Grade]) -> Result<Vec<Grade>> {
    if grades.is_empty() {
        return Err(GradingError::Validation("grade list cannot be empty".to_string()));
    }

    let mut names = HashSet::new();
    let mut orders = HashSet::new();
    for grade in grades {
        if grade.name.trim().is_empty() {
            return Err(GradingError::Validation("grade name cannot be blank".to_string()));
        }
        if !names.insert(grade.name.as_str()) {
            return Err(GradingError::Validation(format!("duplicate grade name '{}'", grade.name)));
        }
        if !orders.insert(grade.order) {
            return Err(GradingError::Validation(format!(
                "duplicate grade order {} ('{}')",
                grade.order, grade.name
            )));
        }
    }

    let base_count = grades.iter().filter(|g| g.is_base).count();
    if base_count != 1 {
        return Err(GradingError::Validation(format!(
            "exactly one base grade required, found {}",
            base_count
        )));
    }

    let mut sorted = grades.to_vec();
    sorted.sort_by_key(|g| g.order);

    if let Some(last) = sorted.last() {
        if !last.is_base {
            return Err(GradingError::Validation(format!(
                "base grade must be the lowest ranked, but '{}' has the highest order",
                last.name
            )));
        }
    }

    Ok(sorted)
}

fn validate_base_value(base_value: Option<f64>) -> Result<f64> {
    match base_value {
        None => Err(GradingError::Validation("missing base value".to_string())),
        Some(v) if !v.is_finite() || v <= 0.0 => {
            Err(GradingError::Validation(format!("base value must be a positive number, got {v}")))
        }
        Some(v) => Ok(v),
    }
}

/// Mean of the non-base vertical percents, 0 when only the base grade exists.
pub fn vertical_average(grades: &[Grade], inputs: &ScenarioInputs) -> f64 {
    let values: Vec<f64> = grades
        .iter()
        .filter(|g| !g.is_base)
        .map(|g| inputs.vertical_for(&g.name).unwrap_or(0.0))
        .collect();

    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
