//! Anchor math: one grade's five anchors from its LD, and one grade's LD from the grade below.
//!
//! Every anchor is defined relative to LD so a single forward chain computes the whole set.
//! The chain is carried at full precision and each anchor is rounded once on output.

use crate::error::{GradingError, Result};
use crate::types::{AnchorSet, HorizontalIntervals};

/// Default rounding: nearest whole currency unit.
pub const DEFAULT_ROUNDING_UNIT: f64 = 1.0;

/// Round to the nearest multiple of `unit`.
#[inline]
pub fn round_to_unit(value: f64, unit: f64) -> f64 {
    (value / unit).round() * unit
}

/// Reject negative or non-finite interval percentages.
pub fn validate_intervals(intervals: &HorizontalIntervals) -> Result<()> {
    for (interval, value) in intervals.entries() {
        if !value.is_finite() || value < 0.0 {
            return Err(GradingError::InvalidInterval { interval, value, grade: None });
        }
    }
    Ok(())
}

/// Expand a grade's LD into its full anchor set, rounded to whole units.
pub fn horizontal_expand(ld: f64, intervals: &HorizontalIntervals) -> Result<AnchorSet> {
    horizontal_expand_with_unit(ld, intervals, DEFAULT_ROUNDING_UNIT)
}

pub fn horizontal_expand_with_unit(
    ld: f64,
    intervals: &HorizontalIntervals,
    unit: f64,
) -> Result<AnchorSet> {
    validate_intervals(intervals)?;
    if !ld.is_finite() || ld < 0.0 {
        return Err(GradingError::Validation(format!(
            "lower decile must be a non-negative number, got {ld}"
        )));
    }

    let lq = ld * (1.0 + intervals.ld_to_lq / 100.0);
    let m = lq * (1.0 + intervals.lq_to_m / 100.0);
    let uq = m * (1.0 + intervals.m_to_uq / 100.0);
    let ud = uq * (1.0 + intervals.uq_to_ud / 100.0);

    let anchors = AnchorSet {
        ld: round_to_unit(ld, unit),
        lq: round_to_unit(lq, unit),
        m: round_to_unit(m, unit),
        uq: round_to_unit(uq, unit),
        ud: round_to_unit(ud, unit),
    };

    if !anchors.is_monotonic() {
        return Err(GradingError::NonMonotonic { grade: None });
    }
    Ok(anchors)
}

/// LD of the grade above, given the LD of the grade below and the vertical step.
pub fn vertical_step(lower_grade_ld: f64, vertical_percent: Option<f64>) -> Result<f64> {
    vertical_step_with_unit(lower_grade_ld, vertical_percent, DEFAULT_ROUNDING_UNIT)
}

pub fn vertical_step_with_unit(
    lower_grade_ld: f64,
    vertical_percent: Option<f64>,
    unit: f64,
) -> Result<f64> {
    let percent = match vertical_percent {
        Some(p) if p.is_finite() && p >= 0.0 => p,
        other => return Err(GradingError::InvalidVertical { value: other, grade: None }),
    };
    Ok(round_to_unit(lower_grade_ld * (1.0 + percent / 100.0), unit))
}
