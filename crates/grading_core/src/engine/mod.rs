//! Pure computation: anchors, tables, metrics.

pub mod anchor_math;
pub mod metrics;
pub mod table_builder;

pub use anchor_math::{
    horizontal_expand, horizontal_expand_with_unit, round_to_unit, validate_intervals,
    vertical_step, vertical_step_with_unit, DEFAULT_ROUNDING_UNIT,
};
pub use metrics::{diff, grade_deltas, GradeDelta, MetricsCalculator};
pub use table_builder::{build, validate_grades, vertical_average, GradeTableBuilder};
