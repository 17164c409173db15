//! # grading_core - Grade Structure Scenario Engine
//!
//! Builds salary-band tables for a ranked list of grades from a handful of
//! percentage inputs, measures their financial impact against the live
//! structure, and tracks named what-if scenarios through their lifecycle.
//!
//! ## Features
//! - Deterministic anchor arithmetic (LD, LQ, M, UQ, UD) with per-anchor rounding
//! - Budget impact metrics weighted by headcount
//! - Draft / current / archived lifecycle with a pluggable repository
//! - Side-by-side comparison views
//! - JSON API for UI integration

pub mod api;
pub mod comparison;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod sources;
pub mod store;
pub mod types;

pub use comparison::{
    ComparisonCell, ComparisonColumn, ComparisonEngine, ComparisonRow, ComparisonView,
    CURRENT_COLUMN_ID,
};
pub use config::{GradingConfig, SupersedePolicy};
pub use engine::{build, diff, grade_deltas, GradeDelta, GradeTableBuilder, MetricsCalculator};
pub use error::{GradingError, Result};
pub use persistence::{
    FileRepository, InMemoryRepository, PersistenceError, ScenarioRepository, Transition,
};
pub use sources::{GradeReferenceSource, HeadcountSource, StaticReference};
pub use store::{Clock, ScenarioStore, SteppingClock, SystemClock};
pub use types::{
    AnchorSet, Grade, GradeRow, GradeTable, Headcount, HorizontalIntervals, InputsPatch,
    IntervalKind, IntervalsPatch, Metrics, Scenario, ScenarioInputs, ScenarioStatus,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
