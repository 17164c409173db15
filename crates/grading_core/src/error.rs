use thiserror::Error;

use crate::persistence::PersistenceError;
use crate::types::{IntervalKind, ScenarioStatus};

#[derive(Error, Debug)]
pub enum GradingError {
    #[error("Invalid horizontal interval {interval}: {value}{}", grade_suffix(.grade))]
    InvalidInterval { interval: IntervalKind, value: f64, grade: Option<String> },

    #[error("Invalid vertical percent {}{}", display_value(.value), grade_suffix(.grade))]
    InvalidVertical { value: Option<f64>, grade: Option<String> },

    #[error("Anchors out of order{}", grade_suffix(.grade))]
    NonMonotonic { grade: Option<String> },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scenario not found: {id}")]
    NotFound { id: String },

    #[error("Scenario {id} is {status} and cannot be modified")]
    Immutable { id: String, status: ScenarioStatus },

    #[error("Comparison requires at least one resolvable scenario")]
    EmptySelection,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Config error: {0}")]
    Config(String),
}

fn grade_suffix(grade: &Option<String>) -> String {
    match grade {
        Some(name) => format!(" (grade '{}')", name),
        None => String::new(),
    }
}

fn display_value(value: &Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<missing>".to_string(),
    }
}

impl GradingError {
    /// Attach the offending grade to an anchor computation error.
    pub fn with_grade(self, name: &str) -> Self {
        match self {
            GradingError::InvalidInterval { interval, value, .. } => {
                GradingError::InvalidInterval { interval, value, grade: Some(name.to_string()) }
            }
            GradingError::InvalidVertical { value, .. } => {
                GradingError::InvalidVertical { value, grade: Some(name.to_string()) }
            }
            GradingError::NonMonotonic { .. } => {
                GradingError::NonMonotonic { grade: Some(name.to_string()) }
            }
            other => other,
        }
    }

    /// Input problems the user can correct in place.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GradingError::InvalidInterval { .. }
                | GradingError::InvalidVertical { .. }
                | GradingError::Validation(_)
        )
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            GradingError::NonMonotonic { .. } => false,
            GradingError::Persistence(err) => err.is_recoverable(),
            _ => true,
        }
    }

    /// Stable code used by the JSON API.
    pub fn code(&self) -> &'static str {
        match self {
            GradingError::InvalidInterval { .. } => "INVALID_INTERVAL",
            GradingError::InvalidVertical { .. } => "INVALID_VERTICAL",
            GradingError::NonMonotonic { .. } => "NON_MONOTONIC",
            GradingError::Validation(_) => "VALIDATION_ERROR",
            GradingError::NotFound { .. } => "NOT_FOUND",
            GradingError::Immutable { .. } => "IMMUTABLE",
            GradingError::EmptySelection => "EMPTY_SELECTION",
            GradingError::Persistence(_) => "PERSISTENCE_ERROR",
            GradingError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// The grade an anchor error refers to, if known.
    pub fn grade(&self) -> Option<&str> {
        match self {
            GradingError::InvalidInterval { grade, .. }
            | GradingError::InvalidVertical { grade, .. }
            | GradingError::NonMonotonic { grade } => grade.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GradingError>;
