//! JSON API for grade table and scenario operations
//!
//! Every endpoint takes a JSON request string and returns a JSON string holding
//! an `ApiResponse<T>` envelope. Failures never panic; they come back as
//! `success: false` with a stable error code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::engine::{
    grade_deltas, GradeDelta, GradeTableBuilder, MetricsCalculator, DEFAULT_ROUNDING_UNIT,
};
use crate::error::GradingError;
use crate::persistence::ScenarioRepository;
use crate::store::ScenarioStore;
use crate::types::{Grade, GradeTable, Headcount, InputsPatch, Metrics, ScenarioInputs};

/// API version for schema compatibility
pub const API_VERSION: &str = "v1";

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub schema_version: String,
    pub timestamp: DateTime<Utc>,
}

/// Structured API error with codes and details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl ApiError {
    pub fn new(code: &str, message: &str) -> Self {
        Self { code: code.to_string(), message: message.to_string(), details: None }
    }

    pub fn from_grading_error(err: &GradingError) -> Self {
        let mut details = HashMap::new();
        details.insert("recoverable".to_string(), serde_json::Value::Bool(err.is_recoverable()));
        if let Some(grade) = err.grade() {
            details.insert("grade".to_string(), serde_json::Value::String(grade.to_string()));
        }
        Self { code: err.code().to_string(), message: err.to_string(), details: Some(details) }
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        Self::from_grading_error(&err)
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            schema_version: API_VERSION.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            schema_version: API_VERSION.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Table build request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTableRequest {
    pub schema_version: Option<String>,
    pub grades: Vec<Grade>,
    pub inputs: ScenarioInputs,
    pub rounding_unit: Option<f64>,
}

/// Candidate vs baseline request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRequest {
    pub schema_version: Option<String>,
    pub candidate: GradeTable,
    pub baseline: GradeTable,
    #[serde(default)]
    pub headcount: Headcount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResponse {
    pub metrics: Metrics,
    pub deltas: Vec<GradeDelta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    pub schema_version: Option<String>,
    pub name: String,
    pub created_by: String,
    pub inputs: ScenarioInputs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDraftRequest {
    pub schema_version: Option<String>,
    pub id: String,
    #[serde(default)]
    pub changes: InputsPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAsCurrentRequest {
    pub schema_version: Option<String>,
    pub id: String,
    #[serde(default)]
    pub headcount: Headcount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRequest {
    pub schema_version: Option<String>,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    pub schema_version: Option<String>,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub include_current: bool,
}

fn to_json<T: Serialize>(response: &ApiResponse<T>) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| "{}".to_string())
}

fn parse_request<T: for<'de> Deserialize<'de>>(request_json: &str, kind: &str) -> Result<T, ApiError> {
    serde_json::from_str(request_json).map_err(|e| {
        error!("Failed to parse {}: {}", kind, e);
        ApiError::new("INVALID_JSON", &format!("Invalid JSON format: {}", e))
    })
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> String {
    match result {
        Ok(data) => to_json(&ApiResponse::success(data)),
        Err(error) => to_json(&ApiResponse::<T>::error(error)),
    }
}

fn failure(operation: &str, err: GradingError) -> ApiError {
    if err.is_validation() {
        warn!("{} rejected: {}", operation, err);
    } else {
        error!("{} failed: {}", operation, err);
    }
    ApiError::from(err)
}

/// Build a grade table from a JSON request string
///
/// # Returns
/// JSON string containing ApiResponse<GradeTable>
pub fn build_table_json(request_json: &str) -> String {
    info!("Processing grade table build request");
    respond(build_table_from_request(request_json))
}

fn build_table_from_request(request_json: &str) -> Result<GradeTable, ApiError> {
    let request: BuildTableRequest = parse_request(request_json, "BuildTableRequest")?;
    let unit = request.rounding_unit.unwrap_or(DEFAULT_ROUNDING_UNIT);
    if !unit.is_finite() || unit <= 0.0 {
        return Err(ApiError::new(
            "VALIDATION_ERROR",
            &format!("rounding unit must be a positive number, got {unit}"),
        ));
    }

    let table = GradeTableBuilder::new(unit)
        .build(&request.grades, &request.inputs)
        .map_err(|e| failure("Table build", e))?;
    info!("Built grade table with {} rows", table.len());
    Ok(table)
}

/// Compare a candidate table against a baseline
///
/// # Returns
/// JSON string containing ApiResponse<DiffResponse>
pub fn diff_json(request_json: &str) -> String {
    info!("Processing diff request");
    respond(parse_request::<DiffRequest>(request_json, "DiffRequest").map(|request| {
        let deltas = grade_deltas(&request.candidate, &request.baseline, &request.headcount);
        DiffResponse { metrics: MetricsCalculator::summarize(&deltas), deltas }
    }))
}

/// Create a draft scenario in the store
///
/// # Returns
/// JSON string containing ApiResponse<Scenario>
pub fn create_draft_json<R: ScenarioRepository>(
    request_json: &str,
    store: &mut ScenarioStore<R>,
) -> String {
    info!("Processing draft creation request");
    respond(parse_request::<CreateDraftRequest>(request_json, "CreateDraftRequest").and_then(
        |request| {
            store
                .create_draft(&request.name, &request.created_by, request.inputs)
                .map_err(|e| failure("Draft creation", e))
        },
    ))
}

/// Apply changed inputs to a draft
///
/// # Returns
/// JSON string containing ApiResponse<Scenario>
pub fn update_draft_json<R: ScenarioRepository>(
    request_json: &str,
    store: &mut ScenarioStore<R>,
) -> String {
    info!("Processing draft update request");
    respond(parse_request::<UpdateDraftRequest>(request_json, "UpdateDraftRequest").and_then(
        |request| {
            store.update_draft(&request.id, &request.changes).map_err(|e| failure("Draft update", e))
        },
    ))
}

/// Promote a draft to the current scenario
///
/// # Returns
/// JSON string containing ApiResponse<Scenario>
pub fn save_as_current_json<R: ScenarioRepository>(
    request_json: &str,
    store: &mut ScenarioStore<R>,
) -> String {
    info!("Processing save-as-current request");
    respond(parse_request::<SaveAsCurrentRequest>(request_json, "SaveAsCurrentRequest").and_then(
        |request| {
            store
                .save_as_current(&request.id, &request.headcount)
                .map_err(|e| failure("Promotion", e))
        },
    ))
}

/// Archive a draft
///
/// # Returns
/// JSON string containing ApiResponse<Scenario>
pub fn archive_json<R: ScenarioRepository>(
    request_json: &str,
    store: &mut ScenarioStore<R>,
) -> String {
    info!("Processing archive request");
    respond(
        parse_request::<ArchiveRequest>(request_json, "ArchiveRequest")
            .and_then(|request| store.archive(&request.id).map_err(|e| failure("Archive", e))),
    )
}

/// Side-by-side view of several scenarios
///
/// # Returns
/// JSON string containing ApiResponse<ComparisonView>
pub fn compare_json<R: ScenarioRepository>(request_json: &str, store: &ScenarioStore<R>) -> String {
    info!("Processing comparison request");
    respond(parse_request::<CompareRequest>(request_json, "CompareRequest").and_then(|request| {
        store
            .compare(&request.ids, request.include_current)
            .map_err(|e| failure("Comparison", e))
    }))
}
