//! Side-by-side views of several scenarios over the same grade ordering.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{GradingError, Result};
use crate::persistence::ScenarioRepository;
use crate::store::ScenarioStore;
use crate::types::{AnchorSet, GradeTable, Metrics, ScenarioStatus};

/// Column id of the live baseline.
pub const CURRENT_COLUMN_ID: &str = "current";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonColumn {
    pub id: String,
    pub name: String,
    /// `None` for a reference baseline that is not backed by a scenario.
    pub status: Option<ScenarioStatus>,
    pub base_value: f64,
    pub vertical_avg: f64,
    pub horizontal_avg: f64,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonCell {
    pub scenario_id: String,
    /// `None` when that scenario's table lacks the grade.
    pub anchors: Option<AnchorSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub grade: String,
    pub order: u32,
    pub cells: Vec<ComparisonCell>,
}

impl ComparisonRow {
    pub fn cell(&self, scenario_id: &str) -> Option<&ComparisonCell> {
        self.cells.iter().find(|c| c.scenario_id == scenario_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonView {
    pub columns: Vec<ComparisonColumn>,
    pub rows: Vec<ComparisonRow>,
    /// Requested ids that matched no scenario.
    pub unresolved: Vec<String>,
}

impl ComparisonView {
    pub fn row(&self, grade: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.grade == grade)
    }
}

pub struct ComparisonEngine;

impl ComparisonEngine {
    /// Resolve ids against the store, optionally prepending the live table as `"current"`.
    pub fn compare<R: ScenarioRepository>(
        store: &ScenarioStore<R>,
        ids: &[String],
        include_current: bool,
    ) -> Result<ComparisonView> {
        let mut resolved: Vec<(ComparisonColumn, &GradeTable)> = Vec::new();
        let mut unresolved = Vec::new();

        if include_current {
            match store.current_table() {
                Some(table) => {
                    let scenario = store.current();
                    resolved.push((
                        ComparisonColumn {
                            id: CURRENT_COLUMN_ID.to_string(),
                            name: scenario
                                .map(|s| s.name.clone())
                                .unwrap_or_else(|| "Current structure".to_string()),
                            status: scenario.map(|s| s.status),
                            base_value: table.base_value,
                            vertical_avg: table.vertical_avg,
                            horizontal_avg: table.horizontal_avg,
                            metrics: scenario.and_then(|s| s.metrics),
                        },
                        table,
                    ));
                }
                None => debug!("No current table to include in comparison"),
            }
        }

        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match store.get(id) {
                Some(scenario) => resolved.push((
                    ComparisonColumn {
                        id: scenario.id.clone(),
                        name: scenario.name.clone(),
                        status: Some(scenario.status),
                        base_value: scenario.table.base_value,
                        vertical_avg: scenario.table.vertical_avg,
                        horizontal_avg: scenario.table.horizontal_avg,
                        metrics: scenario.metrics,
                    },
                    &scenario.table,
                )),
                None => {
                    warn!("Comparison skipped unknown scenario {}", id);
                    unresolved.push(id.clone());
                }
            }
        }

        if resolved.is_empty() {
            return Err(GradingError::EmptySelection);
        }

        let tables: Vec<(String, &GradeTable)> =
            resolved.iter().map(|(column, table)| (column.id.clone(), *table)).collect();
        let rows = build_rows(&tables);
        let columns = resolved.into_iter().map(|(column, _)| column).collect();

        Ok(ComparisonView { columns, rows, unresolved })
    }
}

/// One row per grade name across all tables, ordered by hierarchy rank.
pub fn build_rows(tables: &[(String, &GradeTable)]) -> Vec<ComparisonRow> {
    let mut grades: Vec<(String, u32)> = Vec::new();
    for (_, table) in tables {
        for row in &table.rows {
            if !grades.iter().any(|(name, _)| name == &row.grade.name) {
                grades.push((row.grade.name.clone(), row.grade.order));
            }
        }
    }
    grades.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    grades
        .into_iter()
        .map(|(grade, order)| ComparisonRow {
            cells: tables
                .iter()
                .map(|(id, table)| ComparisonCell {
                    scenario_id: id.clone(),
                    anchors: table.anchors(&grade).copied(),
                })
                .collect(),
            grade,
            order,
        })
        .collect()
}
