//! Grading CLI library
//!
//! File-level operations behind the `grading` binary: read JSON inputs, run the
//! engine, open a snapshot-file store, and render results as text.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use grading_core::{
    grade_deltas, ComparisonView, FileRepository, Grade, GradeDelta, GradeReferenceSource,
    GradeTable, GradeTableBuilder, GradingConfig, GradingError, Headcount, Metrics,
    MetricsCalculator, Scenario, ScenarioInputs, ScenarioRepository, ScenarioStatus,
    ScenarioStore,
};

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} JSON: {}", what, path.display()))
}

/// Config from `--config`, else `GRADING_CONFIG_PATH`, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<GradingConfig> {
    let config = match path {
        Some(path) => GradingConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => GradingConfig::from_env().context("Failed to load config from environment")?,
    };
    Ok(config)
}

pub fn build_table(grades: &Path, inputs: &Path, config: &GradingConfig) -> Result<GradeTable> {
    let grades: Vec<Grade> = read_json(grades, "grades")?;
    let inputs: ScenarioInputs = read_json(inputs, "inputs")?;
    let table = GradeTableBuilder::from_config(config)
        .build(&grades, &inputs)
        .context("Failed to build grade table")?;
    Ok(table)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    pub metrics: Metrics,
    pub deltas: Vec<GradeDelta>,
}

pub fn diff_tables(candidate: &Path, baseline: &Path, headcount: &Path) -> Result<DiffReport> {
    let candidate: GradeTable = read_json(candidate, "candidate table")?;
    let baseline: GradeTable = read_json(baseline, "baseline table")?;
    let headcount: Headcount = read_json(headcount, "headcount")?;

    let deltas = grade_deltas(&candidate, &baseline, &headcount);
    Ok(DiffReport { metrics: MetricsCalculator::summarize(&deltas), deltas })
}

/// Grade ordering recovered from a store's own records.
///
/// Uses the current scenario's table, or the newest scenario when nothing is current.
struct StoredGrades {
    grades: Vec<Grade>,
}

impl StoredGrades {
    fn from_scenarios(scenarios: &[Scenario]) -> Self {
        let source = scenarios
            .iter()
            .find(|s| s.status == ScenarioStatus::Current)
            .or_else(|| scenarios.iter().max_by_key(|s| s.created_at));
        let grades = source
            .map(|s| s.table.rows.iter().map(|row| row.grade.clone()).collect())
            .unwrap_or_default();
        Self { grades }
    }
}

impl GradeReferenceSource for StoredGrades {
    fn grades(&self) -> grading_core::Result<Vec<Grade>> {
        if self.grades.is_empty() {
            return Err(GradingError::Validation("store holds no scenarios".to_string()));
        }
        Ok(self.grades.clone())
    }

    fn current_table(&self) -> grading_core::Result<Option<GradeTable>> {
        Ok(None)
    }
}

pub fn open_store(path: &Path, config: GradingConfig) -> Result<ScenarioStore<FileRepository>> {
    let repository = FileRepository::open(path)
        .with_context(|| format!("Failed to open scenario store: {}", path.display()))?;
    let reference = StoredGrades::from_scenarios(&repository.load_all()?);
    let store = ScenarioStore::open(&reference, repository, config)
        .with_context(|| format!("Failed to load scenario store: {}", path.display()))?;
    Ok(store)
}

pub fn compare(
    path: &Path,
    ids: &[String],
    include_current: bool,
    config: GradingConfig,
) -> Result<ComparisonView> {
    let store = open_store(path, config)?;
    let view = store.compare(ids, include_current).context("Comparison failed")?;
    Ok(view)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub status: ScenarioStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub base_value: f64,
    pub metrics: Option<Metrics>,
}

/// Every stored scenario: current first, then drafts, then archived, oldest first within each.
pub fn list(path: &Path) -> Result<Vec<ScenarioSummary>> {
    let repository = FileRepository::open(path)
        .with_context(|| format!("Failed to open scenario store: {}", path.display()))?;
    let mut scenarios = repository.load_all()?;
    scenarios.sort_by(|a, b| {
        status_rank(a.status).cmp(&status_rank(b.status)).then_with(|| a.created_at.cmp(&b.created_at))
    });

    Ok(scenarios
        .into_iter()
        .map(|s| ScenarioSummary {
            base_value: s.table.base_value,
            id: s.id,
            name: s.name,
            status: s.status,
            created_at: s.created_at,
            created_by: s.created_by,
            metrics: s.metrics,
        })
        .collect())
}

fn status_rank(status: ScenarioStatus) -> u8 {
    match status {
        ScenarioStatus::Current => 0,
        ScenarioStatus::Draft => 1,
        ScenarioStatus::Archived => 2,
    }
}

// ========================
// Text rendering
// ========================

pub fn render_table(table: &GradeTable) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Grade", "LD", "LQ", "M", "UQ", "UD"
    );
    for row in &table.rows {
        let a = row.anchors;
        let marker = if row.grade.is_base { " *" } else { "" };
        let _ = writeln!(
            out,
            "{:<20} {:>10.0} {:>10.0} {:>10.0} {:>10.0} {:>10.0}",
            format!("{}{}", row.grade.name, marker),
            a.ld,
            a.lq,
            a.m,
            a.uq,
            a.ud
        );
    }
    let _ = writeln!(
        out,
        "Base value {:.0}, vertical avg {:.2}%, horizontal avg {:.2}%",
        table.base_value, table.vertical_avg, table.horizontal_avg
    );
    out
}

pub fn render_diff(report: &DiffReport) -> String {
    let mut out = String::new();
    for delta in &report.deltas {
        let percent = match delta.delta_percent {
            Some(p) => format!("{:+.2}%", p),
            None => "n/a".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<20} {:>10.0} -> {:>10.0}  {:>+10.0} ({})  x{}",
            delta.grade, delta.baseline_median, delta.candidate_median, delta.delta, percent, delta.headcount
        );
    }
    out.push_str(&render_metrics(&report.metrics));
    out
}

pub fn render_metrics(metrics: &Metrics) -> String {
    format!(
        "Budget impact {:.0}, avg increase {:.2}%, max increase {:.2}%, grades affected {}\n",
        metrics.total_budget_impact,
        metrics.avg_salary_increase_percent,
        metrics.max_salary_increase_percent,
        metrics.positions_affected
    )
}

/// One block per grade, one line per column showing its median.
pub fn render_comparison(view: &ComparisonView) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:<20}", "Grade");
    for column in &view.columns {
        let _ = write!(out, " {:>16}", truncate(&column.name, 16));
    }
    out.push('\n');

    for row in &view.rows {
        let _ = write!(out, "{:<20}", row.grade);
        for cell in &row.cells {
            match cell.anchors {
                Some(anchors) => {
                    let _ = write!(out, " {:>16.0}", anchors.m);
                }
                None => {
                    let _ = write!(out, " {:>16}", "-");
                }
            }
        }
        out.push('\n');
    }

    for id in &view.unresolved {
        let _ = writeln!(out, "Not found: {}", id);
    }
    out
}

pub fn render_list(summaries: &[ScenarioSummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        let impact = s
            .metrics
            .map(|m| format!("{:+.0}", m.total_budget_impact))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<9} {:<36} {:<24} base {:>8.0}  impact {:>10}  {} by {}",
            s.status.to_string(),
            s.id,
            truncate(&s.name, 24),
            s.base_value,
            impact,
            s.created_at.format("%Y-%m-%d %H:%M"),
            s.created_by
        );
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max.saturating_sub(1)).chain(std::iter::once('~')).collect()
    }
}
