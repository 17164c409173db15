//! Core data model for grade structures and scenarios.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Headcount per grade name, supplied by the employee directory.
pub type Headcount = BTreeMap<String, u32>;

/// One rung of the organizational hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub name: String,
    /// Rank in the hierarchy, 0 = highest.
    pub order: u32,
    #[serde(default)]
    pub is_base: bool,
}

impl Grade {
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        Self { name: name.into(), order, is_base: false }
    }

    pub fn base(name: impl Into<String>, order: u32) -> Self {
        Self { name: name.into(), order, is_base: true }
    }
}

/// The five reference salary points of a grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorSet {
    /// Lower decile
    pub ld: f64,
    /// Lower quartile
    pub lq: f64,
    /// Median
    pub m: f64,
    /// Upper quartile
    pub uq: f64,
    /// Upper decile
    pub ud: f64,
}

impl AnchorSet {
    pub const ZERO: AnchorSet = AnchorSet { ld: 0.0, lq: 0.0, m: 0.0, uq: 0.0, ud: 0.0 };

    pub fn as_array(&self) -> [f64; 5] {
        [self.ld, self.lq, self.m, self.uq, self.ud]
    }

    /// `LD <= LQ <= M <= UQ <= UD` and every anchor non-negative.
    pub fn is_monotonic(&self) -> bool {
        let values = self.as_array();
        values[0] >= 0.0 && values.windows(2).all(|w| w[0] <= w[1])
    }

    /// Spread between the upper and lower decile.
    pub fn band_width(&self) -> f64 {
        self.ud - self.ld
    }
}

/// Names of the four horizontal intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalKind {
    #[serde(rename = "LD_to_LQ")]
    LdToLq,
    #[serde(rename = "LQ_to_M")]
    LqToM,
    #[serde(rename = "M_to_UQ")]
    MToUq,
    #[serde(rename = "UQ_to_UD")]
    UqToUd,
}

impl IntervalKind {
    pub const ALL: [IntervalKind; 4] =
        [IntervalKind::LdToLq, IntervalKind::LqToM, IntervalKind::MToUq, IntervalKind::UqToUd];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalKind::LdToLq => "LD_to_LQ",
            IntervalKind::LqToM => "LQ_to_M",
            IntervalKind::MToUq => "M_to_UQ",
            IntervalKind::UqToUd => "UQ_to_UD",
        }
    }
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage spreads between adjacent anchors, shared by every grade.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HorizontalIntervals {
    #[serde(rename = "LD_to_LQ")]
    pub ld_to_lq: f64,
    #[serde(rename = "LQ_to_M")]
    pub lq_to_m: f64,
    #[serde(rename = "M_to_UQ")]
    pub m_to_uq: f64,
    #[serde(rename = "UQ_to_UD")]
    pub uq_to_ud: f64,
}

impl HorizontalIntervals {
    pub fn new(ld_to_lq: f64, lq_to_m: f64, m_to_uq: f64, uq_to_ud: f64) -> Self {
        Self { ld_to_lq, lq_to_m, m_to_uq, uq_to_ud }
    }

    /// Same percentage for all four intervals.
    pub fn uniform(percent: f64) -> Self {
        Self::new(percent, percent, percent, percent)
    }

    pub fn get(&self, kind: IntervalKind) -> f64 {
        match kind {
            IntervalKind::LdToLq => self.ld_to_lq,
            IntervalKind::LqToM => self.lq_to_m,
            IntervalKind::MToUq => self.m_to_uq,
            IntervalKind::UqToUd => self.uq_to_ud,
        }
    }

    pub fn set(&mut self, kind: IntervalKind, value: f64) {
        match kind {
            IntervalKind::LdToLq => self.ld_to_lq = value,
            IntervalKind::LqToM => self.lq_to_m = value,
            IntervalKind::MToUq => self.m_to_uq = value,
            IntervalKind::UqToUd => self.uq_to_ud = value,
        }
    }

    pub fn entries(&self) -> [(IntervalKind, f64); 4] {
        IntervalKind::ALL.map(|kind| (kind, self.get(kind)))
    }

    pub fn average(&self) -> f64 {
        (self.ld_to_lq + self.lq_to_m + self.m_to_uq + self.uq_to_ud) / 4.0
    }
}

/// Scalar inputs a grade table is derived from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioInputs {
    /// LD of the base grade. `None` is rejected at build time.
    #[serde(default)]
    pub base_value: Option<f64>,
    /// Step from the grade below, keyed by grade name. Only the base grade may be null or absent.
    #[serde(default)]
    pub vertical_percent: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub horizontal_intervals: HorizontalIntervals,
}

impl ScenarioInputs {
    pub fn new(base_value: f64, horizontal_intervals: HorizontalIntervals) -> Self {
        Self { base_value: Some(base_value), vertical_percent: BTreeMap::new(), horizontal_intervals }
    }

    pub fn with_vertical(mut self, grade: impl Into<String>, percent: f64) -> Self {
        self.vertical_percent.insert(grade.into(), Some(percent));
        self
    }

    pub fn vertical_for(&self, grade: &str) -> Option<f64> {
        self.vertical_percent.get(grade).copied().flatten()
    }

    /// Merge a partial update, last write wins per field.
    pub fn apply(&mut self, patch: &InputsPatch) {
        if let Some(base_value) = patch.base_value {
            self.base_value = Some(base_value);
        }
        for (grade, percent) in &patch.vertical_percent {
            self.vertical_percent.insert(grade.clone(), *percent);
        }
        for kind in IntervalKind::ALL {
            if let Some(value) = patch.horizontal_intervals.get(kind) {
                self.horizontal_intervals.set(kind, value);
            }
        }
    }
}

/// Partial update for a draft's inputs. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputsPatch {
    #[serde(default)]
    pub base_value: Option<f64>,
    /// `Some(v)` sets a grade's percent, `None` clears it.
    #[serde(default)]
    pub vertical_percent: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub horizontal_intervals: IntervalsPatch,
}

impl InputsPatch {
    pub fn is_empty(&self) -> bool {
        self.base_value.is_none()
            && self.vertical_percent.is_empty()
            && IntervalKind::ALL.iter().all(|k| self.horizontal_intervals.get(*k).is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntervalsPatch {
    #[serde(default, rename = "LD_to_LQ")]
    pub ld_to_lq: Option<f64>,
    #[serde(default, rename = "LQ_to_M")]
    pub lq_to_m: Option<f64>,
    #[serde(default, rename = "M_to_UQ")]
    pub m_to_uq: Option<f64>,
    #[serde(default, rename = "UQ_to_UD")]
    pub uq_to_ud: Option<f64>,
}

impl IntervalsPatch {
    pub fn get(&self, kind: IntervalKind) -> Option<f64> {
        match kind {
            IntervalKind::LdToLq => self.ld_to_lq,
            IntervalKind::LqToM => self.lq_to_m,
            IntervalKind::MToUq => self.m_to_uq,
            IntervalKind::UqToUd => self.uq_to_ud,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRow {
    pub grade: Grade,
    pub anchors: AnchorSet,
}

/// A complete salary band table, rows ordered from highest grade (order 0) down to the base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTable {
    pub rows: Vec<GradeRow>,
    pub base_value: f64,
    pub vertical_avg: f64,
    pub horizontal_avg: f64,
}

impl GradeTable {
    /// Table with every anchor at zero, used as the baseline before anything is current.
    pub fn zeroed(grades: &[Grade]) -> Self {
        let mut rows: Vec<GradeRow> = grades
            .iter()
            .map(|grade| GradeRow { grade: grade.clone(), anchors: AnchorSet::ZERO })
            .collect();
        rows.sort_by_key(|row| row.grade.order);
        Self { rows, base_value: 0.0, vertical_avg: 0.0, horizontal_avg: 0.0 }
    }

    pub fn row(&self, grade: &str) -> Option<&GradeRow> {
        self.rows.iter().find(|row| row.grade.name == grade)
    }

    pub fn anchors(&self, grade: &str) -> Option<&AnchorSet> {
        self.row(grade).map(|row| &row.anchors)
    }

    pub fn base_row(&self) -> Option<&GradeRow> {
        self.rows.iter().find(|row| row.grade.is_base)
    }

    pub fn grade_names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.grade.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Draft,
    Current,
    Archived,
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioStatus::Draft => write!(f, "draft"),
            ScenarioStatus::Current => write!(f, "current"),
            ScenarioStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Financial impact of a candidate table against the live baseline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_budget_impact: f64,
    pub avg_salary_increase_percent: f64,
    pub max_salary_increase_percent: f64,
    /// Grades whose median differs from the baseline.
    pub positions_affected: usize,
}

/// One named what-if grade table plus its lifecycle status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub status: ScenarioStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub inputs: ScenarioInputs,
    pub table: GradeTable,
    pub metrics: Option<Metrics>,
}

impl Scenario {
    pub fn is_draft(&self) -> bool {
        self.status == ScenarioStatus::Draft
    }
}
