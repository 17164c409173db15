//! Scenario lifecycle: draft -> current, draft -> archived.
//!
//! The store owns the single live "current" scenario. Every mutation is written
//! to the repository first and applied in memory only after it is acknowledged,
//! so a failed write leaves the store exactly as it was.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use crate::comparison::{ComparisonEngine, ComparisonView};
use crate::config::{GradingConfig, SupersedePolicy};
use crate::engine::{validate_grades, GradeTableBuilder, MetricsCalculator};
use crate::error::{GradingError, Result};
use crate::persistence::{ScenarioRepository, Superseded, Transition};
use crate::sources::{GradeReferenceSource, StaticReference};
use crate::types::{
    Grade, GradeTable, Headcount, InputsPatch, Metrics, Scenario, ScenarioInputs, ScenarioStatus,
};

pub struct ScenarioStore<R: ScenarioRepository> {
    /// Validated, sorted highest grade first.
    grades: Vec<Grade>,
    config: GradingConfig,
    builder: GradeTableBuilder,
    repository: R,
    clock: Box<dyn Clock>,

    current: Option<Scenario>,
    drafts: Vec<Scenario>,
    archived: Vec<Scenario>,

    /// Live table from the reference source, used while no scenario is current.
    reference_baseline: Option<GradeTable>,
}

impl<R: ScenarioRepository> ScenarioStore<R> {
    /// Rebuild the store from the repository's records.
    pub fn open(
        reference: &dyn GradeReferenceSource,
        repository: R,
        config: GradingConfig,
    ) -> Result<Self> {
        config.validate()?;
        let grades = validate_grades(&reference.grades()?)?;
        let reference_baseline = reference.current_table()?;
        let scenarios = repository.load_all()?;

        let mut store = Self {
            grades,
            builder: GradeTableBuilder::from_config(&config),
            config,
            repository,
            clock: Box::new(SystemClock),
            current: None,
            drafts: Vec::new(),
            archived: Vec::new(),
            reference_baseline,
        };

        for scenario in scenarios {
            match scenario.status {
                ScenarioStatus::Draft => store.drafts.push(scenario),
                ScenarioStatus::Archived => store.archived.push(scenario),
                ScenarioStatus::Current => {
                    if let Some(existing) = &store.current {
                        return Err(GradingError::Validation(format!(
                            "repository holds two current scenarios: {} and {}",
                            existing.id, scenario.id
                        )));
                    }
                    store.current = Some(scenario);
                }
            }
        }
        store.check_invariants()?;

        info!(
            "Opened scenario store: {} grades, {} drafts, {} archived, current: {}",
            store.grades.len(),
            store.drafts.len(),
            store.archived.len(),
            store.current.as_ref().map(|s| s.id.as_str()).unwrap_or("none")
        );
        Ok(store)
    }

    /// Store over a fixed grade list with default configuration.
    pub fn new(grades: Vec<Grade>, repository: R) -> Result<Self> {
        Self::open(&StaticReference::new(grades), repository, GradingConfig::default())
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    // ========================
    // Queries
    // ========================

    pub fn grades(&self) -> &[Grade] {
        &self.grades
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn current(&self) -> Option<&Scenario> {
        self.current.as_ref()
    }

    pub fn drafts(&self) -> &[Scenario] {
        &self.drafts
    }

    pub fn archived(&self) -> &[Scenario] {
        &self.archived
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.current
            .iter()
            .chain(self.drafts.iter())
            .chain(self.archived.iter())
            .find(|s| s.id == id)
    }

    /// The live baseline: the current scenario's table, else the reference table.
    pub fn current_table(&self) -> Option<&GradeTable> {
        self.current.as_ref().map(|s| &s.table).or(self.reference_baseline.as_ref())
    }

    /// Baseline metrics are computed against; all-zero anchors when nothing is live yet.
    fn metrics_baseline(&self) -> GradeTable {
        self.current_table().cloned().unwrap_or_else(|| GradeTable::zeroed(&self.grades))
    }

    /// Re-read grade ordering and the reference table after the baseline changed upstream.
    ///
    /// Every draft is rebuilt over the new grade list and its metrics cleared. Nothing
    /// changes unless all drafts rebuild and every rewrite is acknowledged.
    pub fn refresh_reference(&mut self, reference: &dyn GradeReferenceSource) -> Result<()> {
        let grades = validate_grades(&reference.grades()?)?;
        let baseline = reference.current_table()?;

        let rebuilt = self
            .drafts
            .iter()
            .map(|draft| {
                let table = self.builder.build(&grades, &draft.inputs).map_err(|e| {
                    warn!("Draft {} cannot be rebuilt over the new grades: {}", draft.id, e);
                    e
                })?;
                Ok(Scenario { table, metrics: None, ..draft.clone() })
            })
            .collect::<Result<Vec<_>>>()?;

        for (written, draft) in rebuilt.iter().enumerate() {
            if let Err(e) = self.repository.update_draft(draft) {
                error!("Failed to persist rebuilt draft {}: {}", draft.id, e);
                for previous in &self.drafts[..written] {
                    if let Err(restore) = self.repository.update_draft(previous) {
                        error!("Failed to restore draft {}: {}", previous.id, restore);
                    }
                }
                return Err(e.into());
            }
        }

        self.grades = grades;
        self.reference_baseline = baseline;
        self.drafts = rebuilt;
        info!(
            "Refreshed reference data: {} grades, {} drafts rebuilt",
            self.grades.len(),
            self.drafts.len()
        );
        Ok(())
    }

    // ========================
    // Lifecycle operations
    // ========================

    pub fn create_draft(
        &mut self,
        name: &str,
        created_by: &str,
        inputs: ScenarioInputs,
    ) -> Result<Scenario> {
        let name = self.validate_draft_name(name)?;
        let table = self.builder.build(&self.grades, &inputs)?;

        let scenario = Scenario {
            id: Uuid::new_v4().to_string(),
            name,
            status: ScenarioStatus::Draft,
            created_at: self.clock.now(),
            created_by: created_by.to_string(),
            inputs,
            table,
            metrics: None,
        };

        self.repository.insert_draft(&scenario).map_err(|e| {
            error!("Failed to persist new draft '{}': {}", scenario.name, e);
            GradingError::from(e)
        })?;
        self.drafts.push(scenario.clone());

        info!("Created draft scenario: {} (ID: {})", scenario.name, scenario.id);
        Ok(scenario)
    }

    /// Merge changed inputs into a draft and rebuild its table. Clears stale metrics.
    pub fn update_draft(&mut self, id: &str, patch: &InputsPatch) -> Result<Scenario> {
        let idx = self.draft_index(id)?;

        let mut inputs = self.drafts[idx].inputs.clone();
        inputs.apply(patch);
        let table = self.builder.build(&self.grades, &inputs)?;

        let updated = Scenario { inputs, table, metrics: None, ..self.drafts[idx].clone() };
        self.repository.update_draft(&updated).map_err(|e| {
            error!("Failed to persist draft update {}: {}", id, e);
            GradingError::from(e)
        })?;
        self.drafts[idx] = updated.clone();

        debug!("Updated draft scenario: {} (ID: {})", updated.name, updated.id);
        Ok(updated)
    }

    /// Compute a draft's metrics against the live baseline and attach them.
    pub fn evaluate_draft(&mut self, id: &str, headcount: &Headcount) -> Result<Metrics> {
        let idx = self.draft_index(id)?;
        let metrics = MetricsCalculator::diff(&self.drafts[idx].table, &self.metrics_baseline(), headcount);

        let evaluated = Scenario { metrics: Some(metrics), ..self.drafts[idx].clone() };
        self.repository.update_draft(&evaluated).map_err(|e| {
            error!("Failed to persist metrics for draft {}: {}", id, e);
            GradingError::from(e)
        })?;
        self.drafts[idx] = evaluated;

        debug!("Evaluated draft {}: {:?}", id, metrics);
        Ok(metrics)
    }

    /// Promote a draft to current. The previous current is handled per `supersede_policy`.
    pub fn save_as_current(&mut self, id: &str, headcount: &Headcount) -> Result<Scenario> {
        let idx = self.draft_index(id)?;
        let draft = &self.drafts[idx];

        if let (SupersedePolicy::RetainAsDraft, Some(previous)) =
            (self.config.supersede_policy, &self.current)
        {
            let clash = self.drafts.iter().enumerate().any(|(i, s)| {
                i != idx && s.name.to_lowercase() == previous.name.to_lowercase()
            });
            if clash {
                warn!("Promotion of {} blocked: draft name '{}' is taken", id, previous.name);
                return Err(GradingError::Validation(format!(
                    "cannot return '{}' to drafts: a draft with that name already exists",
                    previous.name
                )));
            }
        }

        let metrics = MetricsCalculator::diff(&draft.table, &self.metrics_baseline(), headcount);
        let promoted =
            Scenario { status: ScenarioStatus::Current, metrics: Some(metrics), ..draft.clone() };

        let superseded = self.current.as_ref().map(|previous| match self.config.supersede_policy {
            SupersedePolicy::Archive => {
                Superseded::Archived(Scenario { status: ScenarioStatus::Archived, ..previous.clone() })
            }
            SupersedePolicy::Discard => Superseded::Discarded { id: previous.id.clone() },
            SupersedePolicy::RetainAsDraft => Superseded::Draft(Scenario {
                status: ScenarioStatus::Draft,
                metrics: None,
                ..previous.clone()
            }),
        });

        let transition =
            Transition::Promote { promoted: promoted.clone(), superseded: superseded.clone() };
        self.repository.commit_transition(&transition).map_err(|e| {
            error!("Failed to promote scenario {}: {}", id, e);
            GradingError::from(e)
        })?;

        // Acknowledged: apply in memory.
        self.drafts.remove(idx);
        match superseded {
            Some(Superseded::Archived(previous)) => {
                info!("Archived previous current scenario {}", previous.id);
                self.archived.push(previous);
            }
            Some(Superseded::Discarded { id: previous }) => {
                info!("Discarded previous current scenario {}", previous);
            }
            Some(Superseded::Draft(previous)) => {
                info!("Returned previous current scenario {} to drafts", previous.id);
                self.drafts.push(previous);
            }
            None => {}
        }
        self.current = Some(promoted.clone());

        info!(
            "Scenario {} (ID: {}) is now current, budget impact {:.0}",
            promoted.name, promoted.id, metrics.total_budget_impact
        );
        Ok(promoted)
    }

    /// Move a draft to the archive. No recomputation.
    pub fn archive(&mut self, id: &str) -> Result<Scenario> {
        let idx = self.draft_index(id)?;
        let archived = Scenario { status: ScenarioStatus::Archived, ..self.drafts[idx].clone() };

        self.repository
            .commit_transition(&Transition::Archive { archived: archived.clone() })
            .map_err(|e| {
                error!("Failed to archive scenario {}: {}", id, e);
                GradingError::from(e)
            })?;

        self.drafts.remove(idx);
        self.archived.push(archived.clone());

        info!("Archived draft scenario: {} (ID: {})", archived.name, archived.id);
        Ok(archived)
    }

    /// Draft closest to budget-neutral among those with metrics; ties go to the newest.
    pub fn best_draft(&self) -> Option<&Scenario> {
        self.drafts
            .iter()
            .enumerate()
            .filter_map(|(idx, s)| s.metrics.map(|m| (idx, s, m.avg_salary_increase_percent.abs())))
            .min_by(|(ia, a, ka), (ib, b, kb)| {
                ka.total_cmp(kb)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| ib.cmp(ia))
            })
            .map(|(_, s, _)| s)
    }

    pub fn compare(&self, ids: &[String], include_current: bool) -> Result<ComparisonView> {
        ComparisonEngine::compare(self, ids, include_current)
    }

    /// At most one current scenario, every id in exactly one collection.
    pub fn check_invariants(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let held = self
            .current
            .iter()
            .map(|s| (ScenarioStatus::Current, s))
            .chain(self.drafts.iter().map(|s| (ScenarioStatus::Draft, s)))
            .chain(self.archived.iter().map(|s| (ScenarioStatus::Archived, s)));

        for (status, scenario) in held {
            if scenario.status != status {
                return Err(GradingError::Validation(format!(
                    "scenario {} is {} but held as {}",
                    scenario.id, scenario.status, status
                )));
            }
            if !ids.insert(scenario.id.as_str()) {
                return Err(GradingError::Validation(format!(
                    "scenario {} appears more than once",
                    scenario.id
                )));
            }
        }
        Ok(())
    }

    // ========================
    // Helpers
    // ========================

    fn draft_index(&self, id: &str) -> Result<usize> {
        if let Some(idx) = self.drafts.iter().position(|s| s.id == id) {
            return Ok(idx);
        }
        match self.get(id) {
            Some(scenario) => {
                warn!("Rejected mutation of {} scenario {}", scenario.status, id);
                Err(GradingError::Immutable { id: id.to_string(), status: scenario.status })
            }
            None => Err(GradingError::NotFound { id: id.to_string() }),
        }
    }

    fn validate_draft_name(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GradingError::Validation("scenario name cannot be blank".to_string()));
        }
        if name.chars().count() > self.config.max_name_len {
            return Err(GradingError::Validation(format!(
                "scenario name cannot exceed {} characters",
                self.config.max_name_len
            )));
        }
        if self.drafts.iter().any(|s| s.name.to_lowercase() == name.to_lowercase()) {
            return Err(GradingError::Validation(format!("a draft named '{}' already exists", name)));
        }
        Ok(name.to_string())
    }
}

impl<R: ScenarioRepository + std::fmt::Debug> std::fmt::Debug for ScenarioStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioStore")
            .field("grades", &self.grades)
            .field("config", &self.config)
            .field("repository", &self.repository)
            .field("current", &self.current.as_ref().map(|s| &s.id))
            .field("drafts", &self.drafts.len())
            .field("archived", &self.archived.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryRepository, PersistenceError};
    use crate::store::clock::SteppingClock;
    use crate::types::HorizontalIntervals;
    use chrono::{Duration, TimeZone, Utc};

    fn grades() -> Vec<Grade> {
        vec![Grade::new("Director", 0), Grade::new("Manager", 1), Grade::base("Specialist", 2)]
    }

    fn inputs(base: f64) -> ScenarioInputs {
        ScenarioInputs::new(base, HorizontalIntervals::uniform(10.0))
            .with_vertical("Manager", 20.0)
            .with_vertical("Director", 25.0)
    }

    fn headcount() -> Headcount {
        [("Director", 1u32), ("Manager", 4), ("Specialist", 10)]
            .into_iter()
            .map(|(name, n)| (name.to_string(), n))
            .collect()
    }

    fn clock() -> SteppingClock {
        SteppingClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(), Duration::minutes(1))
    }

    fn store() -> ScenarioStore<InMemoryRepository> {
        ScenarioStore::new(grades(), InMemoryRepository::new()).unwrap().with_clock(clock())
    }

    fn store_with_policy(policy: SupersedePolicy) -> ScenarioStore<InMemoryRepository> {
        let config = GradingConfig { supersede_policy: policy, ..GradingConfig::default() };
        ScenarioStore::open(&StaticReference::new(grades()), InMemoryRepository::new(), config)
            .unwrap()
            .with_clock(clock())
    }

    /// Repository that refuses every write once armed, or only the write numbered `fail_write`.
    #[derive(Debug, Default)]
    struct FlakyRepository {
        inner: InMemoryRepository,
        failing: bool,
        fail_write: Option<usize>,
        writes: usize,
    }

    impl FlakyRepository {
        fn check(&mut self) -> std::result::Result<(), PersistenceError> {
            let write = self.writes;
            self.writes += 1;
            if self.failing || self.fail_write == Some(write) {
                return Err(PersistenceError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "backend unavailable",
                )));
            }
            Ok(())
        }
    }

    impl ScenarioRepository for FlakyRepository {
        fn load_all(&self) -> std::result::Result<Vec<Scenario>, PersistenceError> {
            self.inner.load_all()
        }

        fn insert_draft(&mut self, scenario: &Scenario) -> std::result::Result<(), PersistenceError> {
            self.check()?;
            self.inner.insert_draft(scenario)
        }

        fn update_draft(&mut self, scenario: &Scenario) -> std::result::Result<(), PersistenceError> {
            self.check()?;
            self.inner.update_draft(scenario)
        }

        fn commit_transition(&mut self, transition: &Transition) -> std::result::Result<(), PersistenceError> {
            self.check()?;
            self.inner.commit_transition(transition)
        }
    }

    fn current_count<R: ScenarioRepository>(store: &ScenarioStore<R>) -> usize {
        store
            .current()
            .into_iter()
            .chain(store.drafts().iter())
            .chain(store.archived().iter())
            .filter(|s| s.status == ScenarioStatus::Current)
            .count()
    }

    #[test]
    fn test_create_draft_builds_table() {
        let mut store = store();
        let draft = store.create_draft("  Plan A ", "hr.lead", inputs(1000.0)).unwrap();

        assert_eq!(draft.name, "Plan A");
        assert_eq!(draft.status, ScenarioStatus::Draft);
        assert_eq!(draft.created_by, "hr.lead");
        assert_eq!(draft.table.anchors("Director").unwrap().ld, 1500.0);
        assert!(draft.metrics.is_none());
        assert_eq!(store.drafts().len(), 1);
        assert_eq!(store.repository().snapshot().scenarios.len(), 1);
    }

    #[test]
    fn test_create_draft_name_rules() {
        let mut store = store();
        store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();

        assert!(matches!(store.create_draft("   ", "hr", inputs(1000.0)), Err(GradingError::Validation(_))));
        assert!(matches!(store.create_draft("plan a", "hr", inputs(1000.0)), Err(GradingError::Validation(_))));

        let long_name = "x".repeat(101);
        assert!(store.create_draft(&long_name, "hr", inputs(1000.0)).is_err());
        assert_eq!(store.drafts().len(), 1);
    }

    #[test]
    fn test_create_draft_rejects_invalid_inputs() {
        let mut store = store();

        let mut missing_vertical = inputs(1000.0);
        missing_vertical.vertical_percent.remove("Manager");
        let err = store.create_draft("Broken", "hr", missing_vertical).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.grade(), Some("Manager"));

        let no_base = ScenarioInputs { base_value: None, ..inputs(1000.0) };
        assert!(matches!(store.create_draft("No base", "hr", no_base), Err(GradingError::Validation(_))));

        assert!(store.drafts().is_empty());
        assert!(store.repository().snapshot().scenarios.is_empty());
    }

    #[test]
    fn test_update_draft_merges_and_rebuilds() {
        let mut store = store();
        let draft = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        store.evaluate_draft(&draft.id, &headcount()).unwrap();

        let mut patch = InputsPatch::default();
        patch.base_value = Some(2000.0);
        patch.horizontal_intervals.ld_to_lq = Some(0.0);
        let updated = store.update_draft(&draft.id, &patch).unwrap();

        assert_eq!(updated.inputs.vertical_for("Manager"), Some(20.0));
        assert_eq!(updated.table.base_value, 2000.0);
        assert_eq!(updated.table.anchors("Specialist").unwrap().lq, 2000.0);
        assert!(updated.metrics.is_none(), "stale metrics must be cleared");
        assert_eq!(store.get(&draft.id), Some(&updated));
    }

    #[test]
    fn test_update_draft_failure_keeps_previous_state() {
        let mut store = store();
        let draft = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();

        let mut patch = InputsPatch::default();
        patch.vertical_percent.insert("Director".into(), Some(-10.0));
        let err = store.update_draft(&draft.id, &patch).unwrap_err();

        assert!(matches!(err, GradingError::InvalidVertical { .. }));
        assert_eq!(store.get(&draft.id), Some(&draft));
    }

    #[test]
    fn test_update_unknown_or_immutable() {
        let mut store = store();
        assert!(matches!(
            store.update_draft("missing", &InputsPatch::default()),
            Err(GradingError::NotFound { .. })
        ));

        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0)).unwrap();
        store.save_as_current(&a.id, &headcount()).unwrap();
        store.archive(&b.id).unwrap();

        assert!(matches!(
            store.update_draft(&a.id, &InputsPatch::default()),
            Err(GradingError::Immutable { status: ScenarioStatus::Current, .. })
        ));
        assert!(matches!(
            store.update_draft(&b.id, &InputsPatch::default()),
            Err(GradingError::Immutable { status: ScenarioStatus::Archived, .. })
        ));
    }

    #[test]
    fn test_first_save_uses_zero_baseline() {
        let mut store = store();
        let draft = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();

        let current = store.save_as_current(&draft.id, &headcount()).unwrap();
        let metrics = current.metrics.unwrap();

        // Medians: Director 1815, Manager 1452, Specialist 1210.
        assert_eq!(metrics.total_budget_impact, 1815.0 + 4.0 * 1452.0 + 10.0 * 1210.0);
        assert_eq!(metrics.positions_affected, 3);
        assert_eq!(store.current().map(|s| s.id.as_str()), Some(draft.id.as_str()));
        assert!(store.drafts().is_empty());
        assert_eq!(store.current_table(), Some(&draft.table));
    }

    #[test]
    fn test_save_archives_previous_current_by_default() {
        let mut store = store();
        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0)).unwrap();

        store.save_as_current(&a.id, &headcount()).unwrap();
        let promoted = store.save_as_current(&b.id, &headcount()).unwrap();

        let metrics = promoted.metrics.unwrap();
        assert!((metrics.avg_salary_increase_percent - 10.0).abs() < 0.1);
        assert_eq!(store.current().unwrap().id, b.id);
        assert_eq!(store.archived().len(), 1);
        assert_eq!(store.archived()[0].id, a.id);
        assert_eq!(store.archived()[0].status, ScenarioStatus::Archived);
        assert_eq!(current_count(&store), 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_discard_policy_drops_previous_current() {
        let mut store = store_with_policy(SupersedePolicy::Discard);
        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0)).unwrap();

        store.save_as_current(&a.id, &headcount()).unwrap();
        store.save_as_current(&b.id, &headcount()).unwrap();

        assert!(store.get(&a.id).is_none());
        assert!(store.archived().is_empty());
        assert!(store.repository().snapshot().find(&a.id).is_none());
    }

    #[test]
    fn test_retain_policy_returns_previous_to_drafts() {
        let mut store = store_with_policy(SupersedePolicy::RetainAsDraft);
        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0)).unwrap();

        store.save_as_current(&a.id, &headcount()).unwrap();
        store.save_as_current(&b.id, &headcount()).unwrap();

        let returned = store.get(&a.id).unwrap();
        assert_eq!(returned.status, ScenarioStatus::Draft);
        assert!(returned.metrics.is_none());
        assert_eq!(store.drafts().len(), 1);

        // It can be edited again.
        let mut patch = InputsPatch::default();
        patch.base_value = Some(1050.0);
        assert!(store.update_draft(&a.id, &patch).is_ok());
    }

    #[test]
    fn test_retain_policy_blocks_draft_name_clash() {
        let mut store = store_with_policy(SupersedePolicy::RetainAsDraft);
        let plan = store.create_draft("Plan", "hr", inputs(1000.0)).unwrap();
        store.save_as_current(&plan.id, &headcount()).unwrap();

        // The name is free among drafts while "Plan" is current.
        let twin = store.create_draft("plan", "hr", inputs(1050.0)).unwrap();
        let other = store.create_draft("Other", "hr", inputs(1100.0)).unwrap();

        let err = store.save_as_current(&other.id, &headcount()).unwrap_err();
        assert!(matches!(err, GradingError::Validation(_)));
        assert_eq!(store.current().unwrap().id, plan.id);
        assert_eq!(store.drafts().len(), 2);
        assert_eq!(store.repository().snapshot().find(&plan.id).unwrap().status, ScenarioStatus::Current);

        // Promoting the namesake itself leaves no clash.
        store.save_as_current(&twin.id, &headcount()).unwrap();
        let names: Vec<&str> = store.drafts().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Other", "Plan"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_archive_transitions() {
        let mut store = store();
        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0)).unwrap();

        let archived = store.archive(&a.id).unwrap();
        assert_eq!(archived.status, ScenarioStatus::Archived);
        assert_eq!(archived.table, a.table);
        assert!(matches!(store.archive(&a.id), Err(GradingError::Immutable { .. })));

        store.save_as_current(&b.id, &headcount()).unwrap();
        assert!(matches!(
            store.archive(&b.id),
            Err(GradingError::Immutable { status: ScenarioStatus::Current, .. })
        ));
        assert!(matches!(store.archive("nope"), Err(GradingError::NotFound { .. })));
    }

    #[test]
    fn test_archived_name_can_be_reused() {
        let mut store = store();
        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        store.archive(&a.id).unwrap();
        assert!(store.create_draft("Plan A", "hr", inputs(1000.0)).is_ok());
    }

    #[test]
    fn test_best_draft_prefers_budget_neutral() {
        let mut store = store();
        let base = store.create_draft("Baseline", "hr", inputs(1000.0)).unwrap();
        store.save_as_current(&base.id, &headcount()).unwrap();
        assert!(store.best_draft().is_none());

        let raise = store.create_draft("Raise", "hr", inputs(1200.0)).unwrap();
        let cut = store.create_draft("Cut", "hr", inputs(950.0)).unwrap();
        let _unevaluated = store.create_draft("Flat", "hr", inputs(1000.0)).unwrap();
        assert!(store.best_draft().is_none());

        store.evaluate_draft(&raise.id, &headcount()).unwrap();
        store.evaluate_draft(&cut.id, &headcount()).unwrap();

        assert_eq!(store.best_draft().map(|s| s.id.as_str()), Some(cut.id.as_str()));
    }

    #[test]
    fn test_best_draft_ties_go_to_newest() {
        let mut store = store();
        let older = store.create_draft("Older", "hr", inputs(1000.0)).unwrap();
        let newer = store.create_draft("Newer", "hr", inputs(1000.0)).unwrap();
        assert!(newer.created_at > older.created_at);

        store.evaluate_draft(&older.id, &headcount()).unwrap();
        store.evaluate_draft(&newer.id, &headcount()).unwrap();

        assert_eq!(store.best_draft().unwrap().id, newer.id);
    }

    #[test]
    fn test_failed_commit_leaves_state_unchanged() {
        let mut store = ScenarioStore::new(grades(), FlakyRepository::default()).unwrap();
        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0)).unwrap();
        store.save_as_current(&a.id, &headcount()).unwrap();

        store.repository.failing = true;

        let err = store.save_as_current(&b.id, &headcount()).unwrap_err();
        assert!(matches!(err, GradingError::Persistence(_)));
        assert!(err.is_recoverable());
        assert_eq!(store.current().unwrap().id, a.id);
        assert_eq!(store.drafts().len(), 1);
        assert!(store.drafts()[0].metrics.is_none());
        assert!(store.archived().is_empty());

        assert!(store.archive(&b.id).is_err());
        assert_eq!(store.get(&b.id).unwrap().status, ScenarioStatus::Draft);

        assert!(store.create_draft("Plan C", "hr", inputs(900.0)).is_err());
        assert_eq!(store.drafts().len(), 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_open_restores_persisted_state() {
        let mut store = store();
        let a = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0)).unwrap();
        let c = store.create_draft("Plan C", "hr", inputs(1200.0)).unwrap();
        store.save_as_current(&a.id, &headcount()).unwrap();
        store.archive(&b.id).unwrap();

        let repo = InMemoryRepository::from_snapshot(store.repository().snapshot().clone());
        let reopened = ScenarioStore::new(grades(), repo).unwrap();

        assert_eq!(reopened.current().unwrap().id, a.id);
        assert_eq!(reopened.archived()[0].id, b.id);
        assert_eq!(reopened.drafts()[0].id, c.id);
    }

    #[test]
    fn test_reference_table_is_baseline_until_first_save() {
        let live = crate::engine::build(&grades(), &inputs(1000.0)).unwrap();
        let reference = StaticReference::new(grades()).with_current_table(live.clone());
        let mut store =
            ScenarioStore::open(&reference, InMemoryRepository::new(), GradingConfig::default()).unwrap();

        assert_eq!(store.current_table(), Some(&live));
        assert!(store.current().is_none());

        let same = store.create_draft("Same", "hr", inputs(1000.0)).unwrap();
        let metrics = store.evaluate_draft(&same.id, &headcount()).unwrap();
        assert_eq!(metrics, Metrics::default());
    }

    #[test]
    fn test_lifecycle_exclusivity_over_a_sequence() {
        let mut store = store();
        assert_eq!(current_count(&store), 0);

        let mut ids = Vec::new();
        for i in 0..6 {
            let draft = store.create_draft(&format!("Plan {i}"), "hr", inputs(1000.0 + i as f64 * 50.0)).unwrap();
            ids.push(draft.id);
        }

        store.save_as_current(&ids[0], &headcount()).unwrap();
        store.archive(&ids[1]).unwrap();
        store.save_as_current(&ids[2], &headcount()).unwrap();
        store.save_as_current(&ids[3], &headcount()).unwrap();
        store.archive(&ids[4]).unwrap();

        assert_eq!(current_count(&store), 1);
        assert_eq!(store.current().unwrap().id, ids[3]);
        assert_eq!(store.drafts().len(), 1);
        assert_eq!(store.archived().len(), 4);
        store.check_invariants().unwrap();
    }

    fn regraded() -> StaticReference {
        StaticReference::new(vec![Grade::new("Head", 0), Grade::base("Associate", 1)])
    }

    fn grade_names(table: &GradeTable) -> Vec<&str> {
        table.grade_names().collect()
    }

    #[test]
    fn test_refresh_reference_rebuilds_drafts() {
        let mut store = store();
        let draft = store.create_draft("Plan A", "hr", inputs(1000.0).with_vertical("Head", 30.0)).unwrap();
        store.evaluate_draft(&draft.id, &headcount()).unwrap();

        store.refresh_reference(&regraded()).unwrap();

        let names: Vec<&str> = store.grades().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Head", "Associate"]);

        let rebuilt = store.get(&draft.id).unwrap().clone();
        assert_eq!(grade_names(&rebuilt.table), vec!["Head", "Associate"]);
        assert_eq!(rebuilt.table.anchors("Head").unwrap().ld, 1300.0);
        assert!(rebuilt.metrics.is_none());
        assert_eq!(store.repository().snapshot().find(&draft.id), Some(&rebuilt));

        let promoted = store.save_as_current(&draft.id, &headcount()).unwrap();
        assert_eq!(grade_names(&promoted.table), vec!["Head", "Associate"]);
    }

    #[test]
    fn test_refresh_reference_rejects_unbuildable_drafts() {
        let mut store = store();
        let draft = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();

        let err = store.refresh_reference(&regraded()).unwrap_err();
        assert!(matches!(err, GradingError::InvalidVertical { .. }));
        assert_eq!(err.grade(), Some("Head"));

        assert_eq!(store.grades(), grades().as_slice());
        assert_eq!(store.get(&draft.id), Some(&draft));
        assert_eq!(store.repository().snapshot().find(&draft.id), Some(&draft));
    }

    #[test]
    fn test_refresh_reference_restores_partial_writes() {
        let mut store = ScenarioStore::new(grades(), FlakyRepository::default()).unwrap();
        let a = store.create_draft("Plan A", "hr", inputs(1000.0).with_vertical("Head", 30.0)).unwrap();
        let b = store.create_draft("Plan B", "hr", inputs(1100.0).with_vertical("Head", 30.0)).unwrap();

        // Writes 0 and 1 were the inserts; the second rebuilt draft fails.
        store.repository.fail_write = Some(3);
        let err = store.refresh_reference(&regraded()).unwrap_err();
        assert!(matches!(err, GradingError::Persistence(_)));

        assert_eq!(store.grades(), grades().as_slice());
        assert_eq!(store.get(&a.id), Some(&a));
        assert_eq!(store.get(&b.id), Some(&b));
        let persisted = store.repository().inner.snapshot();
        assert_eq!(persisted.find(&a.id), Some(&a));
        assert_eq!(persisted.find(&b.id), Some(&b));
    }

    #[test]
    fn test_evaluate_draft_surfaces_repository_error() {
        let mut store = ScenarioStore::new(grades(), FlakyRepository::default()).unwrap();
        let draft = store.create_draft("Plan A", "hr", inputs(1000.0)).unwrap();

        store.repository.failing = true;
        let err = store.evaluate_draft(&draft.id, &headcount()).unwrap_err();
        assert!(matches!(err, GradingError::Persistence(_)));
        assert!(store.get(&draft.id).unwrap().metrics.is_none());
    }
}
