use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::PersistenceError;
use super::SNAPSHOT_VERSION;
use crate::types::{Scenario, ScenarioStatus};

/// Durable storage for scenario records.
///
/// An `Ok` return is the commit point: the store only changes its in-memory
/// state after the repository acknowledges the write.
pub trait ScenarioRepository {
    fn load_all(&self) -> Result<Vec<Scenario>, PersistenceError>;

    fn insert_draft(&mut self, scenario: &Scenario) -> Result<(), PersistenceError>;

    fn update_draft(&mut self, scenario: &Scenario) -> Result<(), PersistenceError>;

    /// Apply a status transition as a single write.
    fn commit_transition(&mut self, transition: &Transition) -> Result<(), PersistenceError>;
}

/// A lifecycle change written as one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A draft becomes current; the previous current (if any) is handled per policy.
    Promote { promoted: Scenario, superseded: Option<Superseded> },
    Archive { archived: Scenario },
}

/// Fate of the previous current scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Superseded {
    Archived(Scenario),
    Discarded { id: String },
    Draft(Scenario),
}

/// Full set of scenario records as persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RepositorySnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub scenarios: Vec<Scenario>,
}

impl Default for RepositorySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositorySnapshot {
    pub fn new() -> Self {
        Self { version: SNAPSHOT_VERSION, saved_at: Utc::now(), scenarios: Vec::new() }
    }

    pub fn validate(&self) -> Result<(), PersistenceError> {
        let mut ids = HashSet::new();
        for scenario in &self.scenarios {
            if !ids.insert(scenario.id.as_str()) {
                return Err(PersistenceError::Corrupted(format!(
                    "duplicate scenario id {}",
                    scenario.id
                )));
            }
        }

        let current = self.scenarios.iter().filter(|s| s.status == ScenarioStatus::Current).count();
        if current > 1 {
            return Err(PersistenceError::Corrupted(format!("{current} scenarios marked current")));
        }
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn apply_insert(&mut self, scenario: &Scenario) -> Result<(), PersistenceError> {
        if scenario.status != ScenarioStatus::Draft {
            return Err(PersistenceError::Rejected(format!(
                "only drafts can be created, got {}",
                scenario.status
            )));
        }
        if self.find(&scenario.id).is_some() {
            return Err(PersistenceError::Rejected(format!("scenario {} already exists", scenario.id)));
        }
        self.scenarios.push(scenario.clone());
        Ok(())
    }

    pub fn apply_update(&mut self, scenario: &Scenario) -> Result<(), PersistenceError> {
        self.replace_draft(scenario)
    }

    pub fn apply_transition(&mut self, transition: &Transition) -> Result<(), PersistenceError> {
        match transition {
            Transition::Promote { promoted, superseded } => {
                if let Some(superseded) = superseded {
                    self.apply_superseded(superseded)?;
                }
                self.replace_draft(promoted)?;
            }
            Transition::Archive { archived } => {
                self.replace_draft(archived)?;
            }
        }
        self.validate()
    }

    fn apply_superseded(&mut self, superseded: &Superseded) -> Result<(), PersistenceError> {
        let id = match superseded {
            Superseded::Archived(s) | Superseded::Draft(s) => s.id.as_str(),
            Superseded::Discarded { id } => id.as_str(),
        };
        let idx = self
            .scenarios
            .iter()
            .position(|s| s.id == id && s.status == ScenarioStatus::Current)
            .ok_or_else(|| PersistenceError::Rejected(format!("scenario {id} is not current")))?;

        match superseded {
            Superseded::Archived(s) | Superseded::Draft(s) => self.scenarios[idx] = s.clone(),
            Superseded::Discarded { .. } => {
                self.scenarios.remove(idx);
            }
        }
        Ok(())
    }

    /// Overwrite a record that is currently a draft.
    fn replace_draft(&mut self, scenario: &Scenario) -> Result<(), PersistenceError> {
        let existing = self
            .scenarios
            .iter_mut()
            .find(|s| s.id == scenario.id)
            .ok_or_else(|| PersistenceError::Rejected(format!("scenario {} not found", scenario.id)))?;

        if existing.status != ScenarioStatus::Draft {
            return Err(PersistenceError::Rejected(format!(
                "scenario {} is {}",
                scenario.id, existing.status
            )));
        }
        *existing = scenario.clone();
        Ok(())
    }
}

/// Repository held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    snapshot: RepositorySnapshot,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &RepositorySnapshot {
        &self.snapshot
    }
}

impl ScenarioRepository for InMemoryRepository {
    fn load_all(&self) -> Result<Vec<Scenario>, PersistenceError> {
        Ok(self.snapshot.scenarios.clone())
    }

    fn insert_draft(&mut self, scenario: &Scenario) -> Result<(), PersistenceError> {
        self.snapshot.apply_insert(scenario)
    }

    fn update_draft(&mut self, scenario: &Scenario) -> Result<(), PersistenceError> {
        self.snapshot.apply_update(scenario)
    }

    fn commit_transition(&mut self, transition: &Transition) -> Result<(), PersistenceError> {
        // Apply to a copy so a rejected transition leaves no trace.
        let mut next = self.snapshot.clone();
        next.apply_transition(transition)?;
        self.snapshot = next;
        Ok(())
    }
}
