use std::fs::{rename, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::error::PersistenceError;
use super::format::{decode_snapshot, encode_snapshot};
use super::repository::{RepositorySnapshot, ScenarioRepository, Transition};
use crate::types::Scenario;

/// Repository backed by a single snapshot file, rewritten atomically on every write.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    snapshot: RepositorySnapshot,
}

impl FileRepository {
    /// Open an existing snapshot file, or start empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let snapshot = if path.exists() { Self::read(&path)? } else { RepositorySnapshot::new() };
        Ok(Self { path, snapshot })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &RepositorySnapshot {
        &self.snapshot
    }

    fn read(path: &Path) -> Result<RepositorySnapshot, PersistenceError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let snapshot = decode_snapshot(&data)?;
        debug!("Loaded {} scenarios ({} bytes) from {:?}", snapshot.scenarios.len(), data.len(), path);
        Ok(snapshot)
    }

    /// Write to a temp file, then rename over the target.
    fn write(&self, snapshot: &RepositorySnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = encode_snapshot(snapshot)?;
        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&data)?;
            file.flush()?;
            file.sync_all()?;
        }
        rename(&temp_path, &self.path)?;

        debug!("Saved {} bytes to {:?}", data.len(), self.path);
        Ok(())
    }

    /// Apply a change to a copy, persist it, and only then adopt it.
    fn persist_with(
        &mut self,
        change: impl FnOnce(&mut RepositorySnapshot) -> Result<(), PersistenceError>,
    ) -> Result<(), PersistenceError> {
        let mut next = self.snapshot.clone();
        change(&mut next)?;
        next.saved_at = Utc::now();
        self.write(&next)?;
        self.snapshot = next;
        Ok(())
    }
}

impl ScenarioRepository for FileRepository {
    fn load_all(&self) -> Result<Vec<Scenario>, PersistenceError> {
        Ok(self.snapshot.scenarios.clone())
    }

    fn insert_draft(&mut self, scenario: &Scenario) -> Result<(), PersistenceError> {
        self.persist_with(|s| s.apply_insert(scenario))
    }

    fn update_draft(&mut self, scenario: &Scenario) -> Result<(), PersistenceError> {
        self.persist_with(|s| s.apply_update(scenario))
    }

    fn commit_transition(&mut self, transition: &Transition) -> Result<(), PersistenceError> {
        self.persist_with(|s| s.apply_transition(transition))
    }
}
