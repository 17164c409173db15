// Scenario persistence
// Repository trait with in-memory and snapshot-file backends

pub mod error;
pub mod file;
pub mod format;
pub mod repository;

pub use error::PersistenceError;
pub use file::FileRepository;
pub use format::{decode_snapshot, encode_snapshot};
pub use repository::{
    InMemoryRepository, RepositorySnapshot, ScenarioRepository, Superseded, Transition,
};

pub const SNAPSHOT_VERSION: u32 = 1;
