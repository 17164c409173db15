pub mod clock;
pub mod scenario_store;

pub use clock::{Clock, SteppingClock, SystemClock};
pub use scenario_store::ScenarioStore;
