//! Bloomloop adaptive core.
//!
//! Pure level-selection machinery for the adaptive learning backend: Bloom
//! levels, level-selection policies, and the per-session progress tracker.
//! Nothing in this crate performs I/O; all fallibility lives at the engine
//! boundary.

pub mod history;
pub mod level;
pub mod policy;
pub mod tracker;

pub use history::{AggregateCounters, Outcome};
pub use level::{BloomLevel, QuestionKind};
pub use policy::{Decision, LevelPolicy, PolicyInput, Strategy};
pub use tracker::{ProgressTracker, TrackerLog};
