//! Pipeline execution engine

pub mod engine;
pub mod poller;
pub mod rollback;

pub use engine::{PreflightEngine, PreflightEvent, PreflightReport, RunState, STEP_SEQUENCE};
pub use poller::TaskMonitor;
pub use rollback::{RollbackAction, RollbackFlags};
