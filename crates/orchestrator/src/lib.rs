//! Task Orchestration for Async Video Analysis
//!
//! Executes analysis engine invocations on a bounded pool of workers, wires
//! progress reporting and cooperative cancellation into the session store,
//! and reclaims expired sessions on a periodic sweep.
//!
//! The long-running analysis itself is behind the [`AnalysisEngine`] trait;
//! this crate only manages its lifecycle.

mod engine;
mod janitor;
mod orchestrator;
mod service;

pub use engine::{AnalysisEngine, ProgressReporter};
pub use janitor::{Janitor, JanitorConfig, JanitorHandle};
pub use orchestrator::{OrchestratorConfig, TaskOrchestrator};
pub use service::{SessionService, StatusSnapshot};
