//! `engine` crate: workflow models, graph validation and the execution
//! engine.

pub mod models;
pub mod config;
pub mod error;
pub mod dag;
pub mod run;
pub mod routing;
pub mod resilience;
pub mod executor;

pub use models::{Edge, Node, NodeSettings, Workflow};
pub use config::{EffectiveSettings, EngineConfig};
pub use error::EngineError;
pub use dag::validate_dag;
pub use run::{LogEntry, LogLevel, Run, RunStatus};
pub use resilience::{failure_sentinel, is_failure_sentinel};
pub use executor::WorkflowEngine;

#[cfg(test)]
mod executor_tests;
