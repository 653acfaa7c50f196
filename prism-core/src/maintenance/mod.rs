//! Batch maintenance over the whole media set.

pub mod result;
pub mod runner;
pub mod service;

pub use result::{
    BatchResult, CandidateSelector, MaintenanceError, MaintenanceOperation,
};
pub use runner::{MaintenanceRunner, RunnerConfig};
pub use service::MaintenanceService;
