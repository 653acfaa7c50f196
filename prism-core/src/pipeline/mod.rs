//! Per-record orchestration: ingest, dimension repair, full reprocess and
//! cascading delete.

pub mod orchestrator;
pub mod outcome;
pub mod settings;
mod timed;

pub use orchestrator::MediaPipeline;
pub use outcome::{
    CleanupReport, DeleteOutcome, Disposition, OrphanedBlob, RecordOutcome,
    RepairOutcome, ReprocessOutcome, ReprocessReport, SkipReason,
};
pub use settings::{PipelineContext, PipelineSettings};
