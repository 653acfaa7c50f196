use std::fmt;

use prism_model::MediaId;
use serde::Serialize;
use thiserror::Error;

use crate::{
    error::MediaError,
    pipeline::{Disposition, RecordOutcome},
};

/// Which records a batch visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSelector {
    MissingDimensions,
    All,
}

/// What a batch does to each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceOperation {
    Repair,
    Reprocess,
}

impl MaintenanceOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            MaintenanceOperation::Repair => "repair",
            MaintenanceOperation::Reprocess => "reprocess",
        }
    }
}

impl fmt::Display for MaintenanceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refusals that happen before any record is touched.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("a {0} batch is already running")]
    AlreadyRunning(MaintenanceOperation),

    #[error("failed to enumerate candidates: {0}")]
    Enumeration(#[source] MediaError),
}

/// Aggregate of one batch run.
///
/// Skipped records count toward `failed` as well as `skipped`; their
/// messages start with `skipped:` while hard failures start with `failed:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub operation: MaintenanceOperation,
    pub candidates: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    /// Messages dropped once `errors` reached its bound.
    pub errors_truncated: usize,
    pub orphaned_blobs: usize,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn new(operation: MaintenanceOperation, candidates: usize) -> Self {
        Self {
            operation,
            candidates,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
            errors_truncated: 0,
            orphaned_blobs: 0,
            cancelled: false,
        }
    }

    /// Records actually visited.
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    pub(crate) fn record<O: RecordOutcome + ?Sized>(
        &mut self,
        id: MediaId,
        outcome: &O,
        max_error_messages: usize,
    ) {
        self.orphaned_blobs += outcome.orphaned_blobs();
        let message = match outcome.disposition() {
            Disposition::Succeeded => {
                self.succeeded += 1;
                return;
            }
            Disposition::Skipped(reason) => {
                self.failed += 1;
                self.skipped += 1;
                format!("skipped: {id}: {reason}")
            }
            Disposition::Failed(err) => {
                self.failed += 1;
                format!("failed: {id}: {err}")
            }
        };

        if self.errors.len() < max_error_messages {
            self.errors.push(message);
        } else {
            self.errors_truncated += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RepairOutcome, SkipReason};

    #[test]
    fn classifies_and_bounds_messages() {
        let mut result = BatchResult::new(MaintenanceOperation::Repair, 4);
        let fixed = RepairOutcome::Fixed(
            prism_model::ImageDimensions::try_from((10u32, 10u32)).unwrap(),
        );
        result.record(MediaId::new(), &fixed, 2);
        result.record(
            MediaId::new(),
            &RepairOutcome::Skipped(SkipReason::MissingSource),
            2,
        );
        result.record(
            MediaId::new(),
            &RepairOutcome::Failed(MediaError::Internal("boom".into())),
            2,
        );
        result.record(
            MediaId::new(),
            &RepairOutcome::Skipped(SkipReason::Unreadable),
            2,
        );

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 3);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.processed(), 4);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors_truncated, 1);
        assert!(result.errors[0].starts_with("skipped: "));
        assert!(result.errors[0].ends_with("missing-source"));
        assert!(result.errors[1].starts_with("failed: "));
        assert!(!result.is_clean());
    }
}
