use std::fmt;

use prism_model::{BlobPath, ImageDimensions, VariantSet};
use serde::Serialize;

use crate::{error::MediaError, image::TierFailure};

/// Why a record was left alone. Skips are not errors, but batch reports
/// count them as failures so operators see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    MissingSource,
    Unreadable,
    AlreadyMeasured,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingSource => "missing-source",
            SkipReason::Unreadable => "unreadable",
            SkipReason::AlreadyMeasured => "already-measured",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blob that should have been removed but is still (possibly) present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedBlob {
    pub path: BlobPath,
    pub reason: String,
}

/// Result of a best-effort blob cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<BlobPath>,
    pub orphaned: Vec<OrphanedBlob>,
}

impl CleanupReport {
    /// Every targeted blob is gone.
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty()
    }

    pub fn orphan(&mut self, path: BlobPath, reason: impl Into<String>) {
        self.orphaned.push(OrphanedBlob {
            path,
            reason: reason.into(),
        });
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.removed.extend(other.removed);
        self.orphaned.extend(other.orphaned);
    }
}

#[derive(Debug)]
pub enum RepairOutcome {
    Fixed(ImageDimensions),
    Skipped(SkipReason),
    Failed(MediaError),
}

#[derive(Debug, Clone)]
pub struct ReprocessReport {
    pub dimensions: ImageDimensions,
    pub variants: VariantSet,
    /// Tiers the policy calls for that could not be encoded this run.
    pub tier_failures: Vec<TierFailure>,
    /// Removal of variant blobs the record no longer references.
    pub cleanup: CleanupReport,
}

#[derive(Debug)]
pub enum ReprocessOutcome {
    Processed(ReprocessReport),
    Skipped(SkipReason),
    /// The record still references its previous variants. `cleanup` lists
    /// blobs written by this attempt that could not be taken back.
    Failed {
        error: MediaError,
        cleanup: CleanupReport,
    },
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted(CleanupReport),
    NotFound,
    Failed(MediaError),
}

/// How a per-record outcome counts toward a batch.
#[derive(Debug)]
pub enum Disposition<'a> {
    Succeeded,
    Skipped(SkipReason),
    Failed(&'a MediaError),
}

/// Per-record outcome the maintenance runner can aggregate.
pub trait RecordOutcome: Send {
    fn disposition(&self) -> Disposition<'_>;

    /// Blobs this record left behind.
    fn orphaned_blobs(&self) -> usize {
        0
    }
}

impl RecordOutcome for RepairOutcome {
    fn disposition(&self) -> Disposition<'_> {
        match self {
            RepairOutcome::Fixed(_) => Disposition::Succeeded,
            RepairOutcome::Skipped(reason) => Disposition::Skipped(*reason),
            RepairOutcome::Failed(err) => Disposition::Failed(err),
        }
    }
}

impl RecordOutcome for ReprocessOutcome {
    fn disposition(&self) -> Disposition<'_> {
        match self {
            ReprocessOutcome::Processed(_) => Disposition::Succeeded,
            ReprocessOutcome::Skipped(reason) => Disposition::Skipped(*reason),
            ReprocessOutcome::Failed { error, .. } => Disposition::Failed(error),
        }
    }

    fn orphaned_blobs(&self) -> usize {
        match self {
            ReprocessOutcome::Processed(report) => report.cleanup.orphaned.len(),
            ReprocessOutcome::Failed { cleanup, .. } => cleanup.orphaned.len(),
            ReprocessOutcome::Skipped(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reasons_render_kebab_case() {
        assert_eq!(SkipReason::MissingSource.to_string(), "missing-source");
        assert_eq!(
            serde_json::to_string(&SkipReason::AlreadyMeasured).unwrap(),
            "\"already-measured\""
        );
    }

    #[test]
    fn cleanup_report_merges() {
        let mut a = CleanupReport::default();
        a.removed.push(BlobPath::new("a"));
        let mut b = CleanupReport::default();
        b.orphan(BlobPath::new("b"), "io");
        assert!(!b.is_clean());

        a.merge(b);
        assert_eq!(a.removed.len(), 1);
        assert_eq!(a.orphaned[0].path.as_str(), "b");
        assert!(!a.is_clean());
    }
}
