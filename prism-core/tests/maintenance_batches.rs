mod support;

use std::time::Duration;

use prism_core::{
    database::MediaRepository,
    error::MediaError,
    maintenance::{MaintenanceError, MaintenanceOperation},
    pipeline::{DeleteOutcome, PipelineSettings},
};
use prism_model::{MediaId, Tier};
use tokio_util::sync::CancellationToken;

use support::{
    Harness, dims, jpeg, png, policy, settings, small_policy, variant_dims,
};

#[tokio::test]
async fn repair_isolates_missing_sources() {
    let harness = Harness::new(small_policy());
    let mut present = Vec::new();
    for (w, h) in [(64, 48), (10, 300), (500, 1)] {
        let id = harness
            .seed_unmeasured(Some(jpeg(w, h)), "image/jpeg", "jpg")
            .await;
        present.push((id, dims(w, h)));
    }
    for _ in 0..2 {
        harness.seed_unmeasured(None, "image/jpeg", "jpg").await;
    }

    let result = harness
        .service
        .repair_missing_dimensions(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.candidates, 5);
    assert_eq!(result.succeeded, 3);
    assert_eq!(result.failed, 2);
    assert_eq!(result.skipped, 2);
    assert_eq!(result.errors.len(), 2);
    assert!(
        result
            .errors
            .iter()
            .all(|e| e.starts_with("skipped:") && e.ends_with("missing-source"))
    );
    for (id, expected) in present {
        assert_eq!(harness.record(id).await.dimensions, Some(expected));
    }
}

#[tokio::test]
async fn repair_twice_is_a_no_op() {
    let harness = Harness::new(small_policy());
    for _ in 0..3 {
        harness
            .seed_unmeasured(Some(png(40, 30)), "image/png", "png")
            .await;
    }

    let cancel = CancellationToken::new();
    let first = harness
        .service
        .repair_missing_dimensions(&cancel)
        .await
        .unwrap();
    let second = harness
        .service
        .repair_missing_dimensions(&cancel)
        .await
        .unwrap();

    assert_eq!(first.succeeded, 3);
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.candidates, 0);
    assert!(second.is_clean());
}

#[tokio::test]
async fn repair_skips_undecodable_originals() {
    let harness = Harness::new(small_policy());
    let id = harness
        .seed_unmeasured(Some(b"not an image".to_vec()), "image/jpeg", "jpg")
        .await;

    let result = harness
        .service
        .repair_missing_dimensions(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.failed, 1);
    assert!(result.errors[0].ends_with("unreadable"), "{:?}", result.errors);
    assert_eq!(harness.record(id).await.dimensions, None);
}

#[tokio::test]
async fn reprocess_measures_and_fills_variants_for_legacy_records() {
    let harness = Harness::new(small_policy());
    let id = harness
        .seed_unmeasured(Some(jpeg(400, 200)), "image/jpeg", "jpg")
        .await;

    let result = harness
        .service
        .reprocess_all(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);

    let record = harness.record(id).await;
    assert_eq!(record.dimensions, Some(dims(400, 200)));
    assert_eq!(variant_dims(&record, Tier::Large), Some(dims(160, 80)));
    assert_eq!(variant_dims(&record, Tier::Medium), Some(dims(80, 40)));
    assert_eq!(variant_dims(&record, Tier::Thumb), Some(dims(20, 10)));
}

#[tokio::test]
async fn reprocess_of_undecodable_original_is_a_hard_failure() {
    let harness = Harness::new(small_policy());
    let id = harness
        .seed_unmeasured(Some(b"junk".to_vec()), "image/jpeg", "jpg")
        .await;
    let before = harness.record(id).await;
    let writes = harness.blobs.write_count();

    let result = harness
        .service
        .reprocess_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.succeeded, 0);
    assert!(result.errors[0].starts_with("failed:"), "{:?}", result.errors);
    assert!(result.errors[0].contains("Decode"), "{:?}", result.errors);
    assert_eq!(harness.record(id).await, before);
    assert_eq!(harness.blobs.write_count(), writes);
}

#[tokio::test]
async fn reprocess_write_failure_leaves_record_untouched() {
    let harness = Harness::new(small_policy());
    let record = harness
        .service
        .ingest("w.jpg", "image/jpeg", jpeg(400, 300))
        .await
        .unwrap();

    // Large changes path under the new policy; thumb fails to write.
    let service = harness.reconfigured(settings(policy(120, 80, 20)));
    harness.blobs.fail_writes_containing("thumb-");
    let result = service
        .reprocess_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(result.skipped, 0);
    assert!(result.errors[0].starts_with("failed:"), "{:?}", result.errors);

    let after = harness.record(record.id).await;
    assert_eq!(after, record);
    for path in after.blob_paths() {
        assert!(harness.blobs.contains(&path).await, "{path} removed");
    }
    let attempted = format!(
        "variants/{}/large-120x90.jpg",
        record.id.as_uuid().simple()
    );
    assert!(
        !harness
            .blobs
            .contains(&prism_model::BlobPath::new(attempted))
            .await,
        "blob from failed attempt kept"
    );
}

#[tokio::test]
async fn reprocess_repository_failure_reports_orphans() {
    let harness = Harness::new(small_policy());
    let record = harness
        .service
        .ingest("r.jpg", "image/jpeg", jpeg(400, 300))
        .await
        .unwrap();

    let service = harness.reconfigured(settings(policy(120, 80, 20)));
    harness.repo.fail_replace(true);
    let result = service
        .reprocess_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(result.orphaned_blobs, 1);
    assert!(
        result.errors[0].contains("Repository write failed"),
        "{:?}",
        result.errors
    );
    let after = harness.record(record.id).await;
    assert_eq!(after, record);
    for path in after.blob_paths() {
        assert!(harness.blobs.contains(&path).await);
    }

    // Re-running once the repository recovers converges.
    harness.repo.fail_replace(false);
    let retry = service
        .reprocess_all(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(retry.succeeded, 1);
    let fixed = harness.record(record.id).await;
    assert_eq!(variant_dims(&fixed, Tier::Large), Some(dims(120, 90)));
    let old_large = record.variants.get(Tier::Large).unwrap();
    assert!(!harness.blobs.contains(&old_large.path).await);
}

#[tokio::test]
async fn delete_survives_blob_failures() {
    let harness = Harness::new(small_policy());
    let record = harness
        .service
        .ingest("b.jpg", "image/jpeg", jpeg(400, 300))
        .await
        .unwrap();
    harness.blobs.fail_deletes_containing("medium-");

    let DeleteOutcome::Deleted(report) =
        harness.service.delete_media(record.id).await
    else {
        panic!("expected Deleted");
    };
    assert!(!report.is_clean());
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.removed.len(), 3);
    assert!(harness.service.get(record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_repository_failure_touches_no_blobs() {
    let harness = Harness::new(small_policy());
    let record = harness
        .service
        .ingest("f.jpg", "image/jpeg", jpeg(400, 300))
        .await
        .unwrap();
    harness.repo.fail_delete(true);

    assert!(matches!(
        harness.service.delete_media(record.id).await,
        DeleteOutcome::Failed(MediaError::RepositoryWrite(_))
    ));
    assert_eq!(harness.record(record.id).await, record);
    for path in record.blob_paths() {
        assert!(harness.blobs.contains(&path).await);
    }
}

#[tokio::test]
async fn ingest_write_failure_leaves_nothing_behind() {
    let harness = Harness::new(small_policy());
    harness.blobs.fail_writes_containing("medium-");

    let err = harness
        .service
        .ingest("i.jpg", "image/jpeg", jpeg(400, 300))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::Storage { .. }), "{err:?}");
    assert!(harness.blobs.inner.is_empty().await);
    assert!(harness.repo.inner.is_empty().await);
}

#[tokio::test]
async fn cancelled_batch_touches_nothing() {
    let harness = Harness::new(small_policy());
    for _ in 0..3 {
        harness
            .seed_unmeasured(Some(jpeg(30, 30)), "image/jpeg", "jpg")
            .await;
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = harness
        .service
        .repair_missing_dimensions(&cancel)
        .await
        .unwrap();
    assert!(result.cancelled);
    assert_eq!(result.candidates, 3);
    assert_eq!(result.processed(), 0);
    let untouched = harness.repo.inner.list_missing_dimensions().await.unwrap();
    assert_eq!(untouched.len(), 3);
}

#[tokio::test]
async fn batch_cancelled_midway_keeps_finished_work() {
    let harness = Harness::with_settings(PipelineSettings {
        concurrency: 1,
        ..settings(small_policy())
    });
    for _ in 0..6 {
        harness
            .seed_unmeasured(Some(jpeg(30, 20)), "image/jpeg", "jpg")
            .await;
    }
    let cancel = CancellationToken::new();
    harness.blobs.cancel_after_reads(3, cancel.clone());

    let result = harness
        .service
        .repair_missing_dimensions(&cancel)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.candidates, 6);
    assert_eq!(result.succeeded, 3);
    assert_eq!(result.failed, 0);
    assert!(!result.is_clean());
    assert_eq!(harness.blobs.read_count(), 3);

    let remaining = harness.repo.inner.list_missing_dimensions().await.unwrap();
    assert_eq!(remaining.len(), 3);
    let measured = harness
        .repo
        .inner
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|record| record.dimensions == Some(dims(30, 20)))
        .count();
    assert_eq!(measured, 3);
}

#[tokio::test]
async fn duplicate_candidates_are_scheduled_once() {
    let harness = Harness::new(small_policy());
    for _ in 0..2 {
        harness
            .seed_unmeasured(Some(jpeg(30, 20)), "image/jpeg", "jpg")
            .await;
    }
    harness.repo.duplicate_listings(true);

    let result = harness
        .service
        .repair_missing_dimensions(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.candidates, 2);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 0);
}

#[tokio::test]
async fn enumeration_failure_is_a_batch_error() {
    let harness = Harness::new(small_policy());
    harness.repo.fail_list(true);

    let err = harness
        .service
        .reprocess_all(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MaintenanceError::Enumeration(_)), "{err:?}");
}

#[tokio::test]
async fn slow_store_call_fails_only_that_record() {
    let harness = Harness::with_settings(PipelineSettings {
        call_timeout: Duration::from_millis(50),
        ..settings(small_policy())
    });
    harness
        .seed_unmeasured(Some(jpeg(30, 20)), "image/jpeg", "jpg")
        .await;
    harness.blobs.delay_reads(Duration::from_millis(500));

    let result = harness
        .service
        .repair_missing_dimensions(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.failed, 1);
    assert_eq!(result.skipped, 0);
    assert!(result.errors[0].contains("timed out"), "{:?}", result.errors);
}

#[tokio::test]
async fn error_list_is_bounded() {
    let harness = Harness::with_settings(PipelineSettings {
        max_error_messages: 3,
        ..settings(small_policy())
    });
    for _ in 0..7 {
        harness.seed_unmeasured(None, "image/jpeg", "jpg").await;
    }

    let result = harness
        .service
        .repair_missing_dimensions(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.failed, 7);
    assert_eq!(result.errors.len(), 3);
    assert_eq!(result.errors_truncated, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_kind_batches_do_not_overlap() {
    let harness = Harness::new(small_policy());
    harness
        .seed_unmeasured(Some(jpeg(30, 20)), "image/jpeg", "jpg")
        .await;
    let gate = harness.repo.gate_listings();

    let service = harness.service.clone();
    let first = tokio::spawn(async move {
        service
            .repair_missing_dimensions(&CancellationToken::new())
            .await
    });
    gate.entered.notified().await;

    let second = harness
        .service
        .repair_missing_dimensions(&CancellationToken::new())
        .await;
    assert!(matches!(
        second,
        Err(MaintenanceError::AlreadyRunning(MaintenanceOperation::Repair))
    ));

    gate.open();
    let other_kind = harness
        .service
        .reprocess_all(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(other_kind.candidates, 1);

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.succeeded, 1);
}

#[tokio::test]
async fn get_returns_ingested_record() {
    let harness = Harness::new(small_policy());
    assert!(harness.service.get(MediaId::new()).await.unwrap().is_none());

    let record = harness
        .service
        .ingest("g.png", "image/png", png(100, 50))
        .await
        .unwrap();
    assert_eq!(harness.service.get(record.id).await.unwrap(), Some(record));
}
