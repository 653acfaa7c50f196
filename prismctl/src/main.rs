//! # prismctl
//!
//! Operator CLI for Prism: ingest originals, inspect and delete records,
//! and run the dimension-repair and reprocess batches.

mod cli;

use std::{path::Path, process::ExitCode, sync::Arc};

use anyhow::{Context, bail};
use clap::Parser;
use prism_config::{BlobBackend, Config, ConfigLoad, ConfigLoader};
use prism_core::{
    MIGRATOR,
    database::PostgresMediaRepository,
    infra::blob::{
        BlobCacheRoot, BlobStore, CacacheBlobStore, FsBlobStore,
    },
    maintenance::{BatchResult, MaintenanceService},
    pipeline::{DeleteOutcome, PipelineContext},
};
use prism_model::{MediaId, MediaRecord};
use serde_json::json;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, guess_mime};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;
    let pool = connect(&config).await?;

    if let Command::Migrate = cli.command {
        MIGRATOR
            .run(&pool)
            .await
            .context("database migration failed")?;
        info!("database migrations applied");
        return Ok(ExitCode::SUCCESS);
    }

    let service = build_service(&config, pool).await?;
    match cli.command {
        Command::Migrate => Ok(ExitCode::SUCCESS),
        Command::Ingest { file, mime } => {
            ingest(&service, &file, mime, cli.json).await
        }
        Command::Show { id } => {
            let record = service
                .get(id)
                .await
                .with_context(|| format!("failed to load media {id}"))?;
            match record {
                Some(record) => {
                    print_record(&record, cli.json)?;
                    Ok(ExitCode::SUCCESS)
                }
                None => bail!("media {id} not found"),
            }
        }
        Command::Delete { id } => {
            let outcome = service.delete_media(id).await;
            print_delete(id, &outcome, cli.json)?;
            Ok(match outcome {
                DeleteOutcome::Deleted(_) => ExitCode::SUCCESS,
                DeleteOutcome::NotFound | DeleteOutcome::Failed(_) => {
                    ExitCode::FAILURE
                }
            })
        }
        Command::Repair => {
            let cancel = cancel_on_ctrl_c();
            let result = service
                .repair_missing_dimensions(&cancel)
                .await
                .context("repair batch refused")?;
            finish_batch(&result, cli.json)
        }
        Command::Reprocess => {
            let cancel = cancel_on_ctrl_c();
            let result = service
                .reprocess_all(&cancel)
                .await
                .context("reprocess batch refused")?;
            finish_batch(&result, cli.json)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in &warnings {
        warn!(message = %warning, "configuration warning");
    }
    info!(
        blob.backend = %config.blob.backend,
        blob.root = %config.blob.root.display(),
        maintenance.concurrency = config.maintenance.concurrency,
        maintenance.call_timeout = ?config.maintenance.call_timeout,
        "configuration in effect"
    );
    Ok(config)
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let Some(url) = config.database.url.as_deref() else {
        bail!("no database configured; set DATABASE_URL or [database].url");
    };
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")
}

async fn build_service(
    config: &Config,
    pool: PgPool,
) -> anyhow::Result<MaintenanceService> {
    let blobs: Arc<dyn BlobStore> = match config.blob.backend {
        BlobBackend::Fs => {
            let store = FsBlobStore::new(config.blob.root.clone());
            store.ensure_root().await.with_context(|| {
                format!(
                    "failed to prepare blob root {}",
                    config.blob.root.display()
                )
            })?;
            Arc::new(store)
        }
        BlobBackend::Cacache => Arc::new(CacacheBlobStore::new(
            BlobCacheRoot::new(config.blob.root.clone()),
        )),
        BlobBackend::Memory => {
            bail!("the memory blob backend cannot be used with PostgreSQL")
        }
    };
    let context = PipelineContext::new(
        blobs,
        Arc::new(PostgresMediaRepository::new(pool)),
    );
    Ok(MaintenanceService::new(context, config.pipeline_settings()))
}

async fn ingest(
    service: &MaintenanceService,
    file: &Path,
    mime: Option<String>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    let mime = mime.unwrap_or_else(|| guess_mime(file).to_string());

    let record = service
        .ingest(filename, &mime, bytes)
        .await
        .with_context(|| format!("failed to ingest {}", file.display()))?;
    print_record(&record, json)?;
    Ok(ExitCode::SUCCESS)
}

/// The returned token is cancelled on the first Ctrl-C; in-flight records
/// finish, queued ones are left alone.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight records");
            child.cancel();
        }
    });
    token
}

fn finish_batch(result: &BatchResult, json: bool) -> anyhow::Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!(
            "{}: {} candidates, {} succeeded, {} failed ({} skipped), {} orphaned blobs{}",
            result.operation,
            result.candidates,
            result.succeeded,
            result.failed,
            result.skipped,
            result.orphaned_blobs,
            if result.cancelled { ", cancelled" } else { "" },
        );
        for error in &result.errors {
            println!("  {error}");
        }
        if result.errors_truncated > 0 {
            println!("  ... {} more", result.errors_truncated);
        }
    }
    Ok(if result.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_record(record: &MediaRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }
    let dimensions = record
        .dimensions
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "{} {} ({}, {})",
        record.id, record.filename, record.mime_type, dimensions
    );
    println!("  original {}", record.original_ref.as_str());
    for (tier, variant) in record.variants.iter() {
        println!(
            "  {:<8} {} {}",
            tier.as_str(),
            variant.dimensions,
            variant.path.as_str()
        );
    }
    Ok(())
}

fn print_delete(
    id: MediaId,
    outcome: &DeleteOutcome,
    json: bool,
) -> anyhow::Result<()> {
    let body = match outcome {
        DeleteOutcome::Deleted(report) => json!({
            "id": id,
            "status": "deleted",
            "cleanup": report,
        }),
        DeleteOutcome::NotFound => json!({ "id": id, "status": "not-found" }),
        DeleteOutcome::Failed(err) => json!({
            "id": id,
            "status": "failed",
            "error": err.to_string(),
        }),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    match outcome {
        DeleteOutcome::Deleted(report) => {
            println!("deleted {id}: {} blobs removed", report.removed.len());
            for orphan in &report.orphaned {
                println!(
                    "  orphaned {}: {}",
                    orphan.path.as_str(),
                    orphan.reason
                );
            }
        }
        DeleteOutcome::NotFound => println!("{id} not found"),
        DeleteOutcome::Failed(err) => println!("delete {id} failed: {err}"),
    }
    Ok(())
}
