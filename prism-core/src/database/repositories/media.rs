use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prism_model::{
    BlobPath, ImageDimensions, MediaId, MediaRecord, Tier, VariantRef,
    VariantSet,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    database::repository_ports::MediaRepository,
    error::{MediaError, Result},
};

#[derive(Clone, Debug)]
pub struct PostgresMediaRepository {
    pool: PgPool,
}

struct MediaRow {
    id: Uuid,
    filename: String,
    mime_type: String,
    original_ref: String,
    width: Option<i32>,
    height: Option<i32>,
    created_at: DateTime<Utc>,
}

struct VariantRow {
    media_id: Uuid,
    tier: String,
    blob_path: String,
    width: i32,
    height: i32,
}

const SELECT_MEDIA: &str = r#"
    SELECT id, filename, mime_type, original_ref, width, height, created_at
    FROM media
"#;

fn write_error(id: MediaId, action: &str, err: sqlx::Error) -> MediaError {
    MediaError::RepositoryWrite(format!("failed to {action} media {id}: {err}"))
}

/// Width and height as the signed `INTEGER` columns store them.
fn column_dimensions(
    id: MediaId,
    dimensions: ImageDimensions,
) -> Result<(i32, i32)> {
    let column = |value: u32| {
        i32::try_from(value).map_err(|_| {
            MediaError::RepositoryWrite(format!(
                "dimensions {dimensions} of media {id} exceed the column range"
            ))
        })
    };
    Ok((column(dimensions.width_u32())?, column(dimensions.height_u32())?))
}

impl PostgresMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn media_row(row: &PgRow) -> Result<MediaRow> {
        Ok(MediaRow {
            id: row.try_get("id")?,
            filename: row.try_get("filename")?,
            mime_type: row.try_get("mime_type")?,
            original_ref: row.try_get("original_ref")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn variant_row(row: &PgRow) -> Result<VariantRow> {
        Ok(VariantRow {
            media_id: row.try_get("media_id")?,
            tier: row.try_get("tier")?,
            blob_path: row.try_get("blob_path")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
        })
    }

    fn dimensions_from_columns(
        id: Uuid,
        width: Option<i32>,
        height: Option<i32>,
    ) -> Result<Option<ImageDimensions>> {
        match (width, height) {
            (Some(w), Some(h)) => ImageDimensions::try_from((w, h))
                .map(Some)
                .map_err(|err| {
                    MediaError::Internal(format!(
                        "media {id} has invalid stored dimensions {w}x{h}: {err}"
                    ))
                }),
            (None, None) => Ok(None),
            _ => Err(MediaError::Internal(format!(
                "media {id} has only one stored dimension"
            ))),
        }
    }

    fn variant_from_row(r: VariantRow) -> Result<(Tier, VariantRef)> {
        let tier = r.tier.parse::<Tier>().map_err(|err| {
            MediaError::Internal(format!(
                "media {} has unknown variant tier: {err}",
                r.media_id
            ))
        })?;
        let dimensions = ImageDimensions::try_from((r.width, r.height))
            .map_err(|err| {
                MediaError::Internal(format!(
                    "media {} variant {tier} has invalid dimensions: {err}",
                    r.media_id
                ))
            })?;
        Ok((tier, VariantRef::new(BlobPath::new(r.blob_path), dimensions)))
    }

    /// Attach variants to a page of media rows with one extra query.
    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<MediaRecord>> {
        let media = rows
            .iter()
            .map(Self::media_row)
            .collect::<Result<Vec<_>>>()?;
        if media.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = media.iter().map(|m| m.id).collect();
        let variant_rows = sqlx::query(
            r#"
            SELECT media_id, tier, blob_path, width, height
            FROM media_variants
            WHERE media_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut variants: HashMap<Uuid, VariantSet> = HashMap::new();
        for row in &variant_rows {
            let r = Self::variant_row(row)?;
            let media_id = r.media_id;
            let (tier, variant) = Self::variant_from_row(r)?;
            variants.entry(media_id).or_default().insert(tier, variant);
        }

        media
            .into_iter()
            .map(|m| {
                Ok(MediaRecord {
                    id: MediaId(m.id),
                    dimensions: Self::dimensions_from_columns(
                        m.id, m.width, m.height,
                    )?,
                    variants: variants.remove(&m.id).unwrap_or_default(),
                    filename: m.filename,
                    mime_type: m.mime_type,
                    original_ref: BlobPath::new(m.original_ref),
                    created_at: m.created_at,
                })
            })
            .collect()
    }

    async fn insert_variants(
        tx: &mut Transaction<'_, Postgres>,
        id: MediaId,
        variants: &VariantSet,
    ) -> Result<()> {
        for (tier, variant) in variants.iter() {
            let (width, height) = column_dimensions(id, variant.dimensions)?;
            sqlx::query(
                r#"
                INSERT INTO media_variants (media_id, tier, blob_path, width, height)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id.to_uuid())
            .bind(tier.as_str())
            .bind(variant.path.as_str())
            .bind(width)
            .bind(height)
            .execute(&mut **tx)
            .await
            .map_err(|e| write_error(id, "insert variants of", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl MediaRepository for PostgresMediaRepository {
    async fn get(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        let rows = sqlx::query(&format!("{SELECT_MEDIA} WHERE id = $1"))
            .bind(id.to_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(self.hydrate(rows).await?.pop())
    }

    async fn list_missing_dimensions(&self) -> Result<Vec<MediaRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_MEDIA} WHERE width IS NULL OR height IS NULL ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn list_all(&self) -> Result<Vec<MediaRecord>> {
        let rows =
            sqlx::query(&format!("{SELECT_MEDIA} ORDER BY created_at, id"))
                .fetch_all(&self.pool)
                .await?;
        self.hydrate(rows).await
    }

    async fn insert(&self, record: &MediaRecord) -> Result<()> {
        let id = record.id;
        let (width, height) = match record.dimensions {
            Some(dimensions) => {
                let (w, h) = column_dimensions(id, dimensions)?;
                (Some(w), Some(h))
            }
            None => (None, None),
        };
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| write_error(id, "begin insert of", e))?;

        sqlx::query(
            r#"
            INSERT INTO media (id, filename, mime_type, original_ref, width, height, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id.to_uuid())
        .bind(&record.filename)
        .bind(&record.mime_type)
        .bind(record.original_ref.as_str())
        .bind(width)
        .bind(height)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(id, "insert", e))?;

        Self::insert_variants(&mut tx, id, &record.variants).await?;

        tx.commit()
            .await
            .map_err(|e| write_error(id, "commit insert of", e))?;
        debug!(media_id = %id, "media inserted");
        Ok(())
    }

    async fn update_dimensions(
        &self,
        id: MediaId,
        dimensions: ImageDimensions,
    ) -> Result<()> {
        let (width, height) = column_dimensions(id, dimensions)?;
        let res = sqlx::query(
            r#"
            UPDATE media
            SET width = $2, height = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .bind(width)
        .bind(height)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(id, "update dimensions of", e))?;

        if res.rows_affected() == 0 {
            return Err(MediaError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn replace_variants(
        &self,
        id: MediaId,
        variants: &VariantSet,
        dimensions: ImageDimensions,
    ) -> Result<()> {
        let (width, height) = column_dimensions(id, dimensions)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| write_error(id, "begin variant replace of", e))?;

        // Row lock keeps a concurrent delete from interleaving with the swap.
        let res = sqlx::query(
            r#"
            UPDATE media
            SET width = $2, height = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .bind(width)
        .bind(height)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(id, "update dimensions of", e))?;

        if res.rows_affected() == 0 {
            if let Err(err) = tx.rollback().await {
                warn!(media_id = %id, "rollback failed: {err}");
            }
            return Err(MediaError::NotFound(id.to_string()));
        }

        sqlx::query("DELETE FROM media_variants WHERE media_id = $1")
            .bind(id.to_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(id, "clear variants of", e))?;

        Self::insert_variants(&mut tx, id, variants).await?;

        tx.commit()
            .await
            .map_err(|e| write_error(id, "commit variant replace of", e))?;
        Ok(())
    }

    async fn delete(&self, id: MediaId) -> Result<bool> {
        // media_variants rows go with it (ON DELETE CASCADE).
        let res = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id.to_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(id, "delete", e))?;
        Ok(res.rows_affected() > 0)
    }
}
