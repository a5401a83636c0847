//! Postgres sink: records as JSONB plus the bookkeeping tables

use super::batch::{LoadedBatch, LoadedFile};
use super::sink::{combine_all, LoadAction, LoadStrategy, PendingBatch, RifLoadSink};
use crate::error::Result;
use crate::record::RecordAction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PgLoadSink {
    pool: PgPool,
}

impl PgLoadSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .connect(database_url)
            .await?;
        info!(max_connections, "Database connection pool created");

        let sink = Self::new(pool);
        sink.migrate().await?;
        Ok(sink)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn loaded_batches(&self, loaded_file_id: Uuid) -> Result<Vec<LoadedBatch>> {
        let rows = sqlx::query(
            r#"
            SELECT loaded_batch_id, loaded_file_id, beneficiaries, created
            FROM loaded_batches
            WHERE loaded_file_id = $1
            ORDER BY created, loaded_batch_id
            "#,
        )
        .bind(loaded_file_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<LoadedBatch> {
                Ok(LoadedBatch::from_parts(
                    row.try_get::<Uuid, _>("loaded_batch_id")?,
                    row.try_get::<Uuid, _>("loaded_file_id")?,
                    row.try_get::<String, _>("beneficiaries")?,
                    row.try_get::<DateTime<Utc>, _>("created")?,
                ))
            })
            .collect()
    }
}

async fn insert_batch_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    batch: &LoadedBatch,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO loaded_batches (loaded_batch_id, loaded_file_id, beneficiaries, created)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(batch.id())
    .bind(batch.loaded_file_id())
    .bind(batch.beneficiaries_text())
    .bind(batch.created())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl RifLoadSink for PgLoadSink {
    async fn record_loaded_file(&self, file: &LoadedFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loaded_files (loaded_file_id, rif_type, created)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(file.id)
        .bind(file.file_type.as_str())
        .bind(file.created)
        .execute(&self.pool)
        .await?;
        debug!(loaded_file_id = %file.id, file_type = %file.file_type, "Recorded loaded file");
        Ok(())
    }

    #[instrument(skip_all, fields(loaded_batch_id = %batch.loaded_batch.id(), records = batch.records.len()))]
    async fn write_batch(&self, batch: &PendingBatch) -> Result<Vec<LoadAction>> {
        let mut tx = self.pool.begin().await?;
        let mut actions = Vec::with_capacity(batch.records.len());

        for event in &batch.records {
            let record = event.record();
            let json = serde_json::to_value(record)?;
            let file_type = record.file_type().as_str();
            let key = record.record_key();

            let action = match (batch.strategy, event.action()) {
                (LoadStrategy::InsertIdempotent, action) => {
                    let result = sqlx::query(
                        r#"
                        INSERT INTO rif_records
                            (file_type, record_key, beneficiary_id, last_action, record, loaded_batch_id)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (file_type, record_key) DO NOTHING
                        "#,
                    )
                    .bind(file_type)
                    .bind(&key)
                    .bind(event.beneficiary_id())
                    .bind(action.as_str())
                    .bind(&json)
                    .bind(batch.loaded_batch.id())
                    .execute(&mut *tx)
                    .await?;
                    if result.rows_affected() == 0 {
                        LoadAction::DidNothing
                    } else {
                        LoadAction::Inserted
                    }
                },
                (LoadStrategy::InsertUpdateNonIdempotent, RecordAction::Update) => {
                    let inserted: bool = sqlx::query_scalar(
                        r#"
                        INSERT INTO rif_records
                            (file_type, record_key, beneficiary_id, last_action, record, loaded_batch_id)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (file_type, record_key) DO UPDATE SET
                            beneficiary_id = EXCLUDED.beneficiary_id,
                            last_action = EXCLUDED.last_action,
                            record = EXCLUDED.record,
                            loaded_batch_id = EXCLUDED.loaded_batch_id,
                            updated = NOW()
                        RETURNING (xmax = 0)
                        "#,
                    )
                    .bind(file_type)
                    .bind(&key)
                    .bind(event.beneficiary_id())
                    .bind(RecordAction::Update.as_str())
                    .bind(&json)
                    .bind(batch.loaded_batch.id())
                    .fetch_one(&mut *tx)
                    .await?;
                    if inserted {
                        LoadAction::Inserted
                    } else {
                        LoadAction::Updated
                    }
                },
                (LoadStrategy::InsertUpdateNonIdempotent, action) => {
                    sqlx::query(
                        r#"
                        INSERT INTO rif_records
                            (file_type, record_key, beneficiary_id, last_action, record, loaded_batch_id)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        "#,
                    )
                    .bind(file_type)
                    .bind(&key)
                    .bind(event.beneficiary_id())
                    .bind(action.as_str())
                    .bind(&json)
                    .bind(batch.loaded_batch.id())
                    .execute(&mut *tx)
                    .await?;
                    LoadAction::Inserted
                },
            };
            actions.push(action);
        }

        insert_batch_row(&mut tx, &batch.loaded_batch).await?;

        for skipped in &batch.skipped {
            sqlx::query(
                r#"
                INSERT INTO skipped_rif_records
                    (rif_file_timestamp, skip_reason, rif_file_type, dml_ind, bene_id, rif_data)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(skipped.rif_file_timestamp)
            .bind(skipped.skip_reason.as_str())
            .bind(skipped.rif_file_type.as_str())
            .bind(skipped.dml_ind.as_str())
            .bind(&skipped.beneficiary_id)
            .bind(&skipped.rif_data)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(actions)
    }

    async fn compact_batches(&self, loaded_file_id: Uuid) -> Result<Option<LoadedBatch>> {
        let batches = self.loaded_batches(loaded_file_id).await?;
        let Some(combined) = combine_all(&batches)? else {
            return Ok(None);
        };
        if batches.len() == 1 {
            return Ok(Some(combined));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM loaded_batches WHERE loaded_file_id = $1")
            .bind(loaded_file_id)
            .execute(&mut *tx)
            .await?;
        insert_batch_row(&mut tx, &combined).await?;
        tx.commit().await?;

        debug!(%loaded_file_id, merged = batches.len(), "Compacted loaded batches");
        Ok(Some(combined))
    }
}
