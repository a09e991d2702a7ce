use crate::domain::{Batch, BatchOutcome, BatchRepository, BatchStatus, DomainError, DomainResult};
use crate::postgres::{is_unique_violation, PostgresClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, info};

/// Batch row as stored in PostgreSQL
#[derive(Debug)]
struct BatchRow {
    batch_id: String,
    total_records: i64,
    successful_records: i64,
    failed_records: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<&Row> for BatchRow {
    fn from(row: &Row) -> Self {
        Self {
            batch_id: row.get("batch_id"),
            total_records: row.get("total_records"),
            successful_records: row.get("successful_records"),
            failed_records: row.get("failed_records"),
            status: row.get("status"),
            created_at: row.get("created_at"),
        }
    }
}

impl TryFrom<BatchRow> for Batch {
    type Error = DomainError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let counter = |value: i64, column: &str| {
            u32::try_from(value).map_err(|_| {
                DomainError::RepositoryError(anyhow::anyhow!(
                    "batch {} has out of range {}: {}",
                    row.batch_id,
                    column,
                    value
                ))
            })
        };

        Ok(Batch {
            total_records: counter(row.total_records, "total_records")?,
            successful_records: counter(row.successful_records, "successful_records")?,
            failed_records: counter(row.failed_records, "failed_records")?,
            status: row
                .status
                .parse::<BatchStatus>()
                .map_err(|e| DomainError::RepositoryError(anyhow::anyhow!(e)))?,
            created_at: row.created_at,
            batch_id: row.batch_id,
        })
    }
}

#[derive(Clone)]
pub struct PostgresBatchRepository {
    client: PostgresClient,
}

impl PostgresBatchRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchRepository for PostgresBatchRepository {
    async fn create_batch(&self, batch: &Batch) -> DomainResult<()> {
        debug!(batch_id = %batch.batch_id, total_records = batch.total_records, "creating batch");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        conn.execute(
            "INSERT INTO batches (batch_id, total_records, successful_records, failed_records, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &batch.batch_id,
                &i64::from(batch.total_records),
                &i64::from(batch.successful_records),
                &i64::from(batch.failed_records),
                &batch.status.as_str(),
                &batch.created_at,
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::BatchAlreadyExists(batch.batch_id.clone())
            } else {
                DomainError::RepositoryError(e.into())
            }
        })?;

        info!(batch_id = %batch.batch_id, "batch created");
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> DomainResult<Option<Batch>> {
        debug!(batch_id = %batch_id, "getting batch");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT batch_id, total_records, successful_records, failed_records, status, created_at
                 FROM batches
                 WHERE batch_id = $1",
                &[&batch_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref()
            .map(|r| Batch::try_from(BatchRow::from(r)))
            .transpose()
    }

    async fn complete_batch(&self, batch_id: &str, outcome: BatchOutcome) -> DomainResult<bool> {
        debug!(
            batch_id = %batch_id,
            successful_records = outcome.successful_records,
            failed_records = outcome.failed_records,
            "completing batch"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let updated = conn
            .execute(
                "UPDATE batches
                 SET successful_records = $2, failed_records = $3, status = $4
                 WHERE batch_id = $1 AND status = $5",
                &[
                    &batch_id,
                    &i64::from(outcome.successful_records),
                    &i64::from(outcome.failed_records),
                    &BatchStatus::Completed.as_str(),
                    &BatchStatus::Processing.as_str(),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if updated == 0 {
            debug!(batch_id = %batch_id, "no open batch row to complete");
            return Ok(false);
        }

        info!(batch_id = %batch_id, "batch completed");
        Ok(true)
    }
}
