use crate::domain::{
    DomainError, DomainResult, FinancialRecord, FinancialRecordRepository, RecordFilter, RecordKey,
};
use crate::postgres::{is_unique_violation, PostgresClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::{debug, info};

const INSERT_RECORD: &str = "INSERT INTO financial_records
     (company_id, reporting_period, record_id, batch_id, industry_sector, payload, created_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7)
     ON CONFLICT (company_id, reporting_period) DO NOTHING";

const SELECT_COLUMNS: &str =
    "SELECT company_id, reporting_period, record_id, batch_id, payload, created_at FROM financial_records";

/// Column values for one insert. `industry_sector` is lifted out of the
/// payload into its own indexed column.
struct RecordParams<'a> {
    record: &'a FinancialRecord,
    sector: Option<&'a str>,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl<'a> RecordParams<'a> {
    fn new(record: &'a FinancialRecord) -> Self {
        Self {
            record,
            sector: record.industry_sector(),
            payload: serde_json::Value::Object(record.fields.clone()),
            created_at: record.created_at.unwrap_or_else(Utc::now),
        }
    }

    fn as_params(&self) -> [&(dyn ToSql + Sync); 7] {
        [
            &self.record.company_id,
            &self.record.reporting_period,
            &self.record.record_id,
            &self.record.batch_id,
            &self.sector,
            &self.payload,
            &self.created_at,
        ]
    }
}

fn row_to_record(row: &Row) -> FinancialRecord {
    let payload: serde_json::Value = row.get(4);
    let fields = match payload {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    FinancialRecord {
        company_id: row.get(0),
        reporting_period: row.get(1),
        record_id: row.get(2),
        batch_id: row.get(3),
        created_at: Some(row.get(5)),
        fields,
    }
}

fn conflict(record: &FinancialRecord) -> DomainError {
    DomainError::RecordAlreadyExists {
        company_id: record.company_id.clone(),
        reporting_period: record.reporting_period.clone(),
    }
}

#[derive(Clone)]
pub struct PostgresFinancialRecordRepository {
    client: PostgresClient,
}

impl PostgresFinancialRecordRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FinancialRecordRepository for PostgresFinancialRecordRepository {
    async fn get_record(&self, key: &RecordKey) -> DomainResult<Option<FinancialRecord>> {
        debug!(company_id = %key.company_id, reporting_period = %key.reporting_period, "getting financial record");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!("{SELECT_COLUMNS} WHERE company_id = $1 AND reporting_period = $2"),
                &[&key.company_id, &key.reporting_period],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn insert_record(&self, record: &FinancialRecord) -> DomainResult<()> {
        debug!(company_id = %record.company_id, reporting_period = %record.reporting_period, "inserting financial record");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let params = RecordParams::new(record);
        let inserted = conn
            .execute(INSERT_RECORD, &params.as_params())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    conflict(record)
                } else {
                    DomainError::RepositoryError(e.into())
                }
            })?;

        if inserted == 0 {
            return Err(conflict(record));
        }

        info!(company_id = %record.company_id, reporting_period = %record.reporting_period, "financial record inserted");
        Ok(())
    }

    async fn insert_records_atomically(&self, records: &[FinancialRecord]) -> DomainResult<()> {
        debug!(record_count = records.len(), "inserting financial records in one transaction");

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let statement = tx
            .prepare_cached(INSERT_RECORD)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        for record in records {
            let params = RecordParams::new(record);
            let inserted = tx
                .execute(&statement, &params.as_params())
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        conflict(record)
                    } else {
                        DomainError::RepositoryError(e.into())
                    }
                })?;

            // Dropping the transaction without commit rolls back every earlier insert
            if inserted == 0 {
                return Err(conflict(record));
            }
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        info!(record_count = records.len(), "financial records committed");
        Ok(())
    }

    async fn find_records(&self, filter: &RecordFilter) -> DomainResult<Vec<FinancialRecord>> {
        debug!(?filter, "finding financial records");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let mut query = String::from(SELECT_COLUMNS);
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        if let Some(ref company_id) = filter.company_id {
            params.push(company_id);
            query.push_str(" WHERE company_id = $1");
        } else if let Some(ref sector) = filter.industry_sector {
            params.push(sector);
            query.push_str(" WHERE industry_sector = $1");
        }

        if let Some(ref period) = filter.reporting_period {
            params.push(period);
            let keyword = if params.len() == 1 { "WHERE" } else { "AND" };
            query.push_str(&format!(" {} reporting_period = ${}", keyword, params.len()));
        }

        query.push_str(" ORDER BY company_id, reporting_period");

        let rows = conn
            .query(&query, &params[..])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(row_to_record).collect())
    }
}
