use chrono::Utc;
use common::domain::{DomainResult, FinancialRecord, FinancialRecordRepository, IdGenerator};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Prefix of record ids assigned on the dead-letter path
pub const DEAD_LETTER_ID_PREFIX: &str = "dlq-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Already stored; the store was not touched
    Duplicate,
    /// Written by this attempt
    Inserted,
    /// Another writer took the key between lookup and insert. The next
    /// delivery resolves it as a duplicate.
    Retained(String),
}

impl ReconcileOutcome {
    /// Whether the dead-letter message can be deleted
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ReconcileOutcome::Retained(_))
    }
}

/// Per-record resolution of records escalated by the batch writer.
///
/// Lookup first, then a conditional insert. Store faults are returned as
/// errors and the message stays queued; redelivery after the visibility
/// timeout is the only retry.
pub struct DeadLetterReconciler {
    record_repository: Arc<dyn FinancialRecordRepository>,
    id_generator: Arc<dyn IdGenerator>,
}

impl DeadLetterReconciler {
    pub fn new(
        record_repository: Arc<dyn FinancialRecordRepository>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            record_repository,
            id_generator,
        }
    }

    #[instrument(skip(self, record), fields(company_id = %record.company_id, reporting_period = %record.reporting_period))]
    pub async fn reconcile(&self, record: FinancialRecord) -> DomainResult<ReconcileOutcome> {
        let key = record.key();

        if self.record_repository.get_record(&key).await?.is_some() {
            info!(key = %key, "record already stored, skipping duplicate");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let record_id = format!("{}{}", DEAD_LETTER_ID_PREFIX, self.id_generator.generate());
        let record = record.stamped(record_id, Utc::now());

        match self.record_repository.insert_record(&record).await {
            Ok(()) => {
                debug!(key = %key, record_id = ?record.record_id, "record inserted from dead-letter queue");
                Ok(ReconcileOutcome::Inserted)
            }
            Err(e) if e.is_conflict() => {
                warn!(key = %key, "record written concurrently, retaining for redelivery");
                Ok(ReconcileOutcome::Retained(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{DomainError, MockFinancialRecordRepository};
    use common::memory::SequentialIdGenerator;

    fn reconciler(records: MockFinancialRecordRepository) -> DeadLetterReconciler {
        DeadLetterReconciler::new(Arc::new(records), Arc::new(SequentialIdGenerator::new("x")))
    }

    fn record() -> FinancialRecord {
        FinancialRecord::new("ACME", "2024-Q1")
    }

    #[tokio::test]
    async fn test_existing_record_is_duplicate_without_write() {
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_get_record()
            .times(1)
            .returning(|key| Ok(Some(FinancialRecord::new(key.company_id.clone(), key.reporting_period.clone()))));
        records.expect_insert_record().times(0);

        let outcome = reconciler(records).reconcile(record()).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Duplicate);
        assert!(outcome.is_resolved());
    }

    #[tokio::test]
    async fn test_missing_record_is_inserted_with_dead_letter_id() {
        let mut records = MockFinancialRecordRepository::new();
        records.expect_get_record().returning(|_| Ok(None));
        records
            .expect_insert_record()
            .withf(|r| r.record_id.as_deref() == Some("dlq-x-1") && r.created_at.is_some())
            .times(1)
            .returning(|_| Ok(()));

        let outcome = reconciler(records).reconcile(record()).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_concurrent_insert_is_retained() {
        let mut records = MockFinancialRecordRepository::new();
        records.expect_get_record().returning(|_| Ok(None));
        records.expect_insert_record().returning(|r| {
            Err(DomainError::RecordAlreadyExists {
                company_id: r.company_id.clone(),
                reporting_period: r.reporting_period.clone(),
            })
        });

        let outcome = reconciler(records).reconcile(record()).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Retained(_)));
        assert!(!outcome.is_resolved());
    }

    #[tokio::test]
    async fn test_lookup_fault_is_an_error() {
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_get_record()
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("timeout"))));
        records.expect_insert_record().times(0);

        let result = reconciler(records).reconcile(record()).await;
        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }
}
