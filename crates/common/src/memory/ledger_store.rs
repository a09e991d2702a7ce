use crate::domain::{
    Batch, BatchOutcome, BatchRepository, BatchStatus, DomainError, DomainResult, FinancialRecord,
    FinancialRecordRepository, RecordFilter, RecordKey,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Ledger held in process memory with the same conditional-write semantics
/// as the Postgres adapter. Implements both repositories.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    records: RwLock<BTreeMap<RecordKey, FinancialRecord>>,
    batches: RwLock<HashMap<String, Batch>>,
    unavailable: AtomicBool,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with a transient `RepositoryError`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn records(&self) -> Vec<FinancialRecord> {
        self.records.read().await.values().cloned().collect()
    }

    fn check_available(&self) -> DomainResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::RepositoryError(anyhow::anyhow!(
                "ledger store unavailable"
            )));
        }
        Ok(())
    }
}

fn conflict(key: &RecordKey) -> DomainError {
    DomainError::RecordAlreadyExists {
        company_id: key.company_id.clone(),
        reporting_period: key.reporting_period.clone(),
    }
}

#[async_trait]
impl FinancialRecordRepository for InMemoryLedgerStore {
    async fn get_record(&self, key: &RecordKey) -> DomainResult<Option<FinancialRecord>> {
        self.check_available()?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn insert_record(&self, record: &FinancialRecord) -> DomainResult<()> {
        self.check_available()?;
        let key = record.key();
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Err(conflict(&key));
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn insert_records_atomically(&self, records: &[FinancialRecord]) -> DomainResult<()> {
        self.check_available()?;
        let mut stored = self.records.write().await;

        // Validate every condition before applying anything
        let mut seen = HashSet::new();
        for record in records {
            let key = record.key();
            if stored.contains_key(&key) || !seen.insert(key.clone()) {
                return Err(conflict(&key));
            }
        }

        for record in records {
            stored.insert(record.key(), record.clone());
        }
        Ok(())
    }

    async fn find_records(&self, filter: &RecordFilter) -> DomainResult<Vec<FinancialRecord>> {
        self.check_available()?;
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BatchRepository for InMemoryLedgerStore {
    async fn create_batch(&self, batch: &Batch) -> DomainResult<()> {
        self.check_available()?;
        let mut batches = self.batches.write().await;
        if batches.contains_key(&batch.batch_id) {
            return Err(DomainError::BatchAlreadyExists(batch.batch_id.clone()));
        }
        batches.insert(batch.batch_id.clone(), batch.clone());
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> DomainResult<Option<Batch>> {
        self.check_available()?;
        Ok(self.batches.read().await.get(batch_id).cloned())
    }

    async fn complete_batch(&self, batch_id: &str, outcome: BatchOutcome) -> DomainResult<bool> {
        self.check_available()?;
        match self.batches.write().await.get_mut(batch_id) {
            Some(batch) if batch.status == BatchStatus::Processing => {
                batch.apply(outcome);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(company: &str, period: &str) -> FinancialRecord {
        FinancialRecord::new(company, period)
    }

    #[tokio::test]
    async fn test_insert_record_rejects_existing_key() {
        let store = InMemoryLedgerStore::new();
        store.insert_record(&record("A", "2024-Q1")).await.unwrap();

        let err = store.insert_record(&record("A", "2024-Q1")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_atomic_insert_is_all_or_nothing() {
        let store = InMemoryLedgerStore::new();
        store.insert_record(&record("B", "2024-Q1")).await.unwrap();

        let result = store
            .insert_records_atomically(&[record("A", "2024-Q1"), record("B", "2024-Q1")])
            .await;

        assert!(matches!(result, Err(DomainError::RecordAlreadyExists { .. })));
        assert!(store
            .get_record(&RecordKey::new("A", "2024-Q1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_atomic_insert_rejects_duplicate_keys_within_batch() {
        let store = InMemoryLedgerStore::new();

        let result = store
            .insert_records_atomically(&[record("A", "2024-Q1"), record("A", "2024-Q1")])
            .await;

        assert!(result.is_err());
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_complete_batch_without_row() {
        let store = InMemoryLedgerStore::new();
        let updated = store
            .complete_batch("missing", BatchOutcome::committed(1))
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_completed_batch_keeps_first_counters() {
        let store = InMemoryLedgerStore::new();
        let batch = Batch::processing("batch-1".to_string(), 2, Utc::now());
        store.create_batch(&batch).await.unwrap();

        assert!(store
            .complete_batch("batch-1", BatchOutcome::committed(2))
            .await
            .unwrap());
        assert!(!store
            .complete_batch("batch-1", BatchOutcome::escalated(2))
            .await
            .unwrap());

        let stored = store.get_batch("batch-1").await.unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Completed);
        assert_eq!(stored.successful_records, 2);
        assert_eq!(stored.failed_records, 0);
    }

    #[tokio::test]
    async fn test_create_batch_twice_conflicts() {
        let store = InMemoryLedgerStore::new();
        let batch = Batch::processing("batch-1".to_string(), 1, Utc::now());
        store.create_batch(&batch).await.unwrap();

        assert!(matches!(
            store.create_batch(&batch).await,
            Err(DomainError::BatchAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_transiently() {
        let store = InMemoryLedgerStore::new();
        store.set_unavailable(true);

        let err = store.insert_record(&record("A", "2024-Q1")).await.unwrap_err();
        assert!(matches!(err, DomainError::RepositoryError(_)));

        store.set_unavailable(false);
        assert!(store.insert_record(&record("A", "2024-Q1")).await.is_ok());
    }
}
