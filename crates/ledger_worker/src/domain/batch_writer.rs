use chrono::Utc;
use common::domain::{
    BatchOutcome, BatchRepository, DomainError, DomainResult, FinancialRecord,
    FinancialRecordRepository, IdGenerator, MessageQueue, QueuePayload,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// How the batch writer resolved one work-queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResolution {
    pub batch_id: Option<String>,
    pub outcome: BatchOutcome,
    /// Records escalated to the dead-letter queue
    pub dead_lettered: usize,
    /// Records that could not be sent to the dead-letter queue
    pub dead_letter_failures: usize,
    /// False when there was no status row to complete, or it was left open
    pub status_updated: bool,
}

impl BatchResolution {
    /// Every record is either committed or on the dead-letter queue. Until
    /// then the work message must stay queued for redelivery.
    pub fn is_resolved(&self) -> bool {
        self.dead_letter_failures == 0
    }
}

/// Primary consumer: writes a whole batch in one all-or-nothing conditional
/// write, or escalates every record of the batch to the dead-letter queue.
///
/// The atomic write reports no per-item detail, so a single conflicting key
/// (or a store fault) sends all N records down the dead-letter path. The
/// reconciler then sorts duplicates from genuinely new records.
pub struct BatchWriter {
    record_repository: Arc<dyn FinancialRecordRepository>,
    batch_repository: Arc<dyn BatchRepository>,
    queue: Arc<dyn MessageQueue>,
    id_generator: Arc<dyn IdGenerator>,
    dead_letter_queue: String,
}

impl BatchWriter {
    pub fn new(
        record_repository: Arc<dyn FinancialRecordRepository>,
        batch_repository: Arc<dyn BatchRepository>,
        queue: Arc<dyn MessageQueue>,
        id_generator: Arc<dyn IdGenerator>,
        dead_letter_queue: impl Into<String>,
    ) -> Self {
        Self {
            record_repository,
            batch_repository,
            queue,
            id_generator,
            dead_letter_queue: dead_letter_queue.into(),
        }
    }

    /// Resolve one batch. Only a malformed batch is an error; store and queue
    /// faults are logged and folded into the resolution.
    #[instrument(skip(self, records), fields(record_count = records.len()))]
    pub async fn write_batch(&self, records: Vec<FinancialRecord>) -> DomainResult<BatchResolution> {
        if records.is_empty() {
            return Err(DomainError::MalformedMessage("empty batch".to_string()));
        }
        let total = u32::try_from(records.len()).map_err(|_| {
            DomainError::MalformedMessage(format!("batch too large: {}", records.len()))
        })?;

        let batch_id = records.iter().find_map(|r| r.batch_id.clone());
        if batch_id.is_none() {
            warn!("batch carries no batch_id, status will not be updated");
        }

        let now = Utc::now();
        let stamped: Vec<FinancialRecord> = records
            .iter()
            .cloned()
            .map(|record| record.stamped(self.id_generator.generate(), now))
            .collect();

        let (outcome, dead_lettered, dead_letter_failures) =
            match self.record_repository.insert_records_atomically(&stamped).await {
                Ok(()) => {
                    info!(batch_id = ?batch_id, total, "batch committed");
                    (BatchOutcome::committed(total), 0, 0)
                }
                Err(e) => {
                    warn!(
                        batch_id = ?batch_id,
                        total,
                        error = %e,
                        "atomic batch write rejected, escalating records to dead-letter queue"
                    );
                    let failures = self.escalate(records).await;
                    (BatchOutcome::escalated(total), total as usize - failures, failures)
                }
            };

        // A batch with undelivered records stays Processing until a redelivery resolves it
        let status_updated = match &batch_id {
            Some(id) if dead_letter_failures == 0 => self.complete_status(id, outcome).await,
            Some(id) => {
                warn!(
                    batch_id = %id,
                    dead_letter_failures,
                    "leaving batch open, records could not be dead-lettered"
                );
                false
            }
            None => false,
        };

        Ok(BatchResolution {
            batch_id,
            outcome,
            dead_lettered,
            dead_letter_failures,
            status_updated,
        })
    }

    /// Sends each record on its own. Returns how many sends failed.
    async fn escalate(&self, records: Vec<FinancialRecord>) -> usize {
        let mut failures = 0;
        for record in records {
            let key = record.key();
            let sent = match QueuePayload::Record(Box::new(record)).encode() {
                Ok(payload) => self.queue.send(&self.dead_letter_queue, payload).await,
                Err(e) => Err(e),
            };

            match sent {
                Ok(()) => debug!(key = %key, "record sent to dead-letter queue"),
                Err(e) => {
                    // Retried by redelivery of the whole work-queue message
                    error!(key = %key, error = %e, "failed to send record to dead-letter queue");
                    failures += 1;
                }
            }
        }
        failures
    }

    async fn complete_status(&self, batch_id: &str, outcome: BatchOutcome) -> bool {
        match self.batch_repository.complete_batch(batch_id, outcome).await {
            Ok(true) => {
                debug!(batch_id = %batch_id, "batch status completed");
                true
            }
            Ok(false) => {
                warn!(batch_id = %batch_id, "no open batch status row to update");
                false
            }
            Err(e) => {
                error!(batch_id = %batch_id, error = %e, "failed to update batch status");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        MockBatchRepository, MockFinancialRecordRepository, MockIdGenerator, MockMessageQueue,
    };
    use common::memory::SequentialIdGenerator;
    use mockall::Sequence;
    use serde_json::json;

    fn tagged(company: &str) -> FinancialRecord {
        let mut record =
            FinancialRecord::new(company, "2024-Q1").with_field("revenue", json!(100));
        record.batch_id = Some("batch-1".to_string());
        record
    }

    fn writer(
        records: MockFinancialRecordRepository,
        batches: MockBatchRepository,
        queue: MockMessageQueue,
    ) -> BatchWriter {
        BatchWriter::new(
            Arc::new(records),
            Arc::new(batches),
            Arc::new(queue),
            Arc::new(SequentialIdGenerator::new("rec")),
            "dlq",
        )
    }

    #[tokio::test]
    async fn test_commit_marks_batch_successful() {
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_insert_records_atomically()
            .withf(|records| {
                records.len() == 2
                    && records[0].record_id.as_deref() == Some("rec-1")
                    && records.iter().all(|r| r.created_at.is_some())
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut batches = MockBatchRepository::new();
        batches
            .expect_complete_batch()
            .withf(|id, outcome| id == "batch-1" && *outcome == BatchOutcome::committed(2))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut queue = MockMessageQueue::new();
        queue.expect_send().times(0);

        let resolution = writer(records, batches, queue)
            .write_batch(vec![tagged("A"), tagged("B")])
            .await
            .unwrap();

        assert_eq!(resolution.outcome, BatchOutcome::committed(2));
        assert_eq!(resolution.dead_lettered, 0);
        assert!(resolution.status_updated);
    }

    #[tokio::test]
    async fn test_rejection_escalates_every_record_then_updates_status() {
        let mut seq = Sequence::new();
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_insert_records_atomically()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(DomainError::RecordAlreadyExists {
                    company_id: "B".to_string(),
                    reporting_period: "2024-Q1".to_string(),
                })
            });

        let mut queue = MockMessageQueue::new();
        queue
            .expect_send()
            .withf(|q, payload| {
                let record = QueuePayload::decode(payload).unwrap().into_record().unwrap();
                q == "dlq" && record.record_id.is_none() && record.batch_id.is_some()
            })
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut batches = MockBatchRepository::new();
        batches
            .expect_complete_batch()
            .withf(|id, outcome| id == "batch-1" && *outcome == BatchOutcome::escalated(3))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));

        let resolution = writer(records, batches, queue)
            .write_batch(vec![tagged("A"), tagged("B"), tagged("C")])
            .await
            .unwrap();

        assert_eq!(resolution.outcome, BatchOutcome::escalated(3));
        assert_eq!(resolution.dead_lettered, 3);
        assert_eq!(resolution.dead_letter_failures, 0);
    }

    #[tokio::test]
    async fn test_store_fault_is_treated_like_a_conflict() {
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_insert_records_atomically()
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("connection reset"))));

        let mut queue = MockMessageQueue::new();
        queue.expect_send().times(1).returning(|_, _| Ok(()));

        let mut batches = MockBatchRepository::new();
        batches
            .expect_complete_batch()
            .withf(|_, outcome| *outcome == BatchOutcome::escalated(1))
            .returning(|_, _| Ok(true));

        let resolution = writer(records, batches, queue)
            .write_batch(vec![tagged("A")])
            .await
            .unwrap();
        assert_eq!(resolution.dead_lettered, 1);
    }

    #[tokio::test]
    async fn test_dead_letter_send_failure_leaves_batch_open() {
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_insert_records_atomically()
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("throttled"))));

        let mut queue = MockMessageQueue::new();
        let mut calls = 0;
        queue.expect_send().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(DomainError::RepositoryError(anyhow::anyhow!("no responders")))
            } else {
                Ok(())
            }
        });

        let mut batches = MockBatchRepository::new();
        batches.expect_complete_batch().times(0);

        let resolution = writer(records, batches, queue)
            .write_batch(vec![tagged("A"), tagged("B")])
            .await
            .unwrap();

        assert_eq!(resolution.dead_lettered, 1);
        assert_eq!(resolution.dead_letter_failures, 1);
        assert!(!resolution.status_updated);
        assert!(!resolution.is_resolved());
    }

    #[tokio::test]
    async fn test_missing_status_row_does_not_block() {
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_insert_records_atomically()
            .returning(|_| Ok(()));

        let mut batches = MockBatchRepository::new();
        batches
            .expect_complete_batch()
            .times(1)
            .returning(|_, _| Ok(false));

        let resolution = writer(records, batches, MockMessageQueue::new())
            .write_batch(vec![tagged("A")])
            .await
            .unwrap();

        assert_eq!(resolution.outcome, BatchOutcome::committed(1));
        assert!(!resolution.status_updated);
    }

    #[tokio::test]
    async fn test_caller_record_id_is_kept() {
        let mut records = MockFinancialRecordRepository::new();
        records
            .expect_insert_records_atomically()
            .withf(|records| records[0].record_id.as_deref() == Some("caller-1"))
            .times(1)
            .returning(|_| Ok(()));

        let mut batches = MockBatchRepository::new();
        batches.expect_complete_batch().returning(|_, _| Ok(true));

        let mut ids = MockIdGenerator::new();
        ids.expect_generate().returning(|| "generated".to_string());

        let writer = BatchWriter::new(
            Arc::new(records),
            Arc::new(batches),
            Arc::new(MockMessageQueue::new()),
            Arc::new(ids),
            "dlq",
        );

        let mut record = tagged("A");
        record.record_id = Some("caller-1".to_string());
        writer.write_batch(vec![record]).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_batch_is_malformed() {
        let result = writer(
            MockFinancialRecordRepository::new(),
            MockBatchRepository::new(),
            MockMessageQueue::new(),
        )
        .write_batch(vec![])
        .await;

        assert!(matches!(result, Err(DomainError::MalformedMessage(_))));
    }
}
