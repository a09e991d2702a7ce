use chrono::Utc;
use common::domain::{
    Batch, BatchRepository, DomainError, DomainResult, FinancialRecord, IdGenerator, MessageQueue,
    QueuePayload,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Path callers poll for the outcome of a submitted batch
pub const BATCH_STATUS_PATH: &str = "/api/v1/finance/batch-status";

/// A batch of records submitted for ingestion
#[derive(Debug, Clone, Validate)]
pub struct SubmitBatchInput {
    #[garde(length(min = 1), dive)]
    pub records: Vec<FinancialRecord>,
}

/// Accepted batch, returned before any record is written
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedBatch {
    pub batch_id: String,
    pub total_records: u32,
    pub status_endpoint: String,
}

/// Hands a submitted batch off to the asynchronous pipeline.
///
/// Flow:
/// 1. Validate the batch (non-empty, every record keyed)
/// 2. Persist the `Processing` status row
/// 3. Tag every record with the batch id
/// 4. Send the whole batch to the work queue as one message
///
/// The status row is always written before the message is sent so the batch
/// writer can find it.
pub struct BatchIngestionService {
    batch_repository: Arc<dyn BatchRepository>,
    queue: Arc<dyn MessageQueue>,
    id_generator: Arc<dyn IdGenerator>,
    work_queue: String,
}

impl BatchIngestionService {
    pub fn new(
        batch_repository: Arc<dyn BatchRepository>,
        queue: Arc<dyn MessageQueue>,
        id_generator: Arc<dyn IdGenerator>,
        work_queue: impl Into<String>,
    ) -> Self {
        Self {
            batch_repository,
            queue,
            id_generator,
            work_queue: work_queue.into(),
        }
    }

    #[instrument(skip(self, input), fields(record_count = input.records.len()))]
    pub async fn submit(&self, input: SubmitBatchInput) -> DomainResult<SubmittedBatch> {
        if input.records.is_empty() {
            return Err(DomainError::ValidationError(
                "at least one record is required".to_string(),
            ));
        }
        common::garde::validate_struct(&input)?;

        let total_records = u32::try_from(input.records.len()).map_err(|_| {
            DomainError::ValidationError(format!("too many records: {}", input.records.len()))
        })?;

        let batch_id = self.id_generator.generate();
        debug!(batch_id = %batch_id, total_records, "creating batch");

        let batch = Batch::processing(batch_id.clone(), total_records, Utc::now());
        self.batch_repository.create_batch(&batch).await?;

        let tagged: Vec<FinancialRecord> = input
            .records
            .into_iter()
            .map(|mut record| {
                record.batch_id = Some(batch_id.clone());
                record
            })
            .collect();

        let payload = QueuePayload::Batch(tagged).encode()?;
        if let Err(e) = self.queue.send(&self.work_queue, payload).await {
            // The status row stays Processing; nothing will ever complete it
            error!(batch_id = %batch_id, error = %e, "failed to enqueue batch");
            return Err(e);
        }

        info!(batch_id = %batch_id, total_records, "batch queued for processing");
        Ok(SubmittedBatch {
            status_endpoint: format!("{}?batch_id={}", BATCH_STATUS_PATH, batch_id),
            batch_id,
            total_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        BatchStatus, MockBatchRepository, MockIdGenerator, MockMessageQueue,
    };
    use mockall::Sequence;
    use serde_json::json;

    fn id_generator(id: &'static str) -> Arc<MockIdGenerator> {
        let mut generator = MockIdGenerator::new();
        generator.expect_generate().returning(move || id.to_string());
        Arc::new(generator)
    }

    fn records() -> Vec<FinancialRecord> {
        vec![
            FinancialRecord::new("ACME", "2024-Q1").with_field("revenue", json!(100)),
            FinancialRecord::new("BOLT", "2024-Q1").with_field("revenue", json!(200)),
        ]
    }

    #[tokio::test]
    async fn test_submit_creates_batch_before_enqueue() {
        let mut seq = Sequence::new();
        let mut batches = MockBatchRepository::new();
        let mut queue = MockMessageQueue::new();

        batches
            .expect_create_batch()
            .withf(|batch| {
                batch.batch_id == "batch-1"
                    && batch.total_records == 2
                    && batch.status == BatchStatus::Processing
                    && batch.successful_records == 0
                    && batch.failed_records == 0
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        queue
            .expect_send()
            .withf(|queue, payload| {
                let records = QueuePayload::decode(payload).unwrap().into_batch().unwrap();
                queue == "work"
                    && records.len() == 2
                    && records
                        .iter()
                        .all(|r| r.batch_id.as_deref() == Some("batch-1"))
                    && records[1].fields.get("revenue") == Some(&json!(200))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let service = BatchIngestionService::new(
            Arc::new(batches),
            Arc::new(queue),
            id_generator("batch-1"),
            "work",
        );

        let submitted = service
            .submit(SubmitBatchInput { records: records() })
            .await
            .unwrap();

        assert_eq!(submitted.batch_id, "batch-1");
        assert_eq!(submitted.total_records, 2);
        assert_eq!(
            submitted.status_endpoint,
            "/api/v1/finance/batch-status?batch_id=batch-1"
        );
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_batch() {
        let mut batches = MockBatchRepository::new();
        batches.expect_create_batch().times(0);
        let mut queue = MockMessageQueue::new();
        queue.expect_send().times(0);

        let service = BatchIngestionService::new(
            Arc::new(batches),
            Arc::new(queue),
            id_generator("batch-1"),
            "work",
        );

        let result = service.submit(SubmitBatchInput { records: vec![] }).await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_submit_rejects_record_without_key() {
        let mut batches = MockBatchRepository::new();
        batches.expect_create_batch().times(0);

        let service = BatchIngestionService::new(
            Arc::new(batches),
            Arc::new(MockMessageQueue::new()),
            id_generator("batch-1"),
            "work",
        );

        let mut input = records();
        input.push(FinancialRecord::new("", "2024-Q1"));

        match service.submit(SubmitBatchInput { records: input }).await {
            Err(DomainError::ValidationError(message)) => assert!(message.contains("company_id")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_does_not_enqueue_when_batch_row_fails() {
        let mut batches = MockBatchRepository::new();
        batches
            .expect_create_batch()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("db down"))));
        let mut queue = MockMessageQueue::new();
        queue.expect_send().times(0);

        let service = BatchIngestionService::new(
            Arc::new(batches),
            Arc::new(queue),
            id_generator("batch-1"),
            "work",
        );

        let result = service.submit(SubmitBatchInput { records: records() }).await;
        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn test_submit_surfaces_queue_failure() {
        let mut batches = MockBatchRepository::new();
        batches.expect_create_batch().times(1).returning(|_| Ok(()));
        let mut queue = MockMessageQueue::new();
        queue
            .expect_send()
            .times(1)
            .returning(|_, _| Err(DomainError::RepositoryError(anyhow::anyhow!("no responders"))));

        let service = BatchIngestionService::new(
            Arc::new(batches),
            Arc::new(queue),
            id_generator("batch-1"),
            "work",
        );

        assert!(service
            .submit(SubmitBatchInput { records: records() })
            .await
            .is_err());
    }
}
