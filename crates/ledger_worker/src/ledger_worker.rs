use crate::consumer::{BatchWriterConsumerService, DeadLetterConsumerService};
use crate::domain::{BatchWriter, DeadLetterReconciler};
use common::domain::{BatchRepository, FinancialRecordRepository, IdGenerator, MessageQueue};
use common::queue::middleware::{QueueConsumeLoggingLayer, QueueConsumeTracingLayer};
use common::queue::QueueConsumer;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::info;

/// Upper bound on messages fetched per receive
pub const MAX_RECEIVE_BATCH_SIZE: usize = 10;

/// Queue wiring shared by every pipeline component. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub work_queue: String,
    pub dead_letter_queue: String,
    pub receive_batch_size: usize,
    pub receive_wait: Duration,
}

impl PipelineConfig {
    /// Batch size is clamped to `1..=MAX_RECEIVE_BATCH_SIZE`.
    pub fn new(
        work_queue: impl Into<String>,
        dead_letter_queue: impl Into<String>,
        receive_batch_size: usize,
        receive_wait: Duration,
    ) -> Self {
        Self {
            work_queue: work_queue.into(),
            dead_letter_queue: dead_letter_queue.into(),
            receive_batch_size: receive_batch_size.clamp(1, MAX_RECEIVE_BATCH_SIZE),
            receive_wait,
        }
    }
}

pub type RunnerProcess =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

/// Collaborators the worker writes through
pub struct LedgerWorkerDependencies {
    pub record_repository: Arc<dyn FinancialRecordRepository>,
    pub batch_repository: Arc<dyn BatchRepository>,
    pub queue: Arc<dyn MessageQueue>,
    pub id_generator: Arc<dyn IdGenerator>,
}

/// The two consumer loops: batch writer on the work queue, reconciler on the
/// dead-letter queue. They share nothing but the store and the queues.
pub struct LedgerWorker {
    dependencies: LedgerWorkerDependencies,
    config: Arc<PipelineConfig>,
}

impl LedgerWorker {
    pub fn new(dependencies: LedgerWorkerDependencies, config: Arc<PipelineConfig>) -> Self {
        info!(
            work_queue = %config.work_queue,
            dead_letter_queue = %config.dead_letter_queue,
            "Initializing ledger worker"
        );
        Self {
            dependencies,
            config,
        }
    }

    pub fn into_runner_processes(self) -> Vec<(&'static str, RunnerProcess)> {
        let deps = self.dependencies;
        let config = self.config;

        let writer = Arc::new(BatchWriter::new(
            deps.record_repository.clone(),
            deps.batch_repository,
            deps.queue.clone(),
            deps.id_generator.clone(),
            config.dead_letter_queue.clone(),
        ));
        let writer_service = ServiceBuilder::new()
            .layer(QueueConsumeTracingLayer::new())
            .layer(QueueConsumeLoggingLayer::new())
            .service(BatchWriterConsumerService::new(writer));
        let batch_writer = QueueConsumer::new(
            deps.queue.clone(),
            config.work_queue.clone(),
            config.receive_batch_size,
            config.receive_wait,
            writer_service,
        );

        let reconciler = Arc::new(DeadLetterReconciler::new(
            deps.record_repository,
            deps.id_generator,
        ));
        let reconciler_service = ServiceBuilder::new()
            .layer(QueueConsumeTracingLayer::new())
            .layer(QueueConsumeLoggingLayer::new())
            .service(DeadLetterConsumerService::new(reconciler));
        let dead_letter_reconciler = QueueConsumer::new(
            deps.queue,
            config.dead_letter_queue.clone(),
            config.receive_batch_size,
            config.receive_wait,
            reconciler_service,
        );

        let batch_writer_process: RunnerProcess =
            Box::new(move |ctx| Box::pin(async move { batch_writer.run(ctx).await }));
        let reconciler_process: RunnerProcess =
            Box::new(move |ctx| Box::pin(async move { dead_letter_reconciler.run(ctx).await }));

        vec![
            ("batch-writer", batch_writer_process),
            ("dead-letter-reconciler", reconciler_process),
        ]
    }
}
