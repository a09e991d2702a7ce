use common::domain::{Batch, BatchRepository, DomainError, DomainResult};
use std::sync::Arc;
use tracing::debug;

/// Read path over the batch status ledger.
///
/// A batch id handed out moments ago can still read as not found; the row
/// and the queue message are not written atomically.
pub struct BatchStatusService {
    batch_repository: Arc<dyn BatchRepository>,
}

impl BatchStatusService {
    pub fn new(batch_repository: Arc<dyn BatchRepository>) -> Self {
        Self { batch_repository }
    }

    pub async fn get_status(&self, batch_id: &str) -> DomainResult<Batch> {
        debug!(batch_id = %batch_id, "getting batch status");

        if batch_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "batch_id is required".to_string(),
            ));
        }

        self.batch_repository
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| DomainError::BatchNotFound(batch_id.to_string()))
    }
}
