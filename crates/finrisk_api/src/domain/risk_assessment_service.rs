use common::domain::{
    DomainError, DomainResult, FinancialRecordRepository, RecordFilter, RiskScorer,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Reads matching records from the ledger and forwards them to the risk scorer.
pub struct RiskAssessmentService {
    record_repository: Arc<dyn FinancialRecordRepository>,
    scorer: Arc<dyn RiskScorer>,
}

impl RiskAssessmentService {
    pub fn new(
        record_repository: Arc<dyn FinancialRecordRepository>,
        scorer: Arc<dyn RiskScorer>,
    ) -> Self {
        Self {
            record_repository,
            scorer,
        }
    }

    /// Returns the scorer's response unmodified.
    #[instrument(skip(self), fields(
        company_id = ?filter.company_id,
        reporting_period = ?filter.reporting_period,
        industry_sector = ?filter.industry_sector,
    ))]
    pub async fn assess(&self, filter: RecordFilter) -> DomainResult<serde_json::Value> {
        if filter.is_empty() {
            return Err(DomainError::ValidationError(
                "at least one of company_id, reporting_period or industry_sector is required"
                    .to_string(),
            ));
        }

        let records = self.record_repository.find_records(&filter).await?;
        if records.is_empty() {
            debug!("no records matched filter");
            return Err(DomainError::NoRecordsFound);
        }

        info!(record_count = records.len(), "scoring records");
        self.scorer.score(&records).await
    }
}
