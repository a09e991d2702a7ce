use crate::domain::result::DomainResult;
use crate::domain::{Batch, BatchOutcome, FinancialRecord, RecordKey};
use async_trait::async_trait;

/// Filter for reading records back out of the ledger.
///
/// Resolution order: `company_id` uses the primary key, otherwise
/// `industry_sector` uses the secondary index, otherwise `reporting_period`
/// falls back to a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub company_id: Option<String>,
    pub reporting_period: Option<String>,
    pub industry_sector: Option<String>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.company_id.is_none() && self.reporting_period.is_none() && self.industry_sector.is_none()
    }

    pub fn matches(&self, record: &FinancialRecord) -> bool {
        let company = self
            .company_id
            .as_deref()
            .is_none_or(|c| c == record.company_id);
        let period = self
            .reporting_period
            .as_deref()
            .is_none_or(|p| p == record.reporting_period);
        // Sector only narrows when company_id is absent, mirroring index selection
        let sector = self.company_id.is_some()
            || self
                .industry_sector
                .as_deref()
                .is_none_or(|s| Some(s) == record.industry_sector());
        company && period && sector
    }
}

/// Repository for per-record financial data.
///
/// Every write is conditional on the key not already existing; nothing in
/// this subsystem overwrites a stored record.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FinancialRecordRepository: Send + Sync {
    /// Point lookup by natural key
    async fn get_record(&self, key: &RecordKey) -> DomainResult<Option<FinancialRecord>>;

    /// Conditional single-item write.
    /// Returns `RecordAlreadyExists` when the key is taken.
    async fn insert_record(&self, record: &FinancialRecord) -> DomainResult<()>;

    /// Conditional multi-item write, all-or-nothing.
    /// A single conflicting key rejects the whole set and nothing is applied.
    async fn insert_records_atomically(&self, records: &[FinancialRecord]) -> DomainResult<()>;

    async fn find_records(&self, filter: &RecordFilter) -> DomainResult<Vec<FinancialRecord>>;
}

/// Repository for batch status rows.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn create_batch(&self, batch: &Batch) -> DomainResult<()>;

    async fn get_batch(&self, batch_id: &str) -> DomainResult<Option<Batch>>;

    /// Marks the batch `Completed` with final counters, only if the row exists
    /// and is still `Processing`. Returns `false` when there was no row to
    /// update or it was already completed.
    async fn complete_batch(&self, batch_id: &str, outcome: BatchOutcome) -> DomainResult<bool>;
}
