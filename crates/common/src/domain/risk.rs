use crate::domain::result::DomainResult;
use crate::domain::FinancialRecord;
use async_trait::async_trait;

/// External risk computation. Receives the matching records and returns the
/// scorer's enriched response, which callers pass through verbatim.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(&self, records: &[FinancialRecord]) -> DomainResult<serde_json::Value>;
}
