use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural key of a financial record. Unique across the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub company_id: String,
    pub reporting_period: String,
}

impl RecordKey {
    pub fn new(company_id: impl Into<String>, reporting_period: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            reporting_period: reporting_period.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.company_id, self.reporting_period)
    }
}

/// A single financial record as submitted by a caller.
///
/// Business attributes other than the key and the pipeline metadata are kept
/// in `fields` and passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FinancialRecord {
    #[garde(length(min = 1))]
    pub company_id: String,

    #[garde(length(min = 1))]
    pub reporting_period: String,

    #[serde(default, alias = "recordId", skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub record_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub batch_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    #[garde(skip)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl FinancialRecord {
    pub fn new(company_id: impl Into<String>, reporting_period: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            reporting_period: reporting_period.into(),
            record_id: None,
            batch_id: None,
            created_at: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.company_id.clone(), self.reporting_period.clone())
    }

    /// Sector attribute backing the secondary index, if the caller supplied one.
    pub fn industry_sector(&self) -> Option<&str> {
        self.fields.get("industry_sector").and_then(|v| v.as_str())
    }

    /// Fills in the write-time attributes. A caller-supplied `record_id` wins.
    pub fn stamped(mut self, default_record_id: String, now: DateTime<Utc>) -> Self {
        if self.record_id.is_none() {
            self.record_id = Some(default_record_id);
        }
        self.created_at = Some(now);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_keeps_business_fields() {
        let record: FinancialRecord = serde_json::from_value(json!({
            "company_id": "ACME",
            "reporting_period": "2024-Q1",
            "revenue": 1200,
            "industry_sector": "Tech"
        }))
        .unwrap();

        assert_eq!(record.company_id, "ACME");
        assert_eq!(record.fields.get("revenue"), Some(&json!(1200)));
        assert_eq!(record.industry_sector(), Some("Tech"));
        assert!(record.record_id.is_none());
    }

    #[test]
    fn test_deserialize_accepts_legacy_record_id() {
        let record: FinancialRecord = serde_json::from_value(json!({
            "company_id": "ACME",
            "reporting_period": "2024-Q1",
            "recordId": "r-1"
        }))
        .unwrap();

        assert_eq!(record.record_id.as_deref(), Some("r-1"));
        assert!(!record.fields.contains_key("recordId"));
    }

    #[test]
    fn test_serialize_omits_unset_metadata() {
        let record = FinancialRecord::new("ACME", "2024-Q1").with_field("revenue", json!(5));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({"company_id": "ACME", "reporting_period": "2024-Q1", "revenue": 5})
        );
    }

    #[test]
    fn test_stamped_preserves_caller_record_id() {
        let mut record = FinancialRecord::new("ACME", "2024-Q1");
        record.record_id = Some("caller-id".to_string());
        let now = Utc::now();

        let stamped = record.stamped("generated".to_string(), now);
        assert_eq!(stamped.record_id.as_deref(), Some("caller-id"));
        assert_eq!(stamped.created_at, Some(now));
    }

    #[test]
    fn test_stamped_assigns_generated_record_id() {
        let stamped = FinancialRecord::new("ACME", "2024-Q1").stamped("gen-1".to_string(), Utc::now());
        assert_eq!(stamped.record_id.as_deref(), Some("gen-1"));
    }

    #[test]
    fn test_validation_rejects_empty_key() {
        let record = FinancialRecord::new("", "2024-Q1");
        assert!(record.validate().is_err());
    }
}
