use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Processing,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "Processing",
            BatchStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(BatchStatus::Processing),
            "Completed" => Ok(BatchStatus::Completed),
            other => Err(format!("unknown batch status: {}", other)),
        }
    }
}

/// Status row for one submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub total_records: u32,
    pub successful_records: u32,
    pub failed_records: u32,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Initial row written at ingestion, before the batch is enqueued.
    pub fn processing(batch_id: String, total_records: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            batch_id,
            total_records,
            successful_records: 0,
            failed_records: 0,
            status: BatchStatus::Processing,
            created_at,
        }
    }

    pub fn apply(&mut self, outcome: BatchOutcome) {
        self.successful_records = outcome.successful_records;
        self.failed_records = outcome.failed_records;
        self.status = BatchStatus::Completed;
    }
}

/// Final counters written by the batch writer once it has resolved a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub successful_records: u32,
    pub failed_records: u32,
}

impl BatchOutcome {
    pub fn committed(total: u32) -> Self {
        Self {
            successful_records: total,
            failed_records: 0,
        }
    }

    pub fn escalated(total: u32) -> Self {
        Self {
            successful_records: 0,
            failed_records: total,
        }
    }
}
